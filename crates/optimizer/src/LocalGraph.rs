//! Finds the connections between local reads and local writes, creating a
//! graph of those ties: for every `local.get`, the set of `local.set`s whose
//! value may reach it. This gives "ssa-style" information, in which a get
//! with a single reaching set can be reasoned about as if it had exactly one
//! definition.

use rustc_hash::{FxHashMap, FxHashSet};

use ir::{ExprId, ExprKind, Function, LocalIndex};
use petgraph::graph::NodeIndex;

use crate::control_flow::ControlFlowAnalysis::ControlFlowAnalysis;
use crate::small_set::SmallSet;
use crate::DataFlowAnalysis::{DataFlowAnalysis, DataFlowAnalysisInner};

#[cfg(test)]
mod tests;

/// One origin of a local's value at a program point.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum SetOrigin {
    /// The value the local holds on function entry: the incoming argument
    /// for a parameter, the type's default value for a var.
    Entry,
    /// The value written by this `local.set`.
    Set(ExprId),
}

/// The sets relevant for a get. The most common case is a single set; after
/// that, a phi of two, so inline capacity two avoids allocation for both.
pub type Sets = SmallSet<[SetOrigin; 2]>;

/// Gets influenced by a set's value.
pub type SetInfluences = SmallSet<[ExprId; 3]>;

/// Sets whose value expression contains a get.
pub type GetInfluences = SmallSet<[ExprId; 4]>;

pub struct LocalGraph {
    /// The sets affecting each get.
    pub get_setses: FxHashMap<ExprId, Sets>,
    /// Every get and set in the function, in block order. The ids are also
    /// the slot handles used to rewrite nodes in place.
    pub locations: Vec<ExprId>,
    /// For each set, the gets that may observe its value. Computed on
    /// demand by [`LocalGraph::compute_set_influences`].
    pub set_influences: FxHashMap<ExprId, SetInfluences>,
    /// For each get, the sets whose value expression contains that get.
    /// Computed on demand by [`LocalGraph::compute_get_influences`].
    pub get_influences: FxHashMap<ExprId, GetInfluences>,
    ssa_indexes: Option<FxHashSet<LocalIndex>>,
}

impl LocalGraph {
    pub fn compute(func: &Function) -> LocalGraph {
        let cfa = ControlFlowAnalysis::analyze(func);
        let cfg = cfa.cfg;
        let num_locals = func.num_locals();

        // Per-block generated definitions: the last set for each index, which
        // kills everything reaching it from above. Locations are collected in
        // the same sweep.
        let mut locations = Vec::new();
        let mut gens: Vec<FxHashMap<LocalIndex, ExprId>> = Vec::with_capacity(cfg.num_blocks());
        for index in 0..cfg.num_blocks() {
            let mut defs = FxHashMap::default();
            for &id in &cfg.block(NodeIndex::new(index)).exprs {
                match func.expr(id).kind {
                    ExprKind::LocalGet { .. } => locations.push(id),
                    ExprKind::LocalSet { index: local, .. } => {
                        locations.push(id);
                        defs.insert(local, id);
                    }
                    _ => {}
                }
            }
            gens.push(defs);
        }

        let mut analysis = DataFlowAnalysis::new(
            &cfg,
            &cfa.node_priorities,
            ReachingDefinitions {
                num_locals,
                gens: &gens,
            },
        );
        analysis.analyze();

        // With the fixed point known, a single in-order walk per block
        // resolves each get's reaching sets.
        let mut get_setses = FxHashMap::default();
        for index in 0..cfg.num_blocks() {
            let block = NodeIndex::new(index);
            let mut state = analysis.states[index].in_.clone();
            for &id in &cfg.block(block).exprs {
                match func.expr(id).kind {
                    ExprKind::LocalGet { index: local } => {
                        let sets = &state[local as usize];
                        // A get in unreachable code has no reaching state;
                        // leave it absent and let consumers skip it.
                        if !sets.is_empty() {
                            get_setses.insert(id, sets.clone());
                        }
                    }
                    ExprKind::LocalSet { index: local, .. } => {
                        state[local as usize] = Sets::singleton(SetOrigin::Set(id));
                    }
                    _ => {}
                }
            }
        }

        LocalGraph {
            get_setses,
            locations,
            set_influences: FxHashMap::default(),
            get_influences: FxHashMap::default(),
            ssa_indexes: None,
        }
    }

    /// Checks if two gets are equivalent, that is, definitely have the same
    /// value: the same index and the same reaching sets, where the sets are
    /// a lone real set, or the lone entry value of a parameter (the incoming
    /// argument dominates every read). The entry value of a var is its
    /// default, which later sets make unreliable to compare through.
    pub fn equivalent(&self, func: &Function, a: ExprId, b: ExprId) -> bool {
        let (a_index, b_index) = match (&func.expr(a).kind, &func.expr(b).kind) {
            (
                ExprKind::LocalGet { index: a_index },
                ExprKind::LocalGet { index: b_index },
            ) => (*a_index, *b_index),
            _ => return false,
        };
        if a_index != b_index {
            return false;
        }
        let (a_sets, b_sets) = match (self.get_setses.get(&a), self.get_setses.get(&b)) {
            (Some(a_sets), Some(b_sets)) => (a_sets, b_sets),
            _ => return false,
        };
        if a_sets != b_sets || a_sets.len() != 1 {
            return false;
        }
        match a_sets.iter().next().unwrap() {
            SetOrigin::Set(_) => true,
            SetOrigin::Entry => func.is_param(a_index),
        }
    }

    pub fn compute_set_influences(&mut self) {
        for (&get, sets) in &self.get_setses {
            for origin in sets {
                if let SetOrigin::Set(set) = origin {
                    self.set_influences.entry(*set).or_default().insert(get);
                }
            }
        }
    }

    pub fn compute_get_influences(&mut self, func: &Function) {
        for &loc in &self.locations {
            let value = match func.expr(loc).kind {
                ExprKind::LocalSet { value, .. } => value,
                _ => continue,
            };
            let mut stack = vec![value];
            while let Some(id) = stack.pop() {
                let kind = &func.expr(id).kind;
                if matches!(kind, ExprKind::LocalGet { .. }) {
                    self.get_influences.entry(id).or_default().insert(loc);
                }
                kind.for_each_child(|child| stack.push(child));
            }
        }
    }

    pub fn compute_influences(&mut self, func: &Function) {
        self.compute_set_influences();
        self.compute_get_influences(func);
    }

    /// Computes the local indexes that are SSA, in the sense of
    ///  * a single set for all the gets for that local index
    ///  * no other set, aside from the implicit entry value
    /// The second property is not standard SSA, but is what consumers need:
    /// if the entry value could also reach a get, substituting the set's
    /// value expression for the get would not be valid.
    pub fn compute_ssa_indexes(&mut self, func: &Function) {
        let mut sets_per_index: FxHashMap<LocalIndex, Vec<ExprId>> = FxHashMap::default();
        let mut gets_per_index: FxHashMap<LocalIndex, Vec<ExprId>> = FxHashMap::default();
        for &loc in &self.locations {
            match func.expr(loc).kind {
                ExprKind::LocalSet { index, .. } => {
                    sets_per_index.entry(index).or_default().push(loc)
                }
                ExprKind::LocalGet { index } => {
                    gets_per_index.entry(index).or_default().push(loc)
                }
                _ => unreachable!(),
            }
        }

        let mut ssa_indexes = FxHashSet::default();
        for (&index, sets) in &sets_per_index {
            // A parameter's incoming argument is a second, invisible write.
            if func.is_param(index) {
                continue;
            }
            if sets.len() != 1 {
                continue;
            }
            let only = Sets::singleton(SetOrigin::Set(sets[0]));
            let all_gets_see_it = gets_per_index
                .get(&index)
                .map(|gets| {
                    gets.iter()
                        .all(|get| self.get_setses.get(get) == Some(&only))
                })
                .unwrap_or(true);
            if all_gets_see_it {
                ssa_indexes.insert(index);
            }
        }
        self.ssa_indexes = Some(ssa_indexes);
    }

    pub fn is_ssa(&self, index: LocalIndex) -> bool {
        self.ssa_indexes
            .as_ref()
            .expect("compute_ssa_indexes has not run")
            .contains(&index)
    }
}

/// Classical forward reaching definitions, per local index: the state maps
/// each index to the sets currently able to reach it, sets kill previous
/// definitions of their index, and joins union.
struct ReachingDefinitions<'a> {
    num_locals: usize,
    gens: &'a [FxHashMap<LocalIndex, ExprId>],
}

impl DataFlowAnalysisInner for ReachingDefinitions<'_> {
    type Lattice = Vec<Sets>;

    fn entry_lattice(&mut self) -> Vec<Sets> {
        vec![Sets::singleton(SetOrigin::Entry); self.num_locals]
    }

    fn initial_estimate(&mut self) -> Vec<Sets> {
        vec![Sets::new(); self.num_locals]
    }

    fn flow_through(&mut self, block: NodeIndex, input: &Vec<Sets>) -> Vec<Sets> {
        let mut out = input.clone();
        for (&index, &set) in &self.gens[block.index()] {
            out[index as usize] = Sets::singleton(SetOrigin::Set(set));
        }
        out
    }

    fn join(&mut self, result: &mut Vec<Sets>, input: &Vec<Sets>) {
        for (into, from) in result.iter_mut().zip(input) {
            into.extend_ref(from);
        }
    }
}

//! Finds stores that are trampled over by other stores anyhow, before they
//! can be read, and replaces them with drops of their children.
//!
//! The driver is generic over a store family: module-wide global cells,
//! linear memory, and managed-heap struct fields all share the same forward
//! flow, and differ only in what counts as a store, a matching load, a
//! complete overwrite, or an interaction we cannot analyze.

use std::collections::VecDeque;

use rustc_hash::{FxHashMap, FxHashSet};
use tracing::debug;

use ir::properties::get_fallthrough;
use ir::{Builder, EffectAnalyzer, Effects, ExprId, ExprKind, FeatureSet, Function};
use petgraph::graph::NodeIndex;

use crate::control_flow::ControlFlowAnalysis::ControlFlowAnalysis;
use crate::control_flow::ControlFlowGraph::ControlFlowGraph;
use crate::pass::{Pass, PassContext};
use crate::LocalGraph::LocalGraph;


pub struct DeadStoreElimination;

impl Pass for DeadStoreElimination {
    fn name(&self) -> &'static str {
        "dead-store-elimination"
    }

    fn run_on_function(&self, cx: &PassContext, func: &mut Function) {
        // Families run in sequence; each sees the previous family's
        // rewrites.
        let mut removed = optimize_family(cx, func, &GlobalCellPolicy);
        removed += optimize_family(cx, func, &MemoryStorePolicy);
        if cx.features.contains(FeatureSet::GC) {
            removed += optimize_family(cx, func, &StructFieldPolicy);
        }
        if removed > 0 {
            debug!(function = %func.name, removed, "dropped dead stores");
        }
    }
}

/// What a store family must answer about expressions.
///
/// The queries receive the expression's computed effects, which do not
/// include its children: blocks are processed in linear execution order, so
/// the children have already been seen.
///
/// None of these needs to handle reaching code outside the function; a call,
/// return or trap is noted by the driver itself, as then any interaction at
/// all is possible.
trait StorePolicy {
    /// Whether an expression is a store of this family.
    fn is_store(&self, func: &Function, id: ExprId) -> bool;

    /// Whether the expression should be kept in the analyzed stream even
    /// though it is not a store, because it may load from or otherwise
    /// touch this family's state.
    fn is_relevant(&self, func: &Function, id: ExprId, effects: Effects) -> bool;

    /// Whether `curr` definitely loads exactly what `store` wrote.
    fn is_load_from(&self, cx: &StoreCtx, curr: ExprId, effects: Effects, store: ExprId) -> bool;

    /// Whether `curr` completely overwrites `store`'s footprint. Only
    /// called when `is_load_from` returned false.
    fn tramples(&self, cx: &StoreCtx, curr: ExprId, effects: Effects, store: ExprId) -> bool;

    /// Whether `curr` may interact with `store` in some way we cannot fully
    /// analyze. Only called when the previous two returned false.
    fn may_interact(&self, cx: &StoreCtx, curr: ExprId, effects: Effects, store: ExprId) -> bool;

    /// Builds a replacement for an unneeded store that evaluates its
    /// children for their side effects and discards the results.
    fn replace_store_with_drops(&self, store: &ExprKind, builder: &mut Builder) -> ExprId;
}

/// Shared context for policy queries.
struct StoreCtx<'a> {
    func: &'a Function,
    local_graph: &'a LocalGraph,
}

impl StoreCtx<'_> {
    /// Whether the values of two expressions are definitely identical:
    /// after stripping passthrough wrappers, two gets the local graph judges
    /// equivalent, or two constants with bitwise-equal values.
    fn value_equivalent(&self, a: ExprId, b: ExprId) -> bool {
        let a = get_fallthrough(self.func, a);
        let b = get_fallthrough(self.func, b);
        match (&self.func.expr(a).kind, &self.func.expr(b).kind) {
            (ExprKind::LocalGet { .. }, ExprKind::LocalGet { .. }) => {
                self.local_graph.equivalent(self.func, a, b)
            }
            (ExprKind::Const { literal: la }, ExprKind::Const { literal: lb }) => la == lb,
            _ => false,
        }
    }
}

fn reaches_global_code(func: &Function, id: ExprId, effects: Effects) -> bool {
    effects.intersects(Effects::CALLS | Effects::THROWS | Effects::TRAP)
        || matches!(func.expr(id).kind, ExprKind::Return { .. })
}

fn optimize_family<P: StorePolicy>(cx: &PassContext, func: &mut Function, policy: &P) -> usize {
    let optimizable = {
        let mut finder = DeadStoreFinder::new(cx, func, policy);
        finder.analyze();
        finder.optimizable_stores
    };

    // Replace the stores that were never loaded. Note that this is valid
    // even if the store could trap, such as a store out of bounds: the store
    // was trampled later, so a trap will still occur there, and nothing
    // between the two affects global state or the trap would have counted as
    // an interaction.
    let mut stores: Vec<_> = optimizable
        .into_iter()
        .filter(|(_, loads)| loads.is_empty())
        .map(|(store, _)| store)
        .collect();
    stores.sort();
    for &store in &stores {
        let kind = func.expr(store).kind.clone();
        let replacement = {
            let mut builder = Builder::new(cx.types, func);
            policy.replace_store_with_drops(&kind, &mut builder)
        };
        let replacement = func.expr(replacement).clone();
        *func.expr_mut(store) = replacement;
    }
    stores.len()
}

struct DeadStoreFinder<'a, P: StorePolicy> {
    func: &'a Function,
    policy: &'a P,
    effects: EffectAnalyzer,
    cfg: ControlFlowGraph,
    /// Per block, the expressions that matter to this family: its stores,
    /// anything relevant to them, and anything that reaches global code.
    exprs: Vec<Vec<ExprId>>,
    local_graph: LocalGraph,
    /// The stores we can fully understand, mapped to the loads from them.
    /// An empty list means the store is trampled before being read, so it
    /// is completely dead.
    optimizable_stores: FxHashMap<ExprId, Vec<ExprId>>,
}

impl<'a, P: StorePolicy> DeadStoreFinder<'a, P> {
    fn new(cx: &PassContext, func: &'a Function, policy: &'a P) -> DeadStoreFinder<'a, P> {
        let effects = EffectAnalyzer::new(
            cx.options.ignore_implicit_traps || cx.options.traps_never_happen,
        );
        let cfa = ControlFlowAnalysis::analyze(func);
        let cfg = cfa.cfg;
        let local_graph = LocalGraph::compute(func);

        let mut exprs = Vec::with_capacity(cfg.num_blocks());
        for index in 0..cfg.num_blocks() {
            let stream: Vec<ExprId> = cfg
                .block(NodeIndex::new(index))
                .exprs
                .iter()
                .copied()
                .filter(|&id| {
                    let eff = effects.visit(&func.expr(id).kind);
                    policy.is_store(func, id)
                        || reaches_global_code(func, id, eff)
                        || policy.is_relevant(func, id, eff)
                })
                .collect();
            exprs.push(stream);
        }

        DeadStoreFinder {
            func,
            policy,
            effects,
            cfg,
            exprs,
            local_graph,
            optimizable_stores: FxHashMap::default(),
        }
    }

    fn analyze(&mut self) {
        // Flow each store forward, looking for what it affects and
        // interacts with. Naive, but most stores are quickly seen to have
        // possible interactions (e.g. at the first call), halting the flow.
        for block in 0..self.exprs.len() {
            for at in 0..self.exprs[block].len() {
                let store = self.exprs[block][at];
                if !self.policy.is_store(self.func, store) {
                    continue;
                }

                // The store is optimizable until we see a problem.
                self.optimizable_stores.insert(store, Vec::new());

                let mut work = WorkQueue::new();
                let mut halted = self.scan_block(block, at + 1, store, &mut work);
                while !halted {
                    match work.pop() {
                        Some(next) => {
                            halted = self.scan_block(next.index(), 0, store, &mut work);
                        }
                        None => break,
                    }
                }
                if halted {
                    self.optimizable_stores.remove(&store);
                }
            }
        }
    }

    /// Scans one block from the given position. Enqueues successors when
    /// the flow runs past the block's end. Returns true if the analysis
    /// must give up on this store.
    fn scan_block(&mut self, block: usize, from: usize, store: ExprId, work: &mut WorkQueue) -> bool {
        let cx = StoreCtx {
            func: self.func,
            local_graph: &self.local_graph,
        };
        for at in from..self.exprs[block].len() {
            let curr = self.exprs[block][at];
            let eff = self.effects.visit(&self.func.expr(curr).kind);

            if self.policy.is_load_from(&cx, curr, eff, store) {
                // A definite load; note it.
                self.optimizable_stores
                    .get_mut(&store)
                    .unwrap()
                    .push(curr);
            } else if self.policy.tramples(&cx, curr, eff, store) {
                // Nothing further along this path can observe the store.
                return false;
            } else if reaches_global_code(self.func, curr, eff)
                || self.policy.may_interact(&cx, curr, eff, store)
            {
                // We cannot fully analyze the uses of this store.
                return true;
            }
        }

        let node = NodeIndex::new(block);
        for succ in self.cfg.successors(node) {
            work.push(succ);
        }
        if node == self.cfg.exit {
            // The value can be observed by whatever runs after we leave the
            // function.
            return true;
        }
        false
    }
}

/// A block worklist that hands out each block at most once per store.
/// Revisiting is unnecessary: scanning is monotone, and a cycle that
/// returns to the store's own block re-scans it from the top, where the
/// store tramples itself.
struct WorkQueue {
    queue: VecDeque<NodeIndex>,
    seen: FxHashSet<NodeIndex>,
}

impl WorkQueue {
    fn new() -> WorkQueue {
        WorkQueue {
            queue: VecDeque::new(),
            seen: FxHashSet::default(),
        }
    }

    fn push(&mut self, node: NodeIndex) {
        if self.seen.insert(node) {
            self.queue.push_back(node);
        }
    }

    fn pop(&mut self) -> Option<NodeIndex> {
        self.queue.pop_front()
    }
}

/// Module-wide global cells. Cells are identified by name and distinct
/// names cannot alias, so everything is decided by `is_load_from` and
/// `tramples`.
struct GlobalCellPolicy;

impl StorePolicy for GlobalCellPolicy {
    fn is_store(&self, func: &Function, id: ExprId) -> bool {
        matches!(func.expr(id).kind, ExprKind::GlobalSet { .. })
    }

    fn is_relevant(&self, func: &Function, id: ExprId, _effects: Effects) -> bool {
        matches!(func.expr(id).kind, ExprKind::GlobalGet { .. })
    }

    fn is_load_from(&self, cx: &StoreCtx, curr: ExprId, _effects: Effects, store: ExprId) -> bool {
        match (&cx.func.expr(curr).kind, &cx.func.expr(store).kind) {
            (ExprKind::GlobalGet { name }, ExprKind::GlobalSet { name: stored, .. }) => {
                name == stored
            }
            _ => false,
        }
    }

    fn tramples(&self, cx: &StoreCtx, curr: ExprId, _effects: Effects, store: ExprId) -> bool {
        match (&cx.func.expr(curr).kind, &cx.func.expr(store).kind) {
            (ExprKind::GlobalSet { name, .. }, ExprKind::GlobalSet { name: stored, .. }) => {
                name == stored
            }
            _ => false,
        }
    }

    fn may_interact(&self, _cx: &StoreCtx, _curr: ExprId, _effects: Effects, _store: ExprId) -> bool {
        false
    }

    fn replace_store_with_drops(&self, store: &ExprKind, builder: &mut Builder) -> ExprId {
        match store {
            ExprKind::GlobalSet { value, .. } => builder.make_drop(*value),
            _ => unreachable!("global store expected"),
        }
    }
}

/// Linear memory loads and stores.
struct MemoryStorePolicy;

impl StorePolicy for MemoryStorePolicy {
    fn is_store(&self, func: &Function, id: ExprId) -> bool {
        matches!(func.expr(id).kind, ExprKind::Store { .. })
    }

    fn is_relevant(&self, _func: &Function, _id: ExprId, effects: Effects) -> bool {
        effects.reads_memory() || effects.writes_memory()
    }

    fn is_load_from(&self, cx: &StoreCtx, curr: ExprId, _effects: Effects, store: ExprId) -> bool {
        if cx.func.expr(curr).ty == ir::Type::Unreachable {
            return false;
        }
        match (&cx.func.expr(curr).kind, &cx.func.expr(store).kind) {
            (
                &ExprKind::Load {
                    ptr: load_ptr,
                    offset: load_offset,
                    bytes: load_bytes,
                    atomic: load_atomic,
                },
                &ExprKind::Store {
                    ptr: store_ptr,
                    offset: store_offset,
                    bytes: store_bytes,
                    atomic: store_atomic,
                    ..
                },
            ) => {
                // Atomic stores have additional trapping behavior on
                // unaligned addresses, so an atomic store cannot be treated
                // as loaded by a plain load; the reverse is fine.
                if store_atomic && !load_atomic {
                    return false;
                }
                // Only the obvious case: identical size and offset, with
                // the load reading the full stored width.
                load_bytes == store_bytes
                    && load_bytes == cx.func.expr(curr).ty.byte_size()
                    && load_offset == store_offset
                    && cx.value_equivalent(load_ptr, store_ptr)
            }
            _ => false,
        }
    }

    fn tramples(&self, cx: &StoreCtx, curr: ExprId, _effects: Effects, store: ExprId) -> bool {
        match (&cx.func.expr(curr).kind, &cx.func.expr(store).kind) {
            (
                &ExprKind::Store {
                    ptr: other_ptr,
                    offset: other_offset,
                    bytes: other_bytes,
                    atomic: other_atomic,
                    ..
                },
                &ExprKind::Store {
                    ptr: store_ptr,
                    offset: store_offset,
                    bytes: store_bytes,
                    atomic: store_atomic,
                    ..
                },
            ) => {
                // As in is_load_from, atomic stores are dangerous.
                if store_atomic && !other_atomic {
                    return false;
                }
                other_bytes == store_bytes
                    && other_offset == store_offset
                    && cx.value_equivalent(other_ptr, store_ptr)
            }
            _ => false,
        }
    }

    fn may_interact(&self, _cx: &StoreCtx, _curr: ExprId, effects: Effects, _store: ExprId) -> bool {
        // Any memory access we did not identify above is dangerous.
        effects.reads_memory() || effects.writes_memory()
    }

    fn replace_store_with_drops(&self, store: &ExprKind, builder: &mut Builder) -> ExprId {
        match store {
            &ExprKind::Store { ptr, value, .. } => {
                let drop_ptr = builder.make_drop(ptr);
                let drop_value = builder.make_drop(value);
                builder.make_sequence(drop_ptr, drop_value)
            }
            _ => unreachable!("memory store expected"),
        }
    }
}

/// Managed-heap struct fields.
struct StructFieldPolicy;

impl StorePolicy for StructFieldPolicy {
    fn is_store(&self, func: &Function, id: ExprId) -> bool {
        matches!(func.expr(id).kind, ExprKind::StructSet { .. })
    }

    fn is_relevant(&self, func: &Function, id: ExprId, _effects: Effects) -> bool {
        matches!(func.expr(id).kind, ExprKind::StructGet { .. })
    }

    fn is_load_from(&self, cx: &StoreCtx, curr: ExprId, _effects: Effects, store: ExprId) -> bool {
        match (&cx.func.expr(curr).kind, &cx.func.expr(store).kind) {
            (
                &ExprKind::StructGet {
                    ref_: load_ref,
                    field: load_field,
                },
                &ExprKind::StructSet {
                    ref_: store_ref,
                    field: store_field,
                    ..
                },
            ) => {
                load_field == store_field
                    && cx.func.expr(load_ref).ty == cx.func.expr(store_ref).ty
                    && cx.value_equivalent(load_ref, store_ref)
            }
            _ => false,
        }
    }

    fn tramples(&self, cx: &StoreCtx, curr: ExprId, _effects: Effects, store: ExprId) -> bool {
        match (&cx.func.expr(curr).kind, &cx.func.expr(store).kind) {
            (
                &ExprKind::StructSet {
                    ref_: other_ref,
                    field: other_field,
                    ..
                },
                &ExprKind::StructSet {
                    ref_: store_ref,
                    field: store_field,
                    ..
                },
            ) => {
                other_field == store_field
                    && cx.func.expr(other_ref).ty == cx.func.expr(store_ref).ty
                    && cx.value_equivalent(other_ref, store_ref)
            }
            _ => false,
        }
    }

    fn may_interact(&self, _cx: &StoreCtx, _curr: ExprId, effects: Effects, _store: ExprId) -> bool {
        // A heap access that is not a recognized get or set of the same
        // field through an equivalent reference could alias it.
        effects.reads_heap() || effects.writes_heap()
    }

    fn replace_store_with_drops(&self, store: &ExprKind, builder: &mut Builder) -> ExprId {
        match store {
            &ExprKind::StructSet { ref_, value, .. } => {
                let drop_ref = builder.make_drop(ref_);
                let drop_value = builder.make_drop(value);
                builder.make_sequence(drop_ref, drop_value)
            }
            _ => unreachable!("struct store expected"),
        }
    }
}

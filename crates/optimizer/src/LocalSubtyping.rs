//! Refines the types of locals where possible: if a var is only ever
//! assigned values of a more specific type than its declared type, refine
//! the declared type. That can unlock later optimizations at the local's
//! uses, as they then have more type information.

use rustc_hash::FxHashSet;
use tracing::debug;

use ir::refinalize::refinalize;
use ir::{ExprId, ExprKind, FeatureSet, Function, LocalIndex, Type};

use crate::pass::{Pass, PassContext};
use crate::LocalGraph::{LocalGraph, SetOrigin};


pub struct LocalSubtyping;

impl Pass for LocalSubtyping {
    fn name(&self) -> &'static str {
        "local-subtyping"
    }

    fn run_on_function(&self, cx: &PassContext, func: &mut Function) {
        if !cx.features.contains(FeatureSet::GC) {
            return;
        }

        let num_locals = func.num_locals();

        // The list of sets and gets per local, and which vars read their
        // default value. For non-nullable locals the latter matters: if the
        // default null is read, the local's type must stay nullable.
        let local_graph = LocalGraph::compute(func);

        let mut sets_for_local: Vec<Vec<ExprId>> = vec![Vec::new(); num_locals];
        let mut gets_for_local: Vec<Vec<ExprId>> = vec![Vec::new(); num_locals];
        for &loc in &local_graph.locations {
            match func.expr(loc).kind {
                ExprKind::LocalSet { index, .. } => sets_for_local[index as usize].push(loc),
                ExprKind::LocalGet { index } => gets_for_local[index as usize].push(loc),
                _ => unreachable!(),
            }
        }

        // Without non-nullable locals the default is always a null, and all
        // nulls compare equal, so the precise type of the default does not
        // matter and we can treat it as unused.
        let mut uses_default = FxHashSet::default();
        if cx.features.contains(FeatureSet::GC_NN_LOCALS) {
            for (&get, sets) in &local_graph.get_setses {
                let index = match func.expr(get).kind {
                    ExprKind::LocalGet { index } => index,
                    _ => unreachable!(),
                };
                if func.is_var(index) && sets.contains(&SetOrigin::Entry) {
                    uses_default.insert(index);
                }
            }
        }

        let var_base = func.var_index_base();
        let mut refined_total = 0usize;

        // Keep iterating while we find things to change. There can be
        // chains like X -> Y -> Z where one change enables more. That makes
        // this quadratic in the worst case, but such chains are rare, as
        // general optimizations break them up.
        loop {
            let mut more = false;

            // Recompute least upper bounds on ifs and blocks, which can
            // expose a more specific type at a set's value without any
            // change to the tree's shape.
            refinalize(func, cx.types);

            for index in var_base..num_locals as LocalIndex {
                // All the types assigned to the var, and their optimal
                // bound.
                let types: FxHashSet<Type> = sets_for_local[index as usize]
                    .iter()
                    .map(|&set| match func.expr(set).kind {
                        ExprKind::LocalSet { value, .. } => func.expr(value).ty,
                        _ => unreachable!(),
                    })
                    .collect();
                if types.is_empty() {
                    // Nothing is assigned to this local (other passes will
                    // remove it).
                    continue;
                }

                let old_type = func.get_local_type(index);
                let mut new_type = cx.types.least_upper_bound(types.iter().copied());
                assert!(new_type != Type::None, "assigned values must have a bound");

                if new_type.is_non_nullable() {
                    if !cx.features.contains(FeatureSet::GC_NN_LOCALS)
                        || uses_default.contains(&index)
                    {
                        new_type = new_type.with_nullable();
                    }
                } else if !new_type.is_defaultable() {
                    // Nothing else without a default value can be stored in
                    // a local.
                    continue;
                }

                if new_type != old_type {
                    assert!(cx.types.is_sub_type(new_type, old_type));
                    func.set_local_type(index, new_type);
                    more = true;
                    refined_total += 1;

                    for &get in &gets_for_local[index as usize] {
                        func.expr_mut(get).ty = new_type;
                    }
                    // Tees yield their value as the local's type, so they
                    // must follow it.
                    for &set in &sets_for_local[index as usize] {
                        let value = match func.expr(set).kind {
                            ExprKind::LocalSet {
                                value,
                                is_tee: true,
                                ..
                            } => value,
                            _ => continue,
                        };
                        let finalized = if func.expr(value).ty == Type::Unreachable {
                            Type::Unreachable
                        } else {
                            new_type
                        };
                        func.expr_mut(set).ty = finalized;
                    }
                }
            }

            if !more {
                break;
            }
        }

        if refined_total > 0 {
            debug!(function = %func.name, refined = refined_total, "refined local types");
        }
    }
}

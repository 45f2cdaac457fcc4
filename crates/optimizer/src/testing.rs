//! Shared helpers for pass tests. Programs are built directly through the
//! IR builder; there is no text format at this layer.

use ir::types::Field;
use ir::{DefId, Expr, ExprId, ExprKind, Function, Global, Module, Type};

use crate::PassOptions;

/// A module with two mutable i32 globals, `g` and `h`.
pub fn test_module() -> Module {
    let mut module = Module::new();
    for name in ["g", "h"] {
        module.globals.push(Global {
            name: name.into(),
            ty: Type::I32,
            mutable: true,
        });
    }
    module
}

/// Adds a two-level struct hierarchy and returns `(base, sub)`.
pub fn struct_pair(module: &mut Module) -> (DefId, DefId) {
    let base = module.types.add_struct(None, vec![Field { ty: Type::I32 }]);
    let sub = module.types.add_struct(Some(base), vec![Field { ty: Type::I32 }]);
    (base, sub)
}

/// Options under which memory and heap accesses are not treated as able to
/// trap. Most dead-store tests need this, as a possible trap pins every
/// downstream store.
pub fn relaxed_options() -> PassOptions {
    PassOptions {
        ignore_implicit_traps: true,
        ..PassOptions::default()
    }
}

/// All expressions reachable from the function body, parents after
/// children, that satisfy the predicate.
pub fn find_all(func: &Function, pred: impl Fn(&Expr) -> bool) -> Vec<ExprId> {
    let mut found = Vec::new();
    collect(func, func.body, &pred, &mut found);
    found
}

fn collect(func: &Function, id: ExprId, pred: &impl Fn(&Expr) -> bool, found: &mut Vec<ExprId>) {
    func.expr(id)
        .kind
        .for_each_child(|child| collect(func, child, pred, found));
    if pred(func.expr(id)) {
        found.push(id);
    }
}

pub fn is_global_set(expr: &Expr) -> bool {
    matches!(expr.kind, ExprKind::GlobalSet { .. })
}

pub fn is_store(expr: &Expr) -> bool {
    matches!(expr.kind, ExprKind::Store { .. })
}

pub fn is_struct_set(expr: &Expr) -> bool {
    matches!(expr.kind, ExprKind::StructSet { .. })
}

pub fn is_drop(expr: &Expr) -> bool {
    matches!(expr.kind, ExprKind::Drop { .. })
}

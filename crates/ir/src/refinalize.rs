//! Bottom-up recomputation of expression types. After a local's declared
//! type is refined, the types of blocks, ifs and other structured nodes that
//! derive their type from sub-expressions may become refinable too; this
//! walk recomputes them all in one pass.

use crate::expr::{ExprId, ExprKind};
use crate::types::{HeapType, Type, TypeStore};
use crate::Function;

pub fn refinalize(func: &mut Function, types: &TypeStore) {
    let body = func.body;
    visit(func, types, body);
}

fn visit(func: &mut Function, types: &TypeStore, id: ExprId) {
    // Detach the kind so the children can be visited through a mutable
    // borrow of the arena, then put it back alongside the recomputed type.
    let kind = std::mem::replace(&mut func.expr_mut(id).kind, ExprKind::Nop);
    kind.for_each_child(|child| visit(func, types, child));

    let ty = compute_type(func, types, &kind, id);
    let expr = func.expr_mut(id);
    expr.kind = kind;
    expr.ty = ty;
}

fn compute_type(func: &Function, types: &TypeStore, kind: &ExprKind, id: ExprId) -> Type {
    let ty = |c: ExprId| func.expr(c).ty;
    let any_unreachable = |ids: &[ExprId]| ids.iter().any(|&c| ty(c) == Type::Unreachable);
    // Statement nodes: no value of their own, unreachable if a child is.
    let stmt = |ids: &[ExprId]| {
        if any_unreachable(ids) {
            Type::Unreachable
        } else {
            Type::None
        }
    };

    match kind {
        ExprKind::Nop => Type::None,
        ExprKind::Block { name, children } => {
            if name.is_some() {
                // A branch target; branches carry no value here.
                Type::None
            } else {
                children.last().map(|&c| ty(c)).unwrap_or(Type::None)
            }
        }
        ExprKind::If {
            condition,
            if_true,
            if_false,
        } => {
            if ty(*condition) == Type::Unreachable {
                Type::Unreachable
            } else {
                match if_false {
                    None => Type::None,
                    Some(f) => types.lub(ty(*if_true), ty(*f)),
                }
            }
        }
        // Branches to a loop label re-enter at the top and carry no value,
        // so the body alone determines the type.
        ExprKind::Loop { body, .. } => ty(*body),
        ExprKind::Br { condition, .. } => match condition {
            None => Type::Unreachable,
            Some(_) => Type::None,
        },
        ExprKind::Return { .. } | ExprKind::Unreachable => Type::Unreachable,
        ExprKind::Drop { value } => stmt(&[*value]),
        ExprKind::Call { operands, .. } => {
            if any_unreachable(operands) {
                Type::Unreachable
            } else {
                // The declared result is not recorded in the node; keep it.
                func.expr(id).ty
            }
        }
        ExprKind::LocalGet { index } => func.get_local_type(*index),
        ExprKind::LocalSet {
            index,
            value,
            is_tee,
        } => {
            if ty(*value) == Type::Unreachable {
                Type::Unreachable
            } else if *is_tee {
                func.get_local_type(*index)
            } else {
                Type::None
            }
        }
        ExprKind::GlobalGet { .. } => func.expr(id).ty,
        ExprKind::GlobalSet { value, .. } => stmt(&[*value]),
        ExprKind::Load { ptr, .. } => {
            if ty(*ptr) == Type::Unreachable {
                Type::Unreachable
            } else {
                func.expr(id).ty
            }
        }
        ExprKind::Store { ptr, value, .. } => stmt(&[*ptr, *value]),
        ExprKind::Const { literal } => literal.ty(),
        ExprKind::RefNull { .. } => func.expr(id).ty,
        ExprKind::StructNew { operands, .. } => {
            if any_unreachable(operands) {
                Type::Unreachable
            } else {
                func.expr(id).ty
            }
        }
        ExprKind::StructGet { ref_, field } => match ty(*ref_) {
            Type::Unreachable => Type::Unreachable,
            Type::Ref(HeapType::Def(def), _) => types.field_type(def, *field),
            _ => func.expr(id).ty,
        },
        ExprKind::StructSet { ref_, value, .. } => stmt(&[*ref_, *value]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Field, Nullability};
    use crate::Builder;

    #[test]
    fn block_and_get_types_follow_refined_locals() {
        let mut types = TypeStore::new();
        let base = types.add_struct(None, vec![Field { ty: Type::I32 }]);
        let sub = types.add_struct(Some(base), vec![Field { ty: Type::I32 }]);

        let nullable_base = Type::Ref(HeapType::Def(base), Nullability::Nullable);
        let mut func = Function::new("test", vec![], vec![nullable_base]);
        let mut b = Builder::new(&types, &mut func);
        let get = b.make_local_get(0);
        let nop = b.make_nop();
        let block = b.make_block(None, vec![nop, get]);
        func.body = block;

        // Refine the local and refinalize; the get and the block follow.
        let refined = Type::Ref(HeapType::Def(sub), Nullability::Nullable);
        func.set_local_type(0, refined);
        refinalize(&mut func, &types);
        assert_eq!(func.expr(get).ty, refined);
        assert_eq!(func.expr(block).ty, refined);
    }

    #[test]
    fn if_type_is_arm_lub() {
        let mut types = TypeStore::new();
        let base = types.add_struct(None, vec![Field { ty: Type::I32 }]);
        let sub = types.add_struct(Some(base), vec![Field { ty: Type::I32 }]);

        let mut func = Function::new("test", vec![Type::I32], vec![]);
        let mut b = Builder::new(&types, &mut func);
        let cond = b.make_local_get(0);
        let t = b.make_struct_new(sub, vec![]);
        let f = b.make_ref_null(HeapType::Def(base));
        let if_ = b.make_if(cond, t, Some(f));
        func.body = if_;

        refinalize(&mut func, &types);
        assert_eq!(
            func.expr(if_).ty,
            Type::Ref(HeapType::Def(base), Nullability::Nullable)
        );
    }
}

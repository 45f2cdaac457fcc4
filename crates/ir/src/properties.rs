//! Structural queries on expressions.

use crate::expr::{ExprId, ExprKind};
use crate::Function;

/// Returns the value-determining sub-expression, skipping wrappers that pass
/// a child's value through unchanged: tees, unnamed blocks (their final
/// child) and loops. Named blocks are left alone, as a branch may target
/// them.
pub fn get_fallthrough(func: &Function, mut id: ExprId) -> ExprId {
    loop {
        match &func.expr(id).kind {
            ExprKind::LocalSet {
                value,
                is_tee: true,
                ..
            } => id = *value,
            ExprKind::Block {
                name: None,
                children,
            } if !children.is_empty() => id = *children.last().unwrap(),
            ExprKind::Loop { body, .. } => id = *body,
            _ => return id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Type, TypeStore};
    use crate::{Builder, Function};

    #[test]
    fn fallthrough_skips_wrappers() {
        let types = TypeStore::new();
        let mut func = Function::new("test", vec![], vec![Type::I32]);
        let mut b = Builder::new(&types, &mut func);
        let value = b.make_i32(7);
        let tee = b.make_local_tee(0, value);
        let nop = b.make_nop();
        let block = b.make_block(None, vec![nop, tee]);
        assert_eq!(get_fallthrough(&func, block), value);
    }

    #[test]
    fn named_blocks_are_opaque() {
        let types = TypeStore::new();
        let mut func = Function::new("test", vec![], vec![]);
        let mut b = Builder::new(&types, &mut func);
        let value = b.make_i32(1);
        let block = b.make_block(Some("exit".into()), vec![value]);
        assert_eq!(get_fallthrough(&func, block), block);
    }
}

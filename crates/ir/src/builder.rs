//! Convenience constructors for expression nodes. Each `make_*` allocates
//! into the function's arena and computes the node's type.

use crate::expr::{Expr, ExprId, ExprKind, Literal, LocalIndex};
use crate::types::{DefId, HeapType, Nullability, Type, TypeStore};
use crate::{Function, Name};

pub struct Builder<'a> {
    types: &'a TypeStore,
    func: &'a mut Function,
}

impl<'a> Builder<'a> {
    pub fn new(types: &'a TypeStore, func: &'a mut Function) -> Builder<'a> {
        Builder { types, func }
    }

    fn alloc(&mut self, kind: ExprKind, ty: Type) -> ExprId {
        self.func.alloc(Expr { kind, ty })
    }

    fn ty(&self, id: ExprId) -> Type {
        self.func.expr(id).ty
    }

    /// `Type::Unreachable` if any of the ids is unreachable, else `ok`.
    fn unless_unreachable(&self, children: &[ExprId], ok: Type) -> Type {
        if children.iter().any(|&c| self.ty(c) == Type::Unreachable) {
            Type::Unreachable
        } else {
            ok
        }
    }

    pub fn make_nop(&mut self) -> ExprId {
        self.alloc(ExprKind::Nop, Type::None)
    }

    pub fn make_const(&mut self, literal: Literal) -> ExprId {
        let ty = literal.ty();
        self.alloc(ExprKind::Const { literal }, ty)
    }

    pub fn make_i32(&mut self, value: i32) -> ExprId {
        self.make_const(Literal::I32(value))
    }

    pub fn make_block(&mut self, name: Option<Name>, children: Vec<ExprId>) -> ExprId {
        let ty = if name.is_some() {
            Type::None
        } else {
            children.last().map(|&c| self.ty(c)).unwrap_or(Type::None)
        };
        self.alloc(ExprKind::Block { name, children }, ty)
    }

    /// An unnamed two-child block, typed as its second child.
    pub fn make_sequence(&mut self, first: ExprId, second: ExprId) -> ExprId {
        self.make_block(None, vec![first, second])
    }

    pub fn make_if(&mut self, condition: ExprId, if_true: ExprId, if_false: Option<ExprId>) -> ExprId {
        let ty = match if_false {
            None => Type::None,
            Some(f) => self.types.lub(self.ty(if_true), self.ty(f)),
        };
        let ty = if self.ty(condition) == Type::Unreachable {
            Type::Unreachable
        } else {
            ty
        };
        self.alloc(
            ExprKind::If {
                condition,
                if_true,
                if_false,
            },
            ty,
        )
    }

    pub fn make_loop(&mut self, name: Option<Name>, body: ExprId) -> ExprId {
        let ty = self.ty(body);
        self.alloc(ExprKind::Loop { name, body }, ty)
    }

    pub fn make_br(&mut self, target: impl Into<Name>, condition: Option<ExprId>) -> ExprId {
        let ty = if condition.is_some() {
            Type::None
        } else {
            Type::Unreachable
        };
        self.alloc(
            ExprKind::Br {
                target: target.into(),
                condition,
            },
            ty,
        )
    }

    pub fn make_return(&mut self, value: Option<ExprId>) -> ExprId {
        self.alloc(ExprKind::Return { value }, Type::Unreachable)
    }

    pub fn make_unreachable(&mut self) -> ExprId {
        self.alloc(ExprKind::Unreachable, Type::Unreachable)
    }

    pub fn make_drop(&mut self, value: ExprId) -> ExprId {
        let ty = self.unless_unreachable(&[value], Type::None);
        self.alloc(ExprKind::Drop { value }, ty)
    }

    pub fn make_call(
        &mut self,
        target: impl Into<Name>,
        operands: Vec<ExprId>,
        result: Type,
    ) -> ExprId {
        let ty = self.unless_unreachable(&operands, result);
        self.alloc(
            ExprKind::Call {
                target: target.into(),
                operands,
            },
            ty,
        )
    }

    pub fn make_local_get(&mut self, index: LocalIndex) -> ExprId {
        let ty = self.func.get_local_type(index);
        self.alloc(ExprKind::LocalGet { index }, ty)
    }

    pub fn make_local_set(&mut self, index: LocalIndex, value: ExprId) -> ExprId {
        let ty = self.unless_unreachable(&[value], Type::None);
        self.alloc(
            ExprKind::LocalSet {
                index,
                value,
                is_tee: false,
            },
            ty,
        )
    }

    /// A tee's type is the local's declared type, not the value's.
    pub fn make_local_tee(&mut self, index: LocalIndex, value: ExprId) -> ExprId {
        let ty = self.unless_unreachable(&[value], self.func.get_local_type(index));
        self.alloc(
            ExprKind::LocalSet {
                index,
                value,
                is_tee: true,
            },
            ty,
        )
    }

    pub fn make_global_get(&mut self, name: impl Into<Name>, ty: Type) -> ExprId {
        self.alloc(ExprKind::GlobalGet { name: name.into() }, ty)
    }

    pub fn make_global_set(&mut self, name: impl Into<Name>, value: ExprId) -> ExprId {
        let ty = self.unless_unreachable(&[value], Type::None);
        self.alloc(
            ExprKind::GlobalSet {
                name: name.into(),
                value,
            },
            ty,
        )
    }

    pub fn make_load(&mut self, ptr: ExprId, offset: u32, bytes: u32, atomic: bool, ty: Type) -> ExprId {
        let ty = self.unless_unreachable(&[ptr], ty);
        self.alloc(
            ExprKind::Load {
                ptr,
                offset,
                bytes,
                atomic,
            },
            ty,
        )
    }

    pub fn make_store(
        &mut self,
        ptr: ExprId,
        value: ExprId,
        offset: u32,
        bytes: u32,
        atomic: bool,
    ) -> ExprId {
        let ty = self.unless_unreachable(&[ptr, value], Type::None);
        self.alloc(
            ExprKind::Store {
                ptr,
                value,
                offset,
                bytes,
                atomic,
            },
            ty,
        )
    }

    pub fn make_ref_null(&mut self, heap: HeapType) -> ExprId {
        self.alloc(
            ExprKind::RefNull { heap },
            Type::Ref(heap, Nullability::Nullable),
        )
    }

    pub fn make_struct_new(&mut self, def: DefId, operands: Vec<ExprId>) -> ExprId {
        let ty = self.unless_unreachable(
            &operands,
            Type::Ref(HeapType::Def(def), Nullability::NonNullable),
        );
        self.alloc(ExprKind::StructNew { def, operands }, ty)
    }

    pub fn make_struct_get(&mut self, ref_: ExprId, field: u32) -> ExprId {
        let ty = match self.ty(ref_) {
            Type::Ref(HeapType::Def(def), _) => self.types.field_type(def, field),
            Type::Unreachable => Type::Unreachable,
            other => panic!("struct.get of non-struct reference {:?}", other),
        };
        let ty = self.unless_unreachable(&[ref_], ty);
        self.alloc(ExprKind::StructGet { ref_, field }, ty)
    }

    pub fn make_struct_set(&mut self, ref_: ExprId, value: ExprId, field: u32) -> ExprId {
        let ty = self.unless_unreachable(&[ref_, value], Type::None);
        self.alloc(ExprKind::StructSet { ref_, value, field }, ty)
    }
}

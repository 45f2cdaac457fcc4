//! The intermediate representation operated on by the optimizer: modules,
//! functions with arena-stored expression trees, and the structural type
//! lattice, along with the shallow effect analyzer and small IR utilities
//! that the passes consume.

use std::sync::Arc;

use bitflags::bitflags;

pub mod builder;
pub mod effects;
pub mod expr;
pub mod properties;
pub mod refinalize;
pub mod types;

pub use builder::Builder;
pub use effects::{EffectAnalyzer, Effects};
pub use expr::{Expr, ExprId, ExprKind, Literal, LocalIndex};
pub use types::{DefId, HeapType, Nullability, Type, TypeStore};

/// Interned-enough name type. Cheap to clone and safe to share across the
/// function-parallel pass workers.
pub type Name = Arc<str>;

bitflags! {
    /// The proposals enabled for a module. Passes consult these before
    /// touching constructs that are only present under a given proposal.
    pub struct FeatureSet: u8 {
        const ATOMICS = 1 << 0;
        const GC = 1 << 1;
        /// Non-nullable locals. Without this, a local of reference type is
        /// always nullable, and its implicit initial value is a null.
        const GC_NN_LOCALS = 1 << 2;
    }
}

impl Default for FeatureSet {
    fn default() -> Self {
        FeatureSet::empty()
    }
}

/// A module-wide mutable (or immutable) cell.
#[derive(Debug, Clone)]
pub struct Global {
    pub name: Name,
    pub ty: Type,
    pub mutable: bool,
}

#[derive(Debug, Default)]
pub struct Module {
    pub globals: Vec<Global>,
    pub functions: Vec<Function>,
    pub types: TypeStore,
    pub features: FeatureSet,
}

impl Module {
    pub fn new() -> Module {
        Module::default()
    }

    pub fn get_global(&self, name: &str) -> Option<&Global> {
        self.globals.iter().find(|g| &*g.name == name)
    }
}

/// A function. The local index space is the parameters followed by the vars;
/// parameters receive the caller's arguments, vars start out holding their
/// type's default value.
#[derive(Debug)]
pub struct Function {
    pub name: Name,
    pub params: Vec<Type>,
    pub vars: Vec<Type>,
    pub body: ExprId,
    exprs: Vec<Expr>,
}

impl Function {
    /// Creates a function whose body is a lone `Nop`. Callers build the real
    /// body through a [`Builder`] and then assign it.
    pub fn new(name: impl Into<Name>, params: Vec<Type>, vars: Vec<Type>) -> Function {
        let mut func = Function {
            name: name.into(),
            params,
            vars,
            body: ExprId::from_index(0),
            exprs: Vec::new(),
        };
        let nop = func.alloc(Expr {
            kind: ExprKind::Nop,
            ty: Type::None,
        });
        func.body = nop;
        func
    }

    pub fn alloc(&mut self, expr: Expr) -> ExprId {
        let id = ExprId::from_index(self.exprs.len());
        self.exprs.push(expr);
        id
    }

    pub fn expr(&self, id: ExprId) -> &Expr {
        &self.exprs[id.index()]
    }

    pub fn expr_mut(&mut self, id: ExprId) -> &mut Expr {
        &mut self.exprs[id.index()]
    }

    pub fn num_params(&self) -> usize {
        self.params.len()
    }

    pub fn num_locals(&self) -> usize {
        self.params.len() + self.vars.len()
    }

    /// The first local index that is a var rather than a parameter.
    pub fn var_index_base(&self) -> LocalIndex {
        self.params.len() as LocalIndex
    }

    pub fn is_param(&self, index: LocalIndex) -> bool {
        (index as usize) < self.params.len()
    }

    pub fn is_var(&self, index: LocalIndex) -> bool {
        !self.is_param(index) && (index as usize) < self.num_locals()
    }

    pub fn get_local_type(&self, index: LocalIndex) -> Type {
        let index = index as usize;
        if index < self.params.len() {
            self.params[index]
        } else {
            self.vars[index - self.params.len()]
        }
    }

    /// Only vars may be retyped; a parameter's type is part of the signature.
    pub fn set_local_type(&mut self, index: LocalIndex, ty: Type) {
        assert!(self.is_var(index));
        let base = self.params.len();
        self.vars[index as usize - base] = ty;
    }
}

//! The structural type lattice: value types, heap types with declared
//! supertypes, subtype and least-upper-bound queries.

/// Index of a declared struct type in a module's [`TypeStore`].
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct DefId(pub u32);

impl DefId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// A heap type. The built-in tops form the chain
/// `Def(_) <: Struct <: Eq <: Any`; declared types additionally follow their
/// declared supertype chain up to `Struct`.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum HeapType {
    Any,
    Eq,
    Struct,
    Def(DefId),
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum Nullability {
    NonNullable,
    Nullable,
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum Type {
    /// The empty type: the node yields no value.
    None,
    /// The bottom type: control does not proceed past the node.
    Unreachable,
    I32,
    I64,
    F32,
    F64,
    Ref(HeapType, Nullability),
}

impl Type {
    pub fn is_concrete(self) -> bool {
        !matches!(self, Type::None | Type::Unreachable)
    }

    pub fn is_numeric(self) -> bool {
        matches!(self, Type::I32 | Type::I64 | Type::F32 | Type::F64)
    }

    pub fn is_ref(self) -> bool {
        matches!(self, Type::Ref(..))
    }

    pub fn is_nullable(self) -> bool {
        matches!(self, Type::Ref(_, Nullability::Nullable))
    }

    pub fn is_non_nullable(self) -> bool {
        matches!(self, Type::Ref(_, Nullability::NonNullable))
    }

    /// Whether the language defines an implicit initial value for the type:
    /// zero for numerics, null for nullable references.
    pub fn is_defaultable(self) -> bool {
        self.is_numeric() || self.is_nullable()
    }

    pub fn heap_type(self) -> HeapType {
        match self {
            Type::Ref(heap, _) => heap,
            _ => panic!("heap_type of non-reference type {:?}", self),
        }
    }

    /// The same reference type with nullability added.
    pub fn with_nullable(self) -> Type {
        match self {
            Type::Ref(heap, _) => Type::Ref(heap, Nullability::Nullable),
            _ => panic!("with_nullable of non-reference type {:?}", self),
        }
    }

    pub fn byte_size(self) -> u32 {
        match self {
            Type::I32 | Type::F32 => 4,
            Type::I64 | Type::F64 => 8,
            _ => panic!("byte_size of type {:?}", self),
        }
    }
}

/// A field of a declared struct type. Only the value type matters here;
/// packed storage is not modeled.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub ty: Type,
}

#[derive(Debug, Clone)]
pub struct StructDef {
    /// The declared supertype. Absent means the type sits directly under the
    /// built-in `Struct` top.
    pub supertype: Option<DefId>,
    pub fields: Vec<Field>,
}

/// The module's declared heap types.
#[derive(Debug, Default)]
pub struct TypeStore {
    defs: Vec<StructDef>,
}

impl TypeStore {
    pub fn new() -> TypeStore {
        TypeStore::default()
    }

    pub fn add_struct(&mut self, supertype: Option<DefId>, fields: Vec<Field>) -> DefId {
        if let Some(sup) = supertype {
            assert!(sup.index() < self.defs.len());
        }
        let id = DefId(self.defs.len() as u32);
        self.defs.push(StructDef { supertype, fields });
        id
    }

    pub fn def(&self, id: DefId) -> &StructDef {
        &self.defs[id.index()]
    }

    pub fn field_type(&self, id: DefId, index: u32) -> Type {
        self.defs[id.index()].fields[index as usize].ty
    }

    fn heap_super(&self, heap: HeapType) -> Option<HeapType> {
        match heap {
            HeapType::Any => None,
            HeapType::Eq => Some(HeapType::Any),
            HeapType::Struct => Some(HeapType::Eq),
            HeapType::Def(id) => Some(
                self.defs[id.index()]
                    .supertype
                    .map(HeapType::Def)
                    .unwrap_or(HeapType::Struct),
            ),
        }
    }

    pub fn heap_is_sub_type(&self, a: HeapType, b: HeapType) -> bool {
        let mut curr = a;
        loop {
            if curr == b {
                return true;
            }
            match self.heap_super(curr) {
                Some(next) => curr = next,
                None => return false,
            }
        }
    }

    pub fn is_sub_type(&self, a: Type, b: Type) -> bool {
        if a == b {
            return true;
        }
        // Unreachable is the bottom of the lattice.
        if a == Type::Unreachable {
            return true;
        }
        match (a, b) {
            (Type::Ref(ha, na), Type::Ref(hb, nb)) => {
                if na == Nullability::Nullable && nb == Nullability::NonNullable {
                    return false;
                }
                self.heap_is_sub_type(ha, hb)
            }
            _ => false,
        }
    }

    fn heap_lub(&self, a: HeapType, b: HeapType) -> HeapType {
        let mut ancestors = vec![a];
        let mut curr = a;
        while let Some(next) = self.heap_super(curr) {
            ancestors.push(next);
            curr = next;
        }
        let mut curr = b;
        loop {
            if ancestors.contains(&curr) {
                return curr;
            }
            match self.heap_super(curr) {
                Some(next) => curr = next,
                // Unreachable in practice, as Any is a common ancestor.
                None => return HeapType::Any,
            }
        }
    }

    /// The least upper bound of two value types, or `Type::None` if they
    /// have no common supertype.
    pub fn lub(&self, a: Type, b: Type) -> Type {
        if a == b {
            return a;
        }
        if a == Type::Unreachable {
            return b;
        }
        if b == Type::Unreachable {
            return a;
        }
        match (a, b) {
            (Type::Ref(ha, na), Type::Ref(hb, nb)) => {
                let nullability = if na == Nullability::Nullable || nb == Nullability::Nullable {
                    Nullability::Nullable
                } else {
                    Nullability::NonNullable
                };
                Type::Ref(self.heap_lub(ha, hb), nullability)
            }
            _ => Type::None,
        }
    }

    /// The least upper bound of a set of value types, or `Type::None` when
    /// no bound exists. Valid input always has one.
    pub fn least_upper_bound(&self, types: impl IntoIterator<Item = Type>) -> Type {
        let mut iter = types.into_iter();
        let first = match iter.next() {
            Some(ty) => ty,
            None => return Type::None,
        };
        iter.fold(first, |acc, ty| {
            if acc == Type::None {
                Type::None
            } else {
                self.lub(acc, ty)
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with_chain() -> (TypeStore, DefId, DefId, DefId) {
        let mut store = TypeStore::new();
        let base = store.add_struct(None, vec![Field { ty: Type::I32 }]);
        let mid = store.add_struct(Some(base), vec![Field { ty: Type::I32 }]);
        let other = store.add_struct(None, vec![Field { ty: Type::F64 }]);
        (store, base, mid, other)
    }

    #[test]
    fn heap_subtyping_follows_declared_chain() {
        let (store, base, mid, other) = store_with_chain();
        assert!(store.heap_is_sub_type(HeapType::Def(mid), HeapType::Def(base)));
        assert!(!store.heap_is_sub_type(HeapType::Def(base), HeapType::Def(mid)));
        assert!(store.heap_is_sub_type(HeapType::Def(other), HeapType::Struct));
        assert!(store.heap_is_sub_type(HeapType::Def(mid), HeapType::Any));
        assert!(!store.heap_is_sub_type(HeapType::Def(other), HeapType::Def(base)));
    }

    #[test]
    fn nullability_gates_subtyping() {
        let (store, base, mid, _) = store_with_chain();
        let nullable_base = Type::Ref(HeapType::Def(base), Nullability::Nullable);
        let nn_mid = Type::Ref(HeapType::Def(mid), Nullability::NonNullable);
        assert!(store.is_sub_type(nn_mid, nullable_base));
        assert!(!store.is_sub_type(nullable_base, nn_mid));
    }

    #[test]
    fn lub_of_siblings_is_common_ancestor() {
        let (store, base, mid, other) = store_with_chain();
        let a = Type::Ref(HeapType::Def(mid), Nullability::NonNullable);
        let b = Type::Ref(HeapType::Def(base), Nullability::Nullable);
        assert_eq!(store.lub(a, b), Type::Ref(HeapType::Def(base), Nullability::Nullable));
        let c = Type::Ref(HeapType::Def(other), Nullability::NonNullable);
        assert_eq!(store.lub(a, c), Type::Ref(HeapType::Struct, Nullability::NonNullable));
    }

    #[test]
    fn lub_treats_unreachable_as_bottom() {
        let (store, base, ..) = store_with_chain();
        let a = Type::Ref(HeapType::Def(base), Nullability::Nullable);
        assert_eq!(store.lub(Type::Unreachable, a), a);
        assert_eq!(
            store.least_upper_bound([Type::Unreachable, Type::I32]),
            Type::I32
        );
        assert_eq!(store.least_upper_bound([Type::I32, Type::F32]), Type::None);
    }

    #[test]
    fn defaultability() {
        let (_, base, ..) = store_with_chain();
        assert!(Type::I32.is_defaultable());
        assert!(Type::Ref(HeapType::Def(base), Nullability::Nullable).is_defaultable());
        assert!(!Type::Ref(HeapType::Def(base), Nullability::NonNullable).is_defaultable());
        assert!(!Type::Unreachable.is_defaultable());
    }
}

//! Type interner for the two-kinds-plus-dimension type lattice.
//!
//! Every type in the language is a `(kind, dimension)` pair: dimension
//! 0 is a scalar, dimension d > 0 is a d-deep array of the underlying
//! scalar. The interner guarantees a canonical identity for each pair,
//! so handle equality is the single correctness predicate used by the
//! parser, the semantic analyzer and lowering.

use std::collections::HashMap;
use std::fmt;

/// Scalar kind underlying a type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeKind {
    Boolean,
    Integer,
}

impl fmt::Display for TypeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeKind::Boolean => write!(f, "bool"),
            TypeKind::Integer => write!(f, "int"),
        }
    }
}

/// An interned type reference.
///
/// This is a lightweight handle (just a u32). Two handles compare equal
/// if and only if their `(kind, dimension)` pairs are equal.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ty(u32);

impl Ty {
    /// The boolean scalar type.
    pub const BOOLEAN: Ty = Ty(0);
    /// The integer scalar type.
    pub const INTEGER: Ty = Ty(1);

    fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for Ty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Ty({})", self.0)
    }
}

/// Type interner that deduplicates `(kind, dimension)` pairs.
#[derive(Debug)]
pub struct TypeInterner {
    /// Map from pair to its interned handle.
    cache: HashMap<(TypeKind, u32), Ty>,
    /// All interned pairs, indexed by handle.
    entries: Vec<(TypeKind, u32)>,
}

impl Default for TypeInterner {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeInterner {
    /// Create a new interner with the two scalars pre-interned.
    ///
    /// The pre-interned handles MUST match the `Ty::*` constants.
    pub fn new() -> Self {
        let mut interner = Self {
            cache: HashMap::new(),
            entries: Vec::new(),
        };

        assert_eq!(interner.get(TypeKind::Boolean, 0), Ty::BOOLEAN);
        assert_eq!(interner.get(TypeKind::Integer, 0), Ty::INTEGER);

        interner
    }

    /// Intern a `(kind, dimension)` pair, returning its handle.
    ///
    /// If the pair was already interned, returns the existing handle.
    pub fn get(&mut self, kind: TypeKind, dimension: u32) -> Ty {
        if let Some(&ty) = self.cache.get(&(kind, dimension)) {
            return ty;
        }

        let ty = Ty(self.entries.len() as u32);
        self.entries.push((kind, dimension));
        self.cache.insert((kind, dimension), ty);
        ty
    }

    /// Intern the array type wrapping `ty` one level deeper.
    pub fn increase_dimension(&mut self, ty: Ty) -> Ty {
        let (kind, dimension) = self.entries[ty.index()];
        self.get(kind, dimension + 1)
    }

    /// Scalar kind of an interned type.
    pub fn kind(&self, ty: Ty) -> TypeKind {
        self.entries[ty.index()].0
    }

    /// Dimension of an interned type (0 for scalars).
    pub fn dimension(&self, ty: Ty) -> u32 {
        self.entries[ty.index()].1
    }

    /// Render a type the way diagnostics spell it, e.g. `int[2]`.
    pub fn describe(&self, ty: Ty) -> String {
        let (kind, dimension) = self.entries[ty.index()];
        format!("{}[{}]", kind, dimension)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interning_deduplication() {
        let mut interner = TypeInterner::new();

        let a = interner.get(TypeKind::Integer, 2);
        let b = interner.get(TypeKind::Integer, 2);
        let c = interner.get(TypeKind::Boolean, 2);

        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_pre_interned_scalars() {
        let mut interner = TypeInterner::new();

        assert_eq!(interner.get(TypeKind::Boolean, 0), Ty::BOOLEAN);
        assert_eq!(interner.get(TypeKind::Integer, 0), Ty::INTEGER);
        assert_eq!(interner.kind(Ty::INTEGER), TypeKind::Integer);
        assert_eq!(interner.dimension(Ty::INTEGER), 0);
    }

    #[test]
    fn test_increase_dimension() {
        let mut interner = TypeInterner::new();

        let array = interner.increase_dimension(Ty::INTEGER);
        assert_eq!(interner.kind(array), TypeKind::Integer);
        assert_eq!(interner.dimension(array), 1);
        assert_eq!(array, interner.get(TypeKind::Integer, 1));

        let deeper = interner.increase_dimension(array);
        assert_eq!(interner.dimension(deeper), 2);
    }

    #[test]
    fn test_describe() {
        let mut interner = TypeInterner::new();
        let array = interner.get(TypeKind::Boolean, 1);

        assert_eq!(interner.describe(Ty::INTEGER), "int[0]");
        assert_eq!(interner.describe(array), "bool[1]");
    }
}

//! Central compiler context.

use crate::diagnostic::Diagnostics;
use crate::source::SourceMap;
use crate::types::{Ty, TypeInterner};

/// Stores the state shared by every stage of the pipeline.
///
/// The context outlives the AST and the IR, so interned type handles
/// never dangle. The interner is only mutated while the parser and the
/// semantic analyzer run; lowering treats it as read-only.
pub struct Context {
    /// Type interner.
    pub types: TypeInterner,
    /// Source file management.
    pub source_map: SourceMap,
    /// Accumulated diagnostics.
    pub diagnostics: Diagnostics,
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl Context {
    /// Create a new compiler context.
    pub fn new() -> Self {
        Self {
            types: TypeInterner::new(),
            source_map: SourceMap::new(),
            diagnostics: Diagnostics::new(),
        }
    }

    /// Render a type the way diagnostics spell it.
    pub fn describe_ty(&self, ty: Ty) -> String {
        self.types.describe(ty)
    }

    /// Check if there are any errors.
    pub fn has_errors(&self) -> bool {
        self.diagnostics.has_errors()
    }

    /// Get the error count.
    pub fn error_count(&self) -> usize {
        self.diagnostics.error_count()
    }

    /// Render all diagnostics.
    pub fn render_diagnostics(&self) -> String {
        self.diagnostics.render(&self.source_map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TypeKind;

    #[test]
    fn test_context_types() {
        let mut ctx = Context::new();

        let a = ctx.types.get(TypeKind::Integer, 1);
        let b = ctx.types.get(TypeKind::Integer, 1);
        assert_eq!(a, b);
        assert_eq!(ctx.describe_ty(a), "int[1]");
    }
}

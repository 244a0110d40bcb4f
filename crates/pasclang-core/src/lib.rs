//! Pseudo-Pascal compiler.
//!
//! This crate implements an ahead-of-time compiler for Pseudo-Pascal
//! with:
//! - A hand-written lexer and recursive-descent parser with
//!   panic-mode recovery
//! - Interned types: every `(kind, dimension)` pair has one canonical
//!   handle
//! - A semantic analyzer for typing, scoping, arity, initialization
//!   and usage rules
//! - Lowering to a small SSA IR, a verifier, and an x86-64 backend
//!   that drives the system linker
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         Context                             │
//! │   ┌───────────┐   ┌───────────┐   ┌─────────────┐           │
//! │   │ SourceMap │   │   Types   │   │ Diagnostics │           │
//! │   │  (files)  │   │ (interner)│   │   (sink)    │           │
//! │   └───────────┘   └───────────┘   └─────────────┘           │
//! └─────────────────────────────────────────────────────────────┘
//!        ↑                 ↑                 ↑
//!        │                 │                 │
//!   ┌────┴────┐      ┌─────┴────┐      ┌─────┴────┐
//!   │  Lex +  │  →   │   Sema   │  →   │  Lower   │  →  Codegen
//!   │  Parse  │      │ (typeck) │      │ (SSA IR) │      (x86-64)
//!   └─────────┘      └──────────┘      └──────────┘
//! ```

pub mod codegen;
pub mod compiler;
pub mod context;
pub mod diagnostic;
pub mod ir;
pub mod lower;
pub mod opt;
pub mod pretty;
pub mod sema;
pub mod source;
pub mod syntax;
pub mod types;

pub use compiler::{CompileError, CompileResult, Compiler, EmitKind, Options};
pub use context::Context;
pub use diagnostic::{Diagnostic, Diagnostics, Severity};
pub use source::{Source, SourceId, SourceMap, Span};
pub use types::{Ty, TypeInterner, TypeKind};

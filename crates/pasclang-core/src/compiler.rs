//! Main compiler driver.
//!
//! Runs the pipeline end to end: read → lex → parse → check →
//! [pretty] → lower → verify → optimize → [dump] → emit. Stages run in
//! order; a stage that reported errors raises its typed failure after
//! its own walk completes, so every diagnostic it collected is
//! delivered before the pipeline stops.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

use crate::codegen;
use crate::context::Context;
use crate::lower;
use crate::opt;
use crate::pretty;
use crate::sema;
use crate::syntax::ast::Program;
use crate::syntax::{lexer, parser};

/// Result type for compilation.
pub type CompileResult<T> = Result<T, CompileError>;

/// Compilation failure, carrying its exit category.
///
/// The numbering is part of the CLI contract: success is 0 and each
/// variant maps to the fixed code returned by [`exit_code`].
///
/// [`exit_code`]: CompileError::exit_code
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum CompileError {
    #[error("{0}")]
    Usage(String),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("lexical analysis failed")]
    Lexical,

    #[error("syntax analysis failed")]
    Syntax,

    #[error("type checking failed")]
    Type,

    #[error("code generation failed: {0}")]
    Generator(String),
}

impl CompileError {
    /// Process exit code for this failure.
    pub fn exit_code(&self) -> u8 {
        match self {
            CompileError::Usage(_) => 1,
            CompileError::Internal(_) => 2,
            CompileError::Lexical => 3,
            CompileError::Syntax => 4,
            CompileError::Type => 5,
            CompileError::Generator(_) => 6,
        }
    }
}

/// What the backend should produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmitKind {
    Executable,
    Object,
    Assembly,
}

/// Driver configuration, assembled from the command line.
#[derive(Debug, Clone)]
pub struct Options {
    /// Output path; `None` only for front-end-only runs.
    pub output: Option<PathBuf>,
    pub emit: EmitKind,
    pub opt_level: u8,
    /// Reprint the source from the AST to stdout (implies front end
    /// only).
    pub pretty_print: bool,
    /// Dump the IR to stderr after lowering.
    pub dump_ir: bool,
    /// Stop after semantic analysis.
    pub frontend_only: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            output: None,
            emit: EmitKind::Executable,
            opt_level: 0,
            pretty_print: false,
            dump_ir: false,
            frontend_only: false,
        }
    }
}

/// Compiler instance owning the shared pipeline state.
#[derive(Default)]
pub struct Compiler {
    ctx: Context,
}

impl Compiler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn context(&self) -> &Context {
        &self.ctx
    }

    /// Render all diagnostics collected so far.
    pub fn render_diagnostics(&self) -> String {
        self.ctx.render_diagnostics()
    }

    /// Run the front end on a source file: lex, parse, type-check.
    pub fn frontend(&mut self, input: &Path) -> CompileResult<Program> {
        let content = std::fs::read_to_string(input)
            .map_err(|e| CompileError::Internal(format!("could not open file {}: {}", input.display(), e)))?;
        let source_id = self.ctx.source_map.add_file(input, content.clone());

        let tokens = lexer::lex(&content, source_id, &mut self.ctx.diagnostics)?;
        debug!(tokens = tokens.len(), "lexical analysis done");

        let program = parser::parse(tokens, &content, &mut self.ctx.types, &mut self.ctx.diagnostics)?;
        debug!(
            globals = program.globals.len(),
            procedures = program.procedures.len(),
            "parsing done"
        );

        sema::check(&program, &mut self.ctx)?;
        debug!("semantic analysis done");

        Ok(program)
    }

    /// Run the front end on an in-memory source (tests, tooling).
    pub fn frontend_source(&mut self, source: &str) -> CompileResult<Program> {
        let source_id = self.ctx.source_map.add_inline(source);

        let tokens = lexer::lex(source, source_id, &mut self.ctx.diagnostics)?;
        let program = parser::parse(tokens, source, &mut self.ctx.types, &mut self.ctx.diagnostics)?;
        sema::check(&program, &mut self.ctx)?;

        Ok(program)
    }

    /// Compile one file end to end according to `options`.
    pub fn compile_file(&mut self, input: &Path, options: &Options) -> CompileResult<()> {
        let program = self.frontend(input)?;

        if options.pretty_print {
            print!("{}", pretty::pretty(&program, &self.ctx));
        }

        if options.frontend_only || options.pretty_print {
            return Ok(());
        }

        let mut module = lower::lower(&program, &self.ctx);
        debug!(functions = module.functions.len(), "lowering done");

        crate::ir::verify(&module)
            .map_err(|e| CompileError::Generator(format!("backend refused the module: {}", e)))?;

        opt::optimize(&mut module, options.opt_level, &mut self.ctx.diagnostics);

        if options.dump_ir {
            eprint!("{}", module);
        }

        let output = match &options.output {
            Some(output) => output,
            None => {
                return Err(CompileError::Usage(
                    "no output file given for code generation".to_string(),
                ))
            }
        };

        match options.emit {
            EmitKind::Assembly => codegen::emit_assembly(&module, output)?,
            EmitKind::Object => codegen::emit_object(&module, output)?,
            EmitKind::Executable => codegen::emit_executable(&module, output)?,
        }
        debug!(output = %output.display(), "emission done");

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes_are_stable() {
        assert_eq!(CompileError::Usage(String::new()).exit_code(), 1);
        assert_eq!(CompileError::Internal(String::new()).exit_code(), 2);
        assert_eq!(CompileError::Lexical.exit_code(), 3);
        assert_eq!(CompileError::Syntax.exit_code(), 4);
        assert_eq!(CompileError::Type.exit_code(), 5);
        assert_eq!(CompileError::Generator(String::new()).exit_code(), 6);
    }

    #[test]
    fn test_missing_input_is_internal_error() {
        let mut compiler = Compiler::new();
        let result = compiler.frontend(Path::new("does/not/exist.pp"));
        assert!(matches!(result, Err(CompileError::Internal(_))));
    }

    #[test]
    fn test_frontend_source_pipeline() {
        let mut compiler = Compiler::new();
        let program = compiler
            .frontend_source("program var x : integer; begin x := 1; writeln(x) end.")
            .expect("pipeline failed");
        assert_eq!(program.globals.len(), 1);
        assert!(!compiler.context().has_errors());
    }
}

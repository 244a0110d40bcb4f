//! Native code generation.
//!
//! The verified module is lowered to x86-64 assembly text, then either
//! written out as-is (`-S`), assembled into an object file (`-c`), or
//! piped through the system linker driver together with the runtime
//! library to produce an executable.

pub mod link;
mod x86_64;

use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::compiler::CompileError;
use crate::ir::Module;
use self::link::Linker;

/// The target triple code is generated for, derived from the host.
pub fn default_target() -> String {
    format!("{}-unknown-{}", std::env::consts::ARCH, std::env::consts::OS)
}

/// Check that the host is a target this backend can emit for.
fn select_target() -> Result<(), CompileError> {
    if std::env::consts::ARCH != "x86_64" {
        return Err(CompileError::Generator(format!(
            "unsupported target {}, only x86_64 is available",
            default_target()
        )));
    }
    Ok(())
}

/// Write assembly for `module` to the file at `output`.
pub fn emit_assembly(module: &Module, output: &Path) -> Result<(), CompileError> {
    select_target()?;

    let mut file = File::create(output).map_err(|e| cannot_write(output, e))?;
    x86_64::emit(module, &mut file).map_err(|e| cannot_write(output, e))?;
    Ok(())
}

/// Assemble `module` into an object file at `output`.
pub fn emit_object(module: &Module, output: &Path) -> Result<(), CompileError> {
    select_target()?;

    let mut assembler = Linker::spawn_assemble(&output).map_err(generator_error)?;
    x86_64::emit(module, assembler.stdin()).map_err(|e| cannot_write(output, e))?;
    assembler.finish().map_err(generator_error)
}

/// Link `module` against the runtime into an executable at `output`.
pub fn emit_executable(module: &Module, output: &Path) -> Result<(), CompileError> {
    select_target()?;

    let mut linker = Linker::spawn_link(&output).map_err(generator_error)?;
    x86_64::emit(module, linker.stdin()).map_err(|e| cannot_write(output, e))?;
    linker.finish().map_err(generator_error)
}

fn cannot_write(output: &Path, error: std::io::Error) -> CompileError {
    CompileError::Generator(format!("could not write to {}: {}", output.display(), error))
}

fn generator_error(error: link::LinkerError) -> CompileError {
    CompileError::Generator(error.to_string())
}

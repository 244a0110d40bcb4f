//! Assembler and linker invocation.
//!
//! The backend hands textual assembly to the system C compiler driver,
//! either assembling it into an object file (`-c`) or linking it with
//! the runtime into an executable. The assembly travels through the
//! child's stdin (`-xassembler -`), so no temporary file is needed.

use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, ExitStatus, Stdio};

use thiserror::Error;

/// Library name the executable links against.
const RUNTIME_LIB: &str = "pasclang_rt";

/// Environment variable overriding the runtime search path.
const RUNTIME_PATH_VAR: &str = "PASCLANG_RT_PATH";

#[non_exhaustive]
#[derive(Error, Debug)]
pub enum LinkerError {
    #[error("failed to run the linker driver: {0}")]
    Io(#[from] std::io::Error),

    #[error("linker driver exited with status {0:?}")]
    Failed(ExitStatus),
}

/// A running linker (or assembler) child consuming assembly on stdin.
pub struct Linker(Child);

impl Linker {
    /// Spawn the driver to link an executable at `output`.
    pub fn spawn_link<O: AsRef<Path>>(output: &O) -> Result<Linker, LinkerError> {
        let mut command = Command::new("cc");
        command.args(["-xassembler", "-"]);

        for dir in runtime_search_paths() {
            command.arg("-L").arg(dir);
        }

        command
            .arg(format!("-l{}", RUNTIME_LIB))
            .args(["-pthread", "-ldl", "-lm"])
            .arg("-o")
            .arg(output.as_ref())
            .stdin(Stdio::piped())
            .spawn()
            .map(Linker)
            .map_err(LinkerError::Io)
    }

    /// Spawn the driver to assemble an object file at `output`.
    pub fn spawn_assemble<O: AsRef<Path>>(output: &O) -> Result<Linker, LinkerError> {
        Command::new("cc")
            .args(["-xassembler", "-", "-c"])
            .arg("-o")
            .arg(output.as_ref())
            .stdin(Stdio::piped())
            .spawn()
            .map(Linker)
            .map_err(LinkerError::Io)
    }

    /// The child's stdin, to receive the assembly stream.
    pub fn stdin(&mut self) -> &mut ChildStdin {
        match self.0.stdin.as_mut() {
            Some(stdin) => stdin,
            None => unreachable!("child was spawned with piped stdin"),
        }
    }

    /// Close stdin and wait for the child to finish.
    pub fn finish(mut self) -> Result<(), LinkerError> {
        drop(self.0.stdin.take());
        let status = self.0.wait().map_err(LinkerError::Io)?;
        if status.success() {
            Ok(())
        } else {
            Err(LinkerError::Failed(status))
        }
    }
}

/// Directories searched for the runtime library: the override variable
/// when set, then the conventional build-tree locations.
fn runtime_search_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    if let Ok(path) = std::env::var(RUNTIME_PATH_VAR) {
        paths.push(path.into());
    }

    paths.push("target/release".into());
    paths.push("target/debug".into());

    paths
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_override_path_is_searched_first() {
        std::env::set_var(RUNTIME_PATH_VAR, "/opt/pasclang/lib");
        let paths = runtime_search_paths();
        std::env::remove_var(RUNTIME_PATH_VAR);

        assert_eq!(paths[0], PathBuf::from("/opt/pasclang/lib"));
        assert!(paths.contains(&PathBuf::from("target/debug")));
    }
}

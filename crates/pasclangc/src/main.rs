//! Pseudo-Pascal compiler CLI.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::error::ErrorKind;
use clap::{CommandFactory, Parser};
use pasclang_core::{CompileError, Compiler, EmitKind, Options};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "pasclang")]
#[command(version, about = "Pseudo-Pascal compiler", long_about = None)]
struct Cli {
    /// Input source file
    input: Option<PathBuf>,

    /// Output file (executable, object, or assembly depending on flags)
    #[arg(short = 'o', value_name = "FILE")]
    output: Option<PathBuf>,

    /// Optimization level (only 0 and 1 actually differ)
    #[arg(short = 'O', value_name = "LEVEL", default_value_t = 0)]
    optimization: u8,

    /// Emit an object file instead of linking
    #[arg(short = 'c')]
    object: bool,

    /// Emit an assembly file instead of linking
    #[arg(short = 'S')]
    assembly: bool,

    /// Reprint the source from the AST to standard output
    #[arg(short = 'p')]
    pretty: bool,

    /// Dump the IR to standard error after lowering
    #[arg(short = 'd')]
    dump: bool,

    /// Only perform front-end tasks (lexical, syntactic and semantic
    /// analyses)
    #[arg(short = 'f')]
    frontend_only: bool,
}

fn main() -> ExitCode {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_env("PASCLANG_LOG"))
        .with_writer(std::io::stderr)
        .try_init();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(error) => {
            let code = match error.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => 0,
                _ => 1,
            };
            let _ = error.print();
            return ExitCode::from(code);
        }
    };

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("error: {}", error);
            ExitCode::from(error.exit_code())
        }
    }
}

fn run(cli: Cli) -> Result<(), CompileError> {
    let Some(input) = cli.input else {
        let _ = Cli::command().print_help();
        return Err(CompileError::Usage("no input file given".to_string()));
    };

    let frontend_only = cli.frontend_only || cli.pretty;

    let output = match &cli.output {
        Some(output) if output.to_string_lossy().starts_with('-') => {
            return Err(CompileError::Usage(format!(
                "invalid output file format {}",
                output.display()
            )));
        }
        Some(output) => Some(output.clone()),
        None if frontend_only => None,
        None => {
            return Err(CompileError::Usage(
                "no output file given, run with --help for usage".to_string(),
            ));
        }
    };

    let emit = if cli.assembly {
        EmitKind::Assembly
    } else if cli.object {
        EmitKind::Object
    } else {
        EmitKind::Executable
    };

    let options = Options {
        output,
        emit,
        opt_level: cli.optimization,
        pretty_print: cli.pretty,
        dump_ir: cli.dump,
        frontend_only,
    };

    let mut compiler = Compiler::new();
    let result = compiler.compile_file(&input, &options);

    let rendered = compiler.render_diagnostics();
    if !rendered.is_empty() {
        eprint!("{}", rendered);
    }

    result
}

//! Diagnostic contract tests: ordering, rendering, and stage
//! propagation.

use pasclang_core::{CompileError, Compiler, Severity};

#[test]
fn analyzer_reports_in_source_order() {
    let source = "program var x : integer;\n\
                  begin\n\
                  x := true;\n\
                  x := false;\n\
                  y := 1;\n\
                  if 3 then writeln(1)\n\
                  end.";

    let mut compiler = Compiler::new();
    let result = compiler.frontend_source(source);
    assert!(matches!(result, Err(CompileError::Type)));

    let spans: Vec<_> = compiler
        .context()
        .diagnostics
        .iter()
        .filter(|d| d.severity == Severity::Error)
        .filter_map(|d| d.span)
        .collect();

    assert!(spans.len() >= 4);
    for pair in spans.windows(2) {
        assert!(
            pair[0].start <= pair[1].start,
            "diagnostics out of source order"
        );
    }
}

#[test]
fn rendered_errors_quote_the_offending_line() {
    let source = "program var x : integer;\nbegin x := true end.";

    let mut compiler = Compiler::new();
    let _ = compiler.frontend_source(source);
    let rendered = compiler.render_diagnostics();

    assert!(rendered.contains("error: unexpected type bool[0] instead of int[0]"));
    assert!(rendered.contains("begin x := true end."));
    assert!(rendered.contains("^^^^"));
}

#[test]
fn later_stages_do_not_run_after_a_failure() {
    // The undefined symbol makes the analyzer fail; had lowering run
    // anyway it would panic on the missing name.
    let mut compiler = Compiler::new();
    let result = compiler.frontend_source("program begin nope() end.");
    assert!(matches!(result, Err(CompileError::Type)));
}

#[test]
fn warnings_do_not_abort() {
    let mut compiler = Compiler::new();
    let result =
        compiler.frontend_source("program var dead : integer; begin writeln(1) end.");
    assert!(result.is_ok());

    let warnings = compiler
        .context()
        .diagnostics
        .iter()
        .filter(|d| d.severity == Severity::Warning)
        .count();
    assert_eq!(warnings, 1);
}

#[test]
fn parser_failure_carries_the_syntax_category() {
    let mut compiler = Compiler::new();
    let result = compiler.frontend_source("program begin if then end.");
    match result {
        Err(error @ CompileError::Syntax) => assert_eq!(error.exit_code(), 4),
        other => panic!("expected a syntax failure, got {other:?}"),
    }
}

#[test]
fn lexer_failure_carries_the_lexical_category() {
    let mut compiler = Compiler::new();
    let result = compiler.frontend_source("program begin writeln(@) end.");
    match result {
        Err(error @ CompileError::Lexical) => assert_eq!(error.exit_code(), 3),
        other => panic!("expected a lexical failure, got {other:?}"),
    }
}

//! Semantic analysis.
//!
//! The analyzer walks the AST once, enforcing the static semantics:
//! scoping, typing, arity, initialization and usage. Procedure
//! signatures are collected before any body is checked so mutually
//! recursive definitions type-check regardless of source order.
//!
//! The walk keeps going after each local failure so one run reports as
//! many diagnostics as possible; the stage fails with
//! [`CompileError::Type`] only once the walk is complete. The analyzer
//! owns no state that survives the call, so running it twice over the
//! same AST produces the same diagnostics.

use std::collections::HashMap;

use crate::compiler::CompileError;
use crate::context::Context;
use crate::source::Span;
use crate::syntax::ast::{BinOp, Binding, Expr, ExprKind, Instr, InstrKind, Procedure, Program, UnaryOp};
use crate::types::Ty;

/// Built-in names that cannot be redefined as user symbols.
pub const RESERVED: [&str; 3] = ["write", "writeln", "readln"];

/// A procedure's callable interface.
#[derive(Debug, Clone)]
struct Signature {
    formals: Vec<(String, Ty)>,
    result: Option<Ty>,
}

/// What the analyzer knows about one variable binding.
#[derive(Debug, Clone, Copy)]
struct VarInfo {
    ty: Ty,
    initialized: bool,
    used: bool,
}

/// Check a whole program against the static semantics.
pub fn check(program: &Program, ctx: &mut Context) -> Result<(), CompileError> {
    let errors_before = ctx.error_count();

    Analyzer {
        ctx: &mut *ctx,
        procedures: HashMap::new(),
        globals: HashMap::new(),
        global_order: Vec::new(),
        locals: HashMap::new(),
        local_order: Vec::new(),
        current_function: None,
    }
    .check_program(program);

    if ctx.error_count() > errors_before {
        Err(CompileError::Type)
    } else {
        Ok(())
    }
}

struct Analyzer<'a> {
    ctx: &'a mut Context,
    procedures: HashMap<String, Signature>,
    globals: HashMap<String, VarInfo>,
    global_order: Vec<String>,
    locals: HashMap<String, VarInfo>,
    local_order: Vec<String>,
    current_function: Option<String>,
}

impl Analyzer<'_> {
    // ========================================================================
    // Reporting helpers
    // ========================================================================

    fn wrong_type(&mut self, got: Ty, expected: Ty, span: Span) {
        let message = format!(
            "unexpected type {} instead of {}",
            self.ctx.describe_ty(got),
            self.ctx.describe_ty(expected)
        );
        self.ctx.diagnostics.error(span, message);
    }

    fn invalid_call(&mut self, name: &str, span: Span) {
        self.ctx
            .diagnostics
            .error(span, format!("invalid call to procedure or function {}", name));
    }

    fn invalid_arity(&mut self, name: &str, span: Span) {
        self.ctx
            .diagnostics
            .error(span, format!("wrong number of arguments in call to {}", name));
    }

    fn undefined_symbol(&mut self, name: &str, span: Span) {
        self.ctx
            .diagnostics
            .error(span, format!("undefined symbol {}", name));
    }

    fn redefined_symbol(&mut self, name: &str, span: Span) {
        let message = if RESERVED.contains(&name) {
            format!("redefinition of built-in symbol {}", name)
        } else {
            format!("redefinition of symbol {}", name)
        };
        self.ctx.diagnostics.error(span, message);
    }

    /// End-of-scope warning; carries no span so in-order emission is
    /// preserved for positioned diagnostics.
    fn unused_value(&mut self, name: &str) {
        let message = match &self.current_function {
            Some(function) => format!("unused variable {} in function {}", name, function),
            None => format!("unused variable {}", name),
        };
        self.ctx
            .diagnostics
            .push(crate::diagnostic::Diagnostic::warning(message));
    }

    fn uninitialized_value(&mut self, name: &str, span: Span) {
        let message = match &self.current_function {
            Some(function) => {
                format!("using uninitialized variable {} in function {}", name, function)
            }
            None => format!("using uninitialized variable {}", name),
        };
        self.ctx.diagnostics.warning(span, message);
    }

    // ========================================================================
    // Program and procedure scopes
    // ========================================================================

    fn check_program(&mut self, program: &Program) {
        // Table of global variables.
        for global in &program.globals {
            self.declare_global(global);
        }

        // Declarations come first since functions might call each
        // other recursively.
        for procedure in &program.procedures {
            self.declare_procedure(procedure);
        }

        for procedure in &program.procedures {
            self.check_procedure(procedure);
        }

        self.locals.clear();
        self.local_order.clear();
        self.current_function = None;
        self.check_instr(&program.main);

        for name in std::mem::take(&mut self.global_order) {
            if !self.globals[&name].used {
                self.unused_value(&name);
            }
        }
    }

    fn declare_global(&mut self, binding: &Binding) {
        if RESERVED.contains(&binding.name.as_str()) || self.globals.contains_key(&binding.name) {
            self.redefined_symbol(&binding.name, binding.name_span);
            return;
        }

        self.globals.insert(
            binding.name.clone(),
            VarInfo {
                ty: binding.ty.ty,
                initialized: false,
                used: false,
            },
        );
        self.global_order.push(binding.name.clone());
    }

    fn declare_procedure(&mut self, procedure: &Procedure) {
        if RESERVED.contains(&procedure.name.as_str())
            || self.procedures.contains_key(&procedure.name)
            || self.globals.contains_key(&procedure.name)
        {
            self.redefined_symbol(&procedure.name, procedure.name_span);
            return;
        }

        self.procedures.insert(
            procedure.name.clone(),
            Signature {
                formals: procedure
                    .formals
                    .iter()
                    .map(|f| (f.name.clone(), f.ty.ty))
                    .collect(),
                result: procedure.result.map(|r| r.ty),
            },
        );
    }

    fn check_procedure(&mut self, procedure: &Procedure) {
        self.locals.clear();
        self.local_order.clear();
        self.current_function = Some(procedure.name.clone());

        // The function's own name is the return slot.
        if let Some(result) = &procedure.result {
            self.locals.insert(
                procedure.name.clone(),
                VarInfo {
                    ty: result.ty,
                    initialized: false,
                    used: false,
                },
            );
        }

        // Formals are initialized by the caller.
        for formal in &procedure.formals {
            self.declare_local(formal, true);
        }

        for local in &procedure.locals {
            self.declare_local(local, false);
        }

        self.check_instr(&procedure.body);

        for name in std::mem::take(&mut self.local_order) {
            // The return slot is exempt, e.g. functions returning a
            // constant value.
            if name == procedure.name {
                continue;
            }
            if !self.locals[&name].used {
                self.unused_value(&name);
            }
        }
    }

    fn declare_local(&mut self, binding: &Binding, initialized: bool) {
        if RESERVED.contains(&binding.name.as_str()) || self.locals.contains_key(&binding.name) {
            self.redefined_symbol(&binding.name, binding.name_span);
            return;
        }

        self.locals.insert(
            binding.name.clone(),
            VarInfo {
                ty: binding.ty.ty,
                initialized,
                used: false,
            },
        );
        self.local_order.push(binding.name.clone());
    }

    // ========================================================================
    // Instructions
    // ========================================================================

    fn check_instr(&mut self, instr: &Instr) {
        match &instr.kind {
            InstrKind::ProcCall { callee, args } => {
                self.check_procedure_call(callee, args, instr.span)
            }

            InstrKind::VarAssign { name, value } => {
                let value_ty = self.infer_expr(value);

                let var = match self.locals.get_mut(name) {
                    Some(info) => {
                        info.initialized = true;
                        Some(info.ty)
                    }
                    None => match self.globals.get_mut(name) {
                        Some(info) => {
                            info.initialized = true;
                            Some(info.ty)
                        }
                        None => {
                            self.undefined_symbol(name, instr.span);
                            None
                        }
                    },
                };

                if let Some(var_ty) = var {
                    if value_ty != var_ty {
                        self.wrong_type(value_ty, var_ty, value.span);
                    }
                }
            }

            InstrKind::ArrayAssign { target, value } => {
                let ExprKind::ArrayAccess { array, index } = &target.kind else {
                    unreachable!("parser only builds array assignments from array accesses");
                };

                let index_ty = self.infer_expr(index);
                if index_ty != Ty::INTEGER {
                    self.wrong_type(index_ty, Ty::INTEGER, index.span);
                }

                let array_ty = self.infer_expr(array);
                let element_ty = self.element_type(array, array_ty, target.span);

                let value_ty = self.infer_expr(value);
                if let Some(element_ty) = element_ty {
                    if value_ty != element_ty {
                        self.wrong_type(value_ty, element_ty, value.span);
                    }
                }
            }

            InstrKind::Sequence(instructions) => {
                for instruction in instructions {
                    self.check_instr(instruction);
                }
            }

            InstrKind::If {
                cond,
                then_branch,
                else_branch,
            } => {
                let cond_ty = self.infer_expr(cond);
                if cond_ty != Ty::BOOLEAN {
                    self.wrong_type(cond_ty, Ty::BOOLEAN, cond.span);
                }

                self.check_instr(then_branch);
                if let Some(else_branch) = else_branch {
                    self.check_instr(else_branch);
                }
            }

            InstrKind::While { cond, body } => {
                let cond_ty = self.infer_expr(cond);
                if cond_ty != Ty::BOOLEAN {
                    self.wrong_type(cond_ty, Ty::BOOLEAN, cond.span);
                }

                self.check_instr(body);
            }
        }
    }

    fn check_procedure_call(&mut self, callee: &str, args: &[Expr], span: Span) {
        // Built-in procedures take a single integer.
        if callee == "write" || callee == "writeln" {
            if args.len() != 1 {
                self.invalid_arity(callee, span);
            }

            for arg in args {
                let arg_ty = self.infer_expr(arg);
                if arg_ty != Ty::INTEGER {
                    self.wrong_type(arg_ty, Ty::INTEGER, arg.span);
                }
            }
            return;
        }

        // A function whose value is discarded is an error, and readln
        // is a function.
        if callee == "readln" {
            self.invalid_call(callee, span);
            return;
        }

        let Some(signature) = self.procedures.get(callee).cloned() else {
            self.undefined_symbol(callee, span);
            for arg in args {
                self.infer_expr(arg);
            }
            return;
        };

        if signature.result.is_some() {
            self.invalid_call(callee, span);
        }

        self.check_actuals(callee, &signature, args, span);
    }

    fn check_actuals(&mut self, callee: &str, signature: &Signature, args: &[Expr], span: Span) {
        if args.len() != signature.formals.len() {
            self.invalid_arity(callee, span);
            for arg in args {
                self.infer_expr(arg);
            }
            return;
        }

        for (arg, (_, formal_ty)) in args.iter().zip(&signature.formals) {
            let arg_ty = self.infer_expr(arg);
            if arg_ty != *formal_ty {
                self.wrong_type(arg_ty, *formal_ty, arg.span);
            }
        }
    }

    // ========================================================================
    // Expressions
    // ========================================================================

    /// Infer the type of an expression, reporting violations on the
    /// way. On a failure a plausible type is returned so one walk can
    /// keep collecting diagnostics.
    fn infer_expr(&mut self, expr: &Expr) -> Ty {
        match &expr.kind {
            ExprKind::ConstBool(_) => Ty::BOOLEAN,
            ExprKind::ConstInt(_) => Ty::INTEGER,

            ExprKind::VarAccess(name) => {
                if let Some(info) = self.locals.get_mut(name) {
                    info.used = true;
                    let (ty, initialized) = (info.ty, info.initialized);
                    if !initialized {
                        self.uninitialized_value(name, expr.span);
                    }
                    ty
                } else if let Some(info) = self.globals.get_mut(name) {
                    info.used = true;
                    let (ty, initialized) = (info.ty, info.initialized);
                    // Inside a procedure the call order is unknown, so
                    // only reads from the main body are flagged.
                    if !initialized && self.current_function.is_none() {
                        self.uninitialized_value(name, expr.span);
                    }
                    ty
                } else {
                    self.undefined_symbol(name, expr.span);
                    Ty::INTEGER
                }
            }

            ExprKind::Unary { op, operand } => {
                let operand_ty = self.infer_expr(operand);
                let expected = match op {
                    UnaryOp::Minus => Ty::INTEGER,
                    UnaryOp::Not => Ty::BOOLEAN,
                };
                if operand_ty != expected {
                    self.wrong_type(operand_ty, expected, operand.span);
                }
                expected
            }

            ExprKind::Binary { op, lhs, rhs } => {
                let lhs_ty = self.infer_expr(lhs);
                let rhs_ty = self.infer_expr(rhs);

                match op {
                    BinOp::Add | BinOp::Sub | BinOp::Mul | BinOp::Div => {
                        if lhs_ty != Ty::INTEGER {
                            self.wrong_type(lhs_ty, Ty::INTEGER, lhs.span);
                        }
                        if rhs_ty != lhs_ty {
                            self.wrong_type(rhs_ty, lhs_ty, rhs.span);
                        }
                        Ty::INTEGER
                    }

                    BinOp::LessThan | BinOp::LessEqual | BinOp::GreaterThan | BinOp::GreaterEqual => {
                        if lhs_ty != Ty::INTEGER {
                            self.wrong_type(lhs_ty, Ty::INTEGER, lhs.span);
                        }
                        if rhs_ty != lhs_ty {
                            self.wrong_type(rhs_ty, lhs_ty, rhs.span);
                        }
                        Ty::BOOLEAN
                    }

                    BinOp::And | BinOp::Or => {
                        if lhs_ty != Ty::BOOLEAN {
                            self.wrong_type(lhs_ty, Ty::BOOLEAN, lhs.span);
                        }
                        if rhs_ty != lhs_ty {
                            self.wrong_type(rhs_ty, lhs_ty, rhs.span);
                        }
                        Ty::BOOLEAN
                    }

                    // Equality is defined at every type, but both
                    // operands must share one handle.
                    BinOp::Equal | BinOp::NotEqual => {
                        if rhs_ty != lhs_ty {
                            self.wrong_type(rhs_ty, lhs_ty, rhs.span);
                        }
                        Ty::BOOLEAN
                    }
                }
            }

            ExprKind::Call { callee, args } => self.infer_function_call(callee, args, expr.span),

            ExprKind::ArrayAccess { array, index } => {
                let index_ty = self.infer_expr(index);
                if index_ty != Ty::INTEGER {
                    self.wrong_type(index_ty, Ty::INTEGER, index.span);
                }

                let array_ty = self.infer_expr(array);
                match self.element_type(array, array_ty, expr.span) {
                    Some(element_ty) => element_ty,
                    None => {
                        let kind = self.ctx.types.kind(array_ty);
                        self.ctx.types.get(kind, 0)
                    }
                }
            }

            ExprKind::ArrayAlloc { elem, count } => {
                let count_ty = self.infer_expr(count);
                if count_ty != Ty::INTEGER {
                    self.wrong_type(count_ty, Ty::INTEGER, count.span);
                }

                self.ctx.types.increase_dimension(elem.ty)
            }
        }
    }

    fn infer_function_call(&mut self, callee: &str, args: &[Expr], span: Span) -> Ty {
        // Built-in procedures yield no value.
        if callee == "write" || callee == "writeln" {
            self.invalid_call(callee, span);
            for arg in args {
                self.infer_expr(arg);
            }
            return Ty::INTEGER;
        }

        if callee == "readln" {
            if !args.is_empty() {
                self.invalid_arity(callee, span);
                for arg in args {
                    self.infer_expr(arg);
                }
            }
            return Ty::INTEGER;
        }

        let Some(signature) = self.procedures.get(callee).cloned() else {
            self.undefined_symbol(callee, span);
            for arg in args {
                self.infer_expr(arg);
            }
            return Ty::INTEGER;
        };

        // Calling a procedure as a function is an error.
        if signature.result.is_none() {
            self.invalid_call(callee, span);
        }

        self.check_actuals(callee, &signature, args, span);

        signature.result.unwrap_or(Ty::INTEGER)
    }

    /// Element type of an indexed array expression, or `None` (with a
    /// diagnostic) when the indexed value is a scalar.
    fn element_type(&mut self, array: &Expr, array_ty: Ty, span: Span) -> Option<Ty> {
        let dimension = self.ctx.types.dimension(array_ty);
        if dimension == 0 {
            let description = self.ctx.describe_ty(array_ty);
            let message = match &array.kind {
                ExprKind::VarAccess(name) => {
                    format!("cannot index {} of type {}", name, description)
                }
                _ => format!("cannot index expression of type {}", description),
            };
            self.ctx.diagnostics.error(span, message);
            return None;
        }

        let kind = self.ctx.types.kind(array_ty);
        Some(self.ctx.types.get(kind, dimension - 1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostic::Severity;
    use crate::syntax::{lexer, parser};

    fn analyze(source: &str) -> (Result<(), CompileError>, Context) {
        let mut ctx = Context::new();
        let id = ctx.source_map.add_inline(source);
        let tokens = lexer::lex(source, id, &mut ctx.diagnostics).expect("lexing failed");
        let program =
            parser::parse(tokens, source, &mut ctx.types, &mut ctx.diagnostics).expect("parse failed");
        let result = check(&program, &mut ctx);
        (result, ctx)
    }

    fn errors(ctx: &Context) -> Vec<String> {
        ctx.diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Error)
            .map(|d| d.message.clone())
            .collect()
    }

    fn warnings(ctx: &Context) -> Vec<String> {
        ctx.diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Warning)
            .map(|d| d.message.clone())
            .collect()
    }

    #[test]
    fn test_hello_world_checks() {
        let (result, ctx) = analyze("program begin writeln(42) end.");
        assert!(result.is_ok());
        assert!(!ctx.has_errors());
    }

    #[test]
    fn test_mutual_recursion_checks() {
        let (result, _) = analyze(
            "program\n\
             function even(n : integer) : boolean;\n\
             begin if n = 0 then even := true else even := odd(n - 1) end;\n\
             function odd(n : integer) : boolean;\n\
             begin if n = 0 then odd := false else odd := even(n - 1) end;\n\
             begin if even(10) then writeln(1) else writeln(0) end.",
        );
        assert!(result.is_ok());
    }

    #[test]
    fn test_indexing_scalar_is_reported() {
        let (result, ctx) = analyze("program var x : integer; begin x[0] := 1 end.");
        assert!(matches!(result, Err(CompileError::Type)));
        let errors = errors(&ctx);
        assert!(errors.iter().any(|m| m.contains("cannot index x of type int[0]")));
    }

    #[test]
    fn test_builtin_arity_is_reported() {
        let (result, ctx) = analyze("program begin writeln(1, 2) end.");
        assert!(matches!(result, Err(CompileError::Type)));
        assert!(errors(&ctx)
            .iter()
            .any(|m| m.contains("wrong number of arguments in call to writeln")));
    }

    #[test]
    fn test_builtin_argument_type() {
        let (result, ctx) = analyze("program begin writeln(true) end.");
        assert!(result.is_err());
        assert!(errors(&ctx)
            .iter()
            .any(|m| m.contains("unexpected type bool[0] instead of int[0]")));
    }

    #[test]
    fn test_assignment_type_mismatch() {
        let (result, ctx) = analyze("program var x : integer; begin x := true end.");
        assert!(result.is_err());
        assert!(errors(&ctx)
            .iter()
            .any(|m| m.contains("unexpected type bool[0] instead of int[0]")));
    }

    #[test]
    fn test_condition_must_be_boolean() {
        let (result, ctx) = analyze("program begin if 1 then writeln(1) end.");
        assert!(result.is_err());
        assert!(errors(&ctx)
            .iter()
            .any(|m| m.contains("unexpected type int[0] instead of bool[0]")));
    }

    #[test]
    fn test_equality_requires_same_handle() {
        let (result, _) = analyze(
            "program var a : array of integer; b : array of integer;\n\
             begin a := new integer[1]; b := a;\n\
             if a = b then writeln(1) end.",
        );
        assert!(result.is_ok());

        let (result, ctx) =
            analyze("program var a : array of integer; begin if a = 1 then writeln(1) end.");
        assert!(result.is_err());
        assert!(errors(&ctx)
            .iter()
            .any(|m| m.contains("unexpected type int[0] instead of int[1]")));
    }

    #[test]
    fn test_procedure_called_as_function_is_reported() {
        let (result, ctx) = analyze(
            "program var x : integer;\n\
             procedure p();\n\
             begin writeln(1) end;\n\
             begin x := p() end.",
        );
        assert!(matches!(result, Err(CompileError::Type)));
        assert!(errors(&ctx)
            .iter()
            .any(|m| m.contains("invalid call to procedure or function p")));
    }

    #[test]
    fn test_function_used_as_instruction_is_reported() {
        let (result, ctx) = analyze(
            "program\n\
             function f() : integer;\n\
             begin f := 1 end;\n\
             begin f() end.",
        );
        assert!(result.is_err());
        assert!(errors(&ctx)
            .iter()
            .any(|m| m.contains("invalid call to procedure or function f")));
    }

    #[test]
    fn test_readln_in_both_positions() {
        let (result, _) =
            analyze("program var x : integer; begin x := readln() end.");
        assert!(result.is_ok());

        let (result, ctx) = analyze("program begin readln() end.");
        assert!(result.is_err());
        assert!(errors(&ctx)
            .iter()
            .any(|m| m.contains("invalid call to procedure or function readln")));
    }

    #[test]
    fn test_redefinitions_are_reported() {
        let (_, ctx) = analyze(
            "program var x : integer; x : boolean;\n\
             procedure x();\n\
             begin end;\n\
             procedure q(a : integer; a : boolean);\n\
             begin end;\n\
             begin end.",
        );
        let errors = errors(&ctx);
        assert!(errors.iter().filter(|m| m.contains("redefinition of symbol x")).count() >= 2);
        assert!(errors.iter().any(|m| m.contains("redefinition of symbol a")));
    }

    #[test]
    fn test_reserved_names_cannot_be_redefined() {
        let (result, ctx) = analyze(
            "program var writeln : integer;\n\
             procedure readln();\n\
             begin end;\n\
             begin end.",
        );
        assert!(result.is_err());
        let errors = errors(&ctx);
        assert!(errors.iter().any(|m| m.contains("redefinition of built-in symbol writeln")));
        assert!(errors.iter().any(|m| m.contains("redefinition of built-in symbol readln")));
    }

    #[test]
    fn test_undefined_symbol() {
        let (result, ctx) = analyze("program begin x := 1 end.");
        assert!(result.is_err());
        assert!(errors(&ctx).iter().any(|m| m.contains("undefined symbol x")));
    }

    #[test]
    fn test_arity_mismatch_on_user_function() {
        let (result, ctx) = analyze(
            "program var x : integer;\n\
             function f(a : integer) : integer;\n\
             begin f := a end;\n\
             begin x := f(1, 2) end.",
        );
        assert!(result.is_err());
        assert!(errors(&ctx)
            .iter()
            .any(|m| m.contains("wrong number of arguments in call to f")));
    }

    #[test]
    fn test_unused_variable_warning() {
        let (result, ctx) = analyze(
            "program var used : integer; unused : integer;\n\
             begin used := 1; writeln(used) end.",
        );
        assert!(result.is_ok());
        assert!(warnings(&ctx).iter().any(|m| m.contains("unused variable unused")));
        assert!(!warnings(&ctx).iter().any(|m| m.contains("unused variable used")));
    }

    #[test]
    fn test_unused_local_names_enclosing_function() {
        let (result, ctx) = analyze(
            "program\n\
             procedure p();\n\
             var t : integer;\n\
             begin writeln(1) end;\n\
             begin p() end.",
        );
        assert!(result.is_ok());
        assert!(warnings(&ctx)
            .iter()
            .any(|m| m.contains("unused variable t in function p")));
    }

    #[test]
    fn test_uninitialized_read_warns() {
        let (result, ctx) = analyze("program var x : integer; begin writeln(x) end.");
        assert!(result.is_ok());
        assert!(warnings(&ctx)
            .iter()
            .any(|m| m.contains("using uninitialized variable x")));
    }

    #[test]
    fn test_initialized_before_read_does_not_warn() {
        let (_, ctx) = analyze("program var x : integer; begin x := 1; writeln(x) end.");
        assert!(!warnings(&ctx).iter().any(|m| m.contains("uninitialized")));
    }

    #[test]
    fn test_formals_count_as_initialized() {
        let (_, ctx) = analyze(
            "program\n\
             procedure p(n : integer);\n\
             begin writeln(n) end;\n\
             begin p(3) end.",
        );
        assert!(!warnings(&ctx).iter().any(|m| m.contains("uninitialized")));
    }

    #[test]
    fn test_analysis_is_idempotent() {
        let source = "program var x : integer; a : array of boolean;\n\
                      begin x := true; a[x] := 1; writeln(z) end.";

        let mut ctx = Context::new();
        let id = ctx.source_map.add_inline(source);
        let tokens = lexer::lex(source, id, &mut ctx.diagnostics).unwrap();
        let program = parser::parse(tokens, source, &mut ctx.types, &mut ctx.diagnostics).unwrap();

        let _ = check(&program, &mut ctx);
        let first: Vec<_> = ctx.diagnostics.iter().cloned().collect();

        let _ = check(&program, &mut ctx);
        let all: Vec<_> = ctx.diagnostics.iter().cloned().collect();
        let second = &all[first.len()..];

        assert_eq!(first.len(), second.len());
        for (a, b) in first.iter().zip(second.iter()) {
            assert_eq!(a, b);
        }
    }

    #[test]
    fn test_allocation_count_must_be_integer() {
        let (result, ctx) =
            analyze("program var a : array of integer; begin a := new integer[true] end.");
        assert!(result.is_err());
        assert!(errors(&ctx)
            .iter()
            .any(|m| m.contains("unexpected type bool[0] instead of int[0]")));
    }

    #[test]
    fn test_allocation_dimension_mismatch() {
        let (result, ctx) =
            analyze("program var a : array of array of integer; begin a := new integer[3] end.");
        assert!(result.is_err());
        assert!(errors(&ctx)
            .iter()
            .any(|m| m.contains("unexpected type int[1] instead of int[2]")));
    }
}

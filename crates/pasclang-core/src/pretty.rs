//! Source formatting from the AST.
//!
//! Reprints a parsed program in a canonical layout: four-space
//! indentation, one instruction per line, and fully parenthesized
//! compound expressions. The output is valid source; reparsing it
//! yields the same tree up to locations.

use std::fmt::Write;

use crate::context::Context;
use crate::syntax::ast::{BinOp, Binding, Expr, ExprKind, Instr, InstrKind, Program, UnaryOp};
use crate::types::{Ty, TypeKind};

/// Render a program back to source text.
pub fn pretty(program: &Program, ctx: &Context) -> String {
    let mut printer = Printer {
        ctx,
        buffer: String::new(),
        indentation: 0,
    };
    printer.program(program);
    printer.buffer
}

struct Printer<'a> {
    ctx: &'a Context,
    buffer: String,
    indentation: usize,
}

impl Printer<'_> {
    fn indent(&mut self) {
        for _ in 0..self.indentation {
            self.buffer.push_str("    ");
        }
    }

    fn ty(&mut self, ty: Ty) {
        for _ in 0..self.ctx.types.dimension(ty) {
            self.buffer.push_str("array of ");
        }
        match self.ctx.types.kind(ty) {
            TypeKind::Integer => self.buffer.push_str("integer"),
            TypeKind::Boolean => self.buffer.push_str("boolean"),
        }
    }

    fn var_block(&mut self, bindings: &[Binding]) {
        if bindings.is_empty() {
            return;
        }

        self.buffer.push_str("var\n");
        self.indentation += 1;
        for binding in bindings {
            self.indent();
            let _ = write!(self.buffer, "{} : ", binding.name);
            self.ty(binding.ty.ty);
            self.buffer.push_str(";\n");
        }
        self.indentation -= 1;
    }

    fn program(&mut self, program: &Program) {
        self.buffer.push_str("program\n");
        self.var_block(&program.globals);
        self.buffer.push('\n');

        for procedure in &program.procedures {
            let keyword = if procedure.result.is_some() {
                "function"
            } else {
                "procedure"
            };
            let _ = write!(self.buffer, "{} {}(", keyword, procedure.name);

            for (i, formal) in procedure.formals.iter().enumerate() {
                if i > 0 {
                    self.buffer.push_str(" ; ");
                }
                let _ = write!(self.buffer, "{} : ", formal.name);
                self.ty(formal.ty.ty);
            }
            self.buffer.push(')');

            if let Some(result) = &procedure.result {
                self.buffer.push_str(" : ");
                self.ty(result.ty);
            }
            self.buffer.push_str(";\n");

            self.var_block(&procedure.locals);
            self.instr(&procedure.body);
            self.buffer.push_str(";\n\n");
        }

        self.instr(&program.main);
        self.buffer.push_str(".\n");
    }

    fn instr(&mut self, instr: &Instr) {
        match &instr.kind {
            InstrKind::Sequence(instructions) => {
                self.indent();
                self.buffer.push_str("begin\n");
                self.indentation += 1;
                for (i, instruction) in instructions.iter().enumerate() {
                    self.instr(instruction);
                    if i + 1 < instructions.len() {
                        self.buffer.push(';');
                    }
                    self.buffer.push('\n');
                }
                self.indentation -= 1;
                self.indent();
                self.buffer.push_str("end");
            }

            InstrKind::ProcCall { callee, args } => {
                self.indent();
                let _ = write!(self.buffer, "{}(", callee);
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        self.buffer.push_str(", ");
                    }
                    self.expr(arg);
                }
                self.buffer.push(')');
            }

            InstrKind::VarAssign { name, value } => {
                self.indent();
                let _ = write!(self.buffer, "{} := ", name);
                self.expr(value);
            }

            InstrKind::ArrayAssign { target, value } => {
                self.indent();
                self.expr(target);
                self.buffer.push_str(" := ");
                self.expr(value);
            }

            InstrKind::If {
                cond,
                then_branch,
                else_branch,
            } => {
                self.indent();
                self.buffer.push_str("if ");
                self.expr(cond);
                self.buffer.push_str(" then\n");
                self.indentation += 1;
                self.instr(then_branch);
                self.indentation -= 1;

                if let Some(else_branch) = else_branch {
                    self.buffer.push('\n');
                    self.indent();
                    self.buffer.push_str("else\n");
                    self.indentation += 1;
                    self.instr(else_branch);
                    self.indentation -= 1;
                }
            }

            InstrKind::While { cond, body } => {
                self.indent();
                self.buffer.push_str("while ");
                self.expr(cond);
                self.buffer.push_str(" do\n");
                self.indentation += 1;
                self.instr(body);
                self.indentation -= 1;
            }
        }
    }

    fn expr(&mut self, expr: &Expr) {
        match &expr.kind {
            ExprKind::ConstBool(true) => self.buffer.push_str("true"),
            ExprKind::ConstBool(false) => self.buffer.push_str("false"),
            ExprKind::ConstInt(value) => {
                let _ = write!(self.buffer, "{}", value);
            }
            ExprKind::VarAccess(name) => self.buffer.push_str(name),

            ExprKind::Unary { op, operand } => {
                self.buffer.push('(');
                match op {
                    UnaryOp::Minus => self.buffer.push('-'),
                    UnaryOp::Not => self.buffer.push_str("not "),
                }
                self.expr(operand);
                self.buffer.push(')');
            }

            ExprKind::Binary { op, lhs, rhs } => {
                self.buffer.push('(');
                self.expr(lhs);
                let symbol = match op {
                    BinOp::Add => " + ",
                    BinOp::Sub => " - ",
                    BinOp::Mul => " * ",
                    BinOp::Div => " / ",
                    BinOp::LessThan => " < ",
                    BinOp::LessEqual => " <= ",
                    BinOp::GreaterThan => " > ",
                    BinOp::GreaterEqual => " >= ",
                    BinOp::Equal => " = ",
                    BinOp::NotEqual => " <> ",
                    BinOp::And => " and ",
                    BinOp::Or => " or ",
                };
                self.buffer.push_str(symbol);
                self.expr(rhs);
                self.buffer.push(')');
            }

            ExprKind::Call { callee, args } => {
                let _ = write!(self.buffer, "{}(", callee);
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        self.buffer.push_str(", ");
                    }
                    self.expr(arg);
                }
                self.buffer.push(')');
            }

            ExprKind::ArrayAccess { array, index } => {
                self.expr(array);
                self.buffer.push('[');
                self.expr(index);
                self.buffer.push(']');
            }

            ExprKind::ArrayAlloc { elem, count } => {
                self.buffer.push_str("new ");
                self.ty(elem.ty);
                self.buffer.push('[');
                self.expr(count);
                self.buffer.push(']');
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::{lexer, parser};

    fn parse_with(ctx: &mut Context, source: &str) -> Program {
        let id = ctx.source_map.add_inline(source);
        let tokens = lexer::lex(source, id, &mut ctx.diagnostics).expect("lexing failed");
        parser::parse(tokens, source, &mut ctx.types, &mut ctx.diagnostics).expect("parse failed")
    }

    #[test]
    fn test_pretty_spells_full_type_keywords() {
        let mut ctx = Context::new();
        let program = parse_with(
            &mut ctx,
            "program var a : array of array of boolean; begin end.",
        );
        let printed = pretty(&program, &ctx);
        assert!(printed.contains("a : array of array of boolean;"));
    }

    #[test]
    fn test_round_trip_is_stable() {
        let source = "program\n\
                      var x : integer; a : array of integer;\n\
                      function fact(n : integer) : integer;\n\
                      begin\n\
                      if n <= 1 then fact := 1\n\
                      else fact := n * fact(n - 1)\n\
                      end;\n\
                      begin\n\
                      x := readln();\n\
                      a := new integer[x + 1];\n\
                      a[0] := fact(x);\n\
                      while x > 0 do begin writeln(a[0]); x := x - 1 end;\n\
                      if (x = 0) and (a[0] <> 1) then writeln(0) else writeln(-1)\n\
                      end.";

        let mut ctx = Context::new();
        let program = parse_with(&mut ctx, source);
        let printed = pretty(&program, &ctx);

        let reparsed = parse_with(&mut ctx, &printed);
        let reprinted = pretty(&reparsed, &ctx);

        assert_eq!(printed, reprinted);
    }

    #[test]
    fn test_round_trip_preserves_structure() {
        let source = "program begin if 1 + 2 * 3 = 7 then writeln(1) end.";

        let mut ctx = Context::new();
        let program = parse_with(&mut ctx, source);
        let printed = pretty(&program, &ctx);
        assert!(printed.contains("(1 + (2 * 3))"));

        let reparsed = parse_with(&mut ctx, &printed);
        // Same shape: compare through another print, which is
        // location-insensitive by construction.
        assert_eq!(printed, pretty(&reparsed, &ctx));
    }
}

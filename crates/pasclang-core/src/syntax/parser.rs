//! Hand-written recursive-descent parser.
//!
//! One method per grammar production, in source order. Expression
//! parsing follows the precedence ladder `or < and < not < = <> <
//! relational < additive < multiplicative < unary minus < postfix`;
//! the binary levels are left-associative except equality and
//! relational, which accept a single operator.
//!
//! On an unexpected token the parser reports it (with the expected
//! set, when one is known) and enters panic mode: tokens are consumed
//! until an anchor keyword re-enters a major production, so several
//! syntax errors can be reported in one run. A one-time note warns
//! that reports after the first may be spurious. Once the walk is
//! done, any reported error fails the stage with
//! [`CompileError::Syntax`].

use crate::compiler::CompileError;
use crate::diagnostic::{Diagnostic, Diagnostics};
use crate::source::Span;
use crate::syntax::ast::{
    BinOp, Binding, Expr, ExprKind, Instr, InstrKind, Procedure, Program, TypeNode, UnaryOp,
};
use crate::syntax::token::{Token, TokenKind};
use crate::types::{Ty, TypeInterner};

/// Marker unwound from a production after panic recovery finishes.
struct SyntaxAbort;

type PResult<T> = Result<T, SyntaxAbort>;

/// Parse a token vector into a [`Program`], interning every type.
pub fn parse(
    tokens: Vec<Token>,
    source: &str,
    types: &mut TypeInterner,
    diagnostics: &mut Diagnostics,
) -> Result<Program, CompileError> {
    let mut parser = Parser {
        tokens,
        current: 0,
        source,
        types,
        diagnostics,
        error_happened: false,
    };

    match parser.program() {
        Ok(program) if !parser.error_happened => Ok(program),
        _ => Err(CompileError::Syntax),
    }
}

struct Parser<'a> {
    tokens: Vec<Token>,
    current: usize,
    source: &'a str,
    types: &'a mut TypeInterner,
    diagnostics: &'a mut Diagnostics,
    error_happened: bool,
}

impl Parser<'_> {
    // ========================================================================
    // Token cursor
    // ========================================================================

    fn peek(&self) -> Token {
        self.tokens[self.current]
    }

    fn previous(&self) -> Token {
        self.tokens[self.current - 1]
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.peek().kind == kind
    }

    fn advance(&mut self) {
        // The terminal EndFile token is never consumed.
        if self.current < self.tokens.len() - 1 {
            self.current += 1;
        }
    }

    fn match_kind(&mut self, kind: TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn match_any(&mut self, kinds: &[TokenKind]) -> bool {
        if kinds.contains(&self.peek().kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: &[TokenKind]) -> PResult<Token> {
        if self.match_any(expected) {
            Ok(self.previous())
        } else {
            Err(self.syntax_error(expected))
        }
    }

    fn lexeme(&self, span: Span) -> &str {
        &self.source[span.start..span.end]
    }

    // ========================================================================
    // Error reporting and panic recovery
    // ========================================================================

    /// Report the offending token, then consume tokens re-entering major
    /// productions at their anchor keywords so further errors surface.
    fn syntax_error(&mut self, expected: &[TokenKind]) -> SyntaxAbort {
        let offending = self.peek();

        let mut message = format!("unexpected token {}", offending.kind);
        if !expected.is_empty() {
            message.push_str(" when expecting any of the following: ");
            for (i, kind) in expected.iter().enumerate() {
                if i > 0 {
                    message.push_str(", ");
                }
                message.push_str(&kind.to_string());
            }
        }

        // An unexpected end of file has no sensible line to quote.
        let mut diagnostic = Diagnostic::error(message);
        if offending.kind != TokenKind::EndFile {
            diagnostic = diagnostic.with_span(offending.span);
        }
        self.diagnostics.push(diagnostic);

        if !self.error_happened {
            self.error_happened = true;
            self.diagnostics.note(
                "now looking for additional syntax errors; since the input already \
                 contains an error, some reports may be wrong",
            );
        }

        use TokenKind::*;
        loop {
            match self.peek().kind {
                EndFile => return SyntaxAbort,
                Begin => {
                    let _ = self.sequence();
                }
                If | While => {
                    let _ = self.instruction();
                }
                Do | Then | Else => {
                    self.advance();
                    let _ = self.instruction();
                }
                Assign | LeftPar | LeftBrack => {
                    self.advance();
                    let _ = self.expression();
                }
                Colon => {
                    self.advance();
                    let _ = self.primitive_type();
                }
                New => {
                    let _ = self.expression();
                }
                Function | Procedure => {
                    let _ = self.procedure_decl();
                }
                Var => {
                    self.advance();
                    let _ = self.locals_declarations();
                }
                _ => self.advance(),
            }
        }
    }

    // ========================================================================
    // Declarations
    // ========================================================================

    // program = PROGRAM [VAR declarations] {procedure} sequence DOT
    fn program(&mut self) -> PResult<Program> {
        use TokenKind::*;

        self.expect(&[Program])?;
        let start = self.previous().span;

        let globals = if self.match_kind(Var) {
            self.locals_declarations()?
        } else {
            Vec::new()
        };

        let mut procedures = Vec::new();
        while self.check(Procedure) || self.check(Function) {
            procedures.push(self.procedure_decl()?);
        }

        let main = self.sequence()?;

        self.expect(&[Dot])?;

        Ok(crate::syntax::ast::Program {
            globals,
            procedures,
            main,
            span: start.merge(self.previous().span),
        })
    }

    // declarations = {declaration SEMICOLON}
    fn locals_declarations(&mut self) -> PResult<Vec<Binding>> {
        use TokenKind::*;

        let mut bindings = Vec::new();

        self.expect(&[Identifier])?;
        loop {
            bindings.extend(self.variable_declaration()?);
            self.expect(&[Semicolon])?;
            if !self.match_kind(Identifier) {
                break;
            }
        }

        Ok(bindings)
    }

    // formals = [declaration {SEMICOLON declaration}]
    fn formals_declarations(&mut self) -> PResult<Vec<Binding>> {
        use TokenKind::*;

        let mut bindings = Vec::new();

        if self.match_kind(Identifier) {
            bindings.extend(self.variable_declaration()?);
            while self.match_kind(Semicolon) {
                self.expect(&[Identifier])?;
                bindings.extend(self.variable_declaration()?);
            }
        }

        Ok(bindings)
    }

    // declaration = IDENTIFIER {COMMA IDENTIFIER} COLON type
    //
    // The first identifier has already been consumed. Every introduced
    // name gets its own type node carrying the shared interned handle.
    fn variable_declaration(&mut self) -> PResult<Vec<Binding>> {
        use TokenKind::*;

        let first = self.previous();
        let mut names = vec![(self.lexeme(first.span).to_string(), first.span)];

        while self.match_kind(Comma) {
            let token = self.expect(&[Identifier])?;
            names.push((self.lexeme(token.span).to_string(), token.span));
        }

        self.expect(&[Colon])?;
        let ty = self.primitive_type()?;

        Ok(names
            .into_iter()
            .map(|(name, name_span)| Binding { name, name_span, ty })
            .collect())
    }

    // type = {ARRAY OF} (INTEGER | BOOLEAN)
    fn primitive_type(&mut self) -> PResult<TypeNode> {
        use TokenKind::*;

        self.expect(&[IntType, BoolType, Array])?;
        let start = self.previous().span;

        match self.previous().kind {
            IntType => Ok(TypeNode {
                ty: Ty::INTEGER,
                span: start,
            }),
            BoolType => Ok(TypeNode {
                ty: Ty::BOOLEAN,
                span: start,
            }),
            Array => {
                self.expect(&[Of])?;
                let inner = self.primitive_type()?;
                Ok(TypeNode {
                    ty: self.types.increase_dimension(inner.ty),
                    span: start.merge(inner.span),
                })
            }
            _ => unreachable!(),
        }
    }

    // procedure = (FUNCTION | PROCEDURE) IDENTIFIER LEFTPAR formals RIGHTPAR
    //             [COLON type] SEMICOLON [VAR declarations] sequence SEMICOLON
    fn procedure_decl(&mut self) -> PResult<Procedure> {
        use TokenKind::*;

        self.expect(&[Function, Procedure])?;
        let start = self.previous().span;
        let is_function = self.previous().kind == Function;

        let name_token = self.expect(&[Identifier])?;
        let name = self.lexeme(name_token.span).to_string();

        self.expect(&[LeftPar])?;
        let formals = self.formals_declarations()?;
        self.expect(&[RightPar])?;

        let result = if is_function {
            self.expect(&[Colon])?;
            Some(self.primitive_type()?)
        } else {
            None
        };

        self.expect(&[Semicolon])?;

        let locals = if self.match_kind(Var) {
            self.locals_declarations()?
        } else {
            Vec::new()
        };

        let body = self.sequence()?;
        self.expect(&[Semicolon])?;

        Ok(crate::syntax::ast::Procedure {
            name,
            name_span: name_token.span,
            formals,
            result,
            locals,
            body,
            span: start.merge(self.previous().span),
        })
    }

    // ========================================================================
    // Instructions
    // ========================================================================

    // sequence = BEGIN [instruction {SEMICOLON instruction}] END
    fn sequence(&mut self) -> PResult<Instr> {
        use TokenKind::*;

        self.expect(&[Begin])?;
        let start = self.previous().span;

        let mut instructions = Vec::new();
        if !self.check(End) {
            loop {
                instructions.push(self.instruction()?);
                if !self.match_kind(Semicolon) {
                    break;
                }
            }
        }

        self.expect(&[End])?;

        Ok(Instr {
            kind: InstrKind::Sequence(instructions),
            span: start.merge(self.previous().span),
        })
    }

    // instruction = sequence | condition | repetition
    //             | call | variableassignment | arrayassignment
    fn instruction(&mut self) -> PResult<Instr> {
        use TokenKind::*;

        match self.peek().kind {
            Begin => self.sequence(),
            If => self.condition(),
            While => self.repetition(),
            Identifier => self.instruction_with_identifier(),
            _ => Err(self.syntax_error(&[Begin, If, While, Identifier])),
        }
    }

    // condition = IF expression THEN instruction [ELSE instruction]
    fn condition(&mut self) -> PResult<Instr> {
        use TokenKind::*;

        let start = self.peek().span;

        self.expect(&[If])?;
        let cond = self.expression()?;

        self.expect(&[Then])?;
        let then_branch = self.instruction()?;

        let else_branch = if self.match_kind(Else) {
            Some(Box::new(self.instruction()?))
        } else {
            None
        };

        Ok(Instr {
            kind: InstrKind::If {
                cond: Box::new(cond),
                then_branch: Box::new(then_branch),
                else_branch,
            },
            span: start.merge(self.previous().span),
        })
    }

    // repetition = WHILE expression DO instruction
    fn repetition(&mut self) -> PResult<Instr> {
        use TokenKind::*;

        let start = self.peek().span;

        self.expect(&[While])?;
        let cond = self.expression()?;

        self.expect(&[Do])?;
        let body = self.instruction()?;

        Ok(Instr {
            kind: InstrKind::While {
                cond: Box::new(cond),
                body: Box::new(body),
            },
            span: start.merge(self.previous().span),
        })
    }

    // A leading identifier begins a call, a variable assignment, or an
    // array assignment. The first two are decided by one token of
    // lookahead; otherwise the cursor is rewound and the left-hand side
    // is reparsed through the expression path.
    fn instruction_with_identifier(&mut self) -> PResult<Instr> {
        use TokenKind::*;

        let checkpoint = self.current;
        self.expect(&[Identifier])?;

        match self.peek().kind {
            LeftPar => self.procedure_call(),
            Assign => self.variable_assignment(),
            _ => {
                self.current = checkpoint;
                self.array_assignment()
            }
        }
    }

    // call = IDENTIFIER LEFTPAR actuals RIGHTPAR
    fn procedure_call(&mut self) -> PResult<Instr> {
        use TokenKind::*;

        let name_token = self.previous();
        let callee = self.lexeme(name_token.span).to_string();

        self.expect(&[LeftPar])?;
        let args = self.actuals()?;
        self.expect(&[RightPar])?;

        Ok(Instr {
            kind: InstrKind::ProcCall { callee, args },
            span: name_token.span.merge(self.previous().span),
        })
    }

    // variableassignment = IDENTIFIER ASSIGN expression
    fn variable_assignment(&mut self) -> PResult<Instr> {
        use TokenKind::*;

        let name_token = self.previous();
        let name = self.lexeme(name_token.span).to_string();

        self.expect(&[Assign])?;
        let value = self.expression()?;

        Ok(Instr {
            kind: InstrKind::VarAssign {
                name,
                value: Box::new(value),
            },
            span: name_token.span.merge(self.previous().span),
        })
    }

    // arrayassignment = postfix ASSIGN expression
    //
    // The left-hand side reuses the postfix expression path and must
    // come out as an array access.
    fn array_assignment(&mut self) -> PResult<Instr> {
        use TokenKind::*;

        let start = self.peek().span;

        let target = self.postfix()?;
        if !matches!(target.kind, ExprKind::ArrayAccess { .. }) {
            return Err(self.syntax_error(&[]));
        }

        self.expect(&[Assign])?;
        let value = self.expression()?;

        Ok(Instr {
            kind: InstrKind::ArrayAssign {
                target: Box::new(target),
                value: Box::new(value),
            },
            span: start.merge(self.previous().span),
        })
    }

    // ========================================================================
    // Expressions
    // ========================================================================

    // expression = arrayallocation | logicalor
    fn expression(&mut self) -> PResult<Expr> {
        use TokenKind::*;

        if self.match_kind(New) {
            let start = self.previous().span;
            let elem = self.primitive_type()?;
            self.expect(&[LeftBrack])?;
            let count = self.expression()?;
            self.expect(&[RightBrack])?;

            return Ok(Expr {
                kind: ExprKind::ArrayAlloc {
                    elem,
                    count: Box::new(count),
                },
                span: start.merge(self.previous().span),
            });
        }

        self.logical_or()
    }

    // logicalor = logicaland {OR logicaland}
    fn logical_or(&mut self) -> PResult<Expr> {
        let start = self.peek().span;
        let mut expr = self.logical_and()?;

        while self.match_kind(TokenKind::Or) {
            let rhs = self.logical_and()?;
            expr = self.binary(BinOp::Or, expr, rhs, start);
        }

        Ok(expr)
    }

    // logicaland = logicalunary {AND logicalunary}
    fn logical_and(&mut self) -> PResult<Expr> {
        let start = self.peek().span;
        let mut expr = self.logical_unary()?;

        while self.match_kind(TokenKind::And) {
            let rhs = self.logical_unary()?;
            expr = self.binary(BinOp::And, expr, rhs, start);
        }

        Ok(expr)
    }

    // logicalunary = [NOT] equality
    fn logical_unary(&mut self) -> PResult<Expr> {
        let start = self.peek().span;

        if self.match_kind(TokenKind::Not) {
            let operand = self.equality()?;
            return Ok(Expr {
                span: start.merge(self.previous().span),
                kind: ExprKind::Unary {
                    op: UnaryOp::Not,
                    operand: Box::new(operand),
                },
            });
        }

        self.equality()
    }

    // equality = relational [(EQUAL | NEQUAL) relational]
    fn equality(&mut self) -> PResult<Expr> {
        use TokenKind::*;

        let start = self.peek().span;
        let mut expr = self.relational()?;

        if self.match_any(&[Equal, NotEqual]) {
            let op = match self.previous().kind {
                Equal => BinOp::Equal,
                _ => BinOp::NotEqual,
            };
            let rhs = self.relational()?;
            expr = self.binary(op, expr, rhs, start);
        }

        Ok(expr)
    }

    // relational = additive [(LTHAN | LEQUAL | GTHAN | GEQUAL) additive]
    fn relational(&mut self) -> PResult<Expr> {
        use TokenKind::*;

        let start = self.peek().span;
        let mut expr = self.additive()?;

        if self.match_any(&[LessThan, LessEqual, GreaterThan, GreaterEqual]) {
            let op = match self.previous().kind {
                LessThan => BinOp::LessThan,
                LessEqual => BinOp::LessEqual,
                GreaterThan => BinOp::GreaterThan,
                _ => BinOp::GreaterEqual,
            };
            let rhs = self.additive()?;
            expr = self.binary(op, expr, rhs, start);
        }

        Ok(expr)
    }

    // additive = multiplicative {(PLUS | MINUS) multiplicative}
    fn additive(&mut self) -> PResult<Expr> {
        use TokenKind::*;

        let start = self.peek().span;
        let mut expr = self.multiplicative()?;

        while self.match_any(&[Plus, Minus]) {
            let op = match self.previous().kind {
                Plus => BinOp::Add,
                _ => BinOp::Sub,
            };
            let rhs = self.multiplicative()?;
            expr = self.binary(op, expr, rhs, start);
        }

        Ok(expr)
    }

    // multiplicative = arithmeticunary {(STAR | SLASH) arithmeticunary}
    fn multiplicative(&mut self) -> PResult<Expr> {
        use TokenKind::*;

        let start = self.peek().span;
        let mut expr = self.arithmetic_unary()?;

        while self.match_any(&[Star, Slash]) {
            let op = match self.previous().kind {
                Star => BinOp::Mul,
                _ => BinOp::Div,
            };
            let rhs = self.arithmetic_unary()?;
            expr = self.binary(op, expr, rhs, start);
        }

        Ok(expr)
    }

    // arithmeticunary = [MINUS] postfix
    fn arithmetic_unary(&mut self) -> PResult<Expr> {
        let start = self.peek().span;

        if self.match_kind(TokenKind::Minus) {
            let operand = self.postfix()?;
            return Ok(Expr {
                span: start.merge(self.previous().span),
                kind: ExprKind::Unary {
                    op: UnaryOp::Minus,
                    operand: Box::new(operand),
                },
            });
        }

        self.postfix()
    }

    // postfix = primary {LEFTPAR actuals RIGHTPAR | LEFTBRACK expression RIGHTBRACK}
    //
    // A call applies to a bare name only, so `f(1)(2)` is rejected at
    // the second parenthesis.
    fn postfix(&mut self) -> PResult<Expr> {
        use TokenKind::*;

        let start = self.peek().span;
        let mut expr = self.primary()?;

        loop {
            if self.match_kind(LeftPar) {
                let callee = match expr.kind {
                    ExprKind::VarAccess(name) => name,
                    _ => return Err(self.syntax_error(&[])),
                };
                let args = self.actuals()?;
                self.expect(&[RightPar])?;
                expr = Expr {
                    kind: ExprKind::Call { callee, args },
                    span: start.merge(self.previous().span),
                };
            } else if self.match_kind(LeftBrack) {
                let index = self.expression()?;
                self.expect(&[RightBrack])?;
                expr = Expr {
                    kind: ExprKind::ArrayAccess {
                        array: Box::new(expr),
                        index: Box::new(index),
                    },
                    span: start.merge(self.previous().span),
                };
            } else {
                return Ok(expr);
            }
        }
    }

    // primary = INTLITERAL | BOOLLITERAL | IDENTIFIER | LEFTPAR expression RIGHTPAR
    fn primary(&mut self) -> PResult<Expr> {
        use TokenKind::*;

        let token = self.expect(&[BoolLiteral, IntLiteral, Identifier, LeftPar])?;

        let kind = match token.kind {
            BoolLiteral => ExprKind::ConstBool(self.lexeme(token.span) == "true"),
            IntLiteral => {
                let value = self
                    .lexeme(token.span)
                    .parse()
                    .unwrap_or_else(|_| unreachable!("lexer rejects out-of-range literals"));
                ExprKind::ConstInt(value)
            }
            Identifier => ExprKind::VarAccess(self.lexeme(token.span).to_string()),
            LeftPar => {
                let expr = self.expression()?;
                self.expect(&[RightPar])?;
                return Ok(expr);
            }
            _ => unreachable!(),
        };

        Ok(Expr {
            kind,
            span: token.span,
        })
    }

    // actuals = [expression {COMMA expression}]
    fn actuals(&mut self) -> PResult<Vec<Expr>> {
        let mut args = Vec::new();

        if !self.check(TokenKind::RightPar) {
            loop {
                args.push(self.expression()?);
                if !self.match_kind(TokenKind::Comma) {
                    break;
                }
            }
        }

        Ok(args)
    }

    fn binary(&self, op: BinOp, lhs: Expr, rhs: Expr, start: Span) -> Expr {
        Expr {
            span: start.merge(self.previous().span),
            kind: ExprKind::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Context;
    use crate::syntax::lexer;

    fn parse_ok(source: &str) -> Program {
        let mut ctx = Context::new();
        let id = ctx.source_map.add_inline(source);
        let tokens = lexer::lex(source, id, &mut ctx.diagnostics).expect("lexing failed");
        parse(tokens, source, &mut ctx.types, &mut ctx.diagnostics).expect("parsing failed")
    }

    fn parse_err(source: &str) -> Context {
        let mut ctx = Context::new();
        let id = ctx.source_map.add_inline(source);
        let tokens = lexer::lex(source, id, &mut ctx.diagnostics).expect("lexing failed");
        let result = parse(tokens, source, &mut ctx.types, &mut ctx.diagnostics);
        assert!(matches!(result, Err(CompileError::Syntax)));
        ctx
    }

    #[test]
    fn test_minimal_program() {
        let program = parse_ok("program begin end.");
        assert!(program.globals.is_empty());
        assert!(program.procedures.is_empty());
        assert_eq!(program.main.kind, InstrKind::Sequence(Vec::new()));
    }

    #[test]
    fn test_globals_share_interned_handle() {
        let program = parse_ok("program var a, b : array of integer; c : boolean;\nbegin end.");
        assert_eq!(program.globals.len(), 3);
        assert_eq!(program.globals[0].ty.ty, program.globals[1].ty.ty);
        assert_ne!(program.globals[0].ty.ty, program.globals[2].ty.ty);
        assert_ne!(program.globals[0].name_span, program.globals[1].name_span);
    }

    #[test]
    fn test_procedure_and_function_headers() {
        let program = parse_ok(
            "program\n\
             procedure p(x : integer; y, z : boolean);\n\
             begin end;\n\
             function f() : array of boolean;\n\
             var t : integer;\n\
             begin end;\n\
             begin end.",
        );

        assert_eq!(program.procedures.len(), 2);
        let p = &program.procedures[0];
        assert_eq!(p.name, "p");
        assert_eq!(p.formals.len(), 3);
        assert!(p.result.is_none());

        let f = &program.procedures[1];
        assert_eq!(f.name, "f");
        assert!(f.formals.is_empty());
        assert!(f.result.is_some());
        assert_eq!(f.locals.len(), 1);
    }

    #[test]
    fn test_precedence() {
        let program = parse_ok("program begin x := 1 + 2 * 3 end.");
        let InstrKind::Sequence(instructions) = &program.main.kind else {
            panic!("main is not a sequence");
        };
        let InstrKind::VarAssign { value, .. } = &instructions[0].kind else {
            panic!("expected assignment");
        };
        // 1 + (2 * 3)
        let ExprKind::Binary { op: BinOp::Add, rhs, .. } = &value.kind else {
            panic!("expected addition at the top");
        };
        assert!(matches!(rhs.kind, ExprKind::Binary { op: BinOp::Mul, .. }));
    }

    #[test]
    fn test_left_associative_subtraction() {
        let program = parse_ok("program begin x := 10 - 4 - 3 end.");
        let InstrKind::Sequence(instructions) = &program.main.kind else {
            panic!("main is not a sequence");
        };
        let InstrKind::VarAssign { value, .. } = &instructions[0].kind else {
            panic!("expected assignment");
        };
        // (10 - 4) - 3
        let ExprKind::Binary { op: BinOp::Sub, lhs, .. } = &value.kind else {
            panic!("expected subtraction at the top");
        };
        assert!(matches!(lhs.kind, ExprKind::Binary { op: BinOp::Sub, .. }));
    }

    #[test]
    fn test_array_assignment_lhs() {
        let program = parse_ok("program begin a[0][i + 1] := 7 end.");
        let InstrKind::Sequence(instructions) = &program.main.kind else {
            panic!("main is not a sequence");
        };
        let InstrKind::ArrayAssign { target, .. } = &instructions[0].kind else {
            panic!("expected array assignment");
        };
        let ExprKind::ArrayAccess { array, .. } = &target.kind else {
            panic!("target is not an array access");
        };
        assert!(matches!(array.kind, ExprKind::ArrayAccess { .. }));
    }

    #[test]
    fn test_new_allocation() {
        let program = parse_ok("program begin a := new array of integer[n * 2] end.");
        let InstrKind::Sequence(instructions) = &program.main.kind else {
            panic!("main is not a sequence");
        };
        let InstrKind::VarAssign { value, .. } = &instructions[0].kind else {
            panic!("expected assignment");
        };
        assert!(matches!(value.kind, ExprKind::ArrayAlloc { .. }));
    }

    #[test]
    fn test_if_else_and_while() {
        let program = parse_ok(
            "program begin\n\
             if x < 10 then x := x + 1 else begin x := 0; writeln(x) end;\n\
             while not done do work()\n\
             end.",
        );
        let InstrKind::Sequence(instructions) = &program.main.kind else {
            panic!("main is not a sequence");
        };
        assert!(matches!(instructions[0].kind, InstrKind::If { .. }));
        assert!(matches!(instructions[1].kind, InstrKind::While { .. }));
    }

    #[test]
    fn test_scalar_on_lhs_of_index_assignment_is_accepted_syntactically() {
        // `x[0] := 1` is syntactically fine; rejecting a scalar `x` is
        // the analyzer's job.
        let program = parse_ok("program var x : integer; begin x[0] := 1 end.");
        let InstrKind::Sequence(instructions) = &program.main.kind else {
            panic!("main is not a sequence");
        };
        assert!(matches!(instructions[0].kind, InstrKind::ArrayAssign { .. }));
    }

    #[test]
    fn test_error_reports_expected_set() {
        let ctx = parse_err("program begin x := end.");
        let first = ctx.diagnostics.iter().next().unwrap();
        assert!(first.message.contains("unexpected token end"));
        assert!(first.message.contains("when expecting any of the following"));
    }

    #[test]
    fn test_panic_mode_reports_multiple_errors() {
        let ctx = parse_err(
            "program\n\
             procedure p();\n\
             begin x := end;\n\
             begin y := end.",
        );
        assert!(ctx.diagnostics.error_count() >= 2);
        // The one-time spurious-reports note comes right after the
        // first error.
        let notes: Vec<_> = ctx
            .diagnostics
            .iter()
            .filter(|d| d.severity == crate::diagnostic::Severity::Note)
            .collect();
        assert_eq!(notes.len(), 1);
    }

    #[test]
    fn test_bare_identifier_instruction_is_an_error() {
        let ctx = parse_err("program begin x end.");
        assert!(ctx.diagnostics.has_errors());
    }

    #[test]
    fn test_call_of_call_is_rejected() {
        parse_err("program begin x := f(1)(2) end.");
    }
}

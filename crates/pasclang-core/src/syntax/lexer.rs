//! Lexical analysis.
//!
//! The lexer reduces a source file to the complete token vector,
//! terminated by an [`TokenKind::EndFile`] token. Whitespace and
//! comments are discarded; `{ … }` comments nest. Every token carries
//! the byte span of its lexeme.
//!
//! There is no recovery at this level: an unknown character, an
//! out-of-range integer literal or an unterminated comment reports an
//! error diagnostic and fails the stage with
//! [`CompileError::Lexical`].

use crate::compiler::CompileError;
use crate::diagnostic::Diagnostics;
use crate::source::{SourceId, Span};
use crate::syntax::token::{keyword, Token, TokenKind};

/// Produce the token vector for a whole source.
pub fn lex(
    source: &str,
    source_id: SourceId,
    diagnostics: &mut Diagnostics,
) -> Result<Vec<Token>, CompileError> {
    Lexer {
        src: source.as_bytes(),
        source,
        source_id,
        pos: 0,
        diagnostics,
    }
    .run()
}

struct Lexer<'a> {
    src: &'a [u8],
    source: &'a str,
    source_id: SourceId,
    pos: usize,
    diagnostics: &'a mut Diagnostics,
}

impl Lexer<'_> {
    fn run(mut self) -> Result<Vec<Token>, CompileError> {
        let mut tokens = Vec::new();

        loop {
            self.skip_trivia()?;

            let start = self.pos;
            let Some(byte) = self.peek() else {
                tokens.push(Token::new(TokenKind::EndFile, self.span_from(start)));
                return Ok(tokens);
            };

            let kind = match byte {
                b'(' => self.single(TokenKind::LeftPar),
                b')' => self.single(TokenKind::RightPar),
                b'[' => self.single(TokenKind::LeftBrack),
                b']' => self.single(TokenKind::RightBrack),
                b'.' => self.single(TokenKind::Dot),
                b';' => self.single(TokenKind::Semicolon),
                b',' => self.single(TokenKind::Comma),
                b'+' => self.single(TokenKind::Plus),
                b'-' => self.single(TokenKind::Minus),
                b'*' => self.single(TokenKind::Star),
                b'/' => self.single(TokenKind::Slash),
                b'=' => self.single(TokenKind::Equal),

                // Digraphs consume their second character only when it
                // matches; the leading character stands alone otherwise.
                b':' => {
                    self.advance();
                    if self.peek() == Some(b'=') {
                        self.advance();
                        TokenKind::Assign
                    } else {
                        TokenKind::Colon
                    }
                }
                b'<' => {
                    self.advance();
                    match self.peek() {
                        Some(b'=') => {
                            self.advance();
                            TokenKind::LessEqual
                        }
                        Some(b'>') => {
                            self.advance();
                            TokenKind::NotEqual
                        }
                        _ => TokenKind::LessThan,
                    }
                }
                b'>' => {
                    self.advance();
                    if self.peek() == Some(b'=') {
                        self.advance();
                        TokenKind::GreaterEqual
                    } else {
                        TokenKind::GreaterThan
                    }
                }

                b'0'..=b'9' => self.integer_literal(start)?,
                b'a'..=b'z' | b'A'..=b'Z' => self.word(),

                _ => {
                    // Decode the full character for the report.
                    let bad = self.source[start..].chars().next().unwrap_or('?');
                    self.diagnostics.error(
                        Span::new(self.source_id, start, start + bad.len_utf8()),
                        format!("bad character {:?} in input stream", bad),
                    );
                    return Err(CompileError::Lexical);
                }
            };

            tokens.push(Token::new(kind, self.span_from(start)));
        }
    }

    /// Skip whitespace and (possibly nested) comments.
    fn skip_trivia(&mut self) -> Result<(), CompileError> {
        loop {
            match self.peek() {
                Some(b' ' | b'\t' | b'\r' | b'\n') => self.advance(),
                Some(b'{') => self.comment()?,
                _ => return Ok(()),
            }
        }
    }

    /// Consume one `{ … }` comment, counting brace depth.
    fn comment(&mut self) -> Result<(), CompileError> {
        let start = self.pos;
        self.advance();
        let mut depth = 1u32;

        while depth > 0 {
            match self.peek() {
                Some(b'{') => depth += 1,
                Some(b'}') => depth -= 1,
                Some(_) => {}
                None => {
                    self.diagnostics.error(
                        self.span_from(start),
                        "unterminated comment at end of file",
                    );
                    return Err(CompileError::Lexical);
                }
            }
            self.advance();
        }

        Ok(())
    }

    fn integer_literal(&mut self, start: usize) -> Result<TokenKind, CompileError> {
        while matches!(self.peek(), Some(b'0'..=b'9')) {
            self.advance();
        }

        let lexeme = &self.source[start..self.pos];
        if lexeme.parse::<i32>().is_err() {
            self.diagnostics.error(
                self.span_from(start),
                format!(
                    "integer literal overflow, valid range is [0, {}]",
                    i32::MAX
                ),
            );
            return Err(CompileError::Lexical);
        }

        Ok(TokenKind::IntLiteral)
    }

    fn word(&mut self) -> TokenKind {
        let start = self.pos;
        while matches!(self.peek(), Some(b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9')) {
            self.advance();
        }

        keyword(&self.source[start..self.pos]).unwrap_or(TokenKind::Identifier)
    }

    fn single(&mut self, kind: TokenKind) -> TokenKind {
        self.advance();
        kind
    }

    fn peek(&self) -> Option<u8> {
        self.src.get(self.pos).copied()
    }

    fn advance(&mut self) {
        if self.pos < self.src.len() {
            self.pos += 1;
        }
    }

    fn span_from(&self, start: usize) -> Span {
        Span::new(self.source_id, start, self.pos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::SourceId;

    fn kinds(source: &str) -> Vec<TokenKind> {
        let mut diagnostics = Diagnostics::new();
        lex(source, SourceId(0), &mut diagnostics)
            .expect("lexing failed")
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    fn lex_err(source: &str) -> Diagnostics {
        let mut diagnostics = Diagnostics::new();
        let result = lex(source, SourceId(0), &mut diagnostics);
        assert!(matches!(result, Err(CompileError::Lexical)));
        diagnostics
    }

    #[test]
    fn test_hello_world_tokens() {
        use TokenKind::*;
        assert_eq!(
            kinds("program\nbegin writeln(42) end."),
            vec![
                Program, Begin, Identifier, LeftPar, IntLiteral, RightPar, End, Dot, EndFile
            ]
        );
    }

    #[test]
    fn test_digraphs_and_fallbacks() {
        use TokenKind::*;
        assert_eq!(
            kinds(":= : <= < <> >= > ="),
            vec![
                Assign, Colon, LessEqual, LessThan, NotEqual, GreaterEqual, GreaterThan, Equal,
                EndFile
            ]
        );
    }

    #[test]
    fn test_keywords_and_literals() {
        use TokenKind::*;
        assert_eq!(
            kinds("if then else while do true false new array of integer boolean"),
            vec![
                If, Then, Else, While, Do, BoolLiteral, BoolLiteral, New, Array, Of, IntType,
                BoolType, EndFile
            ]
        );
    }

    #[test]
    fn test_nested_comment_is_skipped() {
        use TokenKind::*;
        assert_eq!(
            kinds("begin { outer { inner } still a comment } end"),
            vec![Begin, End, EndFile]
        );
    }

    #[test]
    fn test_token_spans_slice_lexemes() {
        let source = "x := 451";
        let mut diagnostics = Diagnostics::new();
        let tokens = lex(source, SourceId(0), &mut diagnostics).unwrap();

        assert_eq!(&source[tokens[0].span.start..tokens[0].span.end], "x");
        assert_eq!(&source[tokens[2].span.start..tokens[2].span.end], "451");
    }

    #[test]
    fn test_unterminated_comment() {
        let diagnostics = lex_err("begin { end.");
        assert!(diagnostics.has_errors());
        let first = diagnostics.iter().next().unwrap();
        assert!(first.message.contains("unterminated comment"));
    }

    #[test]
    fn test_integer_overflow() {
        let diagnostics = lex_err("program begin writeln(99999999999) end.");
        let first = diagnostics.iter().next().unwrap();
        assert!(first.message.contains("overflow"));
    }

    #[test]
    fn test_bad_character() {
        let diagnostics = lex_err("program # begin end.");
        let first = diagnostics.iter().next().unwrap();
        assert!(first.message.contains("bad character"));
    }

    #[test]
    fn test_in_range_literal_is_kept() {
        use TokenKind::*;
        assert_eq!(kinds("2147483647"), vec![IntLiteral, EndFile]);
    }
}

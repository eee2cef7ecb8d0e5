//! Hand-written tokenizer for the supported SystemVerilog subset.
//!
//! Produces a flat vector of [`Token`]s with byte spans into the input.
//! Comments and whitespace are consumed here; the comment-preserving
//! transform lives in `sv-preprocess`, which works on raw text instead.

use smol_str::SmolStr;
use sv_diagnostics::{LexError, Span};
use sv_syntax::{Token, TokenKind};

/// Tokenizer over a single source text.
pub struct Lexer<'a> {
    src: &'a str,
    bytes: &'a [u8],
    pos: usize,
}

fn is_id_start(c: u8) -> bool {
    c.is_ascii_alphabetic() || c == b'_'
}

fn is_id_char(c: u8) -> bool {
    c.is_ascii_alphanumeric() || c == b'_' || c == b'$'
}

impl<'a> Lexer<'a> {
    #[must_use]
    pub fn new(src: &'a str) -> Self {
        Lexer {
            src,
            bytes: src.as_bytes(),
            pos: 0,
        }
    }

    /// Tokenize the whole input.
    pub fn tokenize(mut self) -> Result<Vec<Token>, LexError> {
        let mut tokens = Vec::new();
        while let Some(tok) = self.next_token()? {
            tokens.push(tok);
        }
        Ok(tokens)
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.bytes.get(self.pos + offset).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let c = self.peek()?;
        self.pos += 1;
        Some(c)
    }

    fn skip_trivia(&mut self) -> Result<(), LexError> {
        loop {
            match self.peek() {
                Some(c) if c.is_ascii_whitespace() => {
                    self.pos += 1;
                }
                Some(b'/') if self.peek_at(1) == Some(b'/') => {
                    while let Some(c) = self.peek() {
                        if c == b'\n' {
                            break;
                        }
                        self.pos += 1;
                    }
                }
                Some(b'/') if self.peek_at(1) == Some(b'*') => {
                    let start = self.pos;
                    self.pos += 2;
                    loop {
                        match self.peek() {
                            Some(b'*') if self.peek_at(1) == Some(b'/') => {
                                self.pos += 2;
                                break;
                            }
                            Some(_) => self.pos += 1,
                            None => {
                                return Err(LexError::UnterminatedBlockComment {
                                    span: Span::new(start as u32, start as u32 + 2).into(),
                                })
                            }
                        }
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    fn text(&self, start: usize) -> SmolStr {
        SmolStr::new(&self.src[start..self.pos])
    }

    fn span(&self, start: usize) -> Span {
        Span::new(start as u32, self.pos as u32)
    }

    fn next_token(&mut self) -> Result<Option<Token>, LexError> {
        self.skip_trivia()?;
        let start = self.pos;
        let Some(c) = self.peek() else {
            return Ok(None);
        };

        // Identifiers and keywords
        if is_id_start(c) {
            while self.peek().is_some_and(is_id_char) {
                self.pos += 1;
            }
            let text = self.text(start);
            let kind = TokenKind::from_keyword(&text).unwrap_or(TokenKind::Identifier);
            return Ok(Some(Token::new(kind, text, self.span(start))));
        }

        // System identifiers: $display, $bits, ...
        if c == b'$' && self.peek_at(1).is_some_and(is_id_start) {
            self.pos += 1;
            while self.peek().is_some_and(is_id_char) {
                self.pos += 1;
            }
            return Ok(Some(Token::new(
                TokenKind::SystemIdentifier,
                self.text(start),
                self.span(start),
            )));
        }

        // Numbers, including based literals like 8'hFF or '1.
        if c.is_ascii_digit() || (c == b'\'' && self.peek_at(1).is_some_and(|b| b.is_ascii_alphanumeric())) {
            if c.is_ascii_digit() {
                while self.peek().is_some_and(|b| b.is_ascii_digit() || b == b'_') {
                    self.pos += 1;
                }
            }
            if self.peek() == Some(b'\'') {
                self.pos += 1;
                match self.peek() {
                    Some(b's') | Some(b'S') => {
                        self.pos += 1;
                        self.expect_base(start)?;
                    }
                    Some(b) if b"hHdDbBoO".contains(&b) => {
                        self.pos += 1;
                    }
                    Some(b'0') | Some(b'1') => {}
                    _ => {
                        return Err(LexError::MalformedBasedLiteral {
                            literal: self.src[start..self.pos].to_string(),
                            span: self.span(start).into(),
                        })
                    }
                }
                while self
                    .peek()
                    .is_some_and(|b| b.is_ascii_alphanumeric() || b == b'_')
                {
                    self.pos += 1;
                }
            }
            return Ok(Some(Token::new(
                TokenKind::Number,
                self.text(start),
                self.span(start),
            )));
        }

        // String literals
        if c == b'"' {
            self.pos += 1;
            loop {
                match self.bump() {
                    Some(b'"') => break,
                    Some(b'\\') => {
                        self.bump();
                    }
                    Some(_) => {}
                    None => {
                        return Err(LexError::UnterminatedString {
                            span: Span::new(start as u32, start as u32 + 1).into(),
                        })
                    }
                }
            }
            return Ok(Some(Token::new(
                TokenKind::StringLiteral,
                self.text(start),
                self.span(start),
            )));
        }

        // Backtick directives: `include, `define, ...
        if c == b'`' {
            self.pos += 1;
            let name_start = self.pos;
            while self.peek().is_some_and(is_id_char) {
                self.pos += 1;
            }
            if name_start == self.pos {
                return Err(LexError::UnexpectedChar {
                    char: '`',
                    span: Span::new(start as u32, start as u32 + 1).into(),
                });
            }
            return Ok(Some(Token::new(
                TokenKind::Directive,
                SmolStr::new(&self.src[name_start..self.pos]),
                self.span(start),
            )));
        }

        // Operators and punctuation, longest match first.
        let two = |a: u8, b: u8, lexer: &Self| lexer.peek() == Some(a) && lexer.peek_at(1) == Some(b);
        let kind = if two(b':', b':', self) {
            self.pos += 2;
            TokenKind::ScopeRes
        } else if two(b'<', b'=', self) {
            self.pos += 2;
            TokenKind::LtEq
        } else if two(b'>', b'=', self) {
            self.pos += 2;
            TokenKind::GtEq
        } else if two(b'=', b'=', self) {
            self.pos += 2;
            TokenKind::EqEq
        } else if two(b'!', b'=', self) {
            self.pos += 2;
            TokenKind::BangEq
        } else if two(b'&', b'&', self) {
            self.pos += 2;
            TokenKind::AmpAmp
        } else if two(b'|', b'|', self) {
            self.pos += 2;
            TokenKind::PipePipe
        } else {
            let single = match c {
                b'.' => TokenKind::Dot,
                b'#' => TokenKind::Hash,
                b'(' => TokenKind::LParen,
                b')' => TokenKind::RParen,
                b'[' => TokenKind::LBracket,
                b']' => TokenKind::RBracket,
                b'{' => TokenKind::LBrace,
                b'}' => TokenKind::RBrace,
                b';' => TokenKind::Semicolon,
                b',' => TokenKind::Comma,
                b':' => TokenKind::Colon,
                b'=' => TokenKind::Equals,
                b'@' => TokenKind::At,
                b'*' => TokenKind::Star,
                b'+' => TokenKind::Plus,
                b'-' => TokenKind::Minus,
                b'/' => TokenKind::Slash,
                b'%' => TokenKind::Percent,
                b'<' => TokenKind::Lt,
                b'>' => TokenKind::Gt,
                b'&' => TokenKind::Amp,
                b'|' => TokenKind::Pipe,
                b'^' => TokenKind::Caret,
                b'!' => TokenKind::Bang,
                b'?' => TokenKind::Question,
                b'~' => TokenKind::Tilde,
                other => {
                    return Err(LexError::UnexpectedChar {
                        char: other as char,
                        span: Span::new(start as u32, start as u32 + 1).into(),
                    })
                }
            };
            self.pos += 1;
            single
        };
        Ok(Some(Token::new(kind, self.text(start), self.span(start))))
    }

    fn expect_base(&mut self, start: usize) -> Result<(), LexError> {
        match self.peek() {
            Some(b) if b"hHdDbBoO".contains(&b) => {
                self.pos += 1;
                Ok(())
            }
            _ => Err(LexError::MalformedBasedLiteral {
                literal: self.src[start..self.pos].to_string(),
                span: self.span(start).into(),
            }),
        }
    }
}

/// Convenience wrapper: tokenize `src` in one call.
pub fn tokenize(src: &str) -> Result<Vec<Token>, LexError> {
    Lexer::new(src).tokenize()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lex_keywords_and_identifiers() {
        let tokens = tokenize("module m; wire w_1; endmodule").expect("lexing failed");
        assert_eq!(tokens[0].kind, TokenKind::KwModule);
        assert!(matches!(&tokens[1].kind, TokenKind::Identifier));
        assert_eq!(tokens[1].text, "m");
        assert_eq!(tokens[3].kind, TokenKind::KwWire);
        assert_eq!(tokens[4].text, "w_1");
        assert_eq!(tokens.last().unwrap().kind, TokenKind::KwEndModule);
    }

    #[test]
    fn test_lex_operators() {
        let tokens = tokenize("p::x = c.f == 1;").expect("lexing failed");
        let kinds: Vec<_> = tokens.iter().map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            vec![
                TokenKind::Identifier,
                TokenKind::ScopeRes,
                TokenKind::Identifier,
                TokenKind::Equals,
                TokenKind::Identifier,
                TokenKind::Dot,
                TokenKind::Identifier,
                TokenKind::EqEq,
                TokenKind::Number,
                TokenKind::Semicolon,
            ]
        );
    }

    #[test]
    fn test_lex_based_literals() {
        let tokens = tokenize("8'hFF 4'b1010 'd42 12").expect("lexing failed");
        assert!(tokens.iter().all(|t| t.kind == TokenKind::Number));
        assert_eq!(tokens[0].text, "8'hFF");
        assert_eq!(tokens[2].text, "'d42");
    }

    #[test]
    fn test_lex_directive_and_string() {
        let tokens = tokenize("`include \"defs.svh\"").expect("lexing failed");
        assert_eq!(tokens[0].kind, TokenKind::Directive);
        assert_eq!(tokens[0].text, "include");
        assert_eq!(tokens[1].kind, TokenKind::StringLiteral);
        assert_eq!(tokens[1].text, "\"defs.svh\"");
    }

    #[test]
    fn test_lex_comments_skipped() {
        let tokens = tokenize("wire /* inline */ w; // trailing\n").expect("lexing failed");
        assert_eq!(tokens.len(), 3);
        assert_eq!(tokens[1].text, "w");
    }

    #[test]
    fn test_lex_system_identifier() {
        let tokens = tokenize("$display(x)").expect("lexing failed");
        assert_eq!(tokens[0].kind, TokenKind::SystemIdentifier);
        assert_eq!(tokens[0].text, "$display");
    }

    #[test]
    fn test_lex_unterminated_comment() {
        assert!(matches!(
            tokenize("wire /* oops"),
            Err(LexError::UnterminatedBlockComment { .. })
        ));
    }
}

//! Streaming lexer for Rox source text.
//!
//! [`Scanner`] walks a `&str` once and yields `Result<Token, LoxError>` items,
//! finishing with exactly one `EOF` token.  A lexical error is yielded in place
//! of the offending token and scanning carries on, so one pass reports every
//! bad character.  The iterator is fused.
//!
//! Recognised input:
//!
//! - punctuation `( ) { } , . - + ; * / %` and the operators
//!   `! != = == < <= > >=`
//! - string literals, which may span lines
//! - number literals: digits with an optional fractional part
//! - identifiers and the keywords in [`KEYWORDS`]
//! - `//` line comments, skipped with `memchr`
//!
//! `print` is deliberately absent from the keyword table: it is a builtin
//! function in this dialect.
//!
//! ```rust
//! use rox::scanner::Scanner;
//!
//! for item in Scanner::new("print(123); // example") {
//!     match item {
//!         Ok(token) => println!("{}", token),
//!         Err(err) => eprintln!("{}", err),
//!     }
//! }
//! ```

use std::iter::FusedIterator;

use log::{debug, info};
use memchr::memchr;
use phf::phf_map;

use crate::error::{LoxError, Result};
use crate::token::{Token, TokenType};

/// Reserved words, looked up by raw bytes.
pub static KEYWORDS: phf::Map<&'static [u8], TokenType> = phf_map! {
    b"and"    => TokenType::AND,
    b"class"  => TokenType::CLASS,
    b"else"   => TokenType::ELSE,
    b"false"  => TokenType::FALSE,
    b"for"    => TokenType::FOR,
    b"fun"    => TokenType::FUN,
    b"if"     => TokenType::IF,
    b"nil"    => TokenType::NIL,
    b"or"     => TokenType::OR,
    b"return" => TokenType::RETURN,
    b"super"  => TokenType::SUPER,
    b"this"   => TokenType::THIS,
    b"true"   => TokenType::TRUE,
    b"var"    => TokenType::VAR,
    b"while"  => TokenType::WHILE,
};

pub struct Scanner<'a> {
    source: &'a str,
    bytes: &'a [u8],
    /// First byte of the lexeme being scanned.
    lexeme_start: usize,
    /// Next byte to examine.
    pos: usize,
    line: usize,
    finished: bool,
}

impl<'a> Scanner<'a> {
    pub fn new(source: &'a str) -> Self {
        info!("Scanner created over {} bytes", source.len());

        Self {
            source,
            bytes: source.as_bytes(),
            lexeme_start: 0,
            pos: 0,
            line: 1,
            finished: false,
        }
    }

    #[inline(always)]
    fn at_end(&self) -> bool {
        self.pos >= self.bytes.len()
    }

    /// Byte `offset` places ahead of the cursor, `0` past the end.
    #[inline(always)]
    fn peek_at(&self, offset: usize) -> u8 {
        self.bytes.get(self.pos + offset).copied().unwrap_or(0)
    }

    #[inline(always)]
    fn bump(&mut self) -> u8 {
        let byte = self.peek_at(0);
        self.pos += 1;
        byte
    }

    #[inline(always)]
    fn eat(&mut self, expected: u8) -> bool {
        let hit = !self.at_end() && self.peek_at(0) == expected;
        if hit {
            self.pos += 1;
        }
        hit
    }

    /// `long` when the next byte is `=`, `short` otherwise.
    #[inline]
    fn with_equals(&mut self, long: TokenType, short: TokenType) -> TokenType {
        if self.eat(b'=') {
            long
        } else {
            short
        }
    }

    /// `lexeme_start..pos` only ever spans whole chars.
    #[inline(always)]
    fn lexeme(&self) -> &'a str {
        &self.source[self.lexeme_start..self.pos]
    }

    /// Scans from `lexeme_start`.  `Ok(None)` means the bytes were trivia
    /// (whitespace or a comment) and produced no token.
    fn scan_token(&mut self) -> Result<Option<TokenType>> {
        let kind = match self.bump() {
            b'(' => TokenType::LEFT_PAREN,
            b')' => TokenType::RIGHT_PAREN,
            b'{' => TokenType::LEFT_BRACE,
            b'}' => TokenType::RIGHT_BRACE,
            b',' => TokenType::COMMA,
            b'.' => TokenType::DOT,
            b'-' => TokenType::MINUS,
            b'+' => TokenType::PLUS,
            b';' => TokenType::SEMICOLON,
            b'*' => TokenType::STAR,
            b'%' => TokenType::PERCENT,

            b'!' => self.with_equals(TokenType::BANG_EQUAL, TokenType::BANG),
            b'=' => self.with_equals(TokenType::EQUAL_EQUAL, TokenType::EQUAL),
            b'<' => self.with_equals(TokenType::LESS_EQUAL, TokenType::LESS),
            b'>' => self.with_equals(TokenType::GREATER_EQUAL, TokenType::GREATER),

            b'/' if self.eat(b'/') => {
                self.pos = match memchr(b'\n', &self.bytes[self.pos..]) {
                    Some(offset) => self.pos + offset,
                    None => self.bytes.len(),
                };
                return Ok(None);
            }
            b'/' => TokenType::SLASH,

            b' ' | b'\r' | b'\t' => return Ok(None),

            b'\n' => {
                self.line += 1;
                return Ok(None);
            }

            b'"' => self.string()?,

            b'0'..=b'9' => self.number(),

            b'a'..=b'z' | b'A'..=b'Z' | b'_' => self.identifier(),

            _ => {
                // Skip the whole code point so a multi-byte char is one error.
                let c: char = self.source[self.lexeme_start..]
                    .chars()
                    .next()
                    .unwrap_or(char::REPLACEMENT_CHARACTER);
                self.pos = self.lexeme_start + c.len_utf8();

                return Err(LoxError::lex(
                    self.line,
                    format!("Unexpected character: {}", c),
                ));
            }
        };

        Ok(Some(kind))
    }

    fn string(&mut self) -> Result<TokenType> {
        while !self.at_end() && self.peek_at(0) != b'"' {
            if self.bump() == b'\n' {
                self.line += 1;
            }
        }

        if !self.eat(b'"') {
            return Err(LoxError::lex(self.line, "Unterminated string."));
        }

        let contents: &str = &self.source[self.lexeme_start + 1..self.pos - 1];
        Ok(TokenType::STRING(contents.to_owned()))
    }

    fn number(&mut self) -> TokenType {
        self.skip_digits();

        if self.peek_at(0) == b'.' && self.peek_at(1).is_ascii_digit() {
            self.pos += 1;
            self.skip_digits();
        }

        // Digits with at most one interior dot always parse.
        TokenType::NUMBER(self.lexeme().parse().unwrap_or(0.0))
    }

    fn skip_digits(&mut self) {
        while self.peek_at(0).is_ascii_digit() {
            self.pos += 1;
        }
    }

    fn identifier(&mut self) -> TokenType {
        while matches!(self.peek_at(0), b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'_') {
            self.pos += 1;
        }

        KEYWORDS
            .get(self.lexeme().as_bytes())
            .cloned()
            .unwrap_or(TokenType::IDENTIFIER)
    }
}

impl<'a> Iterator for Scanner<'a> {
    type Item = Result<Token>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        while !self.at_end() {
            self.lexeme_start = self.pos;

            match self.scan_token() {
                Ok(Some(kind)) => {
                    debug!("Scanned {:?} on line {}", kind, self.line);
                    return Some(Ok(Token::new(kind, self.lexeme(), self.line)));
                }
                Ok(None) => {}
                Err(e) => return Some(Err(e)),
            }
        }

        self.finished = true;
        Some(Ok(Token::new(TokenType::EOF, "", self.line)))
    }
}

impl<'a> FusedIterator for Scanner<'a> {}

/// Scans all of `source`: every token, or every lexical error.
pub fn scan(source: &str) -> std::result::Result<Vec<Token>, Vec<LoxError>> {
    let (tokens, errors): (Vec<_>, Vec<_>) = Scanner::new(source).partition(|item| item.is_ok());

    if errors.is_empty() {
        let tokens: Vec<Token> = tokens.into_iter().filter_map(|item| item.ok()).collect();
        info!("Scanned {} tokens", tokens.len());
        Ok(tokens)
    } else {
        let errors: Vec<LoxError> = errors.into_iter().filter_map(|item| item.err()).collect();
        info!("Scanning produced {} error(s)", errors.len());
        Err(errors)
    }
}

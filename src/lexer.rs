//! Tokenizer for raw SQL fragments
//!
//! Raw predicates and raw select expressions are opaque SQL, except for
//! `:name` / `:name.field` placeholders. The lexer only distinguishes what it
//! needs to find those placeholders safely: string literals, quoted
//! identifiers and `::` casts are passed through untouched.

use logos::Logos;
use std::fmt;

/// Span represents a range in the source text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }
}

/// Token with its span information
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

impl Token {
    pub fn new(kind: TokenKind, span: Span) -> Self {
        Self { kind, span }
    }

    /// Source text covered by this token
    pub fn text<'a>(&self, source: &'a str) -> &'a str {
        &source[self.span.start..self.span.end]
    }
}

/// Token types in a raw SQL fragment
#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    #[regex(r"'([^']|'')*'")]
    StringLiteral,

    #[regex(r#""([^"]|"")*""#)]
    QuotedIdentifier,

    #[token("::")]
    Cast,

    /// `:name` optionally followed by `.field` segments
    #[regex(r":[A-Za-z_][A-Za-z0-9_]*(\.[A-Za-z0-9_]+)*")]
    Placeholder,

    #[token(":")]
    Colon,

    #[regex(r#"[^'":]+"#)]
    Text,

    /// Unterminated literal or identifier; kept verbatim
    Invalid,

    Eof,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::StringLiteral => write!(f, "string literal"),
            TokenKind::QuotedIdentifier => write!(f, "quoted identifier"),
            TokenKind::Cast => write!(f, "::"),
            TokenKind::Placeholder => write!(f, "placeholder"),
            TokenKind::Colon => write!(f, ":"),
            TokenKind::Text => write!(f, "text"),
            TokenKind::Invalid => write!(f, "invalid"),
            TokenKind::Eof => write!(f, "EOF"),
        }
    }
}

/// Lexer for raw SQL fragments
pub struct Lexer<'a> {
    inner: logos::Lexer<'a, TokenKind>,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            inner: TokenKind::lexer(source),
        }
    }

    pub fn next_token(&mut self) -> Token {
        match self.inner.next() {
            Some(result) => {
                let span = self.inner.span();
                let kind = result.unwrap_or(TokenKind::Invalid);
                Token::new(kind, Span::new(span.start, span.end))
            }
            None => {
                let end = self.inner.source().len();
                Token::new(TokenKind::Eof, Span::new(end, end))
            }
        }
    }

    pub fn source(&self) -> &'a str {
        self.inner.source()
    }
}

/// Tokenize an entire fragment into a vector of tokens
pub fn tokenize(source: &str) -> Vec<Token> {
    let mut lexer = Lexer::new(source);
    let mut tokens = Vec::new();
    loop {
        let token = lexer.next_token();
        let is_eof = token.kind == TokenKind::Eof;
        tokens.push(token);
        if is_eof {
            break;
        }
    }
    tokens
}

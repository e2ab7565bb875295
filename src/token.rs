//! The token definition for the query language.

use std::borrow::Cow;
use std::fmt;

/// A token is a single unit of the language, with a specific kind and location.
#[derive(Debug, Clone, PartialEq)]
pub struct Token<'a> {
    pub kind: TokenKind<'a>,
    pub span: Span,
}

/// The kind of a token.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind<'a> {
    // Keywords
    And,      // "AND"
    Or,       // "OR"
    Not,      // "NOT"
    Is,       // "IS"
    Null,     // "NULL"
    Any,      // "ANY"
    Contains, // "CONTAINS"

    // Literals
    /// A field path such as `Department.Name`, or a bare word literal.
    Identifier(&'a str),
    /// The contents of a quoted string, quotes stripped and `\'` resolved.
    String(Cow<'a, str>),
    /// The raw text of a numeric literal, e.g. `-1,000.5e3`.
    Number(&'a str),

    // Punctuation
    LParen, // (
    RParen, // )
    Comma,  // ,

    // Operators
    Eq,    // =
    NotEq, // !=
    Gt,    // >
    Lt,    // <
    Gte,   // >=
    Lte,   // <=

    // Special
    /// An illegal character or an unclosed string, with a description.
    Illegal(String),
    Eof, // End of input
}

impl TokenKind<'_> {
    /// The literal text of the token, as a user would have typed it.
    pub fn literal(&self) -> Cow<'_, str> {
        match self {
            TokenKind::And => "AND".into(),
            TokenKind::Or => "OR".into(),
            TokenKind::Not => "NOT".into(),
            TokenKind::Is => "IS".into(),
            TokenKind::Null => "NULL".into(),
            TokenKind::Any => "ANY".into(),
            TokenKind::Contains => "CONTAINS".into(),
            TokenKind::Identifier(s) | TokenKind::Number(s) => Cow::Borrowed(s),
            TokenKind::String(s) => Cow::Borrowed(s.as_ref()),
            TokenKind::LParen => "(".into(),
            TokenKind::RParen => ")".into(),
            TokenKind::Comma => ",".into(),
            TokenKind::Eq => "=".into(),
            TokenKind::NotEq => "!=".into(),
            TokenKind::Gt => ">".into(),
            TokenKind::Lt => "<".into(),
            TokenKind::Gte => ">=".into(),
            TokenKind::Lte => "<=".into(),
            TokenKind::Illegal(message) => Cow::Borrowed(message.as_str()),
            TokenKind::Eof => "".into(),
        }
    }
}

impl fmt::Display for TokenKind<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Identifier(s) => write!(f, "identifier '{s}'"),
            TokenKind::String(s) => write!(f, "string '{s}'"),
            TokenKind::Number(s) => write!(f, "number {s}"),
            TokenKind::Illegal(message) => f.write_str(message),
            TokenKind::Eof => f.write_str("end of input"),
            TokenKind::And
            | TokenKind::Or
            | TokenKind::Not
            | TokenKind::Is
            | TokenKind::Null
            | TokenKind::Any
            | TokenKind::Contains => f.write_str(&self.literal()),
            _ => write!(f, "'{}'", self.literal()),
        }
    }
}

/// Represents a span in the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    /// The starting byte offset.
    pub start: usize,
    /// The ending byte offset.
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }
}

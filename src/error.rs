//! Error types for every stage of the pipeline.

use std::fmt;

use thiserror::Error;

use crate::token::Span;

/// A single syntax error, optionally located in the (normalized) query text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub message: String,
    pub span: Option<Span>,
}

impl ParseError {
    pub fn new(message: impl Into<String>, span: Option<Span>) -> Self {
        Self { message: message.into(), span }
    }

    pub fn at_position(message: impl Into<String>, span: Span) -> Self {
        Self { message: message.into(), span: Some(span) }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.span {
            Some(span) => write!(f, "{} at position {}", self.message, span.start),
            None => f.write_str(&self.message),
        }
    }
}

impl std::error::Error for ParseError {}

/// Every syntax error found in one query, in source order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseErrors(pub Vec<ParseError>);

impl ParseErrors {
    pub fn errors(&self) -> &[ParseError] {
        &self.0
    }

    /// Rewrites every span, e.g. to point into a different rendering of the query.
    pub fn map_spans(mut self, map: impl Fn(Span) -> Span) -> Self {
        for error in &mut self.0 {
            error.span = error.span.map(&map);
        }
        self
    }
}

impl fmt::Display for ParseErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, error) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{error}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ParseErrors {}

/// A failure while evaluating a query against one record.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EvalError {
    #[error("field not found: {path}")]
    FieldNotFound { path: String },

    #[error("invalid {expected} literal '{literal}' for field '{field}'")]
    InvalidLiteral {
        field: String,
        literal: String,
        expected: &'static str,
    },
}

/// Errors returned by the public filtering entry points.
#[derive(Debug, Error)]
pub enum FilterError {
    #[error("query must not be empty")]
    EmptyQuery,

    #[error("failed to parse query: {0}")]
    Parse(#[from] ParseErrors),

    #[error("evaluation error: {0}")]
    Eval(#[from] EvalError),

    #[error("failed to convert record: {0}")]
    Record(#[from] serde_json::Error),

    #[error("filter worker thread panicked")]
    Worker,
}

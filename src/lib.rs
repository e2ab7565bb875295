//! A small SQL-like query language for filtering in-memory record collections.
//!
//! Pipeline: [`humanize`] rewrites values such as `10GB` or `2h30m`, the
//! [`lexer`] turns the text into tokens, the [`parser`] builds an [`Expr`]
//! tree, and [`eval`] matches that tree against records converted to
//! [`Value`]s. [`filter`] runs the whole pipeline.
//!
//! ```text
//! Age > 25 AND Name != 'Bob'
//! ANY(Tags) = ANY('a', 'b') OR Manager IS NULL
//! Size > 10GiB AND Uptime >= 1d12h
//! ```

pub mod ast;
pub mod config;
pub mod error;
pub mod eval;
pub mod filter;
pub mod humanize;
pub mod lexer;
pub mod parser;
pub mod token;
pub mod value;

pub use ast::{CompOp, Expr, FieldPath, Literal};
pub use config::{ConfigError, FilterConfig};
pub use error::{EvalError, FilterError, ParseError, ParseErrors};
pub use filter::{filter, filter_with, Query};
pub use value::{Number, Record, Value};

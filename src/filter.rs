//! Public entry points: compile a query once, then filter record collections.
//!
//! ```
//! use record_filter::filter;
//! use serde::Serialize;
//!
//! #[derive(Clone, Serialize)]
//! struct Person {
//!     name: String,
//!     age: u32,
//! }
//!
//! let people = vec![
//!     Person { name: "Alice".into(), age: 30 },
//!     Person { name: "Bob".into(), age: 25 },
//! ];
//! let adults = filter("age > 25 AND name != 'Bob'", &people).unwrap();
//! assert_eq!(adults.len(), 1);
//! assert_eq!(adults[0].name, "Alice");
//! ```

use std::thread;

use tracing::{debug, trace};

use crate::ast::Expr;
use crate::config::FilterConfig;
use crate::error::{EvalError, FilterError};
use crate::humanize::{self, Normalized};
use crate::lexer::Lexer;
use crate::parser::Parser;
use crate::value::{Record, Value};

/// A compiled query. Immutable, so it can be reused across calls and threads.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    expr: Expr,
    source: String,
    normalized: String,
}

/// Outcome of evaluating a contiguous run of records.
#[derive(Debug, Default)]
struct Scan {
    matched: Vec<usize>,
    missing: usize,
    first_missing: Option<EvalError>,
}

impl Scan {
    fn merge(&mut self, other: Scan) {
        self.matched.extend(other.matched);
        self.missing += other.missing;
        if self.first_missing.is_none() {
            self.first_missing = other.first_missing;
        }
    }
}

impl Query {
    /// Compiles `text` with the default configuration.
    pub fn compile(text: &str) -> Result<Self, FilterError> {
        Self::compile_with(text, &FilterConfig::default())
    }

    /// Normalizes, tokenizes and parses `text`. Fails on an empty query and
    /// on any syntax error, with all syntax errors reported together.
    /// Error positions refer to `text` as given.
    pub fn compile_with(text: &str, config: &FilterConfig) -> Result<Self, FilterError> {
        if text.trim().is_empty() {
            return Err(FilterError::EmptyQuery);
        }

        let normalized = if config.normalize_humanized {
            humanize::normalize_mapped(text)
        } else {
            Normalized::unchanged(text)
        };

        let tokens: Vec<_> = Lexer::new(normalized.text()).collect();
        let expr = Parser::new(&tokens)
            .parse()
            .map_err(|errors| errors.map_spans(|span| normalized.original_span(span)))?
            .ok_or(FilterError::EmptyQuery)?;
        debug!(query = text, normalized = normalized.text(), "compiled query");

        Ok(Self {
            expr,
            source: text.to_string(),
            normalized: normalized.into_text(),
        })
    }

    pub fn expr(&self) -> &Expr {
        &self.expr
    }

    /// The query text as given.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// The query text after humanized values were expanded.
    pub fn normalized(&self) -> &str {
        &self.normalized
    }

    /// Evaluates the query against an already converted record.
    pub fn matches_value(&self, record: &Value) -> Result<bool, EvalError> {
        self.expr.evaluate(record)
    }

    /// Evaluates the query against a single record.
    pub fn matches<R: Record + ?Sized>(&self, record: &R) -> Result<bool, FilterError> {
        let value = record.to_value()?;
        Ok(self.expr.evaluate(&value)?)
    }

    /// Returns clones of the matching records, in input order.
    pub fn filter<T: Record + Clone>(&self, records: &[T]) -> Result<Vec<T>, FilterError> {
        Ok(self.filter_refs(records)?.into_iter().cloned().collect())
    }

    /// Returns references to the matching records, in input order.
    pub fn filter_refs<'r, T: Record>(&self, records: &'r [T]) -> Result<Vec<&'r T>, FilterError> {
        let scan = self.scan(records, 0)?;
        let indices = self.finish(scan, records.len())?;
        Ok(indices.into_iter().map(|i| &records[i]).collect())
    }

    /// Number of matching records.
    pub fn count<T: Record>(&self, records: &[T]) -> Result<usize, FilterError> {
        let scan = self.scan(records, 0)?;
        Ok(self.finish(scan, records.len())?.len())
    }

    /// Like [`Query::filter`], but splits large inputs across worker threads
    /// as configured. Output order and error precedence match the sequential
    /// path.
    pub fn filter_with<T>(&self, records: &[T], config: &FilterConfig) -> Result<Vec<T>, FilterError>
    where
        T: Record + Clone + Sync,
    {
        if records.is_empty() || !config.should_parallelize(records.len()) {
            return self.filter(records);
        }

        let workers = config.worker_count();
        let chunk_size = records.len().div_ceil(workers);
        debug!(records = records.len(), workers, chunk_size, "evaluating in parallel");

        let outcomes: Vec<Result<Scan, FilterError>> = thread::scope(|scope| {
            let handles: Vec<_> = records
                .chunks(chunk_size)
                .enumerate()
                .map(|(shard, chunk)| scope.spawn(move || self.scan(chunk, shard * chunk_size)))
                .collect();
            handles
                .into_iter()
                .map(|handle| handle.join().unwrap_or(Err(FilterError::Worker)))
                .collect()
        });

        let mut scan = Scan::default();
        for outcome in outcomes {
            scan.merge(outcome?);
        }
        let indices = self.finish(scan, records.len())?;
        Ok(indices.into_iter().map(|i| records[i].clone()).collect())
    }

    /// Evaluates `records`, stopping at the first record the query cannot
    /// apply to. Indices are offset by `offset`.
    fn scan<T: Record>(&self, records: &[T], offset: usize) -> Result<Scan, FilterError> {
        let mut scan = Scan::default();
        for (i, record) in records.iter().enumerate() {
            let value = record.to_value()?;
            match self.expr.evaluate(&value) {
                Ok(true) => scan.matched.push(offset + i),
                Ok(false) => {}
                Err(err @ EvalError::FieldNotFound { .. }) => {
                    trace!(index = offset + i, %err, "record does not provide field");
                    scan.missing += 1;
                    scan.first_missing.get_or_insert(err);
                }
                Err(err) => return Err(err.into()),
            }
        }
        Ok(scan)
    }

    /// A missing field only fails the whole call when no record had it.
    fn finish(&self, scan: Scan, total: usize) -> Result<Vec<usize>, FilterError> {
        if total > 0 && scan.missing == total {
            if let Some(err) = scan.first_missing {
                return Err(err.into());
            }
        }
        debug!(
            query = %self.source,
            records = total,
            matched = scan.matched.len(),
            "filter finished"
        );
        Ok(scan.matched)
    }
}

/// Filters `records` with `query`, returning the matches in input order.
///
/// An empty query is an error, never "match everything".
pub fn filter<T: Record + Clone>(query: &str, records: &[T]) -> Result<Vec<T>, FilterError> {
    Query::compile(query)?.filter(records)
}

/// [`filter`] with an explicit configuration, evaluating large inputs in parallel.
pub fn filter_with<T>(query: &str, records: &[T], config: &FilterConfig) -> Result<Vec<T>, FilterError>
where
    T: Record + Clone + Sync,
{
    Query::compile_with(query, config)?.filter_with(records, config)
}

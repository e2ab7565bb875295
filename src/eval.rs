//! Evaluation of expression trees against [`Value`] records.
//!
//! A field path resolves to a set of values: every segment applied to a
//! sequence is applied to each element, so `Employees.Name` yields one name per
//! employee. A comparison matches when any resolved value satisfies it.

use tracing::trace;

use crate::ast::{CompOp, Expr, FieldPath, Literal};
use crate::error::EvalError;
use crate::value::{parse_bool, Number, Value};

impl Expr {
    /// Decides whether `record` matches this expression.
    ///
    /// A comparison on a path the record does not provide fails with
    /// `FieldNotFound`; `OR` tolerates it and the filter driver counts such a
    /// record as a non-match unless no record has the field. `IS NULL` treats
    /// a missing path as null. The other errors come from literals that do
    /// not fit the field's type.
    pub fn evaluate(&self, record: &Value) -> Result<bool, EvalError> {
        match self {
            Expr::Comparison { field, op, value } => {
                let values = resolve(record, field)?;
                compare_all(&values, *op, value, field)
            }
            Expr::Any { field, op, values: literals } => {
                let values = resolve(record, field)?;
                any_match(values.iter().flat_map(|value| {
                    literals
                        .iter()
                        .map(move |literal| broadcast(value, *op, literal, field))
                }))
            }
            Expr::Not(inner) => inner.evaluate(record).map(|matched| !matched),
            Expr::IsNull { field, negated } => {
                let is_null = match resolve(record, field) {
                    Ok(values) => values.iter().any(|value| value.is_zero()),
                    Err(_) => true,
                };
                Ok(is_null != *negated)
            }
            Expr::And(children) => evaluate_and(children, record),
            Expr::Or(children) => evaluate_or(children, record),
            Expr::Empty => Ok(false),
        }
    }
}

/// Resolves `path` against `record`.
///
/// Sequences are traversed element-wise at every segment, nulls and scalars
/// contribute nothing. Fails with `FieldNotFound` when a segment leaves no
/// surviving branch.
pub fn resolve<'v>(record: &'v Value, path: &FieldPath) -> Result<Vec<&'v Value>, EvalError> {
    let mut current = vec![record];
    for segment in path.segments() {
        let mut next = Vec::new();
        for value in current {
            step(value, segment, &mut next);
        }
        if next.is_empty() {
            return Err(EvalError::FieldNotFound { path: path.to_string() });
        }
        current = next;
    }
    Ok(current)
}

fn step<'v>(value: &'v Value, segment: &str, out: &mut Vec<&'v Value>) {
    match value {
        Value::Mapping(_) => out.extend(value.get_member(segment)),
        Value::Sequence(items) => {
            for item in items {
                step(item, segment, out);
            }
        }
        _ => {}
    }
}

/// Returns true if any candidate matched. When nothing matched and every
/// candidate failed, the first error is returned instead.
fn any_match<I>(candidates: I) -> Result<bool, EvalError>
where
    I: IntoIterator<Item = Result<bool, EvalError>>,
{
    let mut first_error = None;
    let mut compared = false;
    for outcome in candidates {
        match outcome {
            Ok(true) => return Ok(true),
            Ok(false) => compared = true,
            Err(err) => {
                first_error.get_or_insert(err);
            }
        }
    }
    match first_error {
        Some(err) if !compared => Err(err),
        _ => Ok(false),
    }
}

/// Plain comparison over every resolved value.
fn compare_all(values: &[&Value], op: CompOp, literal: &Literal, field: &FieldPath) -> Result<bool, EvalError> {
    any_match(values.iter().map(|value| compare_field(value, op, literal, field)))
}

/// A resolved collection under `!=` means "not a member"; every other case
/// broadcasts over the elements.
fn compare_field(value: &Value, op: CompOp, literal: &Literal, field: &FieldPath) -> Result<bool, EvalError> {
    match (value, op) {
        (Value::Sequence(_) | Value::Mapping(_), CompOp::NotEq) => {
            broadcast(value, CompOp::Eq, literal, field).map(|member| !member)
        }
        _ => broadcast(value, op, literal, field),
    }
}

/// Compares a value, or any element of a collection value, with the literal.
fn broadcast(value: &Value, op: CompOp, literal: &Literal, field: &FieldPath) -> Result<bool, EvalError> {
    match value {
        Value::Null => Ok(false),
        Value::Bool(b) => compare_bool(*b, op, literal, field),
        Value::Number(n) => compare_number(*n, op, literal, field),
        Value::String(s) => Ok(compare_str(s, op, literal.text())),
        Value::Sequence(items) => any_match(items.iter().map(|item| broadcast(item, op, literal, field))),
        Value::Mapping(members) => {
            if op == CompOp::Contains && members.keys().any(|key| key.contains(literal.text())) {
                return Ok(true);
            }
            any_match(members.values().map(|item| broadcast(item, op, literal, field)))
        }
    }
}

fn compare_str(value: &str, op: CompOp, literal: &str) -> bool {
    match op {
        CompOp::Contains => value.contains(literal),
        _ => op.eval_ordering(value.cmp(literal)),
    }
}

fn compare_bool(value: bool, op: CompOp, literal: &Literal, field: &FieldPath) -> Result<bool, EvalError> {
    let Some(expected) = parse_bool(literal.text()) else {
        return Err(invalid_literal(field, literal, "boolean"));
    };
    Ok(match op {
        CompOp::Eq => value == expected,
        CompOp::NotEq => value != expected,
        _ => false,
    })
}

fn compare_number(value: Number, op: CompOp, literal: &Literal, field: &FieldPath) -> Result<bool, EvalError> {
    if op == CompOp::Contains {
        return Ok(false);
    }
    let Some(expected) = Number::parse_literal(literal.text()) else {
        return Err(invalid_literal(field, literal, "number"));
    };
    Ok(match value.compare(expected) {
        Some(ordering) => op.eval_ordering(ordering),
        // NaN is unequal to everything
        None => op == CompOp::NotEq,
    })
}

fn invalid_literal(field: &FieldPath, literal: &Literal, expected: &'static str) -> EvalError {
    EvalError::InvalidLiteral {
        field: field.to_string(),
        literal: literal.text().to_string(),
        expected,
    }
}

/// The field shared by every child when all children are plain comparisons
/// on the same path.
fn shared_comparison_field(children: &[Expr]) -> Option<&FieldPath> {
    let mut shared: Option<&FieldPath> = None;
    for child in children {
        let Expr::Comparison { field, .. } = child else {
            return None;
        };
        match shared {
            Some(path) if !path.same_field(field) => return None,
            Some(_) => {}
            None => shared = Some(field),
        }
    }
    shared
}

/// Children of a same-field group, tested against one resolved value set.
fn comparison_matches(child: &Expr, values: &[&Value], field: &FieldPath) -> bool {
    match child {
        Expr::Comparison { op, value, .. } => {
            compare_all(values, *op, value, field).unwrap_or(false)
        }
        _ => false,
    }
}

fn evaluate_and(children: &[Expr], record: &Value) -> Result<bool, EvalError> {
    if let Some(field) = shared_comparison_field(children) {
        let values = resolve(record, field)?;
        return Ok(children
            .iter()
            .all(|child| comparison_matches(child, &values, field)));
    }

    let mut all_matched = true;
    let mut not_found = None;
    for child in children {
        match child.evaluate(record) {
            Ok(matched) => all_matched &= matched,
            Err(err @ EvalError::FieldNotFound { .. }) => {
                not_found.get_or_insert(err);
            }
            Err(err) => {
                trace!(%err, "conjunction child treated as non-match");
                all_matched = false;
            }
        }
    }
    match not_found {
        Some(err) => Err(err),
        None => Ok(all_matched),
    }
}

fn evaluate_or(children: &[Expr], record: &Value) -> Result<bool, EvalError> {
    if let Some(field) = shared_comparison_field(children) {
        let Ok(values) = resolve(record, field) else {
            return Ok(false);
        };
        return Ok(children
            .iter()
            .any(|child| comparison_matches(child, &values, field)));
    }

    let mut any_matched = false;
    for child in children {
        match child.evaluate(record) {
            Ok(matched) => any_matched |= matched,
            Err(err) => trace!(%err, "disjunction child treated as non-match"),
        }
    }
    Ok(any_matched)
}

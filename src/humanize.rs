//! Rewrites humanized magnitudes in query text into plain numeric literals.
//!
//! Every maximal word of letters, digits, `_`, `.` (and `,` between two digits)
//! that starts with a digit is offered to four rules, first match wins:
//!
//! 1. durations (`10m`, `2h30m`, `1500ms`) become seconds,
//! 2. byte sizes (`10GB`, `10GiB`) become bytes,
//! 3. SI suffixes (`10M`, `2.5K`, uppercase only) are multiplied out,
//! 4. comma-grouped integers (`1,000,000`) lose their commas.
//!
//! Lowercase `m` is always minutes and uppercase `M` is always mega. Quoted
//! string literals are copied through untouched.

use std::fmt;
use std::ops::Range;

use crate::token::Span;

/// Normalizes every unquoted humanized value in `query`.
///
/// The output is a fixed point: normalizing it again yields the same text.
pub fn normalize(query: &str) -> String {
    normalize_mapped(query).into_text()
}

/// Normalized query text that remembers where each rewrite came from, so
/// offsets into it can be mapped back to the query as typed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Normalized {
    text: String,
    rewrites: Vec<Rewrite>,
}

/// One rewritten word: its byte range in the output and in the input.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Rewrite {
    output: Range<usize>,
    input: Range<usize>,
}

impl Normalized {
    /// Text that was not normalized; offsets map to themselves.
    pub fn unchanged(text: &str) -> Self {
        Normalized { text: text.to_string(), rewrites: Vec::new() }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn into_text(self) -> String {
        self.text
    }

    /// Maps a span over the normalized text onto the original text. A span
    /// boundary inside a rewritten value snaps to that value's boundaries.
    pub fn original_span(&self, span: Span) -> Span {
        Span::new(self.original_offset(span.start, false), self.original_offset(span.end, true))
    }

    fn original_offset(&self, offset: usize, is_end: bool) -> usize {
        let mut last: Option<&Rewrite> = None;
        for rewrite in &self.rewrites {
            if offset < rewrite.output.start || (is_end && offset == rewrite.output.start) {
                break;
            }
            if offset < rewrite.output.end {
                return if is_end { rewrite.input.end } else { rewrite.input.start };
            }
            last = Some(rewrite);
        }
        match last {
            Some(rewrite) => rewrite.input.end + (offset - rewrite.output.end),
            None => offset,
        }
    }
}

/// Like [`normalize`], keeping the mapping back to the input.
pub fn normalize_mapped(query: &str) -> Normalized {
    let mut out = String::with_capacity(query.len());
    let mut rewrites = Vec::new();
    let mut pos = 0;

    while let Some(c) = query[pos..].chars().next() {
        if c == '\'' {
            let end = quoted_end(query, pos);
            out.push_str(&query[pos..end]);
            pos = end;
            continue;
        }

        if is_word_char(c) {
            let end = word_end(query, pos);
            let word = &query[pos..end];
            let rest = &query[end..];
            match rewrite_word(word, rest) {
                Some(number) => {
                    let output_start = out.len();
                    out.push_str(&number);
                    // keep the rewritten number from fusing with a following `,digit`
                    if starts_with_grouping_comma(rest) {
                        out.push(' ');
                    }
                    rewrites.push(Rewrite { output: output_start..out.len(), input: pos..end });
                }
                None => out.push_str(word),
            }
            pos = end;
            continue;
        }

        out.push(c);
        pos += c.len_utf8();
    }

    Normalized { text: out, rewrites }
}

/// Rewrites a single word, returning `None` when no rule applies.
pub fn humanize_word(word: &str) -> Option<String> {
    if !word.starts_with(|c: char| c.is_ascii_digit()) {
        return None;
    }
    parse_duration(word)
        .or_else(|| parse_byte_size(word))
        .or_else(|| parse_si(word))
        .or_else(|| parse_grouped(word))
        .map(|value| value.to_string())
}

fn rewrite_word(word: &str, rest: &str) -> Option<String> {
    if is_exponent_prefix(word, rest) {
        return None;
    }
    humanize_word(word)
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '.'
}

fn word_end(query: &str, start: usize) -> usize {
    let mut end = start;
    let mut prev: Option<char> = None;
    let mut chars = query[start..].chars().peekable();
    while let Some(c) = chars.next() {
        let grouping = c == ','
            && prev.is_some_and(|p| p.is_ascii_digit())
            && chars.peek().is_some_and(|n| n.is_ascii_digit());
        if !is_word_char(c) && !grouping {
            break;
        }
        end += c.len_utf8();
        prev = Some(c);
    }
    end
}

/// Byte offset just past the closing quote, or the end of input when unclosed.
fn quoted_end(query: &str, start: usize) -> usize {
    let bytes = query.as_bytes();
    let mut i = start + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' if bytes.get(i + 1) == Some(&b'\'') => i += 2,
            b'\'' => return i + 1,
            _ => i += 1,
        }
    }
    bytes.len()
}

fn starts_with_grouping_comma(rest: &str) -> bool {
    let mut chars = rest.chars();
    chars.next() == Some(',') && chars.next().is_some_and(|c| c.is_ascii_digit())
}

/// `1E` in `1E+5` is the head of a scientific literal, not an SI value.
fn is_exponent_prefix(word: &str, rest: &str) -> bool {
    let Some(mantissa) = word.strip_suffix(['e', 'E']) else {
        return false;
    };
    let mut after = rest.chars();
    matches!(after.next(), Some('+' | '-'))
        && after.next().is_some_and(|c| c.is_ascii_digit())
        && !mantissa.is_empty()
        && mantissa.chars().all(|c| c.is_ascii_digit() || c == '.')
}

/// Largest number of fractional digits accepted in a humanized value.
const MAX_SCALE: u32 = 30;

/// An exact non-negative decimal, `mantissa / 10^scale`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Decimal {
    mantissa: u128,
    scale: u32,
}

impl Decimal {
    const fn integer(value: u128) -> Self {
        Decimal { mantissa: value, scale: 0 }
    }

    const fn fraction(mantissa: u128, scale: u32) -> Self {
        Decimal { mantissa, scale }
    }

    /// Parses a leading `digits[.digits]` and returns it with the unparsed rest.
    fn parse_prefix(s: &str) -> Option<(Decimal, &str)> {
        let int_len = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
        if int_len == 0 {
            return None;
        }
        let mut mantissa: u128 = 0;
        for b in s[..int_len].bytes() {
            mantissa = mantissa.checked_mul(10)?.checked_add(u128::from(b - b'0'))?;
        }

        let mut rest = &s[int_len..];
        let mut scale = 0;
        if let Some(after_dot) = rest.strip_prefix('.') {
            let frac_len = after_dot
                .find(|c: char| !c.is_ascii_digit())
                .unwrap_or(after_dot.len());
            if frac_len > 0 {
                if frac_len > MAX_SCALE as usize {
                    return None;
                }
                for b in after_dot[..frac_len].bytes() {
                    mantissa = mantissa.checked_mul(10)?.checked_add(u128::from(b - b'0'))?;
                }
                scale = frac_len as u32;
                rest = &after_dot[frac_len..];
            }
        }

        Some((Decimal { mantissa, scale }, rest))
    }

    fn checked_mul(self, other: Decimal) -> Option<Decimal> {
        Decimal {
            mantissa: self.mantissa.checked_mul(other.mantissa)?,
            scale: self.scale + other.scale,
        }
        .reduced()
    }

    fn checked_add(self, other: Decimal) -> Option<Decimal> {
        let scale = self.scale.max(other.scale);
        let lhs = self.mantissa.checked_mul(10u128.checked_pow(scale - self.scale)?)?;
        let rhs = other.mantissa.checked_mul(10u128.checked_pow(scale - other.scale)?)?;
        Decimal { mantissa: lhs.checked_add(rhs)?, scale }.reduced()
    }

    /// Drops trailing fractional zeros; fails if the scale stays out of range.
    fn reduced(mut self) -> Option<Decimal> {
        while self.scale > 0 && self.mantissa % 10 == 0 {
            self.mantissa /= 10;
            self.scale -= 1;
        }
        (self.scale <= MAX_SCALE).then_some(self)
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.scale == 0 {
            return write!(f, "{}", self.mantissa);
        }
        // scale is bounded by MAX_SCALE, so the power always fits
        let divisor = 10u128.pow(self.scale);
        let width = self.scale as usize;
        write!(f, "{}.{:0width$}", self.mantissa / divisor, self.mantissa % divisor)
    }
}

/// Seconds per duration unit. `m` is matched case-sensitively before this table.
const TIME_UNITS: &[(&str, Decimal)] = &[
    ("ns", Decimal::fraction(1, 9)),
    ("us", Decimal::fraction(1, 6)),
    ("µs", Decimal::fraction(1, 6)),
    ("μs", Decimal::fraction(1, 6)),
    ("ms", Decimal::fraction(1, 3)),
    ("s", Decimal::integer(1)),
    ("h", Decimal::integer(3_600)),
    ("d", Decimal::integer(86_400)),
];

const MINUTE: Decimal = Decimal::integer(60);

fn time_unit(unit: &str) -> Option<Decimal> {
    if unit == "m" {
        return Some(MINUTE);
    }
    let lower = unit.to_lowercase();
    TIME_UNITS
        .iter()
        .find(|(name, _)| *name == lower)
        .map(|(_, seconds)| *seconds)
}

/// Parses `1d12h`, `2h30m`, `1500ms`, ... into seconds.
fn parse_duration(word: &str) -> Option<Decimal> {
    let mut rest = word;
    let mut total = Decimal::integer(0);
    while !rest.is_empty() {
        let (amount, after) = Decimal::parse_prefix(rest)?;
        let unit_len = after
            .find(|c: char| c.is_ascii_digit() || c == '.' || c == ',')
            .unwrap_or(after.len());
        if unit_len == 0 {
            return None;
        }
        let unit = time_unit(&after[..unit_len])?;
        total = total.checked_add(amount.checked_mul(unit)?)?;
        rest = &after[unit_len..];
    }
    Some(total)
}

const DECIMAL_BYTE_UNITS: [&str; 9] = ["B", "KB", "MB", "GB", "TB", "PB", "EB", "ZB", "YB"];
const BINARY_BYTE_UNITS: [&str; 8] = ["KiB", "MiB", "GiB", "TiB", "PiB", "EiB", "ZiB", "YiB"];

fn parse_byte_size(word: &str) -> Option<Decimal> {
    let (amount, unit) = Decimal::parse_prefix(word)?;
    let multiplier = if let Some(exp) = DECIMAL_BYTE_UNITS.iter().position(|u| *u == unit) {
        1000u128.pow(exp as u32)
    } else if let Some(exp) = BINARY_BYTE_UNITS.iter().position(|u| *u == unit) {
        1024u128.pow(exp as u32 + 1)
    } else {
        return None;
    };
    amount.checked_mul(Decimal::integer(multiplier))
}

const SI_PREFIXES: [char; 8] = ['K', 'M', 'G', 'T', 'P', 'E', 'Z', 'Y'];

fn parse_si(word: &str) -> Option<Decimal> {
    let (amount, suffix) = Decimal::parse_prefix(word)?;
    let mut chars = suffix.chars();
    let prefix = chars.next()?;
    if chars.next().is_some() {
        return None;
    }
    let exp = SI_PREFIXES.iter().position(|p| *p == prefix)?;
    amount.checked_mul(Decimal::integer(1000u128.pow(exp as u32 + 1)))
}

fn parse_grouped(word: &str) -> Option<Decimal> {
    if !word.contains(',') || word.contains('.') {
        return None;
    }
    let digits: String = word.chars().filter(|c| *c != ',').collect();
    if !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    digits.parse::<u128>().ok().map(Decimal::integer)
}

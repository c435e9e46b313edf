// src/extractors/number.rs
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::fmt;

// Either a thousands-grouped run (1-3 digits, then groups of exactly 3) or a plain digit run,
// with an optional decimal part. A group separator is a single space, comma, or narrow/no-break space;
// two spaces end the number, which is how adjacent columns stay apart.
static NUMBER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:\d{1,3}(?:[ ,\u{00A0}\u{202F}\u{2009}]\d{3})+|\d+)(?:\.\d+)?")
        .expect("Failed to compile NUMBER_RE")
});

const MINUS_SIGNS: [char; 3] = ['-', '\u{2212}', '\u{2013}'];

/// A parsed figure in the statement's native unit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Integer(i64),
    Decimal(f64),
}

impl Value {
    pub fn as_f64(self) -> f64 {
        match self {
            Value::Integer(value) => value as f64,
            Value::Decimal(value) => value,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Integer(value) => write!(f, "{value}"),
            Value::Decimal(value) => write!(f, "{value}"),
        }
    }
}

/// A number found in a text fragment. Offsets are byte positions including any sign.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NumberMatch {
    pub value: Value,
    pub start: usize,
    pub end: usize,
}

/// Returns the first embedded signed number, or `None` when the fragment holds no digit run.
///
/// With `allow_decimal` a fractional figure stays a [`Value::Decimal`]; otherwise it is
/// truncated to an integer ("458.0" -> 458).
pub fn parse_number(text: &str, allow_decimal: bool) -> Option<Value> {
    first_number(text, allow_decimal).map(|found| found.value)
}

pub fn first_number(text: &str, allow_decimal: bool) -> Option<NumberMatch> {
    find_numbers(text, allow_decimal).into_iter().next()
}

/// All numbers in reading order.
pub fn find_numbers(text: &str, allow_decimal: bool) -> Vec<NumberMatch> {
    NUMBER_RE
        .find_iter(text)
        .filter_map(|found| {
            let before = &text[..found.start()];
            let mut preceding = before.chars().rev();
            let (negative, start) = match preceding.next() {
                Some(ch) if MINUS_SIGNS.contains(&ch) => {
                    // A dash directly after a digit is a range ("2020-2024"), not a sign.
                    let is_range = preceding.next().is_some_and(|prev| prev.is_ascii_digit());
                    if is_range {
                        (false, found.start())
                    } else {
                        (true, found.start() - ch.len_utf8())
                    }
                }
                // Digits glued to a word ("AP2", "Q2") are part of the word.
                Some(ch) if ch.is_alphanumeric() || ch == '.' => return None,
                // Accounting notation: "(2 410)" is -2410.
                Some('(') if text[found.end()..].starts_with(')') => {
                    let value = convert(found.as_str(), true, allow_decimal)?;
                    return Some(NumberMatch {
                        value,
                        start: found.start() - 1,
                        end: found.end() + 1,
                    });
                }
                _ => (false, found.start()),
            };
            let value = convert(found.as_str(), negative, allow_decimal)?;
            Some(NumberMatch {
                value,
                start,
                end: found.end(),
            })
        })
        .collect()
}

fn convert(digits: &str, negative: bool, allow_decimal: bool) -> Option<Value> {
    let cleaned = digits
        .chars()
        .filter(|ch| ch.is_ascii_digit() || *ch == '.')
        .collect::<String>();
    let sign = if negative { -1.0 } else { 1.0 };

    if cleaned.contains('.') {
        let value = cleaned.parse::<f64>().ok()? * sign;
        return Some(if allow_decimal {
            Value::Decimal(value)
        } else {
            Value::Integer(value.trunc() as i64)
        });
    }

    let value = cleaned.parse::<i64>().ok()?;
    Some(Value::Integer(if negative { -value } else { value }))
}

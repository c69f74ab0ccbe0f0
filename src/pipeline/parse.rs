//! Response parsing: recover the task's JSON object from free-form model text.
//!
//! ## Why not just `serde_json::from_str`?
//!
//! Even well-prompted models occasionally wrap their answer in
//! ` ```json ... ``` ` fences, prefix it with "Voici le quiz :", or append a
//! closing remark. The parser therefore tries progressively looser strategies
//! and, when none yields the task's shape, returns the shape's empty value.
//! It never returns an error: a degraded result is preferred to a failed
//! request.
//!
//! ## Strategy order
//!
//! 1. **Strict**: the trimmed response is the JSON object.
//! 2. **Balanced scan**: walk the text with a string-aware bracket matcher
//!    and try each top-level `{ … }` candidate in order. Braces inside JSON
//!    string literals (e.g. a LaTeX formula in a summary) do not confuse it.
//! 3. **First/last slice**: the span from the first `{` to the last `}`.
//!    Kept as a last resort for responses whose earlier candidates are
//!    unbalanced because of a stray brace in the surrounding prose.
//! 4. **Fallback**: `T::default()`.
//!
//! A candidate only counts when it is an object holding at least one of the
//! task's top-level keys ([`TaskResult::KEYS`]).

use crate::output::{ParseOutcome, TaskResult};
use tracing::{debug, warn};

/// A decoded result and how it was obtained.
#[derive(Debug, Clone, PartialEq)]
pub struct Parsed<T> {
    pub value: T,
    pub outcome: ParseOutcome,
    /// Items removed by [`TaskResult::sanitize`].
    pub discarded: usize,
}

/// Decode the task result from raw model output. Never fails.
pub fn parse_response<T: TaskResult>(raw: &str) -> Parsed<T> {
    let (value, outcome) = match locate::<T>(raw) {
        Some((value, outcome)) => (value, outcome),
        None => {
            warn!(
                "{}: no decodable JSON in {} chars of model output; returning empty result",
                T::TASK.name(),
                raw.len()
            );
            (T::default(), ParseOutcome::Fallback)
        }
    };

    let mut value = value;
    let discarded = value.sanitize();
    if discarded > 0 {
        warn!("{}: discarded {} malformed item(s)", T::TASK.name(), discarded);
    }

    Parsed {
        value,
        outcome,
        discarded,
    }
}

fn locate<T: TaskResult>(raw: &str) -> Option<(T, ParseOutcome)> {
    let trimmed = raw.trim();

    if let Ok(v) = decode_object::<T>(trimmed) {
        return Some((v, ParseOutcome::Strict));
    }

    for candidate in balanced_objects(trimmed) {
        match decode_object::<T>(candidate) {
            Ok(v) => {
                debug!("{}: decoded embedded object of {} chars", T::TASK.name(), candidate.len());
                return Some((v, ParseOutcome::Embedded));
            }
            Err(e) => debug!("{}: candidate rejected: {}", T::TASK.name(), e),
        }
    }

    let slice = first_to_last_brace(trimmed)?;
    decode_object::<T>(slice)
        .ok()
        .map(|v| (v, ParseOutcome::Embedded))
}

/// Decode `text` as `T`, requiring a JSON object that carries at least one
/// of the task's top-level keys.
///
/// Every field of a result type has a default, so without the key check an
/// unrelated object (`{}`, `{"langue": "fr"}`) would decode as an empty result.
fn decode_object<T: TaskResult>(text: &str) -> Result<T, serde_json::Error> {
    let value: serde_json::Value = serde_json::from_str(text)?;
    let Some(object) = value.as_object() else {
        return Err(serde::de::Error::custom("top-level JSON value is not an object"));
    };
    if !T::KEYS.iter().any(|key| object.contains_key(*key)) {
        return Err(serde::de::Error::custom(format!(
            "object has none of the keys {:?}",
            T::KEYS
        )));
    }
    serde_json::from_value(value)
}

/// Every top-level balanced `{ … }` span, in order of appearance.
///
/// Quotes only count inside a candidate, so an apostrophe or a stray `"` in
/// the surrounding prose does not derail the scan.
pub(crate) fn balanced_objects(text: &str) -> Vec<&str> {
    let bytes = text.as_bytes();
    let mut spans = Vec::new();
    let mut depth = 0usize;
    let mut start = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, &b) in bytes.iter().enumerate() {
        if depth > 0 && in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }
        match b {
            b'"' if depth > 0 => in_string = true,
            b'{' => {
                if depth == 0 {
                    start = i;
                }
                depth += 1;
            }
            b'}' if depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    spans.push(&text[start..=i]);
                }
            }
            _ => {}
        }
    }

    spans
}

/// The span from the first `{` to the last `}`, when the first precedes the last.
pub(crate) fn first_to_last_brace(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (start < end).then(|| &text[start..=end])
}

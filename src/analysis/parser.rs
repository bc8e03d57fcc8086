//! Helpers for turning model replies into typed values.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Deserializer};

/// Returns the body of the first markdown code fence in `text`, or the whole
/// trimmed text when there is no fence.
///
/// Accepts ```` ```json ... ``` ````, bare ```` ``` ... ``` ```` and an unterminated
/// opening fence. Total over any input and idempotent: feeding the output back
/// in returns it unchanged, as long as the fenced body holds no fence itself.
pub fn strip_code_fences(text: &str) -> &str {
    lazy_static! {
        static ref FENCED: Regex = Regex::new(r"(?s)```[A-Za-z0-9_+-]*(.*?)(?:```|\z)").unwrap();
    }
    match FENCED.captures(text).and_then(|c| c.get(1)) {
        Some(body) => body.as_str().trim(),
        None => text.trim(),
    }
}

/// Parses a JSON value out of a model reply, stripping code fences first.
pub fn parse_model_json<T: serde::de::DeserializeOwned>(text: &str) -> serde_json::Result<T> {
    serde_json::from_str(strip_code_fences(text))
}

/// Deserializes a number that models sometimes send as a string ("450", "450g").
/// Anything unreadable becomes `None` instead of failing the whole object.
pub fn lenient_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(number_from_value))
}

fn number_from_value(value: &serde_json::Value) -> Option<f64> {
    lazy_static! {
        static ref LEADING_NUMBER: Regex = Regex::new(r"^\s*(-?\d+(?:\.\d+)?)").unwrap();
    }
    let n = match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => LEADING_NUMBER
            .captures(s)
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().parse::<f64>().ok()),
        _ => None,
    };
    n.filter(|v| v.is_finite())
}

/// Rounds to one decimal place.
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

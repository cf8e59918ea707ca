//! Sensitive-data redaction.
//!
//! Applied to every string before it reaches either log, recursively
//! through arrays and objects. Object keys are left alone.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

/// Replacement for every sensitive match.
pub const REDACTION_TOKEN: &str = "[REDACTED]";

static SENSITIVE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        // payment card
        r"\b\d{4}[-\s]?\d{4}[-\s]?\d{4}[-\s]?\d{4}\b",
        // SSN-style government id
        r"\b\d{3}-\d{2}-\d{4}\b",
        // email
        r"(?i)\b[A-Z0-9._%+-]+@[A-Z0-9.-]+\.[A-Z]{2,}\b",
        r"(?i)\bpassword\s*[:=]\s*\S+",
        r"(?i)\bapi[_-]?key\s*[:=]\s*\S+",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("redaction pattern compiles"))
    .collect()
});

/// Redact one string.
pub fn redact_str(text: &str) -> String {
    let mut out = text.to_string();
    for rx in SENSITIVE_PATTERNS.iter() {
        if rx.is_match(&out) {
            out = rx.replace_all(&out, REDACTION_TOKEN).into_owned();
        }
    }
    out
}

/// Redact every string value inside `value`.
pub fn redact_value(value: &Value) -> Value {
    match value {
        Value::String(s) => Value::String(redact_str(s)),
        Value::Array(items) => Value::Array(items.iter().map(redact_value).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), redact_value(v)))
                .collect(),
        ),
        other => other.clone(),
    }
}

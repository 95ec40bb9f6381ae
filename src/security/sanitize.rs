//! Input scrubbing.
//!
//! Strings lose semicolons, backslashes, SQL comment markers and the
//! keywords UNION, SELECT, INSERT, UPDATE, DELETE, DROP, EXEC, CREATE and
//! ALTER (case-insensitive, whole words), then are trimmed. Arrays and
//! objects are walked recursively; object keys and non-string scalars are
//! left alone.
//!
//! This is lossy for legitimate text: a free-text field reading
//! "please select a course" becomes "please  a course". The store boundary
//! already passes values as parameters, so the scrubbing is kept for
//! observable compatibility rather than as the injection defence.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

static SQL_KEYWORDS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(union|select|insert|update|delete|drop|exec|create|alter)\b")
        .expect("SQL keyword pattern is valid")
});

const STRIPPED_TOKENS: [&str; 5] = [";", "\\", "--", "/*", "*/"];

/// Scrub a single string.
pub fn sanitize_str(input: &str) -> String {
    let mut out = input.to_string();
    for token in STRIPPED_TOKENS {
        out = out.replace(token, "");
    }
    let out = SQL_KEYWORDS.replace_all(&out, "");
    out.trim().to_string()
}

/// Scrub every string inside `value`.
pub fn sanitize_user_input(value: &Value) -> Value {
    match value {
        Value::String(s) => Value::String(sanitize_str(s)),
        Value::Array(items) => Value::Array(items.iter().map(sanitize_user_input).collect()),
        Value::Object(fields) => Value::Object(
            fields
                .iter()
                .map(|(k, v)| (k.clone(), sanitize_user_input(v)))
                .collect(),
        ),
        other => other.clone(),
    }
}

/// Every string contained in `value`, depth first.
pub fn collect_strings<'a>(value: &'a Value, out: &mut Vec<&'a str>) {
    match value {
        Value::String(s) => out.push(s),
        Value::Array(items) => items.iter().for_each(|v| collect_strings(v, out)),
        Value::Object(fields) => fields.values().for_each(|v| collect_strings(v, out)),
        _ => {}
    }
}

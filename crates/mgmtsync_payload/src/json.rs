//! JSON payload helpers.
//!
//! Parsing is permissive about `//` and `/* */` comments, which are common in
//! hand-maintained configuration files but not part of standard JSON.

use crate::error::{PayloadError, PayloadResult};
use serde_json::{Map, Value};

/// Removes `//` and `/* */` comments that appear outside string literals.
///
/// Each comment is replaced by a single space (line comments keep their
/// terminating newline) so adjacent tokens never merge.
pub fn strip_comments(text: &str) -> PayloadResult<String> {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    let mut in_string = false;
    let mut escaped = false;

    while let Some(c) = chars.next() {
        if in_string {
            out.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }

        match (c, chars.peek()) {
            ('"', _) => {
                in_string = true;
                out.push(c);
            }
            ('/', Some('/')) => {
                for next in chars.by_ref() {
                    if next == '\n' {
                        out.push('\n');
                        break;
                    }
                }
            }
            ('/', Some('*')) => {
                chars.next();
                let mut closed = false;
                let mut prev = '\0';
                for next in chars.by_ref() {
                    if prev == '*' && next == '/' {
                        closed = true;
                        break;
                    }
                    prev = next;
                }
                if !closed {
                    return Err(PayloadError::json("unterminated block comment"));
                }
                out.push(' ');
            }
            _ => out.push(c),
        }
    }

    Ok(out)
}

/// Parses a JSON document, tolerating comments.
pub fn parse_lenient(text: &str) -> PayloadResult<Value> {
    let stripped = strip_comments(text)?;
    serde_json::from_str(&stripped).map_err(|e| PayloadError::json(e.to_string()))
}

/// Parses a JSON document whose root must be an object.
pub fn parse_object(text: &str) -> PayloadResult<Map<String, Value>> {
    match parse_lenient(text)? {
        Value::Object(map) => Ok(map),
        other => Err(PayloadError::json(format!(
            "expected a JSON object at the root, found {}",
            kind_name(&other)
        ))),
    }
}

/// Renders a field value as the string the management API compares against.
///
/// Returns `None` for `null`.
pub fn render_value(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Array(_) | Value::Object(_) => Some(value.to_string()),
    }
}

/// Re-serializes `text` as compact, standard JSON with comments removed.
pub fn sanitize(text: &str) -> PayloadResult<String> {
    let value = parse_lenient(text)?;
    serde_json::to_string(&value).map_err(|e| PayloadError::json(e.to_string()))
}

fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

//! Redaction and truncation of logged bodies.
//!
//! [`redact`] is a textual pass over JSON-looking `"field": "value"` pairs. It
//! does not parse, so it also works on bodies that are not valid JSON, and it
//! misses sensitive values that are not strings (`"pin": 1234`). Bodies that do
//! parse get a second, structural pass with [`mask_fields`] before logging.
//!
//! Nothing here touches the bytes sent over the wire.

use std::borrow::Cow;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

/// Replaces the value of every sensitive field.
pub const MASK: &str = "***";

/// Appended to a body cut at the configured length.
pub const TRUNCATION_MARKER: &str = "...[TRUNCATED]";

/// Field names whose values never reach the log. Matched case-insensitively.
pub const SENSITIVE_FIELDS: [&str; 4] = ["password", "token", "otp", "pin"];

/// Headers whose values never reach the log.
const SENSITIVE_HEADERS: [&str; 4] = ["authorization", "proxy-authorization", "cookie", "set-cookie"];

// `"password" : "` + value (escape aware) + `"`
static SENSITIVE_PAIR: LazyLock<Regex> = LazyLock::new(|| {
    let fields = SENSITIVE_FIELDS.join("|");
    Regex::new(&format!(r#"(?i)("(?:{fields})"\s*:\s*")(?:[^"\\]|\\.)*(")"#))
        .expect("sensitive field pattern is valid")
});

/// Masks the string value of every sensitive `"field": "value"` pair.
///
/// Field names match case-insensitively; everything else, including
/// whitespace around the colon, is preserved. Idempotent.
pub fn redact(body: &str) -> Cow<'_, str> {
    SENSITIVE_PAIR.replace_all(body, format!("${{1}}{MASK}${{2}}"))
}

/// Cuts `body` to its first `max_chars` characters plus [`TRUNCATION_MARKER`].
///
/// Returns `body` unchanged when it is no longer than `max_chars`. Counts
/// `char`s, so a multi-byte character is never split.
pub fn truncate(body: &str, max_chars: usize) -> Cow<'_, str> {
    match body.char_indices().nth(max_chars) {
        None => Cow::Borrowed(body),
        Some((cut, _)) => Cow::Owned(format!("{}{TRUNCATION_MARKER}", &body[..cut])),
    }
}

/// Masks the value of every sensitive key in `value`, at any depth and of
/// any type.
pub(crate) fn mask_fields(value: &mut Value) {
    match value {
        Value::Object(map) => {
            for (key, field) in map.iter_mut() {
                if is_sensitive_field(key) {
                    *field = Value::String(MASK.to_owned());
                } else {
                    mask_fields(field);
                }
            }
        }
        Value::Array(items) => items.iter_mut().for_each(mask_fields),
        _ => {}
    }
}

/// Value of header `name` as it may appear in a log line.
pub(crate) fn header_value<'a>(name: &str, value: &'a str) -> &'a str {
    if SENSITIVE_HEADERS.iter().any(|h| h.eq_ignore_ascii_case(name)) {
        MASK
    } else {
        value
    }
}

fn is_sensitive_field(key: &str) -> bool {
    SENSITIVE_FIELDS.iter().any(|f| f.eq_ignore_ascii_case(key))
}

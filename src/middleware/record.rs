//! Log records and where they go.

use std::borrow::Cow;
use std::fmt;
use std::time::Duration;

use serde::{Serialize, Serializer};
use serde_json::Value;
use tracing::info;

use super::capture::HeaderList;
use super::redact;
use super::request_log::RequestId;

/// One structured log line.
#[derive(Clone, Debug, Serialize)]
#[serde(untagged)]
pub enum LogRecord {
    Request(RequestRecord),
    Response(ResponseRecord),
}

impl LogRecord {
    /// `"Request"` or `"Response"`, as used in the log line prefix.
    pub fn direction(&self) -> &'static str {
        match self {
            Self::Request(_) => "Request",
            Self::Response(_) => "Response",
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct RequestRecord {
    #[serde(rename = "METHOD")]
    pub method: String,
    #[serde(rename = "URI")]
    pub uri: String,
    #[serde(rename = "HEADERS")]
    pub headers: HeaderList,
    #[serde(rename = "REQUEST BODY")]
    pub body: Option<LoggedBody>,
}

#[derive(Clone, Debug, Serialize)]
pub struct ResponseRecord {
    /// `None` when no response was produced.
    #[serde(rename = "STATUS")]
    pub status: Option<u16>,
    #[serde(rename = "RESPONSE BODY")]
    pub body: Option<LoggedBody>,
    #[serde(rename = "RESPONSE TIME", serialize_with = "millis")]
    pub elapsed: Duration,
}

fn millis<S: Serializer>(elapsed: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(&format_args!("{} ms", elapsed.as_millis()))
}

/// A body as it appears in a log record.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum LoggedBody {
    /// The body parsed as JSON, sensitive fields masked.
    Json(Value),
    /// The body exceeded the length limit: its masked prefix plus
    /// [`TRUNCATION_MARKER`](super::TRUNCATION_MARKER).
    Truncated(String),
}

impl LoggedBody {
    /// Turns raw body bytes into their logged form.
    ///
    /// Blank bodies log as `None`. JSON bodies are masked by key, then
    /// serialized and cut to `max_chars` when longer. Bodies that do not parse
    /// are only logged when they are over the limit and open like JSON (`{` or
    /// `[`), as truncated redacted text; otherwise the parse error is returned
    /// for the caller to report.
    pub fn from_bytes(raw: &[u8], max_chars: usize) -> Result<Option<Self>, serde_json::Error> {
        let text = String::from_utf8_lossy(raw);
        let trimmed = text.trim_start();
        if trimmed.is_empty() {
            return Ok(None);
        }
        let redacted = redact::redact(&text);
        match serde_json::from_str::<Value>(&redacted) {
            Ok(mut value) => {
                redact::mask_fields(&mut value);
                let compact = serde_json::to_string(&value)?;
                match redact::truncate(&compact, max_chars) {
                    Cow::Owned(truncated) => Ok(Some(Self::Truncated(truncated))),
                    Cow::Borrowed(_) => Ok(Some(Self::Json(value))),
                }
            }
            Err(e) if trimmed.starts_with(['{', '[']) => match redact::truncate(&redacted, max_chars) {
                Cow::Owned(truncated) => Ok(Some(Self::Truncated(truncated))),
                Cow::Borrowed(_) => Err(e),
            },
            Err(e) => Err(e),
        }
    }
}

// ── Sinks ─────────────────────────────────────────────────────────────────────

/// A record could not be emitted.
#[derive(Debug)]
pub enum LogError {
    Serialize(serde_json::Error),
    /// The sink panicked.
    Panicked,
}

impl fmt::Display for LogError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Serialize(e) => write!(f, "serialize: {e}"),
            Self::Panicked => f.write_str("log sink panicked"),
        }
    }
}

impl std::error::Error for LogError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Serialize(e) => Some(e),
            Self::Panicked => None,
        }
    }
}

impl From<serde_json::Error> for LogError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialize(e)
    }
}

/// Destination for log records.
///
/// Called on the request's task, inside its span. A sink error or panic is
/// reported and otherwise ignored; it never reaches the client.
pub trait LogSink: Send + Sync + 'static {
    fn emit(&self, request_id: &RequestId, record: &LogRecord) -> Result<(), LogError>;
}

/// Writes each record as one `info` event on target `loupe::http`:
///
/// ```text
/// [Request]: {"METHOD":"POST","URI":"/test/hello","HEADERS":{…},"REQUEST BODY":{…}}
/// [Response]: {"STATUS":200,"RESPONSE BODY":{…},"RESPONSE TIME":"3 ms"}
/// ```
///
/// The request id comes from the enclosing span.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn emit(&self, _request_id: &RequestId, record: &LogRecord) -> Result<(), LogError> {
        let line = serde_json::to_string(record)?;
        info!(target: "loupe::http", "[{}]: {line}", record.direction());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    use crate::middleware::TRUNCATION_MARKER;

    #[test]
    fn blank_bodies_log_as_null() {
        assert_eq!(LoggedBody::from_bytes(b"", 10).unwrap(), None);
        assert_eq!(LoggedBody::from_bytes(b" \n\t", 10).unwrap(), None);
    }

    #[test]
    fn json_body_is_parsed_and_masked() {
        let raw = br#"{"user_name":"alice","password":"secret123","pin":4321}"#;
        let body = LoggedBody::from_bytes(raw, 2000).unwrap();
        assert_eq!(
            body,
            Some(LoggedBody::Json(json!({"user_name": "alice", "password": "***", "pin": "***"})))
        );
    }

    #[test]
    fn long_body_is_truncated_text() {
        let raw = format!(r#"{{"data":"{}"}}"#, "x".repeat(3000));
        let Some(LoggedBody::Truncated(text)) = LoggedBody::from_bytes(raw.as_bytes(), 2000).unwrap()
        else {
            panic!("expected truncated body");
        };
        assert_eq!(text.chars().count(), 2000 + TRUNCATION_MARKER.len());
        assert!(text.starts_with(r#"{"data":"xxx"#));
        assert!(text.ends_with(TRUNCATION_MARKER));
    }

    #[test]
    fn truncation_applies_after_redaction() {
        let raw = format!(r#"{{"password":"{}","x":1}}"#, "s".repeat(100));
        let Some(LoggedBody::Truncated(text)) = LoggedBody::from_bytes(raw.as_bytes(), 20).unwrap()
        else {
            panic!("expected truncated body");
        };
        assert_eq!(text, format!(r#"{{"password":"***","x{TRUNCATION_MARKER}"#));
    }

    #[test]
    fn long_body_masks_non_string_values_before_truncating() {
        let raw = format!(
            r#"{{"pin":1234,"otp":987654,"password":"pw","data":"{}"}}"#,
            "x".repeat(3000)
        );
        let Some(LoggedBody::Truncated(text)) = LoggedBody::from_bytes(raw.as_bytes(), 2000).unwrap()
        else {
            panic!("expected truncated body");
        };
        assert!(text.starts_with(r#"{"pin":"***","otp":"***","password":"***","data":"xxx"#));
        assert!(!text.contains("1234"));
        assert!(!text.contains("987654"));
        assert_eq!(text.chars().count(), 2000 + TRUNCATION_MARKER.len());
    }

    #[test]
    fn short_and_long_bodies_mask_alike() {
        let short = LoggedBody::from_bytes(br#"{"pin":1234}"#, 2000).unwrap();
        assert_eq!(short, Some(LoggedBody::Json(json!({"pin": "***"}))));

        let long = format!(r#"{{"pin":1234,"pad":"{}"}}"#, "p".repeat(50));
        let Some(LoggedBody::Truncated(text)) = LoggedBody::from_bytes(long.as_bytes(), 20).unwrap()
        else {
            panic!("expected truncated body");
        };
        assert_eq!(text, format!(r#"{{"pin":"***","pad":"{TRUNCATION_MARKER}"#));
    }

    #[test]
    fn long_non_json_text_is_not_logged() {
        let raw = "plain text secret ".repeat(200);
        assert!(LoggedBody::from_bytes(raw.as_bytes(), 2000).is_err());
        assert!(LoggedBody::from_bytes(b"plain text secret", 2000).is_err());
    }

    #[test]
    fn long_malformed_json_is_truncated_text() {
        let raw = format!(r#"{{"password":"pw","data":"{}""#, "y".repeat(100));
        let Some(LoggedBody::Truncated(text)) = LoggedBody::from_bytes(raw.as_bytes(), 20).unwrap()
        else {
            panic!("expected truncated body");
        };
        assert_eq!(text, format!(r#"{{"password":"***","d{TRUNCATION_MARKER}"#));
    }

    #[test]
    fn non_json_body_is_a_parse_error() {
        assert!(LoggedBody::from_bytes(b"not json", 2000).is_err());
    }

    #[test]
    fn records_serialize_with_fixed_key_order() {
        let request = LogRecord::Request(RequestRecord {
            method: "POST".into(),
            uri: "/test/hello".into(),
            headers: HeaderList::default(),
            body: None,
        });
        assert_eq!(
            serde_json::to_string(&request).unwrap(),
            r#"{"METHOD":"POST","URI":"/test/hello","HEADERS":{},"REQUEST BODY":null}"#
        );

        let response = LogRecord::Response(ResponseRecord {
            status: Some(201),
            body: Some(LoggedBody::Json(json!({"b": 1, "a": 2}))),
            elapsed: Duration::from_millis(42),
        });
        assert_eq!(response.direction(), "Response");
        assert_eq!(
            serde_json::to_string(&response).unwrap(),
            r#"{"STATUS":201,"RESPONSE BODY":{"b":1,"a":2},"RESPONSE TIME":"42 ms"}"#
        );
    }
}

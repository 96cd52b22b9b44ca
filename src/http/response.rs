use crate::error::{ServerError, ServerResult};
use bytes::Bytes;
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::path::Path;

/// A response body handed to `Context::send`.
///
/// Text and raw bytes go out as-is; everything else is serialised as JSON.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Empty,
    Text(String),
    Bytes(Bytes),
    Json(Value),
}

impl Payload {
    pub fn json<T: Serialize>(value: &T) -> ServerResult<Payload> {
        Ok(Payload::Json(serde_json::to_value(value)?))
    }

    pub(crate) fn into_bytes(self) -> ServerResult<Bytes> {
        match self {
            Payload::Empty => Ok(Bytes::new()),
            Payload::Text(text) => Ok(Bytes::from(text)),
            Payload::Bytes(bytes) => Ok(bytes),
            Payload::Json(value) => Ok(Bytes::from(serde_json::to_vec(&value)?)),
        }
    }
}

impl From<&str> for Payload {
    fn from(s: &str) -> Self {
        Payload::Text(s.to_string())
    }
}

impl From<String> for Payload {
    fn from(s: String) -> Self {
        Payload::Text(s)
    }
}

impl From<Value> for Payload {
    fn from(v: Value) -> Self {
        Payload::Json(v)
    }
}

impl From<Bytes> for Payload {
    fn from(b: Bytes) -> Self {
        Payload::Bytes(b)
    }
}

impl From<Vec<u8>> for Payload {
    fn from(b: Vec<u8>) -> Self {
        Payload::Bytes(Bytes::from(b))
    }
}

impl From<()> for Payload {
    fn from(_: ()) -> Self {
        Payload::Empty
    }
}

/// Status line and headers of an outgoing response, independent of framing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseHead {
    pub status: u16,
    pub headers: Vec<(String, String)>,
}

impl ResponseHead {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: Vec::new(),
        }
    }

    /// Sets a header, replacing any earlier value with the same name.
    pub fn header<K: AsRef<str>, V: Into<String>>(&mut self, name: K, value: V) -> &mut Self {
        let name = name.as_ref().to_ascii_lowercase();
        self.headers.retain(|(existing, _)| *existing != name);
        self.headers.push((name, value.into()));
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Checks the status and every header against HTTP's grammar, so a bad
    /// head is refused before anything reaches the stream.
    pub fn validate(&self) -> ServerResult<()> {
        http::StatusCode::from_u16(self.status).map_err(|_| {
            ServerError::InternalError(format!("invalid status code {}", self.status))
        })?;
        for (name, value) in &self.headers {
            http::HeaderName::from_bytes(name.as_bytes()).map_err(|_| {
                ServerError::InternalError(format!("invalid header name {:?}", name))
            })?;
            http::HeaderValue::from_str(value).map_err(|_| {
                ServerError::InternalError(format!("invalid value for header {}", name))
            })?;
        }
        Ok(())
    }
}

/// Outgoing response state tracked on the context.
#[derive(Debug, Clone)]
pub struct ResponseState {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub(crate) sent: bool,
}

impl ResponseState {
    pub(crate) fn new() -> Self {
        Self {
            status: 200,
            headers: HashMap::new(),
            sent: false,
        }
    }

    pub fn is_sent(&self) -> bool {
        self.sent
    }
}

pub(crate) fn reason_phrase(status: u16) -> &'static str {
    http::StatusCode::from_u16(status)
        .ok()
        .and_then(|code| code.canonical_reason())
        .unwrap_or("Unknown Status")
}

/// Body written by the dispatcher for a failed request.
pub fn error_body(err: &ServerError) -> Value {
    json!({
        "error": reason_phrase(err.status_code()),
        "message": err.to_string(),
    })
}

pub(crate) fn content_type_for(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        Some("html") => "text/html",
        Some("css") => "text/css",
        Some("js") => "text/javascript",
        Some("json") => "application/json",
        Some("txt") => "text/plain",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("svg") => "image/svg+xml",
        Some("ico") => "image/x-icon",
        Some("pdf") => "application/pdf",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_is_sent_verbatim_and_values_as_json() {
        let text = Payload::from("plain").into_bytes().unwrap();
        assert_eq!(&text[..], b"plain");

        let value = Payload::from(json!({"ok": true})).into_bytes().unwrap();
        assert_eq!(&value[..], br#"{"ok":true}"#);
    }

    #[test]
    fn head_headers_are_replaced_case_insensitively() {
        let mut head = ResponseHead::new(200);
        head.header("Content-Type", "application/json");
        head.header("content-type", "text/plain");
        assert_eq!(head.headers.len(), 1);
        assert_eq!(head.get("CONTENT-TYPE"), Some("text/plain"));
    }

    #[test]
    fn malformed_heads_fail_validation() {
        let mut head = ResponseHead::new(200);
        head.header("x-ok", "fine");
        assert!(head.validate().is_ok());

        assert!(ResponseHead::new(42).validate().is_err());

        let mut head = ResponseHead::new(200);
        head.header("bad header", "v");
        assert!(head.validate().is_err());

        let mut head = ResponseHead::new(200);
        head.header("x-multi", "line\nbreak");
        assert!(head.validate().is_err());
    }

    #[test]
    fn error_body_carries_reason_and_message() {
        let body = error_body(&ServerError::internal("db down"));
        assert_eq!(body["error"], "Internal Server Error");
        assert_eq!(body["message"], "Internal error: db down");

        let body = error_body(&ServerError::BodyDecode("Invalid JSON".into()));
        assert_eq!(body["error"], "Bad Request");
    }

    #[test]
    fn content_type_is_inferred_from_extension() {
        assert_eq!(content_type_for(Path::new("a/b.html")), "text/html");
        assert_eq!(content_type_for(Path::new("blob")), "application/octet-stream");
    }
}

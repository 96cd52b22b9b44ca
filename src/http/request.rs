use crate::transport::BodyStream;
use bytes::Bytes;
use futures::stream::{self, StreamExt};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Default cap on a buffered request body.
pub const DEFAULT_BODY_LIMIT: usize = 1024 * 1024;

#[derive(Eq, Hash, PartialEq, Copy, Clone, Debug)]
pub enum Method {
    GET,
    POST,
    PUT,
    DELETE,
    HEAD,
    CONNECT,
    OPTIONS,
    TRACE,
    PATCH,
}

impl Method {
    pub const ALL: [Method; 9] = [
        Method::GET,
        Method::POST,
        Method::PUT,
        Method::DELETE,
        Method::PATCH,
        Method::HEAD,
        Method::OPTIONS,
        Method::CONNECT,
        Method::TRACE,
    ];

    /// Strict, case-insensitive parse.
    pub fn parse(s: &str) -> Option<Method> {
        Method::ALL
            .into_iter()
            .find(|method| method.as_str().eq_ignore_ascii_case(s))
    }

    /// Lenient parse used for inbound streams: anything unknown becomes GET.
    pub fn from_string(s: &str) -> Method {
        Method::parse(s).unwrap_or(Method::GET)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Method::GET => "GET",
            Method::POST => "POST",
            Method::PUT => "PUT",
            Method::DELETE => "DELETE",
            Method::HEAD => "HEAD",
            Method::CONNECT => "CONNECT",
            Method::OPTIONS => "OPTIONS",
            Method::TRACE => "TRACE",
            Method::PATCH => "PATCH",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct UnknownMethod(pub String);

impl fmt::Display for UnknownMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown HTTP method `{}`", self.0)
    }
}

impl std::error::Error for UnknownMethod {}

impl FromStr for Method {
    type Err = UnknownMethod;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Method::parse(s).ok_or_else(|| UnknownMethod(s.to_string()))
    }
}

/// A file part decoded from a `multipart/form-data` body.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadedFile {
    pub field: String,
    pub filename: String,
    pub content_type: String,
    pub data: Bytes,
}

impl UploadedFile {
    pub fn size(&self) -> usize {
        self.data.len()
    }
}

/// The inbound half of a stream.
///
/// `body` starts out as an empty JSON object and is filled in by the body
/// parsers; the raw bytes stay available through `Context::read_body`.
pub struct Request {
    pub method: Method,
    pub path: String,
    pub query: HashMap<String, String>,
    pub headers: HashMap<String, String>,
    pub body: Value,
    pub files: Vec<UploadedFile>,
    pub(crate) raw_body: Option<Bytes>,
    pub(crate) body_stream: Option<BodyStream>,
    pub(crate) body_limit: usize,
}

impl Request {
    /// Builds a request from a method and a request target (`/path?query`).
    pub fn new(method: Method, target: &str) -> Self {
        let (path, query) = split_target(target);
        Self {
            method,
            path,
            query,
            headers: HashMap::new(),
            body: Value::Object(Map::new()),
            files: Vec::new(),
            raw_body: None,
            body_stream: None,
            body_limit: DEFAULT_BODY_LIMIT,
        }
    }

    pub fn with_header<K: AsRef<str>, V: Into<String>>(mut self, name: K, value: V) -> Self {
        self.headers
            .insert(name.as_ref().to_ascii_lowercase(), value.into());
        self
    }

    pub fn with_body<B: Into<Bytes>>(mut self, body: B) -> Self {
        let body = body.into();
        self.body_stream = Some(stream::once(async move { Ok(body) }).boxed());
        self
    }

    pub fn with_body_stream(mut self, stream: BodyStream) -> Self {
        self.body_stream = Some(stream);
        self
    }

    pub fn with_body_limit(mut self, limit: usize) -> Self {
        self.body_limit = limit;
        self
    }

    pub fn get_header(&self, key: &str) -> Option<&str> {
        self.headers
            .get(&key.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn content_type(&self) -> &str {
        self.get_header("content-type").unwrap_or("")
    }

    pub fn get_method(&self) -> &Method {
        &self.method
    }

    pub fn file(&self, field: &str) -> Option<&UploadedFile> {
        self.files.iter().find(|file| file.field == field)
    }

    pub fn body_limit(&self) -> usize {
        self.body_limit
    }
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("method", &self.method)
            .field("path", &self.path)
            .field("query", &self.query)
            .field("headers", &self.headers)
            .field("body", &self.body)
            .field("files", &self.files)
            .field("buffered", &self.raw_body.is_some())
            .finish()
    }
}

pub(crate) fn split_target(target: &str) -> (String, HashMap<String, String>) {
    let (path, query) = match target.split_once('?') {
        Some((path, query)) => (path, parse_query(query)),
        None => (target, HashMap::new()),
    };
    let path = if path.is_empty() { "/" } else { path };
    (path.to_string(), query)
}

/// Parses `a=1&b=two` pairs; keys and values are percent-decoded and `+`
/// stands for a space. Later duplicates win.
pub fn parse_query(query: &str) -> HashMap<String, String> {
    query
        .split('&')
        .filter(|s| !s.is_empty())
        .map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            (decode_component(key), decode_component(value))
        })
        .collect()
}

pub(crate) fn decode_component(raw: &str) -> String {
    let raw = raw.replace('+', " ");
    match urlencoding::decode(&raw) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => raw,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_parsing_is_case_insensitive() {
        assert_eq!(Method::parse("get"), Some(Method::GET));
        assert_eq!(Method::parse("Patch"), Some(Method::PATCH));
        assert_eq!(Method::parse("BREW"), None);
        assert_eq!("DELETE".parse::<Method>(), Ok(Method::DELETE));
    }

    #[test]
    fn unknown_methods_fall_back_to_get() {
        assert_eq!(Method::from_string("PROPFIND"), Method::GET);
        assert_eq!(Method::from_string(""), Method::GET);
    }

    #[test]
    fn target_is_split_into_path_and_query() {
        let req = Request::new(Method::GET, "/search?q=rust+lang&page=2&flag");
        assert_eq!(req.path, "/search");
        assert_eq!(req.query.get("q").map(String::as_str), Some("rust lang"));
        assert_eq!(req.query.get("page").map(String::as_str), Some("2"));
        assert_eq!(req.query.get("flag").map(String::as_str), Some(""));
    }

    #[test]
    fn headers_are_looked_up_case_insensitively() {
        let req = Request::new(Method::POST, "/")
            .with_header("Content-Type", "application/json");
        assert_eq!(req.get_header("content-type"), Some("application/json"));
        assert_eq!(req.content_type(), "application/json");
        assert_eq!(req.body, Value::Object(Map::new()));
    }
}

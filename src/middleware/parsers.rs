//! Body parsing middlewares.
//!
//! Each parser looks at the request's `content-type`. When it names the
//! parser's format the body is buffered and decoded into `Request::body`
//! (and `Request::files` for multipart); otherwise the request passes through
//! untouched. A body that fails to decode ends the chain with
//! [`ServerError::BodyDecode`], which the dispatcher answers with a 400.

use crate::context::Context;
use crate::error::ServerError;
use crate::http::request::decode_component;
use crate::http::UploadedFile;
use crate::middleware::multipart;
use crate::middleware::{Flow, Middleware, MiddlewareResult};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, Default)]
pub struct JsonParser;

impl Middleware for JsonParser {
    fn call<'a>(&'a self, ctx: &'a mut Context) -> MiddlewareResult<'a> {
        Box::pin(async move {
            if !ctx.req.content_type().contains("application/json") {
                return Ok(Flow::Continue);
            }
            let raw = ctx.read_body().await?;
            ctx.req.body = serde_json::from_slice(&raw)
                .map_err(|e| ServerError::BodyDecode(format!("Invalid JSON: {}", e)))?;
            Ok(Flow::Continue)
        })
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct UrlEncodedParser;

impl Middleware for UrlEncodedParser {
    fn call<'a>(&'a self, ctx: &'a mut Context) -> MiddlewareResult<'a> {
        Box::pin(async move {
            if !ctx
                .req
                .content_type()
                .contains("application/x-www-form-urlencoded")
            {
                return Ok(Flow::Continue);
            }
            let raw = ctx.read_body().await?;
            let text = std::str::from_utf8(&raw)
                .map_err(|_| ServerError::BodyDecode("Invalid form body".to_string()))?;

            let mut form = Map::new();
            for pair in text.split('&').filter(|pair| !pair.is_empty()) {
                let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
                form.insert(decode_component(key), Value::String(decode_component(value)));
            }
            ctx.req.body = Value::Object(form);
            Ok(Flow::Continue)
        })
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MultipartParser;

impl Middleware for MultipartParser {
    fn call<'a>(&'a self, ctx: &'a mut Context) -> MiddlewareResult<'a> {
        Box::pin(async move {
            let content_type = ctx.req.content_type().to_string();
            if !content_type.contains("multipart/form-data") {
                return Ok(Flow::Continue);
            }
            let decode_error = |e: multipart::MultipartError| {
                ServerError::BodyDecode(format!("Error parsing form: {}", e))
            };

            let boundary = multipart::extract_boundary(&content_type).map_err(decode_error)?;
            let raw = ctx.read_body().await?;
            let parts = multipart::parse(&raw, &boundary).map_err(decode_error)?;

            let mut fields = Map::new();
            let mut files = Vec::new();
            for part in parts {
                match part.filename {
                    Some(filename) => files.push(UploadedFile {
                        field: part.name,
                        filename,
                        content_type: part
                            .content_type
                            .unwrap_or_else(|| "application/octet-stream".to_string()),
                        data: part.data,
                    }),
                    None => {
                        // non-UTF-8 text fields are skipped
                        if let Ok(text) = String::from_utf8(part.data.to_vec()) {
                            fields.insert(part.name, Value::String(text));
                        }
                    }
                }
            }

            ctx.req.body = Value::Object(fields);
            ctx.req.files = files;
            Ok(Flow::Continue)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{Method, Request};
    use crate::transport::memory::MemorySink;
    use serde_json::json;

    fn context(content_type: &str, body: &'static str) -> Context {
        let (sink, _) = MemorySink::new();
        let req = Request::new(Method::POST, "/")
            .with_header("content-type", content_type)
            .with_body(body);
        Context::new(req, sink)
    }

    #[tokio::test]
    async fn json_bodies_are_decoded() {
        let mut ctx = context("application/json; charset=utf-8", r#"{"name":"X","email":"y@z"}"#);
        assert_eq!(JsonParser.call(&mut ctx).await.unwrap(), Flow::Continue);
        assert_eq!(ctx.req.body, json!({"name": "X", "email": "y@z"}));
    }

    #[tokio::test]
    async fn malformed_json_is_a_decode_failure() {
        let mut ctx = context("application/json", "{not json");
        let err = JsonParser.call(&mut ctx).await.unwrap_err();
        assert!(matches!(err, ServerError::BodyDecode(_)));
        assert_eq!(err.status_code(), 400);
        assert!(!ctx.is_sent());
    }

    #[tokio::test]
    async fn other_content_types_pass_through() {
        let mut ctx = context("text/plain", "{not json");
        assert_eq!(JsonParser.call(&mut ctx).await.unwrap(), Flow::Continue);
        assert_eq!(ctx.req.body, json!({}));
        // body left unread for the handler
        assert_eq!(&ctx.read_body().await.unwrap()[..], b"{not json");
    }

    #[tokio::test]
    async fn urlencoded_forms_become_flat_objects() {
        let mut ctx = context(
            "application/x-www-form-urlencoded",
            "name=Ada+Lovelace&lang=en%2Dgb&empty=",
        );
        UrlEncodedParser.call(&mut ctx).await.unwrap();
        assert_eq!(
            ctx.req.body,
            json!({"name": "Ada Lovelace", "lang": "en-gb", "empty": ""})
        );
    }

    #[tokio::test]
    async fn multipart_fills_fields_and_files() {
        let body = "--b1\r\n\
            Content-Disposition: form-data; name=\"caption\"\r\n\r\n\
            holiday\r\n\
            --b1\r\n\
            Content-Disposition: form-data; name=\"photo\"; filename=\"beach.png\"\r\n\
            Content-Type: image/png\r\n\r\n\
            PNGDATA\r\n\
            --b1--\r\n";
        let mut ctx = context("multipart/form-data; boundary=b1", body);
        MultipartParser.call(&mut ctx).await.unwrap();

        assert_eq!(ctx.req.body, json!({"caption": "holiday"}));
        let photo = ctx.req.file("photo").unwrap();
        assert_eq!(photo.filename, "beach.png");
        assert_eq!(photo.content_type, "image/png");
        assert_eq!(&photo.data[..], b"PNGDATA");
    }

    #[tokio::test]
    async fn multipart_without_boundary_is_rejected() {
        let mut ctx = context("multipart/form-data", "--x--");
        let err = MultipartParser.call(&mut ctx).await.unwrap_err();
        assert_eq!(err.status_code(), 400);
    }
}

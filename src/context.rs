//! Per-stream request context.
//!
//! A [`Context`] owns the inbound [`Request`], the outgoing response state
//! and the stream the response is written to. It allows exactly one response
//! head per stream: once `send`, `json`, `stream_file` or `send_file` has
//! started a response, every further attempt fails with
//! [`ServerError::ResponseAlreadySent`] and writes nothing.

use crate::error::{ServerError, ServerResult};
use crate::http::response::{content_type_for, error_body};
use crate::http::{Method, Payload, Request, ResponseHead, ResponseState};
use crate::router::{Metadata, Params};
use crate::transport::ResponseSink;
use bytes::{Bytes, BytesMut};
use futures::StreamExt;
use serde::Serialize;
use std::io;
use std::path::Path;
use std::time::SystemTime;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::warn;

const STREAM_CHUNK: usize = 16 * 1024;

pub struct Context {
    pub req: Request,
    pub res: ResponseState,
    /// Route parameters, filled in once a route matched.
    pub params: Params,
    /// Metadata of the matched route.
    pub metadata: Metadata,
    sink: Box<dyn ResponseSink>,
    streaming: bool,
}

impl Context {
    pub fn new<S: ResponseSink + 'static>(req: Request, sink: S) -> Self {
        Self {
            req,
            res: ResponseState::new(),
            params: Params::default(),
            metadata: Metadata::new(),
            sink: Box::new(sink),
            streaming: false,
        }
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name)
    }

    pub fn is_sent(&self) -> bool {
        self.res.sent
    }

    /// Stages a header for whichever response this context eventually writes.
    pub fn set_header<K: AsRef<str>, V: Into<String>>(&mut self, name: K, value: V) -> &mut Self {
        self.res
            .headers
            .insert(name.as_ref().to_ascii_lowercase(), value.into());
        self
    }

    /// Buffers the whole request body, honouring the request's body limit.
    ///
    /// The bytes are cached, so parsers and handlers can both call this.
    pub async fn read_body(&mut self) -> ServerResult<Bytes> {
        if let Some(raw) = &self.req.raw_body {
            return Ok(raw.clone());
        }

        let limit = self.req.body_limit;
        let mut buffer = BytesMut::new();
        if let Some(mut stream) = self.req.body_stream.take() {
            while let Some(chunk) = stream.next().await {
                let chunk = chunk?;
                if buffer.len() + chunk.len() > limit {
                    return Err(ServerError::PayloadTooLarge { limit });
                }
                buffer.extend_from_slice(&chunk);
            }
        }

        let raw = buffer.freeze();
        self.req.raw_body = Some(raw.clone());
        Ok(raw)
    }

    /// Writes a complete response. Strings and bytes are sent verbatim, JSON
    /// values are serialised. `content-type` defaults to `application/json`.
    pub async fn send<B: Into<Payload>>(&mut self, body: B, status: u16) -> ServerResult<()> {
        self.send_with(body, status, Vec::<(String, String)>::new())
            .await
    }

    pub async fn send_with<B, I, K, V>(&mut self, body: B, status: u16, headers: I) -> ServerResult<()>
    where
        B: Into<Payload>,
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        self.ensure_unsent()?;
        let bytes = body.into().into_bytes()?;

        let mut head = ResponseHead::new(status);
        head.header("content-type", "application/json");
        self.apply_staged(&mut head);
        for (name, value) in headers {
            head.header(name, value);
        }
        head.header("content-length", bytes.len().to_string());

        // HEAD gets the same head as GET, never a body
        if bytes.is_empty() || self.req.method == Method::HEAD {
            return self.write_head(head, true);
        }
        self.write_head(head, false)?;
        self.streaming = true;
        self.sink.write(bytes).await?;
        self.sink.end()?;
        self.streaming = false;
        Ok(())
    }

    pub async fn json<T: Serialize>(&mut self, value: &T, status: u16) -> ServerResult<()> {
        let payload = Payload::json(value)?;
        self.send(payload, status).await
    }

    /// Writes a 200 head with `headers`, then pipes `source` until it is
    /// exhausted. If reading or writing fails half-way the error is returned
    /// and the stream stays open for the dispatcher to reset.
    pub async fn stream_file<R, I, K, V>(&mut self, mut source: R, headers: I) -> ServerResult<()>
    where
        R: AsyncRead + Unpin + Send,
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        self.ensure_unsent()?;
        let mut head = ResponseHead::new(200);
        self.apply_staged(&mut head);
        for (name, value) in headers {
            head.header(name, value);
        }

        if self.req.method == Method::HEAD {
            return self.write_head(head, true);
        }
        self.write_head(head, false)?;
        self.streaming = true;

        let mut buf = BytesMut::with_capacity(STREAM_CHUNK);
        loop {
            buf.reserve(STREAM_CHUNK);
            if source.read_buf(&mut buf).await? == 0 {
                break;
            }
            self.sink.write(buf.split().freeze()).await?;
        }
        self.sink.end()?;
        self.streaming = false;
        Ok(())
    }

    /// Streams a file from disk with an inferred content type.
    ///
    /// A missing file surfaces as [`ServerError::NotFound`].
    pub async fn send_file<P, I, K, V>(&mut self, path: P, headers: I) -> ServerResult<()>
    where
        P: AsRef<Path>,
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        self.ensure_unsent()?;
        let path = path.as_ref();
        let file = tokio::fs::File::open(path).await.map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => ServerError::NotFound,
            _ => ServerError::IoError(e),
        })?;
        let metadata = file.metadata().await?;

        let mut defaults = vec![
            ("content-type".to_string(), content_type_for(path).to_string()),
            ("content-length".to_string(), metadata.len().to_string()),
        ];
        if let Ok(modified) = metadata.modified() {
            if modified > SystemTime::UNIX_EPOCH {
                defaults.push(("last-modified".to_string(), httpdate::fmt_http_date(modified)));
            }
        }
        let headers = headers
            .into_iter()
            .map(|(name, value)| (name.as_ref().to_ascii_lowercase(), value.into()));
        defaults.extend(headers);

        self.stream_file(file, defaults).await
    }

    pub(crate) fn send_empty(&mut self, status: u16) -> ServerResult<()> {
        self.ensure_unsent()?;
        let mut head = ResponseHead::new(status);
        self.apply_staged(&mut head);
        self.write_head(head, true)
    }

    /// Writes the JSON error body. Staged headers are dropped, since they may
    /// be what made the original response fail.
    pub(crate) async fn send_error(&mut self, err: &ServerError) -> ServerResult<()> {
        self.res.headers.clear();
        self.send(error_body(err), err.status_code()).await
    }

    /// Resets the stream, whatever was written so far.
    pub(crate) fn abort(&mut self) {
        self.streaming = false;
        self.sink.abort();
    }

    /// Resets a response whose body was cut short.
    pub(crate) fn abort_if_streaming(&mut self) -> bool {
        if self.streaming {
            self.sink.abort();
            self.streaming = false;
            return true;
        }
        false
    }

    fn ensure_unsent(&self) -> ServerResult<()> {
        if self.res.sent {
            warn!(method = %self.req.method, path = %self.req.path, "response already sent");
            return Err(ServerError::ResponseAlreadySent);
        }
        Ok(())
    }

    fn apply_staged(&self, head: &mut ResponseHead) {
        for (name, value) in &self.res.headers {
            head.header(name, value.clone());
        }
    }

    // The response only counts as sent once the sink accepted its head.
    fn write_head(&mut self, head: ResponseHead, end_of_stream: bool) -> ServerResult<()> {
        head.validate()?;
        let status = head.status;
        self.sink.respond(head, end_of_stream)?;
        self.mark_sent(status);
        Ok(())
    }

    fn mark_sent(&mut self, status: u16) {
        self.res.sent = true;
        self.res.status = status;
    }
}

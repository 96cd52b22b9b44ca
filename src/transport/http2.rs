use crate::error::{ServerError, ServerResult};
use crate::http::{Method, Request, ResponseHead};
use crate::transport::{BodyStream, ResponseSink};
use bytes::Bytes;
use futures::future::{poll_fn, BoxFuture};
use futures::stream::{self, StreamExt};
use h2::server::SendResponse;
use h2::{Reason, RecvStream, SendStream};
use tracing::warn;

// Connection-specific headers are illegal in HTTP/2.
const HOP_BY_HOP: [&str; 5] = [
    "connection",
    "keep-alive",
    "proxy-connection",
    "transfer-encoding",
    "upgrade",
];

/// Response side of one HTTP/2 stream.
pub struct H2Sink {
    respond: SendResponse<Bytes>,
    stream: Option<SendStream<Bytes>>,
}

impl H2Sink {
    pub fn new(respond: SendResponse<Bytes>) -> Self {
        Self {
            respond,
            stream: None,
        }
    }
}

impl ResponseSink for H2Sink {
    fn respond(&mut self, head: ResponseHead, end_of_stream: bool) -> ServerResult<()> {
        let response = build_response(head)?;
        let stream = self.respond.send_response(response, end_of_stream)?;
        if !end_of_stream {
            self.stream = Some(stream);
        }
        Ok(())
    }

    fn write(&mut self, data: Bytes) -> BoxFuture<'_, ServerResult<()>> {
        Box::pin(async move {
            let stream = self.stream.as_mut().ok_or_else(|| {
                ServerError::internal("body write before response head or after end")
            })?;

            let mut data = data;
            while !data.is_empty() {
                stream.reserve_capacity(data.len());
                let granted = match poll_fn(|cx| stream.poll_capacity(cx)).await {
                    Some(granted) => granted?,
                    None => return Err(ServerError::internal("stream closed by peer")),
                };
                if granted == 0 {
                    continue;
                }
                let chunk = data.split_to(granted.min(data.len()));
                stream.send_data(chunk, false)?;
            }
            Ok(())
        })
    }

    fn end(&mut self) -> ServerResult<()> {
        if let Some(mut stream) = self.stream.take() {
            stream.send_data(Bytes::new(), true)?;
        }
        Ok(())
    }

    fn abort(&mut self) {
        match self.stream.take() {
            Some(mut stream) => stream.send_reset(Reason::INTERNAL_ERROR),
            None => self.respond.send_reset(Reason::INTERNAL_ERROR),
        }
    }
}

fn build_response(head: ResponseHead) -> ServerResult<http::Response<()>> {
    let mut builder = http::Response::builder().status(head.status);
    for (name, value) in &head.headers {
        if HOP_BY_HOP.contains(&name.as_str()) {
            continue;
        }
        builder = builder.header(name.as_str(), value.as_str());
    }
    builder
        .body(())
        .map_err(|e| ServerError::InternalError(format!("invalid response head: {}", e)))
}

/// Converts the head and body of an inbound HTTP/2 stream into a [`Request`].
pub(crate) fn into_request(request: http::Request<RecvStream>, body_limit: usize) -> Request {
    let (parts, body) = request.into_parts();

    let method = match Method::parse(parts.method.as_str()) {
        Some(method) => method,
        None => {
            warn!(method = %parts.method, "unsupported method, treating as GET");
            Method::GET
        }
    };
    let target = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");

    let mut req = Request::new(method, target)
        .with_body_stream(body_stream(body))
        .with_body_limit(body_limit);

    for (name, value) in parts.headers.iter() {
        let Ok(value) = value.to_str() else {
            continue;
        };
        req.headers
            .entry(name.as_str().to_string())
            .and_modify(|existing| {
                existing.push_str(", ");
                existing.push_str(value);
            })
            .or_insert_with(|| value.to_string());
    }
    req
}

fn body_stream(body: RecvStream) -> BodyStream {
    stream::unfold(body, |mut body| async move {
        let chunk = body.data().await?.map_err(ServerError::from).map(|bytes| {
            let _ = body.flow_control().release_capacity(bytes.len());
            bytes
        });
        Some((chunk, body))
    })
    .boxed()
}

use crate::error::{ServerError, ServerResult};
use crate::http::ResponseHead;
use crate::transport::ResponseSink;
use bytes::Bytes;
use futures::future::BoxFuture;
use serde_json::Value;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Everything written to a [`MemorySink`].
#[derive(Debug, Default, Clone)]
pub struct Recorded {
    pub head: Option<ResponseHead>,
    pub respond_calls: usize,
    pub body: Vec<u8>,
    pub ended: bool,
    pub aborted: bool,
}

/// Shared view of a recorded exchange, readable after the sink is gone.
#[derive(Debug, Default, Clone)]
pub struct Exchange {
    inner: Arc<Mutex<Recorded>>,
}

impl Exchange {
    fn lock(&self) -> MutexGuard<'_, Recorded> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn snapshot(&self) -> Recorded {
        self.lock().clone()
    }

    pub fn status(&self) -> Option<u16> {
        self.lock().head.as_ref().map(|head| head.status)
    }

    pub fn header(&self, name: &str) -> Option<String> {
        self.lock()
            .head
            .as_ref()
            .and_then(|head| head.get(name).map(str::to_string))
    }

    pub fn body(&self) -> Vec<u8> {
        self.lock().body.clone()
    }

    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.lock().body).into_owned()
    }

    pub fn body_json(&self) -> Option<Value> {
        serde_json::from_slice(&self.lock().body).ok()
    }

    pub fn respond_calls(&self) -> usize {
        self.lock().respond_calls
    }

    pub fn is_ended(&self) -> bool {
        self.lock().ended
    }

    pub fn is_aborted(&self) -> bool {
        self.lock().aborted
    }
}

/// In-memory stream that enforces the same framing rules as a real one:
/// a second head or a write outside the body phase is an error.
pub struct MemorySink {
    exchange: Exchange,
}

impl MemorySink {
    pub fn new() -> (Self, Exchange) {
        let exchange = Exchange::default();
        (
            Self {
                exchange: exchange.clone(),
            },
            exchange,
        )
    }
}

impl ResponseSink for MemorySink {
    fn respond(&mut self, head: ResponseHead, end_of_stream: bool) -> ServerResult<()> {
        let mut recorded = self.exchange.lock();
        recorded.respond_calls += 1;
        if recorded.head.is_some() {
            return Err(ServerError::internal("response head written twice"));
        }
        recorded.head = Some(head);
        recorded.ended = end_of_stream;
        Ok(())
    }

    fn write(&mut self, data: Bytes) -> BoxFuture<'_, ServerResult<()>> {
        Box::pin(async move {
            let mut recorded = self.exchange.lock();
            if recorded.head.is_none() || recorded.ended || recorded.aborted {
                return Err(ServerError::internal("body write outside of an open stream"));
            }
            recorded.body.extend_from_slice(&data);
            Ok(())
        })
    }

    fn end(&mut self) -> ServerResult<()> {
        let mut recorded = self.exchange.lock();
        if recorded.head.is_some() && !recorded.aborted {
            recorded.ended = true;
        }
        Ok(())
    }

    fn abort(&mut self) {
        let mut recorded = self.exchange.lock();
        if !recorded.ended {
            recorded.aborted = true;
        }
    }
}

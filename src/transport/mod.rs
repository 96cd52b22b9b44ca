//! The stream abstraction the dispatcher writes responses through.
//!
//! A stream accepts exactly one response head followed by zero or more body
//! writes and an end. [`http2`] adapts a real HTTP/2 stream; [`memory`] records
//! the exchange in memory.

pub mod http2;
pub mod memory;

use crate::error::ServerResult;
use crate::http::ResponseHead;
use bytes::Bytes;
use futures::future::BoxFuture;
use futures::stream::BoxStream;

/// Readable request body, chunk by chunk.
pub type BodyStream = BoxStream<'static, ServerResult<Bytes>>;

pub trait ResponseSink: Send {
    /// Writes the response head. With `end_of_stream` set no body follows.
    fn respond(&mut self, head: ResponseHead, end_of_stream: bool) -> ServerResult<()>;

    /// Writes one body chunk, waiting for the peer to grant capacity.
    fn write(&mut self, data: Bytes) -> BoxFuture<'_, ServerResult<()>>;

    /// Ends the body. A no-op if the stream already ended.
    fn end(&mut self) -> ServerResult<()>;

    /// Resets the stream so the peer sees the response as incomplete.
    fn abort(&mut self);
}

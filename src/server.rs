//! Per-connection and per-stream request processing.
//!
//! Every inbound stream gets exactly one [`Context`] and runs through the
//! server-wide middleware chain, then the router. Whatever happens, the
//! stream ends with a response:
//!
//! - nothing written by the pipeline: an empty `204`
//! - an error (or a panic) before anything was written: a JSON error body
//!   with the error's status
//! - an error after the response started: the error is logged and, if the
//!   body was still being streamed, the stream is reset

use crate::context::Context;
use crate::error::{ServerError, ServerResult};
use crate::middleware::{Flow, MiddlewareChain};
use crate::router::Router;
use crate::transport::http2::{into_request, H2Sink};
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, error, info, Instrument, Span};

pub struct Dispatcher {
    router: Router,
    middlewares: MiddlewareChain,
    body_limit: usize,
    span: Span,
}

impl Dispatcher {
    pub fn new(router: Router, middlewares: MiddlewareChain, body_limit: usize, span: Span) -> Self {
        Self {
            router,
            middlewares,
            body_limit,
            span,
        }
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    /// Serves HTTP/2 on an established (usually TLS) connection until the
    /// peer goes away. Each stream is processed on its own task.
    pub async fn serve_connection<S>(self: Arc<Self>, io: S) -> ServerResult<()>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let mut connection = h2::server::handshake(io).await?;

        while let Some(next) = connection.accept().await {
            let (request, respond) = next?;
            let span = tracing::debug_span!(
                parent: &self.span,
                "stream",
                id = respond.stream_id().as_u32()
            );
            let ctx = Context::new(into_request(request, self.body_limit), H2Sink::new(respond));
            let dispatcher = Arc::clone(&self);
            tokio::spawn(async move { dispatcher.handle(ctx).await }.instrument(span));
        }

        debug!(parent: &self.span, "connection closed");
        Ok(())
    }

    /// Runs the full pipeline for one stream and guarantees a terminal
    /// response.
    pub async fn handle(&self, mut ctx: Context) {
        let started = Instant::now();
        let method = ctx.req.method;
        let path = ctx.req.path.clone();

        let outcome = AssertUnwindSafe(self.run_pipeline(&mut ctx))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| Err(ServerError::PanicError(panic_message(panic))));

        match outcome {
            Ok(()) if !ctx.is_sent() => {
                if let Err(e) = ctx.send_empty(204) {
                    error!(%method, %path, error = %e, "failed to write default response");
                    ctx.abort();
                }
            }
            Ok(()) => {}
            Err(err) if ctx.is_sent() => {
                let reset = ctx.abort_if_streaming();
                debug!(%method, %path, error = %err, reset, "error after response was sent");
            }
            Err(err) => {
                if err.status_code() >= 500 {
                    error!(%method, %path, error = %err, "request failed");
                } else {
                    debug!(%method, %path, error = %err, "request rejected");
                }
                if let Err(e) = ctx.send_error(&err).await {
                    error!(%method, %path, error = %e, "failed to write error response");
                    ctx.abort();
                }
            }
        }

        info!(
            %method,
            %path,
            status = ctx.res.status,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "request completed"
        );
    }

    async fn run_pipeline(&self, ctx: &mut Context) -> ServerResult<()> {
        if self.middlewares.run(ctx).await? == Flow::Halt {
            return Ok(());
        }
        self.router.dispatch(ctx).await
    }
}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.clone()
    } else {
        "Unknown panic".to_string()
    }
}

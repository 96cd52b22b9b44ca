//! Interceptors that run before route handlers.
//!
//! A chain runs its middlewares strictly in registration order. Each one
//! returns a [`Flow`]: `Continue` hands the request to the next middleware,
//! `Halt` ends the chain because the middleware answered the request itself.
//! An `Err` also ends the chain and is reported by the dispatcher. A
//! middleware that wrote a response ends the chain even if it returned
//! `Continue`.

mod multipart;
pub mod parsers;

pub use parsers::{JsonParser, MultipartParser, UrlEncodedParser};

use crate::context::Context;
use crate::error::ServerResult;
use futures::future::BoxFuture;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Halt,
}

pub type MiddlewareResult<'a> = BoxFuture<'a, ServerResult<Flow>>;

pub trait Middleware: Send + Sync + 'static {
    fn call<'a>(&'a self, ctx: &'a mut Context) -> MiddlewareResult<'a>;
}

/// Middleware built from a closure, see [`from_fn`].
pub struct FnMiddleware<F> {
    f: F,
}

impl<F> Middleware for FnMiddleware<F>
where
    F: for<'a> Fn(&'a mut Context) -> MiddlewareResult<'a> + Send + Sync + 'static,
{
    fn call<'a>(&'a self, ctx: &'a mut Context) -> MiddlewareResult<'a> {
        (self.f)(ctx)
    }
}

/// Wraps a closure as a middleware:
///
/// ```rust
/// use h2_dispatch::middleware::{from_fn, Flow};
///
/// let auth = from_fn(|ctx| Box::pin(async move {
///     if ctx.req.get_header("authorization").is_none() {
///         ctx.send(serde_json::json!({"error": "Unauthorized"}), 401).await?;
///         return Ok(Flow::Halt);
///     }
///     Ok(Flow::Continue)
/// }));
/// ```
pub fn from_fn<F>(f: F) -> FnMiddleware<F>
where
    F: for<'a> Fn(&'a mut Context) -> MiddlewareResult<'a> + Send + Sync + 'static,
{
    FnMiddleware { f }
}

#[derive(Clone, Default)]
pub struct MiddlewareChain {
    middlewares: Vec<Arc<dyn Middleware>>,
}

impl MiddlewareChain {
    pub fn new() -> Self {
        Self {
            middlewares: Vec::new(),
        }
    }

    pub fn add<M: Middleware>(&mut self, middleware: M) {
        self.middlewares.push(Arc::new(middleware));
    }

    pub fn len(&self) -> usize {
        self.middlewares.len()
    }

    pub fn is_empty(&self) -> bool {
        self.middlewares.is_empty()
    }

    pub async fn run(&self, ctx: &mut Context) -> ServerResult<Flow> {
        for middleware in &self.middlewares {
            let flow = middleware.call(ctx).await?;
            if flow == Flow::Halt || ctx.is_sent() {
                return Ok(Flow::Halt);
            }
        }
        Ok(Flow::Continue)
    }
}

use crate::context::Context;
use crate::error::ServerResult;
use futures::future::BoxFuture;

pub type HandlerResult = ServerResult<()>;

/// A route handler.
///
/// Implemented for every `Fn(&mut Context) -> BoxFuture<'_, HandlerResult>`,
/// so handlers are usually written as
/// `|ctx| Box::pin(async move { ctx.send("hi", 200).await })`.
pub trait Handler: Send + Sync + 'static {
    fn call<'a>(&'a self, ctx: &'a mut Context) -> BoxFuture<'a, HandlerResult>;
}

impl<F> Handler for F
where
    F: for<'a> Fn(&'a mut Context) -> BoxFuture<'a, HandlerResult> + Send + Sync + 'static,
{
    fn call<'a>(&'a self, ctx: &'a mut Context) -> BoxFuture<'a, HandlerResult> {
        (self)(ctx)
    }
}

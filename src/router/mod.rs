pub mod pattern;

pub use pattern::{compile, Params, Pattern, WILDCARD};

use crate::context::Context;
use crate::error::ServerResult;
use crate::handler::Handler;
use crate::http::Method;
use crate::middleware::{Flow, Middleware, MiddlewareChain};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Free-form data attached to a route at registration time.
pub type Metadata = HashMap<String, Value>;

/// Generates one registration method per HTTP verb, plus a `*_with` variant
/// taking route metadata. The surrounding type must provide `register`.
macro_rules! route_verbs {
    ($($verb:ident, $verb_with:ident => $method:ident;)+) => {
        $(
            #[doc = concat!("Registers a `", stringify!($method), "` route.")]
            pub fn $verb<F>(&mut self, path: &str, handler: F) -> &mut Self
            where
                F: for<'a> Fn(&'a mut $crate::context::Context)
                    -> ::futures::future::BoxFuture<'a, $crate::handler::HandlerResult>
                    + Send + Sync + 'static,
            {
                self.register($crate::http::Method::$method, path, handler, $crate::router::Metadata::new())
            }

            #[doc = concat!("Registers a `", stringify!($method), "` route with metadata.")]
            pub fn $verb_with<F>(&mut self, path: &str, handler: F, metadata: $crate::router::Metadata) -> &mut Self
            where
                F: for<'a> Fn(&'a mut $crate::context::Context)
                    -> ::futures::future::BoxFuture<'a, $crate::handler::HandlerResult>
                    + Send + Sync + 'static,
            {
                self.register($crate::http::Method::$method, path, handler, metadata)
            }
        )+
    };
    () => {
        $crate::router::route_verbs! {
            get, get_with => GET;
            post, post_with => POST;
            put, put_with => PUT;
            delete, delete_with => DELETE;
            patch, patch_with => PATCH;
            head, head_with => HEAD;
            options, options_with => OPTIONS;
            connect, connect_with => CONNECT;
            trace, trace_with => TRACE;
        }
    };
}

pub(crate) use route_verbs;

#[derive(Clone)]
pub struct Route {
    method: Method,
    pattern: Pattern,
    handler: Arc<dyn Handler>,
    metadata: Metadata,
}

impl Route {
    pub fn method(&self) -> Method {
        self.method
    }

    pub fn template(&self) -> &str {
        self.pattern.template()
    }

    pub fn param_names(&self) -> &[String] {
        self.pattern.param_names()
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    // Prefixes are joined at the template level and recompiled.
    fn prefixed(self, prefix: &str) -> Route {
        let template = format!("{}{}", prefix, self.pattern.template());
        Route {
            pattern: compile(&template),
            ..self
        }
    }
}

/// Ordered route table with its own middleware chain.
///
/// Routes are tried in registration order and the first one whose method and
/// pattern both match wins. Overlapping routes are not detected.
#[derive(Clone, Default)]
pub struct Router {
    middlewares: MiddlewareChain,
    routes: Vec<Route>,
}

impl Router {
    pub fn new() -> Self {
        Self {
            middlewares: MiddlewareChain::new(),
            routes: Vec::new(),
        }
    }

    route_verbs!();

    pub fn register<H: Handler>(
        &mut self,
        method: Method,
        path: &str,
        handler: H,
        metadata: Metadata,
    ) -> &mut Self {
        info!("Mapped {{{} {}}} route", path, method);
        self.routes.push(Route {
            method,
            pattern: compile(path),
            handler: Arc::new(handler),
            metadata,
        });
        self
    }

    /// Appends a middleware to this router's chain. It runs after the
    /// server-wide chain and before route matching.
    pub fn middleware(&mut self, middleware: impl Middleware) -> &mut Self {
        self.middlewares.add(middleware);
        self
    }

    /// Registers every route added by `register` under `prefix`.
    ///
    /// Grouped routes are appended after the routes that existed before the
    /// call, in the order they were registered. Groups nest, and their
    /// prefixes add up.
    pub fn group<F>(&mut self, prefix: &str, register: F) -> &mut Self
    where
        F: FnOnce(&mut Router),
    {
        let previous = std::mem::take(&mut self.routes);
        register(self);
        let grouped = std::mem::replace(&mut self.routes, previous);
        debug!(prefix, routes = grouped.len(), "grouped routes");
        self.routes
            .extend(grouped.into_iter().map(|route| route.prefixed(prefix)));
        self
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    /// Finds the first route for `method` (compared case-insensitively) whose
    /// pattern matches `path`.
    pub fn match_route(&self, method: &str, path: &str) -> Option<(&Route, Params)> {
        self.routes
            .iter()
            .filter(|route| route.method.as_str().eq_ignore_ascii_case(method))
            .find_map(|route| route.pattern.matches(path).map(|params| (route, params)))
    }

    /// Runs the router chain, then the matched handler. Unmatched requests
    /// get a 404. Errors are returned to the caller untouched.
    pub async fn dispatch(&self, ctx: &mut Context) -> ServerResult<()> {
        if self.middlewares.run(ctx).await? == Flow::Halt {
            return Ok(());
        }

        let Some((route, params)) = self.match_route(ctx.req.method.as_str(), &ctx.req.path) else {
            debug!(method = %ctx.req.method, path = %ctx.req.path, "no route matched");
            return ctx.send(json!({ "error": "Not Found" }), 404).await;
        };

        ctx.params = params;
        ctx.metadata = route.metadata.clone();
        route.handler.call(ctx).await
    }
}

//! Application is the entry point for building an HTTP/2 server.
//!
//! # Examples
//!
//! ```rust,no_run
//! use h2_dispatch::{json, Application};
//!
//! let mut app = Application::new();
//! app.get("/", |ctx| Box::pin(async move {
//!     ctx.send(json!({ "message": "Hello!" }), 200).await
//! }));
//! app.listen("127.0.0.1:8443").unwrap();
//! ```

use crate::error::{ServerError, ServerResult};
use crate::handler::Handler;
use crate::http::{Method, DEFAULT_BODY_LIMIT};
use crate::middleware::{Middleware, MiddlewareChain};
use crate::router::{route_verbs, Metadata, Router};
use crate::server::Dispatcher;
use crate::tls::TlsConfig;
use std::path::Path;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::runtime::Runtime;
use tokio::sync::Semaphore;
use tracing::{error, info, info_span, warn};

pub const DEFAULT_MAX_CONNECTIONS: usize = 256;

/// The server: a root router, the server-wide middleware chain and the
/// listener settings.
///
/// Middlewares added here run for every request, before the router's own
/// chain and before route matching.
pub struct Application {
    name: Option<String>,
    router: Router,
    middlewares: MiddlewareChain,
    tls: TlsConfig,
    max_connections: usize,
    body_limit: usize,
}

impl Default for Application {
    fn default() -> Self {
        Self::new()
    }
}

impl Application {
    pub fn new() -> Self {
        Self {
            name: None,
            router: Router::new(),
            middlewares: MiddlewareChain::new(),
            tls: TlsConfig::default(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            body_limit: DEFAULT_BODY_LIMIT,
        }
    }

    /// Names the application. The name is attached to every log line the
    /// server emits.
    pub fn named(name: &str) -> Self {
        Self {
            name: Some(name.to_string()),
            ..Self::new()
        }
    }

    pub fn max_connections(&mut self, max_connections: usize) -> &mut Self {
        self.max_connections = max_connections.max(1);
        self
    }

    /// Largest request body, in bytes, that will be buffered for parsing.
    pub fn body_limit(&mut self, limit: usize) -> &mut Self {
        self.body_limit = limit;
        self
    }

    /// Adds a server-wide middleware.
    pub fn middleware(&mut self, middleware: impl Middleware) -> &mut Self {
        self.middlewares.add(middleware);
        self
    }

    /// The root router. Middlewares added to it run after the server-wide
    /// chain.
    pub fn router(&mut self) -> &mut Router {
        &mut self.router
    }

    route_verbs!();

    pub fn register<H: Handler>(
        &mut self,
        method: Method,
        path: &str,
        handler: H,
        metadata: Metadata,
    ) -> &mut Self {
        self.router.register(method, path, handler, metadata);
        self
    }

    pub fn group<F>(&mut self, prefix: &str, register: F) -> &mut Self
    where
        F: FnOnce(&mut Router),
    {
        self.router.group(prefix, register);
        self
    }

    /// Uses the given certificate and key instead of the development pair.
    pub fn with_tls<P: AsRef<Path>>(&mut self, cert_file: P, key_file: P) -> &mut Self {
        self.tls = TlsConfig::new(cert_file, key_file);
        self
    }

    pub fn tls(&mut self, config: TlsConfig) -> &mut Self {
        self.tls = config;
        self
    }

    /// Freezes the routes and middlewares into a [`Dispatcher`], which can
    /// serve connections without a listener.
    pub fn into_dispatcher(self) -> Dispatcher {
        let span = info_span!("app", name = self.name.as_deref().unwrap_or("h2-dispatch"));
        Dispatcher::new(self.router, self.middlewares, self.body_limit, span)
    }

    /// Starts the server on a new runtime and blocks.
    ///
    /// # Arguments
    /// * `addr` - Address to listen on (e.g. "127.0.0.1:8443")
    pub fn listen(self, addr: &str) -> ServerResult<()> {
        let runtime = Runtime::new()?;
        runtime.block_on(self.serve(addr))
    }

    /// Accepts TLS connections on `addr` until the task is dropped.
    ///
    /// Credentials are loaded before binding, so missing or unreadable
    /// certificate files fail here without opening a socket.
    pub async fn serve(self, addr: &str) -> ServerResult<()> {
        let acceptor = self.tls.acceptor()?;
        let permits = Arc::new(Semaphore::new(self.max_connections));
        let dispatcher = Arc::new(self.into_dispatcher());

        let listener = TcpListener::bind(addr).await?;
        info!("Server running at https://{}", listener.local_addr()?);

        loop {
            let permit = Arc::clone(&permits)
                .acquire_owned()
                .await
                .map_err(|e| ServerError::internal(e.to_string()))?;

            let (stream, peer) = match listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    error!(error = %e, "Connection failed");
                    continue;
                }
            };

            let acceptor = acceptor.clone();
            let dispatcher = Arc::clone(&dispatcher);
            tokio::spawn(async move {
                let _permit = permit;
                match acceptor.accept(stream).await {
                    Ok(tls_stream) => {
                        if let Err(e) = dispatcher.serve_connection(tls_stream).await {
                            warn!(%peer, error = %e, "Connection error");
                        }
                    }
                    Err(e) => warn!(%peer, error = %e, "TLS handshake failed"),
                }
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbs_register_on_the_root_router() {
        let mut app = Application::new();
        app.get("/", |ctx| Box::pin(async move { ctx.send("root", 200).await }))
            .post("/items", |ctx| Box::pin(async move { ctx.send("", 201).await }));
        app.group("/api", |r| {
            r.get("/status", |ctx| Box::pin(async move { ctx.send("up", 200).await }));
        });

        let dispatcher = app.into_dispatcher();
        let templates: Vec<_> = dispatcher
            .router()
            .routes()
            .iter()
            .map(|route| (route.method(), route.template().to_string()))
            .collect();
        assert_eq!(
            templates,
            vec![
                (Method::GET, "/".to_string()),
                (Method::POST, "/items".to_string()),
                (Method::GET, "/api/status".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn serve_fails_before_binding_without_credentials() {
        let mut app = Application::named("no-certs");
        app.with_tls("/nonexistent/cert.pem", "/nonexistent/key.pem");

        let err = app.serve("127.0.0.1:0").await.unwrap_err();
        assert!(matches!(err, ServerError::TlsConfig(_)));
    }
}

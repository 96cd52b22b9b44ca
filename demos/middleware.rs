//! Middleware example
//!
//! This example demonstrates:
//! - Request timing with a server-wide middleware
//! - API key authentication on a route group
//! - Error handling by the dispatcher
//!
//! ```text
//! curl -k https://localhost:8443/public
//! curl -k https://localhost:8443/private/profile -H 'x-api-key: sk_test_123456'
//! ```

use h2_dispatch::middleware::{JsonParser, Middleware, MiddlewareResult};
use h2_dispatch::{json, logging, Application, Context, Flow, ServerError};
use std::time::SystemTime;
use tracing::info;

const API_KEYS: [&str; 2] = ["sk_test_123456", "sk_test_abcdef"];

// Logs each request as it enters the pipeline
struct RequestLogger;

impl Middleware for RequestLogger {
    fn call<'a>(&'a self, ctx: &'a mut Context) -> MiddlewareResult<'a> {
        Box::pin(async move {
            info!(method = %ctx.req.method, path = %ctx.req.path, "request received");
            Ok(Flow::Continue)
        })
    }
}

// Rejects requests under `prefix` without a known x-api-key header
struct ApiKeyAuth {
    prefix: &'static str,
}

impl Middleware for ApiKeyAuth {
    fn call<'a>(&'a self, ctx: &'a mut Context) -> MiddlewareResult<'a> {
        Box::pin(async move {
            if !ctx.req.path.starts_with(self.prefix) {
                return Ok(Flow::Continue);
            }
            let authorized = ctx
                .req
                .get_header("x-api-key")
                .is_some_and(|key| API_KEYS.contains(&key));
            if !authorized {
                ctx.send(json!({ "error": "Unauthorized - Invalid or missing API key" }), 401)
                    .await?;
                return Ok(Flow::Halt);
            }
            Ok(Flow::Continue)
        })
    }
}

fn main() {
    logging::init(logging::DEFAULT_DIRECTIVE);

    let mut app = Application::named("middleware-example");
    app.middleware(RequestLogger).middleware(JsonParser);
    app.router().middleware(ApiKeyAuth { prefix: "/private" });

    app.get("/", |ctx| {
        Box::pin(async move {
            ctx.send(
                json!({
                    "message": "Welcome to the Middleware Example",
                    "endpoints": [
                        { "path": "/public", "description": "No authentication required" },
                        { "path": "/private/profile", "description": "Requires a valid API key" },
                        { "path": "/error", "description": "Fails inside the handler" },
                    ],
                }),
                200,
            )
            .await
        })
    });

    app.get("/public", |ctx| {
        Box::pin(async move {
            ctx.send(
                json!({
                    "message": "This is a public endpoint",
                    "timestamp": httpdate::fmt_http_date(SystemTime::now()),
                }),
                200,
            )
            .await
        })
    });

    app.get("/error", |_ctx| {
        Box::pin(async move {
            Err(ServerError::internal("This is a test error thrown by the endpoint"))
        })
    });

    app.group("/private", |r| {
        r.get("/profile", |ctx| {
            Box::pin(async move {
                ctx.send(json!({ "name": "User", "email": "user@example.com" }), 200)
                    .await
            })
        });
        r.post("/data", |ctx| {
            Box::pin(async move {
                let Some(data) = ctx.req.body.get("data").cloned() else {
                    return ctx.send(json!({ "error": "No data provided" }), 400).await;
                };
                ctx.send(
                    json!({ "message": "Data received successfully", "receivedData": data }),
                    200,
                )
                .await
            })
        });
    });

    app.listen("127.0.0.1:8443")
        .expect("Server failed to start");
}

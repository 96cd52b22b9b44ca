//! A minimal HTTP/2 server.
//!
//! Serves HTTPS with the development certificates under `certs/`:
//!
//! ```text
//! curl -k https://localhost:8443/hello/Ada
//! curl -k -X POST https://localhost:8443/echo -H 'content-type: application/json' -d '{"a":1}'
//! ```

use h2_dispatch::middleware::JsonParser;
use h2_dispatch::{json, logging, Application};
use std::time::SystemTime;

fn main() {
    logging::init(logging::DEFAULT_DIRECTIVE);

    let mut app = Application::named("hello-world");
    app.middleware(JsonParser);

    app.get("/", |ctx| {
        Box::pin(async move {
            ctx.send(json!({ "message": "Welcome to h2-dispatch!" }), 200).await
        })
    });

    app.group("/hello", |r| {
        r.get("/:name", |ctx| {
            Box::pin(async move {
                let name = ctx.param("name").unwrap_or_default().to_string();
                ctx.send(json!({ "message": format!("Hello, {}!", name) }), 200).await
            })
        });
    });

    app.post("/echo", |ctx| {
        Box::pin(async move {
            let received = ctx.req.body.clone();
            ctx.send(
                json!({
                    "message": "Echo service",
                    "receivedData": received,
                    "timestamp": httpdate::fmt_http_date(SystemTime::now()),
                }),
                200,
            )
            .await
        })
    });

    app.listen("127.0.0.1:8443")
        .expect("Server failed to start");
}

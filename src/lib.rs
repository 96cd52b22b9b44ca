//! # h2-dispatch
//!
//! A minimal HTTP/2 request-dispatch layer: path patterns, routing with
//! groups, an ordered middleware chain and a per-stream context that writes
//! exactly one response.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use h2_dispatch::{json, Application};
//!
//! fn main() {
//!     h2_dispatch::logging::init(h2_dispatch::logging::DEFAULT_DIRECTIVE);
//!
//!     let mut app = Application::new();
//!     app.get("/hello/:name", |ctx| Box::pin(async move {
//!         let name = ctx.param("name").unwrap_or("world").to_string();
//!         ctx.send(json!({ "message": format!("Hello, {}!", name) }), 200).await
//!     }));
//!
//!     // Serves HTTPS with the certificates under certs/
//!     app.listen("127.0.0.1:8443").unwrap();
//! }
//! ```
//!
//! ## Middleware Usage
//!
//! ```rust
//! use h2_dispatch::middleware::JsonParser;
//! use h2_dispatch::Application;
//!
//! let mut app = Application::new();
//! app.middleware(JsonParser);
//! ```

pub mod app;
pub mod context;
pub mod error;
pub mod handler;
pub mod http;
pub mod logging;
pub mod middleware;
pub mod router;
pub mod server;
pub mod tls;
pub mod transport;
pub extern crate serde_json;

pub use app::Application;
pub use context::Context;
pub use error::{ServerError, ServerResult};
pub use handler::{Handler, HandlerResult};
pub use http::{Method, Request};
pub use middleware::{from_fn, Flow, Middleware};
pub use router::{Metadata, Router};
pub use server::Dispatcher;

// Reexport serde_json
pub use serde_json::{json, Value};

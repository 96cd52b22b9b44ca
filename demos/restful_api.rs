//! A small JSON API over an in-memory user store.
//!
//! ```text
//! curl -k https://localhost:8443/api/users
//! curl -k -X POST https://localhost:8443/api/users \
//!      -H 'content-type: application/json' -d '{"name":"Ada","email":"ada@example.com"}'
//! ```

use h2_dispatch::middleware::JsonParser;
use h2_dispatch::{json, logging, Application, Context, ServerError, ServerResult};
use serde::Serialize;
use std::sync::Arc;
use std::time::SystemTime;
use tokio::sync::Mutex;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct User {
    id: u64,
    name: String,
    email: String,
    created_at: String,
}

struct UserStore {
    users: Vec<User>,
    next_id: u64,
}

impl UserStore {
    fn seeded() -> Self {
        let mut store = Self {
            users: Vec::new(),
            next_id: 1,
        };
        store.create("John Doe", "john@example.com");
        store.create("Jane Smith", "jane@example.com");
        store
    }

    fn find(&self, id: u64) -> Option<&User> {
        self.users.iter().find(|user| user.id == id)
    }

    fn create(&mut self, name: &str, email: &str) -> User {
        let user = User {
            id: self.next_id,
            name: name.to_string(),
            email: email.to_string(),
            created_at: httpdate::fmt_http_date(SystemTime::now()),
        };
        self.next_id += 1;
        self.users.push(user.clone());
        user
    }

    fn update(&mut self, id: u64, name: Option<&str>, email: Option<&str>) -> Option<User> {
        let user = self.users.iter_mut().find(|user| user.id == id)?;
        if let Some(name) = name {
            user.name = name.to_string();
        }
        if let Some(email) = email {
            user.email = email.to_string();
        }
        Some(user.clone())
    }

    fn delete(&mut self, id: u64) -> bool {
        let before = self.users.len();
        self.users.retain(|user| user.id != id);
        self.users.len() != before
    }
}

type Store = Arc<Mutex<UserStore>>;

fn user_id(ctx: &Context) -> ServerResult<u64> {
    ctx.param("id")
        .unwrap_or_default()
        .parse()
        .map_err(|_| ServerError::BadRequest("Invalid user id".to_string()))
}

fn body_str<'a>(ctx: &'a Context, field: &str) -> Option<&'a str> {
    ctx.req.body.get(field).and_then(|v| v.as_str()).filter(|s| !s.is_empty())
}

fn main() {
    logging::init(logging::DEFAULT_DIRECTIVE);

    let store: Store = Arc::new(Mutex::new(UserStore::seeded()));
    let mut app = Application::named("restful-api");
    app.middleware(JsonParser);

    let users = store.clone();
    app.get("/api/users", move |ctx| {
        let users = users.clone();
        Box::pin(async move {
            let all = users.lock().await.users.clone();
            ctx.json(&json!({ "users": all }), 200).await
        })
    });

    let users = store.clone();
    app.get("/api/users/:id", move |ctx| {
        let users = users.clone();
        Box::pin(async move {
            let id = user_id(ctx)?;
            let found = users.lock().await.find(id).cloned();
            match found {
                Some(user) => ctx.json(&json!({ "user": user }), 200).await,
                None => ctx.send(json!({ "error": "User not found" }), 404).await,
            }
        })
    });

    let users = store.clone();
    app.post("/api/users", move |ctx| {
        let users = users.clone();
        Box::pin(async move {
            let (Some(name), Some(email)) = (body_str(ctx, "name"), body_str(ctx, "email")) else {
                return ctx
                    .send(json!({ "error": "Name and email are required" }), 400)
                    .await;
            };
            let (name, email) = (name.to_string(), email.to_string());
            let user = users.lock().await.create(&name, &email);
            ctx.json(&json!({ "user": user }), 201).await
        })
    });

    let users = store.clone();
    app.put("/api/users/:id", move |ctx| {
        let users = users.clone();
        Box::pin(async move {
            let id = user_id(ctx)?;
            let name = body_str(ctx, "name").map(str::to_string);
            let email = body_str(ctx, "email").map(str::to_string);
            let updated = users
                .lock()
                .await
                .update(id, name.as_deref(), email.as_deref());
            match updated {
                Some(user) => ctx.json(&json!({ "user": user }), 200).await,
                None => ctx.send(json!({ "error": "User not found" }), 404).await,
            }
        })
    });

    let users = store;
    app.delete("/api/users/:id", move |ctx| {
        let users = users.clone();
        Box::pin(async move {
            let id = user_id(ctx)?;
            if !users.lock().await.delete(id) {
                return ctx.send(json!({ "error": "User not found" }), 404).await;
            }
            ctx.send(json!({ "message": "User deleted successfully" }), 200).await
        })
    });

    app.listen("127.0.0.1:8443")
        .expect("Server failed to start");
}

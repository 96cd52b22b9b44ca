//! File uploads with the multipart parser, and downloads with `send_file`.
//!
//! ```text
//! curl -k -X POST https://localhost:8443/upload -F "name=Ada" -F "file=@notes.txt"
//! curl -k https://localhost:8443/files/notes.txt
//! ```

use h2_dispatch::middleware::MultipartParser;
use h2_dispatch::{json, logging, Application, ServerError};
use std::path::{Path, PathBuf};

const UPLOAD_FORM: &str = r#"<!DOCTYPE html>
<html>
<head><title>File Upload Example</title></head>
<body>
  <h1>File Upload Example</h1>
  <form action="/upload" method="post" enctype="multipart/form-data">
    <label for="name">Your Name:</label>
    <input type="text" id="name" name="name" required>
    <label for="file">Select File:</label>
    <input type="file" id="file" name="file" required>
    <button type="submit">Upload File</button>
  </form>
</body>
</html>
"#;

fn uploads_dir() -> PathBuf {
    std::env::temp_dir().join("h2-dispatch-uploads")
}

// Keeps only the final path component of a client-supplied name
fn stored_name(filename: &str) -> Option<String> {
    Path::new(filename)
        .file_name()
        .and_then(|name| name.to_str())
        .map(str::to_string)
}

fn main() {
    logging::init(logging::DEFAULT_DIRECTIVE);
    std::fs::create_dir_all(uploads_dir()).expect("Failed to create uploads directory");

    let mut app = Application::named("file-upload");
    app.body_limit(16 * 1024 * 1024);
    app.middleware(MultipartParser);

    app.get("/", |ctx| {
        Box::pin(async move {
            ctx.send_with(UPLOAD_FORM, 200, [("content-type", "text/html; charset=utf-8")])
                .await
        })
    });

    app.post("/upload", |ctx| {
        Box::pin(async move {
            let submitted_by = ctx.req.body["name"].as_str().unwrap_or("anonymous").to_string();
            let Some(file) = ctx.req.file("file").cloned() else {
                return ctx.send(json!({ "error": "No file uploaded" }), 400).await;
            };
            let name = stored_name(&file.filename)
                .ok_or_else(|| ServerError::BadRequest("Invalid file name".to_string()))?;

            let target = uploads_dir().join(&name);
            tokio::fs::write(&target, &file.data).await?;

            ctx.send(
                json!({
                    "message": "File uploaded successfully",
                    "fileName": name,
                    "submittedBy": submitted_by,
                    "size": file.size(),
                    "type": file.content_type,
                    "savedTo": target.display().to_string(),
                }),
                201,
            )
            .await
        })
    });

    app.get("/files/:name", |ctx| {
        Box::pin(async move {
            let name = stored_name(ctx.param("name").unwrap_or_default())
                .ok_or(ServerError::NotFound)?;
            ctx.send_file(uploads_dir().join(name), [("cache-control", "no-cache")])
                .await
        })
    });

    app.listen("127.0.0.1:8443")
        .expect("Server failed to start");
}

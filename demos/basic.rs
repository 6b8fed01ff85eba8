//! Request logging in front of a few JSON endpoints.
//!
//! Run with:
//!   RUST_LOG=info cargo run --example basic
//!
//! Try:
//!   curl -i -X POST http://localhost:3000/test/hello \
//!        -H 'content-type: application/json' \
//!        -d '{"user_name":"alice","password":"secret123"}'
//!   curl http://localhost:3000/test/doc
//!   curl http://localhost:3000/test/events
//!   curl -X POST http://localhost:3000/test/upload \
//!        -H 'content-type: application/octet-stream' --data-binary @Cargo.toml
//!
//! Each logged request produces a `[Request]` and a `[Response]` line sharing
//! one `request_id`. Passwords come back to the client but never reach the log.
//! Set `LOUPE_HTTP_LOG_MAX_BODY_LENGTH=100` to watch `/test/doc` get cut short,
//! or `LOUPE_HTTP_LOG_ENABLED=false` to turn logging off.

use std::time::Duration;

use loupe::middleware::RequestLog;
use loupe::{ContentType, Method, Request, Response, Router, Server, StatusCode};
use serde_json::{Value, json};
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), loupe::Error> {
    tracing_subscriber::fmt::init();

    let app = Router::new()
        .on(Method::POST, "/test/hello",  hello)
        .on(Method::GET,  "/test/doc",    doc)
        .on(Method::GET,  "/test/events", events)
        .on(Method::POST, "/test/upload", upload)
        .layer(RequestLog::from_env()?);

    Server::bind("0.0.0.0:3000").serve(app).await
}

// POST /test/hello
//
// Echoes the JSON body back with a greeting. The body was already read once by
// the logger; the handler still sees all of it.
async fn hello(mut req: Request) -> Response {
    let body = match req.bytes().await {
        Ok(body) => body,
        Err(_) => return Response::status(StatusCode::BAD_REQUEST),
    };
    let Ok(data) = serde_json::from_slice::<Value>(&body) else {
        return Response::status(StatusCode::UNPROCESSABLE_ENTITY);
    };
    if let Some(id) = req.request_id() {
        info!(%id, "greeting");
    }
    let reply = json!({ "greeting": "Hello world !", "data": data });
    match serde_json::to_vec(&reply) {
        Ok(bytes) => Response::json(bytes),
        Err(_) => Response::status(StatusCode::INTERNAL_SERVER_ERROR),
    }
}

// GET /test/doc
//
// Large enough to be truncated in the log at the default limit.
async fn doc(_req: Request) -> Response {
    let items: Vec<Value> = (0..200)
        .map(|i| json!({ "id": i, "title": format!("item {i}"), "token": "abc123" }))
        .collect();
    match serde_json::to_vec(&json!({ "items": items })) {
        Ok(bytes) => Response::json(bytes),
        Err(_) => Response::status(StatusCode::INTERNAL_SERVER_ERROR),
    }
}

// GET /test/events
//
// Streams one JSON array a piece at a time. The logger sees the whole array
// once the last piece is sent, and masks the OTPs in it.
async fn events(_req: Request) -> Response {
    let (response, mut writer) = Response::builder().stream(ContentType::JSON);
    tokio::spawn(async move {
        for i in 0..3 {
            let sep = if i == 0 { "[" } else { "," };
            let piece = format!("{sep}{}", json!({ "event": i, "otp": "000000" }));
            if writer.write(piece).await.is_err() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        let _ = writer.write_line("]").await;
    });
    response
}

// POST /test/upload
//
// Binary uploads skip logging entirely: no record, no X-Request-ID.
async fn upload(mut req: Request) -> String {
    match req.bytes().await {
        Ok(body) => format!("received {} bytes\n", body.len()),
        Err(e) => format!("upload failed: {e}\n"),
    }
}

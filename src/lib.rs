//! # loupe
//!
//! A small hyper-based HTTP framework whose main feature is a request/response
//! logging filter.
//!
//! [`middleware::RequestLog`] sits in front of every route. For each request it
//! logs the method, path, headers and body, then the status, body and latency
//! of the response, both tagged with the same `X-Request-ID`. Bodies are
//! captured without disturbing what the handler reads or the client receives.
//! Passwords, tokens, OTPs and PINs are masked and long bodies are truncated
//! before anything is written.
//!
//! Routing is a [`matchit`] radix tree per method. The server speaks HTTP/1.1
//! and HTTP/2 and drains open connections on SIGTERM or Ctrl-C.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use loupe::middleware::RequestLog;
//! use loupe::{Method, Request, Response, Router, Server, StatusCode};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), loupe::Error> {
//!     tracing_subscriber::fmt::init();
//!
//!     let app = Router::new()
//!         .on(Method::POST, "/login",       login)
//!         .on(Method::GET,  "/orders/{id}", order)
//!         .layer(RequestLog::from_env()?);
//!
//!     Server::bind("0.0.0.0:3000").serve(app).await
//! }
//!
//! // Logged as {"user":"alice","password":"***"}; the handler sees the real body.
//! async fn login(mut req: Request) -> Response {
//!     match req.bytes().await {
//!         Ok(body) if !body.is_empty() => Response::json(br#"{"token":"t0k3n"}"#.to_vec()),
//!         _ => Response::status(StatusCode::BAD_REQUEST),
//!     }
//! }
//!
//! async fn order(req: Request) -> Response {
//!     let id = req.param("id").unwrap_or_default();
//!     Response::json(format!(r#"{{"order":"{id}"}}"#).into_bytes())
//! }
//! ```

mod body;
mod config;
mod error;
mod handler;
mod request;
mod response;
mod router;
mod server;

pub mod middleware;

pub use body::{BodyWriter, RequestBody, ResponseBody};
pub use config::{ENV_PREFIX, LogConfig};
pub use error::{BoxError, Error};
pub use handler::{BoxFuture, Handler};
pub use http::{Method, StatusCode};
pub use request::Request;
pub use response::{ContentType, IntoResponse, Response, ResponseBuilder};
pub use router::Router;
pub use server::{Server, serve_with_shutdown};

//! Requests over a real socket, through hyper, with logging on.

use std::sync::{Arc, Mutex};

use loupe::middleware::{LogError, LogRecord, LogSink, RequestId, RequestLog};
use loupe::{LogConfig, Method, Request, Response, Router, serve_with_shutdown};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;

#[derive(Clone, Default)]
struct MemorySink(Arc<Mutex<Vec<(RequestId, LogRecord)>>>);

impl LogSink for MemorySink {
    fn emit(&self, request_id: &RequestId, record: &LogRecord) -> Result<(), LogError> {
        self.0.lock().unwrap().push((request_id.clone(), record.clone()));
        Ok(())
    }
}

async fn echo(mut req: Request) -> Response {
    match req.bytes().await {
        Ok(body) => Response::json(body.to_vec()),
        Err(_) => Response::text("unreadable"),
    }
}

async fn roundtrip(addr: std::net::SocketAddr, raw: &str) -> String {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(raw.as_bytes()).await.unwrap();
    let mut reply = Vec::new();
    stream.read_to_end(&mut reply).await.unwrap();
    String::from_utf8(reply).unwrap()
}

#[tokio::test]
async fn logged_request_over_http1() {
    let sink = MemorySink::default();
    let app = Router::new()
        .on(Method::POST, "/test/hello", echo)
        .layer(RequestLog::with_sink(LogConfig::default(), sink.clone()));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (stop, stopped) = oneshot::channel::<()>();
    let server = tokio::spawn(serve_with_shutdown(listener, app, async {
        let _ = stopped.await;
    }));

    let body = r#"{"otp":"123456","amount":10}"#;
    let raw = format!(
        "POST /test/hello?debug=1 HTTP/1.1\r\nhost: localhost\r\ncontent-type: application/json\r\n\
         content-length: {}\r\nconnection: close\r\n\r\n{body}",
        body.len()
    );
    let reply = roundtrip(addr, &raw).await;

    assert!(reply.starts_with("HTTP/1.1 200 OK\r\n"), "{reply}");
    assert!(reply.ends_with(body), "{reply}");

    let header = reply
        .lines()
        .find_map(|line| line.strip_prefix("x-request-id: "))
        .expect("x-request-id header")
        .to_owned();
    assert_eq!(header.len(), 15);

    stop.send(()).unwrap();
    server.await.unwrap().unwrap();

    let records = sink.0.lock().unwrap();
    assert_eq!(records.len(), 2);
    assert!(records.iter().all(|(id, _)| id.as_str() == header));

    let request = serde_json::to_value(&records[0].1).unwrap();
    assert_eq!(request["URI"], "/test/hello");
    assert_eq!(request["HEADERS"]["host"], "localhost");
    assert_eq!(request["REQUEST BODY"]["otp"], "***");
    assert_eq!(request["REQUEST BODY"]["amount"], 10);

    let response = serde_json::to_value(&records[1].1).unwrap();
    assert_eq!(response["STATUS"], 200);
    assert_eq!(response["RESPONSE BODY"]["otp"], "***");
}

#[tokio::test]
async fn unknown_route_is_404_and_still_logged() {
    let sink = MemorySink::default();
    let app = Router::new().layer(RequestLog::with_sink(LogConfig::default(), sink.clone()));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (stop, stopped) = oneshot::channel::<()>();
    let server = tokio::spawn(serve_with_shutdown(listener, app, async {
        let _ = stopped.await;
    }));

    let reply = roundtrip(addr, "GET /missing HTTP/1.1\r\nhost: x\r\nconnection: close\r\n\r\n").await;
    assert!(reply.starts_with("HTTP/1.1 404 Not Found\r\n"), "{reply}");
    assert!(reply.contains("x-request-id: "), "{reply}");

    stop.send(()).unwrap();
    server.await.unwrap().unwrap();

    let records = sink.0.lock().unwrap();
    let response = serde_json::to_value(&records[1].1).unwrap();
    assert_eq!(response["STATUS"], 404);
    assert_eq!(response["RESPONSE BODY"], serde_json::Value::Null);
}

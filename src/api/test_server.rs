//! Local HTTP/1.1 server answering with canned responses, for client tests.

use std::sync::Arc;

use serde_json::{json, Value};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// A request as seen by the server.
#[derive(Debug, Clone)]
pub struct Request {
    pub method: String,
    pub path: String,
    pub body: Value,
}

impl Request {
    /// JSON-RPC method name, empty for non-RPC requests.
    pub fn rpc_method(&self) -> &str {
        self.body["method"].as_str().unwrap_or_default()
    }
}

/// Status code and body. Status 0 closes the connection without answering.
pub type Reply = (u16, String);

type Handler = Arc<dyn Fn(&Request) -> Reply + Send + Sync>;

/// Serve `handler` on an ephemeral port and return the base URL.
pub async fn serve<F>(handler: F) -> String
where
    F: Fn(&Request) -> Reply + Send + Sync + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handler: Handler = Arc::new(handler);

    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let handler = handler.clone();
            tokio::spawn(async move {
                let _ = respond(stream, handler).await;
            });
        }
    });

    format!("http://{}", addr)
}

pub fn rpc_result(result: Value) -> Reply {
    (200, json!({ "jsonrpc": "2.0", "id": 1, "result": result }).to_string())
}

pub fn rpc_error(code: i64, message: &str) -> Reply {
    (
        200,
        json!({ "jsonrpc": "2.0", "id": 1, "error": { "code": code, "message": message } })
            .to_string(),
    )
}

/// `getSignatureStatuses` answer for one signature; `None` is an unknown signature.
pub fn signature_status(status: Option<Value>) -> Reply {
    rpc_result(json!({ "context": { "slot": 1 }, "value": [status] }))
}

async fn respond(mut stream: TcpStream, handler: Handler) -> std::io::Result<()> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    let header_end = loop {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            return Ok(());
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
    let mut lines = head.lines();
    let mut request_line = lines.next().unwrap_or_default().split_whitespace();
    let method = request_line.next().unwrap_or_default().to_string();
    let path = request_line.next().unwrap_or_default().to_string();
    let content_length = lines
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.trim().parse::<usize>().ok())
        .unwrap_or(0);

    while buf.len() < header_end + content_length {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }

    let body = serde_json::from_slice(&buf[header_end..]).unwrap_or(Value::Null);
    let (status, reply) = handler(&Request { method, path, body });

    if status == 0 {
        return stream.shutdown().await;
    }

    let response = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        if status < 400 { "OK" } else { "Error" },
        reply.len(),
        reply
    );
    stream.write_all(response.as_bytes()).await?;
    stream.shutdown().await
}

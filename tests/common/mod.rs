//! Shared test helpers: a local WebSocket server standing in for the push
//! gateway, plus a transport config with fast timings.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;

use notify_sdk::prelude::*;

pub type ServerStream = WebSocketStream<TcpStream>;

/// Bind a gateway on a random local port. Returns the listener and its
/// `ws://` base URL.
pub async fn bind_gateway() -> (TcpListener, String) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    (listener, format!("ws://{}", addr))
}

/// Accept one client connection and complete the WebSocket handshake.
pub async fn accept(listener: &TcpListener) -> ServerStream {
    let (stream, _) = tokio::time::timeout(Duration::from_secs(5), listener.accept())
        .await
        .expect("no client connected within 5s")
        .unwrap();
    tokio_tungstenite::accept_async(stream).await.unwrap()
}

pub async fn send_json(ws: &mut ServerStream, json: &str) {
    ws.send(Message::Text(json.to_string().into()))
        .await
        .unwrap();
}

/// Read frames until a text frame arrives.
pub async fn read_text(ws: &mut ServerStream) -> String {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("no frame within 5s")
            .expect("connection closed")
            .expect("read error");
        if let Message::Text(text) = msg {
            return text.to_string();
        }
    }
}

/// Close the server side of a connection with a normal (1000) close frame.
pub async fn close_normal(ws: &mut ServerStream) {
    ws.send(Message::Close(Some(CloseFrame {
        code: CloseCode::Normal,
        reason: "done".into(),
    })))
    .await
    .unwrap();
}

/// A minimal REST backend that serves empty notification lists and zeroed
/// counts, counting how many combined pulls it received.
pub struct RestStub {
    pub base_url: String,
    counts_hits: Arc<AtomicUsize>,
}

impl RestStub {
    /// Number of pulls served so far. Each combined pull issues exactly one
    /// counts request, so that is what gets counted.
    pub fn pulls(&self) -> usize {
        self.counts_hits.load(Ordering::SeqCst)
    }
}

pub async fn spawn_rest_stub() -> RestStub {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base_url = format!("http://{}", listener.local_addr().unwrap());
    let counts_hits = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&counts_hits);

    tokio::spawn(async move {
        loop {
            let Ok((mut stream, _)) = listener.accept().await else {
                break;
            };
            let counter = Arc::clone(&counter);
            tokio::spawn(async move {
                let mut buf = vec![0u8; 4096];
                let Ok(n) = stream.read(&mut buf).await else {
                    return;
                };
                let request = String::from_utf8_lossy(&buf[..n]);
                let body = if request.contains("/api/notifications/counts") {
                    counter.fetch_add(1, Ordering::SeqCst);
                    r#"{"total":0,"unread":0,"read":0}"#
                } else {
                    r#"{"notifications":[],"total":0}"#
                };
                let response = format!(
                    "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    body.len(),
                    body
                );
                let _ = stream.write_all(response.as_bytes()).await;
            });
        }
    });

    RestStub {
        base_url,
        counts_hits,
    }
}

/// Transport config pointed at a local gateway, with timings tightened so
/// reconnect paths run in milliseconds instead of minutes.
pub fn fast_ws_config(url: &str) -> WsConfig {
    let mut config = WsConfig::new(url, UserId::from("u1"));
    config.connect_timeout = Duration::from_secs(2);
    config.base_reconnect_delay = Duration::from_millis(50);
    config.max_reconnect_delay = Duration::from_millis(200);
    config.max_reconnect_attempts = 2;
    config
}

//! Push transport — background-task WebSocket client.
//!
//! The public [`WsClient`] owns at most one background tokio task per user
//! session. The task manages the physical connection, classifies inbound
//! frames, replays channel subscriptions after reconnects, and applies the
//! exponential reconnect backoff. The public API communicates with it via
//! mpsc channels; connection status is shared through an `AtomicU8` so the
//! session can read it without locking.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use crate::error::WsError;
use crate::shared::ChannelName;
use crate::ws::{decode_binary, decode_text, ConnectionStatus, Kind, MessageOut, WsConfig, WsEvent};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

// ─── Commands from public API to background task ─────────────────────────────

enum Command {
    Send(MessageOut),
    Disconnect,
}

// ─── How the connected loop ended ────────────────────────────────────────────

enum LoopExit {
    /// `disconnect()` was called or the client was dropped.
    UserRequested,
    /// Server closed with a normal/going-away/no-status code.
    ExpectedClose,
    /// Anything else — eligible for reconnection.
    Unexpected(String),
}

// ─── Background task state ───────────────────────────────────────────────────

struct TaskState {
    config: WsConfig,
    event_tx: mpsc::Sender<WsEvent>,
    cmd_rx: mpsc::Receiver<Command>,
    /// Channels to replay after every reconnect, kept sorted for
    /// deterministic frame contents.
    channels: BTreeSet<ChannelName>,
    reconnect_attempts: u32,
    status: Arc<AtomicU8>,
}

impl TaskState {
    fn emit(&self, event: WsEvent) {
        let _ = self.event_tx.try_send(event);
    }

    fn set_status(&self, status: ConnectionStatus) {
        self.status.store(status as u8, Ordering::SeqCst);
    }
}

// ─── Public WsClient ─────────────────────────────────────────────────────────

/// Push transport client. At most one live connection per user session.
pub struct WsClient {
    config: WsConfig,
    cmd_tx: Option<mpsc::Sender<Command>>,
    /// Kept so the session's event receiver stays open while no task runs.
    event_tx: mpsc::Sender<WsEvent>,
    task_handle: Option<JoinHandle<()>>,
    status: Arc<AtomicU8>,
}

impl WsClient {
    /// Create a client and the event receiver the session will consume.
    /// Does not connect yet.
    pub fn new(config: WsConfig) -> (Self, mpsc::Receiver<WsEvent>) {
        let (event_tx, event_rx) = mpsc::channel(256);
        let client = Self {
            config,
            cmd_tx: None,
            event_tx,
            task_handle: None,
            status: Arc::new(AtomicU8::new(ConnectionStatus::Disconnected as u8)),
        };
        (client, event_rx)
    }

    /// Open the push connection.
    ///
    /// Idempotent: a no-op while already `Connecting` or `Connected`. Tears
    /// down any stale task first. With no gateway URL configured this sets
    /// `Unavailable` and returns — the session runs on polling alone.
    pub fn connect(&mut self) -> Result<(), WsError> {
        if matches!(
            self.status(),
            ConnectionStatus::Connecting | ConnectionStatus::Connected
        ) {
            return Ok(());
        }

        let Some(url) = self.config.target_url() else {
            tracing::info!("No push gateway configured, running in fallback-only mode");
            self.status
                .store(ConnectionStatus::Unavailable as u8, Ordering::SeqCst);
            return Ok(());
        };

        if let Some(stale) = self.task_handle.take() {
            stale.abort();
        }

        let (cmd_tx, cmd_rx) = mpsc::channel(64);
        self.cmd_tx = Some(cmd_tx);
        self.status
            .store(ConnectionStatus::Connecting as u8, Ordering::SeqCst);

        let state = TaskState {
            config: self.config.clone(),
            event_tx: self.event_tx.clone(),
            cmd_rx,
            channels: BTreeSet::new(),
            reconnect_attempts: 0,
            status: Arc::clone(&self.status),
        };
        self.task_handle = Some(tokio::spawn(run_task(state, url)));
        Ok(())
    }

    /// Close the connection and cancel any pending reconnect.
    ///
    /// Idempotent. The command channel is dropped before waiting, so the
    /// background task sees a user-requested close and never schedules a
    /// reconnect for it.
    pub async fn disconnect(&mut self) {
        if let Some(tx) = self.cmd_tx.take() {
            let _ = tx.send(Command::Disconnect).await;
        }
        if let Some(handle) = self.task_handle.take() {
            let _ = tokio::time::timeout(Duration::from_secs(5), handle).await;
        }
        if self.status() != ConnectionStatus::Unavailable {
            self.status
                .store(ConnectionStatus::Disconnected as u8, Ordering::SeqCst);
        }
    }

    /// Send a control frame to the server.
    pub fn send(&self, msg: MessageOut) -> Result<(), WsError> {
        match &self.cmd_tx {
            Some(tx) => tx.try_send(Command::Send(msg)).map_err(|e| match e {
                mpsc::error::TrySendError::Full(_) => {
                    WsError::SendFailed("Command channel full".into())
                }
                mpsc::error::TrySendError::Closed(_) => WsError::NotConnected,
            }),
            None if self.status() == ConnectionStatus::Unavailable => Err(WsError::Unavailable),
            None => Err(WsError::NotConnected),
        }
    }

    /// Subscribe to clan channels.
    pub fn subscribe(&self, channels: Vec<ChannelName>) -> Result<(), WsError> {
        self.send(MessageOut::Subscribe { channels })
    }

    /// Unsubscribe from clan channels.
    pub fn unsubscribe(&self, channels: Vec<ChannelName>) -> Result<(), WsError> {
        self.send(MessageOut::Unsubscribe { channels })
    }

    /// Current connection status.
    pub fn status(&self) -> ConnectionStatus {
        ConnectionStatus::from(self.status.load(Ordering::SeqCst))
    }

    /// Strictly true only while `Connected`.
    pub fn is_connected(&self) -> bool {
        self.status().is_connected()
    }
}

impl Drop for WsClient {
    fn drop(&mut self) {
        if let Some(handle) = self.task_handle.take() {
            handle.abort();
        }
    }
}

// ─── Background task ─────────────────────────────────────────────────────────

async fn run_task(mut state: TaskState, url: String) {
    loop {
        // ── 1. Attempt connection, bounded by the connect timeout ────────
        state.set_status(ConnectionStatus::Connecting);
        let attempt = tokio::time::timeout(state.config.connect_timeout, connect_async(&url)).await;

        let stream = match attempt {
            Err(_) => {
                tracing::warn!(
                    timeout_ms = state.config.connect_timeout.as_millis() as u64,
                    "Connection attempt timed out"
                );
                state.set_status(ConnectionStatus::Timeout);
                state.emit(WsEvent::Error("Connection timeout".into()));
                None
            }
            Ok(Err(e)) => {
                tracing::error!("WebSocket connection failed: {}", e);
                state.set_status(ConnectionStatus::Error);
                state.emit(WsEvent::Error(format!("Connection failed: {}", e)));
                None
            }
            Ok(Ok((ws, _))) => Some(ws),
        };

        // ── 2. Connected: reset backoff, replay subscriptions ────────────
        if let Some(ws) = stream {
            state.reconnect_attempts = 0;
            state.set_status(ConnectionStatus::Connected);
            state.emit(WsEvent::Connected);

            let (mut sink, stream) = ws.split();
            resubscribe(&mut sink, &state.channels).await;

            match run_connected(&mut state, sink, stream).await {
                LoopExit::UserRequested => {
                    state.set_status(ConnectionStatus::Disconnected);
                    return;
                }
                LoopExit::ExpectedClose => {
                    tracing::info!("Server closed the connection normally, not reconnecting");
                    state.set_status(ConnectionStatus::Disconnected);
                    return;
                }
                LoopExit::Unexpected(reason) => {
                    tracing::warn!("Connection lost: {}", reason);
                    state.set_status(ConnectionStatus::Disconnected);
                }
            }
        }

        // ── 3. Reconnect decision ────────────────────────────────────────
        state.reconnect_attempts += 1;
        if state.reconnect_attempts > state.config.max_reconnect_attempts {
            tracing::warn!(
                max_attempts = state.config.max_reconnect_attempts,
                "Reconnect attempts exhausted, falling back to polling for this session"
            );
            state.set_status(ConnectionStatus::Failed);
            state.emit(WsEvent::ReconnectsExhausted);
            return;
        }

        let delay = backoff_delay(state.reconnect_attempts, &state.config);
        tracing::info!(
            attempt = state.reconnect_attempts,
            max = state.config.max_reconnect_attempts,
            delay_ms = delay.as_millis() as u64,
            "Scheduling reconnect"
        );
        if !backoff_wait(&mut state, delay).await {
            state.set_status(ConnectionStatus::Disconnected);
            return;
        }
    }
}

/// The inner connected loop — runs until the connection breaks.
async fn run_connected(
    state: &mut TaskState,
    mut sink: SplitSink<WsStream, Message>,
    mut stream: SplitStream<WsStream>,
) -> LoopExit {
    loop {
        tokio::select! {
            // ── a) Incoming frame ────────────────────────────────────────
            msg = stream.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        handle_frame(state, decode_text(text.as_ref()));
                    }
                    Some(Ok(Message::Binary(data))) => {
                        handle_frame(state, decode_binary(&data));
                    }
                    Some(Ok(Message::Ping(data))) => {
                        let _ = sink.send(Message::Pong(data)).await;
                    }
                    Some(Ok(Message::Pong(_) | Message::Frame(_))) => {}
                    Some(Ok(Message::Close(frame))) => {
                        let (code, reason) = extract_close(frame.as_ref());
                        state.emit(WsEvent::Disconnected {
                            code: Some(code),
                            reason: reason.clone(),
                        });
                        return if close_is_expected(code) {
                            LoopExit::ExpectedClose
                        } else {
                            LoopExit::Unexpected(format!("close code {}: {}", code, reason))
                        };
                    }
                    Some(Err(e)) => {
                        let reason = e.to_string();
                        tracing::error!("WebSocket error: {}", reason);
                        state.set_status(ConnectionStatus::Error);
                        state.emit(WsEvent::Disconnected { code: None, reason: reason.clone() });
                        return LoopExit::Unexpected(reason);
                    }
                    None => {
                        state.emit(WsEvent::Disconnected {
                            code: None,
                            reason: "Stream ended".into(),
                        });
                        return LoopExit::Unexpected("Stream ended".into());
                    }
                }
            }

            // ── b) Command from public API ───────────────────────────────
            cmd = state.cmd_rx.recv() => {
                match cmd {
                    Some(Command::Send(msg_out)) => {
                        track_channels(&mut state.channels, &msg_out);
                        if let Err(e) = send_msg(&mut sink, &msg_out).await {
                            tracing::warn!("Send failed: {}", e);
                        }
                    }
                    Some(Command::Disconnect) | None => {
                        let _ = sink.send(Message::Close(Some(CloseFrame {
                            code: CloseCode::Normal,
                            reason: "Client disconnect".into(),
                        }))).await;
                        return LoopExit::UserRequested;
                    }
                }
            }
        }
    }
}

/// Route one decoded frame. A bad frame is logged, never fatal.
fn handle_frame(state: &mut TaskState, decoded: Result<Kind, WsError>) {
    match decoded {
        Ok(Kind::Unknown(frame_type)) => {
            tracing::warn!("Unknown message type, dropping: {}", frame_type);
        }
        Ok(kind) => {
            if matches!(kind, Kind::ServerError(_)) {
                state.set_status(ConnectionStatus::Error);
            }
            state.emit(WsEvent::Message(kind));
        }
        Err(e) => {
            tracing::warn!("Frame decode failed: {}", e);
            state.emit(WsEvent::Error(e.to_string()));
        }
    }
}

// ─── Helpers ─────────────────────────────────────────────────────────────────

/// Serialize and send a MessageOut over the sink.
async fn send_msg(sink: &mut SplitSink<WsStream, Message>, msg: &MessageOut) -> Result<(), String> {
    let json = serde_json::to_string(msg).map_err(|e| e.to_string())?;
    sink.send(Message::Text(json.into()))
        .await
        .map_err(|e| e.to_string())
}

/// Extract close code and reason. A missing frame means the peer gave no
/// status (1005).
fn extract_close(frame: Option<&CloseFrame>) -> (u16, String) {
    match frame {
        Some(f) => (f.code.into(), f.reason.to_string()),
        None => (1005, "No close frame".into()),
    }
}

/// Codes representing normal or expected termination: normal closure,
/// going-away, and no-status. These never trigger reconnection.
pub(crate) fn close_is_expected(code: u16) -> bool {
    matches!(code, 1000 | 1001 | 1005)
}

// ─── Channel tracking ────────────────────────────────────────────────────────

fn track_channels(channels: &mut BTreeSet<ChannelName>, msg: &MessageOut) {
    match msg {
        MessageOut::Subscribe { channels: new } => {
            for ch in new {
                channels.insert(ch.clone());
            }
        }
        MessageOut::Unsubscribe { channels: gone } => {
            for ch in gone {
                channels.remove(ch);
            }
        }
    }
}

async fn resubscribe(sink: &mut SplitSink<WsStream, Message>, channels: &BTreeSet<ChannelName>) {
    if channels.is_empty() {
        return;
    }
    tracing::info!(count = channels.len(), "Resubscribing tracked channels");
    let msg = MessageOut::Subscribe {
        channels: channels.iter().cloned().collect(),
    };
    if let Err(e) = send_msg(sink, &msg).await {
        tracing::warn!("Failed to resubscribe: {}", e);
    }
}

// ─── Reconnection backoff ────────────────────────────────────────────────────

/// Delay before reconnect attempt `attempt` (1-indexed):
/// `base * 2^(attempt-1)`, capped at the configured ceiling. Deterministic —
/// consecutive delays strictly increase until they plateau at the cap.
fn backoff_delay(attempt: u32, config: &WsConfig) -> Duration {
    let exp = attempt.saturating_sub(1).min(10);
    let base_ms = config.base_reconnect_delay.as_millis() as u64;
    let delay_ms = base_ms.saturating_mul(1u64 << exp);
    Duration::from_millis(delay_ms).min(config.max_reconnect_delay)
}

/// Sleep out the backoff, staying responsive to commands. Subscription
/// changes arriving meanwhile update the tracked set so the next connect
/// replays the right channels. Returns false when disconnect was requested —
/// the caller must not reconnect.
async fn backoff_wait(state: &mut TaskState, delay: Duration) -> bool {
    let sleep = tokio::time::sleep(delay);
    tokio::pin!(sleep);
    loop {
        tokio::select! {
            () = &mut sleep => return true,
            cmd = state.cmd_rx.recv() => match cmd {
                Some(Command::Send(msg)) => track_channels(&mut state.channels, &msg),
                Some(Command::Disconnect) | None => return false,
            }
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::UserId;

    fn config() -> WsConfig {
        WsConfig::new("wss://push.example.com", UserId::from("u1"))
    }

    #[test]
    fn test_backoff_doubles_then_plateaus() {
        let cfg = config();
        let delays: Vec<u64> = (1..=7)
            .map(|n| backoff_delay(n, &cfg).as_secs())
            .collect();
        assert_eq!(delays, [2, 4, 8, 16, 32, 60, 60]);
        // Strictly increasing until the cap.
        for pair in delays.windows(2) {
            assert!(pair[1] >= pair[0]);
        }
    }

    #[test]
    fn test_close_code_classification() {
        for expected in [1000, 1001, 1005] {
            assert!(close_is_expected(expected));
        }
        for unexpected in [1002, 1006, 1008, 1011, 4000] {
            assert!(!close_is_expected(unexpected));
        }
    }

    #[test]
    fn test_extract_close_with_frame() {
        let frame = CloseFrame {
            code: CloseCode::Normal,
            reason: "goodbye".into(),
        };
        let (code, reason) = extract_close(Some(&frame));
        assert_eq!(code, 1000);
        assert_eq!(reason, "goodbye");
    }

    #[test]
    fn test_extract_close_no_frame_is_no_status() {
        let (code, _) = extract_close(None);
        assert_eq!(code, 1005);
    }

    #[test]
    fn test_track_channels_add_remove() {
        let mut channels = BTreeSet::new();
        let sub = MessageOut::Subscribe {
            channels: vec![ChannelName::from("clan:a:x"), ChannelName::from("clan:b:x")],
        };
        track_channels(&mut channels, &sub);
        assert_eq!(channels.len(), 2);

        // Re-subscribing a held channel is harmless.
        track_channels(&mut channels, &sub);
        assert_eq!(channels.len(), 2);

        let unsub = MessageOut::Unsubscribe {
            channels: vec![ChannelName::from("clan:a:x")],
        };
        track_channels(&mut channels, &unsub);
        assert_eq!(channels.len(), 1);
        assert!(channels.contains(&ChannelName::from("clan:b:x")));
    }

    #[test]
    fn test_send_when_not_connected() {
        let (client, _rx) = WsClient::new(config());
        let result = client.subscribe(vec![ChannelName::from("clan:a:x")]);
        assert!(matches!(result, Err(WsError::NotConnected)));
    }

    #[tokio::test]
    async fn test_connect_without_gateway_is_unavailable() {
        let (mut client, _rx) = WsClient::new(WsConfig::fallback_only(UserId::from("u1")));
        client.connect().unwrap();
        assert_eq!(client.status(), ConnectionStatus::Unavailable);
        assert!(!client.is_connected());
        assert!(matches!(
            client.send(MessageOut::Subscribe { channels: vec![] }),
            Err(WsError::Unavailable)
        ));
        // Still idempotent and safe to tear down.
        client.connect().unwrap();
        client.disconnect().await;
    }

    #[tokio::test]
    async fn test_connect_is_idempotent_while_connecting() {
        // Unroutable target keeps the task in its connecting/backoff cycle.
        let (mut client, _rx) = WsClient::new(WsConfig::new(
            "ws://127.0.0.1:9",
            UserId::from("u1"),
        ));
        client.connect().unwrap();
        let first_status = client.status();
        assert_ne!(first_status, ConnectionStatus::Disconnected);

        // Second connect must not spawn a second task.
        client.connect().unwrap();
        assert!(client.task_handle.is_some());

        client.disconnect().await;
        assert_eq!(client.status(), ConnectionStatus::Disconnected);
    }

    #[tokio::test]
    async fn test_disconnect_twice_is_safe() {
        let (mut client, _rx) = WsClient::new(config());
        client.disconnect().await;
        client.disconnect().await;
        assert_eq!(client.status(), ConnectionStatus::Disconnected);
    }
}

//! WebSocket layer — frame decoding, control messages, connection state.
//!
//! The backend uses one loose envelope for every inbound frame:
//! `{ type, data?, message?, count? }`. The `type` set is open-ended on the
//! server side (`clan_*` variants are added without client releases), so the
//! envelope is decoded untyped first and then classified into the closed
//! [`Kind`] enum here — everything past this boundary dispatches on the tag,
//! never on strings.

pub mod transport;

pub use transport::WsClient;

use crate::domain::clan::wire::WireClanEvent;
use crate::domain::clan::ClanNotification;
use crate::domain::notification::wire::{CountsResponse, WireNotification};
use crate::domain::notification::NotificationCounts;
use crate::error::WsError;
use crate::shared::{ChannelName, UserId};
use serde::{Deserialize, Serialize};
use std::time::Duration;

// ─── Outbound messages ───────────────────────────────────────────────────────

/// Control frames sent from client to server.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessageOut {
    Subscribe { channels: Vec<ChannelName> },
    Unsubscribe { channels: Vec<ChannelName> },
}

// ─── Inbound envelope + classification ───────────────────────────────────────

/// Raw inbound frame, before classification.
#[derive(Debug, Clone, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub frame_type: String,
    #[serde(default)]
    pub data: Option<serde_json::Value>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub count: Option<serde_json::Value>,
}

/// A classified inbound message.
#[derive(Debug, Clone)]
pub enum Kind {
    /// A new or updated single notification.
    Notification(WireNotification),
    /// Authoritative full counts snapshot — always wins over local state.
    Counts(NotificationCounts),
    /// Lighter single-number unread update.
    CountUpdate(u64),
    /// Handshake acknowledgement, informational only.
    Connection,
    /// Server-reported problem.
    ServerError(String),
    /// A `clan_*` event, routed to the clan path.
    Clan(ClanNotification),
    /// Unrecognized or malformed frame; logged and dropped.
    Unknown(String),
}

impl Envelope {
    /// Classify into a [`Kind`]. Malformed payloads degrade to `Unknown`
    /// rather than erroring — a bad frame must never cost the connection.
    pub fn classify(self) -> Kind {
        match self.frame_type.as_str() {
            "notification" => match self.data.map(serde_json::from_value) {
                Some(Ok(wire)) => Kind::Notification(wire),
                _ => Kind::Unknown(self.frame_type),
            },
            "counts" => match self.data.map(serde_json::from_value::<CountsResponse>) {
                Some(Ok(wire)) => Kind::Counts(wire.into()),
                _ => Kind::Unknown(self.frame_type),
            },
            "count_update" => match self.count.as_ref().and_then(|v| v.as_u64()) {
                Some(n) => Kind::CountUpdate(n),
                None => Kind::Unknown(self.frame_type),
            },
            "connection" => Kind::Connection,
            "error" => Kind::ServerError(
                self.message.unwrap_or_else(|| "server error".to_string()),
            ),
            t if t.starts_with("clan_") => {
                match self.data.map(serde_json::from_value::<WireClanEvent>) {
                    Some(Ok(wire)) => Kind::Clan(ClanNotification {
                        kind: self.frame_type,
                        clan_id: wire.clan_id,
                        gig_id: wire.gig_id,
                        message: wire.message,
                        received_at: chrono::Utc::now(),
                    }),
                    _ => Kind::Unknown(self.frame_type),
                }
            }
            _ => Kind::Unknown(self.frame_type),
        }
    }
}

/// Decode a text frame.
pub fn decode_text(text: &str) -> Result<Kind, WsError> {
    let envelope: Envelope = serde_json::from_str(text)
        .map_err(|e| WsError::DeserializationError(e.to_string()))?;
    Ok(envelope.classify())
}

/// Decode a binary frame carrying the same UTF-8 JSON payload. The gateway
/// sometimes delivers frames as binary containers depending on the hop.
pub fn decode_binary(bytes: &[u8]) -> Result<Kind, WsError> {
    let text = std::str::from_utf8(bytes)
        .map_err(|e| WsError::DeserializationError(e.to_string()))?;
    decode_text(text)
}

// ─── WsEvent ─────────────────────────────────────────────────────────────────

/// High-level events emitted by the transport to the session.
#[derive(Debug, Clone)]
pub enum WsEvent {
    /// Connection established.
    Connected,
    /// Connection lost (the transport decides whether to reconnect).
    Disconnected { code: Option<u16>, reason: String },
    /// A classified message from the server.
    Message(Kind),
    /// A decode or protocol error; the connection survives.
    Error(String),
    /// All reconnect attempts spent — polling is now permanent.
    ReconnectsExhausted,
}

// ─── ConnectionStatus ────────────────────────────────────────────────────────

/// Push connection lifecycle state. `is_connected` is strictly true only in
/// `Connected` — the fallback poller keys off that.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[repr(u8)]
pub enum ConnectionStatus {
    #[default]
    Disconnected = 0,
    Connecting = 1,
    Connected = 2,
    /// Transport or server-reported error; transient.
    Error = 3,
    /// Connection establishment timed out; transient.
    Timeout = 4,
    /// Reconnect attempts exhausted; terminal for the session.
    Failed = 5,
    /// No push capability configured; pure-fallback mode.
    Unavailable = 6,
}

impl ConnectionStatus {
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionStatus::Connected)
    }

    /// Whether the transport will ever deliver again this session.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ConnectionStatus::Failed | ConnectionStatus::Unavailable)
    }
}

impl From<u8> for ConnectionStatus {
    fn from(v: u8) -> Self {
        match v {
            1 => ConnectionStatus::Connecting,
            2 => ConnectionStatus::Connected,
            3 => ConnectionStatus::Error,
            4 => ConnectionStatus::Timeout,
            5 => ConnectionStatus::Failed,
            6 => ConnectionStatus::Unavailable,
            _ => ConnectionStatus::Disconnected,
        }
    }
}

// ─── WsConfig ────────────────────────────────────────────────────────────────

/// Configuration for the push transport.
#[derive(Debug, Clone)]
pub struct WsConfig {
    /// Gateway base URL; `None` means the runtime has no push capability
    /// and the session runs on polling alone.
    pub gateway_url: Option<String>,
    pub user_id: UserId,
    pub connect_timeout: Duration,
    pub base_reconnect_delay: Duration,
    pub max_reconnect_delay: Duration,
    pub max_reconnect_attempts: u32,
}

impl WsConfig {
    pub fn new(gateway_url: impl Into<String>, user_id: UserId) -> Self {
        Self {
            gateway_url: Some(gateway_url.into()),
            user_id,
            ..Self::fallback_only(UserId::from(""))
        }
    }

    /// A config with no push capability.
    pub fn fallback_only(user_id: UserId) -> Self {
        Self {
            gateway_url: None,
            user_id,
            connect_timeout: Duration::from_secs(10),
            base_reconnect_delay: Duration::from_secs(2),
            max_reconnect_delay: Duration::from_secs(60),
            max_reconnect_attempts: 5,
        }
    }

    /// Full connection target: gateway base + notifications path + user id.
    pub fn target_url(&self) -> Option<String> {
        let base = self.gateway_url.as_ref()?;
        Some(format!(
            "{}{}?userId={}",
            base.trim_end_matches('/'),
            crate::network::NOTIFICATIONS_WS_PATH,
            urlencoding::encode(self.user_id.as_str())
        ))
    }
}

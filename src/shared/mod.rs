//! Shared newtypes used across all domain modules.
//!
//! These types are serialization-transparent: they serialize/deserialize
//! identically to the raw strings the backend sends, so they can be used
//! directly in wire types without conversion overhead.

use serde::{Deserialize, Serialize};

// ─── NotificationId ──────────────────────────────────────────────────────────

/// Server-assigned notification identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NotificationId(String);

impl NotificationId {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the id is flagged as test/placeholder content.
    ///
    /// The backend's staging pipeline occasionally leaks seeded payloads;
    /// these are dropped at ingest rather than surfaced.
    pub fn is_placeholder(&self) -> bool {
        let lower = self.0.to_ascii_lowercase();
        lower.starts_with("test-") || lower.starts_with("dummy-")
    }
}

impl std::fmt::Display for NotificationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for NotificationId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for NotificationId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

// ─── UserId ──────────────────────────────────────────────────────────────────

/// Authenticated user identifier, supplied by the auth layer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for UserId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for UserId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

// ─── ClanId ──────────────────────────────────────────────────────────────────

/// Clan identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClanId(String);

impl ClanId {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ClanId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ClanId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ClanId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

// ─── GigId ───────────────────────────────────────────────────────────────────

/// Gig identifier carried by clan event payloads.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GigId(String);

impl GigId {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for GigId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for GigId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for GigId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

// ─── ChannelName ─────────────────────────────────────────────────────────────

/// A push topic channel name, e.g. `clan:abc123:gig_created`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelName(String);

impl ChannelName {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ChannelName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ChannelName {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ChannelName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notification_id_serde_transparent() {
        let id = NotificationId::from("n-42");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"n-42\"");
        let back: NotificationId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, back);
    }

    #[test]
    fn test_placeholder_ids() {
        assert!(NotificationId::from("test-123").is_placeholder());
        assert!(NotificationId::from("DUMMY-9").is_placeholder());
        assert!(!NotificationId::from("n-test-1").is_placeholder());
        assert!(!NotificationId::from("contest-1").is_placeholder());
    }

    #[test]
    fn test_channel_name_display() {
        let ch = ChannelName::new("clan:abc:gig_created");
        assert_eq!(ch.to_string(), "clan:abc:gig_created");
    }
}

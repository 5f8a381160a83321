//! Notification domain — the user's notification list and unread counters.

pub mod client;
mod convert;
pub mod state;
pub mod wire;

use crate::shared::NotificationId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use convert::ValidationError;
pub use state::{IngestOutcome, NotificationFeed, ProcessedIdCache};

/// Delivery priority attached by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Normal,
    High,
    Urgent,
}

/// A single notification. Identity is `id`; the only mutable field is `read`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Notification {
    pub id: NotificationId,
    pub title: String,
    pub message: String,
    pub read: bool,
    pub created_at: DateTime<Utc>,
    /// Free-form event kind, e.g. `"gig_invite"`. The backend adds kinds
    /// without client releases, so this stays an open string.
    pub kind: Option<String>,
    pub category: Option<String>,
    pub priority: Option<Priority>,
    pub action_url: Option<String>,
    pub icon: Option<String>,
}

/// Aggregate counters. The server is the single source of truth; any locally
/// adjusted value is provisional until the next `counts` snapshot.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct NotificationCounts {
    pub total: u64,
    pub unread: u64,
    pub read: u64,
}

/// Per-category delivery preferences.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct NotificationPreferences {
    #[serde(default)]
    pub categories: std::collections::HashMap<String, bool>,
    #[serde(default)]
    pub sound_enabled: bool,
    #[serde(default)]
    pub desktop_enabled: bool,
}

//! Clan domain — per-clan event feeds delivered over secondary channels.
//!
//! Clan events are lighter-weight than notifications: the backend assigns
//! them no stable id, so dedup keys on `(kind, gig_id, clan_id)` instead.
//! They are surfaced as a separate list and never merged into the
//! notification feed.

pub mod channels;
pub mod client;
pub mod state;
pub mod wire;

use crate::shared::{ClanId, GigId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use channels::{ChannelPlan, DEFAULT_EVENT_KINDS};
pub use state::ClanFeed;

/// A clan event as surfaced to the consumer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClanNotification {
    /// The full frame type, e.g. `"clan_gig_created"`.
    pub kind: String,
    pub clan_id: ClanId,
    pub gig_id: Option<GigId>,
    pub message: Option<String>,
    pub received_at: DateTime<Utc>,
}

impl ClanNotification {
    /// The dedup key: the backend does not guarantee a stable event id.
    pub fn dedup_key(&self) -> (String, Option<GigId>, ClanId) {
        (self.kind.clone(), self.gig_id.clone(), self.clan_id.clone())
    }
}

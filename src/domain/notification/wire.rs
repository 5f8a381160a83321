//! Wire types for notification payloads (REST + WS).
//!
//! The backend speaks camelCase JSON. The same notification shape arrives
//! over both the REST list endpoints and push `notification` frames.

use super::{NotificationCounts, NotificationPreferences, Priority};
use crate::shared::NotificationId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A notification as the backend sends it. `id` is optional here because
/// malformed frames do arrive; conversion to the domain type rejects them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WireNotification {
    #[serde(default)]
    pub id: Option<NotificationId>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub read: bool,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub priority: Option<Priority>,
    #[serde(default)]
    pub action_url: Option<String>,
    #[serde(default)]
    pub icon: Option<String>,
}

/// REST response for the notification list endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct NotificationsResponse {
    pub notifications: Vec<WireNotification>,
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub page: Option<u32>,
    #[serde(default)]
    pub pages: Option<u32>,
}

/// REST response for the counts endpoint. Same shape as the push `counts`
/// frame payload.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct CountsResponse {
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub unread: u64,
    #[serde(default)]
    pub read: u64,
}

impl From<CountsResponse> for NotificationCounts {
    fn from(w: CountsResponse) -> Self {
        Self {
            total: w.total,
            unread: w.unread,
            read: w.read,
        }
    }
}

/// REST response for preferences get/update.
#[derive(Debug, Clone, Deserialize)]
pub struct PreferencesResponse {
    pub preferences: NotificationPreferences,
}

/// REST response for the analytics endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsResponse {
    #[serde(default)]
    pub total_received: u64,
    #[serde(default)]
    pub total_read: u64,
    #[serde(default)]
    pub read_rate: f64,
    #[serde(default)]
    pub by_category: HashMap<String, u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_notification_camel_case() {
        let json = r#"{
            "id": "n1",
            "title": "Hi",
            "message": "hello",
            "read": false,
            "createdAt": "2026-01-15T10:00:00Z",
            "type": "gig_invite",
            "actionUrl": "/gigs/42"
        }"#;
        let w: WireNotification = serde_json::from_str(json).unwrap();
        assert_eq!(w.id.as_ref().unwrap().as_str(), "n1");
        assert_eq!(w.kind.as_deref(), Some("gig_invite"));
        assert_eq!(w.action_url.as_deref(), Some("/gigs/42"));
    }

    #[test]
    fn test_wire_notification_missing_id_parses() {
        let w: WireNotification = serde_json::from_str(r#"{"title":"x"}"#).unwrap();
        assert!(w.id.is_none());
    }

    #[test]
    fn test_counts_response_into_domain() {
        let c: CountsResponse =
            serde_json::from_str(r#"{"total":10,"unread":3,"read":7}"#).unwrap();
        let counts = NotificationCounts::from(c);
        assert_eq!(counts.unread, 3);
        assert_eq!(counts.total, 10);
    }
}

//! Wire types for clan payloads (REST + WS).

use crate::shared::{ChannelName, ClanId, GigId};
use serde::{Deserialize, Serialize};

/// The `data` payload of a `clan_*` push frame.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WireClanEvent {
    pub clan_id: ClanId,
    #[serde(default)]
    pub gig_id: Option<GigId>,
    #[serde(default)]
    pub message: Option<String>,
}

/// REST response for the current channel list.
#[derive(Debug, Clone, Deserialize)]
pub struct ChannelsResponse {
    pub channels: Vec<ChannelName>,
}

/// REST request body for channel subscribe/unsubscribe.
#[derive(Debug, Clone, Serialize)]
pub struct ChannelsRequest {
    pub channels: Vec<ChannelName>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_clan_event_camel_case() {
        let w: WireClanEvent =
            serde_json::from_str(r#"{"clanId":"c1","gigId":"g1"}"#).unwrap();
        assert_eq!(w.clan_id.as_str(), "c1");
        assert_eq!(w.gig_id.as_ref().unwrap().as_str(), "g1");
        assert!(w.message.is_none());
    }
}

//! Channel name derivation and subscription planning.
//!
//! The desired channel set is derived from the user's current clan
//! memberships (the union of "my clans" and joined public clans). On every
//! membership change the session diffs desired against held channels and
//! issues the minimal subscribe/unsubscribe control frames.

use crate::shared::{ChannelName, ClanId, UserId};
use std::collections::HashSet;

/// Event kinds every member subscribes to per clan.
pub const DEFAULT_EVENT_KINDS: &[&str] = &["gig_created", "gig_claimed", "member_joined"];

impl ChannelName {
    /// Clan-wide channel: `clan:{id}:{kind}`.
    pub fn for_clan(clan: &ClanId, kind: &str) -> Self {
        Self::new(format!("clan:{}:{}", clan, kind))
    }

    /// Member-scoped channel: `clan:{id}:{kind}:{member}`.
    pub fn for_member(clan: &ClanId, kind: &str, member: &UserId) -> Self {
        Self::new(format!("clan:{}:{}:{}", clan, kind, member))
    }
}

/// The channels a user with the given memberships should hold.
pub fn desired_channels(memberships: &[ClanId], kinds: &[&str]) -> HashSet<ChannelName> {
    let mut set = HashSet::with_capacity(memberships.len() * kinds.len());
    for clan in memberships {
        for kind in kinds {
            set.insert(ChannelName::for_clan(clan, kind));
        }
    }
    set
}

/// The subscribe/unsubscribe frames needed to move from `current` to
/// `desired`. Re-subscribing a held channel is harmless but avoided here to
/// keep reconnect replay traffic minimal.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelPlan {
    pub subscribe: Vec<ChannelName>,
    pub unsubscribe: Vec<ChannelName>,
}

impl ChannelPlan {
    pub fn diff(current: &HashSet<ChannelName>, desired: &HashSet<ChannelName>) -> Self {
        let mut subscribe: Vec<_> = desired.difference(current).cloned().collect();
        let mut unsubscribe: Vec<_> = current.difference(desired).cloned().collect();
        subscribe.sort();
        unsubscribe.sort();
        Self {
            subscribe,
            unsubscribe,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.subscribe.is_empty() && self.unsubscribe.is_empty()
    }
}

impl Ord for ChannelName {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.as_str().cmp(other.as_str())
    }
}

impl PartialOrd for ChannelName {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

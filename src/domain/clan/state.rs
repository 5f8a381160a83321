//! Clan event state container.

use super::ClanNotification;
use crate::shared::{ClanId, GigId};
use std::collections::{HashSet, VecDeque};

/// Rolling clan event buffer with tuple-keyed dedup.
///
/// Clan events separately increment the unread counter (additively, on top
/// of the last authoritative snapshot) until the next snapshot arrives and
/// `reset_extra_unread` is called.
#[derive(Debug, Clone)]
pub struct ClanFeed {
    events: VecDeque<ClanNotification>,
    seen: HashSet<(String, Option<GigId>, ClanId)>,
    extra_unread: u64,
    max_size: usize,
}

impl Default for ClanFeed {
    fn default() -> Self {
        Self::new(100)
    }
}

impl ClanFeed {
    pub fn new(max_size: usize) -> Self {
        Self {
            events: VecDeque::with_capacity(max_size),
            seen: HashSet::new(),
            extra_unread: 0,
            max_size,
        }
    }

    /// Ingest a clan event. Returns false when the `(kind, gig, clan)`
    /// tuple was already seen. The dedup set stays bounded with the buffer:
    /// an evicted event's key goes with it, so dedup covers exactly the
    /// retained window.
    pub fn ingest(&mut self, event: ClanNotification) -> bool {
        if !self.seen.insert(event.dedup_key()) {
            return false;
        }
        if self.events.len() >= self.max_size {
            if let Some(old) = self.events.pop_back() {
                self.seen.remove(&old.dedup_key());
            }
        }
        self.events.push_front(event);
        self.extra_unread += 1;
        true
    }

    /// Called when an authoritative counts snapshot lands: the server value
    /// now covers everything, so the additive local contribution resets.
    pub fn reset_extra_unread(&mut self) {
        self.extra_unread = 0;
    }

    pub fn events(&self) -> &VecDeque<ClanNotification> {
        &self.events
    }

    pub fn extra_unread(&self) -> u64 {
        self.extra_unread
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn snapshot(&self) -> Vec<ClanNotification> {
        self.events.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn event(kind: &str, gig: Option<&str>, clan: &str) -> ClanNotification {
        ClanNotification {
            kind: kind.to_string(),
            clan_id: ClanId::from(clan),
            gig_id: gig.map(GigId::from),
            message: None,
            received_at: Utc::now(),
        }
    }

    #[test]
    fn test_identical_tuple_kept_once() {
        let mut feed = ClanFeed::default();
        assert!(feed.ingest(event("clan_gig_created", Some("g1"), "c1")));
        assert!(!feed.ingest(event("clan_gig_created", Some("g1"), "c1")));
        assert_eq!(feed.len(), 1);
        assert_eq!(feed.extra_unread(), 1);
    }

    #[test]
    fn test_tuple_components_distinguish() {
        let mut feed = ClanFeed::default();
        assert!(feed.ingest(event("clan_gig_created", Some("g1"), "c1")));
        assert!(feed.ingest(event("clan_gig_claimed", Some("g1"), "c1")));
        assert!(feed.ingest(event("clan_gig_created", Some("g2"), "c1")));
        assert!(feed.ingest(event("clan_gig_created", Some("g1"), "c2")));
        assert_eq!(feed.len(), 4);
    }

    #[test]
    fn test_extra_unread_resets_on_snapshot() {
        let mut feed = ClanFeed::default();
        feed.ingest(event("clan_gig_created", Some("g1"), "c1"));
        feed.ingest(event("clan_gig_created", Some("g2"), "c1"));
        assert_eq!(feed.extra_unread(), 2);
        feed.reset_extra_unread();
        assert_eq!(feed.extra_unread(), 0);
    }

    #[test]
    fn test_eviction_releases_dedup_key() {
        let mut feed = ClanFeed::new(2);
        feed.ingest(event("clan_gig_created", Some("g1"), "c1"));
        feed.ingest(event("clan_gig_created", Some("g2"), "c1"));
        feed.ingest(event("clan_gig_created", Some("g3"), "c1"));
        // g1 was evicted, so its tuple is ingestible again; g3 is held.
        assert!(feed.ingest(event("clan_gig_created", Some("g1"), "c1")));
        assert!(!feed.ingest(event("clan_gig_created", Some("g3"), "c1")));
        assert_eq!(feed.len(), 2);
        assert_eq!(feed.seen.len(), 2);
    }

    #[test]
    fn test_rolling_buffer_evicts_oldest() {
        let mut feed = ClanFeed::new(2);
        feed.ingest(event("clan_gig_created", Some("g1"), "c1"));
        feed.ingest(event("clan_gig_created", Some("g2"), "c1"));
        feed.ingest(event("clan_gig_created", Some("g3"), "c1"));
        assert_eq!(feed.len(), 2);
        let gigs: Vec<_> = feed
            .events()
            .iter()
            .map(|e| e.gig_id.as_ref().unwrap().as_str())
            .collect();
        assert_eq!(gigs, ["g3", "g2"]);
    }
}

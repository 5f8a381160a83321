//! Notification state containers — app-owned, SDK-provided update logic.
//!
//! `NotificationFeed` is the single reconciliation point for both delivery
//! modes: push frames and fallback-poll results land here through the same
//! methods, and the dedup + counts-authority rules below are what make the
//! final state convergent regardless of arrival order.

use super::wire::WireNotification;
use super::{Notification, NotificationCounts};
use crate::shared::NotificationId;
use std::collections::{HashSet, VecDeque};

/// Default capacity of the processed-id cache.
pub const PROCESSED_CACHE_CAPACITY: usize = 100;
/// Number of most-recent ids kept when the cache is trimmed.
pub const PROCESSED_CACHE_RETAIN: usize = 50;

// ─── ProcessedIdCache ────────────────────────────────────────────────────────

/// Bounded, insertion-ordered set of notification ids already surfaced this
/// session. Suppresses duplicate deliveries arriving via both the push
/// transport and the poller. Never persisted.
#[derive(Debug, Clone)]
pub struct ProcessedIdCache {
    order: VecDeque<NotificationId>,
    seen: HashSet<NotificationId>,
    capacity: usize,
    retain: usize,
}

impl Default for ProcessedIdCache {
    fn default() -> Self {
        Self::new(PROCESSED_CACHE_CAPACITY, PROCESSED_CACHE_RETAIN)
    }
}

impl ProcessedIdCache {
    pub fn new(capacity: usize, retain: usize) -> Self {
        Self {
            order: VecDeque::with_capacity(capacity + 1),
            seen: HashSet::with_capacity(capacity + 1),
            capacity,
            retain,
        }
    }

    pub fn contains(&self, id: &NotificationId) -> bool {
        self.seen.contains(id)
    }

    /// Record an id. Returns false if it was already present.
    /// Trims to the most recent `retain` entries once past capacity.
    pub fn insert(&mut self, id: NotificationId) -> bool {
        if !self.seen.insert(id.clone()) {
            return false;
        }
        self.order.push_back(id);
        if self.order.len() > self.capacity {
            while self.order.len() > self.retain {
                if let Some(old) = self.order.pop_front() {
                    self.seen.remove(&old);
                }
            }
        }
        true
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

// ─── IngestOutcome ───────────────────────────────────────────────────────────

/// Why a push-delivered notification was or was not added to the feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    /// Added to the front of the list.
    Inserted,
    /// Frame carried no id.
    MissingId,
    /// Id flagged as test/placeholder content.
    Placeholder,
    /// Already surfaced this session (processed-id cache hit).
    AlreadyProcessed,
    /// Already present in the current list.
    AlreadyListed,
}

impl IngestOutcome {
    pub fn inserted(&self) -> bool {
        matches!(self, IngestOutcome::Inserted)
    }
}

// ─── NotificationFeed ────────────────────────────────────────────────────────

/// The canonical in-memory notification list + counters.
///
/// Counts are never computed from the list: local mutations adjust them
/// provisionally, and every authoritative server snapshot overwrites them
/// wholesale.
#[derive(Debug, Clone, Default)]
pub struct NotificationFeed {
    items: VecDeque<Notification>,
    counts: NotificationCounts,
    processed: ProcessedIdCache,
}

impl NotificationFeed {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Ingestion (push path) ────────────────────────────────────────────

    /// Ingest a push-delivered notification frame.
    ///
    /// Does not touch the counters — the caller schedules an authoritative
    /// counts refresh instead, so a racing server snapshot can never be
    /// clobbered by a local guess.
    pub fn ingest(&mut self, wire: WireNotification) -> IngestOutcome {
        let Some(id) = wire.id.clone() else {
            return IngestOutcome::MissingId;
        };
        if id.is_placeholder() {
            return IngestOutcome::Placeholder;
        }
        if self.processed.contains(&id) {
            return IngestOutcome::AlreadyProcessed;
        }
        if self.items.iter().any(|n| n.id == id) {
            self.processed.insert(id);
            return IngestOutcome::AlreadyListed;
        }

        // id presence was checked above, so the conversion cannot fail
        let Ok(notification) = Notification::try_from(wire) else {
            return IngestOutcome::MissingId;
        };
        self.items.push_front(notification);
        self.processed.insert(id);
        IngestOutcome::Inserted
    }

    /// Replace the whole list from a REST pull (newest-first as served).
    /// Pulled ids also populate the processed cache so a later push of the
    /// same notification is suppressed.
    pub fn replace(&mut self, items: Vec<Notification>) {
        self.items.clear();
        for n in items {
            self.processed.insert(n.id.clone());
            self.items.push_back(n);
        }
    }

    // ── Authoritative counts ─────────────────────────────────────────────

    /// Overwrite the counters with a server snapshot. Always wins.
    pub fn apply_counts(&mut self, counts: NotificationCounts) {
        self.counts = counts;
    }

    /// Apply a lighter single-number unread update.
    pub fn apply_count_update(&mut self, unread: u64) {
        self.counts.unread = unread;
        self.counts.read = self.counts.total.saturating_sub(unread);
    }

    // ── Optimistic local mutations ───────────────────────────────────────

    /// Flip one item to read. Returns false if the id is unknown.
    pub fn mark_read(&mut self, id: &NotificationId) -> bool {
        let Some(item) = self.items.iter_mut().find(|n| &n.id == id) else {
            return false;
        };
        if !item.read {
            item.read = true;
            self.counts.unread = self.counts.unread.saturating_sub(1);
            self.counts.read = self.counts.read.saturating_add(1);
        }
        true
    }

    /// Flip every item to read and zero the unread counter. Returns the
    /// number of items that changed.
    pub fn mark_all_read(&mut self) -> usize {
        let mut changed = 0;
        for item in self.items.iter_mut() {
            if !item.read {
                item.read = true;
                changed += 1;
            }
        }
        self.counts.read = self.counts.total;
        self.counts.unread = 0;
        changed
    }

    /// Remove one item. Returns false if the id is unknown.
    pub fn remove(&mut self, id: &NotificationId) -> bool {
        let Some(pos) = self.items.iter().position(|n| &n.id == id) else {
            return false;
        };
        let Some(removed) = self.items.remove(pos) else {
            return false;
        };
        self.counts.total = self.counts.total.saturating_sub(1);
        if removed.read {
            self.counts.read = self.counts.read.saturating_sub(1);
        } else {
            self.counts.unread = self.counts.unread.saturating_sub(1);
        }
        true
    }

    /// Drop everything and zero the counters.
    pub fn clear(&mut self) {
        self.items.clear();
        self.counts = NotificationCounts::default();
    }

    // ── Accessors ────────────────────────────────────────────────────────

    pub fn notifications(&self) -> &VecDeque<Notification> {
        &self.items
    }

    pub fn counts(&self) -> NotificationCounts {
        self.counts
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn snapshot(&self) -> Vec<Notification> {
        self.items.iter().cloned().collect()
    }
}

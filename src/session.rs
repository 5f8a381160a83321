//! Notification session — the composition root.
//!
//! One orchestrator task per authenticated user merges every update source
//! into the same reconciliation path: push frames from the transport, the
//! fallback poll ticker, the delayed counts-refresh safety net, and user
//! actions. Exactly one of push and polling is actively delivering at any
//! moment — the poller keys strictly off the transport's `Connected` status.
//!
//! Consumers receive state through a `tokio::sync::watch` channel of
//! [`FeedSnapshot`]s and drive mutations through the async action methods.

use std::collections::HashSet;
use std::time::{Duration, Instant};

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::domain::clan::channels::{desired_channels, ChannelPlan, DEFAULT_EVENT_KINDS};
use crate::domain::clan::{ClanFeed, ClanNotification};
use crate::domain::notification::wire::NotificationsResponse;
use crate::domain::notification::{Notification, NotificationCounts, NotificationFeed};
use crate::error::SdkError;
use crate::http::client::ListQuery;
use crate::http::NotifyHttp;
use crate::poller::{PollThrottle, DEFAULT_POLL_INTERVAL};
use crate::shared::{ChannelName, ClanId, NotificationId};
use crate::ws::transport::{close_is_expected, WsClient};
use crate::ws::{ConnectionStatus, Kind, WsConfig, WsEvent};

/// Session tuning knobs.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Whether the fallback poller runs at all.
    pub auto_refresh: bool,
    /// Interval between fallback polls.
    pub poll_interval: Duration,
    /// Page size for list pulls.
    pub page_size: u32,
    /// Delay between the first successful connect and the settle pull.
    pub settle_delay: Duration,
    /// Delay before the counts-refresh safety net after a push ingest.
    pub counts_refresh_delay: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            auto_refresh: true,
            poll_interval: DEFAULT_POLL_INTERVAL,
            page_size: 20,
            settle_delay: Duration::from_millis(500),
            counts_refresh_delay: Duration::from_secs(1),
        }
    }
}

/// Point-in-time view of the session state.
#[derive(Debug, Clone, Default)]
pub struct FeedSnapshot {
    pub notifications: Vec<Notification>,
    pub counts: NotificationCounts,
    pub clan_events: Vec<ClanNotification>,
    /// Clan events received since the last authoritative counts snapshot.
    pub clan_unread: u64,
    pub status: ConnectionStatus,
}

impl FeedSnapshot {
    /// Unread badge value: authoritative unread plus the additive clan
    /// contribution since the last snapshot.
    pub fn unread_total(&self) -> u64 {
        self.counts.unread + self.clan_unread
    }
}

// ─── Actions ─────────────────────────────────────────────────────────────────

enum Action {
    MarkRead(NotificationId),
    MarkAllRead,
    Delete(NotificationId),
    ClearAll,
    Refresh,
    SetClanMemberships(Vec<ClanId>),
    Foreground,
    Shutdown,
}

// ─── Public session handle ───────────────────────────────────────────────────

/// A running notification session.
///
/// Dropping the session aborts the orchestrator task; prefer
/// [`shutdown`](Self::shutdown) for a clean unsubscribe + disconnect.
pub struct NotificationSession {
    action_tx: mpsc::Sender<Action>,
    snapshot_rx: watch::Receiver<FeedSnapshot>,
    task_handle: Option<JoinHandle<()>>,
}

impl NotificationSession {
    /// Spawn the orchestrator task and connect the push transport.
    pub fn spawn(http: NotifyHttp, ws_config: WsConfig, config: SessionConfig) -> Self {
        let (action_tx, action_rx) = mpsc::channel(64);
        let (snapshot_tx, snapshot_rx) = watch::channel(FeedSnapshot::default());
        let (ws, ws_events) = WsClient::new(ws_config);

        let task = SessionTask {
            http,
            config,
            ws,
            ws_events,
            action_rx,
            snapshot_tx,
            feed: NotificationFeed::new(),
            clans: ClanFeed::default(),
            throttle: PollThrottle::default(),
            held_channels: HashSet::new(),
            settled: false,
            push_ended: false,
            last_status: ConnectionStatus::Disconnected,
        };
        let task_handle = Some(tokio::spawn(task.run()));

        Self {
            action_tx,
            snapshot_rx,
            task_handle,
        }
    }

    /// A receiver that observes every published state change.
    pub fn watch(&self) -> watch::Receiver<FeedSnapshot> {
        self.snapshot_rx.clone()
    }

    /// The latest published state.
    pub fn snapshot(&self) -> FeedSnapshot {
        self.snapshot_rx.borrow().clone()
    }

    pub async fn mark_read(&self, id: NotificationId) -> Result<(), SdkError> {
        self.act(Action::MarkRead(id)).await
    }

    pub async fn mark_all_read(&self) -> Result<(), SdkError> {
        self.act(Action::MarkAllRead).await
    }

    pub async fn delete(&self, id: NotificationId) -> Result<(), SdkError> {
        self.act(Action::Delete(id)).await
    }

    pub async fn clear_all(&self) -> Result<(), SdkError> {
        self.act(Action::ClearAll).await
    }

    /// Reset all pull throttling and pull immediately, even while connected
    /// or right after a previous pull.
    pub async fn refresh(&self) -> Result<(), SdkError> {
        self.act(Action::Refresh).await
    }

    /// Same contract as [`refresh`](Self::refresh).
    pub async fn force_refresh(&self) -> Result<(), SdkError> {
        self.act(Action::Refresh).await
    }

    /// Reconcile channel subscriptions with the user's current clan
    /// memberships (the union of owned and joined clans).
    pub async fn set_clan_memberships(&self, clans: Vec<ClanId>) -> Result<(), SdkError> {
        self.act(Action::SetClanMemberships(clans)).await
    }

    /// Hint that the app returned to the foreground; triggers one ad-hoc
    /// pull when the transport is down.
    pub async fn notify_foreground(&self) -> Result<(), SdkError> {
        self.act(Action::Foreground).await
    }

    /// Unsubscribe channels, disconnect the transport, and stop all timers.
    pub async fn shutdown(mut self) {
        let _ = self.action_tx.send(Action::Shutdown).await;
        if let Some(handle) = self.task_handle.take() {
            let _ = tokio::time::timeout(Duration::from_secs(5), handle).await;
        }
    }

    async fn act(&self, action: Action) -> Result<(), SdkError> {
        self.action_tx
            .send(action)
            .await
            .map_err(|_| SdkError::SessionClosed)
    }
}

impl Drop for NotificationSession {
    fn drop(&mut self) {
        if let Some(handle) = self.task_handle.take() {
            handle.abort();
        }
    }
}

// ─── Orchestrator task ───────────────────────────────────────────────────────

struct SessionTask {
    http: NotifyHttp,
    config: SessionConfig,
    ws: WsClient,
    ws_events: mpsc::Receiver<WsEvent>,
    action_rx: mpsc::Receiver<Action>,
    snapshot_tx: watch::Sender<FeedSnapshot>,
    feed: NotificationFeed,
    clans: ClanFeed,
    throttle: PollThrottle,
    held_channels: HashSet<ChannelName>,
    settled: bool,
    /// Set when the server closed the push stream cleanly. A clean close
    /// means the stream is over for this session, so fallback polling stays
    /// off too — only explicit user actions pull after it.
    push_ended: bool,
    last_status: ConnectionStatus,
}

impl SessionTask {
    async fn run(mut self) {
        if let Err(e) = self.ws.connect() {
            tracing::error!("Push transport failed to start: {}", e);
        }

        // Initial load so consumers have data before the first tick or frame.
        self.pull_all().await;

        let mut ticker = tokio::time::interval(self.config.poll_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        // Resettable one-shot timers, parked far in the future while unarmed.
        let far_future = tokio::time::Instant::now() + Duration::from_secs(86400);
        let settle_sleep = tokio::time::sleep_until(far_future);
        tokio::pin!(settle_sleep);
        let mut settle_armed = false;
        let counts_sleep = tokio::time::sleep_until(far_future);
        tokio::pin!(counts_sleep);
        let mut counts_armed = false;

        loop {
            tokio::select! {
                // ── a) Push transport events ─────────────────────────────
                ev = self.ws_events.recv() => {
                    if let Some(ev) = ev {
                        match ev {
                            WsEvent::Connected => {
                                tracing::info!("Push transport connected");
                                if !self.settled {
                                    self.settled = true;
                                    settle_armed = true;
                                    settle_sleep.as_mut().reset(
                                        tokio::time::Instant::now() + self.config.settle_delay,
                                    );
                                }
                                self.publish();
                            }
                            WsEvent::Disconnected { code, reason } => {
                                tracing::debug!(?code, reason, "Push transport disconnected");
                                if code.is_some_and(close_is_expected) {
                                    tracing::info!("Push stream ended cleanly, fallback polling stays off");
                                    self.push_ended = true;
                                }
                                self.publish();
                            }
                            WsEvent::ReconnectsExhausted => {
                                tracing::info!("Push delivery unavailable, polling for the rest of the session");
                                self.publish();
                            }
                            WsEvent::Error(e) => {
                                tracing::debug!("Transport error: {}", e);
                            }
                            WsEvent::Message(kind) => {
                                if self.handle_message(kind) {
                                    counts_armed = true;
                                    counts_sleep.as_mut().reset(
                                        tokio::time::Instant::now()
                                            + self.config.counts_refresh_delay,
                                    );
                                }
                            }
                        }
                    }
                }

                // ── b) Fallback poll tick ────────────────────────────────
                _ = ticker.tick() => {
                    self.on_tick().await;
                }

                // ── c) One-time settle pull after first connect ──────────
                () = &mut settle_sleep, if settle_armed => {
                    settle_armed = false;
                    settle_sleep.as_mut().reset(far_future);
                    tracing::debug!("Running post-connect settle pull");
                    self.pull_all().await;
                }

                // ── d) Counts-refresh safety net after a push ingest ─────
                () = &mut counts_sleep, if counts_armed => {
                    counts_armed = false;
                    counts_sleep.as_mut().reset(far_future);
                    self.refresh_counts().await;
                }

                // ── e) User actions ──────────────────────────────────────
                act = self.action_rx.recv() => {
                    match act {
                        Some(Action::Shutdown) | None => break,
                        Some(action) => self.handle_action(action).await,
                    }
                }
            }
        }

        self.teardown().await;
    }

    /// Route one classified push message into the reconciliation state.
    /// Returns true when a counts-refresh safety net should be scheduled.
    fn handle_message(&mut self, kind: Kind) -> bool {
        match kind {
            Kind::Notification(wire) => {
                let outcome = self.feed.ingest(wire);
                tracing::debug!(?outcome, "Push notification ingested");
                if outcome.inserted() {
                    self.throttle.note_push(Instant::now());
                    self.publish();
                    // The server normally pushes a counts snapshot right
                    // after; the delayed pull is the safety net if it
                    // doesn't.
                    return true;
                }
                false
            }
            Kind::Counts(counts) => {
                self.feed.apply_counts(counts);
                self.clans.reset_extra_unread();
                self.throttle.note_push(Instant::now());
                self.publish();
                false
            }
            Kind::CountUpdate(unread) => {
                self.feed.apply_count_update(unread);
                self.throttle.note_push(Instant::now());
                self.publish();
                false
            }
            Kind::Connection => {
                tracing::debug!("Gateway handshake acknowledged");
                false
            }
            Kind::ServerError(msg) => {
                tracing::warn!("Server reported error: {}", msg);
                self.publish();
                false
            }
            Kind::Clan(event) => {
                if self.clans.ingest(event) {
                    self.throttle.note_push(Instant::now());
                    self.publish();
                }
                false
            }
            // The transport drops unknown frames before they get here.
            Kind::Unknown(_) => false,
        }
    }

    async fn handle_action(&mut self, action: Action) {
        match action {
            Action::MarkRead(id) => {
                self.feed.mark_read(&id);
                self.publish();
                if let Err(e) = self.http.mark_read(&id).await {
                    tracing::warn!("mark_read({}) failed: {}", id, e);
                }
                self.refresh_counts().await;
            }
            Action::MarkAllRead => {
                self.feed.mark_all_read();
                self.publish();
                if let Err(e) = self.http.mark_all_read().await {
                    tracing::warn!("mark_all_read failed: {}", e);
                }
                self.refresh_counts().await;
            }
            Action::Delete(id) => {
                self.feed.remove(&id);
                self.publish();
                if let Err(e) = self.http.delete_notification(&id).await {
                    tracing::warn!("delete({}) failed: {}", id, e);
                }
                self.refresh_counts().await;
            }
            Action::ClearAll => {
                self.feed.clear();
                self.publish();
                if let Err(e) = self.http.clear_notifications().await {
                    tracing::warn!("clear_all failed: {}", e);
                }
                self.refresh_counts().await;
            }
            Action::Refresh => {
                self.throttle.reset();
                self.pull_all().await;
            }
            Action::SetClanMemberships(clans) => {
                self.reconcile_channels(&clans);
            }
            Action::Foreground => {
                if !self.ws.is_connected() && self.throttle.check_adhoc(Instant::now()).is_ok() {
                    tracing::debug!("Foreground nudge, pulling once");
                    self.pull_all().await;
                }
            }
            Action::Shutdown => unreachable!("handled by the run loop"),
        }
    }

    /// One fallback poll tick. Skips silently while connected or throttled.
    async fn on_tick(&mut self) {
        let status = self.ws.status();
        if status != self.last_status {
            self.publish();
        }
        if !self.config.auto_refresh || self.push_ended || status.is_connected() {
            return;
        }
        match self.throttle.check(Instant::now()) {
            Ok(()) => self.pull_all().await,
            Err(reason) => tracing::trace!(?reason, "Skipping poll tick"),
        }
    }

    /// Combined list + counts pull. Failures leave known state intact.
    async fn pull_all(&mut self) {
        self.throttle.begin();
        let query = ListQuery {
            limit: Some(self.config.page_size),
            ..ListQuery::default()
        };
        let (list, counts) = tokio::join!(self.http.get_notifications(&query), self.http.get_counts());

        match list {
            Ok(resp) => self.feed.replace(accepted_items(resp)),
            Err(e) => tracing::warn!("Notification pull failed: {}", e),
        }
        match counts {
            Ok(c) => {
                self.feed.apply_counts(c.into());
                self.clans.reset_extra_unread();
            }
            Err(e) => tracing::warn!("Counts pull failed: {}", e),
        }

        self.throttle.finish(Instant::now());
        self.publish();
    }

    /// Counts-only authoritative refresh.
    async fn refresh_counts(&mut self) {
        match self.http.get_counts().await {
            Ok(c) => {
                self.feed.apply_counts(c.into());
                self.clans.reset_extra_unread();
                self.publish();
            }
            Err(e) => tracing::warn!("Counts refresh failed: {}", e),
        }
    }

    /// Align channel subscriptions with the membership set.
    fn reconcile_channels(&mut self, clans: &[ClanId]) {
        let desired = desired_channels(clans, DEFAULT_EVENT_KINDS);
        let plan = ChannelPlan::diff(&self.held_channels, &desired);
        if plan.is_empty() {
            return;
        }
        tracing::info!(
            subscribe = plan.subscribe.len(),
            unsubscribe = plan.unsubscribe.len(),
            "Reconciling clan channel subscriptions"
        );
        if !plan.subscribe.is_empty() {
            if let Err(e) = self.ws.subscribe(plan.subscribe) {
                tracing::debug!("Channel subscribe not sent: {}", e);
            }
        }
        if !plan.unsubscribe.is_empty() {
            if let Err(e) = self.ws.unsubscribe(plan.unsubscribe) {
                tracing::debug!("Channel unsubscribe not sent: {}", e);
            }
        }
        self.held_channels = desired;
    }

    async fn teardown(&mut self) {
        if !self.held_channels.is_empty() {
            let channels: Vec<_> = self.held_channels.drain().collect();
            if let Err(e) = self.ws.unsubscribe(channels) {
                tracing::debug!("Teardown unsubscribe not sent: {}", e);
            }
        }
        self.ws.disconnect().await;
        tracing::debug!("Notification session stopped");
    }

    fn publish(&mut self) {
        let status = self.ws.status();
        self.last_status = status;
        let snapshot = FeedSnapshot {
            notifications: self.feed.snapshot(),
            counts: self.feed.counts(),
            clan_events: self.clans.snapshot(),
            clan_unread: self.clans.extra_unread(),
            status,
        };
        self.snapshot_tx.send_replace(snapshot);
    }
}

/// Convert a list response, dropping items without ids and placeholder
/// payloads — the same filters the push path applies.
fn accepted_items(resp: NotificationsResponse) -> Vec<Notification> {
    resp.notifications
        .into_iter()
        .filter_map(|w| Notification::try_from(w).ok())
        .filter(|n| !n.id.is_placeholder())
        .collect()
}

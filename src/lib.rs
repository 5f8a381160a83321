//! Realtime notification SDK for the gigharbor platform.
//!
//! The crate is layered; each layer is usable on its own:
//!
//! - **Core types** ([`shared`], [`domain`]) — ids, notifications, counts,
//!   clan events, and the reconciliation state containers.
//! - **HTTP** ([`http`]) — low-level REST client with per-endpoint retry
//!   policies.
//! - **WebSocket** ([`ws`]) — push transport running in a background task,
//!   with reconnection and channel resubscription.
//! - **Session** ([`session`]) — the realtime loop that merges push frames
//!   and poll results into one feed, with polling as the fallback when push
//!   is down.
//! - **Client** ([`client`]) — the high-level builder entry point.
//!
//! # Quick start
//!
//! ```no_run
//! use notify_sdk::prelude::*;
//!
//! # async fn run() -> Result<(), SdkError> {
//! let client = NotifyClient::builder()
//!     .user_id("user-123")
//!     .auth_token("token")
//!     .build()?;
//!
//! // One-shot REST calls:
//! let counts = client.notifications().counts().await?;
//! println!("{} unread", counts.unread);
//!
//! // Or a live session:
//! let session = client.session();
//! let mut feed = session.watch();
//! while feed.changed().await.is_ok() {
//!     let snapshot = feed.borrow().clone();
//!     println!("{} unread", snapshot.unread_total());
//! }
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod domain;
pub mod error;
pub mod http;
pub mod network;
pub mod poller;
pub mod session;
pub mod shared;
pub mod ws;

pub mod prelude {
    pub use crate::client::{NotifyClient, NotifyClientBuilder};
    pub use crate::domain::clan::{ChannelPlan, ClanFeed, ClanNotification, DEFAULT_EVENT_KINDS};
    pub use crate::domain::notification::{
        IngestOutcome, Notification, NotificationCounts, NotificationFeed,
        NotificationPreferences, Priority,
    };
    pub use crate::error::{HttpError, SdkError, WsError};
    pub use crate::http::client::ListQuery;
    pub use crate::http::{RetryConfig, RetryPolicy};
    pub use crate::network::{DEFAULT_API_URL, DEFAULT_GATEWAY_URL};
    pub use crate::session::{FeedSnapshot, NotificationSession, SessionConfig};
    pub use crate::shared::{ChannelName, ClanId, GigId, NotificationId, UserId};
    pub use crate::ws::{ConnectionStatus, Kind, WsClient, WsConfig, WsEvent};
}

pub use client::{NotifyClient, NotifyClientBuilder};
pub use error::SdkError;

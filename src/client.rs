//! High-level client — `NotifyClient` with nested sub-client accessors.
//!
//! Holds the shared HTTP client, the transport/session configuration, and
//! the preferences cache. The cache is an ordinary field of this explicitly
//! constructed client — callers receive a reference through the builder, no
//! module-level state anywhere.

use crate::domain::clan::client::Clans;
use crate::domain::notification::client::Notifications;
use crate::domain::notification::NotificationPreferences;
use crate::error::SdkError;
use crate::http::NotifyHttp;
use crate::session::{NotificationSession, SessionConfig};
use crate::shared::UserId;
use crate::ws::WsConfig;

use async_lock::RwLock;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// The primary entry point for the notification SDK.
pub struct NotifyClient {
    pub(crate) http: NotifyHttp,
    pub(crate) ws_config: WsConfig,
    pub(crate) session_config: SessionConfig,
    /// Preferences cache: (value, fetched_at). Preferences change rarely.
    pub(crate) preferences_cache: Arc<RwLock<Option<(NotificationPreferences, Instant)>>>,
    pub(crate) preferences_cache_ttl: Duration,
}

impl NotifyClient {
    pub fn builder() -> NotifyClientBuilder {
        NotifyClientBuilder::default()
    }

    // ── Sub-client accessors ─────────────────────────────────────────────

    pub fn notifications(&self) -> Notifications<'_> {
        Notifications { client: self }
    }

    pub fn clans(&self) -> Clans<'_> {
        Clans { client: self }
    }

    /// Spawn a realtime session: push transport + fallback poller feeding
    /// one reconciliation state. Session lifetime is the caller's — tie it
    /// to whatever owns the notification surface.
    pub fn session(&self) -> NotificationSession {
        NotificationSession::spawn(
            self.http.clone(),
            self.ws_config.clone(),
            self.session_config.clone(),
        )
    }

    /// The transport config a session will use.
    pub fn ws_config(&self) -> &WsConfig {
        &self.ws_config
    }

    /// The session tuning a session will use.
    pub fn session_config(&self) -> &SessionConfig {
        &self.session_config
    }

    /// Replace the bearer token used on REST requests.
    pub async fn set_auth_token(&self, token: Option<String>) {
        self.http.set_auth_token(token).await;
    }

    pub async fn clear_caches(&self) {
        *self.preferences_cache.write().await = None;
    }
}

impl std::fmt::Debug for NotifyClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotifyClient")
            .field("ws_config", &self.ws_config)
            .field("session_config", &self.session_config)
            .field("preferences_cache_ttl", &self.preferences_cache_ttl)
            .finish_non_exhaustive()
    }
}

impl Clone for NotifyClient {
    fn clone(&self) -> Self {
        Self {
            http: self.http.clone(),
            ws_config: self.ws_config.clone(),
            session_config: self.session_config.clone(),
            preferences_cache: self.preferences_cache.clone(),
            preferences_cache_ttl: self.preferences_cache_ttl,
        }
    }
}

// ═════════════════════════════════════════════════════════════════════════════
// Builder
// ═════════════════════════════════════════════════════════════════════════════

pub struct NotifyClientBuilder {
    base_url: String,
    gateway_url: Option<String>,
    user_id: Option<UserId>,
    auth_token: Option<String>,
    session_config: SessionConfig,
    preferences_cache_ttl: Duration,
}

impl Default for NotifyClientBuilder {
    fn default() -> Self {
        Self {
            base_url: crate::network::DEFAULT_API_URL.to_string(),
            gateway_url: Some(crate::network::DEFAULT_GATEWAY_URL.to_string()),
            user_id: None,
            auth_token: None,
            session_config: SessionConfig::default(),
            preferences_cache_ttl: Duration::from_secs(300),
        }
    }
}

impl NotifyClientBuilder {
    pub fn base_url(mut self, url: &str) -> Self {
        self.base_url = url.to_string();
        self
    }

    /// Push gateway base URL. Passing `None` disables push entirely —
    /// sessions run on polling alone.
    pub fn gateway_url(mut self, url: Option<&str>) -> Self {
        self.gateway_url = url.map(str::to_string);
        self
    }

    /// The authenticated user the push stream is addressed to. Required.
    pub fn user_id(mut self, user_id: impl Into<UserId>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn auth_token(mut self, token: &str) -> Self {
        self.auth_token = Some(token.to_string());
        self
    }

    pub fn auto_refresh(mut self, enabled: bool) -> Self {
        self.session_config.auto_refresh = enabled;
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.session_config.poll_interval = interval;
        self
    }

    pub fn page_size(mut self, size: u32) -> Self {
        self.session_config.page_size = size;
        self
    }

    pub fn preferences_cache_ttl(mut self, ttl: Duration) -> Self {
        self.preferences_cache_ttl = ttl;
        self
    }

    pub fn build(self) -> Result<NotifyClient, SdkError> {
        let user_id = self
            .user_id
            .ok_or_else(|| SdkError::Validation("user_id is required".to_string()))?;

        let mut ws_config = WsConfig::fallback_only(user_id);
        ws_config.gateway_url = self.gateway_url;

        Ok(NotifyClient {
            http: NotifyHttp::with_auth(&self.base_url, self.auth_token),
            ws_config,
            session_config: self.session_config,
            preferences_cache: Arc::new(RwLock::new(None)),
            preferences_cache_ttl: self.preferences_cache_ttl,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_requires_user_id() {
        let err = NotifyClient::builder().build().unwrap_err();
        assert!(matches!(err, SdkError::Validation(_)));
    }

    #[test]
    fn test_build_with_defaults() {
        let client = NotifyClient::builder().user_id("u1").build().unwrap();
        assert!(client.ws_config().gateway_url.is_some());
        assert!(client.session_config.auto_refresh);
        assert_eq!(client.session_config.page_size, 20);
    }

    #[test]
    fn test_gateway_can_be_disabled() {
        let client = NotifyClient::builder()
            .user_id("u1")
            .gateway_url(None)
            .build()
            .unwrap();
        assert!(client.ws_config().target_url().is_none());
    }
}

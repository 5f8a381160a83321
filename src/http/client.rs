//! Low-level HTTP client — `NotifyHttp`.
//!
//! One method per API endpoint. Returns wire types (conversion to domain
//! types happens at the session/client boundary). Internal to the SDK — the
//! high-level client and session wrap this.

use crate::domain::clan::wire::{ChannelsRequest, ChannelsResponse};
use crate::domain::notification::wire::{
    AnalyticsResponse, CountsResponse, NotificationsResponse, PreferencesResponse,
};
use crate::domain::notification::NotificationPreferences;
use crate::error::HttpError;
use crate::http::retry::{RetryConfig, RetryPolicy};
use crate::shared::{ChannelName, NotificationId};

use async_lock::RwLock;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

/// Filters for the notification list endpoint.
#[derive(Debug, Clone, Default)]
pub struct ListQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub kind: Option<String>,
    pub category: Option<String>,
    pub unread_only: bool,
}

/// Low-level HTTP client for the notification REST API.
pub struct NotifyHttp {
    base_url: String,
    client: Client,
    /// Bearer token for authenticated requests. NEVER exposed publicly.
    auth_token: Arc<RwLock<Option<String>>>,
}

impl NotifyHttp {
    pub fn new(base_url: &str) -> Self {
        Self::with_auth(base_url, None)
    }

    pub fn with_auth(base_url: &str, token: Option<String>) -> Self {
        let builder = Client::builder()
            .timeout(Duration::from_secs(30))
            .pool_max_idle_per_host(10);

        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: builder.build().expect("Failed to build HTTP client"),
            auth_token: Arc::new(RwLock::new(token)),
        }
    }

    /// Set the bearer token used on every request.
    pub(crate) async fn set_auth_token(&self, token: Option<String>) {
        *self.auth_token.write().await = token;
    }

    // ── Notifications ────────────────────────────────────────────────────

    pub async fn get_notifications(
        &self,
        query: &ListQuery,
    ) -> Result<NotificationsResponse, HttpError> {
        let mut url = format!("{}/api/notifications", self.base_url);
        let mut params = Vec::new();
        if let Some(p) = query.page {
            params.push(format!("page={}", p));
        }
        if let Some(l) = query.limit {
            params.push(format!("limit={}", l));
        }
        if let Some(k) = &query.kind {
            params.push(format!("type={}", urlencoding::encode(k)));
        }
        if let Some(c) = &query.category {
            params.push(format!("category={}", urlencoding::encode(c)));
        }
        if query.unread_only {
            params.push("unreadOnly=true".to_string());
        }
        if !params.is_empty() {
            url = format!("{}?{}", url, params.join("&"));
        }
        self.get(&url, RetryPolicy::Idempotent).await
    }

    pub async fn get_unread_notifications(&self) -> Result<NotificationsResponse, HttpError> {
        let url = format!("{}/api/notifications/unread", self.base_url);
        self.get(&url, RetryPolicy::Idempotent).await
    }

    pub async fn get_counts(&self) -> Result<CountsResponse, HttpError> {
        let url = format!("{}/api/notifications/counts", self.base_url);
        self.get(&url, RetryPolicy::Idempotent).await
    }

    pub async fn mark_read(&self, id: &NotificationId) -> Result<serde_json::Value, HttpError> {
        let url = format!(
            "{}/api/notifications/{}/read",
            self.base_url,
            urlencoding::encode(id.as_str())
        );
        self.post(&url, &serde_json::json!({}), RetryPolicy::None)
            .await
    }

    pub async fn mark_all_read(&self) -> Result<serde_json::Value, HttpError> {
        let url = format!("{}/api/notifications/read-all", self.base_url);
        self.post(&url, &serde_json::json!({}), RetryPolicy::None)
            .await
    }

    pub async fn delete_notification(
        &self,
        id: &NotificationId,
    ) -> Result<serde_json::Value, HttpError> {
        let url = format!(
            "{}/api/notifications/{}",
            self.base_url,
            urlencoding::encode(id.as_str())
        );
        self.delete(&url).await
    }

    pub async fn clear_notifications(&self) -> Result<serde_json::Value, HttpError> {
        let url = format!("{}/api/notifications", self.base_url);
        self.delete(&url).await
    }

    // ── Preferences + analytics ──────────────────────────────────────────

    pub async fn get_preferences(&self) -> Result<PreferencesResponse, HttpError> {
        let url = format!("{}/api/notifications/preferences", self.base_url);
        self.get(&url, RetryPolicy::Idempotent).await
    }

    pub async fn update_preferences(
        &self,
        preferences: &NotificationPreferences,
    ) -> Result<PreferencesResponse, HttpError> {
        let url = format!("{}/api/notifications/preferences", self.base_url);
        self.put(&url, preferences).await
    }

    pub async fn get_analytics(&self) -> Result<AnalyticsResponse, HttpError> {
        let url = format!("{}/api/notifications/analytics", self.base_url);
        self.get(&url, RetryPolicy::Idempotent).await
    }

    // ── Clan channels ────────────────────────────────────────────────────

    pub async fn subscribe_channels(
        &self,
        channels: &[ChannelName],
    ) -> Result<serde_json::Value, HttpError> {
        let url = format!("{}/api/clans/channels/subscribe", self.base_url);
        let body = ChannelsRequest {
            channels: channels.to_vec(),
        };
        self.post(&url, &body, RetryPolicy::None).await
    }

    pub async fn unsubscribe_channels(
        &self,
        channels: &[ChannelName],
    ) -> Result<serde_json::Value, HttpError> {
        let url = format!("{}/api/clans/channels/unsubscribe", self.base_url);
        let body = ChannelsRequest {
            channels: channels.to_vec(),
        };
        self.post(&url, &body, RetryPolicy::None).await
    }

    pub async fn get_channels(&self) -> Result<ChannelsResponse, HttpError> {
        let url = format!("{}/api/clans/channels", self.base_url);
        self.get(&url, RetryPolicy::Idempotent).await
    }

    // ── Internal HTTP methods ────────────────────────────────────────────

    async fn get<T: DeserializeOwned>(
        &self,
        url: &str,
        retry: RetryPolicy,
    ) -> Result<T, HttpError> {
        self.request_with_retry(reqwest::Method::GET, url, None::<&()>, retry)
            .await
    }

    async fn post<T: DeserializeOwned, B: Serialize>(
        &self,
        url: &str,
        body: &B,
        retry: RetryPolicy,
    ) -> Result<T, HttpError> {
        self.request_with_retry(reqwest::Method::POST, url, Some(body), retry)
            .await
    }

    async fn put<T: DeserializeOwned, B: Serialize>(
        &self,
        url: &str,
        body: &B,
    ) -> Result<T, HttpError> {
        self.request_with_retry(reqwest::Method::PUT, url, Some(body), RetryPolicy::None)
            .await
    }

    async fn delete<T: DeserializeOwned>(&self, url: &str) -> Result<T, HttpError> {
        self.request_with_retry(reqwest::Method::DELETE, url, None::<&()>, RetryPolicy::None)
            .await
    }

    async fn request_with_retry<T: DeserializeOwned, B: Serialize>(
        &self,
        method: reqwest::Method,
        url: &str,
        body: Option<&B>,
        retry: RetryPolicy,
    ) -> Result<T, HttpError> {
        let config = match &retry {
            RetryPolicy::None => {
                return self.do_request(&method, url, body).await;
            }
            RetryPolicy::Idempotent => RetryConfig::idempotent(),
            RetryPolicy::Custom(c) => c.clone(),
        };

        let mut last_error = None;

        for attempt in 0..=config.max_retries {
            match self.do_request::<T, B>(&method, url, body).await {
                Ok(resp) => return Ok(resp),
                Err(e) => {
                    let should_retry = is_retryable(&e, &config);
                    if let HttpError::RateLimited {
                        retry_after_ms: Some(ms),
                    } = &e
                    {
                        futures_timer::Delay::new(Duration::from_millis(*ms)).await;
                    }

                    if should_retry && attempt < config.max_retries {
                        let delay = config.delay_for_attempt(attempt);
                        tracing::debug!(
                            attempt = attempt + 1,
                            max = config.max_retries,
                            delay_ms = delay.as_millis() as u64,
                            "Retrying request to {}",
                            url
                        );
                        futures_timer::Delay::new(delay).await;
                        last_error = Some(e);
                    } else {
                        return Err(e);
                    }
                }
            }
        }

        Err(HttpError::MaxRetriesExceeded {
            attempts: config.max_retries + 1,
            last_error: last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "unknown".to_string()),
        })
    }

    async fn do_request<T: DeserializeOwned, B: Serialize>(
        &self,
        method: &reqwest::Method,
        url: &str,
        body: Option<&B>,
    ) -> Result<T, HttpError> {
        let mut req = self.client.request(method.clone(), url);

        if let Some(token) = self.auth_token.read().await.as_ref() {
            req = req.header("Authorization", format!("Bearer {}", token));
        }

        if let Some(b) = body {
            req = req.json(b);
        }

        let resp = req.send().await.map_err(|e| {
            if e.is_timeout() {
                HttpError::Timeout
            } else {
                HttpError::Reqwest(e)
            }
        })?;
        let status = resp.status();

        if status.is_success() {
            let parsed = resp.json::<T>().await?;
            return Ok(parsed);
        }

        let status_code = status.as_u16();
        let body_text = resp.text().await.unwrap_or_default();

        match status_code {
            401 => Err(HttpError::Unauthorized),
            404 => Err(HttpError::NotFound(body_text)),
            429 => Err(HttpError::RateLimited {
                retry_after_ms: None,
            }),
            400..=499 => Err(HttpError::BadRequest(body_text)),
            _ => Err(HttpError::ServerError {
                status: status_code,
                body: body_text,
            }),
        }
    }
}

impl Clone for NotifyHttp {
    fn clone(&self) -> Self {
        Self {
            base_url: self.base_url.clone(),
            client: self.client.clone(),
            auth_token: self.auth_token.clone(),
        }
    }
}

/// Whether a failed request is worth re-issuing under the given config.
/// Client-side faults (auth, bad request, not found) never are.
fn is_retryable(error: &HttpError, config: &RetryConfig) -> bool {
    match error {
        HttpError::ServerError { status, .. } => config.retryable_statuses.contains(status),
        HttpError::RateLimited { .. } => true,
        HttpError::Timeout => true,
        HttpError::Reqwest(e) => e.is_connect() || e.is_timeout() || e.is_request(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_is_retryable() {
        assert!(is_retryable(&HttpError::Timeout, &RetryConfig::idempotent()));
    }

    #[test]
    fn test_rate_limit_is_retryable() {
        let config = RetryConfig::idempotent();
        assert!(is_retryable(
            &HttpError::RateLimited {
                retry_after_ms: None
            },
            &config
        ));
    }

    #[test]
    fn test_server_error_retryable_by_status_list() {
        let config = RetryConfig::idempotent();
        assert!(is_retryable(
            &HttpError::ServerError {
                status: 503,
                body: String::new()
            },
            &config
        ));
        assert!(!is_retryable(
            &HttpError::ServerError {
                status: 500,
                body: String::new()
            },
            &config
        ));
    }

    #[test]
    fn test_client_faults_never_retried() {
        let config = RetryConfig::idempotent();
        assert!(!is_retryable(&HttpError::Unauthorized, &config));
        assert!(!is_retryable(&HttpError::NotFound(String::new()), &config));
        assert!(!is_retryable(&HttpError::BadRequest(String::new()), &config));
    }
}

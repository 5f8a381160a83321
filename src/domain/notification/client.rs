//! Notifications sub-client — list, counts, mutations, preferences.

use crate::client::NotifyClient;
use crate::domain::notification::wire::AnalyticsResponse;
use crate::domain::notification::{
    Notification, NotificationCounts, NotificationPreferences,
};
use crate::error::SdkError;
use crate::http::client::ListQuery;
use crate::shared::NotificationId;
use std::time::Instant;

/// Sub-client for notification operations.
pub struct Notifications<'a> {
    pub(crate) client: &'a NotifyClient,
}

impl<'a> Notifications<'a> {
    /// Fetch a page of notifications. Items without an id and placeholder
    /// payloads are dropped.
    pub async fn list(&self, query: &ListQuery) -> Result<Vec<Notification>, SdkError> {
        let resp = self.client.http.get_notifications(query).await?;
        Ok(resp
            .notifications
            .into_iter()
            .filter_map(|w| Notification::try_from(w).ok())
            .filter(|n| !n.id.is_placeholder())
            .collect())
    }

    /// Fetch unread notifications only.
    pub async fn unread(&self) -> Result<Vec<Notification>, SdkError> {
        let resp = self.client.http.get_unread_notifications().await?;
        Ok(resp
            .notifications
            .into_iter()
            .filter_map(|w| Notification::try_from(w).ok())
            .filter(|n| !n.id.is_placeholder())
            .collect())
    }

    /// Fetch the authoritative counters.
    pub async fn counts(&self) -> Result<NotificationCounts, SdkError> {
        Ok(self.client.http.get_counts().await?.into())
    }

    pub async fn mark_read(&self, id: &NotificationId) -> Result<(), SdkError> {
        self.client.http.mark_read(id).await?;
        Ok(())
    }

    pub async fn mark_all_read(&self) -> Result<(), SdkError> {
        self.client.http.mark_all_read().await?;
        Ok(())
    }

    pub async fn delete(&self, id: &NotificationId) -> Result<(), SdkError> {
        self.client.http.delete_notification(id).await?;
        Ok(())
    }

    pub async fn clear_all(&self) -> Result<(), SdkError> {
        self.client.http.clear_notifications().await?;
        Ok(())
    }

    /// Get delivery preferences. Uses the client's TTL cache.
    pub async fn preferences(&self) -> Result<NotificationPreferences, SdkError> {
        {
            let cache = self.client.preferences_cache.read().await;
            if let Some((prefs, fetched_at)) = cache.as_ref() {
                if fetched_at.elapsed() < self.client.preferences_cache_ttl {
                    return Ok(prefs.clone());
                }
            }
        }

        let resp = self.client.http.get_preferences().await?;
        let prefs = resp.preferences;
        *self.client.preferences_cache.write().await = Some((prefs.clone(), Instant::now()));
        Ok(prefs)
    }

    /// Update delivery preferences; the cache takes the server's echo.
    pub async fn update_preferences(
        &self,
        preferences: &NotificationPreferences,
    ) -> Result<NotificationPreferences, SdkError> {
        let resp = self.client.http.update_preferences(preferences).await?;
        let prefs = resp.preferences;
        *self.client.preferences_cache.write().await = Some((prefs.clone(), Instant::now()));
        Ok(prefs)
    }

    /// Fetch read-rate analytics.
    pub async fn analytics(&self) -> Result<AnalyticsResponse, SdkError> {
        Ok(self.client.http.get_analytics().await?)
    }
}

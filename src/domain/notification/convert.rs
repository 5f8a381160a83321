//! Wire → domain conversions.

use super::wire::WireNotification;
use super::Notification;
use chrono::Utc;
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ValidationError {
    #[error("notification has no id")]
    MissingId,
}

impl TryFrom<WireNotification> for Notification {
    type Error = ValidationError;

    fn try_from(w: WireNotification) -> Result<Self, Self::Error> {
        let id = w.id.ok_or(ValidationError::MissingId)?;
        Ok(Notification {
            id,
            title: w.title,
            message: w.message,
            read: w.read,
            created_at: w.created_at.unwrap_or_else(Utc::now),
            kind: w.kind,
            category: w.category,
            priority: w.priority,
            action_url: w.action_url,
            icon: w.icon,
        })
    }
}

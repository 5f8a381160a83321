//! Clans sub-client — the REST mirror of the WS channel control frames.

use crate::client::NotifyClient;
use crate::error::SdkError;
use crate::shared::ChannelName;

/// Sub-client for clan channel operations.
pub struct Clans<'a> {
    pub(crate) client: &'a NotifyClient,
}

impl<'a> Clans<'a> {
    /// The channels the server currently holds for this user.
    pub async fn channels(&self) -> Result<Vec<ChannelName>, SdkError> {
        Ok(self.client.http.get_channels().await?.channels)
    }

    pub async fn subscribe(&self, channels: &[ChannelName]) -> Result<(), SdkError> {
        self.client.http.subscribe_channels(channels).await?;
        Ok(())
    }

    pub async fn unsubscribe(&self, channels: &[ChannelName]) -> Result<(), SdkError> {
        self.client.http.unsubscribe_channels(channels).await?;
        Ok(())
    }
}

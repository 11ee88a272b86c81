//! Per-channel memo of the webhook used to re-publish translations.
//!
//! Lookup-or-create runs under a per-channel async lock so two messages
//! arriving together in one channel never create two webhooks. Channels do
//! not block each other.

use crate::error::PlatformError;
use crate::platform::{Platform, RelayEndpoint};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

/// Reserved webhook name the relay owns in every channel.
pub const ENDPOINT_NAME: &str = "DumTranslator";

type Slot = Arc<tokio::sync::Mutex<Option<RelayEndpoint>>>;

pub struct EndpointCache {
    platform: Arc<dyn Platform>,
    slots: Mutex<HashMap<String, Slot>>,
}

impl EndpointCache {
    pub fn new(platform: Arc<dyn Platform>) -> Self {
        Self {
            platform,
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Return the channel's relay webhook, discovering or creating it on
    /// first use.
    pub async fn get_or_create(&self, channel_id: &str) -> Result<RelayEndpoint, PlatformError> {
        let slot = self.slot(channel_id);
        let mut entry = slot.lock().await;

        if let Some(endpoint) = entry.as_ref() {
            return Ok(endpoint.clone());
        }

        let endpoint = self.resolve(channel_id).await?;
        *entry = Some(endpoint.clone());
        Ok(endpoint)
    }

    /// Forget the memoized webhook so the next message re-discovers it.
    pub async fn invalidate(&self, channel_id: &str) {
        let slot = self.slot(channel_id);
        if slot.lock().await.take().is_some() {
            info!("Dropped cached webhook for channel {}", channel_id);
        }
    }

    /// Drop the channel's slot entirely, used once the channel stops being
    /// relayed. A lookup already running keeps its own handle to the slot.
    pub fn evict(&self, channel_id: &str) {
        let mut slots = self
            .slots
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if slots.remove(channel_id).is_some() {
            debug!("Evicted webhook slot for channel {}", channel_id);
        }
    }

    fn slot(&self, channel_id: &str) -> Slot {
        let mut slots = self
            .slots
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Arc::clone(slots.entry(channel_id.to_string()).or_default())
    }

    async fn resolve(&self, channel_id: &str) -> Result<RelayEndpoint, PlatformError> {
        let existing = self
            .platform
            .list_endpoints(channel_id)
            .await?
            .into_iter()
            .find(|w| w.name.as_deref() == Some(ENDPOINT_NAME) && w.token.is_some());

        if let Some(endpoint) = existing {
            debug!("Reusing webhook {} in channel {}", endpoint.id, channel_id);
            return Ok(endpoint);
        }

        let created = self
            .platform
            .create_endpoint(channel_id, ENDPOINT_NAME)
            .await?;
        if created.token.is_none() {
            return Err(PlatformError::Decode(format!(
                "created webhook {} has no token",
                created.id
            )));
        }

        info!("Created webhook {} in channel {}", created.id, channel_id);
        Ok(created)
    }
}

//! Delivering one digest per cycle to every resolved recipient

use std::sync::Arc;

use crate::channel::Channel;
use crate::config::{ChannelKind, DeviceConfig};
use crate::diff::ChangeSet;
use crate::render::Digest;
use crate::router::Recipient;

/// Outcome of delivering to a single recipient
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryRecord {
    pub kind: ChannelKind,
    pub address: String,
    pub success: bool,
    pub error: Option<String>,
}

/// Per-cycle dispatch result
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchSummary {
    pub deliveries: Vec<DeliveryRecord>,
}

impl DispatchSummary {
    pub fn sent(&self) -> u64 {
        self.deliveries.iter().filter(|d| d.success).count() as u64
    }

    pub fn failed(&self) -> u64 {
        self.deliveries.iter().filter(|d| !d.success).count() as u64
    }
}

/// Holds one client per configured channel kind
#[derive(Debug, Default)]
pub struct NotificationDispatcher {
    channels: Vec<Arc<dyn Channel>>,
}

impl NotificationDispatcher {
    pub fn new(channels: Vec<Arc<dyn Channel>>) -> Self {
        Self { channels }
    }

    pub fn channel(&self, kind: ChannelKind) -> Option<&Arc<dyn Channel>> {
        self.channels.iter().find(|c| c.kind() == kind)
    }

    /// Render the digest once and send it to each recipient in order.
    ///
    /// A failure for one recipient is logged and recorded; it never stops
    /// delivery to the rest. Nothing is retried.
    pub async fn dispatch(
        &self,
        device: &DeviceConfig,
        changes: &ChangeSet,
        recipients: &[Recipient],
    ) -> DispatchSummary {
        let mut summary = DispatchSummary::default();
        if recipients.is_empty() {
            return summary;
        }

        let digest = Digest::render(device, changes);

        for recipient in recipients {
            let result = match self.channel(recipient.kind) {
                Some(channel) => channel.send(&recipient.address, &digest).await,
                None => Err(crate::DevmonError::channel(
                    recipient.kind.to_string(),
                    "channel is not configured",
                )),
            };

            match &result {
                Ok(()) => tracing::info!(
                    "Notified {} '{}' about '{}' ({})",
                    recipient.kind,
                    recipient.address,
                    device.name,
                    recipient.triggered_by.join(", ")
                ),
                Err(e) => tracing::warn!(
                    "Notification via {} to '{}' for '{}' failed: {}",
                    recipient.kind,
                    recipient.address,
                    device.name,
                    e
                ),
            }

            summary.deliveries.push(DeliveryRecord {
                kind: recipient.kind,
                address: recipient.address.clone(),
                success: result.is_ok(),
                error: result.err().map(|e| e.to_string()),
            });
        }

        summary
    }
}

//! Twilio SMS channel

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use crate::channel::Channel;
use crate::config::{ChannelKind, TwilioConfig};
use crate::io::{HttpAuth, HttpClient};
use crate::render::Digest;

const TWILIO_API_BASE: &str = "https://api.twilio.com/2010-04-01";

/// Subset of the Twilio message resource we inspect
#[derive(Debug, Deserialize)]
struct MessageResource {
    status: String,
    #[serde(default)]
    sid: Option<String>,
}

/// Sends the SMS digest through the Twilio Messages API
pub struct TwilioChannel {
    messages_url: String,
    from_number: String,
    auth: HttpAuth,
    http: Arc<dyn HttpClient>,
}

impl std::fmt::Debug for TwilioChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TwilioChannel")
            .field("from_number", &self.from_number)
            .finish()
    }
}

impl TwilioChannel {
    pub fn new(config: &TwilioConfig, http: Arc<dyn HttpClient>) -> Self {
        tracing::debug!("Created TwilioChannel from '{}'", config.from_number);

        Self {
            messages_url: format!(
                "{}/Accounts/{}/Messages.json",
                TWILIO_API_BASE, config.account_sid
            ),
            from_number: config.from_number.clone(),
            auth: HttpAuth::Basic {
                username: config.account_sid.clone(),
                password: config.auth_token.clone(),
            },
            http,
        }
    }
}

#[async_trait]
impl Channel for TwilioChannel {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Twilio
    }

    async fn send(&self, to: &str, digest: &Digest) -> crate::Result<()> {
        tracing::debug!("Sending Twilio SMS to '{}' for '{}'", to, digest.device_name);

        let params = [
            ("To", to),
            ("From", self.from_number.as_str()),
            ("Body", digest.sms.as_str()),
        ];
        let response = self
            .http
            .post_form(&self.messages_url, &self.auth, &params)
            .await
            .map_err(|e| crate::DevmonError::channel("twilio", e.to_string()))?;

        if !response.is_success() {
            return Err(crate::DevmonError::channel(
                "twilio",
                format!(
                    "API returned status {}: {}",
                    response.status, response.body
                ),
            ));
        }

        let message: MessageResource = serde_json::from_str(&response.body).map_err(|e| {
            crate::DevmonError::channel("twilio", format!("Unreadable message resource: {}", e))
        })?;
        if message.status != "queued" {
            return Err(crate::DevmonError::channel(
                "twilio",
                format!("Message not queued, status is '{}'", message.status),
            ));
        }

        tracing::debug!(
            "Twilio queued SMS to '{}' (sid {})",
            to,
            message.sid.as_deref().unwrap_or("unknown")
        );
        Ok(())
    }
}

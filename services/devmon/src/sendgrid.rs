//! SendGrid transactional email channel

use std::sync::Arc;

use async_trait::async_trait;

use crate::channel::Channel;
use crate::config::{ChannelKind, SendGridConfig};
use crate::io::{HttpAuth, HttpClient};
use crate::render::Digest;

const SENDGRID_API_URL: &str = "https://api.sendgrid.com/v3/mail/send";

/// Sends the text and HTML digest through the SendGrid v3 mail API
pub struct SendGridChannel {
    from_address: String,
    auth: HttpAuth,
    http: Arc<dyn HttpClient>,
}

impl std::fmt::Debug for SendGridChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SendGridChannel")
            .field("from_address", &self.from_address)
            .finish()
    }
}

impl SendGridChannel {
    pub fn new(config: &SendGridConfig, http: Arc<dyn HttpClient>) -> Self {
        tracing::debug!("Created SendGridChannel from '{}'", config.from_address);

        Self {
            from_address: config.from_address.clone(),
            auth: HttpAuth::Bearer(config.api_key.clone()),
            http,
        }
    }

    fn payload(&self, to: &str, digest: &Digest) -> serde_json::Value {
        serde_json::json!({
            "personalizations": [{ "to": [{ "email": to }] }],
            "from": { "email": self.from_address },
            "subject": digest.subject,
            "content": [
                { "type": "text/plain", "value": digest.text },
                { "type": "text/html", "value": digest.html },
            ],
        })
    }
}

#[async_trait]
impl Channel for SendGridChannel {
    fn kind(&self) -> ChannelKind {
        ChannelKind::SendGrid
    }

    async fn send(&self, to: &str, digest: &Digest) -> crate::Result<()> {
        tracing::debug!("Sending SendGrid email to '{}': {}", to, digest.subject);

        let response = self
            .http
            .post_json(SENDGRID_API_URL, &self.auth, &self.payload(to, digest))
            .await
            .map_err(|e| crate::DevmonError::channel("sendgrid", e.to_string()))?;

        // The mail API acknowledges queued messages with 202 Accepted
        if response.status != 202 {
            return Err(crate::DevmonError::channel(
                "sendgrid",
                format!(
                    "API returned status {}: {}",
                    response.status, response.body
                ),
            ));
        }

        tracing::debug!("SendGrid accepted email to '{}'", to);
        Ok(())
    }
}

//! Direct SMTP email channel

use async_trait::async_trait;
use lettre::message::{Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use crate::channel::Channel;
use crate::config::{ChannelKind, SmtpConfig};
use crate::render::Digest;
use crate::DevmonError;

/// Sends the text and HTML digest as a multipart/alternative message over SMTP
pub struct SmtpChannel {
    host: String,
    port: u16,
    from: Mailbox,
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl std::fmt::Debug for SmtpChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpChannel")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("from", &self.from.to_string())
            .finish()
    }
}

impl SmtpChannel {
    pub fn new(config: &SmtpConfig) -> crate::Result<Self> {
        let from: Mailbox = config.from_address.parse().map_err(|e| {
            DevmonError::Config(format!(
                "Invalid SMTP from address '{}': {}",
                config.from_address, e
            ))
        })?;

        let builder = if config.use_tls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host).map_err(|e| {
                DevmonError::Config(format!("Invalid SMTP relay '{}': {}", config.host, e))
            })?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(config.host.as_str())
        };
        let mut builder = builder
            .port(config.port)
            .timeout(Some(config.timeout));
        if config.use_auth {
            builder = builder.credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ));
        }

        tracing::debug!(
            "Created SmtpChannel for {}:{} (tls: {}, auth: {})",
            config.host,
            config.port,
            config.use_tls,
            config.use_auth
        );

        Ok(Self {
            host: config.host.clone(),
            port: config.port,
            from,
            transport: builder.build(),
        })
    }

    /// Assemble the message without sending it
    pub fn build_message(&self, to: &str, digest: &Digest) -> crate::Result<Message> {
        let to: Mailbox = to
            .parse()
            .map_err(|e| DevmonError::channel("smtp", format!("Invalid recipient '{}': {}", to, e)))?;

        Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(digest.subject.clone())
            .multipart(MultiPart::alternative_plain_html(
                digest.text.clone(),
                digest.html.clone(),
            ))
            .map_err(|e| DevmonError::channel("smtp", format!("Building message: {}", e)))
    }
}

#[async_trait]
impl Channel for SmtpChannel {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Smtp
    }

    async fn send(&self, to: &str, digest: &Digest) -> crate::Result<()> {
        tracing::debug!(
            "Sending SMTP email to '{}' via {}:{}: {}",
            to,
            self.host,
            self.port,
            digest.subject
        );

        let message = self.build_message(to, digest)?;
        let response = self
            .transport
            .send(message)
            .await
            .map_err(|e| DevmonError::channel("smtp", e.to_string()))?;

        tracing::debug!("SMTP server accepted email to '{}': {:?}", to, response.code());
        Ok(())
    }
}

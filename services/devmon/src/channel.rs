//! Outbound notification channel trait

use async_trait::async_trait;

use crate::config::ChannelKind;
use crate::render::Digest;

/// A client able to deliver a digest to one destination address
#[async_trait]
pub trait Channel: Send + Sync + std::fmt::Debug {
    /// Which configured channel kind this client serves
    fn kind(&self) -> ChannelKind;

    /// Deliver the digest to `to`, picking the views this channel supports
    async fn send(&self, to: &str, digest: &Digest) -> crate::Result<()>;
}

use async_trait::async_trait;

/// Inbound chat message after webhook parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelInboundMessage {
    pub channel: String,
    /// Platform user id; also the session key.
    pub sender: String,
    pub reply_target: String,
    pub text: String,
}

/// Text to deliver to a single recipient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelOutboundMessage {
    pub reply_target: String,
    pub text: String,
}

/// Outbound side of a messaging platform.
///
/// Inbound traffic arrives through the webhook gateway, so adapters only
/// deliver messages and report health.
#[async_trait]
pub trait ChannelAdapter: Send + Sync {
    /// Stable channel identifier (e.g. `messenger`).
    fn id(&self) -> &'static str;

    /// Deliver `message`. No retry.
    async fn send(&self, message: ChannelOutboundMessage) -> anyhow::Result<()>;

    /// Best-effort health probe.
    async fn health_check(&self) -> anyhow::Result<bool>;
}

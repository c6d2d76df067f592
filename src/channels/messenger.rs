use crate::channels::traits::{ChannelAdapter, ChannelInboundMessage, ChannelOutboundMessage};
use crate::config::MessengerConfig;
use async_trait::async_trait;
use tracing::debug;

/// Messenger's per-message text limit, in characters.
pub const MAX_MESSAGE_CHARS: usize = 2000;

/// Facebook Messenger page adapter.
///
/// Inbound messages arrive through the gateway's page webhook; this adapter
/// parses those payloads and sends replies through the Send API.
#[derive(Clone)]
pub struct MessengerAdapter {
    page_access_token: String,
    graph_base_url: String,
    client: reqwest::Client,
}

impl MessengerAdapter {
    pub fn new(config: &MessengerConfig) -> Self {
        Self {
            page_access_token: config.page_access_token.clone(),
            graph_base_url: config.graph_base_url.trim_end_matches('/').to_owned(),
            client: reqwest::Client::new(),
        }
    }

    /// Parse a page webhook payload into inbound messages.
    ///
    /// Echoes of the page's own messages and events without text are skipped.
    /// A postback's payload counts as text.
    #[must_use]
    pub fn parse_webhook_payload(&self, payload: &serde_json::Value) -> Vec<ChannelInboundMessage> {
        let mut inbound = Vec::new();
        let Some(entries) = payload.get("entry").and_then(serde_json::Value::as_array) else {
            return inbound;
        };

        for entry in entries {
            let Some(events) = entry.get("messaging").and_then(serde_json::Value::as_array) else {
                continue;
            };

            for event in events {
                let sender = event
                    .get("sender")
                    .and_then(|s| s.get("id"))
                    .and_then(serde_json::Value::as_str)
                    .unwrap_or_default();
                if sender.is_empty() {
                    continue;
                }

                let message = event.get("message");
                let is_echo = message
                    .and_then(|m| m.get("is_echo"))
                    .and_then(serde_json::Value::as_bool)
                    .unwrap_or(false);
                if is_echo {
                    continue;
                }

                let text = message
                    .and_then(|m| m.get("text"))
                    .or_else(|| event.get("postback").and_then(|p| p.get("payload")))
                    .and_then(serde_json::Value::as_str)
                    .unwrap_or_default()
                    .trim()
                    .to_owned();
                if text.is_empty() {
                    continue;
                }

                inbound.push(ChannelInboundMessage {
                    channel: self.id().to_owned(),
                    sender: sender.to_owned(),
                    reply_target: sender.to_owned(),
                    text,
                });
            }
        }

        inbound
    }
}

/// Split `text` into chunks of at most `max_chars` characters, breaking on
/// line boundaries. Lines longer than `max_chars` are split mid-line.
pub fn chunk_message(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    for line in text.split('\n') {
        let line_len = line.chars().count();
        if line_len > max_chars {
            if !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
                current_len = 0;
            }
            let chars: Vec<char> = line.chars().collect();
            chunks.extend(chars.chunks(max_chars).map(|c| c.iter().collect::<String>()));
            continue;
        }

        if !current.is_empty() && current_len + 1 + line_len > max_chars {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }
        if !current.is_empty() {
            current.push('\n');
            current_len += 1;
        }
        current.push_str(line);
        current_len += line_len;
    }

    if !current.trim().is_empty() {
        chunks.push(current);
    }
    chunks
}

#[async_trait]
impl ChannelAdapter for MessengerAdapter {
    fn id(&self) -> &'static str {
        "messenger"
    }

    async fn send(&self, message: ChannelOutboundMessage) -> anyhow::Result<()> {
        if self.page_access_token.trim().is_empty() {
            anyhow::bail!("messenger page access token is empty");
        }

        let url = format!("{}/me/messages", self.graph_base_url);
        for chunk in chunk_message(&message.text, MAX_MESSAGE_CHARS) {
            let body = serde_json::json!({
                "recipient": { "id": message.reply_target },
                "message": { "text": chunk }
            });
            let response = self
                .client
                .post(&url)
                .query(&[("access_token", self.page_access_token.as_str())])
                .json(&body)
                .send()
                .await?;

            if !response.status().is_success() {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                anyhow::bail!("messenger send failed ({status}): {body}");
            }
        }

        debug!(recipient = %message.reply_target, "messenger message delivered");
        Ok(())
    }

    async fn health_check(&self) -> anyhow::Result<bool> {
        if self.page_access_token.trim().is_empty() {
            return Ok(false);
        }
        let url = format!("{}/me", self.graph_base_url);
        let response = self
            .client
            .get(&url)
            .query(&[("access_token", self.page_access_token.as_str())])
            .send()
            .await?;
        Ok(response.status().is_success())
    }
}

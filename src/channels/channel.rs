//! Channel trait and message types.

use std::path::PathBuf;
use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;

use crate::error::ChannelError;

/// A message arriving from a channel.
#[derive(Debug, Clone)]
pub struct IncomingMessage {
    /// Which channel produced the message ("cli", "telegram", ...).
    pub channel: String,
    /// Stable identifier for the sender within the channel.
    pub user_id: String,
    /// The message text.
    pub content: String,
    /// Display name for the sender, if the channel knows one.
    pub user_name: Option<String>,
    /// Channel-specific routing data (e.g. Telegram chat_id).
    pub metadata: serde_json::Value,
}

impl IncomingMessage {
    pub fn new(channel: &str, user_id: &str, content: &str) -> Self {
        Self {
            channel: channel.to_string(),
            user_id: user_id.to_string(),
            content: content.to_string(),
            user_name: None,
            metadata: serde_json::Value::Null,
        }
    }

    pub fn with_user_name(mut self, name: &str) -> Self {
        self.user_name = Some(name.to_string());
        self
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }
}

/// A reply going back to the user: text, optionally with a file attached.
#[derive(Debug, Clone)]
pub struct OutgoingResponse {
    pub content: String,
    pub attachment: Option<PathBuf>,
}

impl OutgoingResponse {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            attachment: None,
        }
    }

    pub fn with_attachment(mut self, path: impl Into<PathBuf>) -> Self {
        self.attachment = Some(path.into());
        self
    }
}

/// Stream of inbound messages produced by a running channel.
pub type MessageStream = Pin<Box<dyn Stream<Item = IncomingMessage> + Send>>;

/// A bidirectional message transport.
#[async_trait]
pub trait Channel: Send + Sync {
    /// Short channel name used in logs and errors.
    fn name(&self) -> &str;

    /// Start listening and return the inbound message stream.
    async fn start(&self) -> Result<MessageStream, ChannelError>;

    /// Deliver one reply for an inbound message.
    async fn respond(
        &self,
        msg: &IncomingMessage,
        response: OutgoingResponse,
    ) -> Result<(), ChannelError>;

    /// Verify the channel can reach its backend.
    async fn health_check(&self) -> Result<(), ChannelError> {
        Ok(())
    }

    /// Release resources before exit.
    async fn shutdown(&self) -> Result<(), ChannelError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn incoming_message_builder() {
        let msg = IncomingMessage::new("telegram", "42", "hello")
            .with_user_name("Amine")
            .with_metadata(serde_json::json!({"chat_id": "99"}));
        assert_eq!(msg.channel, "telegram");
        assert_eq!(msg.user_id, "42");
        assert_eq!(msg.user_name.as_deref(), Some("Amine"));
        assert_eq!(
            msg.metadata.get("chat_id").and_then(|v| v.as_str()),
            Some("99")
        );
    }

    #[test]
    fn outgoing_response_defaults_to_no_attachment() {
        let reply = OutgoingResponse::text("ok");
        assert_eq!(reply.content, "ok");
        assert!(reply.attachment.is_none());
    }

    #[test]
    fn outgoing_response_with_attachment() {
        let reply = OutgoingResponse::text("list").with_attachment("/tmp/list.csv");
        assert_eq!(
            reply.attachment.as_deref(),
            Some(std::path::Path::new("/tmp/list.csv"))
        );
    }
}

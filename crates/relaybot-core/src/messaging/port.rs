use async_trait::async_trait;

use crate::{
    domain::{ChatId, MessageRef},
    Result,
};

/// Outbound chat transport used by the relay engine.
///
/// Failures surface as `Error::Delivery`; the engine treats them as isolated per
/// destination and never retries. Adapters may retry internally (e.g. on 429).
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Send plain text to `chat_id`, returning the reference assigned by the platform.
    ///
    /// The returned `chat_id` is the platform's canonical id for the chat, which may
    /// differ from the address sent to (a `@channel` handle resolves to a numeric id).
    /// Inbound messages are keyed the same way, so relay links must be too.
    async fn send_text(&self, chat_id: &ChatId, text: &str) -> Result<MessageRef>;

    /// Delete a previously sent message.
    async fn delete_message(&self, msg: &MessageRef) -> Result<()>;
}

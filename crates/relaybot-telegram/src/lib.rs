//! Telegram adapter (teloxide).
//!
//! This crate implements the `relaybot-core` ChatTransport over Telegram Bot API
//! and wires inbound updates into the relay service.

use async_trait::async_trait;

use teloxide::{prelude::*, types::Recipient};

use tokio::time::sleep;
use tracing::warn;

pub mod handlers;
pub mod router;

use relaybot_core::{
    domain::{ChatId, MessageId, MessageRef},
    errors::Error,
    messaging::port::ChatTransport,
    Result,
};

#[derive(Clone)]
pub struct TelegramTransport {
    bot: Bot,
}

impl TelegramTransport {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }

    /// Numeric ids address a chat directly; anything else is taken as a public `@channel`.
    fn recipient(chat_id: &ChatId) -> Recipient {
        match chat_id.as_str().parse::<i64>() {
            Ok(id) => Recipient::Id(teloxide::types::ChatId(id)),
            Err(_) => {
                let name = chat_id.as_str().trim();
                if name.starts_with('@') {
                    Recipient::ChannelUsername(name.to_string())
                } else {
                    Recipient::ChannelUsername(format!("@{name}"))
                }
            }
        }
    }

    /// Reference to a sent message, keyed by the chat id Telegram reports for it.
    fn sent_ref(chat: teloxide::types::ChatId, id: teloxide::types::MessageId) -> MessageRef {
        MessageRef::new(chat.0, id.0)
    }

    fn tg_msg_id(message_id: MessageId) -> teloxide::types::MessageId {
        teloxide::types::MessageId(message_id.0)
    }

    fn map_err(chat_id: &ChatId, e: teloxide::RequestError) -> Error {
        Error::delivery(chat_id, format!("telegram error: {e}"))
    }

    async fn with_retry<T, Fut>(&self, chat_id: &ChatId, mut op: impl FnMut() -> Fut) -> Result<T>
    where
        Fut: std::future::IntoFuture<Output = std::result::Result<T, teloxide::RequestError>>,
        Fut::IntoFuture: Send,
    {
        const MAX_RETRIES: usize = 1;
        let mut attempts = 0usize;
        loop {
            match op().await {
                Ok(v) => return Ok(v),
                Err(e) => match e {
                    teloxide::RequestError::RetryAfter(d) if attempts < MAX_RETRIES => {
                        attempts += 1;
                        warn!(chat = %chat_id, retry_after = ?d, "telegram flood limit hit, retrying");
                        sleep(d).await;
                        continue;
                    }
                    other => return Err(Self::map_err(chat_id, other)),
                },
            }
        }
    }
}

#[async_trait]
impl ChatTransport for TelegramTransport {
    async fn send_text(&self, chat_id: &ChatId, text: &str) -> Result<MessageRef> {
        // Relayed verbatim: no parse mode, so user text is never interpreted as markup.
        let msg = self
            .with_retry(chat_id, || {
                self.bot
                    .send_message(Self::recipient(chat_id), text.to_string())
            })
            .await?;

        Ok(Self::sent_ref(msg.chat.id, msg.id))
    }

    async fn delete_message(&self, msg: &MessageRef) -> Result<()> {
        self.with_retry(&msg.chat_id, || {
            self.bot.delete_message(
                Self::recipient(&msg.chat_id),
                Self::tg_msg_id(msg.message_id),
            )
        })
        .await?;
        Ok(())
    }
}

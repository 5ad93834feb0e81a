//! Telegram update handlers.
//!
//! Each handler is a thin adapter that:
//! - maps the teloxide message onto core types
//! - calls into the `relaybot-core` relay service
//! - sends the resulting reply, if any

use std::sync::Arc;

use teloxide::{
    prelude::*,
    types::{Message, ParseMode, UserId},
};
use tracing::{debug, warn};

use relaybot_core::domain::{MessageRef, Sender};

use crate::router::AppState;

mod commands;
mod text;

pub async fn handle_message(bot: Bot, msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    let Some(text) = msg.text() else {
        // Only text is relayed.
        debug!(chat = msg.chat.id.0, message = msg.id.0, "ignoring non-text message");
        return Ok(());
    };
    let Some(user) = msg.from() else {
        return Ok(());
    };
    let sender = sender_of(user.id, user.username.as_deref());

    if text.starts_with('/') {
        return commands::handle_command(bot, &msg, &sender, text, state).await;
    }
    text::handle_text(bot, &msg, &sender, text, state).await
}

pub(crate) fn sender_of(id: UserId, username: Option<&str>) -> Sender {
    Sender::new(id.0 as i64, username)
}

pub(crate) fn message_ref(msg: &Message) -> MessageRef {
    MessageRef::new(msg.chat.id.0, msg.id.0)
}

/// Best-effort HTML reply in the chat the message came from.
pub(crate) async fn reply_html(bot: &Bot, msg: &Message, html: &str) {
    if let Err(e) = bot
        .send_message(msg.chat.id, html.to_string())
        .parse_mode(ParseMode::Html)
        .await
    {
        warn!(chat = msg.chat.id.0, error = %e, "failed to send reply");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sender_keeps_numeric_id_and_strips_at() {
        let s = sender_of(UserId(777), Some("@Alice"));
        assert_eq!(s.user_id, 777);
        assert_eq!(s.identities(), vec!["Alice".to_string(), "777".to_string()]);

        let anon = sender_of(UserId(5), None);
        assert_eq!(anon.identities(), vec!["5".to_string()]);
    }
}

use std::sync::Arc;

use teloxide::prelude::*;
use tracing::error;

use relaybot_core::{
    commands::{relay_summary, UNAUTHORIZED_MESSAGE},
    domain::Sender,
    service::TextDisposition,
};

use crate::router::AppState;

use super::{message_ref, reply_html};

pub async fn handle_text(
    bot: Bot,
    msg: &Message,
    sender: &Sender,
    text: &str,
    state: Arc<AppState>,
) -> ResponseResult<()> {
    if text.trim().is_empty() {
        return Ok(());
    }

    let original = message_ref(msg);
    match state.service.handle_text(&original, sender, text).await {
        Ok(TextDisposition::Unauthorized) => reply_html(&bot, msg, UNAUTHORIZED_MESSAGE).await,
        Ok(TextDisposition::Relayed(outcome)) => {
            if let Some(summary) = relay_summary(&outcome) {
                reply_html(&bot, msg, &summary).await;
            }
        }
        Err(e) => {
            error!(original = %original, error = %e, "relay failed");
            reply_html(&bot, msg, "❌ Relay failed; check the bot logs.").await;
        }
    }
    Ok(())
}

use std::sync::Arc;

use teloxide::prelude::*;
use tracing::{error, info};

use relaybot_core::{
    commands::{execute, Command},
    domain::Sender,
};

use crate::router::AppState;

use super::{message_ref, reply_html};

pub async fn handle_command(
    bot: Bot,
    msg: &Message,
    sender: &Sender,
    text: &str,
    state: Arc<AppState>,
) -> ResponseResult<()> {
    let Some(command) = Command::parse(text, state.bot_username.as_deref()) else {
        return Ok(());
    };
    info!(
        command = command.name(),
        sender = %sender.display_name(),
        chat = msg.chat.id.0,
        "command received"
    );

    let reply_to = msg.reply_to_message().map(message_ref);
    let reply = match execute(&state.service, sender, &command, reply_to.as_ref()).await {
        Ok(reply) => reply,
        Err(e) => {
            error!(command = command.name(), error = %e, "command failed");
            "❌ Something went wrong; check the bot logs.".to_string()
        }
    };

    reply_html(&bot, msg, &reply).await;
    Ok(())
}

use std::sync::Arc;

use teloxide::{dispatching::Dispatcher, dptree, prelude::*};
use tracing::{info, warn};

use relaybot_core::{
    config::Config,
    messaging::{port::ChatTransport, throttled::ThrottledTransport},
    service::RelayService,
    store::Store,
};

use crate::handlers;
use crate::TelegramTransport;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<RelayService>,
    /// Our own `@username`; commands addressed to other bots are ignored.
    pub bot_username: Option<String>,
}

/// Build the transport stack for `bot` as configured.
pub fn build_transport(cfg: &Config, bot: Bot) -> Arc<dyn ChatTransport> {
    let raw: Arc<dyn ChatTransport> = Arc::new(TelegramTransport::new(bot));
    if !cfg.throttle_enabled {
        return raw;
    }
    // Keep a fan-out to many groups under the flood limits. The adapter still retries once on 429.
    Arc::new(ThrottledTransport::new(raw, cfg.throttle))
}

pub async fn run_polling(cfg: Arc<Config>, store: Store) -> anyhow::Result<()> {
    let bot = Bot::new(cfg.telegram_bot_token.clone());

    let bot_username = match bot.get_me().await {
        Ok(me) => {
            info!(bot = ?me.user.username, "relaybot started");
            me.user.username.clone()
        }
        Err(e) => {
            warn!(error = %e, "get_me failed; continuing");
            None
        }
    };
    info!(
        admins = cfg.admin_users.len(),
        database = %cfg.database_path.display(),
        purge_policy = ?cfg.purge_policy,
        throttled = cfg.throttle_enabled,
        "configuration loaded"
    );

    let transport = build_transport(&cfg, bot.clone());
    let service = Arc::new(RelayService::from_config(&cfg, store.clone(), transport));

    let state = Arc::new(AppState {
        service,
        bot_username,
    });

    let handler = dptree::entry().branch(Update::filter_message().endpoint(handlers::handle_message));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .build()
        .dispatch()
        .await;

    info!("dispatcher stopped; closing store");
    store.close().await;
    Ok(())
}

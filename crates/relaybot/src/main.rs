use std::sync::Arc;

use tracing::info;

use relaybot_core::{config::Config, store::Store};

#[tokio::main]
async fn main() -> Result<(), relaybot_core::Error> {
    relaybot_core::logging::init("relaybot")?;

    let cfg = Arc::new(Config::load()?);

    let store = Store::open(&cfg.database_path, cfg.database_max_connections).await?;
    info!(path = %cfg.database_path.display(), "store opened");

    relaybot_telegram::router::run_polling(cfg, store)
        .await
        .map_err(|e| relaybot_core::Error::External(format!("telegram bot failed: {e}")))?;

    Ok(())
}

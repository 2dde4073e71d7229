#![forbid(unsafe_code)]

use std::sync::Arc;

use anyhow::Result;
use tracing::{error, info};

mod bridge;
mod config;
mod db;
mod discord;
mod media;
mod parsers;
mod telegram;
mod utils;

use config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load()?;
    utils::logging::init_tracing(&config.logging.level);
    info!("telegram-discord bridge starting up");

    let db_manager = db::DatabaseManager::new(&config.database.filename);
    db_manager.migrate().await?;

    let telegram_relay = Arc::new(telegram::TelegramRelay::new(&config.telegram.bot_token));
    let discord_relay = Arc::new(discord::DiscordRelay::new(&config.discord.bot_token));
    discord_relay.start().await?;

    let bridge = Arc::new(bridge::BridgeCore::new(
        db_manager.link_store(),
        telegram_relay.clone(),
        discord_relay.clone(),
        config.discord.post_channel_id,
    ));
    discord_relay.set_bridge(bridge.clone()).await;

    let polling_relay = telegram_relay.clone();
    let polling_bridge = bridge.clone();
    let telegram_handle = tokio::spawn(async move {
        polling_relay.run(polling_bridge).await;
    });

    tokio::select! {
        _ = telegram_handle => {
            error!("telegram polling stopped");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("received shutdown signal");
        }
    }

    discord_relay.stop().await?;
    info!("telegram-discord bridge shutting down");
    Ok(())
}

//! tgstarter demo bot
//!
//! Runs a small questionnaire on top of the state router: it asks for a
//! name and an age, then sums the answers up.

mod questionnaire;

use std::sync::Arc;

use teloxide::adaptors::throttle::Limits;
use teloxide::prelude::*;
use tracing::info;
use tracing_subscriber::EnvFilter;

use tgstarter::bot::{self, AppState, Routers};
use tgstarter::config::Config;
use tgstarter::database::Database;
use tgstarter::logger::{LoggerOptions, MongoLogger, NotificationTemplate};
use tgstarter::storage::{MongoStorage, StateStorage};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file first (before anything else)
    dotenvy::dotenv().ok();

    // If RUST_LOG is not set, default to "info" level for our crate
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("tgstarter=info,teloxide=warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .init();

    info!("Starting tgstarter bot...");

    let config = Config::from_env()?;
    info!("Configuration loaded successfully");
    info!("Bot mode: {:?}", config.bot_mode);

    info!("Connecting to MongoDB...");
    let db = Database::connect(&config.mongodb_uri, &config.mongodb_database).await?;
    info!("Database connected");

    let storage = MongoStorage::new(&db, &config.state_collection);
    storage.ensure_indexes().await?;
    let storage: Arc<dyn StateStorage> = Arc::new(storage);

    let logger = MongoLogger::new(
        &db,
        NotificationTemplate::default(),
        LoggerOptions::default()
            .collection(config.log_collection.as_str())
            .timezone(config.log_timezone),
    );
    let state = AppState::new(
        Arc::new(logger),
        config.log_chat_id.map(ChatId),
        config.log_updates,
    );

    // Throttle respects Telegram's rate limits:
    // - 30 messages per second globally
    // - 1 message per second to the same chat
    // - 20 messages per minute to the same group
    let bot = Bot::new(&config.bot_token).throttle(Limits::default());

    let me = bot.get_me().await?;
    info!("Bot username: @{}", me.username());

    let mut routers = Routers::new(storage.clone());
    questionnaire::install(&mut routers, me.username().to_string());
    info!(
        "Registered {} message and {} callback routes",
        routers.messages.len(),
        routers.callbacks.len()
    );

    let dispatcher = bot::build_dispatcher(bot.clone(), state, routers);
    bot::run(&config, dispatcher, bot).await?;

    storage.close().await?;
    Ok(())
}

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use backon::{ExponentialBuilder, Retryable};
use dotenvy::dotenv;
use teloxide::prelude::*;
use teloxide::update_listeners::Polling;

use mediabot::cli::{Cli, Commands};
use mediabot::telegram::{
    HandlerDeps, PendingReplies, TelegramTransport, create_bot, create_elevated_bot, schema, setup_bot_commands,
};
use mediacore::core::logging::log_startup_configuration;
use mediacore::core::process::binary_available;
use mediacore::core::{config, health_server, init_logger, metrics};
use mediacore::media::tool::FfmpegTool;
use mediacore::storage::{SqliteSettingsStore, create_pool};
use mediacore::{Pipeline, PipelineSettings};

const REQUIRED_TOOLS: [&str; 2] = ["ffmpeg", "ffprobe"];

/// Main entry point for the bot
///
/// Parses CLI arguments and dispatches to the chosen subcommand.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse_args();

    // Panics inside spawned jobs are logged instead of vanishing
    std::panic::set_hook(Box::new(|panic_info| {
        log::error!("Panic caught: {:?}", panic_info);
        if let Some(location) = panic_info.location() {
            log::error!("Panic at {}:{}:{}", location.file(), location.line(), location.column());
        }
        if let Some(msg) = panic_info.payload().downcast_ref::<&str>() {
            log::error!("Panic message: {}", msg);
        }
    }));

    // Load environment variables from .env if present
    let _ = dotenv();

    init_logger(&config::LOG_FILE_PATH)?;

    match cli.command {
        Some(Commands::Run) | None => run_bot().await,
        Some(Commands::CheckTools) => check_tools().await,
        Some(Commands::Migrate { database }) => migrate(database.as_deref().unwrap_or(config::DATABASE_PATH.as_str())),
    }
}

async fn check_tools() -> Result<()> {
    let mut missing = Vec::new();
    for tool in REQUIRED_TOOLS {
        if binary_available(tool).await {
            log::info!("✅ {} found", tool);
        } else {
            log::error!("❌ {} not found on PATH", tool);
            missing.push(tool);
        }
    }
    if !missing.is_empty() {
        anyhow::bail!("Missing tools: {}", missing.join(", "));
    }
    Ok(())
}

fn migrate(path: &str) -> Result<()> {
    create_pool(path).map_err(|e| anyhow::anyhow!("Failed to migrate {}: {}", path, e))?;
    log::info!("✅ Database {} is up to date", path);
    Ok(())
}

/// Waits for the Bot API to answer `getMe`; a self-hosted server can take a
/// while to come up after a restart
async fn wait_for_bot_api(bot: &Bot) -> Result<teloxide::types::Me> {
    let backoff = ExponentialBuilder::default()
        .with_min_delay(Duration::from_secs(1))
        .with_max_delay(Duration::from_secs(30))
        .with_max_times(10);

    let me = (|| async { bot.get_me().await })
        .retry(backoff)
        .notify(|e, delay| log::warn!("Bot API not ready: {}. Retrying in {:?}...", e, delay))
        .await?;
    Ok(me)
}

/// Run the Telegram bot
async fn run_bot() -> Result<()> {
    log::info!("Starting bot...");
    log_startup_configuration();

    if let Err(e) = metrics::init_metrics() {
        log::warn!("Failed to initialize metrics: {}", e);
    }

    for tool in REQUIRED_TOOLS {
        if !binary_available(tool).await {
            log::warn!("⚠️  {} not found on PATH, media jobs will fail", tool);
        }
    }

    let port = *config::PORT;
    tokio::spawn(async move {
        if let Err(e) = health_server::start_health_server(port).await {
            log::error!("Health server error: {}", e);
        }
    });

    let db_pool = create_pool(&config::DATABASE_PATH)
        .map_err(|e| anyhow::anyhow!("Failed to create database pool: {}", e))?;
    let store = Arc::new(
        SqliteSettingsStore::with_default_metadata(db_pool, &config::DEFAULT_METADATA_TEXT)
            .with_default_mode(*config::DEFAULT_MEDIA_MODE),
    );

    let bot = create_bot()?;
    let me = wait_for_bot_api(&bot).await?;
    log::info!("Bot username: {:?}, Bot ID: {}", me.username, me.id);

    let elevated = create_elevated_bot()?;
    if let Some(elevated) = &elevated {
        match wait_for_bot_api(elevated).await {
            Ok(_) => log::info!("🚀 Elevated identity connected"),
            Err(e) => log::warn!("⚠️  Elevated identity unreachable ({}), large files will be refused until it is up", e),
        }
    }

    if let Err(e) = setup_bot_commands(&bot).await {
        log::warn!("Failed to register bot commands: {}", e);
    }

    let replies = PendingReplies::new();
    let transport = Arc::new(TelegramTransport::new(bot.clone(), elevated, replies.clone()));
    let pipeline = Pipeline::new(transport, store, Arc::new(FfmpegTool::new()), PipelineSettings::default());
    let deps = HandlerDeps::new(pipeline, replies);

    let listener = Polling::builder(bot.clone()).drop_pending_updates().build();
    Dispatcher::builder(bot, schema(deps))
        .enable_ctrlc_handler()
        .build()
        .dispatch_with_listener(
            listener,
            LoggingErrorHandler::with_custom_text("An error from the update listener"),
        )
        .await;

    log::info!("Dispatcher shutdown gracefully");
    Ok(())
}

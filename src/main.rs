use anyhow::{Context, Result};
use std::sync::Arc;
use teloxide::prelude::*;
use tracing::{debug, info};
use tracing_subscriber::{prelude::*, EnvFilter};

use pororokz_bot::bot::{self, AppState};
use pororokz_bot::config::BotConfig;
use pororokz_bot::db;
use pororokz_bot::downloads::DownloadService;
use pororokz_bot::localization::init_localization;
use pororokz_bot::media::YtDlpFetcher;

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    let config = BotConfig::from_env()?;
    init_logging(config.json_logs);

    info!("Starting Pororokz Telegram Bot");

    init_localization().context("Failed to load message catalog")?;

    info!(database_url = %config.database_url, "Initializing database");
    let pool = db::connect(&config.database_url).await?;
    db::init_database_schema(&pool).await?;

    tokio::fs::create_dir_all(&config.photos_dir)
        .await
        .with_context(|| format!("Failed to create {}", config.photos_dir.display()))?;

    let fetcher = Arc::new(YtDlpFetcher::new(config.media.clone()));
    let downloads = DownloadService::new(
        fetcher,
        config.selection_ttl(),
        config.media.search_results,
    );

    let bot = Bot::new(config.bot_token.clone());
    let prune_interval = config.prune_interval();
    let state = Arc::new(AppState {
        pool,
        config,
        downloads,
    });

    spawn_selection_pruner(Arc::clone(&state), prune_interval);

    let handler = dptree::entry()
        .branch(Update::filter_message().endpoint(bot::message_handler))
        .branch(Update::filter_callback_query().endpoint(bot::callback_handler))
        .branch(Update::filter_inline_query().endpoint(bot::inline_query_handler));

    info!("Bot initialized, starting dispatcher");

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .error_handler(LoggingErrorHandler::with_custom_text(
            "An error has occurred in the dispatcher",
        ))
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    Ok(())
}

fn init_logging(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// Periodically drop selections nobody pressed
fn spawn_selection_pruner(state: Arc<AppState>, every: std::time::Duration) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        loop {
            interval.tick().await;
            let removed = state.downloads.prune_expired();
            debug!(
                removed,
                pending = state.downloads.pending_selections(),
                "Selection prune pass"
            );
        }
    });
}

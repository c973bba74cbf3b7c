//! Bot module for handling Telegram interactions
//!
//! This module is split into several submodules:
//! - `message_handler`: Parses commands and runs the quote, music, photo and TikTok flows
//! - `callback_handler`: Handles inline keyboard callback queries
//! - `inline_handler`: Answers inline-mode queries with saved quotes and photos
//! - `media_delivery`: Uploads fetched audio and video and records the delivery
//! - `ui_builder`: Creates keyboards and formats messages

pub mod callback_handler;
pub mod inline_handler;
pub mod media_delivery;
pub mod message_handler;
pub mod ui_builder;

use sqlx::SqlitePool;

use crate::config::BotConfig;
use crate::downloads::DownloadService;

// Re-export main handler functions for use in main.rs
pub use callback_handler::callback_handler;
pub use inline_handler::inline_query_handler;
pub use message_handler::message_handler;

/// Process-wide state shared by every handler
pub struct AppState {
    pub pool: SqlitePool,
    pub config: BotConfig,
    pub downloads: DownloadService,
}

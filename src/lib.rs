//! # Pororokz Telegram Bot
//!
//! A chat bot that archives quotes and photos, fetches music and TikTok
//! media through yt-dlp and answers inline queries with saved content.
//!
//! Multi-option downloads use a deferred selection protocol: options are
//! stored server-side under short-lived keys owned by the requesting user,
//! and only the key travels in the button payload.

pub mod bot;
pub mod commands;
pub mod config;
pub mod db;
pub mod deferred;
pub mod downloads;
pub mod errors;
pub mod localization;
pub mod media;
pub mod quotes;
pub mod selection;
pub mod tiktok;

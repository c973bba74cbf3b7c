//! # Database Module
//!
//! SQLite repository for quotes, saved photos, music history and TikTok
//! downloads. Every operation is an independent single-row statement.

use std::str::FromStr;

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use tracing::{debug, info};

/// A stored quote
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct Quote {
    pub id: i64,
    /// User who saved the quote
    pub user_id: i64,
    pub chat_id: i64,
    pub message_text: String,
    pub author_name: Option<String>,
    /// User who wrote the quoted message
    pub author_id: Option<i64>,
    pub quote_type: i64,
    pub created_at: NaiveDateTime,
}

/// Fields of a quote to insert
#[derive(Debug, Clone)]
pub struct NewQuote<'a> {
    pub user_id: i64,
    pub chat_id: i64,
    pub message_text: &'a str,
    pub author_name: Option<&'a str>,
    pub author_id: Option<i64>,
    pub quote_type: i64,
}

/// A saved photo
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct Photo {
    pub id: i64,
    pub user_id: i64,
    pub file_id: String,
    pub description: Option<String>,
    pub file_path: Option<String>,
    pub created_at: NaiveDateTime,
}

/// A delivered music track
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct MusicTrack {
    pub id: i64,
    pub user_id: i64,
    pub title: String,
    pub artist: Option<String>,
    pub file_path: Option<String>,
    pub file_id: Option<String>,
    pub created_at: NaiveDateTime,
}

/// A delivered TikTok video or audio
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct TikTokVideo {
    pub id: i64,
    pub user_id: i64,
    pub url: String,
    pub file_path: Option<String>,
    pub title: Option<String>,
    pub created_at: NaiveDateTime,
}

/// Open (creating if missing) the SQLite database at `database_url`
pub async fn connect(database_url: &str) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(database_url)
        .with_context(|| format!("Invalid database URL: {database_url}"))?
        .create_if_missing(true);

    SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await
        .context("Failed to connect to database")
}

/// Initialize the database schema
pub async fn init_database_schema(pool: &SqlitePool) -> Result<()> {
    info!("Initializing database schema...");

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS quotes (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL,
            chat_id INTEGER NOT NULL,
            message_text TEXT NOT NULL,
            author_name TEXT,
            author_id INTEGER,
            quote_type INTEGER NOT NULL DEFAULT 1,
            created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP
        )",
    )
    .execute(pool)
    .await
    .context("Failed to create quotes table")?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS photos (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL,
            file_id TEXT NOT NULL,
            description TEXT,
            file_path TEXT,
            created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP
        )",
    )
    .execute(pool)
    .await
    .context("Failed to create photos table")?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS music (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL,
            title TEXT NOT NULL,
            artist TEXT,
            file_path TEXT,
            file_id TEXT,
            created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP
        )",
    )
    .execute(pool)
    .await
    .context("Failed to create music table")?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS tiktok_videos (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL,
            url TEXT NOT NULL,
            file_path TEXT,
            title TEXT,
            created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP
        )",
    )
    .execute(pool)
    .await
    .context("Failed to create tiktok_videos table")?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_quotes_user ON quotes(user_id)")
        .execute(pool)
        .await
        .context("Failed to create quotes user index")?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_quotes_chat ON quotes(chat_id)")
        .execute(pool)
        .await
        .context("Failed to create quotes chat index")?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_photos_user ON photos(user_id)")
        .execute(pool)
        .await
        .context("Failed to create photos user index")?;

    info!("Database schema initialized successfully");
    Ok(())
}

// SQLite treats a negative LIMIT as "no limit"
fn limit_or_all(limit: Option<i64>) -> i64 {
    limit.unwrap_or(-1)
}

/// Insert a quote and return its id
pub async fn add_quote(pool: &SqlitePool, quote: &NewQuote<'_>) -> sqlx::Result<i64> {
    let id = sqlx::query(
        "INSERT INTO quotes (user_id, chat_id, message_text, author_name, author_id, quote_type)
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(quote.user_id)
    .bind(quote.chat_id)
    .bind(quote.message_text)
    .bind(quote.author_name)
    .bind(quote.author_id)
    .bind(quote.quote_type)
    .execute(pool)
    .await?
    .last_insert_rowid();

    info!(quote_id = id, user_id = quote.user_id, chat_id = quote.chat_id, "Quote created");
    Ok(id)
}

pub async fn count_user_quotes(pool: &SqlitePool, user_id: i64) -> sqlx::Result<i64> {
    sqlx::query_scalar("SELECT COUNT(*) FROM quotes WHERE user_id = ?")
        .bind(user_id)
        .fetch_one(pool)
        .await
}

/// Quotes saved by `user_id`, newest first
pub async fn get_user_quotes(
    pool: &SqlitePool,
    user_id: i64,
    limit: Option<i64>,
) -> sqlx::Result<Vec<Quote>> {
    sqlx::query_as::<_, Quote>(
        "SELECT * FROM quotes WHERE user_id = ? ORDER BY created_at DESC, id DESC LIMIT ?",
    )
    .bind(user_id)
    .bind(limit_or_all(limit))
    .fetch_all(pool)
    .await
}

/// Quotes saved in `chat_id`, newest first
pub async fn get_chat_quotes(
    pool: &SqlitePool,
    chat_id: i64,
    limit: Option<i64>,
) -> sqlx::Result<Vec<Quote>> {
    sqlx::query_as::<_, Quote>(
        "SELECT * FROM quotes WHERE chat_id = ? ORDER BY created_at DESC, id DESC LIMIT ?",
    )
    .bind(chat_id)
    .bind(limit_or_all(limit))
    .fetch_all(pool)
    .await
}

/// Quotes saved by `user_id` in `chat_id`, newest first
pub async fn get_user_chat_quotes(
    pool: &SqlitePool,
    user_id: i64,
    chat_id: i64,
) -> sqlx::Result<Vec<Quote>> {
    sqlx::query_as::<_, Quote>(
        "SELECT * FROM quotes WHERE user_id = ? AND chat_id = ? ORDER BY created_at DESC, id DESC",
    )
    .bind(user_id)
    .bind(chat_id)
    .fetch_all(pool)
    .await
}

/// Quotes whose original message was written by `author_id`, newest first
pub async fn get_author_quotes(pool: &SqlitePool, author_id: i64) -> sqlx::Result<Vec<Quote>> {
    sqlx::query_as::<_, Quote>(
        "SELECT * FROM quotes WHERE author_id = ? ORDER BY created_at DESC, id DESC",
    )
    .bind(author_id)
    .fetch_all(pool)
    .await
}

pub async fn get_random_quote(pool: &SqlitePool) -> sqlx::Result<Option<Quote>> {
    sqlx::query_as::<_, Quote>("SELECT * FROM quotes ORDER BY RANDOM() LIMIT 1")
        .fetch_optional(pool)
        .await
}

/// Delete a quote if it belongs to `user_id`
pub async fn delete_quote(pool: &SqlitePool, quote_id: i64, user_id: i64) -> sqlx::Result<bool> {
    let rows_affected = sqlx::query("DELETE FROM quotes WHERE id = ? AND user_id = ?")
        .bind(quote_id)
        .bind(user_id)
        .execute(pool)
        .await?
        .rows_affected();

    debug!(quote_id, user_id, deleted = rows_affected > 0, "Quote delete requested");
    Ok(rows_affected > 0)
}

/// Insert a saved photo and return its id
pub async fn add_photo(
    pool: &SqlitePool,
    user_id: i64,
    file_id: &str,
    description: Option<&str>,
    file_path: Option<&str>,
) -> sqlx::Result<i64> {
    let id = sqlx::query(
        "INSERT INTO photos (user_id, file_id, description, file_path) VALUES (?, ?, ?, ?)",
    )
    .bind(user_id)
    .bind(file_id)
    .bind(description)
    .bind(file_path)
    .execute(pool)
    .await?
    .last_insert_rowid();

    info!(photo_id = id, user_id, "Photo saved");
    Ok(id)
}

pub async fn count_user_photos(pool: &SqlitePool, user_id: i64) -> sqlx::Result<i64> {
    sqlx::query_scalar("SELECT COUNT(*) FROM photos WHERE user_id = ?")
        .bind(user_id)
        .fetch_one(pool)
        .await
}

/// Photos saved by `user_id`, newest first
pub async fn get_user_photos(pool: &SqlitePool, user_id: i64) -> sqlx::Result<Vec<Photo>> {
    sqlx::query_as::<_, Photo>(
        "SELECT * FROM photos WHERE user_id = ? ORDER BY created_at DESC, id DESC",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
}

/// Delete a photo if it belongs to `user_id`, returning the removed row
pub async fn delete_photo(
    pool: &SqlitePool,
    photo_id: i64,
    user_id: i64,
) -> sqlx::Result<Option<Photo>> {
    sqlx::query_as::<_, Photo>("DELETE FROM photos WHERE id = ? AND user_id = ? RETURNING *")
        .bind(photo_id)
        .bind(user_id)
        .fetch_optional(pool)
        .await
}

/// Record a delivered track and return its id
pub async fn add_music(
    pool: &SqlitePool,
    user_id: i64,
    title: &str,
    artist: Option<&str>,
    file_path: Option<&str>,
    file_id: Option<&str>,
) -> sqlx::Result<i64> {
    let id = sqlx::query(
        "INSERT INTO music (user_id, title, artist, file_path, file_id) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(user_id)
    .bind(title)
    .bind(artist)
    .bind(file_path)
    .bind(file_id)
    .execute(pool)
    .await?
    .last_insert_rowid();

    info!(music_id = id, user_id, "Music track recorded");
    Ok(id)
}

/// Music history of `user_id`, newest first
pub async fn get_user_music(
    pool: &SqlitePool,
    user_id: i64,
    limit: Option<i64>,
) -> sqlx::Result<Vec<MusicTrack>> {
    sqlx::query_as::<_, MusicTrack>(
        "SELECT * FROM music WHERE user_id = ? ORDER BY created_at DESC, id DESC LIMIT ?",
    )
    .bind(user_id)
    .bind(limit_or_all(limit))
    .fetch_all(pool)
    .await
}

/// Keep only the `keep` newest music rows of `user_id`
pub async fn trim_user_music(pool: &SqlitePool, user_id: i64, keep: i64) -> sqlx::Result<u64> {
    let removed = sqlx::query(
        "DELETE FROM music WHERE user_id = ? AND id NOT IN (
            SELECT id FROM music WHERE user_id = ? ORDER BY created_at DESC, id DESC LIMIT ?
        )",
    )
    .bind(user_id)
    .bind(user_id)
    .bind(keep.max(0))
    .execute(pool)
    .await?
    .rows_affected();

    if removed > 0 {
        debug!(user_id, removed, "Trimmed music history");
    }
    Ok(removed)
}

/// Record a delivered TikTok and return its id
pub async fn add_tiktok(
    pool: &SqlitePool,
    user_id: i64,
    url: &str,
    file_path: Option<&str>,
    title: Option<&str>,
) -> sqlx::Result<i64> {
    let id = sqlx::query(
        "INSERT INTO tiktok_videos (user_id, url, file_path, title) VALUES (?, ?, ?, ?)",
    )
    .bind(user_id)
    .bind(url)
    .bind(file_path)
    .bind(title)
    .execute(pool)
    .await?
    .last_insert_rowid();

    info!(tiktok_id = id, user_id, "TikTok recorded");
    Ok(id)
}

pub async fn get_random_tiktok(pool: &SqlitePool) -> sqlx::Result<Option<TikTokVideo>> {
    sqlx::query_as::<_, TikTokVideo>("SELECT * FROM tiktok_videos ORDER BY RANDOM() LIMIT 1")
        .fetch_optional(pool)
        .await
}

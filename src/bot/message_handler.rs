//! Message Handler module for processing incoming Telegram messages

use anyhow::Result;
use sqlx::SqlitePool;
use std::path::Path;
use std::sync::Arc;
use teloxide::prelude::*;
use teloxide::types::{FileId, InputFile, User};
use tracing::{debug, error, info, warn};

// Import localization
use crate::localization::{t, t_args};

// Import command parsing and domain helpers
use crate::commands::{parse_command, Command, IdArgument};
use crate::db::{self, NewQuote, Quote};
use crate::errors::BotError;
use crate::quotes::{author_display_name, format_quote, pick_numbered, QuoteStyle};

use super::media_delivery::send_music;
use super::ui_builder::{
    add_to_group_keyboard, delete_photo_keyboard, delete_quote_keyboard, failure_message,
    format_music_results, format_photo_caption, format_quote_record, format_tiktok_info,
    selection_keyboard, user_message,
};
use super::AppState;

/// Photos sent per `/photos` request
const PHOTOS_PER_REQUEST: usize = 10;

/// Telegram user id as stored in the database
pub(crate) fn db_user_id(user: &User) -> i64 {
    user.id.0 as i64
}

/// Download a Telegram file to `destination`
pub async fn download_file(bot: &Bot, file_id: FileId, destination: &Path) -> Result<()> {
    let file = bot.get_file(file_id).await?;
    let url = format!(
        "https://api.telegram.org/file/bot{}/{}",
        bot.token(),
        file.path
    );

    let response = reqwest::get(&url).await?.error_for_status()?;
    let bytes = response.bytes().await?;
    tokio::fs::write(destination, &bytes).await?;

    debug!(path = %destination.display(), size = bytes.len(), "Telegram file downloaded");
    Ok(())
}

/// Record a downloaded photo, removing the file again if the row cannot be stored
pub async fn record_saved_photo(
    pool: &SqlitePool,
    user_id: i64,
    file_id: &str,
    description: Option<&str>,
    file_path: &Path,
) -> sqlx::Result<i64> {
    let stored_path = file_path.to_string_lossy();
    let recorded =
        db::add_photo(pool, user_id, file_id, description, Some(stored_path.as_ref())).await;

    if recorded.is_err() {
        if let Err(e) = tokio::fs::remove_file(file_path).await {
            warn!(path = %file_path.display(), error = %e, "Failed to remove unrecorded photo");
        }
    }
    recorded
}

pub async fn message_handler(bot: Bot, msg: Message, state: Arc<AppState>) -> Result<()> {
    let Some(text) = msg.text() else {
        return Ok(());
    };
    let Some(command) = parse_command(text) else {
        return Ok(());
    };
    let Some(sender) = msg.from.as_ref() else {
        debug!(chat_id = %msg.chat.id, "Ignoring command without sender");
        return Ok(());
    };

    debug!(user_id = %sender.id, chat_id = %msg.chat.id, ?command, "Received command");

    if let Err(e) = handle_command(&bot, &msg, sender, &state, command).await {
        match e.downcast_ref::<BotError>() {
            Some(bot_err) => warn!(
                event = "command",
                user_id = %sender.id,
                chat_id = %msg.chat.id,
                kind = bot_err.kind(),
                error = %bot_err,
                "Command failed"
            ),
            None => error!(
                event = "command",
                user_id = %sender.id,
                chat_id = %msg.chat.id,
                error = %e,
                "Command failed unexpectedly"
            ),
        }

        if let Err(send_err) = bot.send_message(msg.chat.id, failure_message(&e)).await {
            error!(chat_id = %msg.chat.id, error = %send_err, "Failed to report error to user");
        }
    }

    Ok(())
}

async fn handle_command(
    bot: &Bot,
    msg: &Message,
    sender: &User,
    state: &AppState,
    command: Command,
) -> Result<()> {
    let chat_id = msg.chat.id;
    let user_id = db_user_id(sender);

    match command {
        Command::Help => send_help(bot, chat_id).await,
        Command::Quote(style) => create_quote(bot, msg, sender, state, style).await,
        Command::MyQuote(number) => {
            let quotes = db::get_user_quotes(&state.pool, user_id, None).await?;
            send_numbered_quote(bot, chat_id, &quotes, number, "quote-none-user", true).await
        }
        Command::HerQuote(number) => {
            let Some(author) = msg.reply_to_message().and_then(|m| m.from.as_ref()) else {
                bot.send_message(chat_id, t("quote-her-reply-required")).await?;
                return Ok(());
            };
            let quotes = db::get_author_quotes(&state.pool, db_user_id(author)).await?;
            send_numbered_quote(bot, chat_id, &quotes, number, "quote-none-author", false).await
        }
        Command::ChatQuote(number) => {
            let quotes = db::get_chat_quotes(&state.pool, chat_id.0, None).await?;
            send_numbered_quote(bot, chat_id, &quotes, number, "quote-none-chat", false).await
        }
        Command::MyChatQuote(number) => {
            let quotes = db::get_user_chat_quotes(&state.pool, user_id, chat_id.0).await?;
            send_numbered_quote(bot, chat_id, &quotes, number, "quote-none-user-chat", true).await
        }
        Command::AllQuote => {
            match db::get_random_quote(&state.pool).await? {
                Some(quote) => bot.send_message(chat_id, format_quote_record(&quote)).await?,
                None => bot.send_message(chat_id, t("quote-none-all")).await?,
            };
            Ok(())
        }
        Command::DeleteQuote(argument) => {
            let reply = match argument {
                IdArgument::Missing => t("quote-id-missing"),
                IdArgument::Invalid => t("quote-id-invalid"),
                IdArgument::Id(quote_id) => {
                    if db::delete_quote(&state.pool, quote_id, user_id).await? {
                        t("quote-deleted")
                    } else {
                        t("quote-delete-failed")
                    }
                }
            };
            bot.send_message(chat_id, reply).await?;
            Ok(())
        }
        Command::MusicBest(query) => {
            if query.is_empty() {
                bot.send_message(chat_id, t("music-query-hint-command")).await?;
                return Ok(());
            }
            bot.send_message(chat_id, t("music-searching")).await?;
            let delivery = state.downloads.best_music(&query).await?;
            send_music(bot, chat_id, state, user_id, &delivery).await?;
            bot.send_message(chat_id, t("music-sent")).await?;
            Ok(())
        }
        Command::MusicOptions(query) => {
            if query.is_empty() {
                bot.send_message(chat_id, t("music-query-hint-text")).await?;
                return Ok(());
            }
            bot.send_message(chat_id, t("music-searching-options")).await?;
            let presentation = state.downloads.present_music(&query, sender.id.0).await?;
            bot.send_message(chat_id, format_music_results(&presentation.results))
                .reply_markup(selection_keyboard(&presentation.buttons, 1))
                .await?;
            Ok(())
        }
        Command::SavePhoto(description) => save_photo(bot, msg, user_id, state, description).await,
        Command::Photos => show_user_photos(bot, chat_id, user_id, state).await,
        Command::RandomTikTok => {
            let reply = match db::get_random_tiktok(&state.pool).await? {
                Some(video) => {
                    let title = video.title.unwrap_or_else(|| t("tiktok-untitled"));
                    t_args("tiktok-random", &[("title", &title), ("url", &video.url)])
                }
                None => t("tiktok-none"),
            };
            bot.send_message(chat_id, reply).await?;
            Ok(())
        }
        Command::TikTokLink(url) => present_tiktok(bot, chat_id, sender, state, &url).await,
    }
}

async fn send_help(bot: &Bot, chat_id: ChatId) -> Result<()> {
    let mut request = bot.send_message(chat_id, t("help-text"));

    match bot.get_me().await {
        Ok(me) => {
            if let Some(keyboard) = me.user.username.as_deref().and_then(add_to_group_keyboard) {
                request = request.reply_markup(keyboard);
            }
        }
        Err(e) => warn!(error = %e, "Failed to fetch bot identity for help keyboard"),
    }

    request.await?;
    Ok(())
}

async fn create_quote(
    bot: &Bot,
    msg: &Message,
    sender: &User,
    state: &AppState,
    style: QuoteStyle,
) -> Result<()> {
    let Some(replied) = msg.reply_to_message() else {
        bot.send_message(msg.chat.id, t("quote-reply-required")).await?;
        return Ok(());
    };
    let Some(quoted_text) = replied.text() else {
        bot.send_message(msg.chat.id, t("quote-text-only")).await?;
        return Ok(());
    };

    let (author_name, author_id) = match replied.from.as_ref() {
        Some(author) => (
            author_display_name(&author.first_name, author.last_name.as_deref()),
            Some(db_user_id(author)),
        ),
        None => (t("quote-unknown-author"), None),
    };

    let user_id = db_user_id(sender);
    let limit = state.config.limits.max_quotes_per_user;
    if db::count_user_quotes(&state.pool, user_id).await? >= limit {
        return Err(BotError::LimitReached(limit).into());
    }

    let quote_id = db::add_quote(
        &state.pool,
        &NewQuote {
            user_id,
            chat_id: msg.chat.id.0,
            message_text: quoted_text,
            author_name: Some(&author_name),
            author_id,
            quote_type: style.as_db(),
        },
    )
    .await?;

    bot.send_message(msg.chat.id, format_quote(quoted_text, &author_name, style))
        .reply_markup(delete_quote_keyboard(quote_id))
        .await?;
    Ok(())
}

/// Send the `number`-th quote of `quotes` (random when `None`)
async fn send_numbered_quote(
    bot: &Bot,
    chat_id: ChatId,
    quotes: &[Quote],
    number: Option<i64>,
    empty_key: &str,
    with_delete_button: bool,
) -> Result<()> {
    let quote = match pick_numbered(quotes, number) {
        None => {
            bot.send_message(chat_id, t(empty_key)).await?;
            return Ok(());
        }
        Some(Err(total)) => {
            let number = number.unwrap_or_default().to_string();
            let total = total.to_string();
            bot.send_message(
                chat_id,
                t_args("quote-not-found", &[("number", &number), ("total", &total)]),
            )
            .await?;
            return Ok(());
        }
        Some(Ok(quote)) => quote,
    };

    let request = bot.send_message(chat_id, format_quote_record(quote));
    if with_delete_button {
        request.reply_markup(delete_quote_keyboard(quote.id)).await?;
    } else {
        request.await?;
    }
    Ok(())
}

async fn save_photo(
    bot: &Bot,
    msg: &Message,
    user_id: i64,
    state: &AppState,
    description: Option<String>,
) -> Result<()> {
    let chat_id = msg.chat.id;
    let Some(replied) = msg.reply_to_message() else {
        bot.send_message(chat_id, t("photo-reply-required")).await?;
        return Ok(());
    };
    let Some(largest) = replied.photo().and_then(|sizes| sizes.last()) else {
        bot.send_message(chat_id, t("photo-not-a-photo")).await?;
        return Ok(());
    };

    let limit = state.config.limits.max_photos_per_user;
    if db::count_user_photos(&state.pool, user_id).await? >= limit {
        return Err(BotError::LimitReached(limit).into());
    }

    let description = description.or_else(|| replied.caption().map(str::to_string));

    tokio::fs::create_dir_all(&state.config.photos_dir).await?;
    let file_path = state
        .config
        .photos_dir
        .join(format!("{}_{}.jpg", user_id, largest.file.unique_id.0));

    if let Err(e) = download_file(bot, largest.file.id.clone(), &file_path).await {
        error!(user_id, error = %e, "Failed to download photo");
        bot.send_message(chat_id, t("photo-download-failed")).await?;
        return Ok(());
    }

    let photo_id = record_saved_photo(
        &state.pool,
        user_id,
        &largest.file.id.0,
        description.as_deref(),
        &file_path,
    )
    .await?;
    info!(user_id, photo_id, "Photo archived");

    let mut reply = t("photo-saved");
    if let Some(description) = description.as_deref() {
        reply.push('\n');
        reply.push_str(&t_args("photo-saved-description", &[("description", description)]));
    }
    bot.send_message(chat_id, reply).await?;
    Ok(())
}

async fn show_user_photos(
    bot: &Bot,
    chat_id: ChatId,
    user_id: i64,
    state: &AppState,
) -> Result<()> {
    let photos = db::get_user_photos(&state.pool, user_id).await?;
    if photos.is_empty() {
        bot.send_message(chat_id, t("photos-none")).await?;
        return Ok(());
    }

    let count = photos.len().to_string();
    bot.send_message(chat_id, t_args("photos-found", &[("count", &count)]))
        .await?;

    for photo in photos.iter().take(PHOTOS_PER_REQUEST) {
        let sent = bot
            .send_photo(chat_id, InputFile::file_id(FileId(photo.file_id.clone())))
            .caption(format_photo_caption(photo))
            .reply_markup(delete_photo_keyboard(photo.id))
            .await;
        if let Err(e) = sent {
            warn!(photo_id = photo.id, error = %e, "Failed to send saved photo");
        }
    }

    if photos.len() > PHOTOS_PER_REQUEST {
        let remaining = (photos.len() - PHOTOS_PER_REQUEST).to_string();
        bot.send_message(chat_id, t_args("photos-more", &[("count", &remaining)]))
            .await?;
    }
    Ok(())
}

async fn present_tiktok(
    bot: &Bot,
    chat_id: ChatId,
    sender: &User,
    state: &AppState,
    url: &str,
) -> Result<()> {
    let status = bot.send_message(chat_id, t("tiktok-processing")).await?;

    match state.downloads.present_tiktok(url, sender.id.0).await {
        Ok(presentation) => {
            bot.edit_message_text(chat_id, status.id, format_tiktok_info(&presentation.media))
                .reply_markup(selection_keyboard(&presentation.buttons, 2))
                .await?;
        }
        Err(e) => {
            warn!(
                event = "tiktok_link",
                user_id = %sender.id,
                chat_id = %chat_id,
                kind = e.kind(),
                error = %e,
                "TikTok probe failed"
            );
            bot.edit_message_text(chat_id, status.id, user_message(&e))
                .await?;
        }
    }
    Ok(())
}

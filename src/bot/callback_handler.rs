//! Callback Handler module for processing inline keyboard callback queries

use anyhow::Result;
use std::sync::Arc;
use teloxide::prelude::*;
use teloxide::types::{CallbackQuery, MessageId, UserId};
use tracing::{debug, error, info, warn};

// Import localization
use crate::localization::{t, t_args};

use crate::db;
use crate::errors::BotError;
use crate::media::MediaKind;

use super::media_delivery::{send_music, send_tiktok};
use super::ui_builder::{failure_message, user_message};
use super::AppState;

const DELETE_QUOTE_PREFIX: &str = "delete_quote_";
const DELETE_PHOTO_PREFIX: &str = "delete_photo_";

/// Handle callback queries from inline keyboards
pub async fn callback_handler(bot: Bot, q: CallbackQuery, state: Arc<AppState>) -> Result<()> {
    let data = q.data.clone().unwrap_or_default();
    debug!(user_id = %q.from.id, data = %data, "Received callback query from user");

    let result = if state.downloads.is_music_callback(&data) {
        handle_music_choice(&bot, &q, &state, &data).await
    } else if state.downloads.is_tiktok_callback(&data) {
        handle_tiktok_choice(&bot, &q, &state, &data).await
    } else if let Some(raw_id) = data.strip_prefix(DELETE_QUOTE_PREFIX) {
        handle_delete_quote(&bot, &q, &state, raw_id).await
    } else if let Some(raw_id) = data.strip_prefix(DELETE_PHOTO_PREFIX) {
        handle_delete_photo(&bot, &q, &state, raw_id).await
    } else {
        debug!(user_id = %q.from.id, data = %data, "Unknown callback data");
        answer(&bot, &q, t("callback-unknown")).await
    };

    if let Err(e) = result {
        error!(user_id = %q.from.id, data = %data, error = %e, "Callback handling failed");
        // Fails when the query was already answered; nothing more to tell the user then
        if let Err(answer_err) = answer(&bot, &q, failure_message(&e)).await {
            debug!(error = %answer_err, "Could not answer failed callback query");
        }
    }

    Ok(())
}

/// Chat the callback came from, or the user's private chat when the message is gone
fn callback_chat_id(q: &CallbackQuery) -> ChatId {
    q.message
        .as_ref()
        .map(|m| m.chat().id)
        .unwrap_or(ChatId(q.from.id.0 as i64))
}

/// Message carrying the pressed keyboard; `None` for inline-mode messages
fn presentation_message(q: &CallbackQuery) -> Option<(ChatId, MessageId)> {
    q.message.as_ref().map(|m| (m.chat().id, m.id()))
}

async fn answer(bot: &Bot, q: &CallbackQuery, text: String) -> Result<()> {
    bot.answer_callback_query(q.id.clone()).text(text).await?;
    Ok(())
}

/// Replace the text of the message carrying the pressed keyboard
async fn update_presentation(bot: &Bot, q: &CallbackQuery, text: String) {
    if let Some((chat_id, message_id)) = presentation_message(q) {
        if let Err(e) = bot.edit_message_text(chat_id, message_id, text).await {
            warn!(chat_id = %chat_id, error = %e, "Failed to update selection message");
        }
    }
}

/// Final outcome of a selection: edited into the keyboard message, or sent
/// to the presser's chat when there is no message to edit
async fn report_outcome(bot: &Bot, q: &CallbackQuery, text: String) {
    if presentation_message(q).is_some() {
        update_presentation(bot, q, text).await;
        return;
    }

    let chat_id = callback_chat_id(q);
    if let Err(e) = bot.send_message(chat_id, text).await {
        warn!(chat_id = %chat_id, error = %e, "Failed to report selection outcome");
    }
}

/// Tell the presser why their selection was refused
async fn reject_selection(bot: &Bot, q: &CallbackQuery, data: &str, err: BotError) -> Result<()> {
    warn!(
        event = "selection",
        user_id = %q.from.id,
        chat_id = %callback_chat_id(q),
        key = %data,
        kind = err.kind(),
        "Selection rejected"
    );
    bot.answer_callback_query(q.id.clone())
        .text(user_message(&err))
        .show_alert(matches!(err, BotError::Forbidden))
        .await?;
    Ok(())
}

fn log_download_failure(user_id: UserId, chat_id: ChatId, key: &str, err: &BotError) {
    warn!(
        event = "selection",
        user_id = %user_id,
        chat_id = %chat_id,
        key = %key,
        kind = err.kind(),
        error = %err,
        "Selected media could not be downloaded"
    );
}

/// Fetch failure text with a hint that the selection has to be made again
fn fetch_failure_text(err: &BotError) -> String {
    format!("{}\n{}", user_message(err), t("selection-retry-hint"))
}

async fn handle_music_choice(
    bot: &Bot,
    q: &CallbackQuery,
    state: &AppState,
    data: &str,
) -> Result<()> {
    let media = match state.downloads.resolve_music(data, q.from.id.0) {
        Ok(media) => media,
        Err(e) => return reject_selection(bot, q, data, e).await,
    };
    bot.answer_callback_query(q.id.clone()).await?;

    let uploader = media
        .uploader
        .clone()
        .unwrap_or_else(|| t("music-unknown-artist"));
    update_presentation(
        bot,
        q,
        t_args("music-downloading", &[("title", &media.title), ("uploader", &uploader)]),
    )
    .await;

    let chat_id = callback_chat_id(q);
    let user_id = q.from.id.0 as i64;
    match state.downloads.download_music(media).await {
        Ok(delivery) => match send_music(bot, chat_id, state, user_id, &delivery).await {
            Ok(()) => report_outcome(bot, q, t("music-sent")).await,
            Err(e) => {
                error!(user_id, chat_id = %chat_id, error = %e, "Failed to upload selected track");
                report_outcome(bot, q, t("error-send-failed")).await;
            }
        },
        Err(e) => {
            log_download_failure(q.from.id, chat_id, data, &e);
            report_outcome(bot, q, fetch_failure_text(&e)).await;
        }
    }
    Ok(())
}

async fn handle_tiktok_choice(
    bot: &Bot,
    q: &CallbackQuery,
    state: &AppState,
    data: &str,
) -> Result<()> {
    let choice = match state.downloads.resolve_tiktok(data, q.from.id.0) {
        Ok(choice) => choice,
        Err(e) => return reject_selection(bot, q, data, e).await,
    };
    bot.answer_callback_query(q.id.clone()).await?;

    let (downloading_key, sent_key) = match choice.kind {
        MediaKind::Video => ("tiktok-downloading-video", "tiktok-video-sent"),
        MediaKind::Audio => ("tiktok-downloading-audio", "tiktok-audio-sent"),
    };
    update_presentation(bot, q, t(downloading_key)).await;

    let chat_id = callback_chat_id(q);
    let user_id = q.from.id.0 as i64;
    match state.downloads.download_tiktok(choice).await {
        Ok(delivery) => match send_tiktok(bot, chat_id, state, user_id, &delivery).await {
            Ok(()) => report_outcome(bot, q, t(sent_key)).await,
            Err(e) => {
                error!(user_id, chat_id = %chat_id, error = %e, "Failed to upload selected TikTok");
                report_outcome(bot, q, t("error-send-failed")).await;
            }
        },
        Err(e) => {
            log_download_failure(q.from.id, chat_id, data, &e);
            report_outcome(bot, q, fetch_failure_text(&e)).await;
        }
    }
    Ok(())
}

async fn handle_delete_quote(
    bot: &Bot,
    q: &CallbackQuery,
    state: &AppState,
    raw_id: &str,
) -> Result<()> {
    let Ok(quote_id) = raw_id.parse::<i64>() else {
        return answer(bot, q, t("callback-invalid")).await;
    };

    let user_id = q.from.id.0 as i64;
    if db::delete_quote(&state.pool, quote_id, user_id).await? {
        info!(user_id, quote_id, "Quote deleted from keyboard");
        answer(bot, q, t("quote-deleted")).await?;
        update_presentation(bot, q, t("quote-deleted")).await;
    } else {
        answer(bot, q, t("quote-delete-failed")).await?;
    }
    Ok(())
}

async fn handle_delete_photo(
    bot: &Bot,
    q: &CallbackQuery,
    state: &AppState,
    raw_id: &str,
) -> Result<()> {
    let Ok(photo_id) = raw_id.parse::<i64>() else {
        return answer(bot, q, t("callback-invalid")).await;
    };

    let user_id = q.from.id.0 as i64;
    let Some(photo) = db::delete_photo(&state.pool, photo_id, user_id).await? else {
        return answer(bot, q, t("photo-delete-failed")).await;
    };

    if let Some(path) = photo.file_path.as_deref() {
        if let Err(e) = tokio::fs::remove_file(path).await {
            warn!(photo_id, path, error = %e, "Failed to remove saved photo file");
        }
    }
    info!(user_id, photo_id, "Photo deleted from keyboard");

    answer(bot, q, t("photo-deleted")).await?;
    if let Some((chat_id, message_id)) = presentation_message(q) {
        if let Err(e) = bot
            .edit_message_caption(chat_id, message_id)
            .caption(t("photo-deleted"))
            .await
        {
            warn!(photo_id, error = %e, "Failed to update photo caption");
        }
    }
    Ok(())
}

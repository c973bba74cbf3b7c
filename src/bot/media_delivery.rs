//! Upload fetched media to a chat and record what was delivered

use anyhow::Result;
use teloxide::prelude::*;
use teloxide::types::InputFile;
use tracing::{info, warn};

use crate::db;
use crate::downloads::{Delivery, TikTokChoice};
use crate::media::{MediaInfo, MediaKind};

use super::AppState;

/// Send a downloaded track as audio and add it to the user's music history
pub async fn send_music(
    bot: &Bot,
    chat_id: ChatId,
    state: &AppState,
    user_id: i64,
    delivery: &Delivery<MediaInfo>,
) -> Result<()> {
    let media = &delivery.payload;
    let mut request = bot
        .send_audio(chat_id, InputFile::file(delivery.file.path().to_path_buf()))
        .title(media.title.clone());
    if let Some(uploader) = &media.uploader {
        request = request.performer(uploader.clone());
    }
    let sent = request.await?;
    info!(user_id, chat_id = %chat_id, title = %media.title, "Audio delivered");

    let file_id = sent.audio().map(|audio| audio.file.id.0.clone());
    let recorded = db::add_music(
        &state.pool,
        user_id,
        &media.title,
        media.uploader.as_deref(),
        None,
        file_id.as_deref(),
    )
    .await;
    match recorded {
        Ok(_) => {
            let keep = state.config.limits.max_music_per_user;
            if let Err(e) = db::trim_user_music(&state.pool, user_id, keep).await {
                warn!(user_id, error = %e, "Failed to trim music history");
            }
        }
        Err(e) => warn!(user_id, error = %e, "Failed to record delivered track"),
    }
    Ok(())
}

/// Send a downloaded TikTok in the chosen format and record it
pub async fn send_tiktok(
    bot: &Bot,
    chat_id: ChatId,
    state: &AppState,
    user_id: i64,
    delivery: &Delivery<TikTokChoice>,
) -> Result<()> {
    let TikTokChoice { media, kind } = &delivery.payload;
    let file = InputFile::file(delivery.file.path().to_path_buf());

    match kind {
        MediaKind::Video => {
            bot.send_video(chat_id, file)
                .caption(format!("🎬 {}", media.title))
                .supports_streaming(true)
                .await?;
        }
        MediaKind::Audio => {
            let mut request = bot.send_audio(chat_id, file).title(media.title.clone());
            if let Some(uploader) = &media.uploader {
                request = request.performer(uploader.clone());
            }
            request.await?;
        }
    }
    info!(user_id, chat_id = %chat_id, ?kind, url = %media.source_url, "TikTok delivered");

    if let Err(e) = db::add_tiktok(
        &state.pool,
        user_id,
        &media.source_url,
        None,
        Some(&media.title),
    )
    .await
    {
        warn!(user_id, error = %e, "Failed to record delivered TikTok");
    }
    Ok(())
}

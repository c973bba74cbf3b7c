//! UI Builder module for creating keyboards and formatting messages

use reqwest::Url;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};

use crate::db::{Photo, Quote};
use crate::deferred::KeyedButton;
use crate::errors::BotError;
use crate::localization::{t, t_args};
use crate::media::MediaInfo;
use crate::quotes::{format_quote, QuoteStyle};

/// Truncate to at most `max_chars` characters, appending "..." when cut
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() > max_chars {
        let cut: String = text.chars().take(max_chars).collect();
        format!("{cut}...")
    } else {
        text.to_string()
    }
}

/// Lay out keyed buttons `per_row` to a row
pub fn selection_keyboard(buttons: &[KeyedButton], per_row: usize) -> InlineKeyboardMarkup {
    let rows: Vec<Vec<InlineKeyboardButton>> = buttons
        .chunks(per_row.max(1))
        .map(|row| {
            row.iter()
                .map(|b| InlineKeyboardButton::callback(b.label.clone(), b.callback_data.clone()))
                .collect()
        })
        .collect();
    InlineKeyboardMarkup::new(rows)
}

pub fn delete_quote_keyboard(quote_id: i64) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![InlineKeyboardButton::callback(
        t("quote-delete-button"),
        format!("delete_quote_{quote_id}"),
    )]])
}

pub fn delete_photo_keyboard(photo_id: i64) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![InlineKeyboardButton::callback(
        t("photo-delete-button"),
        format!("delete_photo_{photo_id}"),
    )]])
}

/// "Add to group" button for the help message
pub fn add_to_group_keyboard(bot_username: &str) -> Option<InlineKeyboardMarkup> {
    let url = Url::parse(&format!("https://t.me/{bot_username}?startgroup=true")).ok()?;
    Some(InlineKeyboardMarkup::new(vec![vec![InlineKeyboardButton::url(
        t("help-add-to-group"),
        url,
    )]]))
}

/// Render a stored quote in its saved style
pub fn format_quote_record(quote: &Quote) -> String {
    let author = quote
        .author_name
        .clone()
        .unwrap_or_else(|| t("quote-unknown-author"));
    format_quote(&quote.message_text, &author, QuoteStyle::from_db(quote.quote_type))
}

/// Numbered list of music search results
pub fn format_music_results(results: &[MediaInfo]) -> String {
    let mut text = format!("{}\n\n", t("music-found-title"));
    for (i, media) in results.iter().enumerate() {
        let uploader = media
            .uploader
            .clone()
            .unwrap_or_else(|| t("music-unknown-artist"));
        text.push_str(&format!("{}. {} — {}\n", i + 1, media.title, uploader));
    }
    text
}

/// TikTok metadata shown above the format buttons
pub fn format_tiktok_info(media: &MediaInfo) -> String {
    let uploader = media
        .uploader
        .clone()
        .unwrap_or_else(|| t("music-unknown-artist"));
    let duration = media.duration_label();
    t_args(
        "tiktok-info",
        &[
            ("title", media.title.as_str()),
            ("uploader", uploader.as_str()),
            ("duration", duration.as_str()),
        ],
    )
}

pub fn format_photo_caption(photo: &Photo) -> String {
    let mut caption = t_args("photo-caption-id", &[("id", &photo.id.to_string())]);
    if let Some(description) = photo.description.as_deref().filter(|d| !d.is_empty()) {
        caption.push_str(&format!("\n📝 {description}"));
    }
    caption.push_str(&format!("\n🕒 {}", photo.created_at.format("%Y-%m-%d %H:%M")));
    caption
}

/// User-facing text for a recovered error
pub fn user_message(err: &BotError) -> String {
    match err {
        BotError::LimitReached(limit) => {
            t_args("error-limit-reached", &[("limit", &limit.to_string())])
        }
        other => t(other.message_key()),
    }
}

/// User-facing text for any handler failure
pub fn failure_message(err: &anyhow::Error) -> String {
    if let Some(bot_err) = err.downcast_ref::<BotError>() {
        user_message(bot_err)
    } else if err.downcast_ref::<sqlx::Error>().is_some() {
        t("error-repository")
    } else {
        t("error-generic")
    }
}

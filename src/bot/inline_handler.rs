//! Inline Handler module for answering inline-mode queries

use anyhow::Result;
use std::sync::Arc;
use teloxide::prelude::*;
use teloxide::types::{
    FileId, InlineQuery, InlineQueryResult, InlineQueryResultArticle,
    InlineQueryResultCachedPhoto, InputMessageContent, InputMessageContentText,
};
use tracing::{debug, error};

use crate::db::{self, Photo, Quote};
use crate::localization::{t, t_args};

use super::ui_builder::{format_photo_caption, format_quote_record, truncate_chars};
use super::AppState;

/// Results returned per inline query
const INLINE_RESULTS: i64 = 10;
/// Seconds Telegram may cache an inline answer
const INLINE_CACHE_TIME: u32 = 60;
const DESCRIPTION_CHARS: usize = 100;

/// What an inline query asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InlineRequest {
    Quotes,
    Photos,
}

impl InlineRequest {
    /// Empty queries and ones starting with "цитаты" ask for quotes;
    /// ones starting with "photos" ask for saved photos
    pub fn parse(query: &str) -> Option<Self> {
        let query = query.trim().to_lowercase();
        if query.is_empty() || query.starts_with("цитаты") {
            Some(Self::Quotes)
        } else if query.starts_with("photos") || query.starts_with("фото") {
            Some(Self::Photos)
        } else {
            None
        }
    }
}

pub async fn inline_query_handler(
    bot: Bot,
    q: InlineQuery,
    state: Arc<AppState>,
) -> Result<()> {
    debug!(user_id = %q.from.id, query = %q.query, "Received inline query");

    let user_id = q.from.id.0 as i64;
    let results = match InlineRequest::parse(&q.query) {
        Some(InlineRequest::Quotes) => {
            let quotes = db::get_user_quotes(&state.pool, user_id, Some(INLINE_RESULTS)).await?;
            quote_results(&quotes)
        }
        Some(InlineRequest::Photos) => {
            let photos = db::get_user_photos(&state.pool, user_id).await?;
            photo_results(&photos)
        }
        None => Vec::new(),
    };

    if let Err(e) = bot
        .answer_inline_query(q.id.clone(), results)
        .cache_time(INLINE_CACHE_TIME)
        .is_personal(true)
        .await
    {
        error!(user_id = %q.from.id, error = %e, "Failed to answer inline query");
    }
    Ok(())
}

fn quote_results(quotes: &[Quote]) -> Vec<InlineQueryResult> {
    if quotes.is_empty() {
        let article = InlineQueryResultArticle::new(
            "no_quotes",
            t("inline-no-quotes-title"),
            InputMessageContent::Text(InputMessageContentText::new(t("inline-no-quotes-text"))),
        );
        return vec![InlineQueryResult::Article(article)];
    }

    quotes
        .iter()
        .map(|quote| {
            let title = t_args("inline-quote-title", &[("id", &quote.id.to_string())]);
            let article = InlineQueryResultArticle::new(
                format!("quote_{}", quote.id),
                title,
                InputMessageContent::Text(InputMessageContentText::new(format_quote_record(quote))),
            )
            .description(truncate_chars(&quote.message_text, DESCRIPTION_CHARS));
            InlineQueryResult::Article(article)
        })
        .collect()
}

fn photo_results(photos: &[Photo]) -> Vec<InlineQueryResult> {
    photos
        .iter()
        .take(INLINE_RESULTS as usize)
        .map(|photo| {
            let cached = InlineQueryResultCachedPhoto::new(
                format!("photo_{}", photo.id),
                FileId(photo.file_id.clone()),
            )
            .caption(format_photo_caption(photo));
            InlineQueryResult::CachedPhoto(cached)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inline_request_parse() {
        assert_eq!(InlineRequest::parse(""), Some(InlineRequest::Quotes));
        assert_eq!(InlineRequest::parse("  Цитаты "), Some(InlineRequest::Quotes));
        assert_eq!(InlineRequest::parse("цитаты кот"), Some(InlineRequest::Quotes));
        assert_eq!(InlineRequest::parse("photos"), Some(InlineRequest::Photos));
        assert_eq!(InlineRequest::parse("Photos cats"), Some(InlineRequest::Photos));
        assert_eq!(InlineRequest::parse("weather"), None);
    }

    #[test]
    fn test_no_quotes_article() {
        let results = quote_results(&[]);
        assert_eq!(results.len(), 1);
        assert!(matches!(results[0], InlineQueryResult::Article(_)));
    }
}

//! # Error Types Module
//!
//! Failures surfaced by bot operations. Every variant is recovered at the
//! handler boundary and shown to the user through its message key.

use thiserror::Error;

use crate::media::MediaError;
use crate::selection::SelectionError;

/// Bot operation errors
#[derive(Debug, Error)]
pub enum BotError {
    /// Selection key absent, consumed or expired
    #[error("selection expired")]
    NotFound,
    /// Selection belongs to another user
    #[error("selection belongs to another user")]
    Forbidden,
    /// Media-fetch tool failure (network, no results, extraction)
    #[error("upstream failure: {0}")]
    Upstream(#[from] MediaError),
    /// Repository unavailable or query failed
    #[error("repository failure: {0}")]
    Repository(#[from] sqlx::Error),
    /// Per-user storage limit reached
    #[error("limit of {0} records reached")]
    LimitReached(i64),
}

impl From<SelectionError> for BotError {
    fn from(err: SelectionError) -> Self {
        match err {
            SelectionError::NotFound => BotError::NotFound,
            SelectionError::Forbidden => BotError::Forbidden,
        }
    }
}

impl BotError {
    /// Localization key of the user-facing message
    pub fn message_key(&self) -> &'static str {
        match self {
            BotError::NotFound => "error-selection-expired",
            BotError::Forbidden => "error-selection-forbidden",
            BotError::Upstream(MediaError::NoResults) => "error-no-results",
            BotError::Upstream(MediaError::Timeout(_)) => "error-download-timeout",
            BotError::Upstream(_) => "error-download-failed",
            BotError::Repository(_) => "error-repository",
            BotError::LimitReached(_) => "error-limit-reached",
        }
    }

    /// Short label for structured logs
    pub fn kind(&self) -> &'static str {
        match self {
            BotError::NotFound => "not_found",
            BotError::Forbidden => "forbidden",
            BotError::Upstream(_) => "upstream",
            BotError::Repository(_) => "repository",
            BotError::LimitReached(_) => "limit",
        }
    }
}

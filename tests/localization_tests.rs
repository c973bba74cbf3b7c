//! # Localization Tests
//!
//! This module contains unit tests for the localization functionality,
//! checking that every message the bot sends exists in the catalog.

use pororokz_bot::localization::{t, t_args, LocalizationManager};
use std::collections::HashMap;

#[cfg(test)]
mod tests {
    use super::*;

    fn setup_localization() -> LocalizationManager {
        // Create a new localization manager for each test
        LocalizationManager::new().expect("Failed to create localization manager")
    }

    #[test]
    fn test_every_bot_message_is_translated() {
        let manager = setup_localization();
        let keys = [
            "help-text",
            "help-add-to-group",
            "quote-reply-required",
            "quote-text-only",
            "quote-her-reply-required",
            "quote-unknown-author",
            "quote-not-found",
            "quote-none-user",
            "quote-none-author",
            "quote-none-chat",
            "quote-none-user-chat",
            "quote-none-all",
            "quote-id-missing",
            "quote-id-invalid",
            "quote-deleted",
            "quote-delete-failed",
            "quote-delete-button",
            "music-query-hint-command",
            "music-query-hint-text",
            "music-searching",
            "music-searching-options",
            "music-found-title",
            "music-unknown-artist",
            "music-downloading",
            "music-sent",
            "photo-reply-required",
            "photo-not-a-photo",
            "photo-download-failed",
            "photo-saved",
            "photo-saved-description",
            "photos-none",
            "photos-found",
            "photos-more",
            "photo-caption-id",
            "photo-delete-button",
            "photo-deleted",
            "photo-delete-failed",
            "tiktok-processing",
            "tiktok-info",
            "tiktok-button-video",
            "tiktok-button-audio",
            "tiktok-downloading-video",
            "tiktok-downloading-audio",
            "tiktok-video-sent",
            "tiktok-audio-sent",
            "tiktok-untitled",
            "tiktok-random",
            "tiktok-none",
            "inline-quote-title",
            "inline-no-quotes-title",
            "inline-no-quotes-text",
            "callback-unknown",
            "callback-invalid",
            "selection-retry-hint",
            "error-selection-expired",
            "error-selection-forbidden",
            "error-no-results",
            "error-download-timeout",
            "error-download-failed",
            "error-send-failed",
            "error-repository",
            "error-limit-reached",
            "error-generic",
        ];

        let missing: Vec<&str> = keys
            .iter()
            .copied()
            .filter(|key| !manager.has_message(key))
            .collect();
        assert!(missing.is_empty(), "missing translations: {missing:?}");
    }

    #[test]
    fn test_get_message_nonexistent_key() {
        let manager = setup_localization();

        let message = manager.get_message("nonexistent-key", None);
        assert!(message.starts_with("Missing translation:"));
    }

    #[test]
    fn test_get_message_with_map_args() {
        let manager = setup_localization();

        let mut args = HashMap::new();
        args.insert("title", "Shape of You");
        args.insert("uploader", "Ed Sheeran");
        let message = manager.get_message("music-downloading", Some(&args));
        assert!(message.contains("Shape of You"));
        assert!(message.contains("Ed Sheeran"));
    }

    #[test]
    fn test_global_helpers() {
        assert!(t("help-text").contains("/myz"));
        let limit = t_args("error-limit-reached", &[("limit", "100")]);
        assert!(limit.contains("100"));
        assert!(!limit.contains('\u{2069}'));
    }
}

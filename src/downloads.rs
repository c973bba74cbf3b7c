//! # Downloads Module
//!
//! Music and TikTok flows built on the deferred selection protocol, kept free
//! of Telegram types so they can be driven directly in tests.
//!
//! Phase one searches or probes and presents keyed buttons; phase two
//! resolves a press to its payload and fetches the file. A resolved selection
//! is gone even if the fetch then fails: the user has to search again.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::deferred::{DeferredSelection, KeyedButton, SelectionOption, MAX_OPTIONS};
use crate::errors::BotError;
use crate::localization::t;
use crate::media::{FetchedFile, MediaError, MediaFetcher, MediaInfo, MediaKind};
use crate::selection::OwnerId;

pub const MUSIC_NAMESPACE: &str = "mus";
pub const TIKTOK_NAMESPACE: &str = "tt";

/// Option stored behind a TikTok format button
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TikTokChoice {
    pub media: MediaInfo,
    pub kind: MediaKind,
}

/// Search results shown to the user together with their buttons
#[derive(Debug, Clone)]
pub struct MusicPresentation {
    pub results: Vec<MediaInfo>,
    pub buttons: Vec<KeyedButton>,
}

/// Probed TikTok together with its format buttons
#[derive(Debug, Clone)]
pub struct TikTokPresentation {
    pub media: MediaInfo,
    pub buttons: Vec<KeyedButton>,
}

/// A fetched file and the payload it was fetched for
#[derive(Debug)]
pub struct Delivery<T> {
    pub payload: T,
    pub file: FetchedFile,
}

/// Owns both selection stores and the media fetcher for the process lifetime
pub struct DownloadService {
    fetcher: Arc<dyn MediaFetcher>,
    music: DeferredSelection<MediaInfo>,
    tiktok: DeferredSelection<TikTokChoice>,
    search_results: usize,
}

impl DownloadService {
    pub fn new(
        fetcher: Arc<dyn MediaFetcher>,
        selection_ttl: Duration,
        search_results: usize,
    ) -> Self {
        Self {
            fetcher,
            music: DeferredSelection::new(MUSIC_NAMESPACE, selection_ttl),
            tiktok: DeferredSelection::new(TIKTOK_NAMESPACE, selection_ttl),
            search_results,
        }
    }

    pub fn is_music_callback(&self, data: &str) -> bool {
        self.music.owns(data)
    }

    pub fn is_tiktok_callback(&self, data: &str) -> bool {
        self.tiktok.owns(data)
    }

    /// Search and download the single best match for `query`
    pub async fn best_music(&self, query: &str) -> Result<Delivery<MediaInfo>, BotError> {
        let media = self
            .fetcher
            .search(query, 1)
            .await?
            .into_iter()
            .next()
            .ok_or(BotError::Upstream(MediaError::NoResults))?;

        let file = self.fetcher.fetch_audio(&media).await?;
        Ok(Delivery { payload: media, file })
    }

    /// Search for `query` and present every result to `owner`
    pub async fn present_music(
        &self,
        query: &str,
        owner: OwnerId,
    ) -> Result<MusicPresentation, BotError> {
        let mut results = self.fetcher.search(query, self.search_results).await?;
        results.truncate(MAX_OPTIONS);

        let options = results
            .iter()
            .enumerate()
            .map(|(i, media)| SelectionOption::new(format!("🎵 {}", i + 1), media.clone()))
            .collect();
        let buttons = self.music.present_options(options, owner);

        info!(owner, query = %query, options = buttons.len(), "Music options presented");
        Ok(MusicPresentation { results, buttons })
    }

    /// Resolve a music button press without fetching
    pub fn resolve_music(&self, data: &str, user: OwnerId) -> Result<MediaInfo, BotError> {
        Ok(self.music.on_selection_activated(data, user)?.payload)
    }

    /// Probe a TikTok link and present the video/audio choice to `owner`
    pub async fn present_tiktok(
        &self,
        url: &str,
        owner: OwnerId,
    ) -> Result<TikTokPresentation, BotError> {
        let media = self.fetcher.probe(url).await?;

        let options = vec![
            SelectionOption::new(
                t("tiktok-button-video"),
                TikTokChoice { media: media.clone(), kind: MediaKind::Video },
            ),
            SelectionOption::new(
                t("tiktok-button-audio"),
                TikTokChoice { media: media.clone(), kind: MediaKind::Audio },
            ),
        ];
        let buttons = self.tiktok.present_options(options, owner);

        info!(owner, url = %url, "TikTok format choice presented");
        Ok(TikTokPresentation { media, buttons })
    }

    /// Resolve a TikTok format button press without fetching
    pub fn resolve_tiktok(&self, data: &str, user: OwnerId) -> Result<TikTokChoice, BotError> {
        Ok(self.tiktok.on_selection_activated(data, user)?.payload)
    }

    /// Download the track behind a resolved music button
    ///
    /// Resolving and downloading are separate calls so the "downloading"
    /// notice can go out in between.
    pub async fn download_music(&self, media: MediaInfo) -> Result<Delivery<MediaInfo>, BotError> {
        let file = self.fetch(&media, MediaKind::Audio).await?;
        Ok(Delivery { payload: media, file })
    }

    /// Download the format behind a resolved TikTok button
    pub async fn download_tiktok(
        &self,
        choice: TikTokChoice,
    ) -> Result<Delivery<TikTokChoice>, BotError> {
        let file = self.fetch(&choice.media, choice.kind).await?;
        Ok(Delivery { payload: choice, file })
    }

    async fn fetch(&self, media: &MediaInfo, kind: MediaKind) -> Result<FetchedFile, BotError> {
        self.fetcher.fetch(media, kind).await.map_err(|e| {
            warn!(url = %media.source_url, ?kind, error = %e, "Download of selected media failed");
            BotError::from(e)
        })
    }

    /// Drop expired selections from both stores
    pub fn prune_expired(&self) -> usize {
        let removed = self.music.prune_expired() + self.tiktok.prune_expired();
        if removed > 0 {
            debug!(removed, "Pruned expired selections");
        }
        removed
    }

    pub fn pending_selections(&self) -> usize {
        self.music.pending() + self.tiktok.pending()
    }
}

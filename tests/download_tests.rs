//! # Download Flow Tests
//!
//! Drives the music and TikTok selection flows through a fake media fetcher.

use anyhow::Result;
use async_trait::async_trait;
use pororokz_bot::downloads::{
    Delivery, DownloadService, TikTokChoice, MUSIC_NAMESPACE, TIKTOK_NAMESPACE,
};
use pororokz_bot::errors::BotError;
use pororokz_bot::media::{FetchedFile, MediaError, MediaFetcher, MediaInfo, MediaKind};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

const OWNER: u64 = 111;
const STRANGER: u64 = 222;

fn track(n: usize) -> MediaInfo {
    MediaInfo {
        title: format!("Track {n}"),
        uploader: Some(format!("Artist {n}")),
        source_url: format!("https://www.youtube.com/watch?v={n}"),
        duration_seconds: Some(180),
    }
}

/// Fetcher returning canned results and recording every download
struct FakeFetcher {
    results: Vec<MediaInfo>,
    fail_fetch: bool,
    fetched: Mutex<Vec<(String, MediaKind)>>,
}

impl FakeFetcher {
    fn with_results(count: usize) -> Self {
        Self {
            results: (1..=count).map(track).collect(),
            fail_fetch: false,
            fetched: Mutex::new(Vec::new()),
        }
    }

    fn failing(count: usize) -> Self {
        Self {
            fail_fetch: true,
            ..Self::with_results(count)
        }
    }

    fn fetched(&self) -> Vec<(String, MediaKind)> {
        self.fetched.lock().unwrap().clone()
    }
}

#[async_trait]
impl MediaFetcher for FakeFetcher {
    async fn search(&self, _query: &str, max_results: usize) -> Result<Vec<MediaInfo>, MediaError> {
        if self.results.is_empty() {
            return Err(MediaError::NoResults);
        }
        Ok(self.results.iter().take(max_results).cloned().collect())
    }

    async fn probe(&self, url: &str) -> Result<MediaInfo, MediaError> {
        Ok(MediaInfo {
            title: "dance".to_string(),
            uploader: Some("tiktoker".to_string()),
            source_url: url.to_string(),
            duration_seconds: Some(15),
        })
    }

    async fn fetch(&self, media: &MediaInfo, kind: MediaKind) -> Result<FetchedFile, MediaError> {
        self.fetched
            .lock()
            .unwrap()
            .push((media.source_url.clone(), kind));
        if self.fail_fetch {
            return Err(MediaError::Failed("ERROR: network unreachable".to_string()));
        }

        let workdir = TempDir::new()?;
        let path = workdir.path().join(format!("{}.bin", media.title));
        std::fs::write(&path, media.title.as_bytes())?;
        Ok(FetchedFile::new(path, workdir))
    }
}

fn service(fetcher: &Arc<FakeFetcher>, ttl: Duration) -> DownloadService {
    DownloadService::new(fetcher.clone(), ttl, 5)
}

/// Music button press as the callback handler runs it: resolve, then download
async fn press_music(
    downloads: &DownloadService,
    data: &str,
    user: u64,
) -> Result<Delivery<MediaInfo>, BotError> {
    let media = downloads.resolve_music(data, user)?;
    downloads.download_music(media).await
}

/// TikTok button press as the callback handler runs it: resolve, then download
async fn press_tiktok(
    downloads: &DownloadService,
    data: &str,
    user: u64,
) -> Result<Delivery<TikTokChoice>, BotError> {
    let choice = downloads.resolve_tiktok(data, user)?;
    downloads.download_tiktok(choice).await
}

#[tokio::test]
async fn test_pick_third_of_five_downloads_third() -> Result<()> {
    let fetcher = Arc::new(FakeFetcher::with_results(8));
    let downloads = service(&fetcher, Duration::from_secs(600));

    let presentation = downloads.present_music("shape of you", OWNER).await?;
    assert_eq!(presentation.results.len(), 5);
    assert_eq!(presentation.buttons.len(), 5);
    for button in &presentation.buttons {
        assert!(button.callback_data.starts_with(&format!("{MUSIC_NAMESPACE}:")));
        assert!(downloads.is_music_callback(&button.callback_data));
        assert!(button.callback_data.len() <= 64);
    }

    let delivery = press_music(&downloads, &presentation.buttons[2].callback_data, OWNER).await?;
    assert_eq!(delivery.payload, track(3));
    assert_eq!(std::fs::read_to_string(delivery.file.path())?, "Track 3");
    assert_eq!(fetcher.fetched(), vec![(track(3).source_url, MediaKind::Audio)]);

    Ok(())
}

#[tokio::test]
async fn test_other_user_is_refused_without_fetch() -> Result<()> {
    let fetcher = Arc::new(FakeFetcher::with_results(5));
    let downloads = service(&fetcher, Duration::from_secs(600));
    let presentation = downloads.present_music("song", OWNER).await?;
    let data = &presentation.buttons[0].callback_data;

    let refused = press_music(&downloads, data, STRANGER).await;
    assert!(matches!(refused, Err(BotError::Forbidden)));
    assert!(fetcher.fetched().is_empty());

    // The owner can still use the button afterwards
    let delivery = press_music(&downloads, data, OWNER).await?;
    assert_eq!(delivery.payload, track(1));
    Ok(())
}

#[tokio::test]
async fn test_double_tap_downloads_once() -> Result<()> {
    let fetcher = Arc::new(FakeFetcher::with_results(5));
    let downloads = service(&fetcher, Duration::from_secs(600));
    let presentation = downloads.present_music("song", OWNER).await?;
    let data = &presentation.buttons[1].callback_data;

    press_music(&downloads, data, OWNER).await?;
    let second = press_music(&downloads, data, OWNER).await;
    assert!(matches!(second, Err(BotError::NotFound)));
    assert_eq!(fetcher.fetched().len(), 1);

    Ok(())
}

#[tokio::test]
async fn test_choosing_one_option_consumes_its_siblings() -> Result<()> {
    let fetcher = Arc::new(FakeFetcher::with_results(5));
    let downloads = service(&fetcher, Duration::from_secs(600));
    let presentation = downloads.present_music("song", OWNER).await?;
    assert_eq!(downloads.pending_selections(), 5);

    downloads.resolve_music(&presentation.buttons[0].callback_data, OWNER)?;
    assert_eq!(downloads.pending_selections(), 0);
    assert!(matches!(
        downloads.resolve_music(&presentation.buttons[4].callback_data, OWNER),
        Err(BotError::NotFound)
    ));
    Ok(())
}

#[tokio::test]
async fn test_failed_fetch_does_not_restore_selection() -> Result<()> {
    let fetcher = Arc::new(FakeFetcher::failing(5));
    let downloads = service(&fetcher, Duration::from_secs(600));
    let presentation = downloads.present_music("song", OWNER).await?;
    let data = &presentation.buttons[0].callback_data;

    let failed = press_music(&downloads, data, OWNER).await;
    assert!(matches!(failed, Err(BotError::Upstream(MediaError::Failed(_)))));

    let retried = press_music(&downloads, data, OWNER).await;
    assert!(matches!(retried, Err(BotError::NotFound)));
    assert_eq!(fetcher.fetched().len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_no_results_reported() {
    let fetcher = Arc::new(FakeFetcher::with_results(0));
    let downloads = service(&fetcher, Duration::from_secs(600));

    let presented = downloads.present_music("nothing", OWNER).await;
    assert!(matches!(presented, Err(BotError::Upstream(MediaError::NoResults))));
    assert_eq!(downloads.pending_selections(), 0);

    let best = downloads.best_music("nothing").await;
    assert!(matches!(best, Err(BotError::Upstream(MediaError::NoResults))));
}

#[tokio::test]
async fn test_best_music_downloads_first_result() -> Result<()> {
    let fetcher = Arc::new(FakeFetcher::with_results(3));
    let downloads = service(&fetcher, Duration::from_secs(600));

    let delivery = downloads.best_music("song").await?;
    assert_eq!(delivery.payload, track(1));
    assert_eq!(downloads.pending_selections(), 0);
    Ok(())
}

#[tokio::test]
async fn test_tiktok_choice_fetches_chosen_format() -> Result<()> {
    let fetcher = Arc::new(FakeFetcher::with_results(0));
    let downloads = service(&fetcher, Duration::from_secs(600));
    let url = "https://www.tiktok.com/@user/video/123";

    let presentation = downloads.present_tiktok(url, OWNER).await?;
    assert_eq!(presentation.media.title, "dance");
    assert_eq!(presentation.buttons.len(), 2);
    assert!(presentation
        .buttons
        .iter()
        .all(|b| b.callback_data.starts_with(&format!("{TIKTOK_NAMESPACE}:"))));
    assert!(!downloads.is_music_callback(&presentation.buttons[0].callback_data));

    let delivery = press_tiktok(&downloads, &presentation.buttons[1].callback_data, OWNER).await?;
    assert_eq!(delivery.payload.kind, MediaKind::Audio);
    assert_eq!(fetcher.fetched(), vec![(url.to_string(), MediaKind::Audio)]);

    assert!(matches!(
        downloads.resolve_tiktok(&presentation.buttons[0].callback_data, OWNER),
        Err(BotError::NotFound)
    ));
    Ok(())
}

#[tokio::test]
async fn test_tiktok_choice_refused_for_other_user_without_fetch() -> Result<()> {
    let fetcher = Arc::new(FakeFetcher::with_results(0));
    let downloads = service(&fetcher, Duration::from_secs(600));
    let presentation = downloads
        .present_tiktok("https://vm.tiktok.com/ZMabc123", OWNER)
        .await?;
    let audio = &presentation.buttons[1].callback_data;

    let refused = press_tiktok(&downloads, audio, STRANGER).await;
    assert!(matches!(refused, Err(BotError::Forbidden)));
    assert!(fetcher.fetched().is_empty());

    let choice = downloads.resolve_tiktok(audio, OWNER)?;
    assert_eq!(choice.kind, MediaKind::Audio);
    Ok(())
}

#[tokio::test]
async fn test_expired_selection_is_pruned_and_refused() -> Result<()> {
    let fetcher = Arc::new(FakeFetcher::with_results(5));
    let downloads = service(&fetcher, Duration::from_millis(30));
    let presentation = downloads.present_music("song", OWNER).await?;

    tokio::time::sleep(Duration::from_millis(60)).await;
    assert_eq!(downloads.prune_expired(), 5);
    assert_eq!(downloads.pending_selections(), 0);

    let expired = press_music(&downloads, &presentation.buttons[0].callback_data, OWNER).await;
    assert!(matches!(expired, Err(BotError::NotFound)));
    assert!(fetcher.fetched().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_unknown_callback_data_not_claimed() {
    let fetcher = Arc::new(FakeFetcher::with_results(1));
    let downloads = service(&fetcher, Duration::from_secs(600));

    assert!(!downloads.is_music_callback("delete_quote_5"));
    assert!(!downloads.is_tiktok_callback("music_0"));
    assert!(matches!(
        downloads.resolve_music("mus:not-a-real-key", OWNER),
        Err(BotError::NotFound)
    ));
}

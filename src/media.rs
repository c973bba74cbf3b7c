//! # Media Fetch Module
//!
//! Search and download of audio/video through the external `yt-dlp` tool.
//!
//! The bot talks to the tool only through the [`MediaFetcher`] trait so the
//! selection flows can be exercised without spawning processes. The
//! production [`YtDlpFetcher`] runs every invocation under a timeout, retries
//! transient network failures a bounded number of times with jittered
//! backoff, and downloads into a per-call temporary directory that is removed
//! when the returned [`FetchedFile`] (or a failed attempt) is dropped.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use serde::Deserialize;
use tempfile::TempDir;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::config::MediaConfig;

/// Patterns indicating transient errors that might be resolved with retry
const RETRYABLE_ERROR_PATTERNS: &[&str] = &[
    "Connection reset",
    "Connection timed out",
    "Unable to download webpage",
    "HTTP Error 429",
    "HTTP Error 500",
    "HTTP Error 502",
    "HTTP Error 503",
    "Read timed out",
    "network is unreachable",
    "Temporary failure in name resolution",
];

/// Check if error output indicates a retryable error
fn is_retryable_output(error_msg: &str) -> bool {
    RETRYABLE_ERROR_PATTERNS
        .iter()
        .any(|pattern| error_msg.contains(pattern))
}

/// Errors raised by the media-fetch tool
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("no results found")]
    NoResults,
    #[error("media tool timed out after {0:?}")]
    Timeout(Duration),
    #[error("media tool failed: {0}")]
    Failed(String),
    #[error("media tool I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("unexpected media tool output: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("media tool produced no file")]
    MissingOutput,
}

impl MediaError {
    /// Whether another attempt may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, MediaError::Failed(msg) if is_retryable_output(msg))
    }
}

/// Metadata of one search result or probed link
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaInfo {
    pub title: String,
    pub uploader: Option<String>,
    pub source_url: String,
    pub duration_seconds: Option<u64>,
}

impl MediaInfo {
    /// Duration formatted as `m:ss`, or `?` when unknown
    pub fn duration_label(&self) -> String {
        match self.duration_seconds {
            Some(secs) => format!("{}:{:02}", secs / 60, secs % 60),
            None => "?".to_string(),
        }
    }
}

/// Output format requested from the tool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    /// mp3 audio track
    Audio,
    /// mp4 video, at most 720p
    Video,
}

/// A downloaded file living in its own temporary directory
///
/// The directory and everything in it are deleted on drop.
#[derive(Debug)]
pub struct FetchedFile {
    path: PathBuf,
    _workdir: TempDir,
}

impl FetchedFile {
    pub fn new(path: PathBuf, workdir: TempDir) -> Self {
        Self {
            path,
            _workdir: workdir,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Black-box media search and download
#[async_trait]
pub trait MediaFetcher: Send + Sync {
    /// Search for up to `max_results` items matching `query`
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<MediaInfo>, MediaError>;

    /// Read metadata of a single link without downloading it
    async fn probe(&self, url: &str) -> Result<MediaInfo, MediaError>;

    /// Download `media` in the requested format
    async fn fetch(&self, media: &MediaInfo, kind: MediaKind) -> Result<FetchedFile, MediaError>;

    async fn fetch_audio(&self, media: &MediaInfo) -> Result<FetchedFile, MediaError> {
        self.fetch(media, MediaKind::Audio).await
    }
}

/// Raw JSON record printed by `yt-dlp -j`
#[derive(Debug, Deserialize)]
struct YtDlpRecord {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    uploader: Option<String>,
    #[serde(default)]
    channel: Option<String>,
    #[serde(default)]
    webpage_url: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    duration: Option<f64>,
}

impl YtDlpRecord {
    fn into_media_info(self) -> Option<MediaInfo> {
        let source_url = self.webpage_url.or(self.url)?;
        Some(MediaInfo {
            title: self.title.unwrap_or_else(|| "Unknown".to_string()),
            uploader: self.uploader.or(self.channel),
            source_url,
            duration_seconds: self
                .duration
                .filter(|d| d.is_finite() && *d >= 0.0)
                .map(|d| d.round() as u64),
        })
    }
}

/// Parse newline-delimited JSON search output, skipping unusable lines
pub fn parse_search_output(stdout: &str) -> Vec<MediaInfo> {
    stdout
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| match serde_json::from_str::<YtDlpRecord>(line) {
            Ok(record) => record.into_media_info(),
            Err(e) => {
                warn!(error = %e, "Skipping unparsable search result line");
                None
            }
        })
        .collect()
}

/// Parse the single JSON document printed for a probed link
pub fn parse_probe_output(stdout: &str) -> Result<MediaInfo, MediaError> {
    let record: YtDlpRecord = serde_json::from_str(stdout.trim())?;
    record.into_media_info().ok_or(MediaError::NoResults)
}

/// Backoff before retry number `attempt` (0-based): exponential, capped, jittered
pub fn retry_delay(config: &MediaConfig, attempt: u32) -> Duration {
    let exp = config
        .base_retry_delay_ms
        .saturating_mul(1u64 << attempt.min(16));
    let capped = exp.min(config.max_retry_delay_ms);
    let jitter_span = config.base_retry_delay_ms / 4;
    let jitter = if jitter_span > 0 {
        rand::thread_rng().gen_range(0..=jitter_span)
    } else {
        0
    };
    Duration::from_millis(capped + jitter)
}

/// [`MediaFetcher`] backed by the `yt-dlp` executable
#[derive(Debug, Clone)]
pub struct YtDlpFetcher {
    config: MediaConfig,
}

impl YtDlpFetcher {
    pub fn new(config: MediaConfig) -> Self {
        Self { config }
    }

    fn common_args(&self) -> Vec<String> {
        let mut args = vec!["--no-warnings".to_string()];
        if let Some(cookies) = &self.config.cookies_file {
            args.push("--cookies".to_string());
            args.push(cookies.to_string_lossy().into_owned());
        }
        args
    }

    /// Run the tool once, bounded by the configured timeout
    async fn run_once(&self, args: &[String]) -> Result<String, MediaError> {
        let timeout = self.config.operation_timeout();
        debug!(tool = %self.config.ytdlp_path, ?args, "Executing media tool");

        let child = Command::new(&self.config.ytdlp_path)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output();

        let output = tokio::time::timeout(timeout, child)
            .await
            .map_err(|_| MediaError::Timeout(timeout))??;

        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).into_owned())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let message = stderr
                .lines()
                .rev()
                .find(|line| !line.trim().is_empty())
                .unwrap_or("exited with failure")
                .trim()
                .to_string();
            Err(MediaError::Failed(message))
        }
    }

    /// Run the tool, retrying transient failures
    async fn run(&self, args: &[String]) -> Result<String, MediaError> {
        let mut attempt = 0;
        loop {
            match self.run_once(args).await {
                Ok(stdout) => return Ok(stdout),
                Err(e) if e.is_retryable() && attempt < self.config.max_retries => {
                    let delay = retry_delay(&self.config, attempt);
                    warn!(
                        error = %e,
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        "Retrying media tool after transient failure"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[async_trait]
impl MediaFetcher for YtDlpFetcher {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<MediaInfo>, MediaError> {
        let mut args = self.common_args();
        args.extend([
            "-j".to_string(),
            "--flat-playlist".to_string(),
            format!("ytsearch{}:{}", max_results.max(1), query),
        ]);

        let results = parse_search_output(&self.run(&args).await?);
        info!(query = %query, results = results.len(), "Media search completed");
        if results.is_empty() {
            return Err(MediaError::NoResults);
        }
        Ok(results)
    }

    async fn probe(&self, url: &str) -> Result<MediaInfo, MediaError> {
        let mut args = self.common_args();
        args.extend([
            "-j".to_string(),
            "--no-playlist".to_string(),
            "--user-agent".to_string(),
            self.config.user_agent.clone(),
            url.to_string(),
        ]);

        parse_probe_output(&self.run(&args).await?)
    }

    async fn fetch(&self, media: &MediaInfo, kind: MediaKind) -> Result<FetchedFile, MediaError> {
        let workdir = tempfile::Builder::new().prefix("pororokz-media-").tempdir()?;
        let template = workdir.path().join("%(id)s.%(ext)s");

        let mut args = self.common_args();
        match kind {
            MediaKind::Audio => args.extend(
                ["-f", "bestaudio/best", "-x", "--audio-format", "mp3", "--audio-quality", "192K"]
                    .map(String::from),
            ),
            MediaKind::Video => args.extend(
                ["-f", "bestvideo[height<=720]+bestaudio/best", "--merge-output-format", "mp4"]
                    .map(String::from),
            ),
        }
        args.extend([
            "--no-playlist".to_string(),
            "--user-agent".to_string(),
            self.config.user_agent.clone(),
            "-o".to_string(),
            template.to_string_lossy().into_owned(),
            "--print".to_string(),
            "after_move:filepath".to_string(),
            media.source_url.clone(),
        ]);

        // Dropping `workdir` on any error path removes partial artifacts.
        let stdout = self.run(&args).await?;
        let path = stdout
            .lines()
            .rev()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .map(PathBuf::from)
            .filter(|path| path.is_file())
            .ok_or(MediaError::MissingOutput)?;

        info!(url = %media.source_url, ?kind, path = %path.display(), "Media downloaded");
        Ok(FetchedFile::new(path, workdir))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_flat_search_output() {
        let stdout = concat!(
            r#"{"id":"JGwWNGJdvx8","title":"Shape of You","channel":"Ed Sheeran","url":"https://www.youtube.com/watch?v=JGwWNGJdvx8","duration":263.0}"#,
            "\n",
            "not json\n",
            r#"{"id":"x","title":"No link"}"#,
            "\n",
            r#"{"title":"Cover","uploader":"Someone","webpage_url":"https://www.youtube.com/watch?v=abc","url":"https://cdn.example/abc"}"#,
            "\n"
        );

        let results = parse_search_output(stdout);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].title, "Shape of You");
        assert_eq!(results[0].uploader.as_deref(), Some("Ed Sheeran"));
        assert_eq!(results[0].duration_seconds, Some(263));
        assert_eq!(results[1].source_url, "https://www.youtube.com/watch?v=abc");
        assert_eq!(results[1].duration_seconds, None);
    }

    #[test]
    fn test_parse_probe_output() {
        let info = parse_probe_output(
            r#"{"title":"dance","uploader":"user1","webpage_url":"https://www.tiktok.com/@user1/video/123","duration":14.6}"#,
        )
        .unwrap();
        assert_eq!(info.title, "dance");
        assert_eq!(info.duration_label(), "0:15");

        assert!(matches!(parse_probe_output("{}"), Err(MediaError::NoResults)));
        assert!(matches!(parse_probe_output("oops"), Err(MediaError::Parse(_))));
    }

    #[test]
    fn test_retryable_classification() {
        assert!(
            MediaError::Failed("ERROR: HTTP Error 503: Service Unavailable".into()).is_retryable()
        );
        assert!(!MediaError::Failed("ERROR: Private video".into()).is_retryable());
        assert!(!MediaError::Timeout(Duration::from_secs(1)).is_retryable());
        assert!(!MediaError::NoResults.is_retryable());
    }

    #[test]
    fn test_retry_delay_bounded() {
        let config = MediaConfig::default();
        let jitter = config.base_retry_delay_ms / 4;
        for attempt in 0..10 {
            let delay = retry_delay(&config, attempt).as_millis() as u64;
            assert!(delay >= config.base_retry_delay_ms.min(config.max_retry_delay_ms));
            assert!(delay <= config.max_retry_delay_ms + jitter);
        }
    }

    #[tokio::test]
    async fn test_missing_tool_reports_io_error() {
        let fetcher = YtDlpFetcher::new(MediaConfig {
            ytdlp_path: "/nonexistent/yt-dlp-binary".to_string(),
            ..MediaConfig::default()
        });

        let err = fetcher.search("anything", 1).await.unwrap_err();
        assert!(matches!(err, MediaError::Io(_)));
    }
}

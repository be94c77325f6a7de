//! Media acquisition: turning a request source into a local media file.
//!
//! Uploads are written straight to the request's scratch directory. Remote
//! URLs go through an ordered list of acquisition strategies with fallback:
//! each strategy is a materially different code path (not a retry of the
//! same one), so the chain is bounded, ordered and non-randomized. Only a
//! typed [`StrategyError`] advances the chain; anything else propagates.

mod direct;
mod ytdlp;

pub use direct::DirectHttpStrategy;
pub use ytdlp::YtDlpStrategy;

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

/// Input to a transcription request. Immutable, consumed by the acquirer.
#[derive(Debug, Clone)]
pub enum MediaSource {
    /// A remote video URL to download.
    RemoteUrl(String),
    /// An uploaded media payload with its declared extension.
    Upload {
        filename: String,
        bytes: Vec<u8>,
        extension: String,
    },
}

impl MediaSource {
    /// The descriptor stored on the resulting transcript: the URL or the
    /// uploaded filename.
    pub fn descriptor(&self) -> &str {
        match self {
            MediaSource::RemoteUrl(url) => url,
            MediaSource::Upload { filename, .. } => filename,
        }
    }
}

/// A local media file produced by acquisition.
///
/// The file exists and is non-empty at the moment of handoff to the
/// normalizer; it lives inside the request's scratch directory and must not
/// be read after the janitor releases that directory.
#[derive(Debug, Clone)]
pub struct AcquiredMedia {
    pub path: PathBuf,
    /// Declared or detected container extension, without the dot.
    pub extension: String,
    pub size_bytes: u64,
    /// Title extracted by the downloader, when the strategy provides one.
    pub title: Option<String>,
}

/// A single strategy's typed failure. These advance the fallback chain.
#[derive(Debug, thiserror::Error)]
pub enum StrategyError {
    #[error("malformed URL: {0}")]
    MalformedUrl(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("no audio stream available: {0}")]
    NoAudioStream(String),

    #[error("extraction failed: {0}")]
    Extraction(String),

    #[error("downloader produced an empty file")]
    EmptyResult,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Acquisition failure surfaced to the pipeline.
#[derive(Debug, thiserror::Error)]
pub enum AcquireError {
    #[error("empty or unreadable uploaded payload")]
    InvalidUpload,

    #[error("all acquisition strategies failed: {0}")]
    Exhausted(#[source] StrategyError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// One concrete method of turning a remote URL into a local media file.
///
/// Implementations write only inside the `work_dir` they are given and must
/// verify the result is non-empty before returning.
#[async_trait]
pub trait AcquireStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    async fn acquire(&self, url: &str, work_dir: &Path) -> Result<AcquiredMedia, StrategyError>;
}

/// Obtains a local media payload from an upload or a remote URL.
pub struct MediaAcquirer {
    strategies: Vec<Box<dyn AcquireStrategy>>,
}

impl MediaAcquirer {
    /// Default chain: yt-dlp first (format negotiation + metadata), direct
    /// HTTP streaming as the fallback.
    pub fn new(ytdlp_binary: &str) -> Self {
        Self::with_strategies(vec![
            Box::new(YtDlpStrategy::new(ytdlp_binary)),
            Box::new(DirectHttpStrategy::new()),
        ])
    }

    pub fn with_strategies(strategies: Vec<Box<dyn AcquireStrategy>>) -> Self {
        Self { strategies }
    }

    /// Acquire a local media file for `source`, writing into `work_dir`.
    ///
    /// Remote URLs try each strategy in order inside its own subdirectory; a
    /// failed strategy's subdirectory is removed before the next one runs so
    /// disk usage stays bounded during fallback.
    pub async fn acquire(
        &self,
        source: &MediaSource,
        work_dir: &Path,
    ) -> Result<AcquiredMedia, AcquireError> {
        match source {
            MediaSource::Upload {
                filename,
                bytes,
                extension,
            } => self.write_upload(filename, bytes, extension, work_dir).await,
            MediaSource::RemoteUrl(url) => self.download(url, work_dir).await,
        }
    }

    async fn write_upload(
        &self,
        filename: &str,
        bytes: &[u8],
        extension: &str,
        work_dir: &Path,
    ) -> Result<AcquiredMedia, AcquireError> {
        // Rejected before any filesystem write.
        if bytes.is_empty() {
            return Err(AcquireError::InvalidUpload);
        }

        let extension = extension.trim_start_matches('.');
        let extension = if extension.is_empty() { "bin" } else { extension };
        let path = work_dir.join(format!("upload.{}", extension));

        let mut file = tokio::fs::File::create(&path).await?;
        file.write_all(bytes).await?;
        file.flush().await?;

        log::info!(
            "acquire: wrote upload '{}' ({} bytes) to {}",
            filename,
            bytes.len(),
            path.display()
        );

        Ok(AcquiredMedia {
            path,
            extension: extension.to_string(),
            size_bytes: bytes.len() as u64,
            title: Some(filename.to_string()),
        })
    }

    async fn download(&self, url: &str, work_dir: &Path) -> Result<AcquiredMedia, AcquireError> {
        let mut last_err: Option<StrategyError> = None;

        for (index, strategy) in self.strategies.iter().enumerate() {
            let attempt_dir = work_dir.join(format!("attempt-{}-{}", index, strategy.name()));
            tokio::fs::create_dir_all(&attempt_dir).await?;

            log::info!("acquire: trying strategy '{}' for {}", strategy.name(), url);
            match strategy.acquire(url, &attempt_dir).await {
                Ok(media) => {
                    debug_assert!(media.size_bytes > 0);
                    log::info!(
                        "acquire: strategy '{}' produced {} ({} bytes)",
                        strategy.name(),
                        media.path.display(),
                        media.size_bytes
                    );
                    return Ok(media);
                }
                Err(e) => {
                    log::warn!("acquire: strategy '{}' failed: {}", strategy.name(), e);
                    // Drop this strategy's partial artifacts before moving on.
                    if let Err(rm) = tokio::fs::remove_dir_all(&attempt_dir).await {
                        log::warn!(
                            "acquire: failed to remove {}: {}",
                            attempt_dir.display(),
                            rm
                        );
                    }
                    last_err = Some(e);
                }
            }
        }

        Err(AcquireError::Exhausted(last_err.unwrap_or(
            StrategyError::Extraction("no acquisition strategies configured".to_string()),
        )))
    }
}

/// Verify a downloaded file exists and is non-empty; a zero-byte result is a
/// strategy failure, never a success.
pub(crate) fn verify_non_empty(path: &Path) -> Result<u64, StrategyError> {
    let size = std::fs::metadata(path).map(|m| m.len()).unwrap_or(0);
    if size == 0 {
        return Err(StrategyError::EmptyResult);
    }
    Ok(size)
}

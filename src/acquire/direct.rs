//! Fallback acquisition strategy: direct HTTP streaming.
//!
//! A much simpler path than yt-dlp: fetch the URL body as-is and stream it
//! to disk. Works for plain media URLs (e.g. a hosted .mp4) where the
//! general-purpose downloader is unnecessary or unavailable.

use super::{verify_non_empty, AcquireStrategy, AcquiredMedia, StrategyError};
use async_trait::async_trait;
use futures_util::StreamExt;
use std::path::Path;
use std::time::Duration;
use tokio::io::AsyncWriteExt;

const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(300);

pub struct DirectHttpStrategy {
    client: reqwest::Client,
}

impl DirectHttpStrategy {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(DOWNLOAD_TIMEOUT)
            .build()
            .expect("Failed to create HTTP client");
        Self { client }
    }

    /// Guess a container extension from the URL path; the normalizer probes
    /// the real container anyway, so "bin" is an acceptable default.
    fn extension_from_url(url: &reqwest::Url) -> String {
        Path::new(url.path())
            .extension()
            .and_then(|e| e.to_str())
            .filter(|e| !e.is_empty() && e.len() <= 5)
            .unwrap_or("bin")
            .to_string()
    }
}

impl Default for DirectHttpStrategy {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AcquireStrategy for DirectHttpStrategy {
    fn name(&self) -> &'static str {
        "direct-http"
    }

    async fn acquire(&self, url: &str, work_dir: &Path) -> Result<AcquiredMedia, StrategyError> {
        let parsed = reqwest::Url::parse(url)
            .map_err(|e| StrategyError::MalformedUrl(format!("{}: {}", url, e)))?;
        let extension = Self::extension_from_url(&parsed);

        let response = self
            .client
            .get(parsed)
            .send()
            .await
            .map_err(|e| StrategyError::Network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(StrategyError::Network(format!(
                "HTTP {} fetching {}",
                response.status(),
                url
            )));
        }

        let path = work_dir.join(format!("direct.{}", extension));
        let mut file = tokio::fs::File::create(&path).await?;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| StrategyError::Network(e.to_string()))?;
            file.write_all(&chunk).await?;
        }
        file.flush().await?;

        let size_bytes = verify_non_empty(&path)?;
        Ok(AcquiredMedia {
            path,
            extension,
            size_bytes,
            title: None,
        })
    }
}

//! Primary acquisition strategy: the yt-dlp downloader.
//!
//! yt-dlp handles format/quality negotiation across hundreds of sites and
//! gives us the media title for free. We ask it to print the title and the
//! final file path on stdout so no filename guessing is needed.

use super::{verify_non_empty, AcquireStrategy, AcquiredMedia, StrategyError};
use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

pub struct YtDlpStrategy {
    binary: String,
}

impl YtDlpStrategy {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// Map yt-dlp's stderr onto the typed strategy failures so the fallback
    /// chain only advances on conditions it is meant to absorb.
    fn classify_failure(stderr: &str) -> StrategyError {
        let lower = stderr.to_lowercase();
        if lower.contains("is not a valid url") || lower.contains("unsupported url") {
            StrategyError::MalformedUrl(first_line(stderr))
        } else if lower.contains("requested format is not available")
            || lower.contains("no video formats")
        {
            StrategyError::NoAudioStream(first_line(stderr))
        } else if lower.contains("http error")
            || lower.contains("unable to download")
            || lower.contains("connection")
            || lower.contains("timed out")
        {
            StrategyError::Network(first_line(stderr))
        } else {
            StrategyError::Extraction(first_line(stderr))
        }
    }
}

fn first_line(text: &str) -> String {
    text.lines()
        .find(|l| !l.trim().is_empty())
        .unwrap_or("unknown error")
        .trim()
        .to_string()
}

#[async_trait]
impl AcquireStrategy for YtDlpStrategy {
    fn name(&self) -> &'static str {
        "yt-dlp"
    }

    async fn acquire(&self, url: &str, work_dir: &Path) -> Result<AcquiredMedia, StrategyError> {
        let output_template = work_dir.join("media.%(ext)s");

        // --no-simulate keeps the download while --print gives us
        // "<title>\n<filepath>" on stdout.
        let output = Command::new(&self.binary)
            .arg("--no-playlist")
            .arg("--no-progress")
            .arg("--no-simulate")
            .arg("-f")
            .arg("bestaudio/best")
            .arg("-o")
            .arg(&output_template)
            .arg("--print")
            .arg("title")
            .arg("--print")
            .arg("after_move:filepath")
            .arg(url)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| StrategyError::Extraction(format!("failed to run yt-dlp: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Self::classify_failure(&stderr));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let mut lines = stdout.lines().filter(|l| !l.trim().is_empty());
        let title = lines.next().map(|l| l.trim().to_string());
        let path = lines
            .next()
            .map(|l| Path::new(l.trim()).to_path_buf())
            .ok_or_else(|| {
                StrategyError::Extraction("yt-dlp did not report an output file".to_string())
            })?;

        let size_bytes = verify_non_empty(&path)?;
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("bin")
            .to_string();

        Ok(AcquiredMedia {
            path,
            extension,
            size_bytes,
            title,
        })
    }
}

//! Audio normalization to the canonical engine input format.
//!
//! Whatever container or codec acquisition produced, audio-only or with a
//! video track, is decoded with ffmpeg and re-encoded to 16 kHz mono
//! 16-bit PCM WAV, the single representation all downstream stages assume.
//! The input file is never mutated; the normalized WAV is a new artifact
//! inside the same scratch directory.

use crate::acquire::AcquiredMedia;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

/// Canonical sample rate expected by both engine variants.
pub const CANONICAL_SAMPLE_RATE: u32 = 16_000;

/// Canonical mono PCM audio plus its duration.
#[derive(Debug, Clone)]
pub struct NormalizedAudio {
    pub path: PathBuf,
    /// Decoded duration in seconds; always > 0 for a successful normalize.
    pub duration_seconds: f64,
}

#[derive(Debug, thiserror::Error)]
pub enum NormalizeError {
    #[error("unsupported media format: {0}")]
    UnsupportedFormat(String),

    #[error("media decoded to zero duration")]
    EmptyMedia,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Converts acquired media into [`NormalizedAudio`] via ffmpeg.
pub struct AudioNormalizer {
    ffmpeg_binary: String,
}

impl AudioNormalizer {
    pub fn new(ffmpeg_binary: impl Into<String>) -> Self {
        Self {
            ffmpeg_binary: ffmpeg_binary.into(),
        }
    }

    /// Decode `media` and re-encode it as canonical WAV inside `work_dir`.
    ///
    /// Any decode failure maps to [`NormalizeError::UnsupportedFormat`]; a
    /// decode that succeeds but yields zero duration maps to
    /// [`NormalizeError::EmptyMedia`].
    pub async fn normalize(
        &self,
        media: &AcquiredMedia,
        work_dir: &Path,
    ) -> Result<NormalizedAudio, NormalizeError> {
        let output_path = work_dir.join("normalized.wav");

        // Already-canonical WAV input skips the re-encode; the output is
        // still a distinct artifact so cleanup tracking stays uniform.
        if is_canonical_wav(&media.path) {
            log::debug!("normalize: {} already canonical", media.path.display());
            tokio::fs::copy(&media.path, &output_path).await?;
            return finalize(output_path);
        }

        let output = Command::new(&self.ffmpeg_binary)
            .arg("-hide_banner")
            .arg("-loglevel")
            .arg("error")
            .arg("-y")
            .arg("-i")
            .arg(&media.path)
            .arg("-vn")
            .arg("-ac")
            .arg("1")
            .arg("-ar")
            .arg(CANONICAL_SAMPLE_RATE.to_string())
            .arg("-acodec")
            .arg("pcm_s16le")
            .arg(&output_path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                NormalizeError::UnsupportedFormat(format!("failed to run ffmpeg: {}", e))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(NormalizeError::UnsupportedFormat(
                stderr.trim().lines().next().unwrap_or("decode failed").to_string(),
            ));
        }

        log::info!(
            "normalize: decoded {} -> {}",
            media.path.display(),
            output_path.display()
        );
        finalize(output_path)
    }
}

/// Probe the produced WAV and enforce the non-empty duration invariant.
fn finalize(output_path: PathBuf) -> Result<NormalizedAudio, NormalizeError> {
    let duration_seconds = wav_duration_seconds(&output_path)?;
    if duration_seconds <= 0.0 {
        return Err(NormalizeError::EmptyMedia);
    }
    Ok(NormalizedAudio {
        path: output_path,
        duration_seconds,
    })
}

/// True when the file is already 16 kHz mono 16-bit integer PCM.
fn is_canonical_wav(path: &Path) -> bool {
    hound::WavReader::open(path)
        .map(|reader| {
            let spec = reader.spec();
            spec.channels == 1
                && spec.sample_rate == CANONICAL_SAMPLE_RATE
                && spec.bits_per_sample == 16
                && spec.sample_format == hound::SampleFormat::Int
        })
        .unwrap_or(false)
}

/// Read a WAV file's duration from its header.
pub fn wav_duration_seconds(path: &Path) -> Result<f64, NormalizeError> {
    let reader = hound::WavReader::open(path)
        .map_err(|e| NormalizeError::UnsupportedFormat(format!("bad WAV output: {}", e)))?;
    let spec = reader.spec();
    if spec.sample_rate == 0 {
        return Err(NormalizeError::UnsupportedFormat(
            "WAV reports zero sample rate".to_string(),
        ));
    }
    Ok(f64::from(reader.duration()) / f64::from(spec.sample_rate))
}

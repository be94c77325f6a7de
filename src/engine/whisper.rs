//! Local model engine variant: the whisper.cpp CLI.
//!
//! CPU/GPU-bound and fully offline. The CLI is asked for full JSON output
//! (`-ojf`), which carries per-segment millisecond offsets and token-level
//! timestamps; tokens stand in for word timings, with whisper's special
//! tokens (`[_BEG_]` and friends) filtered out.

use super::EngineError;
use crate::normalize::NormalizedAudio;
use crate::transcript::{Segment, WordTiming};
use serde::Deserialize;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::Command;

pub struct LocalWhisperEngine {
    binary: String,
    model_path: PathBuf,
    language: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WhisperOutput {
    #[serde(default)]
    transcription: Vec<WhisperSegment>,
}

#[derive(Debug, Deserialize)]
struct WhisperSegment {
    offsets: WhisperOffsets,
    text: String,
    #[serde(default)]
    tokens: Vec<WhisperToken>,
}

#[derive(Debug, Deserialize)]
struct WhisperOffsets {
    from: i64,
    to: i64,
}

#[derive(Debug, Deserialize)]
struct WhisperToken {
    text: String,
    #[serde(default)]
    offsets: Option<WhisperOffsets>,
}

impl LocalWhisperEngine {
    pub fn new(binary: impl Into<String>, model_path: PathBuf, language: Option<String>) -> Self {
        Self {
            binary: binary.into(),
            model_path,
            language,
        }
    }

    pub async fn transcribe(&self, audio: &NormalizedAudio) -> Result<Vec<Segment>, EngineError> {
        if !self.model_path.exists() {
            return Err(EngineError::ModelUnavailable(format!(
                "model not found: {}",
                self.model_path.display()
            )));
        }

        // The JSON lands next to the audio, inside the janitor-tracked
        // scratch directory.
        let output_prefix = audio
            .path
            .parent()
            .unwrap_or_else(|| std::path::Path::new("."))
            .join("whisper-output");

        let mut cmd = Command::new(&self.binary);
        cmd.arg("-m")
            .arg(&self.model_path)
            .arg("-f")
            .arg(&audio.path)
            .arg("-ojf")
            .arg("-of")
            .arg(&output_prefix);
        if let Some(lang) = &self.language {
            cmd.arg("-l").arg(lang);
        }

        let output = cmd
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                if e.kind() == ErrorKind::NotFound {
                    EngineError::ModelUnavailable(format!(
                        "whisper binary '{}' not found",
                        self.binary
                    ))
                } else {
                    EngineError::Decode(format!("failed to run whisper: {}", e))
                }
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(classify_failure(&stderr));
        }

        let json_path = output_prefix.with_extension("json");
        let raw = tokio::fs::read_to_string(&json_path).await.map_err(|e| {
            EngineError::Decode(format!("whisper produced no JSON output: {}", e))
        })?;

        let segments = parse_whisper_json(&raw)?;
        if segments.is_empty() {
            return Err(EngineError::Unintelligible);
        }

        log::info!("local engine: transcribed {} segments", segments.len());
        Ok(segments)
    }
}

fn classify_failure(stderr: &str) -> EngineError {
    let lower = stderr.to_lowercase();
    let detail = stderr
        .lines()
        .rev()
        .find(|l| !l.trim().is_empty())
        .unwrap_or("whisper failed")
        .trim()
        .to_string();

    if lower.contains("failed to initialize whisper")
        || lower.contains("failed to load model")
        || lower.contains("no such file or directory")
    {
        EngineError::ModelUnavailable(detail)
    } else {
        EngineError::Decode(detail)
    }
}

/// Parse whisper.cpp full-JSON output into ordered segments.
fn parse_whisper_json(raw: &str) -> Result<Vec<Segment>, EngineError> {
    let output: WhisperOutput = serde_json::from_str(raw)
        .map_err(|e| EngineError::Decode(format!("malformed whisper JSON: {}", e)))?;

    let segments = output
        .transcription
        .into_iter()
        .filter_map(|seg| {
            let text = seg.text.trim().to_string();
            if text.is_empty() {
                return None;
            }
            let words = seg
                .tokens
                .into_iter()
                .filter(|t| !is_special_token(&t.text) && !t.text.trim().is_empty())
                .map(|t| {
                    let (from, to) = t
                        .offsets
                        .map(|o| (o.from, o.to))
                        .unwrap_or((seg.offsets.from, seg.offsets.to));
                    WordTiming {
                        start: from as f64 / 1000.0,
                        end: to as f64 / 1000.0,
                        word: t.text.trim().to_string(),
                    }
                })
                .collect();
            Some(Segment {
                start: seg.offsets.from as f64 / 1000.0,
                end: seg.offsets.to as f64 / 1000.0,
                text,
                words,
            })
        })
        .collect();

    Ok(segments)
}

/// Whisper emits control tokens like `[_BEG_]` and `[_TT_123]` alongside the
/// real text tokens.
fn is_special_token(text: &str) -> bool {
    let t = text.trim();
    t.starts_with("[_") && t.ends_with(']')
}

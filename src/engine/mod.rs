//! Speech-to-text engine variants.
//!
//! The engine set is closed and dispatched by configuration: a cloud speech
//! API (flat single-segment result, needs network) and a local whisper.cpp
//! model (multi-segment, word-timestamped, offline). Both share one
//! contract, normalized audio in and ordered segments out, so adding a
//! third variant later is additive.

mod cloud;
mod whisper;

pub use cloud::CloudSpeechEngine;
pub use whisper::LocalWhisperEngine;

use crate::normalize::NormalizedAudio;
use crate::transcript::Segment;
use serde::{Deserialize, Serialize};

/// Which engine variant a call site should use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineChoice {
    CloudApi,
    LocalModel,
}

/// Errors from the transcription engines.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Transport failure reaching the cloud service. Callers should treat
    /// network absence as the cloud engine being unavailable, not as a bug.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The cloud service answered but with an auth/quota/server failure.
    #[error("speech service error: {0}")]
    Service(String),

    /// The engine ran but produced no usable text.
    #[error("recognition produced no usable text")]
    Unintelligible,

    /// Local model assets (or the whisper binary itself) missing/unloadable.
    #[error("local model unavailable: {0}")]
    ModelUnavailable(String),

    /// Audio reached the engine but was rejected as malformed.
    #[error("audio rejected by engine: {0}")]
    Decode(String),
}

/// The closed set of engine variants behind one `transcribe` contract.
pub enum TranscriptionEngine {
    CloudApi(CloudSpeechEngine),
    LocalModel(LocalWhisperEngine),
    /// Canned output for orchestrator tests; never constructed in release
    /// builds.
    #[cfg(test)]
    Fixed(Vec<Segment>),
}

impl TranscriptionEngine {
    pub fn name(&self) -> &'static str {
        match self {
            TranscriptionEngine::CloudApi(_) => "cloud-api",
            TranscriptionEngine::LocalModel(_) => "local-model",
            #[cfg(test)]
            TranscriptionEngine::Fixed(_) => "fixed",
        }
    }

    /// Transcribe normalized audio into chronologically ordered segments.
    pub async fn transcribe(&self, audio: &NormalizedAudio) -> Result<Vec<Segment>, EngineError> {
        match self {
            TranscriptionEngine::CloudApi(engine) => engine.transcribe(audio).await,
            TranscriptionEngine::LocalModel(engine) => engine.transcribe(audio).await,
            #[cfg(test)]
            TranscriptionEngine::Fixed(segments) => Ok(segments.clone()),
        }
    }
}

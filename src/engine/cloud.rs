//! Cloud speech API engine variant.
//!
//! One synchronous multipart round trip to an OpenAI-compatible
//! `/v1/audio/transcriptions` endpoint. The service returns a flat text
//! result, so the variant produces exactly one segment spanning
//! `[0, duration]` with no word timings.

use super::EngineError;
use crate::normalize::NormalizedAudio;
use crate::transcript::Segment;
use reqwest::multipart;
use std::time::Duration;

const DEFAULT_ENDPOINT: &str = "https://api.openai.com/v1/audio/transcriptions";
const DEFAULT_MODEL: &str = "whisper-1";

pub struct CloudSpeechEngine {
    client: reqwest::Client,
    api_key: String,
    endpoint: String,
    model: String,
}

impl CloudSpeechEngine {
    /// Create an engine for the given API key; endpoint and model fall back
    /// to the OpenAI transcription defaults when `None`.
    pub fn new(api_key: String, endpoint: Option<String>, model: Option<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            api_key,
            endpoint: endpoint.unwrap_or_else(|| DEFAULT_ENDPOINT.to_string()),
            model: model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
        }
    }

    pub async fn transcribe(&self, audio: &NormalizedAudio) -> Result<Vec<Segment>, EngineError> {
        let bytes = tokio::fs::read(&audio.path)
            .await
            .map_err(|e| EngineError::Decode(format!("failed to read normalized audio: {}", e)))?;

        let part = multipart::Part::bytes(bytes)
            .file_name("audio.wav")
            .mime_str("audio/wav")
            .map_err(|e| EngineError::Decode(format!("failed to create multipart: {}", e)))?;
        let form = multipart::Form::new()
            .part("file", part)
            .text("model", self.model.clone());

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(EngineError::Service(format!(
                "speech API error ({}): {}",
                status, body
            )));
        }

        let result: serde_json::Value = response.json().await?;
        let text = extract_text(&result)?;

        log::info!("cloud engine: transcribed {} chars", text.len());
        Ok(vec![Segment::new(0.0, audio.duration_seconds, text)])
    }
}

/// Pull the transcript text out of the service response, treating an empty
/// result as unintelligible rather than an empty success.
fn extract_text(result: &serde_json::Value) -> Result<String, EngineError> {
    let text = result["text"].as_str().unwrap_or("").trim();
    if text.is_empty() {
        return Err(EngineError::Unintelligible);
    }
    Ok(text.to_string())
}

//! Transcription pipeline orchestrator.
//!
//! Composes acquisition, normalization, the transcription engine and
//! transcript assembly into the two public entry points, applying the
//! acquisition fallback policy and converting internal failures into the
//! external error taxonomy.
//!
//! Every request is an independent unit of work: its own janitor, its own
//! scratch directory, its own engine value. The flow is strictly sequential
//! per request; cancellation and per-stage timeouts are enforced with biased
//! `tokio::select!` races at stage boundaries, so even a stage that blocks
//! for minutes (download, local model inference) is abandoned promptly and
//! its child process is killed via `kill_on_drop`.

use crate::acquire::{AcquireError, MediaAcquirer, MediaSource};
use crate::engine::{
    CloudSpeechEngine, EngineChoice, EngineError, LocalWhisperEngine, TranscriptionEngine,
};
use crate::janitor::ResourceJanitor;
use crate::normalize::{AudioNormalizer, NormalizeError};
use crate::transcript::{AssembleError, Transcript};
use std::path::PathBuf;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Default timeout for the acquisition stage.
const DEFAULT_DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(600);

/// Default timeout for the engine stage. The local model is CPU/GPU-bound,
/// so this is generous compared to a network round trip.
const DEFAULT_TRANSCRIPTION_TIMEOUT: Duration = Duration::from_secs(1800);

/// Configuration for the transcription pipeline.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Binary used by the primary acquisition strategy.
    pub ytdlp_binary: String,
    /// Binary used for audio normalization.
    pub ffmpeg_binary: String,
    /// whisper.cpp CLI binary for the local model engine.
    pub whisper_binary: String,
    /// Path to the local model weights (ggml format).
    pub whisper_model_path: PathBuf,
    /// Optional language hint for the local model.
    pub language: Option<String>,
    /// API key for the cloud speech service.
    pub cloud_api_key: String,
    /// Override for the cloud transcription endpoint.
    pub cloud_endpoint: Option<String>,
    /// Override for the cloud transcription model.
    pub cloud_model: Option<String>,
    /// Engine used for remote-URL transcription.
    pub url_engine: EngineChoice,
    /// Engine used for uploaded-file transcription.
    pub upload_engine: EngineChoice,
    /// Timeout for the acquisition stage.
    pub download_timeout: Duration,
    /// Timeout for the engine stage.
    pub transcription_timeout: Duration,
    /// Root for per-request scratch directories; OS temp dir when `None`.
    pub temp_root: Option<PathBuf>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            ytdlp_binary: "yt-dlp".to_string(),
            ffmpeg_binary: "ffmpeg".to_string(),
            whisper_binary: "whisper-cli".to_string(),
            whisper_model_path: PathBuf::from("models/ggml-base.bin"),
            language: None,
            cloud_api_key: String::new(),
            cloud_endpoint: None,
            cloud_model: None,
            // URL transcription favors the local model for richer timestamps;
            // uploads default to the cloud round trip.
            url_engine: EngineChoice::LocalModel,
            upload_engine: EngineChoice::CloudApi,
            download_timeout: DEFAULT_DOWNLOAD_TIMEOUT,
            transcription_timeout: DEFAULT_TRANSCRIPTION_TIMEOUT,
            temp_root: None,
        }
    }
}

/// Pipeline state machine. Strictly sequential; no state is revisited except
/// the strategy fallback loop inside `Acquiring`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Acquiring,
    Normalizing,
    Transcribing,
    Assembling,
    /// Terminal: a transcript was produced.
    Done,
    /// Terminal: a typed error was produced.
    Failed,
}

impl PipelineState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineState::Done | PipelineState::Failed)
    }
}

/// Errors produced by the pipeline, wrapping each stage's typed failure.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("acquisition error: {0}")]
    Acquire(#[from] AcquireError),

    #[error("normalization error: {0}")]
    Normalize(#[from] NormalizeError),

    #[error("engine error: {0}")]
    Engine(#[from] EngineError),

    #[error("assembly error: {0}")]
    Assemble(#[from] AssembleError),

    #[error("stage timed out after {0:?}")]
    Timeout(Duration),

    #[error("operation cancelled")]
    Cancelled,
}

/// Flat error taxonomy for callers that route on failure kind rather than
/// the full cause chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidUpload,
    AcquisitionFailed,
    UnsupportedFormat,
    EmptyMedia,
    RecognitionUnintelligible,
    RecognitionService,
    ModelUnavailable,
    Decode,
    Timeout,
    Cancelled,
}

impl PipelineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::Acquire(AcquireError::InvalidUpload) => ErrorKind::InvalidUpload,
            PipelineError::Acquire(_) => ErrorKind::AcquisitionFailed,
            PipelineError::Normalize(NormalizeError::EmptyMedia) => ErrorKind::EmptyMedia,
            PipelineError::Normalize(_) => ErrorKind::UnsupportedFormat,
            PipelineError::Engine(EngineError::Unintelligible) => {
                ErrorKind::RecognitionUnintelligible
            }
            PipelineError::Engine(EngineError::ModelUnavailable(_)) => ErrorKind::ModelUnavailable,
            PipelineError::Engine(EngineError::Decode(_)) => ErrorKind::Decode,
            PipelineError::Engine(_) => ErrorKind::RecognitionService,
            // An engine that hands assembly zero segments is a recognition
            // failure, not an empty success.
            PipelineError::Assemble(AssembleError::EmptySegments) => {
                ErrorKind::RecognitionUnintelligible
            }
            PipelineError::Timeout(_) => ErrorKind::Timeout,
            PipelineError::Cancelled => ErrorKind::Cancelled,
        }
    }
}

/// The transcription pipeline's public entry surface.
pub struct Transcriber {
    config: PipelineConfig,
}

impl Transcriber {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Transcribe a remote video URL.
    pub async fn transcribe_from_url(&self, url: &str) -> Result<Transcript, PipelineError> {
        self.transcribe_from_url_with_cancel(url, CancellationToken::new())
            .await
    }

    /// Transcribe a remote video URL, abandoning work when `cancel` fires.
    pub async fn transcribe_from_url_with_cancel(
        &self,
        url: &str,
        cancel: CancellationToken,
    ) -> Result<Transcript, PipelineError> {
        let source = MediaSource::RemoteUrl(url.to_string());
        let acquirer = MediaAcquirer::new(&self.config.ytdlp_binary);
        let engine = self.build_engine(self.config.url_engine);
        self.run(source, acquirer, engine, cancel).await
    }

    /// Transcribe an uploaded media payload.
    pub async fn transcribe_from_upload(
        &self,
        filename: &str,
        bytes: &[u8],
        extension: &str,
    ) -> Result<Transcript, PipelineError> {
        self.transcribe_from_upload_with_cancel(filename, bytes, extension, CancellationToken::new())
            .await
    }

    /// Transcribe an uploaded media payload, abandoning work when `cancel`
    /// fires.
    pub async fn transcribe_from_upload_with_cancel(
        &self,
        filename: &str,
        bytes: &[u8],
        extension: &str,
        cancel: CancellationToken,
    ) -> Result<Transcript, PipelineError> {
        let source = MediaSource::Upload {
            filename: filename.to_string(),
            bytes: bytes.to_vec(),
            extension: extension.to_string(),
        };
        let acquirer = MediaAcquirer::new(&self.config.ytdlp_binary);
        let engine = self.build_engine(self.config.upload_engine);
        self.run(source, acquirer, engine, cancel).await
    }

    fn build_engine(&self, choice: EngineChoice) -> TranscriptionEngine {
        match choice {
            EngineChoice::CloudApi => TranscriptionEngine::CloudApi(CloudSpeechEngine::new(
                self.config.cloud_api_key.clone(),
                self.config.cloud_endpoint.clone(),
                self.config.cloud_model.clone(),
            )),
            EngineChoice::LocalModel => TranscriptionEngine::LocalModel(LocalWhisperEngine::new(
                self.config.whisper_binary.clone(),
                self.config.whisper_model_path.clone(),
                self.config.language.clone(),
            )),
        }
    }

    /// Run the full pipeline for one request.
    ///
    /// The janitor is released on every exit path; cleanup problems are
    /// logged and never replace the primary outcome.
    async fn run(
        &self,
        source: MediaSource,
        acquirer: MediaAcquirer,
        engine: TranscriptionEngine,
        cancel: CancellationToken,
    ) -> Result<Transcript, PipelineError> {
        let descriptor = source.descriptor().to_string();
        let mut state = PipelineState::Idle;
        let mut janitor = ResourceJanitor::new();

        let result = self
            .run_stages(&source, &acquirer, &engine, &cancel, &mut state, &mut janitor)
            .await;
        janitor.release_all();

        match &result {
            Ok(transcript) => {
                advance(&mut state, PipelineState::Done, &descriptor);
                log::info!(
                    "pipeline: '{}' done, {} segments (engine {})",
                    descriptor,
                    transcript.segments.len(),
                    engine.name()
                );
            }
            Err(e) => {
                advance(&mut state, PipelineState::Failed, &descriptor);
                log::warn!("pipeline: '{}' failed: {} ({:?})", descriptor, e, e.kind());
            }
        }
        debug_assert!(state.is_terminal());

        result
    }

    async fn run_stages(
        &self,
        source: &MediaSource,
        acquirer: &MediaAcquirer,
        engine: &TranscriptionEngine,
        cancel: &CancellationToken,
        state: &mut PipelineState,
        janitor: &mut ResourceJanitor,
    ) -> Result<Transcript, PipelineError> {
        let descriptor = source.descriptor();
        let work_dir = janitor
            .scratch_dir(self.config.temp_root.as_deref())
            .map_err(AcquireError::Io)?;

        advance(state, PipelineState::Acquiring, descriptor);
        let media = tokio::select! {
            biased;

            _ = cancel.cancelled() => {
                log::info!("pipeline: '{}' cancelled during acquisition", descriptor);
                return Err(PipelineError::Cancelled);
            }

            _ = tokio::time::sleep(self.config.download_timeout) => {
                log::warn!("pipeline: '{}' acquisition timed out", descriptor);
                return Err(PipelineError::Timeout(self.config.download_timeout));
            }

            result = acquirer.acquire(source, &work_dir) => result?,
        };

        advance(state, PipelineState::Normalizing, descriptor);
        let normalizer = AudioNormalizer::new(self.config.ffmpeg_binary.clone());
        let audio = tokio::select! {
            biased;

            _ = cancel.cancelled() => {
                log::info!("pipeline: '{}' cancelled during normalization", descriptor);
                return Err(PipelineError::Cancelled);
            }

            result = normalizer.normalize(&media, &work_dir) => result?,
        };

        advance(state, PipelineState::Transcribing, descriptor);
        let segments = tokio::select! {
            biased;

            _ = cancel.cancelled() => {
                log::info!("pipeline: '{}' cancelled during transcription", descriptor);
                return Err(PipelineError::Cancelled);
            }

            _ = tokio::time::sleep(self.config.transcription_timeout) => {
                log::warn!("pipeline: '{}' transcription timed out", descriptor);
                return Err(PipelineError::Timeout(self.config.transcription_timeout));
            }

            result = engine.transcribe(&audio) => result?,
        };

        advance(state, PipelineState::Assembling, descriptor);
        let title = media
            .title
            .clone()
            .unwrap_or_else(|| descriptor.to_string());
        let transcript = Transcript::assemble(descriptor, title, segments)?;

        Ok(transcript)
    }
}

fn advance(state: &mut PipelineState, next: PipelineState, descriptor: &str) {
    log::debug!("pipeline: '{}' {:?} -> {:?}", descriptor, state, next);
    *state = next;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acquire::{AcquireStrategy, AcquiredMedia, StrategyError};
    use crate::transcript::Segment;
    use async_trait::async_trait;
    use std::path::Path;

    fn init_logs() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn config_with_temp_root(root: &Path) -> PipelineConfig {
        PipelineConfig {
            temp_root: Some(root.to_path_buf()),
            ..PipelineConfig::default()
        }
    }

    fn canonical_wav_bytes(samples: usize) -> Vec<u8> {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 16_000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut cursor = std::io::Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
            for i in 0..samples {
                writer.write_sample((i % 128) as i16).unwrap();
            }
            writer.finalize().unwrap();
        }
        cursor.into_inner()
    }

    fn fixed_engine() -> TranscriptionEngine {
        TranscriptionEngine::Fixed(vec![
            Segment::new(0.0, 0.5, "first line"),
            Segment::new(0.5, 1.0, "second line"),
        ])
    }

    async fn run_upload(
        transcriber: &Transcriber,
        bytes: &[u8],
        engine: TranscriptionEngine,
    ) -> Result<Transcript, PipelineError> {
        let source = MediaSource::Upload {
            filename: "dailies.wav".to_string(),
            bytes: bytes.to_vec(),
            extension: "wav".to_string(),
        };
        let acquirer = MediaAcquirer::with_strategies(Vec::new());
        transcriber
            .run(source, acquirer, engine, CancellationToken::new())
            .await
    }

    #[tokio::test]
    async fn test_upload_happy_path_and_cleanup() {
        init_logs();
        let root = tempfile::tempdir().unwrap();
        let transcriber = Transcriber::new(config_with_temp_root(root.path()));

        let wav = canonical_wav_bytes(16_000);
        let transcript = run_upload(&transcriber, &wav, fixed_engine()).await.unwrap();

        assert!(!transcript.segments.is_empty());
        assert_eq!(transcript.segments[0].start, 0.0);
        assert_eq!(transcript.source, "dailies.wav");
        assert_eq!(transcript.title, "dailies.wav");

        // No scratch artifact from the request remains.
        assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_empty_upload_is_invalid_and_cleaned_up() {
        let root = tempfile::tempdir().unwrap();
        let transcriber = Transcriber::new(config_with_temp_root(root.path()));

        let err = run_upload(&transcriber, &[], fixed_engine()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidUpload);
        assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_zero_duration_upload_is_empty_media() {
        let root = tempfile::tempdir().unwrap();
        let transcriber = Transcriber::new(config_with_temp_root(root.path()));

        let wav = canonical_wav_bytes(0);
        let err = run_upload(&transcriber, &wav, fixed_engine()).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::EmptyMedia);
        assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_engine_with_no_segments_is_unintelligible() {
        let root = tempfile::tempdir().unwrap();
        let transcriber = Transcriber::new(config_with_temp_root(root.path()));

        let wav = canonical_wav_bytes(16_000);
        let err = run_upload(&transcriber, &wav, TranscriptionEngine::Fixed(Vec::new()))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RecognitionUnintelligible);
    }

    struct FailingStrategy;

    #[async_trait]
    impl AcquireStrategy for FailingStrategy {
        fn name(&self) -> &'static str {
            "failing"
        }

        async fn acquire(
            &self,
            _url: &str,
            _work_dir: &Path,
        ) -> Result<AcquiredMedia, StrategyError> {
            Err(StrategyError::Network("unreachable".to_string()))
        }
    }

    #[tokio::test]
    async fn test_exhausted_strategies_fail_and_clean_up() {
        init_logs();
        let root = tempfile::tempdir().unwrap();
        let transcriber = Transcriber::new(config_with_temp_root(root.path()));

        let source = MediaSource::RemoteUrl("https://example.com/v".to_string());
        let acquirer = MediaAcquirer::with_strategies(vec![
            Box::new(FailingStrategy),
            Box::new(FailingStrategy),
        ]);
        let err = transcriber
            .run(source, acquirer, fixed_engine(), CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::AcquisitionFailed);
        assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_pre_cancelled_token_aborts_before_acquisition() {
        let root = tempfile::tempdir().unwrap();
        let transcriber = Transcriber::new(config_with_temp_root(root.path()));

        let cancel = CancellationToken::new();
        cancel.cancel();

        let source = MediaSource::Upload {
            filename: "dailies.wav".to_string(),
            bytes: canonical_wav_bytes(16_000),
            extension: "wav".to_string(),
        };
        let acquirer = MediaAcquirer::with_strategies(Vec::new());
        let err = transcriber
            .run(source, acquirer, fixed_engine(), cancel)
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Cancelled);
        assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_segments_sorted_with_valid_extents() {
        let root = tempfile::tempdir().unwrap();
        let transcriber = Transcriber::new(config_with_temp_root(root.path()));

        // Out-of-order, misbehaving extents from the engine.
        let engine = TranscriptionEngine::Fixed(vec![
            Segment::new(5.0, 4.0, "later"),
            Segment::new(0.0, 2.0, "earlier"),
        ]);
        let wav = canonical_wav_bytes(16_000);
        let transcript = run_upload(&transcriber, &wav, engine).await.unwrap();

        for window in transcript.segments.windows(2) {
            assert!(window[0].start <= window[1].start);
        }
        for seg in &transcript.segments {
            assert!(seg.end >= seg.start);
        }
    }

    #[test]
    fn test_state_terminality() {
        assert!(PipelineState::Done.is_terminal());
        assert!(PipelineState::Failed.is_terminal());
        assert!(!PipelineState::Acquiring.is_terminal());
        assert!(!PipelineState::Idle.is_terminal());
    }

    #[test]
    fn test_error_kind_mapping() {
        assert_eq!(
            PipelineError::Acquire(AcquireError::InvalidUpload).kind(),
            ErrorKind::InvalidUpload
        );
        assert_eq!(
            PipelineError::Acquire(AcquireError::Exhausted(StrategyError::EmptyResult)).kind(),
            ErrorKind::AcquisitionFailed
        );
        assert_eq!(
            PipelineError::Normalize(NormalizeError::EmptyMedia).kind(),
            ErrorKind::EmptyMedia
        );
        assert_eq!(
            PipelineError::Normalize(NormalizeError::UnsupportedFormat("x".into())).kind(),
            ErrorKind::UnsupportedFormat
        );
        assert_eq!(
            PipelineError::Engine(EngineError::Unintelligible).kind(),
            ErrorKind::RecognitionUnintelligible
        );
        assert_eq!(
            PipelineError::Engine(EngineError::Service("quota".into())).kind(),
            ErrorKind::RecognitionService
        );
        assert_eq!(
            PipelineError::Engine(EngineError::ModelUnavailable("missing".into())).kind(),
            ErrorKind::ModelUnavailable
        );
        assert_eq!(
            PipelineError::Engine(EngineError::Decode("bad".into())).kind(),
            ErrorKind::Decode
        );
        assert_eq!(
            PipelineError::Assemble(AssembleError::EmptySegments).kind(),
            ErrorKind::RecognitionUnintelligible
        );
        assert_eq!(
            PipelineError::Timeout(Duration::from_secs(1)).kind(),
            ErrorKind::Timeout
        );
        assert_eq!(PipelineError::Cancelled.kind(), ErrorKind::Cancelled);
    }
}

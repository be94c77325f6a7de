//! Media transcription pipeline for screenwriting workflows.
//!
//! Turns a remote video URL or an uploaded media file into a timestamped
//! transcript suitable for script breakdowns:
//!
//! ```text
//! URL / upload -> acquire -> normalize (mono 16 kHz WAV) -> engine -> transcript
//! ```
//!
//! Acquisition runs a fallback chain of download strategies; the engine is a
//! closed choice between a cloud speech API and a local whisper.cpp model.
//! Every request works inside its own scratch directory, which is removed on
//! success and failure alike.
//!
//! ```no_run
//! use slate_transcribe::{PipelineConfig, Transcriber};
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let transcriber = Transcriber::new(PipelineConfig::default());
//! let transcript = transcriber
//!     .transcribe_from_url("https://example.com/table-read")
//!     .await?;
//! println!("{}", transcript.to_plain_text());
//! # Ok(())
//! # }
//! ```

pub mod acquire;
pub mod engine;
pub mod janitor;
pub mod normalize;
pub mod pipeline;
pub mod store;
pub mod transcript;

pub use acquire::{AcquireError, AcquiredMedia, AcquireStrategy, MediaAcquirer, MediaSource};
pub use engine::{EngineChoice, EngineError, TranscriptionEngine};
pub use janitor::ResourceJanitor;
pub use normalize::{AudioNormalizer, NormalizeError, NormalizedAudio, CANONICAL_SAMPLE_RATE};
pub use pipeline::{ErrorKind, PipelineConfig, PipelineError, PipelineState, Transcriber};
pub use store::TranscriptStore;
pub use transcript::{AssembleError, Segment, Transcript, WordTiming};

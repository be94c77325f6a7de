//! Transcript data model and assembly.
//!
//! Engines hand the pipeline an ordered list of [`Segment`]s; assembly turns
//! that into an immutable [`Transcript`] with a fresh id and creation
//! timestamp. Derived views (plain-text export, timestamp labels, script
//! cues) are pure functions over an existing transcript, never stored state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Word-level timing detail within a segment.
///
/// Only the local model engine produces these; the cloud engine returns
/// segments with an empty word list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WordTiming {
    pub start: f64,
    pub end: f64,
    pub word: String,
}

/// A contiguous time-bounded span of transcribed speech.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    /// Start offset in seconds from the beginning of the media.
    pub start: f64,
    /// End offset in seconds; always >= `start`.
    pub end: f64,
    pub text: String,
    #[serde(default)]
    pub words: Vec<WordTiming>,
}

impl Segment {
    /// Build a segment with no word-level detail.
    pub fn new(start: f64, end: f64, text: impl Into<String>) -> Self {
        Self {
            start,
            end,
            text: text.into(),
            words: Vec::new(),
        }
    }

    /// The block inserted into a working script when a segment is pulled in,
    /// e.g. `[TIMESTAMP: 02:05]\nsome dialogue`.
    pub fn script_cue(&self) -> String {
        format!("[TIMESTAMP: {}]\n{}", format_timestamp(self.start), self.text)
    }
}

/// A completed, time-aligned transcript.
///
/// Immutable after creation: corrections produce a new `Transcript`, never an
/// in-place mutation of `segments`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transcript {
    /// Opaque unique identifier, assigned once at assembly.
    pub id: String,
    /// Source descriptor: the remote URL or the uploaded filename.
    pub source: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
    /// Non-empty, ordered by `start` ascending.
    pub segments: Vec<Segment>,
}

/// Errors from transcript assembly.
#[derive(Debug, thiserror::Error)]
pub enum AssembleError {
    #[error("engine returned no segments")]
    EmptySegments,
}

impl Transcript {
    /// Assemble a transcript from engine output. Pure, no I/O.
    ///
    /// Assigns a fresh uuid and the current timestamp, rejects an empty
    /// segment sequence, and enforces the ordering invariants: segments are
    /// sorted by `start`, starts are clamped to be non-negative, and each
    /// `end` is clamped up to its `start`.
    pub fn assemble(
        source: impl Into<String>,
        title: impl Into<String>,
        mut segments: Vec<Segment>,
    ) -> Result<Self, AssembleError> {
        if segments.is_empty() {
            return Err(AssembleError::EmptySegments);
        }

        for seg in &mut segments {
            seg.start = seg.start.max(0.0);
            seg.end = seg.end.max(seg.start);
        }
        segments.sort_by(|a, b| {
            a.start
                .partial_cmp(&b.start)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        Ok(Self {
            id: Uuid::new_v4().to_string(),
            source: source.into(),
            title: title.into(),
            created_at: Utc::now(),
            segments,
        })
    }

    /// Render the plain-text export: one line per segment, formatted
    /// `[<start>s] <text>` with the start fixed to two decimal places.
    ///
    /// This is the crate's only bit-exact external format; end times and word
    /// timings are intentionally not part of it.
    pub fn to_plain_text(&self) -> String {
        self.segments
            .iter()
            .map(|seg| format!("[{:.2}s] {}", seg.start, seg.text))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Parse a plain-text export back into `(start, text)` pairs.
///
/// Inverse of [`Transcript::to_plain_text`] for starts already at two-decimal
/// precision. Lines that do not match `[<float>s] <text>` are skipped.
pub fn parse_plain_text(text: &str) -> Vec<(f64, String)> {
    text.lines()
        .filter_map(|line| {
            let rest = line.strip_prefix('[')?;
            let sep = rest.find("s] ")?;
            let start: f64 = rest[..sep].parse().ok()?;
            Some((start, rest[sep + 3..].to_string()))
        })
        .collect()
}

/// Format a second offset as an `MM:SS` display label.
///
/// Integer-floor minutes and seconds; the stored `start`/`end` floats retain
/// full precision.
pub fn format_timestamp(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 {
        seconds.floor() as u64
    } else {
        0
    };
    format!("{:02}:{:02}", total / 60, total % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_segments() -> Vec<Segment> {
        vec![
            Segment::new(0.0, 4.5, "INT. WAREHOUSE - NIGHT"),
            Segment::new(4.5, 9.25, "We open on a single overhead light."),
        ]
    }

    #[test]
    fn test_assemble_assigns_identity() {
        let a = Transcript::assemble("clip.mp4", "clip.mp4", sample_segments()).unwrap();
        let b = Transcript::assemble("clip.mp4", "clip.mp4", sample_segments()).unwrap();
        assert!(!a.id.is_empty());
        assert_ne!(a.id, b.id);
        assert_eq!(a.source, "clip.mp4");
        assert_eq!(a.segments.len(), 2);
    }

    #[test]
    fn test_assemble_rejects_empty() {
        let err = Transcript::assemble("x", "x", Vec::new()).unwrap_err();
        assert!(matches!(err, AssembleError::EmptySegments));
    }

    #[test]
    fn test_assemble_sorts_and_clamps() {
        let segments = vec![
            Segment::new(10.0, 9.0, "second"),
            Segment::new(-1.0, 2.0, "first"),
        ];
        let t = Transcript::assemble("x", "x", segments).unwrap();

        assert_eq!(t.segments[0].text, "first");
        assert_eq!(t.segments[0].start, 0.0);
        assert_eq!(t.segments[1].text, "second");
        // end clamped up to start
        assert_eq!(t.segments[1].end, 10.0);

        for w in t.segments.windows(2) {
            assert!(w[0].start <= w[1].start);
        }
        for seg in &t.segments {
            assert!(seg.end >= seg.start);
        }
    }

    #[test]
    fn test_plain_text_format() {
        let t = Transcript::assemble("clip.mp4", "clip.mp4", sample_segments()).unwrap();
        assert_eq!(
            t.to_plain_text(),
            "[0.00s] INT. WAREHOUSE - NIGHT\n[4.50s] We open on a single overhead light."
        );
    }

    #[test]
    fn test_plain_text_round_trip() {
        let t = Transcript::assemble("clip.mp4", "clip.mp4", sample_segments()).unwrap();
        let parsed = parse_plain_text(&t.to_plain_text());

        let expected: Vec<(f64, String)> = t
            .segments
            .iter()
            .map(|s| (s.start, s.text.clone()))
            .collect();
        assert_eq!(parsed, expected);
    }

    #[test]
    fn test_parse_skips_malformed_lines() {
        let parsed = parse_plain_text("garbage\n[1.50s] ok\n[notafloats] nope");
        assert_eq!(parsed, vec![(1.5, "ok".to_string())]);
    }

    #[test]
    fn test_format_timestamp() {
        assert_eq!(format_timestamp(125.7), "02:05");
        assert_eq!(format_timestamp(0.0), "00:00");
        assert_eq!(format_timestamp(59.999), "00:59");
        assert_eq!(format_timestamp(-3.0), "00:00");
        assert_eq!(format_timestamp(f64::NAN), "00:00");
    }

    #[test]
    fn test_script_cue() {
        let seg = Segment::new(125.7, 130.0, "Cut to black.");
        assert_eq!(seg.script_cue(), "[TIMESTAMP: 02:05]\nCut to black.");
    }

    #[test]
    fn test_transcript_serialization() {
        let t = Transcript::assemble("clip.mp4", "clip.mp4", sample_segments()).unwrap();
        let json = serde_json::to_string(&t).unwrap();
        let back: Transcript = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, t.id);
        assert_eq!(back.segments, t.segments);
    }
}

//! # rf-snr
//!
//! Locates a short reference excerpt inside a longer recording and measures
//! how faithfully the recording reproduces it.
//!
//! ## Features
//!
//! - **Loading**: WAV/FLAC/OGG/MP3 decoding with mean downmix to mono
//! - **Alignment**: valid-mode cross-correlation, direct or FFT-accelerated,
//!   with earliest-offset tie-breaking
//! - **Metrics**: residual signal and SNR in dB, with explicit infinite cases
//! - **Reports**: text, JSON and Markdown summaries, parallel batch runs
//!
//! ## Example
//!
//! ```rust,ignore
//! use rf_snr::{AudioMatcher, MatchConfig};
//!
//! let matcher = AudioMatcher::new(MatchConfig::default());
//! let result = matcher.compare_files("transmitted.wav", "received.flac")?;
//!
//! println!("{}", rf_snr::report::summary_line(&result));
//! ```

pub mod align;
pub mod batch;
pub mod config;
pub mod loader;
pub mod matcher;
pub mod metrics;
pub mod report;
pub mod sample;

pub use align::{AlignmentResult, find_best_offset};
pub use batch::{BatchEntry, BatchResult, compare_batch, compare_files_batch};
pub use config::{CorrelationMethod, MatchConfig};
pub use loader::{AudioData, save_wav};
pub use matcher::{AudioMatcher, ComparisonResult, Stage};
pub use metrics::{QualityReport, Snr, compute_quality};
pub use report::{ComparisonSummary, MatchReport, ReportFormat};
pub use sample::AudioSample;

use thiserror::Error;

/// Errors that can occur while matching a reference against a recording
#[derive(Error, Debug)]
pub enum SnrError {
    #[error("Failed to decode audio: {0}")]
    Decode(String),

    #[error("Empty audio: {0}")]
    EmptyAudio(String),

    #[error("Sample rate mismatch: reference={reference}Hz, candidate={candidate}Hz")]
    SampleRateMismatch { reference: u32, candidate: u32 },

    #[error(
        "Candidate shorter than reference: reference={reference} samples, candidate={candidate} samples"
    )]
    InsufficientLength { reference: usize, candidate: usize },

    #[error("Length mismatch: reference={reference} samples, segment={segment} samples")]
    LengthMismatch { reference: usize, segment: usize },

    #[error("FFT error: {0}")]
    Fft(String),

    #[error("Failed to encode audio: {0}")]
    Encode(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl SnrError {
    /// Comparison stage in which this error is raised
    pub fn stage(&self) -> Stage {
        match self {
            SnrError::Decode(_)
            | SnrError::EmptyAudio(_)
            | SnrError::SampleRateMismatch { .. }
            | SnrError::Io(_)
            | SnrError::Config(_) => Stage::Validating,
            SnrError::InsufficientLength { .. } | SnrError::Fft(_) => Stage::Aligning,
            SnrError::LengthMismatch { .. } => Stage::Scoring,
            SnrError::Encode(_) => Stage::Done,
        }
    }
}

pub type Result<T> = std::result::Result<T, SnrError>;

/// Compare with default settings
pub fn compare(reference: &AudioSample, candidate: &AudioSample) -> Result<ComparisonResult> {
    AudioMatcher::default().compare(reference, candidate)
}

/// Compare two audio files with default settings
pub fn compare_files(reference_path: &str, candidate_path: &str) -> Result<ComparisonResult> {
    AudioMatcher::default().compare_files(reference_path, candidate_path)
}

//! Mono sample sequences entering alignment

use crate::{Result, SnrError};
use serde::{Deserialize, Serialize};

/// Mono amplitude sequence paired with its sample rate.
///
/// Construction guarantees at least one sample and a non-zero rate, so any
/// `AudioSample` can be handed straight to the alignment engine. A comparison
/// uses two of these in different roles: the short clean *reference* and the
/// long received *candidate*.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawAudioSample")]
pub struct AudioSample {
    samples: Vec<f64>,
    sample_rate: u32,
}

impl AudioSample {
    /// Wrap mono samples
    pub fn new(samples: Vec<f64>, sample_rate: u32) -> Result<Self> {
        if sample_rate == 0 {
            return Err(SnrError::Decode("sample rate must be positive".into()));
        }
        if samples.is_empty() {
            return Err(SnrError::EmptyAudio("sample sequence has zero length".into()));
        }

        Ok(Self {
            samples,
            sample_rate,
        })
    }

    /// Build from `f32` samples (the usual decoder output)
    pub fn from_f32(samples: &[f32], sample_rate: u32) -> Result<Self> {
        Self::new(samples.iter().map(|&s| s as f64).collect(), sample_rate)
    }

    /// Sample values
    pub fn samples(&self) -> &[f64] {
        &self.samples
    }

    /// Sample rate in Hz
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Number of samples (always >= 1)
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Always false; kept for API symmetry with slices
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Duration in seconds
    pub fn duration(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }

    /// Consume into the raw sample vector
    pub fn into_samples(self) -> Vec<f64> {
        self.samples
    }
}

/// Unchecked wire form; deserialization goes through [`AudioSample::new`]
#[derive(Deserialize)]
struct RawAudioSample {
    samples: Vec<f64>,
    sample_rate: u32,
}

impl TryFrom<RawAudioSample> for AudioSample {
    type Error = SnrError;

    fn try_from(raw: RawAudioSample) -> Result<Self> {
        Self::new(raw.samples, raw.sample_rate)
    }
}

impl AsRef<[f64]> for AudioSample {
    fn as_ref(&self) -> &[f64] {
        &self.samples
    }
}

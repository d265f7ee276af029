//! Reference/candidate comparison API

use crate::align::align;
use crate::config::{CorrelationMethod, MatchConfig};
use crate::loader::AudioData;
use crate::metrics::{Snr, compute_quality};
use crate::sample::AudioSample;
use crate::{Result, SnrError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Comparison stages, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Inputs decoded, sample rates checked
    Validating,
    /// Correlation search
    Aligning,
    /// Residual and SNR
    Scoring,
    /// Result assembled
    Done,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Validating => "validating",
            Stage::Aligning => "aligning",
            Stage::Scoring => "scoring",
            Stage::Done => "done",
        };
        f.write_str(name)
    }
}

/// Result of locating a reference inside a candidate recording
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonResult {
    /// Start index of the best match in the candidate
    pub offset: usize,

    /// `offset / sample_rate`
    pub offset_seconds: f64,

    /// Signal-to-noise ratio of the matched segment
    pub snr: Snr,

    /// Candidate samples `[offset, offset + M)`
    pub matched_segment: Vec<f64>,

    /// `matched_segment - reference`
    pub residual: Vec<f64>,

    /// Common sample rate (Hz)
    pub sample_rate: u32,

    /// Reference length M
    pub reference_len: usize,

    /// Candidate length N
    pub candidate_len: usize,

    /// Correlation value at `offset`
    pub peak_correlation: f64,

    /// Correlation strategy that ran
    pub method: CorrelationMethod,

    /// Mean square of the reference
    pub signal_power: f64,

    /// Mean square of the residual
    pub noise_power: f64,

    /// Largest absolute residual sample
    pub peak_residual: f64,
}

impl ComparisonResult {
    /// Whether the SNR meets an optional threshold (no threshold always passes)
    pub fn passes(&self, min_snr_db: Option<f64>) -> bool {
        min_snr_db.is_none_or(|min| self.snr.meets(min))
    }

    /// Matched segment duration in seconds
    pub fn matched_duration(&self) -> f64 {
        self.reference_len as f64 / self.sample_rate as f64
    }
}

/// Locates reference excerpts in candidate recordings
#[derive(Debug, Clone, Default)]
pub struct AudioMatcher {
    config: MatchConfig,
}

impl AudioMatcher {
    /// Create a matcher with the given configuration
    pub fn new(config: MatchConfig) -> Self {
        Self { config }
    }

    /// Active configuration
    pub fn config(&self) -> &MatchConfig {
        &self.config
    }

    /// Align `reference` inside `candidate` and score the match
    ///
    /// Runs validating → aligning → scoring and stops at the first error.
    /// Never resamples; differing sample rates are rejected.
    pub fn compare(
        &self,
        reference: &AudioSample,
        candidate: &AudioSample,
    ) -> Result<ComparisonResult> {
        // Validating
        self.config.validate()?;
        if reference.sample_rate() != candidate.sample_rate() {
            return Err(SnrError::SampleRateMismatch {
                reference: reference.sample_rate(),
                candidate: candidate.sample_rate(),
            });
        }
        let sample_rate = reference.sample_rate();

        // Aligning
        let alignment = align(candidate.samples(), reference.samples(), &self.config)?;

        // Scoring
        let quality = compute_quality(reference.samples(), &alignment.matched_segment)?;

        Ok(ComparisonResult {
            offset: alignment.offset,
            offset_seconds: alignment.offset_seconds(sample_rate),
            snr: quality.snr,
            matched_segment: alignment.matched_segment,
            residual: quality.residual,
            sample_rate,
            reference_len: reference.len(),
            candidate_len: candidate.len(),
            peak_correlation: alignment.peak_correlation,
            method: alignment.method,
            signal_power: quality.signal_power,
            noise_power: quality.noise_power,
            peak_residual: quality.peak_residual,
        })
    }

    /// Compare two audio files
    pub fn compare_files<P: AsRef<Path>>(
        &self,
        reference_path: P,
        candidate_path: P,
    ) -> Result<ComparisonResult> {
        let reference = AudioData::load(reference_path)?.into_sample()?;
        let candidate = AudioData::load(candidate_path)?.into_sample()?;

        self.compare(&reference, &candidate)
    }

    /// Compare two encoded in-memory files (e.g. uploads)
    pub fn compare_bytes(
        &self,
        reference: Vec<u8>,
        reference_hint: Option<&str>,
        candidate: Vec<u8>,
        candidate_hint: Option<&str>,
    ) -> Result<ComparisonResult> {
        let reference = AudioData::from_bytes(reference, reference_hint)?.into_sample()?;
        let candidate = AudioData::from_bytes(candidate, candidate_hint)?.into_sample()?;

        self.compare(&reference, &candidate)
    }

    /// Compare mono sample arrays directly (for in-memory testing)
    pub fn compare_samples(
        &self,
        reference: &[f64],
        candidate: &[f64],
        sample_rate: u32,
    ) -> Result<ComparisonResult> {
        let reference = AudioSample::new(reference.to_vec(), sample_rate)?;
        let candidate = AudioSample::new(candidate.to_vec(), sample_rate)?;

        self.compare(&reference, &candidate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    fn tone(len: usize, freq: f64, sample_rate: u32) -> Vec<f64> {
        (0..len)
            .map(|i| (2.0 * std::f64::consts::PI * freq * i as f64 / sample_rate as f64).sin())
            .collect()
    }

    fn chirp(len: usize, sample_rate: u32) -> Vec<f64> {
        (0..len)
            .map(|i| {
                let t = i as f64 / sample_rate as f64;
                (2.0 * std::f64::consts::PI * (200.0 + 1500.0 * t) * t).sin()
            })
            .collect()
    }

    fn embed(reference: &[f64], offset: usize, len: usize) -> Vec<f64> {
        let mut candidate = vec![0.0; len];
        candidate[offset..offset + reference.len()].copy_from_slice(reference);
        candidate
    }

    #[test]
    fn test_exact_self_match() {
        let reference = chirp(800, 8000);
        let candidate = embed(&reference, 1234, 8000);

        let result = AudioMatcher::default()
            .compare_samples(&reference, &candidate, 8000)
            .unwrap();

        assert_eq!(result.offset, 1234);
        assert_eq!(result.snr, Snr::Identical);
        assert!((result.offset_seconds - 1234.0 / 8000.0).abs() < 1e-12);
    }

    #[test]
    fn test_self_match_single_sample() {
        let result = AudioMatcher::default()
            .compare_samples(&[0.5], &[0.0, 0.0, 0.5, 0.0], 8000)
            .unwrap();

        assert_eq!(result.offset, 2);
        assert!(result.snr.is_identical());
    }

    #[test]
    fn test_offset_recovery_with_one_percent_noise() {
        let sample_rate = 16000;
        let reference = chirp(1600, sample_rate);
        let mut candidate = embed(&reference, 5000, 16000);

        // Noise amplitude at 1% of the reference peak
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        for s in candidate.iter_mut() {
            *s += rng.random_range(-0.01..0.01);
        }

        for config in [MatchConfig::exact(), MatchConfig::fast()] {
            let result = AudioMatcher::new(config)
                .compare_samples(&reference, &candidate, sample_rate)
                .unwrap();

            assert_eq!(result.offset, 5000);
            // Uniform noise in ±0.01 has power 3.3e-5 against 0.5 -> ~41.8 dB
            assert!(result.snr.db() > 35.0 && result.snr.db() < 50.0);
        }
    }

    /// Offset recovery against noise amplitude, relative to the reference peak.
    ///
    /// Exact recovery holds through 50%. At 100% the lag-1 neighbour of the
    /// true peak is only ~3.5σ below it, so exact recovery is no longer
    /// guaranteed; the peak still lands within one sample.
    #[test]
    fn test_offset_recovery_noise_margin() {
        let sample_rate = 16000;
        let reference = chirp(1600, sample_rate);
        let clean = embed(&reference, 3000, 8000);

        let mut last_snr = f64::INFINITY;
        for (level, exact) in [(0.01, true), (0.1, true), (0.5, true), (1.0, false)] {
            let mut rng = ChaCha8Rng::seed_from_u64(1234);
            let candidate: Vec<f64> = clean
                .iter()
                .map(|s| s + rng.random_range(-level..level))
                .collect();

            for config in [MatchConfig::exact(), MatchConfig::fast()] {
                let result = AudioMatcher::new(config)
                    .compare_samples(&reference, &candidate, sample_rate)
                    .unwrap();

                if exact {
                    assert_eq!(result.offset, 3000, "noise level {}", level);
                } else {
                    assert!(result.offset.abs_diff(3000) <= 1, "noise level {}", level);
                }
            }

            let db = AudioMatcher::new(MatchConfig::exact())
                .compare_samples(&reference, &candidate, sample_rate)
                .unwrap()
                .snr
                .db();
            assert!(db < last_snr, "SNR must drop as noise grows");
            last_snr = db;
        }
    }

    #[test]
    fn test_sample_rate_mismatch() {
        let reference = AudioSample::new(tone(100, 440.0, 44100), 44100).unwrap();
        let candidate = AudioSample::new(tone(1000, 440.0, 48000), 48000).unwrap();

        let err = AudioMatcher::default()
            .compare(&reference, &candidate)
            .unwrap_err();

        assert!(matches!(
            err,
            SnrError::SampleRateMismatch {
                reference: 44100,
                candidate: 48000
            }
        ));
        assert_eq!(err.stage(), Stage::Validating);
    }

    #[test]
    fn test_mismatch_rejected_before_length_check() {
        // Both problems present; the rate check must win
        let reference = AudioSample::new(vec![1.0; 10], 44100).unwrap();
        let candidate = AudioSample::new(vec![1.0; 5], 48000).unwrap();

        let err = AudioMatcher::default()
            .compare(&reference, &candidate)
            .unwrap_err();
        assert!(matches!(err, SnrError::SampleRateMismatch { .. }));
    }

    #[test]
    fn test_insufficient_length() {
        let err = AudioMatcher::default()
            .compare_samples(&[1.0, 2.0, 3.0], &[1.0, 2.0], 8000)
            .unwrap_err();

        assert!(matches!(
            err,
            SnrError::InsufficientLength {
                reference: 3,
                candidate: 2
            }
        ));
        assert_eq!(err.stage(), Stage::Aligning);
    }

    #[test]
    fn test_empty_input_rejected() {
        let err = AudioMatcher::default()
            .compare_samples(&[], &[1.0], 8000)
            .unwrap_err();
        assert!(matches!(err, SnrError::EmptyAudio(_)));
    }

    #[test]
    fn test_length_invariant() {
        let reference = tone(37, 1000.0, 8000);
        for n in [37, 38, 100, 1000] {
            let mut candidate = tone(n, 700.0, 8000);
            candidate[n - 37..].copy_from_slice(&reference);

            let result = AudioMatcher::default()
                .compare_samples(&reference, &candidate, 8000)
                .unwrap();

            assert_eq!(result.matched_segment.len(), 37);
            assert_eq!(result.residual.len(), 37);
            assert_eq!(result.reference_len, 37);
            assert_eq!(result.candidate_len, n);
        }
    }

    #[test]
    fn test_tie_break_selects_smaller_offset() {
        let reference = [0.25, -0.5, 1.0];
        let mut candidate = vec![0.0; 40];
        candidate[5..8].copy_from_slice(&reference);
        candidate[30..33].copy_from_slice(&reference);

        for config in [MatchConfig::exact(), MatchConfig::fast()] {
            let result = AudioMatcher::new(config)
                .compare_samples(&reference, &candidate, 8000)
                .unwrap();
            assert_eq!(result.offset, 5);
        }
    }

    #[test]
    fn test_degraded_match_scores() {
        let reference = tone(400, 440.0, 8000);
        let degraded: Vec<f64> = reference.iter().map(|s| s * 0.9).collect();
        let candidate = embed(&degraded, 100, 2000);

        let result = AudioMatcher::default()
            .compare_samples(&reference, &candidate, 8000)
            .unwrap();

        assert_eq!(result.offset, 100);
        // Residual is -0.1 * reference -> 20 dB
        assert!((result.snr.db() - 20.0).abs() < 1e-6);
        assert!(result.passes(Some(19.0)));
        assert!(!result.passes(Some(21.0)));
        assert!(result.passes(None));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let matcher = AudioMatcher::new(MatchConfig::default().with_fft_tie_tolerance(-0.5));
        let err = matcher.compare_samples(&[1.0], &[1.0, 0.0], 8000).unwrap_err();
        assert!(matches!(err, SnrError::Config(_)));
    }

    #[test]
    fn test_compare_is_deterministic() {
        let reference = chirp(300, 8000);
        let mut candidate = tone(3000, 330.0, 8000);
        for (i, s) in reference.iter().enumerate() {
            candidate[1500 + i] += s;
        }

        let matcher = AudioMatcher::default();
        let a = matcher.compare_samples(&reference, &candidate, 8000).unwrap();
        let b = matcher.compare_samples(&reference, &candidate, 8000).unwrap();

        assert_eq!(a, b);
    }

    #[test]
    fn test_stage_display() {
        assert_eq!(Stage::Aligning.to_string(), "aligning");
        assert_eq!(Stage::Done.to_string(), "done");
    }
}

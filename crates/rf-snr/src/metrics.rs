//! Residual and signal-to-noise metrics

use crate::{Result, SnrError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Signal-to-noise ratio of a matched segment against its reference
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "db", rename_all = "snake_case")]
pub enum Snr {
    /// Ordinary ratio in dB
    Finite(f64),
    /// Noise power is exactly zero (+∞ dB)
    Identical,
    /// Reference power is zero while noise is not (−∞ dB)
    SilentReference,
    /// Non-finite powers (NaN samples or overflow); no meaningful ratio
    Undefined,
}

impl Snr {
    /// Derive from mean powers
    ///
    /// Zero noise takes precedence, so two silent signals are `Identical`.
    /// `Finite` always holds a finite value.
    pub fn from_powers(signal_power: f64, noise_power: f64) -> Self {
        if !signal_power.is_finite() || !noise_power.is_finite() {
            Snr::Undefined
        } else if noise_power == 0.0 {
            Snr::Identical
        } else if signal_power == 0.0 {
            Snr::SilentReference
        } else {
            // Difference of logs stays finite for subnormal noise powers
            let db = 10.0 * (signal_power.log10() - noise_power.log10());
            if db.is_finite() {
                Snr::Finite(db)
            } else {
                Snr::Undefined
            }
        }
    }

    /// Value in dB, using ±infinity for the limit cases and NaN when undefined
    pub fn db(&self) -> f64 {
        match self {
            Snr::Finite(db) => *db,
            Snr::Identical => f64::INFINITY,
            Snr::SilentReference => f64::NEG_INFINITY,
            Snr::Undefined => f64::NAN,
        }
    }

    /// Whether the matched segment reproduces the reference exactly
    pub fn is_identical(&self) -> bool {
        matches!(self, Snr::Identical)
    }

    /// Whether this SNR meets a minimum in dB
    pub fn meets(&self, min_db: f64) -> bool {
        self.db() >= min_db
    }
}

impl fmt::Display for Snr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Snr::Finite(db) => write!(f, "{:.2} dB", db),
            Snr::Identical => write!(f, "∞ dB (signals identical)"),
            Snr::SilentReference => write!(f, "-∞ dB (silent reference)"),
            Snr::Undefined => write!(f, "undefined (non-finite samples)"),
        }
    }
}

/// Fidelity of a matched segment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityReport {
    /// Signal-to-noise ratio
    pub snr: Snr,

    /// `matched_segment[i] - reference[i]`
    pub residual: Vec<f64>,

    /// Mean square of the reference
    pub signal_power: f64,

    /// Mean square of the residual
    pub noise_power: f64,

    /// Largest absolute residual sample
    pub peak_residual: f64,

    /// Index of `peak_residual` (first occurrence)
    pub peak_residual_index: usize,
}

impl QualityReport {
    /// RMS of the residual in dBFS
    pub fn residual_rms_db(&self) -> f64 {
        power_to_db(self.noise_power)
    }
}

/// Compare a matched segment against the reference
///
/// Both slices must have the same length. Neither is modified.
pub fn compute_quality(reference: &[f64], matched_segment: &[f64]) -> Result<QualityReport> {
    if reference.len() != matched_segment.len() {
        return Err(SnrError::LengthMismatch {
            reference: reference.len(),
            segment: matched_segment.len(),
        });
    }
    if reference.is_empty() {
        return Err(SnrError::EmptyAudio("reference has zero length".into()));
    }

    let residual: Vec<f64> = matched_segment
        .iter()
        .zip(reference.iter())
        .map(|(m, r)| m - r)
        .collect();

    let signal_power = mean_square(reference);
    let noise_power = mean_square(&residual);

    let mut peak_residual = 0.0;
    let mut peak_residual_index = 0;
    for (i, r) in residual.iter().enumerate() {
        if r.abs() > peak_residual {
            peak_residual = r.abs();
            peak_residual_index = i;
        }
    }

    Ok(QualityReport {
        snr: Snr::from_powers(signal_power, noise_power),
        residual,
        signal_power,
        noise_power,
        peak_residual,
        peak_residual_index,
    })
}

/// Mean of squared samples
pub fn mean_square(samples: &[f64]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    samples.iter().map(|s| s * s).sum::<f64>() / samples.len() as f64
}

/// Convert a power ratio to dB
fn power_to_db(power: f64) -> f64 {
    if power <= 0.0 {
        f64::NEG_INFINITY
    } else {
        10.0 * power.log10()
    }
}

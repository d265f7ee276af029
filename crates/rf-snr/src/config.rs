//! Configuration for excerpt matching

use crate::{Result, SnrError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How valid-mode cross-correlation is evaluated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrelationMethod {
    /// Pick direct or FFT from the work size
    Auto,
    /// Exact O(N·M) sum per offset
    Direct,
    /// Real FFT correlation with exact re-scoring of near-maximal offsets
    Fft,
}

impl fmt::Display for CorrelationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CorrelationMethod::Auto => "auto",
            CorrelationMethod::Direct => "direct",
            CorrelationMethod::Fft => "fft",
        };
        f.write_str(name)
    }
}

impl FromStr for CorrelationMethod {
    type Err = SnrError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(CorrelationMethod::Auto),
            "direct" => Ok(CorrelationMethod::Direct),
            "fft" => Ok(CorrelationMethod::Fft),
            other => Err(SnrError::Config(format!(
                "unknown correlation method '{}' (expected auto, direct or fft)",
                other
            ))),
        }
    }
}

/// Configuration for reference/candidate comparison
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchConfig {
    /// Correlation evaluation strategy
    pub method: CorrelationMethod,

    /// Largest `(N - M + 1) * M` multiply-add count `Auto` evaluates directly
    pub direct_work_limit: u64,

    /// Relative band below the FFT maximum whose offsets get re-scored exactly.
    /// Scaled by `‖reference‖ · ‖candidate‖`.
    pub fft_tie_tolerance: f64,

    /// Minimum SNR (dB) for a result to count as passing in reports
    pub min_snr_db: Option<f64>,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            method: CorrelationMethod::Auto,
            direct_work_limit: 1 << 24, // ~16M MACs
            fft_tie_tolerance: 1e-9,
            min_snr_db: None,
        }
    }
}

impl MatchConfig {
    /// Always evaluate the exact direct sum
    pub fn exact() -> Self {
        Self {
            method: CorrelationMethod::Direct,
            ..Default::default()
        }
    }

    /// Always use FFT correlation (long recordings)
    pub fn fast() -> Self {
        Self {
            method: CorrelationMethod::Fft,
            ..Default::default()
        }
    }

    /// Builder pattern: set correlation method
    pub fn with_method(mut self, method: CorrelationMethod) -> Self {
        self.method = method;
        self
    }

    /// Builder pattern: set direct work limit
    pub fn with_direct_work_limit(mut self, limit: u64) -> Self {
        self.direct_work_limit = limit;
        self
    }

    /// Builder pattern: set FFT tie tolerance
    pub fn with_fft_tie_tolerance(mut self, tolerance: f64) -> Self {
        self.fft_tie_tolerance = tolerance;
        self
    }

    /// Builder pattern: set pass threshold
    pub fn with_min_snr_db(mut self, db: f64) -> Self {
        self.min_snr_db = Some(db);
        self
    }

    /// Reject values the engine cannot work with
    pub fn validate(&self) -> Result<()> {
        if !self.fft_tie_tolerance.is_finite() || self.fft_tie_tolerance < 0.0 {
            return Err(SnrError::Config(format!(
                "fft_tie_tolerance must be finite and >= 0, got {}",
                self.fft_tie_tolerance
            )));
        }
        if let Some(db) = self.min_snr_db {
            if db.is_nan() {
                return Err(SnrError::Config("min_snr_db must not be NaN".into()));
            }
        }
        Ok(())
    }

    /// Resolve `Auto` for a candidate of `n` and reference of `m` samples
    pub fn resolve_method(&self, n: usize, m: usize) -> CorrelationMethod {
        match self.method {
            CorrelationMethod::Auto => {
                let offsets = n.saturating_sub(m) as u128 + 1;
                let work = offsets * m as u128;
                if work <= self.direct_work_limit as u128 {
                    CorrelationMethod::Direct
                } else {
                    CorrelationMethod::Fft
                }
            }
            fixed => fixed,
        }
    }
}

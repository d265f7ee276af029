//! Parallel batch comparison
//!
//! Each pair is independent, so pairs are spread over the rayon pool.
//! Entries come back in input order and one failing pair never aborts the rest.

use crate::config::MatchConfig;
use crate::loader::AudioData;
use crate::matcher::AudioMatcher;
use crate::report::{ComparisonSummary, MatchReport};
use crate::sample::AudioSample;
use crate::Result;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Outcome of one pair in a batch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchEntry {
    /// Caller-supplied label (file path for file batches)
    pub label: String,

    /// Summary on success, rendered error otherwise
    pub outcome: std::result::Result<ComparisonSummary, String>,
}

impl BatchEntry {
    /// Whether the pair compared successfully and met the threshold
    pub fn passed(&self, min_snr_db: Option<f64>) -> bool {
        self.outcome
            .as_ref()
            .is_ok_and(|summary| summary.passes(min_snr_db))
    }
}

/// Results of a batch run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchResult {
    /// Entries in input order
    pub entries: Vec<BatchEntry>,

    /// Threshold the batch was run with
    pub min_snr_db: Option<f64>,

    /// Total pairs
    pub total: usize,

    /// Pairs that compared without error
    pub succeeded: usize,

    /// Pairs that errored
    pub failed: usize,
}

impl BatchResult {
    fn from_entries(entries: Vec<BatchEntry>, min_snr_db: Option<f64>) -> Self {
        let succeeded = entries.iter().filter(|e| e.outcome.is_ok()).count();
        Self {
            total: entries.len(),
            failed: entries.len() - succeeded,
            succeeded,
            min_snr_db,
            entries,
        }
    }

    /// Whether every pair succeeded and met the threshold
    pub fn all_passed(&self) -> bool {
        self.entries.iter().all(|e| e.passed(self.min_snr_db))
    }

    /// One-line summary
    pub fn summary(&self) -> String {
        let passed = self
            .entries
            .iter()
            .filter(|e| e.passed(self.min_snr_db))
            .count();
        format!(
            "Batch: {} total, {} compared, {} errors, {} passed",
            self.total, self.succeeded, self.failed, passed
        )
    }

    /// Convert into a report
    pub fn to_report(&self, title: impl Into<String>) -> MatchReport {
        let mut report = MatchReport::new(title, self.min_snr_db);
        for entry in &self.entries {
            match &entry.outcome {
                Ok(summary) => report.add_summary(&entry.label, summary.clone()),
                Err(error) => report.add_error(&entry.label, error),
            }
        }
        report
    }
}

/// Compare labelled `(reference, candidate)` pairs in parallel
pub fn compare_batch(
    pairs: &[(String, AudioSample, AudioSample)],
    config: &MatchConfig,
) -> BatchResult {
    let matcher = AudioMatcher::new(config.clone());

    let entries: Vec<BatchEntry> = pairs
        .par_iter()
        .map(|(label, reference, candidate)| BatchEntry {
            label: label.clone(),
            outcome: matcher
                .compare(reference, candidate)
                .map(|result| ComparisonSummary::from(&result))
                .map_err(|e| e.to_string()),
        })
        .collect();

    BatchResult::from_entries(entries, config.min_snr_db)
}

/// Compare many recordings against one reference file
///
/// The reference is decoded once. A reference that fails to decode fails the
/// whole batch; candidate failures are recorded per entry.
pub fn compare_files_batch<P, Q>(
    reference_path: P,
    candidate_paths: &[Q],
    config: &MatchConfig,
) -> Result<BatchResult>
where
    P: AsRef<Path>,
    Q: AsRef<Path> + Sync,
{
    config.validate()?;
    let reference = AudioData::load(&reference_path)?.into_sample()?;
    log::debug!(
        "Batch reference {}: {} samples at {} Hz",
        reference_path.as_ref().display(),
        reference.len(),
        reference.sample_rate()
    );

    let matcher = AudioMatcher::new(config.clone());

    let entries: Vec<BatchEntry> = candidate_paths
        .par_iter()
        .map(|path| {
            let path = path.as_ref();
            let outcome = AudioData::load(path)
                .and_then(AudioData::into_sample)
                .and_then(|candidate| matcher.compare(&reference, &candidate))
                .map(|result| ComparisonSummary::from(&result))
                .map_err(|e| {
                    log::warn!("{}: {}", path.display(), e);
                    e.to_string()
                });

            BatchEntry {
                label: path.display().to_string(),
                outcome,
            }
        })
        .collect();

    let result = BatchResult::from_entries(entries, config.min_snr_db);
    log::info!("{}", result.summary());
    Ok(result)
}

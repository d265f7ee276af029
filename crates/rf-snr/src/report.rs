//! Report generation for comparison results

use crate::config::CorrelationMethod;
use crate::matcher::ComparisonResult;
use crate::metrics::Snr;
use crate::{Result, SnrError};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::Path;
use std::str::FromStr;

/// Report format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    /// Plain text report
    Text,
    /// JSON report
    Json,
    /// Markdown report
    Markdown,
}

impl FromStr for ReportFormat {
    type Err = SnrError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "text" | "txt" => Ok(ReportFormat::Text),
            "json" => Ok(ReportFormat::Json),
            "markdown" | "md" => Ok(ReportFormat::Markdown),
            other => Err(SnrError::Config(format!(
                "unknown report format '{}' (expected text, json or markdown)",
                other
            ))),
        }
    }
}

/// Sample-free view of a [`ComparisonResult`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonSummary {
    /// Match start in samples
    pub offset: usize,

    /// Match start in seconds
    pub offset_seconds: f64,

    /// Signal-to-noise ratio
    pub snr: Snr,

    /// Sample rate (Hz)
    pub sample_rate: u32,

    /// Reference length in samples
    pub reference_len: usize,

    /// Candidate length in samples
    pub candidate_len: usize,

    /// Mean square of the reference
    pub signal_power: f64,

    /// Mean square of the residual
    pub noise_power: f64,

    /// Largest absolute residual sample
    pub peak_residual: f64,

    /// Correlation strategy that ran
    pub method: CorrelationMethod,
}

impl ComparisonSummary {
    /// Whether the SNR meets an optional minimum
    pub fn passes(&self, min_snr_db: Option<f64>) -> bool {
        min_snr_db.is_none_or(|min| self.snr.meets(min))
    }
}

impl From<&ComparisonResult> for ComparisonSummary {
    fn from(result: &ComparisonResult) -> Self {
        Self {
            offset: result.offset,
            offset_seconds: result.offset_seconds,
            snr: result.snr,
            sample_rate: result.sample_rate,
            reference_len: result.reference_len,
            candidate_len: result.candidate_len,
            signal_power: result.signal_power,
            noise_power: result.noise_power,
            peak_residual: result.peak_residual,
            method: result.method,
        }
    }
}

/// One line of a report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportEntry {
    /// Candidate label (usually a file path)
    pub label: String,

    /// Whether the entry met the threshold
    pub passed: bool,

    /// Present when the comparison succeeded
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<ComparisonSummary>,

    /// Present when the comparison failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Collected comparison results
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchReport {
    /// Report title
    pub title: String,

    /// Timestamp (RFC 3339, UTC)
    pub timestamp: String,

    /// Pass threshold applied to entries
    pub min_snr_db: Option<f64>,

    /// Entries in insertion order
    pub entries: Vec<ReportEntry>,

    /// Total entries
    pub total: usize,

    /// Entries meeting the threshold
    pub passed: usize,

    /// Entries below the threshold
    pub failed: usize,

    /// Entries whose comparison errored
    pub errors: usize,
}

impl MatchReport {
    /// Create a new report
    pub fn new(title: impl Into<String>, min_snr_db: Option<f64>) -> Self {
        Self {
            title: title.into(),
            timestamp: chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
            min_snr_db,
            entries: Vec::new(),
            total: 0,
            passed: 0,
            failed: 0,
            errors: 0,
        }
    }

    /// Add a successful comparison
    pub fn add_result(&mut self, label: impl Into<String>, result: &ComparisonResult) {
        self.add_summary(label, ComparisonSummary::from(result));
    }

    /// Add a successful comparison already reduced to its summary
    pub fn add_summary(&mut self, label: impl Into<String>, summary: ComparisonSummary) {
        let passed = summary.passes(self.min_snr_db);
        self.total += 1;
        if passed {
            self.passed += 1;
        } else {
            self.failed += 1;
        }
        self.entries.push(ReportEntry {
            label: label.into(),
            passed,
            summary: Some(summary),
            error: None,
        });
    }

    /// Add a comparison that returned an error
    pub fn add_error(&mut self, label: impl Into<String>, error: impl Into<String>) {
        self.total += 1;
        self.errors += 1;
        self.entries.push(ReportEntry {
            label: label.into(),
            passed: false,
            summary: None,
            error: Some(error.into()),
        });
    }

    /// Check if every entry passed
    pub fn all_passed(&self) -> bool {
        self.failed == 0 && self.errors == 0
    }

    /// Get pass rate (0.0 - 1.0)
    pub fn pass_rate(&self) -> f64 {
        if self.total == 0 {
            1.0
        } else {
            self.passed as f64 / self.total as f64
        }
    }

    /// Generate report in specified format
    pub fn generate(&self, format: ReportFormat) -> String {
        match format {
            ReportFormat::Text => self.to_text(),
            ReportFormat::Json => self.to_json(),
            ReportFormat::Markdown => self.to_markdown(),
        }
    }

    /// Save report to file
    pub fn save<P: AsRef<Path>>(&self, path: P, format: ReportFormat) -> std::io::Result<()> {
        let content = self.generate(format);
        let mut file = std::fs::File::create(path)?;
        file.write_all(content.as_bytes())
    }

    fn to_text(&self) -> String {
        let mut output = String::new();

        output.push_str(&format!("{}\n", self.title));
        output.push_str(&format!("{}\n\n", "=".repeat(self.title.chars().count())));

        output.push_str(&format!("Timestamp: {}\n", self.timestamp));
        if let Some(min) = self.min_snr_db {
            output.push_str(&format!("Minimum SNR: {:.2} dB\n", min));
        }
        output.push_str(&format!(
            "Total: {} | Passed: {} | Failed: {} | Errors: {}\n\n",
            self.total, self.passed, self.failed, self.errors
        ));

        output.push_str("Results:\n");
        output.push_str(&"-".repeat(80));
        output.push('\n');

        for entry in &self.entries {
            match (&entry.summary, &entry.error) {
                (Some(summary), _) => {
                    let status = if entry.passed { "PASS" } else { "FAIL" };
                    output.push_str(&format!("[{}] {}\n", status, entry.label));
                    output.push_str(&format!(
                        "  Match position: {:.2} s (sample {})\n",
                        summary.offset_seconds, summary.offset
                    ));
                    output.push_str(&format!("  SNR: {}\n", format_snr(&summary.snr)));
                }
                (None, Some(error)) => {
                    output.push_str(&format!("[ERROR] {}\n", entry.label));
                    output.push_str(&format!("  {}\n", error));
                }
                (None, None) => {}
            }
            output.push('\n');
        }

        output.push_str(&"-".repeat(80));
        output.push('\n');
        output.push_str(&format!(
            "Summary: {} comparisons, {} passed, {} failed, {} errors\n",
            self.total, self.passed, self.failed, self.errors
        ));

        output
    }

    fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| "{}".into())
    }

    fn to_markdown(&self) -> String {
        let mut output = String::new();

        output.push_str(&format!("# {}\n\n", self.title));
        output.push_str(&format!("**Timestamp:** {}\n\n", self.timestamp));

        let status_emoji = if self.all_passed() { "✅" } else { "❌" };
        output.push_str(&format!("## Summary {}\n\n", status_emoji));
        output.push_str("| Metric | Value |\n");
        output.push_str("|--------|-------|\n");
        output.push_str(&format!("| Total | {} |\n", self.total));
        output.push_str(&format!("| Passed | {} |\n", self.passed));
        output.push_str(&format!("| Failed | {} |\n", self.failed));
        output.push_str(&format!("| Errors | {} |\n", self.errors));
        if let Some(min) = self.min_snr_db {
            output.push_str(&format!("| Minimum SNR | {:.2} dB |\n", min));
        }
        output.push('\n');

        output.push_str("## Results\n\n");
        output.push_str("| Candidate | Status | Position (s) | SNR |\n");
        output.push_str("|-----------|--------|--------------|-----|\n");

        for entry in &self.entries {
            let name = Path::new(&entry.label)
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or(&entry.label);

            match (&entry.summary, &entry.error) {
                (Some(summary), _) => {
                    let icon = if entry.passed { "✓" } else { "✗" };
                    output.push_str(&format!(
                        "| `{}` | {} | {:.2} | {} |\n",
                        name,
                        icon,
                        summary.offset_seconds,
                        format_snr(&summary.snr)
                    ));
                }
                (None, Some(error)) => {
                    output.push_str(&format!("| `{}` | error | - | {} |\n", name, error));
                }
                (None, None) => {}
            }
        }

        output
    }
}

/// Human-readable SNR, distinguishing the infinite cases
pub fn format_snr(snr: &Snr) -> String {
    snr.to_string()
}

/// One-line summary: match position and SNR
pub fn summary_line(result: &ComparisonResult) -> String {
    format!(
        "Match position: {:.2} s | SNR: {}",
        result.offset_seconds,
        format_snr(&result.snr)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::AudioMatcher;

    fn make_result(noise_scale: f64) -> ComparisonResult {
        let reference: Vec<f64> = (0..1024)
            .map(|i| (2.0 * std::f64::consts::PI * 440.0 * i as f64 / 44100.0).sin())
            .collect();
        let mut candidate = vec![0.0; 44100];
        for (i, &s) in reference.iter().enumerate() {
            candidate[22050 + i] = s * (1.0 - noise_scale);
        }

        AudioMatcher::default()
            .compare_samples(&reference, &candidate, 44100)
            .unwrap()
    }

    #[test]
    fn test_summary_line() {
        let line = summary_line(&make_result(0.0));
        assert_eq!(line, "Match position: 0.50 s | SNR: ∞ dB (signals identical)");

        let line = summary_line(&make_result(0.1));
        assert!(line.ends_with("SNR: 20.00 dB"), "{}", line);
    }

    #[test]
    fn test_report_counts() {
        let mut report = MatchReport::new("Reception Check", Some(30.0));
        report.add_result("clean.wav", &make_result(0.0));
        report.add_result("noisy.wav", &make_result(0.1));
        report.add_error("broken.flac", "Failed to decode audio: bad header");

        assert_eq!(report.total, 3);
        assert_eq!(report.passed, 1);
        assert_eq!(report.failed, 1);
        assert_eq!(report.errors, 1);
        assert!(!report.all_passed());
        assert!((report.pass_rate() - 1.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_text_report() {
        let mut report = MatchReport::new("Reception Check", None);
        report.add_result("clean.wav", &make_result(0.0));

        let text = report.generate(ReportFormat::Text);
        assert!(text.contains("Reception Check"));
        assert!(text.contains("[PASS] clean.wav"));
        assert!(text.contains("Match position: 0.50 s (sample 22050)"));
        assert!(text.contains("∞ dB"));
    }

    #[test]
    fn test_json_report() {
        let mut report = MatchReport::new("Reception Check", Some(10.0));
        report.add_result("noisy.wav", &make_result(0.1));
        report.add_error("broken.flac", "bad header");

        let json = report.generate(ReportFormat::Json);
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["total"], 2);
        assert_eq!(value["entries"][0]["summary"]["offset"], 22050);
        assert_eq!(value["entries"][0]["summary"]["snr"]["kind"], "finite");
        assert!(value["entries"][0].get("error").is_none());
        assert_eq!(value["entries"][1]["error"], "bad header");
    }

    #[test]
    fn test_markdown_report() {
        let mut report = MatchReport::new("Reception Check", None);
        report.add_result("/data/rx/clean.wav", &make_result(0.0));

        let md = report.generate(ReportFormat::Markdown);
        assert!(md.contains("# Reception Check"));
        assert!(md.contains("| Metric |"));
        assert!(md.contains("`clean.wav`"));
    }

    #[test]
    fn test_format_parse() {
        assert_eq!("md".parse::<ReportFormat>().unwrap(), ReportFormat::Markdown);
        assert_eq!("JSON".parse::<ReportFormat>().unwrap(), ReportFormat::Json);
        assert!("junit".parse::<ReportFormat>().is_err());
    }

    #[test]
    fn test_save_report() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.md");

        let mut report = MatchReport::new("Reception Check", None);
        report.add_result("clean.wav", &make_result(0.0));
        report.save(&path, ReportFormat::Markdown).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("# Reception Check"));
    }
}

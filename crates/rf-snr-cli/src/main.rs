//! snr-match: locate a reference excerpt inside a recording and report SNR
//!
//! Usage:
//!   snr-match compare <REFERENCE> <CANDIDATE>      - Match one recording
//!   snr-match batch <REFERENCE> <CANDIDATES>...    - Match many recordings in parallel
//!
//! Exit status: 0 on success, 1 on error, 2 when `--min-snr` is not met.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use rf_snr::report::summary_line;
use rf_snr::{
    AudioMatcher, CorrelationMethod, MatchConfig, MatchReport, ReportFormat, compare_files_batch,
    save_wav,
};

#[derive(Parser)]
#[command(
    name = "snr-match",
    version,
    about = "Find a reference excerpt in a recording and measure its SNR"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Clone)]
struct MatchOptions {
    /// Correlation method (auto, direct, fft)
    #[arg(short, long, default_value = "auto")]
    method: CorrelationMethod,

    /// Output format (text, json, markdown)
    #[arg(short, long, default_value = "text")]
    format: ReportFormat,

    /// Fail when the SNR is below this value (dB)
    #[arg(long, allow_negative_numbers = true)]
    min_snr: Option<f64>,
}

impl MatchOptions {
    fn config(&self) -> MatchConfig {
        let config = MatchConfig::default().with_method(self.method);
        match self.min_snr {
            Some(db) => config.with_min_snr_db(db),
            None => config,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Match one recording against a reference excerpt
    Compare {
        /// Reference excerpt
        reference: PathBuf,

        /// Recording to search
        candidate: PathBuf,

        #[command(flatten)]
        options: MatchOptions,

        /// Write the matched segment to a WAV file
        #[arg(long)]
        export_matched: Option<PathBuf>,

        /// Write the residual to a WAV file
        #[arg(long)]
        export_residual: Option<PathBuf>,
    },
    /// Match many recordings against one reference excerpt
    Batch {
        /// Reference excerpt
        reference: PathBuf,

        /// Recordings to search
        #[arg(required = true)]
        candidates: Vec<PathBuf>,

        #[command(flatten)]
        options: MatchOptions,

        /// Write the report to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<ExitCode> {
    env_logger::init();
    let cli = Cli::parse();

    let passed = match cli.command {
        Commands::Compare {
            reference,
            candidate,
            options,
            export_matched,
            export_residual,
        } => run_compare(
            &reference,
            &candidate,
            &options,
            export_matched,
            export_residual,
        )?,
        Commands::Batch {
            reference,
            candidates,
            options,
            output,
        } => run_batch(&reference, &candidates, &options, output)?,
    };

    Ok(if passed {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(2)
    })
}

fn run_compare(
    reference: &Path,
    candidate: &Path,
    options: &MatchOptions,
    export_matched: Option<PathBuf>,
    export_residual: Option<PathBuf>,
) -> Result<bool> {
    let config = options.config();
    let matcher = AudioMatcher::new(config.clone());

    let result = matcher.compare_files(reference, candidate).with_context(|| {
        format!(
            "Failed to match {} against {}",
            reference.display(),
            candidate.display()
        )
    })?;
    log::debug!(
        "Matched with {} correlation, peak {:.4}",
        result.method,
        result.peak_correlation
    );

    if let Some(path) = export_matched {
        save_wav(&result.matched_segment, result.sample_rate, &path)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        log::info!("Matched segment written to {}", path.display());
    }
    if let Some(path) = export_residual {
        save_wav(&result.residual, result.sample_rate, &path)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        log::info!("Residual written to {}", path.display());
    }

    match options.format {
        ReportFormat::Text => println!("{}", summary_line(&result)),
        format => {
            let mut report = MatchReport::new("SNR Match", config.min_snr_db);
            report.add_result(candidate.display().to_string(), &result);
            println!("{}", report.generate(format));
        }
    }

    Ok(result.passes(config.min_snr_db))
}

fn run_batch(
    reference: &Path,
    candidates: &[PathBuf],
    options: &MatchOptions,
    output: Option<PathBuf>,
) -> Result<bool> {
    if candidates.is_empty() {
        bail!("No candidate recordings given");
    }

    let config = options.config();
    let batch = compare_files_batch(reference, candidates, &config)
        .with_context(|| format!("Failed to run batch against {}", reference.display()))?;

    let report = batch.to_report(format!("SNR Match: {}", reference.display()));
    match output {
        Some(path) => {
            report
                .save(&path, options.format)
                .with_context(|| format!("Failed to write report to {}", path.display()))?;
            println!("{}", batch.summary());
        }
        None => println!("{}", report.generate(options.format)),
    }

    if batch.failed > 0 {
        bail!("{} of {} recordings could not be compared", batch.failed, batch.total);
    }

    Ok(batch.all_passed())
}

//! Reference excerpt alignment
//!
//! Finds the start offset in a candidate recording (length N) that best
//! matches a reference excerpt (length M) by valid-mode cross-correlation:
//!
//! ```text
//! corr[k] = Σ_{i=0}^{M-1} candidate[k + i] · reference[i],   k = 0 ..= N - M
//! ```
//!
//! The winning offset is the maximum of `corr`. Ties resolve to the smallest
//! offset and NaN values never win.
//!
//! Two evaluation strategies produce the same offset:
//!
//! - **Direct**: the sum above, O(N·M).
//! - **FFT**: circular correlation through a real FFT of length
//!   `next_pow2(N)`, O(N log N). Every offset whose FFT value lies within
//!   `fft_tie_tolerance · ‖reference‖ · ‖candidate‖` of the FFT maximum is
//!   re-scored with the direct sum before selection, so rounding noise in the
//!   transform cannot reorder near-equal peaks.

use crate::config::{CorrelationMethod, MatchConfig};
use crate::{Result, SnrError};
use num_complex::Complex64;
use realfft::RealFftPlanner;
use serde::{Deserialize, Serialize};

/// Best offset found by the correlation search
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BestOffset {
    /// Start index into the candidate
    pub offset: usize,

    /// Exact correlation value at `offset`
    pub correlation: f64,

    /// Strategy that was used (never `Auto`)
    pub method: CorrelationMethod,
}

/// Offset plus the candidate segment it selects
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlignmentResult {
    /// Start index into the candidate
    pub offset: usize,

    /// `candidate[offset..offset + M]`, copied
    pub matched_segment: Vec<f64>,

    /// Exact correlation value at `offset`
    pub peak_correlation: f64,

    /// Strategy that was used (never `Auto`)
    pub method: CorrelationMethod,
}

impl AlignmentResult {
    /// Offset converted to seconds
    pub fn offset_seconds(&self, sample_rate: u32) -> f64 {
        self.offset as f64 / sample_rate as f64
    }
}

/// Align `reference` inside `candidate` and copy out the matched segment
pub fn align(candidate: &[f64], reference: &[f64], config: &MatchConfig) -> Result<AlignmentResult> {
    let best = find_best_offset(candidate, reference, config)?;
    let end = best.offset + reference.len();

    Ok(AlignmentResult {
        offset: best.offset,
        matched_segment: candidate[best.offset..end].to_vec(),
        peak_correlation: best.correlation,
        method: best.method,
    })
}

/// Find the offset with maximal valid-mode correlation
pub fn find_best_offset(
    candidate: &[f64],
    reference: &[f64],
    config: &MatchConfig,
) -> Result<BestOffset> {
    check_lengths(candidate, reference)?;

    let method = config.resolve_method(candidate.len(), reference.len());

    // Only one valid offset
    if candidate.len() == reference.len() {
        return Ok(BestOffset {
            offset: 0,
            correlation: dot(candidate, reference),
            method,
        });
    }

    let (offset, correlation) = match method {
        CorrelationMethod::Fft => best_offset_fft(candidate, reference, config.fft_tie_tolerance)?,
        _ => best_offset_direct(candidate, reference),
    };

    Ok(BestOffset {
        offset,
        correlation,
        method,
    })
}

/// All `N - M + 1` correlation values by direct summation
pub fn cross_correlate_direct(candidate: &[f64], reference: &[f64]) -> Result<Vec<f64>> {
    check_lengths(candidate, reference)?;

    Ok(candidate
        .windows(reference.len())
        .map(|window| dot(window, reference))
        .collect())
}

/// All `N - M + 1` correlation values through a real FFT
///
/// Values agree with [`cross_correlate_direct`] up to floating-point
/// rounding of the transform.
pub fn cross_correlate_fft(candidate: &[f64], reference: &[f64]) -> Result<Vec<f64>> {
    check_lengths(candidate, reference)?;

    let n = candidate.len();
    let m = reference.len();
    // No wrap-around for k + i <= N - 1 < fft_len
    let fft_len = n.next_power_of_two().max(2);

    let mut planner = RealFftPlanner::<f64>::new();
    let forward = planner.plan_fft_forward(fft_len);
    let inverse = planner.plan_fft_inverse(fft_len);

    let mut candidate_buf = forward.make_input_vec();
    candidate_buf[..n].copy_from_slice(candidate);
    let mut reference_buf = forward.make_input_vec();
    reference_buf[..m].copy_from_slice(reference);

    let mut candidate_spectrum: Vec<Complex64> = forward.make_output_vec();
    let mut reference_spectrum: Vec<Complex64> = forward.make_output_vec();

    forward
        .process(&mut candidate_buf, &mut candidate_spectrum)
        .map_err(|e| SnrError::Fft(e.to_string()))?;
    forward
        .process(&mut reference_buf, &mut reference_spectrum)
        .map_err(|e| SnrError::Fft(e.to_string()))?;

    for (c, r) in candidate_spectrum.iter_mut().zip(reference_spectrum.iter()) {
        *c *= r.conj();
    }

    // DC and Nyquist of a real signal's spectrum are real
    if let Some(first) = candidate_spectrum.first_mut() {
        first.im = 0.0;
    }
    if let Some(last) = candidate_spectrum.last_mut() {
        last.im = 0.0;
    }

    let mut output = inverse.make_output_vec();
    inverse
        .process(&mut candidate_spectrum, &mut output)
        .map_err(|e| SnrError::Fft(e.to_string()))?;

    let scale = 1.0 / fft_len as f64;
    Ok(output[..=n - m].iter().map(|v| v * scale).collect())
}

/// Index of the first maximal value, skipping NaN
///
/// Returns `None` for an empty slice. An all-NaN slice selects index 0.
pub fn argmax_first(values: &[f64]) -> Option<usize> {
    if values.is_empty() {
        return None;
    }
    let (index, _) = first_max(values.iter().copied().enumerate());
    Some(index)
}

fn check_lengths(candidate: &[f64], reference: &[f64]) -> Result<()> {
    if reference.is_empty() {
        return Err(SnrError::EmptyAudio("reference has zero length".into()));
    }
    if candidate.is_empty() {
        return Err(SnrError::EmptyAudio("candidate has zero length".into()));
    }
    if candidate.len() < reference.len() {
        return Err(SnrError::InsufficientLength {
            reference: reference.len(),
            candidate: candidate.len(),
        });
    }
    Ok(())
}

fn best_offset_direct(candidate: &[f64], reference: &[f64]) -> (usize, f64) {
    first_max(
        candidate
            .windows(reference.len())
            .map(|window| dot(window, reference))
            .enumerate(),
    )
}

fn best_offset_fft(candidate: &[f64], reference: &[f64], tolerance: f64) -> Result<(usize, f64)> {
    let reference_energy = energy(reference);
    let candidate_energy = energy(candidate);

    if !reference_energy.is_finite() || !candidate_energy.is_finite() {
        // Non-finite samples: only the direct sum keeps NaN from winning
        return Ok(best_offset_direct(candidate, reference));
    }

    // Every correlation is exactly zero
    if reference_energy == 0.0 || candidate_energy == 0.0 {
        return Ok((0, 0.0));
    }

    let approx = cross_correlate_fft(candidate, reference)?;
    let fft_max = approx.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    if !fft_max.is_finite() {
        // Transform overflowed
        return Ok(best_offset_direct(candidate, reference));
    }

    let band = tolerance * reference_energy.sqrt() * candidate_energy.sqrt();
    let threshold = fft_max - band;
    let m = reference.len();

    Ok(first_max(
        approx
            .iter()
            .enumerate()
            .filter(|&(_, &value)| value >= threshold)
            .map(|(offset, _)| (offset, dot(&candidate[offset..offset + m], reference))),
    ))
}

/// First `(index, value)` with the greatest value; `>` keeps NaN from winning
fn first_max(mut values: impl Iterator<Item = (usize, f64)>) -> (usize, f64) {
    let Some(first) = values.next() else {
        return (0, f64::NAN);
    };

    values.fold(first, |best, (index, value)| {
        if value > best.1 || (best.1.is_nan() && !value.is_nan()) {
            (index, value)
        } else {
            best
        }
    })
}

#[inline]
fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

#[inline]
fn energy(x: &[f64]) -> f64 {
    x.iter().map(|s| s * s).sum()
}

//! Spectral flux onset detection
//!
//! Onset strength is the half-wave rectified increase in spectral magnitude
//! from one frame to the next. Onsets are rising peaks of that curve above an
//! adaptive threshold.

/// Spectral flux between two magnitude spectra
///
/// Only bins whose magnitude increased contribute, so note releases and
/// decays produce no flux. Extra bins in the longer slice are ignored.
pub fn spectral_flux(current: &[f32], previous: &[f32]) -> f32 {
    current
        .iter()
        .zip(previous.iter())
        .map(|(&cur, &prev)| (cur - prev).max(0.0))
        .sum()
}

/// Detect onsets in a flux curve
///
/// An onset is declared at frame `i` (`i >= 1`) when `flux[i] > threshold`
/// and `flux[i] > flux[i - 1]`.
///
/// # Arguments
///
/// * `flux` - Per-frame spectral flux values
/// * `threshold` - Absolute onset threshold (see [`adaptive_threshold`](super::adaptive_threshold))
///
/// # Returns
///
/// Vector of onset frame indices, ascending
pub fn detect_onsets(flux: &[f32], threshold: f32) -> Vec<usize> {
    let onsets: Vec<usize> = flux
        .windows(2)
        .enumerate()
        .filter(|(_, pair)| pair[1] > threshold && pair[1] > pair[0])
        .map(|(i, _)| i + 1)
        .collect();

    log::debug!(
        "Detected {} onsets in {} flux frames (threshold {:.6})",
        onsets.len(),
        flux.len(),
        threshold
    );
    onsets
}

//! Period estimation modules
//!
//! Convert a spectral-flux curve to a single BPM estimate:
//! - Adaptive threshold and rising-peak onset picking
//! - Inter-onset interval histogram
//! - Octave-error correction

pub mod interval_histogram;

pub use interval_histogram::{correct_octave, dominant_bpm, intervals, onset_times_ms};

use crate::config::AnalysisConfig;
use crate::error::AnalysisError;
use crate::features::onset::{adaptive_threshold, detect_onsets};

/// Offline BPM estimate for one track
#[derive(Debug, Clone, PartialEq)]
pub struct BpmEstimate {
    /// Final estimate, within `[min_bpm, max_bpm]`
    pub bpm: f32,

    /// Dominant histogram bin before octave correction
    /// (`None` when the default BPM was used)
    pub raw_bpm: Option<f32>,

    /// Number of onsets found
    pub onset_count: usize,
}

impl BpmEstimate {
    /// True when there was too little rhythmic evidence and the default BPM was returned
    pub fn is_fallback(&self) -> bool {
        self.raw_bpm.is_none()
    }
}

/// Estimate BPM from a track's per-frame spectral flux
///
/// Fewer than `config.min_flux_frames` frames or fewer than
/// `config.min_onsets` onsets is not an error: the estimate falls back to
/// `config.default_bpm`.
///
/// # Arguments
///
/// * `flux` - Per-frame spectral flux values
/// * `hop_size` - Samples between frames
/// * `sample_rate` - Sample rate in Hz
/// * `config` - Thresholding, histogram, and range parameters
///
/// # Errors
///
/// Returns `AnalysisError::InvalidInput` for a zero sample rate or hop size.
pub fn estimate_bpm(
    flux: &[f32],
    hop_size: usize,
    sample_rate: u32,
    config: &AnalysisConfig,
) -> Result<BpmEstimate, AnalysisError> {
    if sample_rate == 0 || hop_size == 0 {
        return Err(AnalysisError::InvalidInput(format!(
            "Invalid timing: sample_rate={}, hop_size={}",
            sample_rate, hop_size
        )));
    }

    let fallback = |onset_count: usize| BpmEstimate {
        bpm: config.default_bpm,
        raw_bpm: None,
        onset_count,
    };

    if flux.len() < config.min_flux_frames {
        log::debug!(
            "Only {} flux frames (< {}), using default {} BPM",
            flux.len(),
            config.min_flux_frames,
            config.default_bpm
        );
        return Ok(fallback(0));
    }

    let threshold = adaptive_threshold(flux, config.threshold_std_factor)?;
    let onsets = detect_onsets(flux, threshold);
    if onsets.len() < config.min_onsets {
        log::debug!(
            "Only {} onsets (< {}), using default {} BPM",
            onsets.len(),
            config.min_onsets,
            config.default_bpm
        );
        return Ok(fallback(onsets.len()));
    }

    let times = onset_times_ms(&onsets, hop_size, sample_rate);
    let Some(raw) = dominant_bpm(&intervals(&times), config.histogram_bin_bpm) else {
        return Ok(fallback(onsets.len()));
    };

    let bpm = correct_octave(raw, config.min_bpm, config.max_bpm);
    log::debug!("BPM estimate: raw {:.1} -> {:.1} ({} onsets)", raw, bpm, onsets.len());

    Ok(BpmEstimate {
        bpm,
        raw_bpm: Some(raw),
        onset_count: onsets.len(),
    })
}

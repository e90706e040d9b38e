//! Adaptive thresholding for onset detection
//!
//! `threshold = median(values) + k * spread`, where `spread` is the root mean
//! square deviation of the values from that median. With the default
//! `k = 0.5` this sits just above the bulk of a flux curve that is silent
//! most of the time.

use crate::error::AnalysisError;

/// Upper median: `sorted[len / 2]`
///
/// Returns `None` for an empty slice. NaN values sort as equal.
pub fn median(values: &[f32]) -> Option<f32> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    Some(sorted[sorted.len() / 2])
}

/// Compute the adaptive onset threshold
///
/// # Arguments
///
/// * `values` - Flux values to threshold
/// * `k` - Multiplier for the deviation term (0.5 in the offline pipeline)
///
/// # Returns
///
/// Threshold value
///
/// # Errors
///
/// Returns `AnalysisError` if values are empty or `k` is negative
pub fn adaptive_threshold(values: &[f32], k: f32) -> Result<f32, AnalysisError> {
    if k < 0.0 {
        return Err(AnalysisError::InvalidInput(
            "Threshold multiplier k must be non-negative".to_string(),
        ));
    }
    let median = median(values).ok_or_else(|| {
        AnalysisError::InvalidInput("Empty values for threshold calculation".to_string())
    })?;

    let mean_sq_dev = values
        .iter()
        .map(|&v| {
            let d = v - median;
            d * d
        })
        .sum::<f32>()
        / values.len() as f32;

    Ok(median + k * mean_sq_dev.sqrt())
}

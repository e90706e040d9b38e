//! Channel mixing utilities (multi-channel to mono conversion)

use crate::error::AnalysisError;

/// Average per-channel buffers into one mono buffer
///
/// A single channel is returned as-is. Channels of unequal length are mixed
/// over the shortest one.
///
/// # Arguments
///
/// * `channels` - One sample buffer per channel
///
/// # Returns
///
/// Mono samples
///
/// # Errors
///
/// Returns `AnalysisError::InvalidInput` if there are no channels
pub fn mix_to_mono(channels: &[Vec<f32>]) -> Result<Vec<f32>, AnalysisError> {
    match channels {
        [] => Err(AnalysisError::InvalidInput(
            "Cannot mix zero channels".to_string(),
        )),
        [mono] => Ok(mono.clone()),
        _ => {
            let len = channels.iter().map(Vec::len).min().unwrap_or(0);
            if channels.iter().any(|c| c.len() != len) {
                log::warn!(
                    "Channel lengths differ, mixing the first {} samples",
                    len
                );
            }
            log::debug!("Mixing {} channels to mono ({} samples)", channels.len(), len);

            let scale = 1.0 / channels.len() as f32;
            Ok((0..len)
                .map(|i| channels.iter().map(|c| c[i]).sum::<f32>() * scale)
                .collect())
        }
    }
}

//! Decoder boundary
//!
//! Container demuxing and PCM decoding happen outside this crate. A
//! [`SampleSource`] hands the analyzer per-channel float buffers at a known
//! sample rate.

use std::path::Path;

use crate::error::AnalysisError;

/// Decoded PCM audio, one buffer per channel
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedAudio {
    /// Per-channel samples in [-1.0, 1.0]
    pub channels: Vec<Vec<f32>>,

    /// Sample rate in Hz
    pub sample_rate: u32,
}

impl DecodedAudio {
    /// Wrap a mono buffer
    pub fn mono(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            channels: vec![samples],
            sample_rate,
        }
    }

    /// Duration in seconds of the shortest channel
    pub fn duration_seconds(&self) -> f32 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        let len = self.channels.iter().map(Vec::len).min().unwrap_or(0);
        len as f32 / self.sample_rate as f32
    }
}

/// External collaborator that decodes a track into PCM
///
/// Implementations report failures as [`AnalysisError::DecodeUnavailable`].
/// Must be `Sync`: calibration decodes tracks in parallel.
pub trait SampleSource: Sync {
    /// Decode the track at `path`
    fn decode(&self, path: &Path) -> Result<DecodedAudio, AnalysisError>;
}

impl<T: SampleSource + ?Sized> SampleSource for &T {
    fn decode(&self, path: &Path) -> Result<DecodedAudio, AnalysisError> {
        (**self).decode(path)
    }
}

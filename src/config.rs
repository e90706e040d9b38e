//! Configuration parameters for analysis, streaming, and calibration

use serde::{Deserialize, Serialize};

use crate::error::AnalysisError;

/// Highest tempo the streaming processor accepts as `max_tempo`
///
/// Bounds the pre-allocated beat history (`history_seconds * MAX_SUPPORTED_TEMPO / 60`).
pub const MAX_SUPPORTED_TEMPO: f32 = 400.0;

/// Offline analysis configuration parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    // STFT parameters
    /// Frame size for STFT (default: 2048)
    pub frame_size: usize,

    /// Hop size for STFT (default: 512)
    pub hop_size: usize,

    // BPM detection
    /// Minimum BPM of the final estimate (default: 60.0)
    pub min_bpm: f32,

    /// Maximum BPM of the final estimate (default: 200.0)
    pub max_bpm: f32,

    /// BPM returned when there is too little rhythmic evidence (default: 120.0)
    pub default_bpm: f32,

    /// Minimum number of onsets needed for a tempo estimate (default: 4)
    pub min_onsets: usize,

    /// Minimum number of flux frames needed for a tempo estimate (default: 10)
    pub min_flux_frames: usize,

    /// Threshold = median + factor * stddev over the flux curve (default: 0.5)
    pub threshold_std_factor: f32,

    /// Width of the instantaneous-BPM histogram bins (default: 5.0)
    pub histogram_bin_bpm: f32,

    // Key detection
    /// Lowest frequency folded into chroma (default: 65 Hz, ~C2)
    pub chroma_min_hz: f32,

    /// Highest frequency folded into chroma (default: 5000 Hz)
    pub chroma_max_hz: f32,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            frame_size: 2048,
            hop_size: 512,
            min_bpm: 60.0,
            max_bpm: 200.0,
            default_bpm: 120.0,
            min_onsets: 4,
            min_flux_frames: 10,
            threshold_std_factor: 0.5,
            histogram_bin_bpm: 5.0,
            chroma_min_hz: 65.0,
            chroma_max_hz: 5000.0,
        }
    }
}

impl AnalysisConfig {
    /// Check the parameters for internal consistency
    pub fn validate(&self) -> Result<(), AnalysisError> {
        if self.frame_size == 0 || self.hop_size == 0 {
            return Err(AnalysisError::InvalidInput(
                "Frame size and hop size must be > 0".to_string(),
            ));
        }
        if self.hop_size > self.frame_size {
            return Err(AnalysisError::InvalidInput(format!(
                "Hop size ({}) must not exceed frame size ({})",
                self.hop_size, self.frame_size
            )));
        }
        if !(self.min_bpm > 0.0 && self.min_bpm < self.max_bpm) {
            return Err(AnalysisError::InvalidTempoRange {
                min: self.min_bpm,
                max: self.max_bpm,
            });
        }
        if self.histogram_bin_bpm <= 0.0 {
            return Err(AnalysisError::InvalidInput(
                "Histogram bin width must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Real-time beat/tempo processor configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamingConfig {
    /// Sample rate of the incoming blocks in Hz (default: 44100)
    pub sample_rate: u32,

    /// Analysis frame size (default: 2048)
    pub frame_size: usize,

    /// Samples between analysed frames (default: 512)
    pub hop_size: usize,

    /// Lower tempo clamp in BPM (default: 60.0)
    pub min_tempo: f32,

    /// Upper tempo clamp in BPM; also sets the refractory period
    /// `60 / max_tempo` seconds (default: 200.0)
    pub max_tempo: f32,

    /// Onset-strength threshold for accepting a beat (default: 0.3)
    pub sensitivity: f32,

    /// Exponential smoothing factor for frame energy (default: 0.1)
    pub smoothing_alpha: f32,

    /// Length of the rolling beat history in seconds (default: 10.0)
    pub history_seconds: f64,

    /// Frames between tempo re-estimations (default: 20)
    ///
    /// The interval is `tempo_update_frames * hop_size / sample_rate`: about
    /// 0.23 s with the default 512-sample hop at 44.1 kHz. Use 43 frames for
    /// a half-second cadence at those settings.
    pub tempo_update_frames: u64,

    /// Relative interval error still counted as agreeing with the tempo (default: 0.2)
    pub confidence_tolerance: f32,

    /// Capacity of the outbound event queue (default: 256)
    pub event_capacity: usize,

    /// Capacity of the inbound command queue (default: 64)
    pub command_capacity: usize,

    /// Whether analysis runs before the first start command (default: false)
    pub start_active: bool,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44100,
            frame_size: 2048,
            hop_size: 512,
            min_tempo: 60.0,
            max_tempo: 200.0,
            sensitivity: 0.3,
            smoothing_alpha: 0.1,
            history_seconds: 10.0,
            tempo_update_frames: 20,
            confidence_tolerance: 0.2,
            event_capacity: 256,
            command_capacity: 64,
            start_active: false,
        }
    }
}

impl StreamingConfig {
    /// Check the parameters for internal consistency
    pub fn validate(&self) -> Result<(), AnalysisError> {
        if self.sample_rate == 0 {
            return Err(AnalysisError::InvalidInput(
                "Invalid sample rate".to_string(),
            ));
        }
        if self.frame_size == 0 || self.hop_size == 0 || self.hop_size > self.frame_size {
            return Err(AnalysisError::InvalidInput(format!(
                "Invalid frame/hop sizes: frame={}, hop={}",
                self.frame_size, self.hop_size
            )));
        }
        if !(self.smoothing_alpha > 0.0 && self.smoothing_alpha <= 1.0) {
            return Err(AnalysisError::InvalidInput(format!(
                "Smoothing alpha must be in (0, 1], got {}",
                self.smoothing_alpha
            )));
        }
        validate_sensitivity(self.sensitivity)?;
        if self.tempo_update_frames == 0 || self.event_capacity == 0 || self.command_capacity == 0 {
            return Err(AnalysisError::InvalidInput(
                "Update cadence and queue capacities must be > 0".to_string(),
            ));
        }
        validate_tempo_range(self.min_tempo, self.max_tempo)
    }
}

/// Reject ranges with min >= max, non-positive min, or max above [`MAX_SUPPORTED_TEMPO`]
pub fn validate_tempo_range(min: f32, max: f32) -> Result<(), AnalysisError> {
    if min > 0.0 && min < max && max <= MAX_SUPPORTED_TEMPO {
        Ok(())
    } else {
        Err(AnalysisError::InvalidTempoRange { min, max })
    }
}

/// Reject negative or non-finite onset thresholds
pub fn validate_sensitivity(value: f32) -> Result<(), AnalysisError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(AnalysisError::InvalidInput(format!(
            "Sensitivity must be a finite value >= 0, got {}",
            value
        )))
    }
}

/// Calibration run parameters
///
/// The candidate multipliers and BPM tolerance are part of the persisted
/// profile; these are the run-level knobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationConfig {
    /// Minimum ground-truth tracks required to calibrate (default: 10)
    pub min_tracks: usize,

    /// The relative major/minor fix is enabled when
    /// `relative_rate > exact_rate * relative_fix_gain` (default: 1.2)
    pub relative_fix_gain: f32,

    /// Minimum analyzed tracks with both a true and a detected loudness
    /// before the LUFS offset is fitted (default: 5)
    pub min_lufs_tracks: usize,

    /// Error in dB still counted as an accurate loudness reading (default: 1.0)
    pub lufs_tolerance_db: f32,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            min_tracks: 10,
            relative_fix_gain: 1.2,
            min_lufs_tracks: 5,
            lufs_tolerance_db: 1.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(AnalysisConfig::default().validate().is_ok());
        assert!(StreamingConfig::default().validate().is_ok());
    }

    #[test]
    fn test_analysis_config_rejects_bad_sizes() {
        let config = AnalysisConfig {
            hop_size: 4096,
            ..AnalysisConfig::default()
        };
        assert!(config.validate().is_err());

        let config = AnalysisConfig {
            min_bpm: 200.0,
            max_bpm: 60.0,
            ..AnalysisConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(AnalysisError::InvalidTempoRange { .. })
        ));
    }

    #[test]
    fn test_streaming_config_rejects_bad_smoothing_alpha() {
        for alpha in [0.0, -0.1, 1.5, f32::NAN, f32::INFINITY] {
            let config = StreamingConfig {
                smoothing_alpha: alpha,
                ..StreamingConfig::default()
            };
            assert!(
                config.validate().is_err(),
                "Smoothing alpha {} should be rejected",
                alpha
            );
        }
        let config = StreamingConfig {
            smoothing_alpha: 1.0,
            ..StreamingConfig::default()
        };
        assert!(config.validate().is_ok(), "Alpha 1.0 disables smoothing and is valid");
    }

    #[test]
    fn test_streaming_config_rejects_bad_sensitivity() {
        for sensitivity in [-0.5, f32::NAN] {
            let config = StreamingConfig {
                sensitivity,
                ..StreamingConfig::default()
            };
            assert!(
                config.validate().is_err(),
                "Sensitivity {} should be rejected",
                sensitivity
            );
        }
    }

    #[test]
    fn test_tempo_range_validation() {
        assert!(validate_tempo_range(60.0, 200.0).is_ok());
        assert!(validate_tempo_range(120.0, 120.0).is_err());
        assert!(validate_tempo_range(150.0, 100.0).is_err());
        assert!(validate_tempo_range(0.0, 100.0).is_err());
        assert!(validate_tempo_range(60.0, MAX_SUPPORTED_TEMPO + 1.0).is_err());
    }

    #[test]
    fn test_partial_config_falls_back_to_defaults() {
        let config: StreamingConfig =
            serde_json::from_str(r#"{"sensitivity": 0.8, "max_tempo": 180.0}"#).unwrap();
        assert_eq!(config.sensitivity, 0.8);
        assert_eq!(config.max_tempo, 180.0);
        assert_eq!(config.hop_size, 512);
        assert_eq!(config.frame_size, 2048);
    }
}

//! Self-calibration against ground truth
//!
//! A [`Calibrator`] owns the active [`CalibrationProfile`] and the ground
//! truth set. A calibration run analyzes every ground truth track with a
//! [`TrackAnalyzer`], searches the BPM multipliers, scores key confusion,
//! fits a loudness offset, and replaces the profile in one step once every
//! track has been scored. The profile is then applied at inference time by
//! [`CalibrationProfile::apply_bpm`], [`CalibrationProfile::apply_key`] and
//! [`CalibrationProfile::apply_lufs`].

pub mod engine;
pub mod ground_truth;
pub mod profile;

pub use engine::{calibrate_key, calibrate_lufs, select_multiplier, CalibrationState, Calibrator, KeyCalibrationOutcome};
pub use ground_truth::{GroundTruthEntry, GroundTruthExport, TestResult};
pub use profile::{
    BpmCalibration, BpmConfidence, CalibratedBpm, CalibrationProfile, CalibrationStats,
    CalibrationStatus, ConfusionMatrix, KeyCalibration, LufsCalibration, DEFAULT_MULTIPLIERS, PROFILE_VERSION,
};

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::analysis::result::RawAnalysis;
use crate::error::AnalysisError;

/// Uncalibrated analysis of a track, as used for training
///
/// Must be `Sync`: tracks are analyzed in parallel.
pub trait TrackAnalyzer: Sync {
    /// Analyze the track at `path` without applying any calibration
    fn analyze_raw(&self, path: &Path) -> Result<RawAnalysis, AnalysisError>;
}

impl<T: TrackAnalyzer + ?Sized> TrackAnalyzer for &T {
    fn analyze_raw(&self, path: &Path) -> Result<RawAnalysis, AnalysisError> {
        (**self).analyze_raw(path)
    }
}

/// Shared flag for cancelling a calibration run from another thread
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Token that has not been cancelled
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation was requested
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Milliseconds since the Unix epoch
pub(crate) fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

//! Error types for the analysis and calibration engine
//!
//! Error strategy:
//! - Per-track errors (decode, invalid input, processing): recoverable, a
//!   calibration run skips the track and continues
//! - Run-level errors (too little ground truth, cancellation): abort the run
//!   without touching the active profile
//! - Persistence errors: reported, never fatal to the in-memory profile

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during analysis, streaming control, or calibration
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// Invalid input parameters
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The external decoder could not produce a sample buffer for a track
    #[error("Decoding unavailable for '{path}': {reason}")]
    DecodeUnavailable {
        /// Track that failed to decode
        path: PathBuf,
        /// Decoder-supplied reason
        reason: String,
    },

    /// Processing error during analysis
    #[error("Processing error: {0}")]
    ProcessingError(String),

    /// Not enough ground truth to run calibration
    #[error("Insufficient ground truth: need at least {required} tracks, got {provided}")]
    InsufficientData {
        /// Minimum number of entries
        required: usize,
        /// Number of entries supplied
        provided: usize,
    },

    /// Calibration run was cancelled by the caller
    #[error("Calibration cancelled")]
    Cancelled,

    /// Profile store read or write failed
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Tempo range with min >= max (or outside the supported span)
    #[error("Invalid tempo range: min {min} must be below max {max}")]
    InvalidTempoRange {
        /// Requested minimum tempo
        min: f32,
        /// Requested maximum tempo
        max: f32,
    },

    /// Profile or export blob could not be (de)serialized
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl AnalysisError {
    /// Returns true if this error only affects a single track, so a batch
    /// (or calibration run) should skip the track and continue
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            AnalysisError::InvalidInput(_)
                | AnalysisError::DecodeUnavailable { .. }
                | AnalysisError::ProcessingError(_)
        )
    }
}

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, AnalysisError>;

//! Ground truth entries and calibration test results

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::analysis::result::{BpmCandidate, Key};
use crate::error::AnalysisError;

fn unknown_genre() -> String {
    "unknown".to_string()
}

/// Human-verified tempo and key for one track
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroundTruthEntry {
    /// Track location, resolved by the [`SampleSource`](crate::io::SampleSource)
    pub file_path: PathBuf,

    /// True tempo
    #[serde(rename = "trueBPM")]
    pub true_bpm: f32,

    /// True key
    pub true_key: Key,

    /// True integrated loudness, if known
    #[serde(rename = "trueLUFS", default, skip_serializing_if = "Option::is_none")]
    pub true_lufs: Option<f32>,

    /// Genre tag (default "unknown")
    #[serde(default = "unknown_genre")]
    pub genre: String,

    /// Milliseconds since the Unix epoch when the entry was added
    #[serde(default)]
    pub timestamp: u64,
}

impl GroundTruthEntry {
    /// Entry with unknown genre and no loudness
    pub fn new(file_path: impl Into<PathBuf>, true_bpm: f32, true_key: Key) -> Self {
        Self {
            file_path: file_path.into(),
            true_bpm,
            true_key,
            true_lufs: None,
            genre: unknown_genre(),
            timestamp: 0,
        }
    }

    /// Set the genre tag
    pub fn with_genre(mut self, genre: impl Into<String>) -> Self {
        self.genre = genre.into();
        self
    }

    /// Set the true loudness
    pub fn with_lufs(mut self, lufs: f32) -> Self {
        self.true_lufs = Some(lufs);
        self
    }

    /// Reject entries calibration cannot score against
    pub fn validate(&self) -> Result<(), AnalysisError> {
        if !(self.true_bpm.is_finite() && self.true_bpm > 0.0) {
            return Err(AnalysisError::InvalidInput(format!(
                "Ground truth BPM must be positive, got {} for {:?}",
                self.true_bpm, self.file_path
            )));
        }
        if let Some(lufs) = self.true_lufs {
            if !lufs.is_finite() {
                return Err(AnalysisError::InvalidInput(format!(
                    "Ground truth LUFS must be finite, got {} for {:?}",
                    lufs, self.file_path
                )));
            }
        }
        Ok(())
    }
}

/// Backup of a ground truth set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroundTruthExport {
    /// Export format version
    pub version: String,

    /// Milliseconds since the Unix epoch of the export
    pub exported: u64,

    /// Exported entries
    pub tracks: Vec<GroundTruthEntry>,
}

/// Outcome of analyzing one ground truth track during calibration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestResult {
    /// Track location
    pub file_path: PathBuf,

    /// True tempo
    #[serde(rename = "trueBPM")]
    pub true_bpm: f32,

    /// True key
    pub true_key: Key,

    /// Raw detected tempo
    #[serde(rename = "detectedBPM")]
    pub detected_bpm: f32,

    /// Raw detected key
    pub detected_key: Key,

    /// Raw tempo alternatives
    pub bpm_candidates: Vec<BpmCandidate>,

    /// True loudness, when the entry carries one
    #[serde(rename = "trueLUFS")]
    pub true_lufs: Option<f32>,

    /// Raw detected loudness; `None` for silent tracks
    #[serde(rename = "detectedLUFS")]
    pub detected_lufs: Option<f32>,

    /// Genre tag of the entry
    pub genre: String,
}

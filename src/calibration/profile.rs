//! Calibration profile and its inference-time application
//!
//! The profile is the only persisted state of the engine. It serializes to the
//! camelCase JSON layout below; every struct is `#[serde(default)]`, so a blob
//! written by an older (or newer) version loads field by field over the
//! defaults.
//!
//! ```json
//! {
//!   "version": "1.0", "calibrated": true, "lastUpdated": 1730000000000,
//!   "bpm": { "preferredMultiplier": 0.5, "testedMultipliers": [0.5, ...], "deviationPercent": 3.0 },
//!   "key": { "relativeMajorMinorFix": false, "confusionMatrix": { "C major": { "A minor": 2 } } },
//!   "lufs": { "offsetDb": -1.3, "calibrated": true },
//!   "stats": { "tracksUsed": 12, "bpmAccuracy": 0.92, "keyAccuracy": 0.75, "lufsAccuracy": 0.8 }
//! }
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::analysis::candidates::{calibrated_candidates, raw_candidates};
use crate::analysis::result::{BpmCandidate, Key};
use crate::error::AnalysisError;

/// Current profile format version
pub const PROFILE_VERSION: &str = "1.0";

/// BPM correction factors searched during calibration, in search order
pub const DEFAULT_MULTIPLIERS: [f32; 9] = [0.5, 0.66, 0.75, 1.0, 1.33, 1.5, 2.0, 3.0, 4.0];

/// Truth → (detected → count)
pub type ConfusionMatrix = BTreeMap<Key, BTreeMap<Key, u32>>;

/// Learned BPM correction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BpmCalibration {
    /// Factor applied to raw estimates; always one of `tested_multipliers`
    pub preferred_multiplier: f32,

    /// Candidate factors, searched in order
    pub tested_multipliers: Vec<f32>,

    /// Relative error (percent) still counted as a match
    pub deviation_percent: f32,
}

impl Default for BpmCalibration {
    fn default() -> Self {
        Self {
            preferred_multiplier: 1.0,
            tested_multipliers: DEFAULT_MULTIPLIERS.to_vec(),
            deviation_percent: 3.0,
        }
    }
}

impl BpmCalibration {
    /// Match tolerance as a fraction
    pub fn tolerance(&self) -> f32 {
        self.deviation_percent / 100.0
    }
}

/// Learned key correction
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct KeyCalibration {
    /// Whether relative major/minor confusion dominated the last run
    pub relative_major_minor_fix: bool,

    /// Detected keys per true key over the last run
    pub confusion_matrix: ConfusionMatrix,
}

/// Learned loudness correction
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LufsCalibration {
    /// Mean of `true - detected` over the tracks with both values, in 0.1 dB steps
    pub offset_db: f32,

    /// True once enough tracks carried a reference loudness
    pub calibrated: bool,
}

/// Accuracy of the last calibration run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CalibrationStats {
    /// Tracks that were analyzed successfully
    pub tracks_used: usize,

    /// Fraction of tracks within tolerance after the multiplier
    pub bpm_accuracy: f32,

    /// Fraction of tracks whose key matched after the key policy
    pub key_accuracy: f32,

    /// Fraction of tracks with a reference loudness within tolerance after the offset
    pub lufs_accuracy: f32,
}

/// Persisted correction parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CalibrationProfile {
    /// Format version
    pub version: String,

    /// True once a calibration run has completed
    pub calibrated: bool,

    /// Milliseconds since the Unix epoch of the last save
    pub last_updated: Option<u64>,

    /// BPM correction
    pub bpm: BpmCalibration,

    /// Key correction
    pub key: KeyCalibration,

    /// Loudness correction
    pub lufs: LufsCalibration,

    /// Last run statistics
    pub stats: CalibrationStats,
}

impl Default for CalibrationProfile {
    fn default() -> Self {
        Self {
            version: PROFILE_VERSION.to_string(),
            calibrated: false,
            last_updated: None,
            bpm: BpmCalibration::default(),
            key: KeyCalibration::default(),
            lufs: LufsCalibration::default(),
            stats: CalibrationStats::default(),
        }
    }
}

/// How much to trust a corrected BPM
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BpmConfidence {
    /// No calibration has been run; the raw estimate is returned rounded
    Uncalibrated,
    /// The learned multiplier was applied
    High,
}

/// BPM after calibration, with alternatives
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibratedBpm {
    /// Corrected BPM
    pub bpm: f32,

    /// Trust level
    pub confidence: BpmConfidence,

    /// Multiplier that was applied (1.0 when uncalibrated)
    pub multiplier: f32,

    /// Alternatives of the raw value, most likely first
    pub candidates: Vec<BpmCandidate>,
}

/// Summary of the active profile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalibrationStatus {
    /// Whether a calibration run has completed
    pub calibrated: bool,
    /// Tracks used by the last run
    pub tracks_used: usize,
    /// Last run BPM accuracy
    pub bpm_accuracy: f32,
    /// Last run key accuracy
    pub key_accuracy: f32,
    /// Last run loudness accuracy
    pub lufs_accuracy: f32,
    /// Active BPM multiplier
    pub bpm_multiplier: f32,
    /// Whether the relative major/minor fix is flagged
    pub relative_fix: bool,
    /// Active loudness offset in dB
    pub lufs_offset: f32,
    /// Milliseconds since the Unix epoch of the last save
    pub last_updated: Option<u64>,
}

impl CalibrationProfile {
    /// Parse a stored blob, merging it over the defaults
    pub fn from_json(bytes: &[u8]) -> Result<Self, AnalysisError> {
        let mut profile: CalibrationProfile = serde_json::from_slice(bytes)?;
        profile.sanitize();
        Ok(profile)
    }

    /// Serialize to the persisted JSON layout
    pub fn to_json(&self) -> Result<Vec<u8>, AnalysisError> {
        Ok(serde_json::to_vec_pretty(self)?)
    }

    /// Restore invariants a hand-edited or truncated blob may break
    fn sanitize(&mut self) {
        if self.bpm.tested_multipliers.is_empty() {
            log::warn!("Profile has no tested multipliers, restoring defaults");
            self.bpm.tested_multipliers = DEFAULT_MULTIPLIERS.to_vec();
        }
        if !self
            .bpm
            .tested_multipliers
            .contains(&self.bpm.preferred_multiplier)
        {
            let fallback = if self.bpm.tested_multipliers.contains(&1.0) {
                1.0
            } else {
                self.bpm.tested_multipliers[0]
            };
            log::warn!(
                "Preferred multiplier {} is not a tested multiplier, using {}",
                self.bpm.preferred_multiplier,
                fallback
            );
            self.bpm.preferred_multiplier = fallback;
        }
    }

    /// Apply the learned BPM correction to a raw estimate
    ///
    /// Uncalibrated: `round(raw)`. Calibrated: `raw * preferred_multiplier`,
    /// with the candidate for that multiplier ranked first.
    pub fn apply_bpm(&self, raw_bpm: f32) -> CalibratedBpm {
        if !self.calibrated {
            return CalibratedBpm {
                bpm: raw_bpm.round(),
                confidence: BpmConfidence::Uncalibrated,
                multiplier: 1.0,
                candidates: raw_candidates(raw_bpm),
            };
        }

        let multiplier = self.bpm.preferred_multiplier;
        CalibratedBpm {
            bpm: raw_bpm * multiplier,
            confidence: BpmConfidence::High,
            multiplier,
            candidates: calibrated_candidates(raw_bpm, multiplier),
        }
    }

    /// Apply the learned key correction
    ///
    /// Returns `raw` unchanged. The relative major/minor flag and the
    /// confusion matrix are tracked and reported through
    /// [`status`](Self::status) but never rewrite the key.
    pub fn apply_key(&self, raw: Key) -> Key {
        raw
    }

    /// Apply the learned loudness offset to a raw LUFS reading
    ///
    /// The offset is only added when both the profile and its loudness
    /// section are calibrated.
    pub fn apply_lufs(&self, raw_lufs: f32) -> f32 {
        if self.calibrated && self.lufs.calibrated {
            raw_lufs + self.lufs.offset_db
        } else {
            raw_lufs
        }
    }

    /// Summary of this profile
    pub fn status(&self) -> CalibrationStatus {
        CalibrationStatus {
            calibrated: self.calibrated,
            tracks_used: self.stats.tracks_used,
            bpm_accuracy: self.stats.bpm_accuracy,
            key_accuracy: self.stats.key_accuracy,
            lufs_accuracy: self.stats.lufs_accuracy,
            bpm_multiplier: self.bpm.preferred_multiplier,
            relative_fix: self.key.relative_major_minor_fix,
            lufs_offset: self.lufs.offset_db,
            last_updated: self.last_updated,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn calibrated_profile() -> CalibrationProfile {
        let mut profile = CalibrationProfile::default();
        profile.calibrated = true;
        profile.bpm.preferred_multiplier = 0.5;
        profile.key.relative_major_minor_fix = true;
        profile
            .key
            .confusion_matrix
            .entry(Key::Major(0))
            .or_default()
            .insert(Key::Minor(9), 3);
        profile.stats = CalibrationStats {
            tracks_used: 12,
            bpm_accuracy: 0.75,
            key_accuracy: 0.5,
            lufs_accuracy: 0.8,
        };
        profile.lufs = LufsCalibration {
            offset_db: -1.3,
            calibrated: true,
        };
        profile.last_updated = Some(1_730_000_000_000);
        profile
    }

    #[test]
    fn test_json_layout_is_camel_case() {
        let json = String::from_utf8(calibrated_profile().to_json().unwrap()).unwrap();
        for field in [
            "\"lastUpdated\"",
            "\"preferredMultiplier\"",
            "\"testedMultipliers\"",
            "\"deviationPercent\"",
            "\"relativeMajorMinorFix\"",
            "\"confusionMatrix\"",
            "\"tracksUsed\"",
            "\"bpmAccuracy\"",
            "\"keyAccuracy\"",
            "\"lufsAccuracy\"",
            "\"offsetDb\"",
            "\"C major\"",
            "\"A minor\"",
        ] {
            assert!(json.contains(field), "Missing {} in {}", field, json);
        }
    }

    #[test]
    fn test_round_trip_preserves_values() {
        let profile = calibrated_profile();
        let loaded = CalibrationProfile::from_json(&profile.to_json().unwrap()).unwrap();
        assert_eq!(loaded, profile);
    }

    #[test]
    fn test_partial_blob_merges_over_defaults() {
        let blob = br#"{"calibrated": true, "bpm": {"preferredMultiplier": 2.0}, "legacy": 1}"#;
        let profile = CalibrationProfile::from_json(blob).unwrap();
        assert!(profile.calibrated);
        assert_eq!(profile.bpm.preferred_multiplier, 2.0);
        assert_eq!(profile.bpm.tested_multipliers, DEFAULT_MULTIPLIERS.to_vec());
        assert_eq!(profile.bpm.deviation_percent, 3.0);
        assert_eq!(profile.version, PROFILE_VERSION);
        assert_eq!(profile.stats, CalibrationStats::default());
        assert_eq!(profile.lufs, LufsCalibration::default());
    }

    #[test]
    fn test_untested_multiplier_is_rejected_on_load() {
        let blob = br#"{"bpm": {"preferredMultiplier": 0.8}}"#;
        let profile = CalibrationProfile::from_json(blob).unwrap();
        assert_eq!(profile.bpm.preferred_multiplier, 1.0);
    }

    #[test]
    fn test_apply_bpm_uncalibrated() {
        let profile = CalibrationProfile::default();
        let result = profile.apply_bpm(127.6);
        assert_eq!(result.bpm, 128.0);
        assert_eq!(result.confidence, BpmConfidence::Uncalibrated);
        assert_eq!(result.candidates.len(), 4);
        assert_eq!(result.candidates[0].label, "detected");
    }

    #[test]
    fn test_apply_bpm_calibrated() {
        let profile = calibrated_profile();
        let result = profile.apply_bpm(241.0);
        assert_eq!(result.bpm, 120.5);
        assert_eq!(result.confidence, BpmConfidence::High);
        assert_eq!(result.multiplier, 0.5);
        assert_eq!(result.candidates[0].label, "half-time");
    }

    #[test]
    fn test_apply_key_is_pass_through() {
        let profile = calibrated_profile();
        assert!(profile.key.relative_major_minor_fix);
        assert_eq!(profile.apply_key(Key::Minor(9)), Key::Minor(9));
        assert_eq!(profile.apply_key(Key::Major(7)), Key::Major(7));
    }

    #[test]
    fn test_apply_lufs_requires_both_flags() {
        let mut profile = calibrated_profile();
        assert!((profile.apply_lufs(-10.0) - -11.3).abs() < 1e-5, "Offset applies when calibrated");

        profile.lufs.calibrated = false;
        assert_eq!(profile.apply_lufs(-10.0), -10.0, "Uncalibrated loudness passes through");

        profile.lufs.calibrated = true;
        profile.calibrated = false;
        assert_eq!(profile.apply_lufs(-10.0), -10.0, "Uncalibrated profile passes through");
    }

    #[test]
    fn test_status() {
        let status = calibrated_profile().status();
        assert!(status.calibrated);
        assert_eq!(status.tracks_used, 12);
        assert_eq!(status.bpm_multiplier, 0.5);
        assert!(status.relative_fix);
        assert_eq!(status.lufs_accuracy, 0.8);
        assert_eq!(status.lufs_offset, -1.3);
        assert_eq!(status.last_updated, Some(1_730_000_000_000));
    }
}

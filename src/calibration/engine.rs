//! Calibration run and profile lifecycle
//!
//! State machine: `Idle -> Running -> {Updated, Failed}`. `Updated` and
//! `Failed` are idle states that record how the last run ended.

use rayon::prelude::*;

use super::ground_truth::{GroundTruthEntry, GroundTruthExport, TestResult};
use super::profile::{
    CalibrationProfile, CalibrationStats, CalibrationStatus, ConfusionMatrix, LufsCalibration,
    DEFAULT_MULTIPLIERS, PROFILE_VERSION,
};
use super::{now_millis, CancellationToken, TrackAnalyzer};
use crate::config::CalibrationConfig;
use crate::error::AnalysisError;
use crate::io::ProfileStore;

/// Where the calibrator is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalibrationState {
    /// No run has happened since load or reset
    Idle,
    /// A run is in progress
    Running,
    /// The last run completed and replaced the profile
    Updated,
    /// The last run failed; the profile is unchanged
    Failed,
}

/// Result of scoring detected keys against ground truth
#[derive(Debug, Clone, PartialEq)]
pub struct KeyCalibrationOutcome {
    /// Whether the relative major/minor fix should be enabled
    pub relative_fix: bool,
    /// Fraction of exact matches
    pub exact_rate: f32,
    /// Fraction of exact or relative major/minor matches
    pub relative_rate: f32,
    /// Truth → (detected → count)
    pub confusion_matrix: ConfusionMatrix,
}

fn bpm_matches(detected: f32, truth: f32, multiplier: f32, tolerance: f32) -> bool {
    ((detected * multiplier - truth).abs() / truth) < tolerance
}

/// Pick the multiplier that brings the most tracks within `tolerance`
///
/// Multipliers are tried in order starting from a best of (1.0, 0.0); only
/// a strictly greater score replaces the best, so ties keep the earliest
/// multiplier and an all-zero run keeps 1.0.
///
/// # Returns
///
/// `(multiplier, fraction of matching tracks)`
pub fn select_multiplier(results: &[TestResult], multipliers: &[f32], tolerance: f32) -> (f32, f32) {
    let mut best_multiplier = 1.0;
    let mut best_score = 0.0f32;
    if results.is_empty() {
        return (best_multiplier, best_score);
    }

    for &multiplier in multipliers {
        let matches = results
            .iter()
            .filter(|r| bpm_matches(r.detected_bpm, r.true_bpm, multiplier, tolerance))
            .count();
        let score = matches as f32 / results.len() as f32;
        log::debug!("Multiplier {}x: {:.1}% accuracy", multiplier, score * 100.0);

        if score > best_score {
            best_score = score;
            best_multiplier = multiplier;
        }
    }
    (best_multiplier, best_score)
}

/// Score detected keys and decide on the relative major/minor fix
///
/// An exact match also counts as a relative match. The fix is enabled when
/// `relative_rate > exact_rate * gain`.
pub fn calibrate_key(results: &[TestResult], gain: f32) -> KeyCalibrationOutcome {
    let mut confusion_matrix = ConfusionMatrix::new();
    let mut exact = 0usize;
    let mut relative = 0usize;

    for result in results {
        *confusion_matrix
            .entry(result.true_key)
            .or_default()
            .entry(result.detected_key)
            .or_insert(0) += 1;

        if result.detected_key == result.true_key {
            exact += 1;
            relative += 1;
        } else if result.detected_key.relative() == result.true_key {
            relative += 1;
        }
    }

    let total = results.len().max(1) as f32;
    let exact_rate = exact as f32 / total;
    let relative_rate = relative as f32 / total;
    let relative_fix = relative_rate > exact_rate * gain;

    log::debug!(
        "Key matches: exact {:.1}%, with relative fix {:.1}%",
        exact_rate * 100.0,
        relative_rate * 100.0
    );

    KeyCalibrationOutcome {
        relative_fix,
        exact_rate,
        relative_rate,
        confusion_matrix,
    }
}

/// `(true, detected)` loudness of every result that carries both, finite
fn lufs_pairs(results: &[TestResult]) -> impl Iterator<Item = (f32, f32)> + '_ {
    results.iter().filter_map(|r| match (r.true_lufs, r.detected_lufs) {
        (Some(truth), Some(detected)) if truth.is_finite() && detected.is_finite() => {
            Some((truth, detected))
        }
        _ => None,
    })
}

/// Fit the loudness offset `mean(true - detected)`
///
/// The offset is rounded to 0.1 dB with halves going up (`-0.25` becomes
/// `-0.2`, `0.25` becomes `0.3`).
///
/// # Returns
///
/// `None` when fewer than `min_tracks` results carry both a true and a
/// detected loudness
pub fn calibrate_lufs(results: &[TestResult], min_tracks: usize) -> Option<f32> {
    let (count, sum) = lufs_pairs(results).fold((0usize, 0.0f64), |(n, sum), (truth, detected)| {
        (n + 1, sum + (truth - detected) as f64)
    });
    if count == 0 || count < min_tracks {
        log::debug!(
            "LUFS calibration needs {} tracks with reference loudness, have {}",
            min_tracks,
            count
        );
        return None;
    }

    let mean = sum / count as f64;
    let offset = ((mean * 10.0 + 0.5).floor() / 10.0) as f32;
    log::debug!("LUFS offset {:+.1} dB from {} tracks", offset, count);
    Some(offset)
}

/// Owner of the active calibration profile and the ground truth set
pub struct Calibrator<S: ProfileStore> {
    store: S,
    config: CalibrationConfig,
    profile: CalibrationProfile,
    ground_truth: Vec<GroundTruthEntry>,
    test_results: Vec<TestResult>,
    state: CalibrationState,
}

impl<S: ProfileStore> Calibrator<S> {
    /// Load the profile from `store`, falling back to defaults
    ///
    /// A missing, unreadable, or unparseable blob is not an error: the
    /// calibrator starts from the default (uncalibrated) profile.
    pub fn load(store: S, config: CalibrationConfig) -> Self {
        let profile = match store.load() {
            Ok(Some(bytes)) => match CalibrationProfile::from_json(&bytes) {
                Ok(profile) => {
                    log::info!(
                        "Loaded calibration profile (calibrated: {}, multiplier: {}x)",
                        profile.calibrated,
                        profile.bpm.preferred_multiplier
                    );
                    profile
                }
                Err(e) => {
                    log::warn!("Failed to parse calibration profile, using defaults: {}", e);
                    CalibrationProfile::default()
                }
            },
            Ok(None) => {
                log::debug!("No calibration profile stored, using defaults");
                CalibrationProfile::default()
            }
            Err(e) => {
                log::warn!("Failed to load calibration profile, using defaults: {}", e);
                CalibrationProfile::default()
            }
        };

        Self {
            store,
            config,
            profile,
            ground_truth: Vec::new(),
            test_results: Vec::new(),
            state: CalibrationState::Idle,
        }
    }

    /// Active profile
    pub fn profile(&self) -> &CalibrationProfile {
        &self.profile
    }

    /// Lifecycle state
    pub fn state(&self) -> CalibrationState {
        self.state
    }

    /// Summary of the active profile
    pub fn status(&self) -> CalibrationStatus {
        self.profile.status()
    }

    /// Per-track results of the last successful run
    pub fn test_results(&self) -> &[TestResult] {
        &self.test_results
    }

    /// Current ground truth set
    pub fn ground_truth(&self) -> &[GroundTruthEntry] {
        &self.ground_truth
    }

    /// The backing profile store
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Add one ground truth entry, stamping it with the current time
    pub fn add_ground_truth(&mut self, mut entry: GroundTruthEntry) -> Result<(), AnalysisError> {
        entry.validate()?;
        entry.timestamp = now_millis();
        log::debug!(
            "Added ground truth: {:?} ({} BPM, {})",
            entry.file_path,
            entry.true_bpm,
            entry.true_key
        );
        self.ground_truth.push(entry);
        Ok(())
    }

    /// Add several entries; stops at the first invalid one
    ///
    /// # Returns
    ///
    /// Number of entries added
    pub fn import_ground_truth(
        &mut self,
        entries: impl IntoIterator<Item = GroundTruthEntry>,
    ) -> Result<usize, AnalysisError> {
        let mut added = 0;
        for entry in entries {
            self.add_ground_truth(entry)?;
            added += 1;
        }
        log::info!("Imported {} ground truth tracks", added);
        Ok(added)
    }

    /// Snapshot of the ground truth set for backup
    pub fn export_ground_truth(&self) -> GroundTruthExport {
        GroundTruthExport {
            version: PROFILE_VERSION.to_string(),
            exported: now_millis(),
            tracks: self.ground_truth.clone(),
        }
    }

    /// Remove all ground truth entries
    pub fn clear_ground_truth(&mut self) {
        self.ground_truth.clear();
    }

    /// Run calibration over the ground truth set
    ///
    /// See [`calibrate_with_cancel`](Self::calibrate_with_cancel).
    pub fn calibrate<A: TrackAnalyzer>(
        &mut self,
        analyzer: &A,
    ) -> Result<&CalibrationProfile, AnalysisError> {
        self.calibrate_with_cancel(analyzer, &CancellationToken::new())
    }

    /// Run calibration over the ground truth set, checking `cancel` between tracks
    ///
    /// Tracks that fail to analyze are logged and excluded. The profile is
    /// replaced only when the run completes; on any error it is left exactly
    /// as it was, in memory and in the store. A failed save after a
    /// successful run is logged and the new profile stays active.
    ///
    /// # Errors
    ///
    /// - `InsufficientData` with fewer than `min_tracks` entries
    /// - `Cancelled` if `cancel` fired during the run
    /// - `ProcessingError` if no track could be analyzed
    pub fn calibrate_with_cancel<A: TrackAnalyzer>(
        &mut self,
        analyzer: &A,
        cancel: &CancellationToken,
    ) -> Result<&CalibrationProfile, AnalysisError> {
        if self.ground_truth.len() < self.config.min_tracks {
            self.state = CalibrationState::Failed;
            return Err(AnalysisError::InsufficientData {
                required: self.config.min_tracks,
                provided: self.ground_truth.len(),
            });
        }

        self.state = CalibrationState::Running;
        log::info!("Starting calibration with {} tracks", self.ground_truth.len());

        let results: Vec<Option<TestResult>> = self
            .ground_truth
            .par_iter()
            .map(|entry| {
                if cancel.is_cancelled() {
                    return None;
                }
                match analyzer.analyze_raw(&entry.file_path) {
                    Ok(raw) => Some(TestResult {
                        file_path: entry.file_path.clone(),
                        true_bpm: entry.true_bpm,
                        true_key: entry.true_key,
                        detected_bpm: raw.bpm(),
                        detected_key: raw.key(),
                        true_lufs: entry.true_lufs,
                        detected_lufs: raw.loudness,
                        bpm_candidates: raw.bpm_candidates,
                        genre: entry.genre.clone(),
                    }),
                    Err(e) => {
                        log::warn!("Failed to analyze {:?}, skipping: {}", entry.file_path, e);
                        None
                    }
                }
            })
            .collect();

        if cancel.is_cancelled() {
            log::warn!("Calibration cancelled, profile unchanged");
            self.state = CalibrationState::Failed;
            return Err(AnalysisError::Cancelled);
        }

        let results: Vec<TestResult> = results.into_iter().flatten().collect();
        if results.is_empty() {
            self.state = CalibrationState::Failed;
            return Err(AnalysisError::ProcessingError(
                "No ground truth track could be analyzed".to_string(),
            ));
        }

        let profile = self.build_profile(&results);
        log::info!(
            "Calibration complete: BPM accuracy {:.1}%, key accuracy {:.1}%, multiplier {}x, relative fix {}, LUFS offset {:+.1} dB",
            profile.stats.bpm_accuracy * 100.0,
            profile.stats.key_accuracy * 100.0,
            profile.bpm.preferred_multiplier,
            profile.key.relative_major_minor_fix,
            profile.lufs.offset_db
        );

        self.profile = profile;
        self.test_results = results;
        self.persist();
        self.state = CalibrationState::Updated;
        Ok(&self.profile)
    }

    /// Derive the next profile from scored results without touching `self`
    ///
    /// The multiplier search always runs over [`DEFAULT_MULTIPLIERS`], which
    /// are written back as the tested set. The loudness section keeps its
    /// previous values when too few tracks carry a reference loudness.
    fn build_profile(&self, results: &[TestResult]) -> CalibrationProfile {
        let mut profile = self.profile.clone();
        let tolerance = profile.bpm.tolerance();

        let (multiplier, _) = select_multiplier(results, &DEFAULT_MULTIPLIERS, tolerance);
        let key = calibrate_key(results, self.config.relative_fix_gain);

        profile.version = PROFILE_VERSION.to_string();
        profile.calibrated = true;
        profile.bpm.tested_multipliers = DEFAULT_MULTIPLIERS.to_vec();
        profile.bpm.preferred_multiplier = multiplier;
        profile.key.relative_major_minor_fix = key.relative_fix;
        profile.key.confusion_matrix = key.confusion_matrix;
        if let Some(offset_db) = calibrate_lufs(results, self.config.min_lufs_tracks) {
            profile.lufs = LufsCalibration {
                offset_db,
                calibrated: true,
            };
        }

        let total = results.len() as f32;
        let bpm_correct = results
            .iter()
            .filter(|r| bpm_matches(r.detected_bpm, r.true_bpm, multiplier, tolerance))
            .count();
        let key_correct = results
            .iter()
            .filter(|r| profile.apply_key(r.detected_key) == r.true_key)
            .count();
        let tolerance_db = self.config.lufs_tolerance_db;
        let (lufs_total, lufs_correct) =
            lufs_pairs(results).fold((0usize, 0usize), |(n, ok), (truth, detected)| {
                let within = (profile.apply_lufs(detected) - truth).abs() < tolerance_db;
                (n + 1, ok + within as usize)
            });

        profile.stats = CalibrationStats {
            tracks_used: results.len(),
            bpm_accuracy: bpm_correct as f32 / total,
            key_accuracy: key_correct as f32 / total,
            lufs_accuracy: if lufs_total == 0 {
                0.0
            } else {
                lufs_correct as f32 / lufs_total as f32
            },
        };
        profile
    }

    /// Restore the default profile, drop ground truth and results, and save
    pub fn reset(&mut self) {
        self.profile = CalibrationProfile::default();
        self.ground_truth.clear();
        self.test_results.clear();
        self.state = CalibrationState::Idle;
        self.persist();
        log::info!("Calibration reset to defaults");
    }

    /// Save the active profile, stamping `last_updated`
    ///
    /// Failures are logged; the in-memory profile stays authoritative.
    fn persist(&mut self) {
        self.profile.last_updated = Some(now_millis());
        match self.profile.to_json().and_then(|bytes| self.store.save(&bytes)) {
            Ok(()) => log::debug!("Calibration profile saved"),
            Err(e) => log::warn!("Failed to save calibration profile: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::result::{AnalysisResult, Key, RawAnalysis, TempoCategory};
    use crate::analysis::raw_candidates;
    use crate::io::MemoryStore;
    use std::collections::HashMap;
    use std::path::{Path, PathBuf};

    /// Analyzer returning canned raw estimates per path; unknown paths fail
    struct MockAnalyzer {
        tracks: HashMap<PathBuf, (f32, Key)>,
        loudness: HashMap<PathBuf, f32>,
        cancel_after_call: Option<CancellationToken>,
    }

    impl MockAnalyzer {
        fn new(tracks: impl IntoIterator<Item = (PathBuf, (f32, Key))>) -> Self {
            Self {
                tracks: tracks.into_iter().collect(),
                loudness: HashMap::new(),
                cancel_after_call: None,
            }
        }
    }

    impl TrackAnalyzer for MockAnalyzer {
        fn analyze_raw(&self, path: &Path) -> Result<RawAnalysis, AnalysisError> {
            if let Some(token) = &self.cancel_after_call {
                token.cancel();
            }
            let (bpm, key) = self.tracks.get(path).copied().ok_or_else(|| {
                AnalysisError::DecodeUnavailable {
                    path: path.to_path_buf(),
                    reason: "not found".to_string(),
                }
            })?;
            Ok(RawAnalysis {
                result: AnalysisResult {
                    bpm,
                    key,
                    energy: 0.5,
                    danceability: 0.5,
                    valence: 0.5,
                    tempo_category: TempoCategory::from_bpm(bpm),
                },
                bpm_candidates: raw_candidates(bpm),
                loudness: self.loudness.get(path).copied(),
            })
        }
    }

    fn result(true_bpm: f32, detected_bpm: f32, true_key: Key, detected_key: Key) -> TestResult {
        TestResult {
            file_path: PathBuf::from("t.wav"),
            true_bpm,
            true_key,
            detected_bpm,
            detected_key,
            bpm_candidates: Vec::new(),
            true_lufs: None,
            detected_lufs: None,
            genre: "unknown".to_string(),
        }
    }

    fn lufs_result(true_lufs: f32, detected_lufs: f32) -> TestResult {
        TestResult {
            true_lufs: Some(true_lufs),
            detected_lufs: Some(detected_lufs),
            ..result(120.0, 120.0, Key::Major(0), Key::Major(0))
        }
    }

    /// `n` tracks whose raw BPM is double the truth and whose key is detected as its relative
    fn half_tempo_relative_key_set(n: usize) -> (Vec<GroundTruthEntry>, MockAnalyzer) {
        let mut entries = Vec::new();
        let mut tracks = Vec::new();
        for i in 0..n {
            let path = PathBuf::from(format!("track_{}.wav", i));
            let true_bpm = 80.0 + 7.0 * i as f32;
            let true_key = if i % 2 == 0 {
                Key::Major(i as u32 % 12)
            } else {
                Key::Minor(i as u32 % 12)
            };
            entries.push(GroundTruthEntry::new(path.clone(), true_bpm, true_key));
            tracks.push((path, (true_bpm * 2.0, true_key.relative())));
        }
        (entries, MockAnalyzer::new(tracks))
    }

    #[test]
    fn test_select_multiplier_strict_argmax() {
        let results = vec![
            result(100.0, 200.0, Key::Major(0), Key::Major(0)),
            result(120.0, 240.0, Key::Major(0), Key::Major(0)),
            result(90.0, 90.0, Key::Major(0), Key::Major(0)),
        ];
        let (multiplier, score) = select_multiplier(&results, &[0.5, 1.0, 2.0], 0.03);
        assert_eq!(multiplier, 0.5);
        assert!((score - 2.0 / 3.0).abs() < 1e-6);

        // Tie between 0.5 and 1.0: first in list order wins
        let tie = vec![
            result(100.0, 200.0, Key::Major(0), Key::Major(0)),
            result(90.0, 90.0, Key::Major(0), Key::Major(0)),
        ];
        assert_eq!(select_multiplier(&tie, &[1.0, 0.5], 0.03).0, 1.0);
        assert_eq!(select_multiplier(&tie, &[0.5, 1.0], 0.03).0, 0.5);

        // Nothing matches: stays at 1.0
        let none = vec![result(100.0, 333.0, Key::Major(0), Key::Major(0))];
        assert_eq!(select_multiplier(&none, &[0.5, 2.0], 0.03), (1.0, 0.0));
    }

    #[test]
    fn test_calibrate_key_relative_confusion() {
        let results = vec![
            result(120.0, 120.0, Key::Major(0), Key::Minor(9)),
            result(120.0, 120.0, Key::Minor(4), Key::Major(7)),
            result(120.0, 120.0, Key::Major(2), Key::Major(2)),
        ];
        let outcome = calibrate_key(&results, 1.2);
        assert!((outcome.exact_rate - 1.0 / 3.0).abs() < 1e-6);
        assert!((outcome.relative_rate - 1.0).abs() < 1e-6);
        assert!(outcome.relative_fix);
        assert_eq!(outcome.confusion_matrix[&Key::Major(0)][&Key::Minor(9)], 1);
        assert_eq!(outcome.confusion_matrix[&Key::Major(2)][&Key::Major(2)], 1);
    }

    #[test]
    fn test_calibrate_key_exact_detection_keeps_fix_off() {
        let results = vec![
            result(120.0, 120.0, Key::Major(0), Key::Major(0)),
            result(120.0, 120.0, Key::Minor(9), Key::Minor(9)),
        ];
        assert!(!calibrate_key(&results, 1.2).relative_fix);
    }

    #[test]
    fn test_calibrate_half_tempo_and_relative_keys() {
        let (entries, analyzer) = half_tempo_relative_key_set(12);
        let store = MemoryStore::new();
        let mut calibrator = Calibrator::load(store.clone(), CalibrationConfig::default());
        calibrator.import_ground_truth(entries).unwrap();

        let profile = calibrator.calibrate(&analyzer).unwrap().clone();
        assert!(profile.calibrated);
        assert_eq!(profile.bpm.preferred_multiplier, 0.5);
        assert_eq!(profile.stats.bpm_accuracy, 1.0);
        assert!(profile.key.relative_major_minor_fix);
        // Key application is a pass-through, so no key is counted correct
        assert_eq!(profile.stats.key_accuracy, 0.0);
        assert_eq!(profile.stats.tracks_used, 12);
        assert_eq!(calibrator.state(), CalibrationState::Updated);
        assert_eq!(calibrator.test_results().len(), 12);

        let saved = CalibrationProfile::from_json(&store.snapshot().unwrap()).unwrap();
        assert_eq!(saved, *calibrator.profile());
    }

    #[test]
    fn test_insufficient_ground_truth_leaves_store_untouched() {
        let seeded = CalibrationProfile {
            calibrated: true,
            ..CalibrationProfile::default()
        };
        let bytes = seeded.to_json().unwrap();
        let store = MemoryStore::with_blob(bytes.clone());

        let (entries, analyzer) = half_tempo_relative_key_set(9);
        let mut calibrator = Calibrator::load(store.clone(), CalibrationConfig::default());
        calibrator.import_ground_truth(entries).unwrap();

        let err = calibrator.calibrate(&analyzer).unwrap_err();
        assert!(matches!(
            err,
            AnalysisError::InsufficientData {
                required: 10,
                provided: 9
            }
        ));
        assert_eq!(store.snapshot().unwrap(), bytes, "Stored profile must be byte-identical");
        assert_eq!(*calibrator.profile(), seeded);
        assert_eq!(calibrator.state(), CalibrationState::Failed);
    }

    #[test]
    fn test_failed_tracks_are_excluded() {
        let (mut entries, analyzer) = half_tempo_relative_key_set(10);
        entries.push(GroundTruthEntry::new("missing.wav", 120.0, Key::Major(0)));
        let mut calibrator = Calibrator::load(MemoryStore::new(), CalibrationConfig::default());
        calibrator.import_ground_truth(entries).unwrap();

        let profile = calibrator.calibrate(&analyzer).unwrap();
        assert_eq!(profile.stats.tracks_used, 10);
        assert_eq!(profile.stats.bpm_accuracy, 1.0);
    }

    #[test]
    fn test_all_tracks_failing_is_an_error() {
        let entries: Vec<_> = (0..10)
            .map(|i| GroundTruthEntry::new(format!("gone_{}.wav", i), 120.0, Key::Major(0)))
            .collect();
        let mut calibrator = Calibrator::load(MemoryStore::new(), CalibrationConfig::default());
        calibrator.import_ground_truth(entries).unwrap();
        let analyzer = MockAnalyzer::new(Vec::new());
        assert!(matches!(
            calibrator.calibrate(&analyzer),
            Err(AnalysisError::ProcessingError(_))
        ));
        assert!(!calibrator.profile().calibrated);
    }

    #[test]
    fn test_cancelled_run_leaves_profile_unchanged() {
        let (entries, mut analyzer) = half_tempo_relative_key_set(10);
        let token = CancellationToken::new();
        analyzer.cancel_after_call = Some(token.clone());

        let store = MemoryStore::new();
        let mut calibrator = Calibrator::load(store.clone(), CalibrationConfig::default());
        calibrator.import_ground_truth(entries).unwrap();

        let err = calibrator.calibrate_with_cancel(&analyzer, &token).unwrap_err();
        assert!(matches!(err, AnalysisError::Cancelled));
        assert_eq!(*calibrator.profile(), CalibrationProfile::default());
        assert!(store.snapshot().is_none(), "Nothing should be persisted");
    }

    #[test]
    fn test_corrupt_blob_loads_defaults() {
        let store = MemoryStore::with_blob(b"not json".to_vec());
        let calibrator = Calibrator::load(store, CalibrationConfig::default());
        assert_eq!(*calibrator.profile(), CalibrationProfile::default());
        assert_eq!(calibrator.state(), CalibrationState::Idle);
    }

    #[test]
    fn test_reload_and_resave_preserves_values() {
        let (entries, analyzer) = half_tempo_relative_key_set(10);
        let store = MemoryStore::new();
        let mut calibrator = Calibrator::load(store.clone(), CalibrationConfig::default());
        calibrator.import_ground_truth(entries).unwrap();
        calibrator.calibrate(&analyzer).unwrap();
        let first = calibrator.profile().clone();

        let reloaded = Calibrator::load(store.clone(), CalibrationConfig::default());
        let mut resaved = reloaded.profile().clone();
        resaved.last_updated = first.last_updated;
        assert_eq!(resaved, first);
    }

    #[test]
    fn test_reset_restores_defaults_and_persists() {
        let (entries, analyzer) = half_tempo_relative_key_set(10);
        let store = MemoryStore::new();
        let mut calibrator = Calibrator::load(store.clone(), CalibrationConfig::default());
        calibrator.import_ground_truth(entries).unwrap();
        calibrator.calibrate(&analyzer).unwrap();

        calibrator.reset();
        assert!(!calibrator.status().calibrated);
        assert!(calibrator.ground_truth().is_empty());
        assert!(calibrator.test_results().is_empty());
        let saved = CalibrationProfile::from_json(&store.snapshot().unwrap()).unwrap();
        assert!(!saved.calibrated);
        assert_eq!(saved.bpm.preferred_multiplier, 1.0);
    }

    #[test]
    fn test_calibrate_lufs_requires_five_valid_tracks() {
        let mut results: Vec<TestResult> = (0..4)
            .map(|i| lufs_result(-10.0 - i as f32, -9.0 - i as f32))
            .collect();
        results.push(TestResult {
            true_lufs: Some(-12.0),
            ..result(120.0, 120.0, Key::Major(0), Key::Major(0))
        });
        results.push(lufs_result(-12.0, f32::NEG_INFINITY));
        results.push(result(120.0, 120.0, Key::Major(0), Key::Major(0)));
        assert_eq!(
            calibrate_lufs(&results, 5),
            None,
            "Four tracks with both readings are not enough"
        );

        results.push(lufs_result(-14.0, -13.0));
        assert_eq!(calibrate_lufs(&results, 5), Some(-1.0), "Five valid tracks fit the offset");
        assert_eq!(calibrate_lufs(&[], 0), None, "No pairs never fit an offset");
    }

    #[test]
    fn test_calibrate_lufs_rounds_to_tenth_db() {
        let quarter_down: Vec<_> = (0..5).map(|_| lufs_result(-10.0, -9.75)).collect();
        assert_eq!(calibrate_lufs(&quarter_down, 5), Some(-0.2), "-0.25 rounds up to -0.2");

        let quarter_up: Vec<_> = (0..5).map(|_| lufs_result(-9.75, -10.0)).collect();
        assert_eq!(calibrate_lufs(&quarter_up, 5), Some(0.3), "0.25 rounds up to 0.3");

        // Offsets 1.0, 1.5, 1.25, 1.25, 1.3 average to 1.26
        let mixed = vec![
            lufs_result(-9.0, -10.0),
            lufs_result(-8.5, -10.0),
            lufs_result(-8.75, -10.0),
            lufs_result(-8.75, -10.0),
            lufs_result(-8.7, -10.0),
        ];
        let offset = calibrate_lufs(&mixed, 5).unwrap();
        assert!((offset - 1.3).abs() < 1e-6, "Expected 1.3 dB, got {}", offset);
    }

    #[test]
    fn test_calibration_run_fits_lufs_offset() {
        let (entries, mut analyzer) = half_tempo_relative_key_set(10);
        let entries: Vec<_> = entries
            .into_iter()
            .enumerate()
            .map(|(i, entry)| {
                let truth = -8.0 - 0.5 * i as f32;
                // The detector reads 1.5 dB hot, one track 4.5 dB hot
                let error = if i == 9 { 4.5 } else { 1.5 };
                analyzer.loudness.insert(entry.file_path.clone(), truth + error);
                entry.with_lufs(truth)
            })
            .collect();

        let mut calibrator = Calibrator::load(MemoryStore::new(), CalibrationConfig::default());
        calibrator.import_ground_truth(entries).unwrap();
        let profile = calibrator.calibrate(&analyzer).unwrap().clone();

        assert!(profile.lufs.calibrated);
        assert!(
            (profile.lufs.offset_db - -1.8).abs() < 1e-6,
            "Expected -1.8 dB, got {}",
            profile.lufs.offset_db
        );
        assert!(
            (profile.stats.lufs_accuracy - 0.9).abs() < 1e-6,
            "Nine of ten tracks land within 1 dB after the offset, got {}",
            profile.stats.lufs_accuracy
        );
        assert_eq!(calibrator.status().lufs_offset, profile.lufs.offset_db);
        assert_eq!(calibrator.test_results()[0].true_lufs, Some(-8.0));
        assert_eq!(calibrator.test_results()[0].detected_lufs, Some(-6.5));
        assert!((profile.apply_lufs(-6.5) - -8.3).abs() < 1e-5);
    }

    #[test]
    fn test_too_few_lufs_tracks_keep_previous_offset() {
        let mut seeded = CalibrationProfile::default();
        seeded.calibrated = true;
        seeded.lufs = LufsCalibration {
            offset_db: -2.0,
            calibrated: true,
        };
        let store = MemoryStore::with_blob(seeded.to_json().unwrap());

        let (entries, mut analyzer) = half_tempo_relative_key_set(10);
        let entries: Vec<_> = entries
            .into_iter()
            .enumerate()
            .map(|(i, entry)| {
                if i < 3 {
                    analyzer.loudness.insert(entry.file_path.clone(), -7.0);
                    entry.with_lufs(-9.0)
                } else {
                    entry
                }
            })
            .collect();

        let mut calibrator = Calibrator::load(store, CalibrationConfig::default());
        calibrator.import_ground_truth(entries).unwrap();
        let profile = calibrator.calibrate(&analyzer).unwrap();

        assert_eq!(profile.lufs, seeded.lufs, "Three reference tracks leave the offset as it was");
        assert_eq!(
            profile.stats.lufs_accuracy, 1.0,
            "Accuracy is scored with the previous offset"
        );
    }

    #[test]
    fn test_stored_multiplier_list_does_not_limit_search() {
        let blob = br#"{
            "calibrated": true,
            "bpm": {"preferredMultiplier": 1.0, "testedMultipliers": [0.5, 0.66, 0.75, 1.0, 1.33, 1.5, 2.0]}
        }"#;
        let store = MemoryStore::with_blob(blob.to_vec());
        let mut calibrator = Calibrator::load(store.clone(), CalibrationConfig::default());
        assert_eq!(calibrator.profile().bpm.tested_multipliers.len(), 7);

        let mut entries = Vec::new();
        let mut tracks = Vec::new();
        for i in 0..10 {
            let path = PathBuf::from(format!("third_{}.wav", i));
            let true_bpm = 150.0 + 3.0 * i as f32;
            entries.push(GroundTruthEntry::new(path.clone(), true_bpm, Key::Major(0)));
            tracks.push((path, (true_bpm / 3.0, Key::Major(0))));
        }
        calibrator.import_ground_truth(entries).unwrap();

        let profile = calibrator.calibrate(&MockAnalyzer::new(tracks)).unwrap().clone();
        assert_eq!(profile.bpm.preferred_multiplier, 3.0, "Third-tempo detections need 3x");
        assert_eq!(profile.stats.bpm_accuracy, 1.0);
        assert_eq!(
            profile.bpm.tested_multipliers,
            DEFAULT_MULTIPLIERS.to_vec(),
            "The full multiplier set is written back"
        );

        let saved = CalibrationProfile::from_json(&store.snapshot().unwrap()).unwrap();
        assert_eq!(saved.bpm.preferred_multiplier, 3.0, "Reload keeps the 3x multiplier");
    }

    #[test]
    fn test_calibrate_key_matches_unnormalized_tonic() {
        let results = vec![
            result(120.0, 120.0, Key::Major(0), Key::Major(12)),
            result(120.0, 120.0, Key::Minor(21), Key::Minor(9)),
        ];
        let outcome = calibrate_key(&results, 1.2);
        assert_eq!(outcome.exact_rate, 1.0, "Tonics equal modulo 12 are exact matches");
        assert_eq!(outcome.confusion_matrix.len(), 2);
        assert_eq!(outcome.confusion_matrix[&Key::Major(0)][&Key::Major(0)], 1);
    }

    #[test]
    fn test_ground_truth_export() {
        let mut calibrator = Calibrator::load(MemoryStore::new(), CalibrationConfig::default());
        calibrator
            .add_ground_truth(GroundTruthEntry::new("a.wav", 128.0, Key::Minor(9)))
            .unwrap();
        assert!(calibrator
            .add_ground_truth(GroundTruthEntry::new("b.wav", -1.0, Key::Minor(9)))
            .is_err());

        let export = calibrator.export_ground_truth();
        assert_eq!(export.version, "1.0");
        assert_eq!(export.tracks.len(), 1);
        assert!(export.tracks[0].timestamp > 0);

        calibrator.clear_ground_truth();
        assert!(calibrator.ground_truth().is_empty());
    }
}

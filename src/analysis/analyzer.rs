//! Offline analysis pipeline
//!
//! One pass over the frames of a track feeds three aggregators: the
//! spectral-flux curve (tempo), the chroma mean (key) and the RMS / centroid
//! statistics (mood). The per-frame features are dropped as soon as they
//! have been folded in.

use std::path::Path;
use std::time::Instant;

use super::candidates::raw_candidates;
use super::mood::{danceability, round_to, valence, MoodAccumulator};
use super::result::{AnalysisResult, BpmCandidate, RawAnalysis, TempoCategory};
use crate::calibration::{BpmConfidence, CalibrationProfile, TrackAnalyzer};
use crate::config::AnalysisConfig;
use crate::error::AnalysisError;
use crate::features::frames::extract_features;
use crate::features::key::{detect_key_from_accumulator, ChromaAccumulator, KeyTemplates};
use crate::features::period::estimate_bpm;
use crate::io::SampleSource;
use crate::preprocessing::{integrated_loudness, mix_to_mono};

/// Analyze a mono buffer
///
/// Buffers shorter than one frame are not an error: every estimator falls
/// back to its default (120 BPM, C major, neutral mood).
///
/// # Errors
///
/// Returns `AnalysisError::InvalidInput` for empty samples, a zero sample
/// rate, or an inconsistent configuration.
pub fn analyze_samples(
    samples: &[f32],
    sample_rate: u32,
    config: &AnalysisConfig,
) -> Result<AnalysisResult, AnalysisError> {
    let start_time = Instant::now();
    log::debug!(
        "Starting audio analysis: {} samples at {} Hz",
        samples.len(),
        sample_rate
    );

    if samples.is_empty() {
        return Err(AnalysisError::InvalidInput("Empty audio samples".to_string()));
    }

    let mut flux = Vec::new();
    let mut chroma = ChromaAccumulator::new();
    let mut mood = MoodAccumulator::new();
    for features in extract_features(samples, sample_rate, config)? {
        flux.push(features.spectral_flux);
        chroma.push(&features.chroma);
        mood.push(features.rms, features.spectral_centroid);
    }
    log::debug!("Extracted features from {} frames", flux.len());

    let tempo = estimate_bpm(&flux, config.hop_size, sample_rate, config)?;
    if tempo.is_fallback() {
        log::warn!(
            "Too little rhythmic evidence ({} onsets), using default {} BPM",
            tempo.onset_count,
            config.default_bpm
        );
    }
    let key = detect_key_from_accumulator(&chroma, &KeyTemplates::new());

    let energy = mood.energy();
    let result = AnalysisResult {
        bpm: round_to(tempo.bpm, 1),
        key: key.key,
        energy: round_to(energy, 2),
        danceability: danceability(tempo.bpm, energy),
        valence: valence(mood.mean_centroid(), energy),
        tempo_category: TempoCategory::from_bpm(tempo.bpm),
    };

    log::debug!(
        "Analysis complete in {:.1} ms: {:.1} BPM, {}",
        start_time.elapsed().as_secs_f32() * 1000.0,
        result.bpm,
        result.key
    );
    Ok(result)
}

/// Analysis of a track with the active calibration profile applied
#[derive(Debug, Clone, PartialEq)]
pub struct CalibratedAnalysis {
    /// Corrected result; `bpm` within `[min_bpm, max_bpm]`
    pub result: AnalysisResult,

    /// Trust level of the corrected BPM
    pub bpm_confidence: BpmConfidence,

    /// Alternatives of the raw BPM, most likely first
    pub bpm_candidates: Vec<BpmCandidate>,

    /// Multiplier applied to the raw BPM
    pub multiplier: f32,

    /// Integrated loudness in LUFS with the profile offset applied
    pub loudness: Option<f32>,

    /// Whether the profile was calibrated
    pub calibrated: bool,
}

/// Track analyzer over an external decoder
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use cadence_dsp::{AnalysisConfig, Analyzer, CalibrationProfile, DecodedAudio, SampleSource};
///
/// struct Silence;
///
/// impl SampleSource for Silence {
///     fn decode(&self, _path: &Path) -> cadence_dsp::Result<DecodedAudio> {
///         Ok(DecodedAudio::mono(vec![0.0; 44100 * 10], 44100))
///     }
/// }
///
/// let analyzer = Analyzer::new(Silence, AnalysisConfig::default())?;
/// let analysis = analyzer.analyze_with_profile(Path::new("track.flac"), &CalibrationProfile::default())?;
/// println!("{} BPM, {}", analysis.result.bpm, analysis.result.key);
/// # Ok::<(), cadence_dsp::AnalysisError>(())
/// ```
pub struct Analyzer<S: SampleSource> {
    source: S,
    config: AnalysisConfig,
}

impl<S: SampleSource> Analyzer<S> {
    /// Create an analyzer decoding through `source`
    ///
    /// # Errors
    ///
    /// Returns `AnalysisError` if `config` is inconsistent
    pub fn new(source: S, config: AnalysisConfig) -> Result<Self, AnalysisError> {
        config.validate()?;
        Ok(Self { source, config })
    }

    /// Analysis configuration
    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Decode and mix down the track at `path`
    fn decode_mono(&self, path: &Path) -> Result<(Vec<f32>, u32), AnalysisError> {
        let audio = self.source.decode(path)?;
        if audio.sample_rate == 0 {
            return Err(AnalysisError::DecodeUnavailable {
                path: path.to_path_buf(),
                reason: "decoder reported a zero sample rate".to_string(),
            });
        }
        let samples = mix_to_mono(&audio.channels).map_err(|_| AnalysisError::DecodeUnavailable {
            path: path.to_path_buf(),
            reason: "decoder produced no channels".to_string(),
        })?;
        Ok((samples, audio.sample_rate))
    }

    /// Uncalibrated analysis, as used for calibration training
    pub fn analyze_raw(&self, path: &Path) -> Result<RawAnalysis, AnalysisError> {
        log::debug!("Raw analysis of {:?}", path);
        let (samples, sample_rate) = self.decode_mono(path)?;
        let result = analyze_samples(&samples, sample_rate, &self.config)?;
        let bpm_candidates = raw_candidates(result.bpm);
        let loudness = integrated_loudness(&samples, sample_rate)?.map(|lufs| round_to(lufs, 1));
        Ok(RawAnalysis {
            result,
            bpm_candidates,
            loudness,
        })
    }

    /// Analysis with `profile` applied to the raw estimate
    ///
    /// The corrected BPM is clamped to `[min_bpm, max_bpm]`, and the tempo
    /// category and danceability are recomputed from it. The key goes
    /// through [`CalibrationProfile::apply_key`] and the loudness through
    /// [`CalibrationProfile::apply_lufs`].
    pub fn analyze_with_profile(
        &self,
        path: &Path,
        profile: &CalibrationProfile,
    ) -> Result<CalibratedAnalysis, AnalysisError> {
        let raw = self.analyze_raw(path)?;
        let corrected = profile.apply_bpm(raw.bpm());
        let bpm = corrected.bpm.clamp(self.config.min_bpm, self.config.max_bpm);

        let result = AnalysisResult {
            bpm,
            key: profile.apply_key(raw.key()),
            energy: raw.result.energy,
            danceability: danceability(bpm, raw.result.energy),
            valence: raw.result.valence,
            tempo_category: TempoCategory::from_bpm(bpm),
        };

        Ok(CalibratedAnalysis {
            result,
            bpm_confidence: corrected.confidence,
            bpm_candidates: corrected.candidates,
            multiplier: corrected.multiplier,
            loudness: raw.loudness.map(|lufs| profile.apply_lufs(lufs)),
            calibrated: profile.calibrated,
        })
    }
}

impl<S: SampleSource> TrackAnalyzer for Analyzer<S> {
    fn analyze_raw(&self, path: &Path) -> Result<RawAnalysis, AnalysisError> {
        Analyzer::analyze_raw(self, path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::result::Key;
    use crate::io::DecodedAudio;

    /// One-sample clicks every 0.5 s at 44032 Hz (exactly 43 hops of 512).
    ///
    /// Each click sits on the last sample of the frame that first sees it,
    /// where the Hann window is zero, so the next frame is the only rising
    /// edge of its flux.
    fn click_track_120(seconds: usize) -> Vec<f32> {
        let sample_rate = 44_032;
        let period = sample_rate / 2;
        let len = sample_rate * seconds;
        let mut samples = vec![0.0f32; len];
        let mut pos = 2047;
        while pos < len {
            samples[pos] = 1.0;
            pos += period;
        }
        samples
    }

    fn sine(freqs: &[f32], sample_rate: u32, seconds: f32) -> Vec<f32> {
        let len = (sample_rate as f32 * seconds) as usize;
        (0..len)
            .map(|i| {
                let t = i as f32 / sample_rate as f32;
                freqs
                    .iter()
                    .map(|f| (2.0 * std::f32::consts::PI * f * t).sin())
                    .sum::<f32>()
                    * 0.2
            })
            .collect()
    }

    struct FixedSource(DecodedAudio);

    impl SampleSource for FixedSource {
        fn decode(&self, path: &Path) -> Result<DecodedAudio, AnalysisError> {
            if path.to_str() == Some("missing.wav") {
                return Err(AnalysisError::DecodeUnavailable {
                    path: path.to_path_buf(),
                    reason: "no such file".to_string(),
                });
            }
            Ok(self.0.clone())
        }
    }

    #[test]
    fn test_click_track_120_bpm() {
        let samples = click_track_120(12);
        let result = analyze_samples(&samples, 44_032, &AnalysisConfig::default()).unwrap();
        assert!(
            (116.4..=123.6).contains(&result.bpm),
            "Expected ~120 BPM, got {}",
            result.bpm
        );
        assert_eq!(result.tempo_category, TempoCategory::Fast);
    }

    #[test]
    fn test_c_major_chord_detected() {
        // Bin-centred C7, E7, G7 at 44100 Hz / 2048 (bins 97, 122, 146)
        let bin_hz = 44100.0 / 2048.0;
        let samples = sine(&[97.0 * bin_hz, 122.0 * bin_hz, 146.0 * bin_hz], 44100, 3.0);
        let result = analyze_samples(&samples, 44100, &AnalysisConfig::default()).unwrap();
        assert_eq!(result.key.name(), "C major");
    }

    #[test]
    fn test_short_buffer_uses_defaults() {
        let result = analyze_samples(&[0.1; 1000], 44100, &AnalysisConfig::default()).unwrap();
        assert_eq!(result.bpm, 120.0);
        assert_eq!(result.key, Key::Major(0));
        assert_eq!(result.energy, 0.5);
        assert_eq!(result.valence, 0.5);
    }

    #[test]
    fn test_descriptors_in_unit_range() {
        let samples = sine(&[220.0, 3300.0], 44100, 2.0);
        let result = analyze_samples(&samples, 44100, &AnalysisConfig::default()).unwrap();
        for value in [result.energy, result.danceability, result.valence] {
            assert!((0.0..=1.0).contains(&value), "Descriptor out of range: {}", value);
        }
        assert!((60.0..=200.0).contains(&result.bpm));
    }

    #[test]
    fn test_invalid_input() {
        let config = AnalysisConfig::default();
        assert!(analyze_samples(&[], 44100, &config).is_err());
        assert!(analyze_samples(&[0.0; 4096], 0, &config).is_err());
    }

    #[test]
    fn test_analyze_raw_and_decode_failure() {
        let audio = DecodedAudio {
            channels: vec![click_track_120(8), click_track_120(8)],
            sample_rate: 44_032,
        };
        let analyzer = Analyzer::new(FixedSource(audio), AnalysisConfig::default()).unwrap();

        let raw = analyzer.analyze_raw(Path::new("clicks.wav")).unwrap();
        assert!((raw.bpm() - 120.0).abs() < 3.6);
        assert_eq!(raw.bpm_candidates.len(), 4);
        assert_eq!(raw.bpm_candidates[0].label, "detected");
        let lufs = raw.loudness.expect("Clicks pass the loudness gate");
        assert!(lufs.is_finite() && lufs < 0.0, "Unexpected loudness {}", lufs);

        let err = analyzer.analyze_raw(Path::new("missing.wav")).unwrap_err();
        assert!(matches!(err, AnalysisError::DecodeUnavailable { .. }));
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_analyze_with_profile_applies_and_clamps() {
        let audio = DecodedAudio::mono(click_track_120(8), 44_032);
        let analyzer = Analyzer::new(FixedSource(audio), AnalysisConfig::default()).unwrap();

        let uncalibrated = analyzer
            .analyze_with_profile(Path::new("clicks.wav"), &CalibrationProfile::default())
            .unwrap();
        assert_eq!(uncalibrated.bpm_confidence, BpmConfidence::Uncalibrated);
        assert_eq!(uncalibrated.result.bpm, 120.0);
        assert!(!uncalibrated.calibrated);

        let mut profile = CalibrationProfile::default();
        profile.calibrated = true;
        profile.bpm.preferred_multiplier = 2.0;
        let doubled = analyzer
            .analyze_with_profile(Path::new("clicks.wav"), &profile)
            .unwrap();
        assert_eq!(doubled.bpm_confidence, BpmConfidence::High);
        assert_eq!(doubled.result.bpm, 200.0, "240 BPM is clamped to max_bpm");
        assert_eq!(doubled.result.tempo_category, TempoCategory::VeryFast);
        assert_eq!(doubled.bpm_candidates[0].label, "double-time");
    }

    #[test]
    fn test_analyze_with_profile_applies_lufs_offset() {
        let audio = DecodedAudio::mono(sine(&[440.0], 44100, 3.0), 44100);
        let analyzer = Analyzer::new(FixedSource(audio), AnalysisConfig::default()).unwrap();
        let raw = analyzer.analyze_raw(Path::new("tone.wav")).unwrap().loudness.unwrap();

        let mut profile = CalibrationProfile::default();
        profile.calibrated = true;
        profile.lufs.offset_db = -1.5;
        let uncorrected = analyzer.analyze_with_profile(Path::new("tone.wav"), &profile).unwrap();
        assert_eq!(uncorrected.loudness, Some(raw), "Offset is ignored until LUFS is calibrated");

        profile.lufs.calibrated = true;
        let corrected = analyzer.analyze_with_profile(Path::new("tone.wav"), &profile).unwrap();
        let lufs = corrected.loudness.unwrap();
        assert!((lufs - (raw - 1.5)).abs() < 1e-4, "Expected {} - 1.5, got {}", raw, lufs);

        let silent = Analyzer::new(
            FixedSource(DecodedAudio::mono(vec![0.0; 44100], 44100)),
            AnalysisConfig::default(),
        )
        .unwrap();
        let analysis = silent.analyze_with_profile(Path::new("silence.wav"), &profile).unwrap();
        assert_eq!(analysis.loudness, None, "Silence has no loudness");
    }
}

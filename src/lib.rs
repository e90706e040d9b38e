//! # Cadence DSP
//!
//! Music analysis and self-calibration engine: tempo, key and mood
//! descriptors for a library of tracks, a real-time beat tracker for live
//! audio, and a calibration loop that learns correction factors from
//! human-verified ground truth.
//!
//! ## Features
//!
//! - **BPM Detection**: Spectral-flux onsets, inter-onset interval histogram, octave correction
//! - **Key Detection**: Chroma accumulation with Krumhansl-Schmuckler template matching
//! - **Mood**: Energy, danceability and valence from RMS and spectral centroid
//! - **Loudness**: K-weighted, gated integrated loudness (LUFS)
//! - **Streaming**: Block-driven beat and tempo tracking over lock-free queues
//! - **Calibration**: BPM multiplier search, relative-key diagnosis and LUFS offset against ground truth
//!
//! ## Quick Start
//!
//! ```no_run
//! use cadence_dsp::{analyze_audio, AnalysisConfig};
//!
//! // Load audio samples (mono, f32, normalized)
//! let samples: Vec<f32> = vec![]; // Your audio data
//! let sample_rate = 44100;
//!
//! // Analyze
//! let result = analyze_audio(&samples, sample_rate, AnalysisConfig::default())?;
//!
//! println!("BPM: {:.1} ({:?})", result.bpm, result.tempo_category);
//! println!("Key: {} (energy: {:.2})", result.key, result.energy);
//! # Ok::<(), cadence_dsp::AnalysisError>(())
//! ```
//!
//! ## Architecture
//!
//! The offline pipeline follows this flow:
//!
//! ```text
//! Decoded Audio → Mono Mix → Frame Features → {Tempo, Key, Mood} → Calibration → Output
//! ```
//!
//! The streaming path ([`streaming`]) shares the spectral building blocks but
//! runs incrementally inside an audio callback. Calibration ([`calibration`])
//! consumes raw offline results only.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod analysis;
pub mod calibration;
pub mod config;
pub mod error;
pub mod features;
pub mod io;
pub mod preprocessing;
pub mod streaming;

// Re-export main types
pub use analysis::{
    AnalysisResult, Analyzer, BpmCandidate, CalibratedAnalysis, Key, RawAnalysis, TempoCategory,
};
pub use calibration::{
    CalibrationProfile, CalibrationStatus, Calibrator, CancellationToken, GroundTruthEntry,
    TrackAnalyzer,
};
pub use config::{AnalysisConfig, CalibrationConfig, StreamingConfig};
pub use error::{AnalysisError, Result};
pub use io::{DecodedAudio, JsonFileStore, MemoryStore, ProfileStore, SampleSource};
pub use streaming::{
    BeatEvent, StreamCommand, StreamController, StreamEvent, StreamingProcessor, TempoEstimate,
};

/// Main analysis function
///
/// Analyzes mono audio samples and returns the raw (uncalibrated) tempo,
/// key and mood descriptors. Use [`Analyzer`] with a
/// [`CalibrationProfile`] to apply learned corrections.
///
/// # Arguments
///
/// * `samples` - Mono audio samples, normalized to [-1.0, 1.0]
/// * `sample_rate` - Sample rate in Hz (typically 44100 or 48000)
/// * `config` - Analysis configuration parameters
///
/// # Returns
///
/// `AnalysisResult` containing BPM, key, energy, danceability, valence and tempo category
///
/// # Errors
///
/// Returns `AnalysisError::InvalidInput` for an empty buffer, a zero sample
/// rate, or an inconsistent configuration. Too little rhythmic content is
/// not an error: the BPM falls back to `config.default_bpm`.
///
/// # Example
///
/// ```no_run
/// use cadence_dsp::{analyze_audio, AnalysisConfig};
///
/// let samples = vec![0.0f32; 44100 * 30]; // 30 seconds of silence
/// let result = analyze_audio(&samples, 44100, AnalysisConfig::default())?;
/// assert_eq!(result.bpm, 120.0);
/// # Ok::<(), cadence_dsp::AnalysisError>(())
/// ```
pub fn analyze_audio(
    samples: &[f32],
    sample_rate: u32,
    config: AnalysisConfig,
) -> Result<AnalysisResult> {
    analysis::analyze_samples(samples, sample_rate, &config)
}

//! Analysis and result aggregation modules
//!
//! Combines the per-frame features into the final track analysis:
//! - Result types (key, tempo category, analysis result)
//! - Mood descriptors (energy, danceability, valence)
//! - Tempo alternatives (half-time, double-time, ...)
//! - The offline [`Analyzer`]

pub mod analyzer;
pub mod candidates;
pub mod mood;
pub mod result;

pub use analyzer::{analyze_samples, Analyzer, CalibratedAnalysis};
pub use candidates::{calibrated_candidates, raw_candidates};
pub use mood::{danceability, valence, MoodAccumulator};
pub use result::{AnalysisResult, BpmCandidate, Key, RawAnalysis, TempoCategory};

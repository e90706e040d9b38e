//! Key detection modules
//!
//! Detect musical key using:
//! - Krumhansl-Schmuckler templates (24 keys)
//! - Template matching over the track-averaged chroma

pub mod detector;
pub mod templates;

pub use detector::{
    detect_key, detect_key_from_accumulator, detect_key_from_frames, ChromaAccumulator,
};
pub use templates::KeyTemplates;

use crate::analysis::result::Key;

/// Key detection result
#[derive(Debug, Clone)]
pub struct KeyDetectionResult {
    /// Detected key (best match)
    pub key: Key,

    /// Correlation score of the best key
    pub score: f32,

    /// Margin of the best score over the runner-up, relative to the best (0.0-1.0)
    pub confidence: f32,

    /// All 24 key scores (ranked, highest first)
    pub all_scores: Vec<(Key, f32)>,
}

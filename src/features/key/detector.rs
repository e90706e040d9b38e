//! Key detection algorithm
//!
//! Averages chroma over the whole track, then scores all 24 (tonic, mode)
//! hypotheses against the Krumhansl-Schmuckler templates.
//!
//! Hypotheses are tested tonic by tonic in ascending chromatic order from C,
//! major before minor, and only a strictly greater score replaces the current
//! best. Exact ties therefore keep the earliest hypothesis.
//!
//! # Reference
//!
//! Krumhansl, C. L. (1990). *Cognitive Foundations of Musical Pitch*.
//! Oxford University Press.

use super::{templates::KeyTemplates, KeyDetectionResult};
use crate::analysis::result::Key;

/// Running mean of chroma vectors
#[derive(Debug, Clone, Default)]
pub struct ChromaAccumulator {
    sum: [f64; 12],
    frames: usize,
}

impl ChromaAccumulator {
    /// Empty accumulator
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one frame's chroma
    pub fn push(&mut self, chroma: &[f32; 12]) {
        for (acc, &value) in self.sum.iter_mut().zip(chroma.iter()) {
            *acc += value as f64;
        }
        self.frames += 1;
    }

    /// Number of frames added
    pub fn frames(&self) -> usize {
        self.frames
    }

    /// Average chroma, or `None` if no frames were added
    pub fn mean(&self) -> Option<[f32; 12]> {
        if self.frames == 0 {
            return None;
        }
        let mut mean = [0.0f32; 12];
        for (out, &acc) in mean.iter_mut().zip(self.sum.iter()) {
            *out = (acc / self.frames as f64) as f32;
        }
        Some(mean)
    }
}

/// Detect musical key from an averaged chroma vector
///
/// # Arguments
///
/// * `chroma` - Averaged 12-element chroma vector (index 0 = C)
/// * `templates` - Key templates
///
/// # Returns
///
/// Key detection result with the best key and all 24 scores (ranked)
///
/// # Example
///
/// ```
/// use cadence_dsp::features::key::{detect_key, KeyTemplates};
///
/// let mut chroma = [0.0f32; 12];
/// chroma[0] = 1.0; // C
/// chroma[4] = 1.0; // E
/// chroma[7] = 1.0; // G
/// let result = detect_key(&chroma, &KeyTemplates::new());
/// assert_eq!(result.key.name(), "C major");
/// ```
pub fn detect_key(chroma: &[f32; 12], templates: &KeyTemplates) -> KeyDetectionResult {
    let mut scores: Vec<(Key, f32)> = Vec::with_capacity(24);
    let mut best_key = Key::Major(0);
    let mut best_score = f32::NEG_INFINITY;

    for tonic in 0..12usize {
        let hypotheses = [
            (Key::Major(tonic as u32), &templates.major),
            (Key::Minor(tonic as u32), &templates.minor),
        ];
        for (key, profile) in hypotheses {
            let score = KeyTemplates::correlate(chroma, profile, tonic);
            if score > best_score {
                best_score = score;
                best_key = key;
            }
            scores.push((key, score));
        }
    }

    // Stable sort keeps hypothesis order among equal scores
    scores.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

    let second = scores.get(1).map(|s| s.1).unwrap_or(0.0);
    let confidence = if best_score > 1e-10 {
        ((best_score - second) / best_score).clamp(0.0, 1.0)
    } else {
        0.0
    };

    log::debug!(
        "Detected key: {} (score {:.3}, confidence {:.3})",
        best_key,
        best_score,
        confidence
    );

    KeyDetectionResult {
        key: best_key,
        score: best_score.max(0.0),
        confidence,
        all_scores: scores,
    }
}

/// Detect the key of a sequence of per-frame chroma vectors
///
/// An empty sequence yields C major with zero confidence.
pub fn detect_key_from_frames(
    chroma_frames: &[[f32; 12]],
    templates: &KeyTemplates,
) -> KeyDetectionResult {
    let mut accumulator = ChromaAccumulator::new();
    for chroma in chroma_frames {
        accumulator.push(chroma);
    }
    detect_key_from_accumulator(&accumulator, templates)
}

/// Detect the key from an accumulated chroma mean (C major when empty)
pub fn detect_key_from_accumulator(
    accumulator: &ChromaAccumulator,
    templates: &KeyTemplates,
) -> KeyDetectionResult {
    match accumulator.mean() {
        Some(mean) => detect_key(&mean, templates),
        None => {
            log::debug!("No chroma frames, defaulting to C major");
            KeyDetectionResult {
                key: Key::Major(0),
                score: 0.0,
                confidence: 0.0,
                all_scores: Vec::new(),
            }
        }
    }
}

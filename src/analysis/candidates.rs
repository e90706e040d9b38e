//! Alternative tempo readings (half-time, double-time, ...)

use super::result::BpmCandidate;

/// Candidate multipliers with their labels and default confidences
const RAW_CANDIDATES: [(f32, f32, &str); 4] = [
    (0.5, 0.3, "half-time"),
    (1.0, 0.6, "detected"),
    (1.5, 0.2, "1.5x"),
    (2.0, 0.4, "double-time"),
];

/// Candidates when a multiplier has been learned: (multiplier, confidence if
/// learned, confidence otherwise, label)
const CALIBRATED_CANDIDATES: [(f32, f32, f32, &str); 4] = [
    (0.5, 0.9, 0.3, "half-time"),
    (1.0, 0.9, 0.4, "detected"),
    (2.0, 0.9, 0.3, "double-time"),
    (1.5, 0.8, 0.2, "1.5x"),
];

fn sort_by_confidence(candidates: &mut [BpmCandidate]) {
    // Stable: equal confidences keep their listed order
    candidates.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
}

/// Alternatives of an uncalibrated estimate, most likely first
///
/// # Example
///
/// ```
/// use cadence_dsp::analysis::raw_candidates;
///
/// let candidates = raw_candidates(128.0);
/// assert_eq!(candidates[0].value, 128.0);
/// assert_eq!(candidates[1].label, "double-time");
/// ```
pub fn raw_candidates(raw_bpm: f32) -> Vec<BpmCandidate> {
    let mut candidates: Vec<BpmCandidate> = RAW_CANDIDATES
        .iter()
        .map(|&(factor, confidence, label)| BpmCandidate {
            value: (raw_bpm * factor).round(),
            confidence,
            label: label.to_string(),
        })
        .collect();
    sort_by_confidence(&mut candidates);
    candidates
}

/// Alternatives of an estimate once `multiplier` has been learned
///
/// The candidate whose factor equals the learned multiplier is ranked first.
pub fn calibrated_candidates(raw_bpm: f32, multiplier: f32) -> Vec<BpmCandidate> {
    let mut candidates: Vec<BpmCandidate> = CALIBRATED_CANDIDATES
        .iter()
        .map(|&(factor, matched, unmatched, label)| BpmCandidate {
            value: (raw_bpm * factor).round(),
            confidence: if factor == multiplier { matched } else { unmatched },
            label: label.to_string(),
        })
        .collect();
    sort_by_confidence(&mut candidates);
    candidates
}

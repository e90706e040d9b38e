//! Rolling beat history and tempo estimation
//!
//! Storage is reserved up front for the densest history the configuration
//! allows (one beat per refractory period at [`MAX_SUPPORTED_TEMPO`]), so
//! recording beats and estimating tempo never allocate.

use std::collections::VecDeque;

use super::{BeatEvent, TempoEstimate};
use crate::config::MAX_SUPPORTED_TEMPO;

/// Beats from the last `window_seconds`
#[derive(Debug, Clone)]
pub struct BeatHistory {
    beats: VecDeque<BeatEvent>,
    intervals: Vec<f64>,
    window_seconds: f64,
    capacity: usize,
}

impl BeatHistory {
    /// History covering `window_seconds`
    pub fn new(window_seconds: f64) -> Self {
        let window_seconds = window_seconds.max(0.0);
        let capacity = (window_seconds * MAX_SUPPORTED_TEMPO as f64 / 60.0).ceil() as usize + 2;
        Self {
            beats: VecDeque::with_capacity(capacity),
            intervals: Vec::with_capacity(capacity),
            window_seconds,
            capacity,
        }
    }

    /// Record a beat and drop beats that fell out of the window
    ///
    /// Beats must arrive in increasing time order.
    pub fn push(&mut self, beat: BeatEvent) {
        if self.beats.len() == self.capacity {
            self.beats.pop_front();
        }
        self.beats.push_back(beat);
        while let Some(oldest) = self.beats.front() {
            if beat.time - oldest.time < self.window_seconds {
                break;
            }
            self.beats.pop_front();
        }
    }

    /// Number of beats held
    pub fn len(&self) -> usize {
        self.beats.len()
    }

    /// True when no beats are held
    pub fn is_empty(&self) -> bool {
        self.beats.is_empty()
    }

    /// Beats held, oldest first
    pub fn iter(&self) -> impl Iterator<Item = &BeatEvent> {
        self.beats.iter()
    }

    /// Drop all beats
    pub fn clear(&mut self) {
        self.beats.clear();
        self.intervals.clear();
    }

    fn fill_intervals(&mut self) {
        self.intervals.clear();
        let mut previous: Option<f64> = None;
        for beat in &self.beats {
            if let Some(prev) = previous {
                self.intervals.push(beat.time - prev);
            }
            previous = Some(beat.time);
        }
    }

    /// Mean inter-beat interval in seconds (0 with fewer than two beats)
    pub fn average_interval(&mut self) -> f64 {
        self.fill_intervals();
        if self.intervals.is_empty() {
            0.0
        } else {
            self.intervals.iter().sum::<f64>() / self.intervals.len() as f64
        }
    }

    /// Tempo from the upper-median inter-beat interval, clamped to the range
    ///
    /// Confidence is the fraction of intervals within `tolerance` (relative)
    /// of the interval implied by the clamped tempo. `None` with fewer than
    /// three beats.
    pub fn estimate(&mut self, min_tempo: f32, max_tempo: f32, tolerance: f32) -> Option<TempoEstimate> {
        if self.beats.len() < 3 {
            return None;
        }
        let avg_interval = self.average_interval();

        self.intervals
            .sort_unstable_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        let median = self.intervals[self.intervals.len() / 2];
        if !(median > 0.0) {
            return None;
        }

        let tempo = ((60.0 / median) as f32).clamp(min_tempo, max_tempo);
        let expected = 60.0 / tempo as f64;
        let matches = self
            .intervals
            .iter()
            .filter(|&&interval| ((interval - expected).abs() / expected) < tolerance as f64)
            .count();

        Some(TempoEstimate {
            tempo,
            confidence: matches as f32 / self.intervals.len() as f32,
            beat_count: self.beats.len(),
            avg_interval,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn beat(time: f64) -> BeatEvent {
        BeatEvent {
            time,
            strength: 1.0,
        }
    }

    #[test]
    fn test_window_eviction() {
        let mut history = BeatHistory::new(10.0);
        for i in 0..30 {
            history.push(beat(i as f64 * 0.5));
        }
        // Last beat at 14.5 s keeps beats newer than 4.5 s
        assert_eq!(history.len(), 20);
        assert!(history.iter().all(|b| 14.5 - b.time < 10.0));
    }

    #[test]
    fn test_estimate_steady_beats() {
        let mut history = BeatHistory::new(10.0);
        for i in 0..8 {
            history.push(beat(i as f64 * 0.5));
        }
        let estimate = history.estimate(60.0, 200.0, 0.2).unwrap();
        assert!((estimate.tempo - 120.0).abs() < 1e-3);
        assert_eq!(estimate.confidence, 1.0);
        assert_eq!(estimate.beat_count, 8);
        assert!((estimate.avg_interval - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_estimate_clamps_and_scores_against_clamped_tempo() {
        let mut history = BeatHistory::new(10.0);
        for i in 0..5 {
            history.push(beat(i as f64 * 2.0)); // 30 BPM
        }
        let estimate = history.estimate(60.0, 200.0, 0.2).unwrap();
        assert_eq!(estimate.tempo, 60.0);
        assert_eq!(estimate.confidence, 0.0, "2 s gaps are far from the 1 s clamped interval");
    }

    #[test]
    fn test_estimate_needs_three_beats() {
        let mut history = BeatHistory::new(10.0);
        history.push(beat(0.0));
        history.push(beat(0.5));
        assert!(history.estimate(60.0, 200.0, 0.2).is_none());
        assert!((history.average_interval() - 0.5).abs() < 1e-9);
        history.clear();
        assert!(history.is_empty());
        assert_eq!(history.average_interval(), 0.0);
    }
}

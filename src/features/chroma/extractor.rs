//! Chroma vector extraction
//!
//! Folds an FFT magnitude spectrum into 12 pitch classes. Each bin between
//! `min_hz` and `max_hz` is assigned to its nearest equal-tempered semitone
//! (A4 = 440 Hz) and contributes its power to that pitch class. The frame
//! pipeline in [`crate::features::frames`] calls [`ChromaMap::compute`] once
//! per frame.

/// Frequency of C0 in Hz (A4 = 440 Hz tuning)
const C0_HZ: f32 = 16.351_6;

/// Precomputed bin → pitch-class assignment for one FFT size and sample rate
#[derive(Debug, Clone)]
pub struct ChromaMap {
    pitch_classes: Vec<Option<u8>>,
}

impl ChromaMap {
    /// Build the mapping for `frame_size`-point FFTs at `sample_rate`
    pub fn new(sample_rate: u32, frame_size: usize, min_hz: f32, max_hz: f32) -> Self {
        let bin_hz = sample_rate as f32 / frame_size as f32;
        let pitch_classes = (0..=frame_size / 2)
            .map(|bin| {
                let freq = bin as f32 * bin_hz;
                if bin == 0 || freq < min_hz || freq > max_hz {
                    return None;
                }
                let semitones = 12.0 * (freq / C0_HZ).log2();
                Some((semitones.round() as i64).rem_euclid(12) as u8)
            })
            .collect();
        Self { pitch_classes }
    }

    /// Pitch class of a bin, if the bin is inside the chroma range
    pub fn pitch_class(&self, bin: usize) -> Option<u8> {
        self.pitch_classes.get(bin).copied().flatten()
    }

    /// Fold a magnitude spectrum into a chroma vector normalized to max = 1
    ///
    /// Returns all zeros for a silent frame.
    pub fn compute(&self, magnitudes: &[f32]) -> [f32; 12] {
        let mut chroma = [0.0f32; 12];
        for (mag, pc) in magnitudes.iter().zip(self.pitch_classes.iter()) {
            if let Some(pc) = pc {
                chroma[*pc as usize] += mag * mag;
            }
        }

        let max = chroma.iter().copied().fold(0.0f32, f32::max);
        if max > 1e-20 {
            for value in chroma.iter_mut() {
                *value /= max;
            }
        }
        chroma
    }
}

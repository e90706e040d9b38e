//! Energy, danceability, and valence descriptors
//!
//! Coarse track-level descriptors derived from per-frame RMS and spectral
//! centroid plus the tempo estimate. All values lie in [0, 1].

/// Centroid (Hz) at which the brightness term of valence saturates
const VALENCE_CENTROID_HZ: f32 = 3000.0;

/// Running per-frame statistics needed for the mood descriptors
#[derive(Debug, Clone, Default)]
pub struct MoodAccumulator {
    rms_sum: f64,
    rms_max: f32,
    centroid_sum: f64,
    frames: usize,
}

impl MoodAccumulator {
    /// Empty accumulator
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one frame's RMS and spectral centroid
    pub fn push(&mut self, rms: f32, spectral_centroid: f32) {
        self.rms_sum += rms as f64;
        self.rms_max = self.rms_max.max(rms);
        self.centroid_sum += spectral_centroid as f64;
        self.frames += 1;
    }

    /// Number of frames added
    pub fn frames(&self) -> usize {
        self.frames
    }

    /// Mean RMS over max RMS, clamped to 1 (0.5 with no frames, 0 for silence)
    pub fn energy(&self) -> f32 {
        if self.frames == 0 {
            return 0.5;
        }
        let mean = (self.rms_sum / self.frames as f64) as f32;
        let max = if self.rms_max > 0.0 { self.rms_max } else { 1.0 };
        (mean / max).min(1.0)
    }

    /// Mean spectral centroid in Hz, `None` with no frames
    pub fn mean_centroid(&self) -> Option<f32> {
        if self.frames == 0 {
            None
        } else {
            Some((self.centroid_sum / self.frames as f64) as f32)
        }
    }
}

/// Round to `decimals` decimal places
pub(crate) fn round_to(value: f32, decimals: i32) -> f32 {
    let scale = 10f32.powi(decimals);
    (value * scale).round() / scale
}

/// Danceability from tempo and energy, rounded to 2 decimals
///
/// Tempo term: 0.6 for 90-140 BPM, 0.4 for 70-160 BPM, otherwise 0.2.
/// Energy adds up to 0.4.
pub fn danceability(bpm: f32, energy: f32) -> f32 {
    let tempo_term = if (90.0..=140.0).contains(&bpm) {
        0.6
    } else if (70.0..=160.0).contains(&bpm) {
        0.4
    } else {
        0.2
    };
    round_to(tempo_term + energy * 0.4, 2).min(1.0)
}

/// Valence from brightness and energy, rounded to 2 decimals
///
/// 0.5 when there were no frames to measure brightness on.
pub fn valence(mean_centroid: Option<f32>, energy: f32) -> f32 {
    match mean_centroid {
        None => 0.5,
        Some(centroid) => {
            let brightness = (centroid / VALENCE_CENTROID_HZ).min(1.0);
            round_to(brightness * 0.6 + energy * 0.4, 2).min(1.0)
        }
    }
}

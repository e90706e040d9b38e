//! Windowing and magnitude spectrum shared by the offline and streaming paths
//!
//! The FFT plan, the complex work buffer, and the output magnitudes are
//! allocated once; [`MagnitudeSpectrum::compute`] does no allocation, so it is
//! usable from the audio callback.

use std::sync::Arc;

use rustfft::{num_complex::Complex, Fft, FftPlanner};

/// Build a symmetric Hann window of `size` samples
pub fn hann_window(size: usize) -> Vec<f32> {
    if size < 2 {
        return vec![1.0; size];
    }
    let n_minus_1 = (size - 1) as f32;
    (0..size)
        .map(|i| 0.5 * (1.0 - (2.0 * std::f32::consts::PI * i as f32 / n_minus_1).cos()))
        .collect()
}

/// Reusable forward-FFT magnitude computation for a fixed frame size
pub struct MagnitudeSpectrum {
    fft: Arc<dyn Fft<f32>>,
    buffer: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
    magnitudes: Vec<f32>,
}

impl MagnitudeSpectrum {
    /// Plan an FFT for frames of `frame_size` samples
    pub fn new(frame_size: usize) -> Self {
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(frame_size);
        let scratch_len = fft.get_inplace_scratch_len();
        Self {
            fft,
            buffer: vec![Complex::new(0.0, 0.0); frame_size],
            scratch: vec![Complex::new(0.0, 0.0); scratch_len],
            magnitudes: vec![0.0; frame_size / 2 + 1],
        }
    }

    /// Number of magnitude bins (`frame_size / 2 + 1`)
    pub fn bins(&self) -> usize {
        self.magnitudes.len()
    }

    /// Window `frame` and return its magnitude spectrum, normalized by frame length
    ///
    /// `frame` and `window` must both be `frame_size` long.
    pub fn compute(&mut self, frame: &[f32], window: &[f32]) -> &[f32] {
        let n = self.buffer.len();
        for (i, slot) in self.buffer.iter_mut().enumerate() {
            let sample = frame.get(i).copied().unwrap_or(0.0);
            let w = window.get(i).copied().unwrap_or(1.0);
            *slot = Complex::new(sample * w, 0.0);
        }

        self.fft
            .process_with_scratch(&mut self.buffer, &mut self.scratch);

        let scale = 1.0 / n as f32;
        for (mag, c) in self.magnitudes.iter_mut().zip(self.buffer.iter()) {
            *mag = c.norm() * scale;
        }
        &self.magnitudes
    }

    /// Magnitudes of the most recent [`compute`](Self::compute) call
    pub fn magnitudes(&self) -> &[f32] {
        &self.magnitudes
    }
}

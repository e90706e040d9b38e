//! Frame extraction and per-frame spectral features
//!
//! Splits a mono buffer into overlapping frames (`frame_size` samples every
//! `hop_size` samples) and computes a [`SpectralFeatures`] bundle for each
//! one. Trailing samples that do not fill a whole frame are dropped.
//!
//! Both iterators are lazy: features are computed as the caller pulls them and
//! nothing is retained beyond the previous frame's spectrum (needed for flux).

use crate::config::AnalysisConfig;
use crate::error::AnalysisError;
use crate::features::chroma::ChromaMap;
use crate::features::spectrum::{hann_window, MagnitudeSpectrum};

/// One analysis window borrowed from the input buffer
#[derive(Debug, Clone, Copy)]
pub struct AudioFrame<'a> {
    /// Exactly `frame_size` samples
    pub samples: &'a [f32],

    /// Frame index (0-based)
    pub index: usize,

    /// Offset of the first sample in seconds
    pub time_seconds: f32,
}

/// Iterator over the full frames of a buffer
#[derive(Debug, Clone)]
pub struct FrameIter<'a> {
    samples: &'a [f32],
    sample_rate: u32,
    frame_size: usize,
    hop_size: usize,
    index: usize,
}

impl<'a> Iterator for FrameIter<'a> {
    type Item = AudioFrame<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let start = self.index.checked_mul(self.hop_size)?;
        let end = start.checked_add(self.frame_size)?;
        if end > self.samples.len() {
            return None;
        }
        let frame = AudioFrame {
            samples: &self.samples[start..end],
            index: self.index,
            time_seconds: start as f32 / self.sample_rate as f32,
        };
        self.index += 1;
        Some(frame)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining =
            frame_count(self.samples.len(), self.frame_size, self.hop_size).saturating_sub(self.index);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for FrameIter<'_> {}

/// Iterate over the full frames of `samples`
///
/// `frame_size` and `hop_size` must be non-zero; [`AnalysisConfig::validate`]
/// enforces this for the pipeline.
pub fn frames(samples: &[f32], sample_rate: u32, frame_size: usize, hop_size: usize) -> FrameIter<'_> {
    FrameIter {
        samples,
        sample_rate: sample_rate.max(1),
        frame_size: frame_size.max(1),
        hop_size: hop_size.max(1),
        index: 0,
    }
}

/// Number of full frames in a buffer of `len` samples
pub fn frame_count(len: usize, frame_size: usize, hop_size: usize) -> usize {
    if frame_size == 0 || hop_size == 0 || len < frame_size {
        return 0;
    }
    (len - frame_size) / hop_size + 1
}

/// Feature bundle for one frame
#[derive(Debug, Clone, PartialEq)]
pub struct SpectralFeatures {
    /// Pitch-class energy, normalized to max = 1 (all zeros for silence)
    pub chroma: [f32; 12],

    /// Sum of squared samples
    pub energy: f32,

    /// Root mean square of the samples
    pub rms: f32,

    /// Magnitude-weighted mean frequency in Hz
    pub spectral_centroid: f32,

    /// Half-wave rectified magnitude increase over the previous frame
    /// (0 for the first frame)
    pub spectral_flux: f32,
}

/// Stateful per-frame feature computation
///
/// Keeps the FFT plan and the previous magnitude spectrum; call
/// [`reset`](Self::reset) before reusing it on an unrelated buffer.
pub struct FeatureExtractor {
    spectrum: MagnitudeSpectrum,
    window: Vec<f32>,
    previous: Vec<f32>,
    has_previous: bool,
    chroma_map: ChromaMap,
    bin_hz: f32,
}

impl FeatureExtractor {
    /// Create an extractor for frames of `config.frame_size` samples
    pub fn new(sample_rate: u32, config: &AnalysisConfig) -> Self {
        let spectrum = MagnitudeSpectrum::new(config.frame_size);
        let bins = spectrum.bins();
        Self {
            spectrum,
            window: hann_window(config.frame_size),
            previous: vec![0.0; bins],
            has_previous: false,
            chroma_map: ChromaMap::new(
                sample_rate,
                config.frame_size,
                config.chroma_min_hz,
                config.chroma_max_hz,
            ),
            bin_hz: sample_rate as f32 / config.frame_size as f32,
        }
    }

    /// Compute the features of the next frame in sequence
    pub fn process_frame(&mut self, frame: &[f32]) -> SpectralFeatures {
        let energy: f32 = frame.iter().map(|s| s * s).sum();
        let rms = if frame.is_empty() {
            0.0
        } else {
            (energy / frame.len() as f32).sqrt()
        };

        let magnitudes = self.spectrum.compute(frame, &self.window);

        let mut weighted = 0.0f32;
        let mut total = 0.0f32;
        for (bin, &mag) in magnitudes.iter().enumerate() {
            weighted += bin as f32 * self.bin_hz * mag;
            total += mag;
        }
        let spectral_centroid = if total > 1e-10 { weighted / total } else { 0.0 };

        let spectral_flux = if self.has_previous {
            crate::features::onset::spectral_flux(magnitudes, &self.previous)
        } else {
            0.0
        };

        let chroma = self.chroma_map.compute(magnitudes);

        self.previous.copy_from_slice(magnitudes);
        self.has_previous = true;

        SpectralFeatures {
            chroma,
            energy,
            rms,
            spectral_centroid,
            spectral_flux,
        }
    }

    /// Forget the previous spectrum so the next frame is treated as the first
    pub fn reset(&mut self) {
        self.previous.iter_mut().for_each(|m| *m = 0.0);
        self.has_previous = false;
    }
}

/// Lazy sequence of per-frame features over a buffer
pub struct FeatureIter<'a> {
    frames: FrameIter<'a>,
    extractor: FeatureExtractor,
}

impl Iterator for FeatureIter<'_> {
    type Item = SpectralFeatures;

    fn next(&mut self) -> Option<Self::Item> {
        let frame = self.frames.next()?;
        Some(self.extractor.process_frame(frame.samples))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.frames.size_hint()
    }
}

/// Extract per-frame features from a mono buffer
///
/// # Errors
///
/// Returns `AnalysisError::InvalidInput` for a zero sample rate or an
/// inconsistent configuration.
pub fn extract_features<'a>(
    samples: &'a [f32],
    sample_rate: u32,
    config: &AnalysisConfig,
) -> Result<FeatureIter<'a>, AnalysisError> {
    if sample_rate == 0 {
        return Err(AnalysisError::InvalidInput("Invalid sample rate".to_string()));
    }
    config.validate()?;

    Ok(FeatureIter {
        frames: frames(samples, sample_rate, config.frame_size, config.hop_size),
        extractor: FeatureExtractor::new(sample_rate, config),
    })
}

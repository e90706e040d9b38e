//! Feature extraction modules
//!
//! This module contains the feature extraction algorithms:
//! - Windowing and magnitude spectrum
//! - Frame extraction and per-frame features
//! - Chroma extraction
//! - Onset detection (spectral flux + adaptive threshold)
//! - Period estimation (BPM detection)
//! - Key detection

pub mod chroma;
pub mod frames;
pub mod key;
pub mod onset;
pub mod period;
pub mod spectrum;

//! Onset detection modules
//!
//! - Spectral flux between consecutive magnitude spectra
//! - Adaptive (median + deviation) threshold
//! - Rising-peak onset picking

pub mod spectral_flux;
pub mod threshold;

pub use spectral_flux::{detect_onsets, spectral_flux};
pub use threshold::{adaptive_threshold, median};

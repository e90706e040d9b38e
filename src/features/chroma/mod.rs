//! Chroma extraction modules
//!
//! Extract pitch-class distribution (12 semitones) from magnitude spectra.

pub mod extractor;

pub use extractor::ChromaMap;

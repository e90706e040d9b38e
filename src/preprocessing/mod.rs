//! Audio preprocessing modules
//!
//! Utilities for preparing decoded audio for analysis:
//! - Channel mixing (per-channel buffers to mono)
//! - Integrated loudness (K-weighted, gated LUFS)

pub mod channel_mixer;
pub mod loudness;

pub use channel_mixer::mix_to_mono;
pub use loudness::integrated_loudness;

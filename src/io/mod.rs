//! Audio and persistence boundaries
//!
//! - Decoder boundary ([`SampleSource`]) for the offline path
//! - Fixed-capacity sample ring for the streaming path
//! - Profile store for calibration persistence

pub mod profile_store;
pub mod sample_buffer;
pub mod source;

pub use profile_store::{JsonFileStore, MemoryStore, ProfileStore};
pub use sample_buffer::SampleBuffer;
pub use source::{DecodedAudio, SampleSource};

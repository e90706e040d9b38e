//! Real-time beat and tempo tracking
//!
//! [`StreamingProcessor`] runs inside the audio callback: it ingests blocks
//! of any size, analyses one frame per hop, and publishes [`StreamEvent`]s on
//! a lock-free queue. The paired [`StreamController`] lives on the control
//! thread, sends [`StreamCommand`]s and drains events.
//!
//! ```no_run
//! use cadence_dsp::{StreamEvent, StreamingConfig, StreamingProcessor};
//!
//! let (mut processor, mut controller) = StreamingProcessor::new(StreamingConfig::default())?;
//! controller.start()?;
//!
//! // Audio thread
//! let block = [0.0f32; 128];
//! processor.process_block(&block);
//!
//! // Control thread
//! for event in controller.events() {
//!     if let StreamEvent::Beat(beat) = event {
//!         println!("beat at {:.3}s", beat.time);
//!     }
//! }
//! # Ok::<(), cadence_dsp::AnalysisError>(())
//! ```

pub mod processor;
pub mod smoother;
pub mod tempo;

pub use processor::{StreamController, StreamingProcessor};
pub use smoother::ExponentialSmoother;
pub use tempo::BeatHistory;

use serde::{Deserialize, Serialize};

/// Accepted beat
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BeatEvent {
    /// Stream time in seconds since the last reset
    pub time: f64,

    /// Normalized onset strength that triggered the beat
    pub strength: f32,
}

/// Tempo reading derived from the rolling beat history
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TempoEstimate {
    /// Tempo in BPM (0 until the first estimate)
    pub tempo: f32,

    /// Fraction of recent intervals agreeing with `tempo` (0.0-1.0)
    pub confidence: f32,

    /// Beats in the history window
    pub beat_count: usize,

    /// Mean inter-beat interval in seconds
    pub avg_interval: f64,
}

/// Notification published by the processor
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "kebab-case")]
pub enum StreamEvent {
    /// A beat passed the threshold and the refractory check
    Beat(BeatEvent),

    /// Tempo estimate changed
    TempoUpdated(TempoEstimate),

    /// Periodic state report, sent on every tempo update cycle
    Snapshot(TempoEstimate),
}

/// Control message for the processor
///
/// Commands are applied at the start of the next block.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum StreamCommand {
    /// Begin accumulating and analysing samples
    Start,

    /// Stop analysing; incoming blocks are ignored
    Stop,

    /// Change the tempo clamp (and with it the refractory period)
    SetTempoRange {
        /// Lower bound in BPM
        min: f32,
        /// Upper bound in BPM
        max: f32,
    },

    /// Change the onset-strength threshold
    SetSensitivity {
        /// New threshold
        value: f32,
    },

    /// Clear all rolling state
    Reset,
}

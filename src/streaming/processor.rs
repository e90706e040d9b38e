//! Block-driven beat detector and its control handle
//!
//! # Real-time safety
//!
//! Every buffer (circular input, analysis frame, window, FFT work space,
//! previous spectrum, beat history) is allocated in [`StreamingProcessor::new`].
//! [`StreamingProcessor::process_block`] does no allocation, no locking and
//! no logging; commands arrive and events leave through `rtrb` SPSC queues,
//! and a full event queue drops the event rather than waiting.

use super::{BeatEvent, BeatHistory, ExponentialSmoother, StreamCommand, StreamEvent, TempoEstimate};
use crate::config::{validate_sensitivity, validate_tempo_range, StreamingConfig};
use crate::error::AnalysisError;
use crate::features::onset::spectral_flux;
use crate::features::spectrum::{hann_window, MagnitudeSpectrum};
use crate::io::SampleBuffer;

/// Weight of the spectral-flux term in the onset score
const FLUX_WEIGHT: f32 = 0.5;

/// Audio-thread half of the streaming tracker
pub struct StreamingProcessor {
    config: StreamingConfig,
    commands: rtrb::Consumer<StreamCommand>,
    events: rtrb::Producer<StreamEvent>,

    input: SampleBuffer,
    frame: Vec<f32>,
    window: Vec<f32>,
    spectrum: MagnitudeSpectrum,
    previous_spectrum: Vec<f32>,
    has_previous_spectrum: bool,
    previous_energy: f32,
    smoother: ExponentialSmoother,
    history: BeatHistory,
    last_beat: Option<f64>,
    pending: usize,
    frame_count: u64,

    active: bool,
    min_tempo: f32,
    max_tempo: f32,
    sensitivity: f32,
    tempo: f32,
    confidence: f32,

    dropped_events: u64,
    rejected_commands: u64,
}

impl StreamingProcessor {
    /// Create a processor and the controller that drives it
    ///
    /// # Errors
    ///
    /// Returns `AnalysisError::InvalidInput` or `InvalidTempoRange` when the
    /// configuration does not validate.
    pub fn new(config: StreamingConfig) -> Result<(Self, StreamController), AnalysisError> {
        config.validate()?;

        let (command_tx, command_rx) = rtrb::RingBuffer::new(config.command_capacity);
        let (event_tx, event_rx) = rtrb::RingBuffer::new(config.event_capacity);

        let spectrum = MagnitudeSpectrum::new(config.frame_size);
        let bins = spectrum.bins();

        log::debug!(
            "Streaming processor: {} Hz, frame={}, hop={}, tempo {}-{} BPM",
            config.sample_rate,
            config.frame_size,
            config.hop_size,
            config.min_tempo,
            config.max_tempo
        );

        let processor = Self {
            commands: command_rx,
            events: event_tx,
            input: SampleBuffer::new(config.frame_size * 2),
            frame: vec![0.0; config.frame_size],
            window: hann_window(config.frame_size),
            spectrum,
            previous_spectrum: vec![0.0; bins],
            has_previous_spectrum: false,
            previous_energy: 0.0,
            smoother: ExponentialSmoother::new(config.smoothing_alpha),
            history: BeatHistory::new(config.history_seconds),
            last_beat: None,
            pending: 0,
            frame_count: 0,
            active: config.start_active,
            min_tempo: config.min_tempo,
            max_tempo: config.max_tempo,
            sensitivity: config.sensitivity,
            tempo: 0.0,
            confidence: 0.0,
            dropped_events: 0,
            rejected_commands: 0,
            config,
        };

        let controller = StreamController {
            commands: command_tx,
            events: event_rx,
        };

        Ok((processor, controller))
    }

    /// Process one block of mono samples
    ///
    /// Pending commands are applied first. While stopped the block is
    /// discarded. Otherwise a frame is analysed each time another
    /// `hop_size` samples have arrived, regardless of block size.
    pub fn process_block(&mut self, samples: &[f32]) {
        while let Ok(command) = self.commands.pop() {
            if self.apply_command(command).is_err() {
                self.rejected_commands += 1;
            }
        }

        if !self.active {
            return;
        }

        let hop = self.config.hop_size;
        let mut remaining = samples;
        while !remaining.is_empty() {
            let take = (hop - self.pending).min(remaining.len());
            self.input.push(&remaining[..take]);
            self.pending += take;
            remaining = &remaining[take..];

            if self.pending == hop {
                self.pending = 0;
                self.analyze_frame();
            }
        }
    }

    /// Apply a command immediately
    ///
    /// # Errors
    ///
    /// An invalid tempo range or sensitivity is rejected and the previous
    /// value kept.
    pub fn apply_command(&mut self, command: StreamCommand) -> Result<(), AnalysisError> {
        match command {
            StreamCommand::Start => self.active = true,
            StreamCommand::Stop => self.active = false,
            StreamCommand::SetTempoRange { min, max } => {
                validate_tempo_range(min, max)?;
                self.min_tempo = min;
                self.max_tempo = max;
            }
            StreamCommand::SetSensitivity { value } => {
                validate_sensitivity(value)?;
                self.sensitivity = value;
            }
            StreamCommand::Reset => self.reset(),
        }
        Ok(())
    }

    /// Clear all rolling state
    ///
    /// Tempo range, sensitivity and the running flag are kept.
    pub fn reset(&mut self) {
        self.input.clear();
        self.pending = 0;
        self.previous_spectrum.iter_mut().for_each(|m| *m = 0.0);
        self.has_previous_spectrum = false;
        self.previous_energy = 0.0;
        self.smoother.reset();
        self.history.clear();
        self.last_beat = None;
        self.frame_count = 0;
        self.tempo = 0.0;
        self.confidence = 0.0;
    }

    fn analyze_frame(&mut self) {
        if !self.input.copy_latest(&mut self.frame) {
            return;
        }

        let energy = self
            .frame
            .iter()
            .zip(self.window.iter())
            .map(|(s, w)| {
                let x = s * w;
                x * x
            })
            .sum::<f32>()
            / self.frame.len() as f32;
        let smoothed = self.smoother.process(energy);

        let magnitudes = self.spectrum.compute(&self.frame, &self.window);

        let mut onset = (energy - self.previous_energy).max(0.0);
        if self.has_previous_spectrum {
            onset += FLUX_WEIGHT * spectral_flux(magnitudes, &self.previous_spectrum);
        }
        if smoothed > 0.0 {
            onset /= smoothed;
        }

        self.previous_spectrum.copy_from_slice(magnitudes);
        self.has_previous_spectrum = true;

        let time = self.frame_count as f64 * self.config.hop_size as f64
            / self.config.sample_rate as f64;

        if onset > self.sensitivity {
            self.register_beat(time, onset);
        }

        if self.frame_count % self.config.tempo_update_frames == 0 {
            self.update_tempo();
        }

        self.previous_energy = smoothed;
        self.frame_count += 1;
    }

    fn register_beat(&mut self, time: f64, strength: f32) {
        let refractory = 60.0 / self.max_tempo as f64;
        if let Some(last) = self.last_beat {
            if time - last < refractory {
                return;
            }
        }

        let beat = BeatEvent { time, strength };
        self.history.push(beat);
        self.last_beat = Some(time);
        self.emit(StreamEvent::Beat(beat));
    }

    fn update_tempo(&mut self) {
        let estimate = self.history.estimate(
            self.min_tempo,
            self.max_tempo,
            self.config.confidence_tolerance,
        );

        let avg_interval = match estimate {
            Some(estimate) => {
                self.confidence = estimate.confidence;
                if estimate.tempo != self.tempo {
                    self.tempo = estimate.tempo;
                    self.emit(StreamEvent::TempoUpdated(estimate));
                }
                estimate.avg_interval
            }
            None => self.history.average_interval(),
        };

        self.emit(StreamEvent::Snapshot(TempoEstimate {
            tempo: self.tempo,
            confidence: self.confidence,
            beat_count: self.history.len(),
            avg_interval,
        }));
    }

    fn emit(&mut self, event: StreamEvent) {
        if self.events.push(event).is_err() {
            self.dropped_events += 1;
        }
    }

    /// True while analysing
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Latest tempo estimate in BPM (0 before the first estimate)
    pub fn tempo(&self) -> f32 {
        self.tempo
    }

    /// Confidence of the latest tempo estimate
    pub fn confidence(&self) -> f32 {
        self.confidence
    }

    /// Beats currently in the history window
    pub fn beat_count(&self) -> usize {
        self.history.len()
    }

    /// Frames analysed since creation or the last reset
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Events lost because the event queue was full
    pub fn dropped_events(&self) -> u64 {
        self.dropped_events
    }

    /// Queued commands that failed validation
    pub fn rejected_commands(&self) -> u64 {
        self.rejected_commands
    }

    /// Active tempo clamp `(min, max)` in BPM
    pub fn tempo_range(&self) -> (f32, f32) {
        (self.min_tempo, self.max_tempo)
    }

    /// Active onset threshold
    pub fn sensitivity(&self) -> f32 {
        self.sensitivity
    }

    /// Configuration the processor was built with
    pub fn config(&self) -> &StreamingConfig {
        &self.config
    }
}

/// Control-thread half of the streaming tracker
///
/// Sends [`StreamCommand`]s and receives [`StreamEvent`]s without blocking.
pub struct StreamController {
    commands: rtrb::Producer<StreamCommand>,
    events: rtrb::Consumer<StreamEvent>,
}

impl StreamController {
    /// Queue a command for the next block
    ///
    /// # Errors
    ///
    /// Returns `AnalysisError::ProcessingError` if the command queue is full.
    pub fn send(&mut self, command: StreamCommand) -> Result<(), AnalysisError> {
        self.commands.push(command).map_err(|rtrb::PushError::Full(command)| {
            log::warn!("Streaming command queue full, dropping {:?}", command);
            AnalysisError::ProcessingError("Streaming command queue full".to_string())
        })
    }

    /// Start analysis
    pub fn start(&mut self) -> Result<(), AnalysisError> {
        self.send(StreamCommand::Start)
    }

    /// Stop analysis
    pub fn stop(&mut self) -> Result<(), AnalysisError> {
        self.send(StreamCommand::Stop)
    }

    /// Change the tempo clamp
    ///
    /// # Errors
    ///
    /// An invalid range is rejected here and never reaches the processor.
    pub fn set_tempo_range(&mut self, min: f32, max: f32) -> Result<(), AnalysisError> {
        if let Err(e) = validate_tempo_range(min, max) {
            log::warn!("Rejected tempo range {}-{}: {}", min, max, e);
            return Err(e);
        }
        self.send(StreamCommand::SetTempoRange { min, max })
    }

    /// Change the onset threshold
    ///
    /// # Errors
    ///
    /// Negative or non-finite values are rejected here.
    pub fn set_sensitivity(&mut self, value: f32) -> Result<(), AnalysisError> {
        if let Err(e) = validate_sensitivity(value) {
            log::warn!("Rejected sensitivity: {}", e);
            return Err(e);
        }
        self.send(StreamCommand::SetSensitivity { value })
    }

    /// Clear the processor's rolling state
    pub fn reset(&mut self) -> Result<(), AnalysisError> {
        self.send(StreamCommand::Reset)
    }

    /// Next pending event, if any
    pub fn poll_event(&mut self) -> Option<StreamEvent> {
        self.events.pop().ok()
    }

    /// Drain all pending events
    pub fn events(&mut self) -> impl Iterator<Item = StreamEvent> + '_ {
        std::iter::from_fn(move || self.events.pop().ok())
    }
}

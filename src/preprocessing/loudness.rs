//! Integrated loudness (ITU-R BS.1770 style)
//!
//! The signal goes through a K-weighting high-pass shelf, is split into
//! 400 ms blocks, blocks below the -70 LUFS absolute gate are discarded, and
//! the mean square of the rest is converted to LUFS. Filtering and block
//! accumulation run in one pass with no intermediate buffer.

use crate::error::AnalysisError;

/// Absolute gate in LUFS
const ABSOLUTE_GATE_LUFS: f32 = -70.0;

/// Block length for integration
const BLOCK_DURATION_MS: f32 = 400.0;

/// Offset of the LUFS scale: `LUFS = -0.691 + 10 * log10(mean_square)`
const LUFS_OFFSET: f32 = -0.691;

/// Second-order high-pass shelf approximating the K-weighting curve
///
/// Transposed direct form II.
struct KWeighting {
    b0: f32,
    b1: f32,
    b2: f32,
    a1: f32,
    a2: f32,
    s1: f32,
    s2: f32,
}

impl KWeighting {
    fn new(sample_rate: f32) -> Self {
        let w0 = 2.0 * std::f32::consts::PI * 1_681.974_5 / sample_rate;
        let (sin_w0, cos_w0) = w0.sin_cos();
        let alpha = sin_w0 / 2.0 * (1.0f32 / 0.707).sqrt();
        let a0 = 1.0 + alpha;
        Self {
            b0: (1.0 + cos_w0) / 2.0 / a0,
            b1: -(1.0 + cos_w0) / a0,
            b2: (1.0 + cos_w0) / 2.0 / a0,
            a1: -2.0 * cos_w0 / a0,
            a2: (1.0 - alpha) / a0,
            s1: 0.0,
            s2: 0.0,
        }
    }

    fn process(&mut self, x: f32) -> f32 {
        let y = self.b0 * x + self.s1;
        self.s1 = self.b1 * x + self.s2 - self.a1 * y;
        self.s2 = self.b2 * x - self.a2 * y;
        y
    }
}

fn mean_square_to_lufs(mean_square: f32) -> f32 {
    LUFS_OFFSET + 10.0 * mean_square.log10()
}

/// Integrated loudness of a mono buffer in LUFS
///
/// A trailing partial block counts as a block of its own length.
///
/// # Returns
///
/// `None` when every block falls below the absolute gate (silence)
///
/// # Errors
///
/// Returns `AnalysisError::InvalidInput` for an empty buffer or a sample
/// rate too low to form a block.
pub fn integrated_loudness(
    samples: &[f32],
    sample_rate: u32,
) -> Result<Option<f32>, AnalysisError> {
    if samples.is_empty() {
        return Err(AnalysisError::InvalidInput("Empty audio samples".to_string()));
    }
    let block_size = (sample_rate as f32 * BLOCK_DURATION_MS / 1000.0) as usize;
    if block_size == 0 {
        return Err(AnalysisError::InvalidInput(format!(
            "Sample rate {} too low for loudness measurement",
            sample_rate
        )));
    }

    let gate = 10.0f32.powf((ABSOLUTE_GATE_LUFS - LUFS_OFFSET) / 10.0);
    let mut filter = KWeighting::new(sample_rate as f32);
    let mut gated_sum = 0.0f64;
    let mut gated_blocks = 0usize;

    for block in samples.chunks(block_size) {
        let sum_sq: f32 = block
            .iter()
            .map(|&s| {
                let y = filter.process(s);
                y * y
            })
            .sum();
        let mean_square = sum_sq / block.len() as f32;
        if mean_square > gate {
            gated_sum += mean_square as f64;
            gated_blocks += 1;
        }
    }

    if gated_blocks == 0 {
        log::debug!("All loudness blocks below the {} LUFS gate", ABSOLUTE_GATE_LUFS);
        return Ok(None);
    }

    let lufs = mean_square_to_lufs((gated_sum / gated_blocks as f64) as f32);
    log::debug!("Integrated loudness: {:.1} LUFS over {} blocks", lufs, gated_blocks);
    Ok(Some(lufs))
}

//! Fixed-capacity circular sample buffer
//!
//! Used by the streaming processor: storage is allocated once in
//! [`SampleBuffer::new`] and never grows, so pushing and reading are safe to
//! do from an audio callback.

/// Circular buffer holding the most recent `capacity` samples
#[derive(Debug, Clone)]
pub struct SampleBuffer {
    /// Buffer data
    data: Vec<f32>,
    /// Next write position
    write_pos: usize,
    /// Number of valid samples (saturates at capacity)
    filled: usize,
}

impl SampleBuffer {
    /// Create a zeroed buffer of `capacity` samples
    pub fn new(capacity: usize) -> Self {
        Self {
            data: vec![0.0; capacity.max(1)],
            write_pos: 0,
            filled: 0,
        }
    }

    /// Total capacity in samples
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Number of valid samples held
    pub fn len(&self) -> usize {
        self.filled
    }

    /// True if nothing has been pushed since creation or the last clear
    pub fn is_empty(&self) -> bool {
        self.filled == 0
    }

    /// Append samples, overwriting the oldest ones once full
    pub fn push(&mut self, samples: &[f32]) {
        let capacity = self.data.len();
        // Only the tail can survive when more than a full buffer is pushed
        let samples = if samples.len() > capacity {
            &samples[samples.len() - capacity..]
        } else {
            samples
        };

        let first = (capacity - self.write_pos).min(samples.len());
        self.data[self.write_pos..self.write_pos + first].copy_from_slice(&samples[..first]);
        let rest = samples.len() - first;
        self.data[..rest].copy_from_slice(&samples[first..]);

        self.write_pos = (self.write_pos + samples.len()) % capacity;
        self.filled = (self.filled + samples.len()).min(capacity);
    }

    /// Copy the most recent `out.len()` samples into `out`, oldest first
    ///
    /// Positions never written read as zero. Returns false (and leaves `out`
    /// untouched) if `out` is longer than the buffer.
    pub fn copy_latest(&self, out: &mut [f32]) -> bool {
        let capacity = self.data.len();
        let n = out.len();
        if n > capacity {
            return false;
        }
        let start = (self.write_pos + capacity - n) % capacity;
        let first = (capacity - start).min(n);
        out[..first].copy_from_slice(&self.data[start..start + first]);
        out[first..].copy_from_slice(&self.data[..n - first]);
        true
    }

    /// Zero the contents and rewind
    pub fn clear(&mut self) {
        self.data.iter_mut().for_each(|s| *s = 0.0);
        self.write_pos = 0;
        self.filled = 0;
    }
}

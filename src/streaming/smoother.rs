//! Exponential smoothing of frame energy

/// First-order exponential smoother
///
/// The first input initializes the state and is returned unchanged; later
/// inputs give `alpha * input + (1 - alpha) * previous`.
#[derive(Debug, Clone)]
pub struct ExponentialSmoother {
    alpha: f32,
    value: f32,
    initialized: bool,
}

impl ExponentialSmoother {
    /// Smoother with factor `alpha` (clamped to [0, 1])
    pub fn new(alpha: f32) -> Self {
        Self {
            alpha: alpha.clamp(0.0, 1.0),
            value: 0.0,
            initialized: false,
        }
    }

    /// Feed one value and return the smoothed value
    pub fn process(&mut self, input: f32) -> f32 {
        if self.initialized {
            self.value = self.alpha * input + (1.0 - self.alpha) * self.value;
        } else {
            self.value = input;
            self.initialized = true;
        }
        self.value
    }

    /// Current smoothed value (0 before the first input)
    pub fn value(&self) -> f32 {
        self.value
    }

    /// Forget all history
    pub fn reset(&mut self) {
        self.value = 0.0;
        self.initialized = false;
    }
}

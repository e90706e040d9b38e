//! Krumhansl-Schmuckler key templates
//!
//! Probe-tone profiles for a major and a minor key with tonic C. Other tonics
//! use the same profile rotated by the tonic offset.

/// Major profile, index 0 = tonic
pub const MAJOR_PROFILE: [f32; 12] = [
    6.35, 2.23, 3.48, 2.33, 4.38, 4.09, 2.52, 5.19, 2.39, 3.66, 2.29, 2.88,
];

/// Minor profile, index 0 = tonic
pub const MINOR_PROFILE: [f32; 12] = [
    6.33, 2.68, 3.52, 5.38, 2.60, 3.53, 2.54, 4.75, 3.98, 2.69, 3.34, 3.17,
];

/// Key templates for both modes
#[derive(Debug, Clone, PartialEq)]
pub struct KeyTemplates {
    /// Major key template (tonic at index 0)
    pub major: [f32; 12],

    /// Minor key template (tonic at index 0)
    pub minor: [f32; 12],
}

impl KeyTemplates {
    /// Create templates with the Krumhansl-Schmuckler profiles
    pub fn new() -> Self {
        Self {
            major: MAJOR_PROFILE,
            minor: MINOR_PROFILE,
        }
    }

    /// Dot product of `chroma` with a profile rotated to `tonic`
    ///
    /// Profile step `i` is matched against pitch class `(i + tonic) % 12`.
    pub fn correlate(chroma: &[f32; 12], profile: &[f32; 12], tonic: usize) -> f32 {
        profile
            .iter()
            .enumerate()
            .map(|(i, &weight)| chroma[(i + tonic) % 12] * weight)
            .sum()
    }
}

impl Default for KeyTemplates {
    fn default() -> Self {
        Self::new()
    }
}

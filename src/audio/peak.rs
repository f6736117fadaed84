//! Lock-free peak holder shared between the capture callback and the sampler
//!
//! The audio thread folds every incoming buffer into the running maximum,
//! the sampler thread takes (and clears) it once per tick. Both sides only
//! touch a single atomic, so the real-time callback never blocks.

use std::sync::atomic::{AtomicU32, Ordering};

use crate::audio::transform::sample_to_amplitude;

/// Peak amplitude observed since the last `take`
#[derive(Debug, Default)]
pub struct PeakHold {
    peak: AtomicU32,
}

impl PeakHold {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold a buffer of normalized samples into the peak (audio thread)
    pub fn update_from_samples(&self, samples: &[f32]) {
        if samples.is_empty() {
            return;
        }

        let peak = samples
            .iter()
            .map(|&s| sample_to_amplitude(s))
            .max()
            .unwrap_or(0);

        self.update(peak);
    }

    /// Fold a single 16-bit amplitude into the peak
    pub fn update(&self, amplitude: u16) {
        self.peak.fetch_max(u32::from(amplitude), Ordering::Relaxed);
    }

    /// Return the peak since the previous call and reset it to zero
    pub fn take(&self) -> u16 {
        self.peak.swap(0, Ordering::Relaxed).min(u32::from(u16::MAX)) as u16
    }
}

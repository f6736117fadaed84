//! Synthetic amplitude source
//!
//! Produces plausible ambient noise with occasional loud peaks for machines
//! without a usable capture device. Values are generated directly on the
//! display scale and bypass the amplitude mapping.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::audio::source::{AmplitudeSource, Sample, SourceHandle, SourceKind};
use crate::constants::{SYNTHETIC_CEILING_DB, SYNTHETIC_FLOOR_DB};
use crate::error::SourceError;

const AMBIENT_MIN_DB: f64 = 35.0;
const AMBIENT_MAX_DB: f64 = 45.0;
const PEAK_PROBABILITY: f64 = 0.3;
const PEAK_MIN_DB: f64 = 20.0;
const PEAK_MAX_DB: f64 = 40.0;
const JITTER_MAX_DB: f64 = 10.0;

/// Source producing randomized ambient/peak noise
#[derive(Debug, Clone, Default)]
pub struct SyntheticSource {
    /// Fixed seed for reproducible sessions; entropy-seeded when `None`
    seed: Option<u64>,
}

impl SyntheticSource {
    pub fn new() -> Self {
        Self { seed: None }
    }

    /// Every handle opened from this source replays the same sequence
    pub fn with_seed(seed: u64) -> Self {
        Self { seed: Some(seed) }
    }
}

impl AmplitudeSource for SyntheticSource {
    fn open(&self) -> Result<Box<dyn SourceHandle>, SourceError> {
        let rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        tracing::debug!("Synthetic source opened (seeded: {})", self.seed.is_some());
        Ok(Box::new(SyntheticHandle { rng }))
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Synthetic
    }
}

/// Open synthetic session
pub struct SyntheticHandle {
    rng: StdRng,
}

impl SyntheticHandle {
    /// Next display-scale level
    pub fn next_level(&mut self) -> f64 {
        synthetic_level(&mut self.rng)
    }
}

impl SourceHandle for SyntheticHandle {
    fn sample(&mut self) -> Result<Sample, SourceError> {
        Ok(Sample::Decibels(self.next_level()))
    }

    fn close(self: Box<Self>) -> Result<(), SourceError> {
        Ok(())
    }
}

/// Ambient base in [35, 45], plus a [20, 40] peak with probability 0.3 or
/// a [0, 10] jitter otherwise, clamped to [30, 100].
pub fn synthetic_level<R: Rng + ?Sized>(rng: &mut R) -> f64 {
    let base = rng.random_range(AMBIENT_MIN_DB..=AMBIENT_MAX_DB);
    let extra = if rng.random_bool(PEAK_PROBABILITY) {
        rng.random_range(PEAK_MIN_DB..=PEAK_MAX_DB)
    } else {
        rng.random_range(0.0..=JITTER_MAX_DB)
    };
    (base + extra).clamp(SYNTHETIC_FLOOR_DB, SYNTHETIC_CEILING_DB)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_range_over_many_ticks() {
        let source = SyntheticSource::new();
        let mut handle = source.open().unwrap();
        for _ in 0..10_000 {
            let db = handle.sample().unwrap().to_decibels();
            assert!((30.0..=100.0).contains(&db), "out of range: {db}");
        }
        handle.close().unwrap();
    }

    #[test]
    fn test_seeded_sessions_repeat() {
        let source = SyntheticSource::with_seed(7);
        let mut a = source.open().unwrap();
        let mut b = source.open().unwrap();
        for _ in 0..32 {
            assert_eq!(a.sample().unwrap(), b.sample().unwrap());
        }
    }

    #[test]
    fn test_peaks_occur_at_roughly_thirty_percent() {
        // Without a peak the sum never exceeds 55
        let mut rng = StdRng::seed_from_u64(42);
        let peaks = (0..10_000)
            .filter(|_| synthetic_level(&mut rng) > 55.0)
            .count();
        assert!((2_500..3_500).contains(&peaks), "peaks = {peaks}");
    }

    #[test]
    fn test_kind() {
        assert_eq!(SyntheticSource::new().kind(), SourceKind::Synthetic);
        assert!(SyntheticSource::new().runtime_permission());
    }

    proptest! {
        #[test]
        fn prop_any_seed_stays_in_range(seed in any::<u64>()) {
            let mut rng = StdRng::seed_from_u64(seed);
            for _ in 0..100 {
                let db = synthetic_level(&mut rng);
                prop_assert!((30.0..=100.0).contains(&db));
            }
        }
    }
}

//! Amplitude to display-decibel mapping
//!
//! The mapping is a heuristic display scale, not a calibrated sound
//! pressure level measurement. Raw peak amplitude is rescaled by
//! `ratio * 10000 + 1` so that the usable amplitude range lands on a
//! logarithmic curve resembling everyday quiet-to-loud dB figures, then
//! offset by +20 and hard-clamped to the 30–120 band. Two microphones with
//! different gain will report different numbers for the same sound.

use crate::constants::{DEVICE_CEILING_DB, DEVICE_FLOOR_DB, MAX_AMPLITUDE};

const AMPLITUDE_SCALE: f64 = 10_000.0;
const DISPLAY_OFFSET_DB: f64 = 20.0;

/// Map a 16-bit peak amplitude onto the display scale.
///
/// Zero maps to the floor exactly. Amplitudes above 32767 are treated as
/// full scale.
pub fn amplitude_to_decibels(amplitude: u16) -> f64 {
    if amplitude == 0 {
        return DEVICE_FLOOR_DB;
    }

    let ratio = f64::from(amplitude.min(MAX_AMPLITUDE)) / f64::from(MAX_AMPLITUDE);
    let raw_db = 20.0 * (ratio * AMPLITUDE_SCALE + 1.0).log10();
    (raw_db + DISPLAY_OFFSET_DB).clamp(DEVICE_FLOOR_DB, DEVICE_CEILING_DB)
}

/// Convert a normalized sample in [-1.0, 1.0] to a 16-bit peak amplitude
#[inline]
pub fn sample_to_amplitude(sample: f32) -> u16 {
    let magnitude = if sample.is_finite() { sample.abs().min(1.0) } else { 0.0 };
    (magnitude * f32::from(MAX_AMPLITUDE)) as u16
}

/// Whether a display-scale level is strictly above the threshold
#[inline]
pub fn exceeds_threshold(decibel_level: f64, threshold_db: f64) -> bool {
    decibel_level > threshold_db
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn formula(amplitude: u16) -> f64 {
        let ratio = amplitude as f64 / 32767.0;
        (20.0 * (ratio * 10000.0 + 1.0).log10() + 20.0).clamp(30.0, 120.0)
    }

    #[test]
    fn test_zero_amplitude_is_floor() {
        assert_eq!(amplitude_to_decibels(0), 30.0);
    }

    #[test]
    fn test_known_amplitudes() {
        assert_eq!(amplitude_to_decibels(0), 30.0);

        let mid = amplitude_to_decibels(16384);
        assert!((mid - formula(16384)).abs() < 1e-9);
        // 20*log10(0.50002*10000 + 1) + 20
        assert!((mid - 93.98).abs() < 0.01, "mid = {mid}");

        let full = amplitude_to_decibels(32767);
        assert!((full - formula(32767)).abs() < 1e-9);
        assert!(full <= 120.0);
    }

    #[test]
    fn test_small_amplitude_hits_floor() {
        // 20*log10(10000/32767 + 1) + 20 is about 22.3, clamped up
        assert_eq!(amplitude_to_decibels(1), 30.0);
    }

    #[test]
    fn test_sample_to_amplitude() {
        assert_eq!(sample_to_amplitude(0.0), 0);
        assert_eq!(sample_to_amplitude(1.0), 32767);
        assert_eq!(sample_to_amplitude(-1.0), 32767);
        assert_eq!(sample_to_amplitude(2.5), 32767);
        assert_eq!(sample_to_amplitude(f32::NAN), 0);
        assert_eq!(sample_to_amplitude(0.5), 16383);
    }

    #[test]
    fn test_threshold_is_strict() {
        assert!(!exceeds_threshold(75.0, 75.0));
        assert!(exceeds_threshold(75.0001, 75.0));
        assert!(!exceeds_threshold(30.0, 75.0));
    }

    proptest! {
        #[test]
        fn prop_output_in_device_range(amplitude in 1u16..=32767) {
            let db = amplitude_to_decibels(amplitude);
            prop_assert!((30.0..=120.0).contains(&db));
        }

        #[test]
        fn prop_monotonic(a in 0u16..32767) {
            prop_assert!(amplitude_to_decibels(a) <= amplitude_to_decibels(a + 1));
        }

        #[test]
        fn prop_matches_formula(amplitude in 1u16..=32767) {
            prop_assert!((amplitude_to_decibels(amplitude) - formula(amplitude)).abs() < 1e-9);
        }
    }
}

//! Shared constants

/// Default alert boundary on the display scale
pub const DEFAULT_THRESHOLD_DB: f64 = 75.0;

/// Default period between two sampler ticks
pub const DEFAULT_SAMPLE_INTERVAL_MS: u64 = 100;

/// Largest peak amplitude a source may report (16-bit full scale)
pub const MAX_AMPLITUDE: u16 = 32767;

/// Display floor for device-derived readings
pub const DEVICE_FLOOR_DB: f64 = 30.0;

/// Display ceiling for device-derived readings
pub const DEVICE_CEILING_DB: f64 = 120.0;

/// Display floor for synthetic readings
pub const SYNTHETIC_FLOOR_DB: f64 = 30.0;

/// Display ceiling for synthetic readings
pub const SYNTHETIC_CEILING_DB: f64 = 100.0;

/// How long `open()` waits for the capture thread to report readiness
pub const DEVICE_OPEN_TIMEOUT_MS: u64 = 3000;

/// Prefix of the per-session scratch file
pub const SCRATCH_FILE_PREFIX: &str = "level-";

/// Default HTTP port for the observer bridge
pub const DEFAULT_HTTP_PORT: u16 = 8095;

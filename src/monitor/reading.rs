//! Published monitor state

use serde::Serialize;

use crate::audio::source::SourceKind;
use crate::audio::transform::exceeds_threshold;

/// Latest level on the display scale and its alert flag
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Reading {
    pub decibel_level: f64,
    pub threshold_exceeded: bool,
}

impl Reading {
    pub fn new(decibel_level: f64, threshold_db: f64) -> Self {
        Self {
            decibel_level,
            threshold_exceeded: exceeds_threshold(decibel_level, threshold_db),
        }
    }

    /// Value published while the monitor is not running
    pub fn silent() -> Self {
        Self {
            decibel_level: 0.0,
            threshold_exceeded: false,
        }
    }
}

impl Default for Reading {
    fn default() -> Self {
        Self::silent()
    }
}

/// Lifecycle phase of a monitor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MonitorPhase {
    Idle,
    Starting,
    Running,
    Stopping,
}

/// Whole-value snapshot handed to observers.
///
/// Every update replaces the snapshot atomically, so an observer never sees
/// a reading from one tick paired with a flag from another.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonitorSnapshot {
    pub phase: MonitorPhase,
    pub running: bool,
    pub permission_granted: bool,
    pub source: SourceKind,
    pub threshold_db: f64,
    pub reading: Reading,
    /// Ticks completed in the current session
    pub tick: u64,
    /// Per-tick errors absorbed in the current session
    pub sample_errors: u64,
    /// Advisory status text, overwritten on every update
    pub diagnostic: String,
}

impl MonitorSnapshot {
    pub fn idle(source: SourceKind, threshold_db: f64) -> Self {
        Self {
            phase: MonitorPhase::Idle,
            running: false,
            permission_granted: false,
            source,
            threshold_db,
            reading: Reading::silent(),
            tick: 0,
            sample_errors: 0,
            diagnostic: String::from("Idle"),
        }
    }

    pub(crate) fn set_phase(&mut self, phase: MonitorPhase) {
        self.phase = phase;
        self.running = phase == MonitorPhase::Running;
    }

    /// Move to idle and clear all session state
    pub(crate) fn reset_to_idle(&mut self, diagnostic: impl Into<String>) {
        self.set_phase(MonitorPhase::Idle);
        self.reading = Reading::silent();
        self.diagnostic = diagnostic.into();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reading_threshold_flag() {
        assert!(!Reading::new(75.0, 75.0).threshold_exceeded);
        assert!(Reading::new(75.5, 75.0).threshold_exceeded);
        assert!(!Reading::new(30.0, 75.0).threshold_exceeded);
    }

    #[test]
    fn test_silent_reading() {
        let r = Reading::silent();
        assert_eq!(r.decibel_level, 0.0);
        assert!(!r.threshold_exceeded);
        assert_eq!(Reading::default(), r);
    }

    #[test]
    fn test_phase_drives_running_flag() {
        let mut snapshot = MonitorSnapshot::idle(SourceKind::Synthetic, 75.0);
        assert!(!snapshot.running);

        snapshot.set_phase(MonitorPhase::Running);
        assert!(snapshot.running);

        snapshot.reading = Reading::new(90.0, 75.0);
        snapshot.reset_to_idle("Stopped");
        assert!(!snapshot.running);
        assert_eq!(snapshot.phase, MonitorPhase::Idle);
        assert_eq!(snapshot.reading, Reading::silent());
        assert_eq!(snapshot.diagnostic, "Stopped");
    }

    #[test]
    fn test_snapshot_serializes() {
        let snapshot = MonitorSnapshot::idle(SourceKind::Device, 75.0);
        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["phase"], "idle");
        assert_eq!(json["source"], "device");
        assert_eq!(json["reading"]["threshold_exceeded"], false);
    }
}

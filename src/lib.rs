//! Sound level monitor
//!
//! Samples microphone amplitude on a fixed period, maps it onto a display
//! decibel scale and publishes the latest reading together with a
//! threshold-exceeded flag to any number of read-only observers.

pub mod audio;
pub mod config;
pub mod constants;
pub mod error;
pub mod monitor;
pub mod protocol;
pub mod ui;

pub use error::{Error, MonitorError, Result, SourceError};
pub use monitor::{MonitorPhase, MonitorSnapshot, Reading, SoundLevelMonitor};

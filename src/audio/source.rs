//! Amplitude source capability
//!
//! A source is a factory for session handles. Each `open` yields a fresh
//! handle owned by exactly one sampler; handles are never reused across
//! sessions.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::audio::transform::amplitude_to_decibels;
use crate::error::SourceError;

/// One value pulled from a source handle
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Sample {
    /// Raw 16-bit peak amplitude, still to be mapped onto the display scale
    Amplitude(u16),
    /// Value already expressed on the display scale
    Decibels(f64),
}

impl Sample {
    /// Display-scale level for this sample
    pub fn to_decibels(self) -> f64 {
        match self {
            Sample::Amplitude(amplitude) => amplitude_to_decibels(amplitude),
            Sample::Decibels(db) => db,
        }
    }
}

/// Which source variant a monitor samples from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    #[default]
    Device,
    Synthetic,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::Device => write!(f, "device"),
            SourceKind::Synthetic => write!(f, "synthetic"),
        }
    }
}

/// Factory for amplitude-sampling sessions
pub trait AmplitudeSource: Send + Sync {
    /// Acquire the underlying device and return a session handle
    fn open(&self) -> Result<Box<dyn SourceHandle>, SourceError>;

    /// Runtime check that capture is currently allowed
    fn runtime_permission(&self) -> bool {
        true
    }

    fn kind(&self) -> SourceKind;
}

/// An open sampling session
pub trait SourceHandle: Send {
    /// Peak since the previous call. Must not block longer than one tick.
    fn sample(&mut self) -> Result<Sample, SourceError>;

    /// Release the device and any backing storage.
    ///
    /// Safe to call on a handle whose device already failed.
    fn close(self: Box<Self>) -> Result<(), SourceError>;
}

//! Error types

use thiserror::Error;

/// Errors raised by an amplitude source or one of its handles
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("No input device available: {0}")]
    DeviceUnavailable(String),

    #[error("Unsupported sample format: {0}")]
    UnsupportedFormat(String),

    #[error("Failed to open input stream: {0}")]
    Open(String),

    #[error("Sample read failed: {0}")]
    SampleRead(String),

    #[error("Input device disconnected: {0}")]
    Disconnected(String),

    #[error("Failed to release source: {0}")]
    Release(String),

    #[error("Scratch file error: {0}")]
    Scratch(#[from] std::io::Error),
}

impl SourceError {
    /// Whether the sampler must give up the session on this error
    pub fn is_fatal(&self) -> bool {
        matches!(self, SourceError::Disconnected(_))
    }
}

impl From<cpal::BuildStreamError> for SourceError {
    fn from(err: cpal::BuildStreamError) -> Self {
        let message = err.to_string();
        match err {
            cpal::BuildStreamError::DeviceNotAvailable => SourceError::DeviceUnavailable(message),
            _ => SourceError::Open(message),
        }
    }
}

impl From<cpal::DefaultStreamConfigError> for SourceError {
    fn from(err: cpal::DefaultStreamConfigError) -> Self {
        SourceError::DeviceUnavailable(err.to_string())
    }
}

impl From<cpal::PlayStreamError> for SourceError {
    fn from(err: cpal::PlayStreamError) -> Self {
        SourceError::Open(err.to_string())
    }
}

impl From<hound::Error> for SourceError {
    fn from(err: hound::Error) -> Self {
        match err {
            hound::Error::IoError(io) => SourceError::Scratch(io),
            other => SourceError::Open(other.to_string()),
        }
    }
}

/// Errors surfaced by `SoundLevelMonitor::start`
#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("Microphone permission not granted")]
    Permission,

    #[error("Failed to open amplitude source: {0}")]
    Device(#[from] SourceError),

    #[error("Failed to spawn sampler thread: {0}")]
    Spawn(String),
}

/// Crate-level error
#[derive(Debug, Error)]
pub enum Error {
    #[error("Monitor error: {0}")]
    Monitor(#[from] MonitorError),

    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

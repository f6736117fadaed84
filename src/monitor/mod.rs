//! Sound level monitor
//!
//! Owns the lifecycle of one amplitude source and the sampling thread that
//! polls it:
//!
//! ```text
//!   Idle ──start()──▶ Starting ──open ok──▶ Running ──stop()──▶ Stopping ──▶ Idle
//!                        │                     │
//!                        └──open failed──▶ Idle◀──device failure
//! ```
//!
//! Observers get whole-value [`MonitorSnapshot`]s through a watch channel and
//! never touch monitor state directly. `stop()` joins the sampling thread
//! before the handle is released and before the idle snapshot is published,
//! so no tick can land after it returns.

mod reading;
mod sampler;

pub use reading::{MonitorPhase, MonitorSnapshot, Reading};

use crossbeam_channel::{bounded, Sender};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tokio::sync::watch;

use crate::audio::device::DeviceSource;
use crate::audio::source::{AmplitudeSource, SourceHandle, SourceKind};
use crate::audio::synthetic::SyntheticSource;
use crate::config::MonitorConfig;
use crate::constants::{DEFAULT_SAMPLE_INTERVAL_MS, DEFAULT_THRESHOLD_DB};
use crate::error::MonitorError;
use sampler::Sampler;

/// Sampling parameters of a monitor
#[derive(Debug, Clone, Copy)]
pub struct MonitorSettings {
    pub threshold_db: f64,
    pub sample_interval: Duration,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            threshold_db: DEFAULT_THRESHOLD_DB,
            sample_interval: Duration::from_millis(DEFAULT_SAMPLE_INTERVAL_MS),
        }
    }
}

impl From<&MonitorConfig> for MonitorSettings {
    fn from(config: &MonitorConfig) -> Self {
        Self {
            threshold_db: config.threshold_db,
            sample_interval: Duration::from_millis(config.sample_interval_ms.max(1)),
        }
    }
}

/// A running sampler thread and the means to stop it
struct Session {
    stop_tx: Sender<()>,
    thread: JoinHandle<Option<Box<dyn SourceHandle>>>,
    failed: Arc<AtomicBool>,
}

impl Session {
    /// Whether the sampler ended on its own after a device failure
    fn has_ended(&self) -> bool {
        self.failed.load(Ordering::SeqCst) || self.thread.is_finished()
    }

    /// Stop the sampler and wait for it. Returns the handle if still open.
    fn shutdown(self) -> Option<Box<dyn SourceHandle>> {
        let _ = self.stop_tx.send(());
        match self.thread.join() {
            Ok(handle) => handle,
            Err(_) => {
                tracing::error!("Sampler thread panicked");
                None
            }
        }
    }
}

/// Periodic sound level sampler with a start/stop lifecycle
pub struct SoundLevelMonitor {
    source: Arc<dyn AmplitudeSource>,
    settings: MonitorSettings,
    permission_granted: AtomicBool,
    state_tx: Arc<watch::Sender<MonitorSnapshot>>,
    session: Mutex<Option<Session>>,
}

impl SoundLevelMonitor {
    pub fn new(source: Arc<dyn AmplitudeSource>, settings: MonitorSettings) -> Self {
        let initial = MonitorSnapshot::idle(source.kind(), settings.threshold_db);
        let (state_tx, _) = watch::channel(initial);

        Self {
            source,
            settings,
            permission_granted: AtomicBool::new(false),
            state_tx: Arc::new(state_tx),
            session: Mutex::new(None),
        }
    }

    /// Build the configured source variant and a monitor around it
    pub fn from_config(config: &MonitorConfig) -> Self {
        let source: Arc<dyn AmplitudeSource> = match config.source {
            SourceKind::Device => Arc::new(DeviceSource::new(
                config.device_name.clone(),
                config.scratch_dir(),
            )),
            SourceKind::Synthetic => Arc::new(SyntheticSource::new()),
        };

        let monitor = Self::new(source, MonitorSettings::from(config));
        monitor.check_permission(config.permission_granted);
        monitor
    }

    /// Record the permission collaborator's answer.
    ///
    /// Revoking permission stops the monitor, including a session whose
    /// `start()` is still opening the source.
    pub fn check_permission(&self, granted: bool) {
        let previous = self.permission_granted.swap(granted, Ordering::SeqCst);
        self.state_tx.send_modify(|s| s.permission_granted = granted);

        if previous != granted {
            tracing::info!("Microphone permission {}", if granted { "granted" } else { "revoked" });
        }

        if !granted {
            // Waits on the session lock, so an in-flight start finishes first
            self.stop();
        }
    }

    /// Start sampling. A no-op when already running.
    pub fn start(&self) -> Result<(), MonitorError> {
        let mut session = self.session.lock();

        if let Some(active) = session.as_ref() {
            if !active.has_ended() {
                tracing::debug!("Monitor already running");
                return Ok(());
            }
            // Ended on a device failure; the handle is already released
            if let Some(stale) = session.take() {
                let _ = stale.shutdown();
            }
        }

        if !self.permission_granted.load(Ordering::SeqCst) {
            tracing::warn!("Start refused: microphone permission not granted");
            return Err(MonitorError::Permission);
        }

        if !self.source.runtime_permission() {
            tracing::warn!("Start refused: {} source denied access at runtime", self.source.kind());
            self.permission_granted.store(false, Ordering::SeqCst);
            self.state_tx.send_modify(|s| {
                s.permission_granted = false;
                s.diagnostic = MonitorError::Permission.to_string();
            });
            return Err(MonitorError::Permission);
        }

        self.state_tx.send_modify(|s| {
            s.set_phase(MonitorPhase::Starting);
            s.diagnostic = String::from("Starting");
        });

        let handle = match self.source.open() {
            Ok(handle) => handle,
            Err(e) => {
                tracing::error!("Failed to open {} source: {}", self.source.kind(), e);
                self.state_tx.send_modify(|s| s.reset_to_idle(e.to_string()));
                return Err(MonitorError::Device(e));
            }
        };

        // Fresh session state before the first tick can land
        self.state_tx.send_modify(|s| {
            s.set_phase(MonitorPhase::Running);
            s.reading = Reading::silent();
            s.tick = 0;
            s.sample_errors = 0;
            s.diagnostic = String::from("Running");
        });

        let (stop_tx, stop_rx) = bounded::<()>(1);
        let failed = Arc::new(AtomicBool::new(false));
        let sampler = Sampler {
            handle,
            state_tx: self.state_tx.clone(),
            threshold_db: self.settings.threshold_db,
            interval: self.settings.sample_interval,
            stop_rx,
            failed: failed.clone(),
        };

        // On spawn failure the closure, and the handle inside it, is dropped
        let thread = thread::Builder::new()
            .name("level-sampler".to_string())
            .spawn(move || sampler.run())
            .map_err(|e| {
                self.state_tx.send_modify(|s| s.reset_to_idle(e.to_string()));
                MonitorError::Spawn(e.to_string())
            })?;

        *session = Some(Session {
            stop_tx,
            thread,
            failed,
        });

        tracing::info!(
            "Monitor started ({} source, every {:?}, threshold {:.1} dB)",
            self.source.kind(),
            self.settings.sample_interval,
            self.settings.threshold_db
        );
        Ok(())
    }

    /// Stop sampling and release the source. A no-op when idle.
    ///
    /// Release failures are logged and reflected in the diagnostic only; the
    /// monitor always ends up idle and restartable.
    pub fn stop(&self) {
        let mut session = self.session.lock();
        let Some(active) = session.take() else {
            return;
        };

        self.state_tx.send_modify(|s| {
            if s.running {
                s.set_phase(MonitorPhase::Stopping);
            }
        });

        // `None` means the session already ended on a device failure; its
        // diagnostic stays published
        let diagnostic = active.shutdown().map(|handle| match handle.close() {
            Ok(()) => String::from("Stopped"),
            Err(e) => {
                tracing::warn!("Release failed during stop: {}", e);
                e.to_string()
            }
        });

        self.state_tx.send_modify(|s| {
            let diagnostic = diagnostic.unwrap_or_else(|| s.diagnostic.clone());
            s.reset_to_idle(diagnostic);
        });
        tracing::info!("Monitor stopped");
    }

    /// Subscribe to snapshot updates
    pub fn subscribe(&self) -> watch::Receiver<MonitorSnapshot> {
        self.state_tx.subscribe()
    }

    /// Latest published snapshot
    pub fn snapshot(&self) -> MonitorSnapshot {
        self.state_tx.borrow().clone()
    }

    pub fn reading(&self) -> Reading {
        self.state_tx.borrow().reading
    }

    pub fn decibel_level(&self) -> f64 {
        self.reading().decibel_level
    }

    pub fn threshold_exceeded(&self) -> bool {
        self.reading().threshold_exceeded
    }

    pub fn is_running(&self) -> bool {
        self.state_tx.borrow().running
    }

    pub fn phase(&self) -> MonitorPhase {
        self.state_tx.borrow().phase
    }

    pub fn diagnostic(&self) -> String {
        self.state_tx.borrow().diagnostic.clone()
    }

    pub fn permission_granted(&self) -> bool {
        self.permission_granted.load(Ordering::SeqCst)
    }

    pub fn source_kind(&self) -> SourceKind {
        self.source.kind()
    }

    pub fn settings(&self) -> MonitorSettings {
        self.settings
    }
}

impl Drop for SoundLevelMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}

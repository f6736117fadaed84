//! Periodic sampling loop
//!
//! Runs on its own thread for the lifetime of one session. It is the only
//! writer of the reading while the monitor is running.

use crossbeam_channel::Receiver;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

use crate::audio::source::{Sample, SourceHandle};
use crate::error::SourceError;
use crate::monitor::reading::{MonitorSnapshot, Reading};

/// Log every Nth absorbed sample error
const ERROR_LOG_EVERY: u64 = 50;

pub(crate) struct Sampler {
    pub handle: Box<dyn SourceHandle>,
    pub state_tx: Arc<watch::Sender<MonitorSnapshot>>,
    pub threshold_db: f64,
    pub interval: Duration,
    pub stop_rx: Receiver<()>,
    /// Set before the loop ends on its own after a fatal device error
    pub failed: Arc<AtomicBool>,
}

impl Sampler {
    /// Run until stopped or the device fails.
    ///
    /// Returns the still-open handle when stopped so the caller can release
    /// it; returns `None` when the loop already released it after a failure.
    pub fn run(self) -> Option<Box<dyn SourceHandle>> {
        let Sampler {
            mut handle,
            state_tx,
            threshold_db,
            interval,
            stop_rx,
            failed,
        } = self;

        let ticker = crossbeam_channel::tick(interval);
        let mut was_exceeded = false;

        loop {
            crossbeam_channel::select! {
                recv(stop_rx) -> _ => return Some(handle),
                recv(ticker) -> _ => {
                    match tick(handle.as_mut(), &state_tx, threshold_db, &mut was_exceeded) {
                        Ok(()) => {}
                        Err(e) => {
                            fail(handle, &state_tx, &failed, e);
                            return None;
                        }
                    }
                }
            }
        }
    }
}

/// One sampling step. Only fatal errors are returned.
fn tick(
    handle: &mut dyn SourceHandle,
    state_tx: &watch::Sender<MonitorSnapshot>,
    threshold_db: f64,
    was_exceeded: &mut bool,
) -> Result<(), SourceError> {
    let (reading, absorbed) = match handle.sample() {
        Ok(sample) => (Reading::new(sample.to_decibels(), threshold_db), None),
        Err(e) if e.is_fatal() => return Err(e),
        Err(e) => (
            Reading::new(Sample::Amplitude(0).to_decibels(), threshold_db),
            Some(e),
        ),
    };

    if reading.threshold_exceeded != *was_exceeded {
        *was_exceeded = reading.threshold_exceeded;
        if reading.threshold_exceeded {
            tracing::info!("Level above threshold: {:.1} dB", reading.decibel_level);
        } else {
            tracing::info!("Level back below threshold: {:.1} dB", reading.decibel_level);
        }
    }

    state_tx.send_modify(|snapshot| {
        snapshot.reading = reading;
        snapshot.tick += 1;
        match &absorbed {
            Some(e) => {
                snapshot.sample_errors += 1;
                snapshot.diagnostic = e.to_string();
                if snapshot.sample_errors % ERROR_LOG_EVERY == 1 {
                    tracing::warn!("{} ({} so far this session)", e, snapshot.sample_errors);
                }
            }
            None => {
                snapshot.diagnostic = format!("{:.1} dB", reading.decibel_level);
            }
        }
    });

    Ok(())
}

/// Release the handle after a fatal error and fall back to idle
fn fail(
    handle: Box<dyn SourceHandle>,
    state_tx: &watch::Sender<MonitorSnapshot>,
    failed: &AtomicBool,
    error: SourceError,
) {
    tracing::error!("Sampling stopped: {}", error);
    failed.store(true, Ordering::SeqCst);

    if let Err(e) = handle.close() {
        tracing::warn!("Release after device failure: {}", e);
    }

    state_tx.send_modify(|snapshot| snapshot.reset_to_idle(error.to_string()));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::source::SourceKind;
    use std::collections::VecDeque;

    /// Handle replaying a fixed list of results
    struct ScriptedHandle {
        script: VecDeque<Result<Sample, SourceError>>,
        closed: Arc<AtomicBool>,
    }

    impl ScriptedHandle {
        fn new(script: Vec<Result<Sample, SourceError>>) -> Self {
            Self {
                script: script.into(),
                closed: Arc::new(AtomicBool::new(false)),
            }
        }
    }

    impl SourceHandle for ScriptedHandle {
        fn sample(&mut self) -> Result<Sample, SourceError> {
            self.script
                .pop_front()
                .unwrap_or_else(|| Err(SourceError::Disconnected("script exhausted".to_string())))
        }

        fn close(self: Box<Self>) -> Result<(), SourceError> {
            self.closed.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    fn running_state() -> watch::Sender<MonitorSnapshot> {
        let mut snapshot = MonitorSnapshot::idle(SourceKind::Device, 75.0);
        snapshot.set_phase(crate::monitor::MonitorPhase::Running);
        watch::channel(snapshot).0
    }

    fn formula(amplitude: u16) -> f64 {
        20.0 * ((amplitude as f64 / 32767.0) * 10000.0 + 1.0).log10() + 20.0
    }

    #[test]
    fn test_tick_publishes_exact_readings() {
        let mut handle = ScriptedHandle::new(vec![
            Ok(Sample::Amplitude(0)),
            Ok(Sample::Amplitude(16384)),
            Ok(Sample::Amplitude(32767)),
        ]);
        let state_tx = running_state();
        let mut was_exceeded = false;

        let expected = [(30.0, false), (formula(16384), true), (formula(32767), true)];
        for (n, (db, exceeded)) in expected.into_iter().enumerate() {
            tick(&mut handle, &state_tx, 75.0, &mut was_exceeded).unwrap();

            let snapshot = state_tx.borrow().clone();
            assert!((snapshot.reading.decibel_level - db).abs() < 1e-9);
            assert_eq!(snapshot.reading.threshold_exceeded, exceeded);
            assert_eq!(snapshot.tick, n as u64 + 1);
            assert_eq!(snapshot.sample_errors, 0);
            assert!(snapshot.running);
        }

        let top = state_tx.borrow().reading.decibel_level;
        assert!((top - 100.0).abs() < 0.01);
        assert!(was_exceeded);
    }

    #[test]
    fn test_decibel_samples_are_used_as_is() {
        let mut handle = ScriptedHandle::new(vec![Ok(Sample::Decibels(75.0)), Ok(Sample::Decibels(75.1))]);
        let state_tx = running_state();
        let mut was_exceeded = false;

        tick(&mut handle, &state_tx, 75.0, &mut was_exceeded).unwrap();
        assert_eq!(state_tx.borrow().reading, Reading::new(75.0, 75.0));
        assert!(!state_tx.borrow().reading.threshold_exceeded);

        tick(&mut handle, &state_tx, 75.0, &mut was_exceeded).unwrap();
        assert!(state_tx.borrow().reading.threshold_exceeded);
    }

    #[test]
    fn test_transient_error_publishes_floor_and_counts() {
        let mut handle = ScriptedHandle::new(vec![
            Ok(Sample::Amplitude(16384)),
            Err(SourceError::SampleRead("overrun".to_string())),
        ]);
        let state_tx = running_state();
        let mut was_exceeded = false;

        tick(&mut handle, &state_tx, 75.0, &mut was_exceeded).unwrap();
        tick(&mut handle, &state_tx, 75.0, &mut was_exceeded).unwrap();

        let snapshot = state_tx.borrow().clone();
        assert_eq!(snapshot.reading, Reading::new(30.0, 75.0));
        assert_eq!(snapshot.tick, 2);
        assert_eq!(snapshot.sample_errors, 1);
        assert!(snapshot.diagnostic.contains("overrun"));
        assert!(!was_exceeded);
    }

    #[test]
    fn test_fatal_error_is_returned_untouched() {
        let mut handle = ScriptedHandle::new(vec![Err(SourceError::Disconnected("unplugged".to_string()))]);
        let state_tx = running_state();
        let before = state_tx.borrow().clone();
        let mut was_exceeded = false;

        let result = tick(&mut handle, &state_tx, 75.0, &mut was_exceeded);
        assert!(matches!(result, Err(SourceError::Disconnected(_))));
        assert_eq!(*state_tx.borrow(), before);
    }

    #[test]
    fn test_fail_releases_handle_and_goes_idle() {
        let handle = ScriptedHandle::new(Vec::new());
        let closed = handle.closed.clone();
        let state_tx = running_state();
        let failed = AtomicBool::new(false);

        fail(
            Box::new(handle),
            &state_tx,
            &failed,
            SourceError::Disconnected("unplugged".to_string()),
        );

        assert!(closed.load(Ordering::SeqCst));
        assert!(failed.load(Ordering::SeqCst));
        let snapshot = state_tx.borrow().clone();
        assert!(!snapshot.running);
        assert_eq!(snapshot.reading, Reading::silent());
        assert!(snapshot.diagnostic.contains("unplugged"));
    }

    #[test]
    fn test_run_returns_handle_on_stop() {
        let (stop_tx, stop_rx) = crossbeam_channel::bounded(1);
        let sampler = Sampler {
            handle: Box::new(ScriptedHandle::new(
                (0..1000).map(|_| Ok(Sample::Amplitude(0))).collect(),
            )),
            state_tx: Arc::new(running_state()),
            threshold_db: 75.0,
            interval: Duration::from_millis(5),
            stop_rx,
            failed: Arc::new(AtomicBool::new(false)),
        };

        let thread = std::thread::spawn(move || sampler.run());
        std::thread::sleep(Duration::from_millis(30));
        stop_tx.send(()).unwrap();

        assert!(thread.join().unwrap().is_some());
    }
}

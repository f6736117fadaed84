//! Microphone-backed amplitude source
//!
//! Each session owns a dedicated capture thread: `cpal::Stream` is not
//! `Send`, so the stream is built, played and dropped on that thread while
//! the sampler only reads the shared [`PeakHold`]. Each session also owns a
//! scratch WAV file holding just a header; it is finalized and removed when
//! the session ends.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, StreamConfig};
use crossbeam_channel::{bounded, Receiver, Sender};
use hound::{WavSpec, WavWriter};
use serde::Serialize;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use uuid::Uuid;

use crate::audio::peak::PeakHold;
use crate::audio::source::{AmplitudeSource, Sample, SourceHandle, SourceKind};
use crate::constants::{DEVICE_OPEN_TIMEOUT_MS, SCRATCH_FILE_PREFIX};
use crate::error::SourceError;

type ScratchWriter = WavWriter<BufWriter<File>>;

/// Information about an available input device
#[derive(Debug, Clone, Serialize)]
pub struct InputDeviceInfo {
    pub name: String,
    pub is_default: bool,
    pub channels: Option<u16>,
    pub sample_rate: Option<u32>,
}

/// List all input devices of the default host
pub fn list_input_devices() -> Vec<InputDeviceInfo> {
    let host = cpal::default_host();
    let default_name = host.default_input_device().and_then(|d| d.name().ok());

    let devices = match host.input_devices() {
        Ok(devices) => devices,
        Err(e) => {
            tracing::warn!("Failed to enumerate input devices: {}", e);
            return Vec::new();
        }
    };

    devices
        .filter_map(|device| {
            let name = device.name().ok()?;
            let config = device.default_input_config().ok();
            Some(InputDeviceInfo {
                is_default: default_name.as_deref() == Some(name.as_str()),
                channels: config.as_ref().map(|c| c.channels()),
                sample_rate: config.as_ref().map(|c| c.sample_rate().0),
                name,
            })
        })
        .collect()
}

/// Find the named input device, or the host default when no name is given
fn select_device(host: &cpal::Host, name: Option<&str>) -> Result<cpal::Device, SourceError> {
    match name {
        Some(name) => host
            .input_devices()
            .map_err(|e| SourceError::DeviceUnavailable(e.to_string()))?
            .find(|d| d.name().map(|n| n == name).unwrap_or(false))
            .ok_or_else(|| SourceError::DeviceUnavailable(format!("input device '{}' not found", name))),
        None => host
            .default_input_device()
            .ok_or_else(|| SourceError::DeviceUnavailable("no default input device".to_string())),
    }
}

/// Unique scratch file path inside `dir`
pub fn scratch_path_in(dir: &Path) -> PathBuf {
    dir.join(format!("{}{}.wav", SCRATCH_FILE_PREFIX, Uuid::new_v4()))
}

/// Remove a scratch file, treating "already gone" as success
fn remove_scratch(path: &Path) -> std::io::Result<()> {
    match std::fs::remove_file(path) {
        Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

/// Capture parameters negotiated with the device
#[derive(Debug, Clone)]
struct CaptureInfo {
    device_name: String,
    sample_rate: u32,
    channels: u16,
    sample_format: String,
}

type CaptureThread = JoinHandle<Result<(), SourceError>>;

/// Source capturing from a microphone via cpal
#[derive(Debug, Clone)]
pub struct DeviceSource {
    /// Input device name; host default when `None`
    device_name: Option<String>,

    /// Directory receiving the per-session scratch file
    scratch_dir: PathBuf,

    open_timeout: Duration,
}

impl DeviceSource {
    pub fn new(device_name: Option<String>, scratch_dir: impl Into<PathBuf>) -> Self {
        Self {
            device_name,
            scratch_dir: scratch_dir.into(),
            open_timeout: Duration::from_millis(DEVICE_OPEN_TIMEOUT_MS),
        }
    }
}

impl AmplitudeSource for DeviceSource {
    fn open(&self) -> Result<Box<dyn SourceHandle>, SourceError> {
        std::fs::create_dir_all(&self.scratch_dir)?;
        let scratch_path = scratch_path_in(&self.scratch_dir);

        let peak = Arc::new(PeakHold::new());
        let (ready_tx, ready_rx) = bounded::<Result<CaptureInfo, SourceError>>(1);
        let (stop_tx, stop_rx) = bounded::<()>(1);
        let (error_tx, error_rx) = bounded::<cpal::StreamError>(16);

        let device_name = self.device_name.clone();
        let peak_for_thread = peak.clone();
        let path_for_thread = scratch_path.clone();

        let thread = thread::Builder::new()
            .name("mic-capture".to_string())
            .spawn(move || {
                capture_thread(
                    device_name,
                    path_for_thread,
                    peak_for_thread,
                    ready_tx,
                    stop_rx,
                    error_tx,
                )
            })
            .map_err(|e| SourceError::Open(e.to_string()))?;

        let (info, stop_tx, thread) =
            await_ready(&ready_rx, stop_tx, thread, &scratch_path, self.open_timeout)?;

        tracing::info!(
            "Capture opened on '{}': {}Hz, {} channels, {}",
            info.device_name,
            info.sample_rate,
            info.channels,
            info.sample_format
        );

        Ok(Box::new(DeviceHandle {
            peak,
            error_rx,
            stop_tx: Some(stop_tx),
            thread: Some(thread),
        }))
    }

    fn runtime_permission(&self) -> bool {
        let host = cpal::default_host();
        match select_device(&host, self.device_name.as_deref()) {
            Ok(device) => device.default_input_config().is_ok(),
            Err(e) => {
                tracing::debug!("Runtime permission check failed: {}", e);
                false
            }
        }
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Device
    }
}

/// Wait for the capture thread to report its stream. When it fails or does
/// not answer in time, the thread is stopped and joined and the scratch file
/// removed before the error is returned.
fn await_ready(
    ready_rx: &Receiver<Result<CaptureInfo, SourceError>>,
    stop_tx: Sender<()>,
    thread: CaptureThread,
    scratch_path: &Path,
    timeout: Duration,
) -> Result<(CaptureInfo, Sender<()>, CaptureThread), SourceError> {
    let error = match ready_rx.recv_timeout(timeout) {
        Ok(Ok(info)) => return Ok((info, stop_tx, thread)),
        Ok(Err(e)) => e,
        Err(_) => {
            tracing::warn!("Capture did not start within {:?}, waiting for it to exit", timeout);
            SourceError::Open(format!("capture did not start within {:?}", timeout))
        }
    };

    // A late thread sees the closed stop channel and tears its stream down
    drop(stop_tx);
    match thread.join() {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::warn!("Capture cleanup after failed open: {}", e),
        Err(_) => tracing::warn!("Capture thread panicked during open"),
    }
    if let Err(e) = remove_scratch(scratch_path) {
        tracing::warn!("Failed to remove {}: {}", scratch_path.display(), e);
    }

    Err(error)
}

/// Body of the capture thread. Always leaves the scratch file removed.
fn capture_thread(
    device_name: Option<String>,
    scratch_path: PathBuf,
    peak: Arc<PeakHold>,
    ready_tx: Sender<Result<CaptureInfo, SourceError>>,
    stop_rx: Receiver<()>,
    error_tx: Sender<cpal::StreamError>,
) -> Result<(), SourceError> {
    let (stream, writer, info) =
        match start_stream(device_name.as_deref(), &scratch_path, peak, error_tx) {
            Ok(started) => started,
            Err(e) => {
                if let Err(cleanup) = finish_scratch(None, &scratch_path) {
                    tracing::warn!("{}", cleanup);
                }
                let _ = ready_tx.send(Err(e));
                return Ok(());
            }
        };

    if ready_tx.send(Ok(info)).is_err() {
        tracing::warn!("Capture opener went away before the stream was ready");
    }

    // Blocks until the handle sends a stop or is dropped
    let _ = stop_rx.recv();

    drop(stream);
    finish_scratch(Some(writer), &scratch_path)
}

/// Create the session's scratch WAV. Only the header is written; captured
/// audio is never streamed into it.
fn create_scratch(path: &Path, channels: u16, sample_rate: u32) -> Result<ScratchWriter, SourceError> {
    let spec = WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut wav = WavWriter::create(path, spec)?;
    wav.flush()?;
    Ok(wav)
}

fn start_stream(
    device_name: Option<&str>,
    scratch_path: &Path,
    peak: Arc<PeakHold>,
    error_tx: Sender<cpal::StreamError>,
) -> Result<(cpal::Stream, ScratchWriter, CaptureInfo), SourceError> {
    let host = cpal::default_host();
    let device = select_device(&host, device_name)?;
    let supported = device.default_input_config()?;

    let writer = create_scratch(scratch_path, supported.channels(), supported.sample_rate().0)?;

    let config: StreamConfig = supported.config();
    let stream = match supported.sample_format() {
        SampleFormat::F32 => build_stream::<f32>(&device, &config, peak, error_tx)?,
        SampleFormat::I16 => build_stream::<i16>(&device, &config, peak, error_tx)?,
        SampleFormat::U16 => build_stream::<u16>(&device, &config, peak, error_tx)?,
        SampleFormat::I32 => build_stream::<i32>(&device, &config, peak, error_tx)?,
        other => return Err(SourceError::UnsupportedFormat(format!("{:?}", other))),
    };
    stream.play()?;

    let info = CaptureInfo {
        device_name: device.name().unwrap_or_else(|_| "Unknown Device".to_string()),
        sample_rate: config.sample_rate.0,
        channels: config.channels,
        sample_format: format!("{:?}", supported.sample_format()),
    };
    Ok((stream, writer, info))
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &StreamConfig,
    peak: Arc<PeakHold>,
    error_tx: Sender<cpal::StreamError>,
) -> Result<cpal::Stream, SourceError>
where
    T: cpal::SizedSample + Send + 'static,
    f32: cpal::FromSample<T>,
{
    let mut scratch: Vec<f32> = Vec::new();

    let stream = device.build_input_stream(
        config,
        move |data: &[T], _: &cpal::InputCallbackInfo| {
            scratch.clear();
            scratch.extend(data.iter().map(|&s| -> f32 { cpal::Sample::from_sample(s) }));
            peak.update_from_samples(&scratch);
        },
        move |err| {
            let _ = error_tx.try_send(err);
        },
        None,
    )?;

    Ok(stream)
}

/// Finalize the WAV writer (if any) and delete the scratch file
fn finish_scratch(writer: Option<ScratchWriter>, path: &Path) -> Result<(), SourceError> {
    if let Some(wav) = writer {
        if let Err(e) = wav.finalize() {
            tracing::debug!("Scratch WAV finalize failed: {}", e);
        }
    }
    remove_scratch(path).map_err(|e| SourceError::Release(format!("{}: {}", path.display(), e)))
}

/// Open microphone session
pub struct DeviceHandle {
    peak: Arc<PeakHold>,
    error_rx: Receiver<cpal::StreamError>,
    stop_tx: Option<Sender<()>>,
    thread: Option<CaptureThread>,
}

impl DeviceHandle {
    /// Stop the capture thread and wait for it to release everything
    fn shutdown(&mut self) -> Result<(), SourceError> {
        drop(self.stop_tx.take());

        match self.thread.take() {
            Some(handle) => handle
                .join()
                .map_err(|_| SourceError::Release("capture thread panicked".to_string()))?,
            None => Ok(()),
        }
    }
}

impl SourceHandle for DeviceHandle {
    fn sample(&mut self) -> Result<Sample, SourceError> {
        if let Ok(err) = self.error_rx.try_recv() {
            let message = err.to_string();
            return Err(match err {
                cpal::StreamError::DeviceNotAvailable => SourceError::Disconnected(message),
                _ => SourceError::SampleRead(message),
            });
        }

        let capture_alive = self.thread.as_ref().map(|t| !t.is_finished()).unwrap_or(false);
        if !capture_alive {
            return Err(SourceError::Disconnected("capture thread exited".to_string()));
        }

        Ok(Sample::Amplitude(self.peak.take()))
    }

    fn close(mut self: Box<Self>) -> Result<(), SourceError> {
        self.shutdown()
    }
}

impl Drop for DeviceHandle {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            tracing::warn!("Capture cleanup on drop failed: {}", e);
        }
    }
}

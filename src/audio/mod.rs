//! Audio subsystem
//!
//! Amplitude sources (microphone and synthetic), the shared peak holder and
//! the amplitude to display-decibel mapping.

pub mod device;
pub mod peak;
pub mod source;
pub mod synthetic;
pub mod transform;

pub use device::{list_input_devices, DeviceSource, InputDeviceInfo};
pub use peak::PeakHold;
pub use source::{AmplitudeSource, Sample, SourceHandle, SourceKind};
pub use synthetic::SyntheticSource;
pub use transform::amplitude_to_decibels;

//! Sample sources feeding the ECG pipeline
//!
//! Every source yields buffers of single-channel ECG samples in volts.

pub mod capture;
pub mod source;

pub use capture::AudioCapture;
pub use source::{DeviceSource, SampleSource, TextFileSource, WavFileSource};

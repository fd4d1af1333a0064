//! Real-time ECG R-peak detection and heart-rate trend
//!
//! Samples flow through [`EcgProcessor`]: a mains notch, a high-pass and a
//! band-pass stage, then an adaptive threshold [`ecg::BeatDetector`].
//! Accepted beats update a spline trend and are broadcast to listeners.

pub mod acquisition;
pub mod callbacks;
pub mod config;
pub mod constants;
pub mod ecg;
pub mod error;
pub mod output;
pub mod processing;
pub mod signal_processing;
pub mod wav;

#[cfg(feature = "simulation")]
pub mod simulation;

pub use config::EcgConfig;
pub use ecg::BeatEvent;
pub use error::{EcgError, Result};
pub use processing::EcgProcessor;
pub use wav::save_wav;

//! Beat detection and heart-rate trend
//!
//! [`BeatDetector`] turns a notch-filtered sample stream into
//! [`BeatEvent`]s; [`TrendPredictor`] smooths accepted beats into a
//! queryable heart-rate curve.

mod beat;
mod detector;
mod trend;

pub use beat::BeatEvent;
pub use detector::{BeatDetector, DetectorPhase, DetectorStats};
pub use trend::{SharedTrendPredictor, TrendPredictor};

//! Physiological and numeric limits shared by the detection pipeline.
//!
//! These are not configuration: they bound what the pipeline is willing to
//! treat as a heart, independent of how a particular detector is tuned.

/// Lowest sampling rate at which the filter chain and detector are usable.
/// Below this the 20 Hz band edge sits too close to Nyquist.
pub const MIN_SAMPLE_RATE_HZ: f32 = 125.0;

/// Minimum number of buffered trend points needed to fit a spline.
pub const MIN_TREND_POINTS: usize = 3;

/// Smallest knot spacing accepted by the spline solver, in seconds.
pub const SPLINE_EPSILON: f64 = 1e-9;

/// Volts to millivolts; the detector works on millivolt-scaled values.
pub const VOLTS_TO_MILLIVOLTS: f64 = 1000.0;

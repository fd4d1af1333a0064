use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::config::TrendConfig;
use crate::constants::{MIN_TREND_POINTS, SPLINE_EPSILON};
use crate::error::{EcgError, Result};
use crate::signal_processing::CubicSpline;

/// Smoothed heart-rate trend over the most recent beats
///
/// Keeps a bounded, strictly time-ordered window of `(timestamp, bpm)`
/// points and fits a natural cubic spline through them after every update.
/// Queries inside the buffered time range interpolate; queries up to
/// `margin_secs` outside it follow the spline's linear continuation, and
/// anything further out returns the value at the margin edge.
///
/// Not synchronised; see [`SharedTrendPredictor`] for use across threads.
#[derive(Debug, Clone)]
pub struct TrendPredictor {
    points: VecDeque<(f64, f64)>,
    capacity: usize,
    margin_secs: f64,
    spline: CubicSpline,
}

impl TrendPredictor {
    pub fn new(config: &TrendConfig) -> Self {
        let capacity = config.capacity.max(MIN_TREND_POINTS);
        Self {
            points: VecDeque::with_capacity(capacity + 1),
            capacity,
            margin_secs: config.margin_secs.max(0.0),
            spline: CubicSpline::new(),
        }
    }

    /// Append a heart-rate observation, evicting the oldest beyond capacity
    ///
    /// # Errors
    /// Returns `EcgError::OutOfOrderTimestamp` if `timestamp` is not at least
    /// `SPLINE_EPSILON` after the latest buffered one, and
    /// `EcgError::NonFiniteSample` for NaN or infinite input. The buffer is unchanged in both cases.
    pub fn add_sample(&mut self, timestamp: f64, bpm: f64) -> Result<()> {
        if !(timestamp.is_finite() && bpm.is_finite()) {
            return Err(EcgError::NonFiniteSample { timestamp, bpm });
        }
        if let Some(&(latest, _)) = self.points.back()
            && timestamp - latest < SPLINE_EPSILON
        {
            return Err(EcgError::OutOfOrderTimestamp { timestamp, latest });
        }

        self.points.push_back((timestamp, bpm));
        if self.points.len() > self.capacity {
            self.points.pop_front();
        }

        if self.points.len() >= MIN_TREND_POINTS {
            let fitted = self.spline.fit(
                self.points.iter().map(|&(t, _)| t),
                self.points.iter().map(|&(_, b)| b),
            );
            if !fitted {
                log::warn!("Trend spline fit failed over {} points", self.points.len());
            }
        } else {
            self.spline.clear();
        }
        Ok(())
    }

    /// Estimated heart rate at time `t`
    ///
    /// With fewer than three points the latest BPM is returned unchanged;
    /// `None` means nothing has been observed yet.
    pub fn predict(&self, t: f64) -> Option<f64> {
        let latest = self.latest().map(|(_, bpm)| bpm);
        if !self.spline.is_fitted() || t.is_nan() {
            return latest;
        }

        let (first, last) = self.time_range()?;
        let t = t.clamp(first - self.margin_secs, last + self.margin_secs);
        self.spline.evaluate(t).or(latest)
    }

    /// Most recent `(timestamp, bpm)` point
    pub fn latest(&self) -> Option<(f64, f64)> {
        self.points.back().copied()
    }

    /// Oldest and newest buffered timestamps
    pub fn time_range(&self) -> Option<(f64, f64)> {
        Some((self.points.front()?.0, self.points.back()?.0))
    }

    pub fn points(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.points.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn clear(&mut self) {
        self.points.clear();
        self.spline.clear();
    }
}

/// Trend predictor shared between the acquisition thread and readers
///
/// Cloning gives another handle to the same predictor. Every call takes the
/// lock for its duration only.
#[derive(Debug, Clone)]
pub struct SharedTrendPredictor {
    inner: Arc<Mutex<TrendPredictor>>,
}

impl SharedTrendPredictor {
    pub fn new(predictor: TrendPredictor) -> Self {
        Self {
            inner: Arc::new(Mutex::new(predictor)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, TrendPredictor> {
        // A panicking listener must not take the trend down with it
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn add_sample(&self, timestamp: f64, bpm: f64) -> Result<()> {
        self.lock().add_sample(timestamp, bpm)
    }

    pub fn predict(&self, t: f64) -> Option<f64> {
        self.lock().predict(t)
    }

    pub fn latest(&self) -> Option<(f64, f64)> {
        self.lock().latest()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Copy of the predictor at this instant
    pub fn snapshot(&self) -> TrendPredictor {
        self.lock().clone()
    }
}

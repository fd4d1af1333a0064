use crate::callbacks::{CallbackRegistry, Event, EventKind};
use crate::config::{EcgConfig, FilterConfig};
use crate::constants::MIN_SAMPLE_RATE_HZ;
use crate::ecg::{BeatDetector, BeatEvent, SharedTrendPredictor, TrendPredictor};
use crate::error::{EcgError, Result};
use crate::signal_processing::{Filter, NotchFilter};

/// Stages that only exist once the sample rate is known
struct Pipeline {
    notch: NotchFilter,
    detector: BeatDetector,
    sample_rate: f32,
}

impl Pipeline {
    fn design_notch(filters: &FilterConfig, sample_rate: f32) -> Result<NotchFilter> {
        NotchFilter::new(
            filters.mains.as_hz(),
            filters.notch_bandwidth_hz,
            sample_rate,
            filters.order,
        )
    }
}

/// Streaming ECG pipeline
///
/// Owns the mains notch, the beat detector, the heart-rate trend and the
/// listener registry. Until [`init_detector`] succeeds the processor is
/// inert: samples are still passed to raw-sample listeners but nothing is
/// filtered or detected.
///
/// [`init_detector`]: EcgProcessor::init_detector
pub struct EcgProcessor {
    config: EcgConfig,
    pipeline: Option<Pipeline>,
    trend: SharedTrendPredictor,
    callbacks: CallbackRegistry,
}

impl EcgProcessor {
    pub fn new(config: EcgConfig) -> Self {
        let trend = SharedTrendPredictor::new(TrendPredictor::new(&config.trend));
        Self {
            config,
            pipeline: None,
            trend,
            callbacks: CallbackRegistry::new(),
        }
    }

    /// Build a processor and initialise it at `sample_rate` Hz
    pub fn with_sample_rate(config: EcgConfig, sample_rate: f32) -> Result<Self> {
        let mut processor = Self::new(config);
        processor.init_detector(sample_rate)?;
        Ok(processor)
    }

    /// Design the filter chain for `sample_rate` and reset all state
    ///
    /// Init listeners are told the new sample rate, or 0 if initialisation
    /// failed. On failure the processor is left inert.
    ///
    /// # Errors
    /// `EcgError::SampleRateTooLow` below 125 Hz, `EcgError::Config` for an
    /// invalid configuration and `EcgError::FilterDesign` if a stage cannot
    /// be designed at this rate.
    pub fn init_detector(&mut self, sample_rate: f32) -> Result<()> {
        self.pipeline = None;
        self.trend.clear();

        match self.build_pipeline(sample_rate) {
            Ok(pipeline) => {
                log::info!(
                    "ECG detector initialised at {} Hz (mains notch {})",
                    sample_rate,
                    self.config.filters.mains
                );
                self.pipeline = Some(pipeline);
                self.callbacks.dispatch(Event::Init(sample_rate));
                Ok(())
            }
            Err(e) => {
                log::warn!("ECG detector not initialised: {}", e);
                self.callbacks.dispatch(Event::Init(0.0));
                Err(e)
            }
        }
    }

    fn build_pipeline(&self, sample_rate: f32) -> Result<Pipeline> {
        if sample_rate.is_nan() || sample_rate < MIN_SAMPLE_RATE_HZ {
            return Err(EcgError::SampleRateTooLow {
                rate: sample_rate,
                min: MIN_SAMPLE_RATE_HZ,
            });
        }
        self.config.validate()?;

        let filters = &self.config.filters;
        let notch = Pipeline::design_notch(filters, sample_rate)?;
        let detector = BeatDetector::new(&self.config.detector, filters, sample_rate)?;

        Ok(Pipeline {
            notch,
            detector,
            sample_rate,
        })
    }

    /// Push one sample (volts) through the pipeline
    ///
    /// Raw and filtered listeners are called for every sample, heartbeat
    /// listeners for every accepted beat. Accepted beats also update the
    /// trend.
    pub fn process_sample(&mut self, sample: f32) -> Option<BeatEvent> {
        self.callbacks.dispatch(Event::RawSample(sample));

        let pipeline = self.pipeline.as_mut()?;
        let beat = if sample.is_finite() {
            let filtered = pipeline.notch.process(sample as f64) as f32;
            if !filtered.is_finite() {
                // Keep the notch usable after overflow
                if let Ok(notch) = Pipeline::design_notch(&self.config.filters, pipeline.sample_rate) {
                    pipeline.notch = notch;
                }
            }
            self.callbacks.dispatch(Event::FilteredSample(filtered));
            pipeline.detector.detect(filtered)?
        } else {
            pipeline.detector.detect(f32::NAN)?
        };

        let timestamp = beat.time_secs(pipeline.sample_rate);
        if let Err(e) = self.trend.add_sample(timestamp, beat.bpm as f64) {
            log::warn!("Beat not added to trend: {}", e);
        }
        self.callbacks.dispatch(Event::Heartbeat(beat));
        Some(beat)
    }

    /// Process a block of samples, returning the beats in order
    pub fn process_buffer(&mut self, samples: &[f32]) -> Vec<BeatEvent> {
        samples
            .iter()
            .filter_map(|&s| self.process_sample(s))
            .collect()
    }

    pub fn register_heartbeat_listener<F>(&mut self, listener: F)
    where
        F: FnMut(BeatEvent) + Send + 'static,
    {
        self.callbacks.register_heartbeat(listener);
    }

    pub fn register_raw_sample_listener<F>(&mut self, listener: F)
    where
        F: FnMut(f32) + Send + 'static,
    {
        self.callbacks.register_raw_sample(listener);
    }

    pub fn register_filtered_sample_listener<F>(&mut self, listener: F)
    where
        F: FnMut(f32) + Send + 'static,
    {
        self.callbacks.register_filtered_sample(listener);
    }

    pub fn register_init_listener<F>(&mut self, listener: F)
    where
        F: FnMut(f32) + Send + 'static,
    {
        self.callbacks.register_init(listener);
    }

    pub fn clear_all_listeners(&mut self) {
        self.callbacks.clear_all();
    }

    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.callbacks.listener_count(kind)
    }

    /// Trend heart rate at `t` seconds since the last reset
    pub fn predict_trend(&self, t: f64) -> Option<f64> {
        self.trend.predict(t)
    }

    /// Handle to the trend for readers on other threads
    pub fn trend(&self) -> SharedTrendPredictor {
        self.trend.clone()
    }

    /// Restart detection without redesigning the filters
    ///
    /// Clears the trend as well, since its timestamps count from the reset.
    pub fn reset_detector(&mut self) {
        if let Some(pipeline) = self.pipeline.as_mut() {
            pipeline.detector.reset();
        }
        self.trend.clear();
    }

    pub fn detector(&self) -> Option<&BeatDetector> {
        self.pipeline.as_ref().map(|p| &p.detector)
    }

    pub fn sample_rate(&self) -> Option<f32> {
        self.pipeline.as_ref().map(|p| p.sample_rate)
    }

    pub fn is_initialized(&self) -> bool {
        self.pipeline.is_some()
    }

    pub fn config(&self) -> &EcgConfig {
        &self.config
    }
}

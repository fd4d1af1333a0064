//! Configuration for the ecgpulse pipeline.
//!
//! Every section has sensible defaults for a single-lead chest ECG sampled
//! at 250 Hz. A TOML file only needs to name the values it changes:
//!
//! ```toml
//! [filters]
//! mains = 60
//!
//! [detector]
//! threshold_factor = 0.5
//! ```

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::Deserialize;

use crate::error::{EcgError, Result};

/// Mains (power line) frequency removed by the notch stage
///
/// # Parsing formats
/// - `50` or `60` - frequency in Hz (no suffix)
/// - `50hz`, `60Hz` - frequency in Hz (explicit)
///
/// # Example
/// ```
/// use ecgpulse::config::MainsFrequency;
///
/// let mains: MainsFrequency = "60Hz".parse().unwrap();
/// assert_eq!(mains.as_hz(), 60.0);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(try_from = "u32")]
pub enum MainsFrequency {
    /// Europe, Asia, Africa, Australia
    #[default]
    Hz50,
    /// Americas, parts of Japan
    Hz60,
}

impl MainsFrequency {
    pub fn as_hz(&self) -> f32 {
        match self {
            Self::Hz50 => 50.0,
            Self::Hz60 => 60.0,
        }
    }
}

impl TryFrom<u32> for MainsFrequency {
    type Error = String;

    fn try_from(hz: u32) -> std::result::Result<Self, Self::Error> {
        match hz {
            50 => Ok(Self::Hz50),
            60 => Ok(Self::Hz60),
            other => Err(format!("mains frequency must be 50 or 60 Hz, got {}", other)),
        }
    }
}

impl fmt::Display for MainsFrequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}hz", self.as_hz() as u32)
    }
}

impl FromStr for MainsFrequency {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let s = s.trim();
        let num = s
            .strip_suffix("hz")
            .or_else(|| s.strip_suffix("Hz"))
            .or_else(|| s.strip_suffix("HZ"))
            .unwrap_or(s);

        let hz: u32 = num
            .trim()
            .parse()
            .map_err(|_| format!("invalid mains frequency: {}", s))?;
        Self::try_from(hz)
    }
}

/// Complete pipeline configuration
///
/// Use `EcgConfig::default()` for the standard 250 Hz chest-lead setup.
///
/// # Example
/// ```
/// use ecgpulse::config::EcgConfig;
///
/// let mut config = EcgConfig::default();
/// config.detector.threshold_factor = 0.5;
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EcgConfig {
    /// Input device / file configuration
    pub acquisition: AcquisitionConfig,
    /// Notch, high-pass and band-pass stages
    pub filters: FilterConfig,
    /// Adaptive threshold R-peak detector
    pub detector: DetectorConfig,
    /// BPM trend spline
    pub trend: TrendConfig,
}

/// Acquisition configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AcquisitionConfig {
    /// Sampling rate in Hz
    pub sample_rate: u32,
    /// Number of interleaved channels delivered by the device
    pub channels: u16,
    /// Which channel (0-based) carries the ECG lead
    pub ecg_channel: usize,
    /// Device buffer size in frames
    pub buffer_size: usize,
    /// Volts represented by a full-scale (±1.0) device sample
    pub volts_per_full_scale: f32,
}

/// Filter stage configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Mains frequency to notch out
    pub mains: MainsFrequency,
    /// Width of the notch stop band in Hz
    pub notch_bandwidth_hz: f32,
    /// High-pass cutoff removing baseline wander, in Hz
    pub highpass_cutoff_hz: f32,
    /// Lower edge of the QRS band, in Hz
    pub bandpass_low_hz: f32,
    /// Upper edge of the QRS band, in Hz
    pub bandpass_high_hz: f32,
    /// Butterworth order of every stage
    pub order: usize,
}

/// Beat detector configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Scale applied to the input voltage before filtering (V → mV)
    pub input_gain: f64,
    /// Detection threshold as a fraction of the envelope
    pub threshold_factor: f64,
    /// How fast the envelope forgets old peaks, per second.
    /// 0.1 recovers slowly after an artefact, 1.0 recovers fast but
    /// risks false detections.
    pub decay_constant: f64,
    /// Filtered amplitude (mV) above which a sample is an artefact
    pub artefact_threshold: f64,
    /// Initial window ignored while the filters settle, in seconds
    pub warmup_secs: f32,
    /// Window after warm-up in which the envelope is learned but no beat
    /// is detected, in seconds
    pub learning_secs: f32,
    /// Detection pause after an artefact, in seconds
    pub artefact_hold_secs: f32,
    /// Minimum spacing between two candidates, in seconds
    pub refractory_secs: f32,
    /// Window after a threshold crossing searched for the actual peak, in
    /// seconds. The default 0 reports the beat at the crossing itself; a
    /// window delays every beat by its length.
    pub peak_search_secs: f32,
    /// Lowest plausible heart rate
    pub min_bpm: f32,
    /// Highest plausible heart rate
    pub max_bpm: f32,
    /// Largest accepted beat-to-beat BPM ratio
    pub max_bpm_ratio: f32,
    /// Intervals distrusted after an artefact
    pub artefact_ignore_beats: u32,
    /// Intervals distrusted after an implausible candidate
    pub implausible_ignore_beats: u32,
}

/// Trend predictor configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TrendConfig {
    /// Number of (timestamp, BPM) points kept
    pub capacity: usize,
    /// How far beyond the buffered range the spline is followed, in seconds
    pub margin_secs: f64,
}

impl EcgConfig {
    /// Parse a (possibly partial) TOML configuration
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).map_err(|e| EcgError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML configuration file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            EcgError::Config(format!("{}: {}", path.as_ref().display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    /// Check parameters that no filter design would catch
    pub fn validate(&self) -> Result<()> {
        let d = &self.detector;
        if !(d.threshold_factor > 0.0 && d.threshold_factor < 1.0) {
            return Err(EcgError::Config(format!(
                "threshold_factor must be in (0, 1), got {}",
                d.threshold_factor
            )));
        }
        if d.decay_constant < 0.0 {
            return Err(EcgError::Config("decay_constant must not be negative".into()));
        }
        if d.artefact_threshold <= 0.0 || d.input_gain <= 0.0 {
            return Err(EcgError::Config(
                "artefact_threshold and input_gain must be positive".into(),
            ));
        }
        if d.min_bpm <= 0.0 || d.min_bpm >= d.max_bpm {
            return Err(EcgError::Config(format!(
                "invalid BPM range [{}, {}]",
                d.min_bpm, d.max_bpm
            )));
        }
        if d.max_bpm_ratio <= 1.0 {
            return Err(EcgError::Config("max_bpm_ratio must exceed 1".into()));
        }
        if d.refractory_secs <= 0.0 || d.peak_search_secs < 0.0 {
            return Err(EcgError::Config(
                "refractory_secs must be positive and peak_search_secs non-negative".into(),
            ));
        }
        if d.peak_search_secs >= d.refractory_secs {
            return Err(EcgError::Config(format!(
                "peak_search_secs ({}) must be shorter than refractory_secs ({})",
                d.peak_search_secs, d.refractory_secs
            )));
        }
        if self.trend.capacity < crate::constants::MIN_TREND_POINTS {
            return Err(EcgError::Config(format!(
                "trend capacity must be at least {}",
                crate::constants::MIN_TREND_POINTS
            )));
        }
        if self.trend.margin_secs < 0.0 {
            return Err(EcgError::Config("trend margin must not be negative".into()));
        }
        if self.acquisition.ecg_channel >= self.acquisition.channels as usize {
            return Err(EcgError::Config(format!(
                "ecg_channel {} out of range for {} channels",
                self.acquisition.ecg_channel, self.acquisition.channels
            )));
        }
        Ok(())
    }
}

impl AcquisitionConfig {
    /// Pick the ECG channel out of interleaved frames, scaled to volts
    pub fn extract_ecg(&self, interleaved: &[f32]) -> Vec<f32> {
        let channels = (self.channels as usize).max(1);
        interleaved
            .chunks_exact(channels)
            .filter_map(|frame| frame.get(self.ecg_channel))
            .map(|&s| s * self.volts_per_full_scale)
            .collect()
    }
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            sample_rate: 250,
            channels: 1,
            ecg_channel: 0,
            buffer_size: 64,
            volts_per_full_scale: 1.0,
        }
    }
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            mains: MainsFrequency::Hz50,
            notch_bandwidth_hz: 2.0,
            highpass_cutoff_hz: 5.0,
            bandpass_low_hz: 5.0,
            bandpass_high_hz: 20.0,
            order: 2,
        }
    }
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            input_gain: crate::constants::VOLTS_TO_MILLIVOLTS,
            threshold_factor: 0.6,
            decay_constant: 0.25,
            artefact_threshold: 10.0,
            warmup_secs: 1.0,
            learning_secs: 1.0,
            artefact_hold_secs: 1.0,
            refractory_secs: 0.2,
            peak_search_secs: 0.0,
            min_bpm: 30.0,
            max_bpm: 250.0,
            max_bpm_ratio: 1.5,
            artefact_ignore_beats: 2,
            implausible_ignore_beats: 3,
        }
    }
}

impl Default for TrendConfig {
    fn default() -> Self {
        Self {
            capacity: 60,
            margin_secs: 1.5,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mains_from_plain_number() {
        let mains: MainsFrequency = "50".parse().unwrap();
        assert_eq!(mains, MainsFrequency::Hz50);
    }

    #[test]
    fn test_mains_with_suffix() {
        assert_eq!("60hz".parse::<MainsFrequency>().unwrap(), MainsFrequency::Hz60);
        assert_eq!("60Hz".parse::<MainsFrequency>().unwrap(), MainsFrequency::Hz60);
        assert_eq!(" 50HZ ".parse::<MainsFrequency>().unwrap(), MainsFrequency::Hz50);
    }

    #[test]
    fn test_mains_invalid() {
        assert!("abc".parse::<MainsFrequency>().is_err());
        assert!("55hz".parse::<MainsFrequency>().is_err());
        assert!("-50".parse::<MainsFrequency>().is_err());
    }

    #[test]
    fn test_mains_display_round_trips() {
        let s = MainsFrequency::Hz60.to_string();
        assert_eq!(s.parse::<MainsFrequency>().unwrap(), MainsFrequency::Hz60);
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(EcgConfig::default().validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = EcgConfig::from_toml_str(
            r#"
            [filters]
            mains = 60

            [detector]
            threshold_factor = 0.5
            "#,
        )
        .unwrap();

        assert_eq!(config.filters.mains, MainsFrequency::Hz60);
        assert!((config.detector.threshold_factor - 0.5).abs() < 1e-12);
        assert_eq!(config.acquisition.sample_rate, 250);
        assert_eq!(config.trend.capacity, 60);
    }

    #[test]
    fn test_toml_rejects_bad_mains() {
        assert!(EcgConfig::from_toml_str("[filters]\nmains = 55\n").is_err());
    }

    #[test]
    fn test_beats_reported_at_crossing_by_default() {
        let config = EcgConfig::default();
        assert_eq!(config.detector.peak_search_secs, 0.0);

        let opted_in = EcgConfig::from_toml_str("[detector]\npeak_search_secs = 0.15\n").unwrap();
        assert!((opted_in.detector.peak_search_secs - 0.15).abs() < 1e-6);
    }

    #[test]
    fn test_validate_rejects_search_longer_than_refractory() {
        let mut config = EcgConfig::default();
        config.detector.peak_search_secs = 0.3;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_inverted_bpm_range() {
        let mut config = EcgConfig::default();
        config.detector.min_bpm = 200.0;
        config.detector.max_bpm = 100.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_extract_ecg_channel() {
        let config = AcquisitionConfig {
            channels: 2,
            ecg_channel: 1,
            volts_per_full_scale: 0.01,
            ..Default::default()
        };
        let ecg = config.extract_ecg(&[0.5, 0.1, 0.5, -0.2, 0.5]);
        assert_eq!(ecg.len(), 2);
        assert!((ecg[0] - 0.001).abs() < 1e-7);
        assert!((ecg[1] + 0.002).abs() < 1e-7);
    }
}

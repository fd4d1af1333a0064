use crate::error::{EcgError, Result};
use crate::signal_processing::filter::Filter;
use iir_filters::filter::{DirectForm2Transposed, Filter as IirFilter};
use iir_filters::filter_design::{FilterType, butter};
use iir_filters::sos::zpk2sos;

/// Check that every band edge lies strictly between 0 and Nyquist
fn check_edges(edges: &[f32], sample_rate: f32) -> Result<()> {
    if !(sample_rate.is_finite() && sample_rate > 0.0) {
        return Err(EcgError::FilterDesign(format!(
            "sample rate must be positive, got {}",
            sample_rate
        )));
    }
    let nyquist = sample_rate / 2.0;
    for &edge in edges {
        if !(edge.is_finite() && edge > 0.0 && edge < nyquist) {
            return Err(EcgError::FilterDesign(format!(
                "cutoff {} Hz outside (0, {}) Hz for sample rate {} Hz",
                edge, nyquist, sample_rate
            )));
        }
    }
    if edges.windows(2).any(|w| w[0] >= w[1]) {
        return Err(EcgError::FilterDesign(format!(
            "band edges must increase, got {:?}",
            edges
        )));
    }
    Ok(())
}

/// Design a Butterworth filter as second-order sections
fn butterworth(order: usize, filter_type: FilterType, sample_rate: f32) -> Result<DirectForm2Transposed> {
    if order == 0 {
        return Err(EcgError::FilterDesign("filter order must be at least 1".into()));
    }

    let zpk = butter(order as u32, filter_type, sample_rate as f64)
        .map_err(|e| EcgError::FilterDesign(format!("{:?}", e)))?;

    // Convert to second-order sections
    let sos = zpk2sos(&zpk, None).map_err(|e| EcgError::FilterDesign(format!("{:?}", e)))?;

    Ok(DirectForm2Transposed::new(&sos))
}

/// Butterworth band-stop filter removing mains interference
///
/// The stop band is centred on the mains frequency with the given width,
/// e.g. 49–51 Hz for a 50 Hz supply with a 2 Hz bandwidth.
pub struct NotchFilter {
    filter: DirectForm2Transposed,
}

impl NotchFilter {
    pub fn new(center_hz: f32, bandwidth_hz: f32, sample_rate: f32, order: usize) -> Result<Self> {
        let low = center_hz - bandwidth_hz / 2.0;
        let high = center_hz + bandwidth_hz / 2.0;
        check_edges(&[low, high], sample_rate)?;

        Ok(Self {
            filter: butterworth(
                order,
                FilterType::BandStop(low as f64, high as f64),
                sample_rate,
            )?,
        })
    }
}

impl Filter for NotchFilter {
    fn process(&mut self, sample: f64) -> f64 {
        self.filter.filter(sample)
    }
}

/// Butterworth highpass filter removing baseline wander
pub struct HighpassFilter {
    filter: DirectForm2Transposed,
}

impl HighpassFilter {
    pub fn new(cutoff_hz: f32, sample_rate: f32, order: usize) -> Result<Self> {
        check_edges(&[cutoff_hz], sample_rate)?;

        Ok(Self {
            filter: butterworth(order, FilterType::HighPass(cutoff_hz as f64), sample_rate)?,
        })
    }
}

impl Filter for HighpassFilter {
    fn process(&mut self, sample: f64) -> f64 {
        self.filter.filter(sample)
    }
}

/// Butterworth bandpass filter isolating QRS energy
pub struct BandpassFilter {
    filter: DirectForm2Transposed,
}

impl BandpassFilter {
    pub fn new(low_hz: f32, high_hz: f32, sample_rate: f32, order: usize) -> Result<Self> {
        check_edges(&[low_hz, high_hz], sample_rate)?;

        Ok(Self {
            filter: butterworth(
                order,
                FilterType::BandPass(low_hz as f64, high_hz as f64),
                sample_rate,
            )?,
        })
    }
}

impl Filter for BandpassFilter {
    fn process(&mut self, sample: f64) -> f64 {
        self.filter.filter(sample)
    }
}

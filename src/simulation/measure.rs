use crate::config::EcgConfig;
use crate::ecg::BeatEvent;
use crate::error::Result;
use crate::processing::EcgProcessor;

/// Run `signal` through a freshly initialised processor
pub fn detect_beats(signal: &[f32], config: &EcgConfig, sample_rate: f32) -> Result<Vec<BeatEvent>> {
    let mut processor = EcgProcessor::with_sample_rate(config.clone(), sample_rate)?;
    Ok(processor.process_buffer(signal))
}

/// Emitted beat paired with the true R-peak it belongs to
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchedBeat {
    pub beat: BeatEvent,
    /// Index into the true R-peak list
    pub peak: usize,
    /// Heart rate from the true RR interval ending at that peak
    pub expected_bpm: f32,
}

impl MatchedBeat {
    pub fn bpm_error(&self) -> f32 {
        self.beat.bpm - self.expected_bpm
    }
}

#[derive(Debug, Clone, Default)]
pub struct BeatComparison {
    pub matched: Vec<MatchedBeat>,
    /// Beats with no true R-peak within the tolerance
    pub spurious: Vec<BeatEvent>,
}

impl BeatComparison {
    pub fn max_abs_error(&self) -> Option<f32> {
        self.matched
            .iter()
            .map(|m| m.bpm_error().abs())
            .reduce(f32::max)
    }

    pub fn mean_bpm(&self) -> Option<f32> {
        if self.matched.is_empty() {
            return None;
        }
        Some(self.matched.iter().map(|m| m.beat.bpm).sum::<f32>() / self.matched.len() as f32)
    }
}

/// Pair each beat with the nearest true R-peak no more than
/// `tolerance_secs` away
///
/// Beats matching the first R-peak have no true interval and count as
/// spurious.
pub fn compare_beats(
    beats: &[BeatEvent],
    r_peaks: &[usize],
    sample_rate: f32,
    tolerance_secs: f32,
) -> BeatComparison {
    let tolerance = (tolerance_secs * sample_rate).round() as i64;
    let mut comparison = BeatComparison::default();

    for beat in beats {
        let nearest = r_peaks
            .iter()
            .enumerate()
            .min_by_key(|&(_, &p)| (p as i64 - beat.sample_index as i64).abs());

        match nearest {
            Some((k, &p)) if k > 0 && (p as i64 - beat.sample_index as i64).abs() <= tolerance => {
                let rr = (p - r_peaks[k - 1]) as f32;
                comparison.matched.push(MatchedBeat {
                    beat: *beat,
                    peak: k,
                    expected_bpm: 60.0 * sample_rate / rr,
                });
            }
            _ => comparison.spurious.push(*beat),
        }
    }

    comparison
}

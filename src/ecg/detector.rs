use crate::config::{DetectorConfig, FilterConfig};
use crate::ecg::BeatEvent;
use crate::error::Result;
use crate::signal_processing::{BandpassFilter, Filter, HighpassFilter};

/// Where the detector is in its per-sample state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectorPhase {
    /// Ignoring input after a reset while the filters settle
    WarmingUp,
    /// Ignoring input after an artefact
    ArtefactHold,
    /// Learning the envelope, or just after a candidate; no threshold test
    Refractory,
    /// Ready to detect
    Armed,
}

/// Running counters since the last reset
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DetectorStats {
    pub accepted: u64,
    pub rejected: u64,
    pub artefacts: u64,
}

/// Threshold crossing whose peak is still being searched for
#[derive(Debug, Clone, Copy)]
struct PendingPeak {
    index: u64,
    energy: f64,
    threshold: f64,
    remaining: u32,
}

#[derive(Debug, Clone, Copy)]
enum Rejection {
    OutOfRange,
    Uncorroborated,
    Jump { previous: f32 },
}

impl std::fmt::Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OutOfRange => write!(f, "outside plausible range"),
            Self::Uncorroborated => write!(f, "interval not yet trusted"),
            Self::Jump { previous } => write!(f, "jump from {:.1} bpm", previous),
        }
    }
}

/// Adaptive threshold R-peak detector
///
/// Each (notch filtered) sample is high-passed, band-passed and squared.
/// The squared value feeds an envelope that jumps up to new peaks and leaks
/// away continuously; a sample whose energy exceeds a fixed fraction of the
/// envelope is a candidate beat, checked for physiological plausibility
/// and emitted on the sample that crossed. An optional search window
/// refines the candidate to the largest energy that follows the crossing,
/// at the cost of reporting the beat that much later.
///
/// Samples far above any cardiac amplitude are artefacts: detection pauses
/// for a hold window and the next RR intervals are distrusted, without
/// touching the envelope or the previous BPM.
pub struct BeatDetector {
    highpass: HighpassFilter,
    bandpass: BandpassFilter,
    filter_config: FilterConfig,
    config: DetectorConfig,
    sample_rate: f32,

    // Durations in samples
    warmup_samples: u32,
    learning_samples: u32,
    artefact_hold_samples: u32,
    refractory_samples: u32,
    search_samples: u32,

    sample_index: u64,
    envelope: f64,
    last_candidate: Option<u64>,
    previous_bpm: Option<f32>,
    refractory: u32,
    ignore_samples: u32,
    ignore_rr: u32,
    in_artefact_hold: bool,
    pending: Option<PendingPeak>,
    stats: DetectorStats,
}

fn secs_to_samples(secs: f32, sample_rate: f32) -> u32 {
    (secs * sample_rate).round().max(0.0) as u32
}

impl BeatDetector {
    /// Create a detector for signals sampled at `sample_rate` Hz
    ///
    /// # Errors
    /// Returns `EcgError::FilterDesign` if the high-pass or band-pass stage
    /// cannot be designed at this sample rate.
    pub fn new(config: &DetectorConfig, filters: &FilterConfig, sample_rate: f32) -> Result<Self> {
        let (highpass, bandpass) = Self::design_filters(filters, sample_rate)?;

        let mut detector = Self {
            highpass,
            bandpass,
            filter_config: filters.clone(),
            config: config.clone(),
            sample_rate,
            warmup_samples: secs_to_samples(config.warmup_secs, sample_rate),
            learning_samples: secs_to_samples(config.learning_secs, sample_rate),
            artefact_hold_samples: secs_to_samples(config.artefact_hold_secs, sample_rate),
            refractory_samples: secs_to_samples(config.refractory_secs, sample_rate).max(1),
            search_samples: secs_to_samples(config.peak_search_secs, sample_rate),
            sample_index: 0,
            envelope: 0.0,
            last_candidate: None,
            previous_bpm: None,
            refractory: 0,
            ignore_samples: 0,
            ignore_rr: 0,
            in_artefact_hold: false,
            pending: None,
            stats: DetectorStats::default(),
        };
        // The search window has to close before the next candidate can start
        detector.search_samples = detector
            .search_samples
            .min(detector.refractory_samples.saturating_sub(1));
        detector.reset();
        Ok(detector)
    }

    fn design_filters(filters: &FilterConfig, sample_rate: f32) -> Result<(HighpassFilter, BandpassFilter)> {
        Ok((
            HighpassFilter::new(filters.highpass_cutoff_hz, sample_rate, filters.order)?,
            BandpassFilter::new(
                filters.bandpass_low_hz,
                filters.bandpass_high_hz,
                sample_rate,
                filters.order,
            )?,
        ))
    }

    /// Return to startup state; the filter coefficients are kept
    pub fn reset(&mut self) {
        self.sample_index = 0;
        self.envelope = 0.0;
        self.last_candidate = None;
        self.previous_bpm = None;
        self.refractory = self.learning_samples;
        self.ignore_samples = self.warmup_samples;
        self.ignore_rr = 0;
        self.in_artefact_hold = false;
        self.pending = None;
        self.stats = DetectorStats::default();
    }

    /// Detect R-peaks
    ///
    /// Takes one notch-filtered ECG sample in volts and returns a beat when
    /// a candidate has been confirmed. With a peak search window the
    /// returned beat's `sample_index` lies before the index of the sample
    /// that produced it; without one the two are equal.
    pub fn detect(&mut self, sample: f32) -> Option<BeatEvent> {
        let index = self.sample_index;
        self.sample_index += 1;

        if !sample.is_finite() {
            self.enter_artefact_hold(index, sample as f64);
            return None;
        }

        let h = self
            .bandpass
            .process(self.highpass.process(self.config.input_gain * sample as f64));

        if self.ignore_samples > 0 {
            self.ignore_samples -= 1;
            if !h.is_finite() {
                self.rebuild_filters();
            }
            return None;
        }
        self.in_artefact_hold = false;

        if !h.is_finite() || h.abs() > self.config.artefact_threshold {
            if !h.is_finite() {
                self.rebuild_filters();
            }
            self.enter_artefact_hold(index, h);
            return None;
        }

        let energy = h * h;
        if energy > self.envelope {
            self.envelope = energy;
        }
        self.envelope -= self.config.decay_constant * self.envelope / self.sample_rate as f64;

        if self.refractory > 0 {
            self.refractory -= 1;
            return self.track_pending(index, energy);
        }

        let threshold = self.config.threshold_factor * self.envelope;
        if energy > threshold {
            self.refractory = self.refractory_samples;
            let candidate = PendingPeak {
                index,
                energy,
                threshold,
                remaining: self.search_samples,
            };
            if candidate.remaining == 0 {
                return self.evaluate(candidate);
            }
            self.pending = Some(candidate);
        }
        None
    }

    fn track_pending(&mut self, index: u64, energy: f64) -> Option<BeatEvent> {
        let pending = self.pending.as_mut()?;
        if energy > pending.energy {
            pending.energy = energy;
            pending.index = index;
        }
        pending.remaining = pending.remaining.saturating_sub(1);
        if pending.remaining > 0 {
            return None;
        }
        let candidate = self.pending.take()?;
        self.evaluate(candidate)
    }

    fn evaluate(&mut self, candidate: PendingPeak) -> Option<BeatEvent> {
        let Some(reference) = self.last_candidate.replace(candidate.index) else {
            log::debug!("First R-peak candidate at sample {}", candidate.index);
            return None;
        };

        let interval = candidate.index.saturating_sub(reference).max(1);
        let bpm = 60.0 * self.sample_rate / interval as f32;

        match self.check_plausibility(bpm) {
            Ok(()) => {
                self.previous_bpm = Some(bpm);
                self.stats.accepted += 1;
                let beat = BeatEvent {
                    sample_index: candidate.index,
                    bpm,
                    amplitude: self.envelope,
                    confidence: if candidate.threshold > 0.0 {
                        candidate.energy / candidate.threshold
                    } else {
                        1.0
                    },
                };
                log::trace!(
                    "R-peak at sample {}: {:.1} bpm, confidence {:.2}",
                    beat.sample_index,
                    beat.bpm,
                    beat.confidence
                );
                Some(beat)
            }
            Err(reason) => {
                self.stats.rejected += 1;
                log::debug!(
                    "Rejected candidate at sample {} ({:.1} bpm): {}",
                    candidate.index,
                    bpm,
                    reason
                );
                None
            }
        }
    }

    fn check_plausibility(&mut self, bpm: f32) -> std::result::Result<(), Rejection> {
        if bpm < self.config.min_bpm || bpm > self.config.max_bpm {
            self.ignore_rr = self.config.implausible_ignore_beats;
            return Err(Rejection::OutOfRange);
        }

        if self.ignore_rr > 0 {
            // Distrusted interval; it still seeds the continuity check so a
            // genuine change of rate is accepted once it repeats
            self.ignore_rr -= 1;
            self.previous_bpm = Some(bpm);
            return Err(Rejection::Uncorroborated);
        }

        if let Some(previous) = self.previous_bpm {
            let ratio = self.config.max_bpm_ratio;
            if bpm * ratio < previous || bpm > previous * ratio {
                self.ignore_rr = self.config.implausible_ignore_beats;
                return Err(Rejection::Jump { previous });
            }
        }

        Ok(())
    }

    fn enter_artefact_hold(&mut self, index: u64, value: f64) {
        log::debug!(
            "Artefact at sample {} (filtered value {:.2}), holding detection for {} samples",
            index,
            value,
            self.artefact_hold_samples
        );
        self.ignore_samples = self.artefact_hold_samples;
        self.ignore_rr = self.config.artefact_ignore_beats;
        self.in_artefact_hold = true;
        self.pending = None;
        self.stats.artefacts += 1;
    }

    /// Restore filters whose recursive state has become non-finite
    fn rebuild_filters(&mut self) {
        match Self::design_filters(&self.filter_config, self.sample_rate) {
            Ok((highpass, bandpass)) => {
                self.highpass = highpass;
                self.bandpass = bandpass;
            }
            Err(e) => log::warn!("Could not rebuild detector filters: {}", e),
        }
    }

    pub fn phase(&self) -> DetectorPhase {
        if self.ignore_samples > 0 {
            if self.in_artefact_hold {
                DetectorPhase::ArtefactHold
            } else {
                DetectorPhase::WarmingUp
            }
        } else if self.refractory > 0 {
            DetectorPhase::Refractory
        } else {
            DetectorPhase::Armed
        }
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    /// Samples processed since the last reset
    pub fn sample_index(&self) -> u64 {
        self.sample_index
    }

    /// Heart rate the next candidate is checked against
    pub fn previous_bpm(&self) -> Option<f32> {
        self.previous_bpm
    }

    /// Current envelope (squared, millivolt-scaled)
    pub fn envelope(&self) -> f64 {
        self.envelope
    }

    pub fn stats(&self) -> DetectorStats {
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FS: f32 = 250.0;

    fn detector() -> BeatDetector {
        BeatDetector::new(&DetectorConfig::default(), &FilterConfig::default(), FS).unwrap()
    }

    /// Gaussian pulse of `peak_mv` millivolts centred on each index, in volts
    fn pulses(peaks: &[usize], len: usize, peak_mv: f32) -> Vec<f32> {
        let sigma = 2.5_f32;
        let mut signal = vec![0.0; len];
        for &p in peaks {
            let lo = p.saturating_sub(10);
            let hi = (p + 10).min(len - 1);
            for (i, s) in signal.iter_mut().enumerate().take(hi + 1).skip(lo) {
                let dx = i as f32 - p as f32;
                *s += peak_mv * 1e-3 * (-dx * dx / (2.0 * sigma * sigma)).exp();
            }
        }
        signal
    }

    fn run(detector: &mut BeatDetector, signal: &[f32]) -> Vec<BeatEvent> {
        signal.iter().filter_map(|&v| detector.detect(v)).collect()
    }

    #[test]
    fn test_startup_phases() {
        let mut det = detector();
        assert_eq!(det.phase(), DetectorPhase::WarmingUp);

        for _ in 0..250 {
            det.detect(0.0);
        }
        assert_eq!(det.phase(), DetectorPhase::Refractory);

        for _ in 0..250 {
            det.detect(0.0);
        }
        assert_eq!(det.phase(), DetectorPhase::Armed);
        assert_eq!(det.sample_index(), 500);
    }

    #[test]
    fn test_silence_emits_nothing() {
        let mut det = detector();
        let beats = run(&mut det, &vec![0.0; 2500]);
        assert!(beats.is_empty());
        assert_eq!(det.stats(), DetectorStats::default());
    }

    /// Ten pulses 200 samples apart (75 bpm); the first falls in the
    /// learning window and primes the envelope
    fn primed_pulses() -> (Vec<usize>, Vec<f32>) {
        let peaks: Vec<usize> = (0..11).map(|k| 400 + 200 * k).collect();
        let signal = pulses(&peaks, 2700, 1.0);
        (peaks, signal)
    }

    #[test]
    fn test_regular_pulses_give_expected_rate() {
        let mut det = detector();
        let (_, signal) = primed_pulses();
        let beats = run(&mut det, &signal);

        // The first armed pulse only sets the reference
        assert_eq!(beats.len(), 9);
        for beat in &beats {
            assert!((beat.bpm - 75.0).abs() < 0.5, "bpm {}", beat.bpm);
            assert!(beat.confidence >= 1.0);
            assert!(beat.amplitude > 0.0);
        }
    }

    #[test]
    fn test_peak_index_is_consistent_across_beats() {
        let mut det = detector();
        let peaks: Vec<usize> = (0..7).map(|k| 420 + 180 * k).collect();
        let beats = run(&mut det, &pulses(&peaks, 1800, 1.0));

        let offsets: Vec<i64> = beats
            .iter()
            .zip(&peaks[2..])
            .map(|(b, &p)| b.sample_index as i64 - p as i64)
            .collect();
        assert!(!offsets.is_empty());
        assert!(offsets.windows(2).all(|w| w[0] == w[1]), "offsets {:?}", offsets);
    }

    #[test]
    fn test_beat_emitted_on_crossing_sample() {
        let mut det = detector();
        let (_, signal) = primed_pulses();

        let mut emitted = 0;
        for (i, &v) in signal.iter().enumerate() {
            if let Some(beat) = det.detect(v) {
                assert_eq!(beat.sample_index, i as u64);
                emitted += 1;
            }
        }
        assert_eq!(emitted, 9);
    }

    #[test]
    fn test_search_window_refines_and_delays() {
        let config = DetectorConfig {
            peak_search_secs: 0.15,
            ..Default::default()
        };
        let mut det = BeatDetector::new(&config, &FilterConfig::default(), FS).unwrap();
        let (peaks, signal) = primed_pulses();

        let mut delays = Vec::new();
        let mut offsets = Vec::new();
        for (i, &v) in signal.iter().enumerate() {
            if let Some(beat) = det.detect(v) {
                assert!((beat.bpm - 75.0).abs() < 0.5, "bpm {}", beat.bpm);
                delays.push(i as u64 - beat.sample_index);
                let nearest = peaks
                    .iter()
                    .map(|&p| beat.sample_index as i64 - p as i64)
                    .min_by_key(|d| d.abs())
                    .unwrap();
                offsets.push(nearest);
            }
        }

        assert_eq!(delays.len(), 9);
        // Emission waits for the window to close
        assert!(delays.iter().all(|&d| d > 0 && d <= 38), "delays {:?}", delays);
        assert!(offsets.windows(2).all(|w| w[0] == w[1]), "offsets {:?}", offsets);
    }

    #[test]
    fn test_out_of_range_rate_rejected() {
        let mut det = detector();
        // 60 samples apart = 250 bpm is the upper limit; 55 apart is 272 bpm
        let peaks: Vec<usize> = (0..20).map(|k| 400 + 55 * k).collect();
        let beats = run(&mut det, &pulses(&peaks, 1600, 1.0));
        assert!(beats.is_empty(), "emitted {:?}", beats);
        assert!(det.stats().rejected > 0);
    }

    #[test]
    fn test_non_finite_input_is_artefact() {
        let mut det = detector();
        for _ in 0..600 {
            det.detect(0.0);
        }
        assert_eq!(det.detect(f32::NAN), None);
        assert_eq!(det.phase(), DetectorPhase::ArtefactHold);
        assert_eq!(det.stats().artefacts, 1);

        // Filters were never fed the NaN, so detection recovers
        let peaks: Vec<usize> = (0..6).map(|k| 400 + 200 * k).collect();
        let beats = run(&mut det, &pulses(&peaks, 1800, 1.0));
        assert!(!beats.is_empty());
        assert!(beats.iter().all(|b| b.bpm.is_finite()));
    }

    #[test]
    fn test_reset_restores_startup() {
        let mut det = detector();
        let peaks: Vec<usize> = (0..6).map(|k| 400 + 200 * k).collect();
        run(&mut det, &pulses(&peaks, 1800, 1.0));
        assert!(det.previous_bpm().is_some());

        det.reset();
        assert_eq!(det.sample_index(), 0);
        assert_eq!(det.envelope(), 0.0);
        assert_eq!(det.previous_bpm(), None);
        assert_eq!(det.phase(), DetectorPhase::WarmingUp);
        assert_eq!(det.stats(), DetectorStats::default());
    }
}

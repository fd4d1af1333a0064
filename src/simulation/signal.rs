use std::f32::consts::PI;

/// One Gaussian deflection of a heartbeat template
#[derive(Debug, Clone, Copy, PartialEq, serde::Deserialize)]
pub struct WaveComponent {
    /// Centre relative to the R-peak, seconds
    pub offset_secs: f32,
    /// Gaussian width, seconds
    pub sigma_secs: f32,
    /// Peak deflection, millivolts
    pub amplitude_mv: f32,
}

const fn wave(offset_secs: f32, sigma_secs: f32, amplitude_mv: f32) -> WaveComponent {
    WaveComponent {
        offset_secs,
        sigma_secs,
        amplitude_mv,
    }
}

/// Lead II like beat with P, Q, R, S and T waves
pub const PQRST_TEMPLATE: [WaveComponent; 5] = [
    wave(-0.20, 0.025, 0.15),
    wave(-0.025, 0.010, -0.10),
    wave(0.0, 0.010, 1.0),
    wave(0.025, 0.010, -0.25),
    wave(0.25, 0.040, 0.30),
];

/// Beat without a P wave; the signal stays exactly zero until each QRS onset
pub const QRST_TEMPLATE: [WaveComponent; 4] = [
    wave(-0.025, 0.010, -0.10),
    wave(0.0, 0.010, 1.0),
    wave(0.025, 0.010, -0.25),
    wave(0.25, 0.040, 0.30),
];

/// Narrow spike used for rate convergence tests
pub const SPIKE_TEMPLATE: [WaveComponent; 1] = [wave(0.0, 0.010, 1.0)];

/// Components are truncated at this many sigmas
const SUPPORT_SIGMAS: f32 = 4.0;

/// Synthesise an ECG in volts with one beat centred on each R-peak index
///
/// `scale` multiplies every template amplitude. Components are truncated so
/// that samples outside every beat's support are exactly zero.
pub fn synthesize_ecg(
    num_samples: usize,
    sample_rate: f32,
    r_peaks: &[usize],
    template: &[WaveComponent],
    scale: f32,
) -> Vec<f32> {
    let mut signal = vec![0.0f32; num_samples];

    for &peak in r_peaks {
        for component in template {
            let centre = peak as f32 + component.offset_secs * sample_rate;
            let sigma = (component.sigma_secs * sample_rate).max(0.5);
            let half_width = SUPPORT_SIGMAS * sigma;

            let lo = (centre - half_width).ceil().max(0.0) as usize;
            let hi = ((centre + half_width).floor().max(-1.0) + 1.0) as usize;
            let amplitude = component.amplitude_mv * scale * 1e-3;

            for (i, s) in signal
                .iter_mut()
                .enumerate()
                .take(hi.min(num_samples))
                .skip(lo)
            {
                let dx = i as f32 - centre;
                *s += amplitude * (-dx * dx / (2.0 * sigma * sigma)).exp();
            }
        }
    }

    signal
}

/// Rhythm used to place R-peaks
#[derive(Debug, Clone, Copy, PartialEq, serde::Deserialize)]
#[serde(default)]
pub struct Rhythm {
    /// Mean heart rate
    pub bpm: f32,
    /// Respiratory modulation depth as a fraction of the RR interval
    pub variability: f32,
    /// Respiratory rate in Hz
    pub breathing_hz: f32,
}

impl Default for Rhythm {
    fn default() -> Self {
        Self {
            bpm: 72.0,
            variability: 0.0,
            breathing_hz: 0.25,
        }
    }
}

impl Rhythm {
    pub fn steady(bpm: f32) -> Self {
        Self {
            bpm,
            ..Default::default()
        }
    }
}

/// R-peak sample indices for `rhythm`, starting at `start_secs`
pub fn r_peak_schedule(
    num_samples: usize,
    sample_rate: f32,
    start_secs: f32,
    rhythm: &Rhythm,
) -> Vec<usize> {
    let mut peaks = Vec::new();
    if rhythm.bpm <= 0.0 {
        return peaks;
    }

    let mean_rr = 60.0 / rhythm.bpm;
    let mut t = start_secs.max(0.0);
    loop {
        let index = (t * sample_rate).round() as usize;
        if index >= num_samples {
            break;
        }
        peaks.push(index);
        let modulation = rhythm.variability * (2.0 * PI * rhythm.breathing_hz * t).sin();
        t += mean_rr * (1.0 + modulation);
    }
    peaks
}

/// R-peak indices from a first peak and explicit RR intervals in samples
pub fn peaks_from_intervals(first: usize, intervals: &[usize]) -> Vec<usize> {
    let mut peaks = Vec::with_capacity(intervals.len() + 1);
    peaks.push(first);
    let mut current = first;
    for &rr in intervals {
        current += rr;
        peaks.push(current);
    }
    peaks
}

/// Periodic spike train at `frequency_hz`, returned with its peak indices
pub fn spike_train(
    num_samples: usize,
    sample_rate: f32,
    start_secs: f32,
    frequency_hz: f32,
    amplitude_mv: f32,
) -> (Vec<f32>, Vec<usize>) {
    let peaks = r_peak_schedule(
        num_samples,
        sample_rate,
        start_secs,
        &Rhythm::steady(60.0 * frequency_hz),
    );
    let signal = synthesize_ecg(
        num_samples,
        sample_rate,
        &peaks,
        &SPIKE_TEMPLATE,
        amplitude_mv,
    );
    (signal, peaks)
}

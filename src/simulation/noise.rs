use rand::RngExt;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal};
use std::f32::consts::PI;

/// Interference added to a clean synthetic ECG
///
/// All amplitudes are in volts. Every field is optional so a TOML file only
/// names the disturbances it wants.
#[derive(Clone, Debug, Default, serde::Deserialize)]
pub struct NoiseConfig {
    pub seed: Option<u64>,
    pub gaussian: Option<GaussianNoiseConfig>,
    pub mains: Option<MainsHumConfig>,
    pub baseline: Option<BaselineWanderConfig>,
    pub impulse: Option<ImpulseNoiseConfig>,
}

impl NoiseConfig {
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_gaussian(mut self, std_dev: f32) -> Self {
        self.gaussian = Some(GaussianNoiseConfig { std_dev });
        self
    }

    pub fn with_mains(mut self, frequency_hz: f32, amplitude: f32) -> Self {
        self.mains = Some(MainsHumConfig {
            frequency_hz,
            amplitude,
        });
        self
    }

    pub fn with_baseline_wander(mut self, frequency_hz: f32, amplitude: f32) -> Self {
        self.baseline = Some(BaselineWanderConfig {
            frequency_hz,
            amplitude,
        });
        self
    }

    pub fn with_impulse(mut self, rate_hz: f32, amplitude: f32, duration_samples: usize) -> Self {
        self.impulse = Some(ImpulseNoiseConfig {
            rate_hz,
            amplitude,
            duration_samples,
        });
        self
    }
}

/// Broadband electrode and amplifier noise
#[derive(Clone, Debug, serde::Deserialize)]
pub struct GaussianNoiseConfig {
    pub std_dev: f32,
}

/// Power line interference
#[derive(Clone, Debug, serde::Deserialize)]
pub struct MainsHumConfig {
    pub frequency_hz: f32,
    pub amplitude: f32,
}

/// Slow drift from breathing and electrode movement
#[derive(Clone, Debug, serde::Deserialize)]
pub struct BaselineWanderConfig {
    pub frequency_hz: f32,
    pub amplitude: f32,
}

/// Short rectangular bursts, as from a knocked lead
#[derive(Clone, Debug, serde::Deserialize)]
pub struct ImpulseNoiseConfig {
    pub rate_hz: f32,
    pub amplitude: f32,
    pub duration_samples: usize,
}

fn create_rng(seed: Option<u64>) -> ChaCha8Rng {
    match seed {
        Some(s) => ChaCha8Rng::seed_from_u64(s),
        None => rand::make_rng(),
    }
}

pub fn signal_power(signal: &[f32]) -> f32 {
    if signal.is_empty() {
        return 0.0;
    }
    signal.iter().map(|&x| x * x).sum::<f32>() / signal.len() as f32
}

fn apply_gaussian_noise(signal: &mut [f32], config: &GaussianNoiseConfig, rng: &mut ChaCha8Rng) {
    let Ok(normal) = Normal::new(0.0, config.std_dev.max(0.0) as f64) else {
        return;
    };
    for sample in signal.iter_mut() {
        *sample += normal.sample(rng) as f32;
    }
}

fn apply_sinusoid(signal: &mut [f32], frequency_hz: f32, amplitude: f32, phase: f32, sample_rate: f32) {
    let omega = 2.0 * PI * frequency_hz / sample_rate;
    for (i, sample) in signal.iter_mut().enumerate() {
        *sample += amplitude * (omega * i as f32 + phase).sin();
    }
}

fn apply_impulse_noise(
    signal: &mut [f32],
    config: &ImpulseNoiseConfig,
    sample_rate: f32,
    rng: &mut ChaCha8Rng,
) {
    let n = signal.len();
    if n == 0 || config.rate_hz <= 0.0 {
        return;
    }

    let avg_samples_between_impulses = sample_rate / config.rate_hz;

    let mut pos = 0usize;
    loop {
        let interval = (rng.random::<f32>() * 2.0 * avg_samples_between_impulses) as usize;
        pos += interval.max(1);

        if pos >= n {
            break;
        }

        let sign = if rng.random::<bool>() { 1.0 } else { -1.0 };
        let end = (pos + config.duration_samples.max(1)).min(n);

        for sample in signal[pos..end].iter_mut() {
            *sample += sign * config.amplitude;
        }
    }
}

/// Return a copy of `clean` with the configured interference added
pub fn apply_noise(clean: &[f32], config: &NoiseConfig, sample_rate: f32) -> Vec<f32> {
    let mut signal = clean.to_vec();
    let mut rng = create_rng(config.seed);

    if let Some(ref baseline) = config.baseline {
        let phase = rng.random::<f32>() * 2.0 * PI;
        apply_sinusoid(&mut signal, baseline.frequency_hz, baseline.amplitude, phase, sample_rate);
    }

    if let Some(ref mains) = config.mains {
        let phase = rng.random::<f32>() * 2.0 * PI;
        apply_sinusoid(&mut signal, mains.frequency_hz, mains.amplitude, phase, sample_rate);
    }

    if let Some(ref gaussian) = config.gaussian {
        apply_gaussian_noise(&mut signal, gaussian, &mut rng);
    }

    if let Some(ref impulse) = config.impulse {
        apply_impulse_noise(&mut signal, impulse, sample_rate, &mut rng);
    }

    signal
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gaussian_noise_power() {
        let clean = vec![0.0f32; 20000];
        let config = NoiseConfig::default().with_seed(42).with_gaussian(1e-3);
        let noisy = apply_noise(&clean, &config, 250.0);

        assert_eq!(clean.len(), noisy.len());
        let rms = signal_power(&noisy).sqrt();
        assert!((rms - 1e-3).abs() < 1e-4, "rms {}", rms);
    }

    #[test]
    fn test_seeded_rng_reproducibility() {
        let clean: Vec<f32> = (0..1000).map(|i| (i as f32 * 0.1).sin() * 1e-3).collect();
        let config = NoiseConfig::default()
            .with_seed(12345)
            .with_gaussian(5e-5)
            .with_mains(50.0, 1e-4);

        let noisy1 = apply_noise(&clean, &config, 250.0);
        let noisy2 = apply_noise(&clean, &config, 250.0);
        assert_eq!(noisy1, noisy2);

        let other = apply_noise(&clean, &config.clone().with_seed(1), 250.0);
        assert_ne!(noisy1, other);
    }

    #[test]
    fn test_mains_hum_amplitude() {
        let clean = vec![0.0f32; 5000];
        let config = NoiseConfig::default().with_seed(3).with_mains(60.0, 2e-4);
        let noisy = apply_noise(&clean, &config, 500.0);
        let peak = noisy.iter().fold(0.0f32, |a, &b| a.max(b.abs()));
        assert!(peak <= 2e-4 + 1e-9 && peak > 1.9e-4);
        // Sine power is half the squared amplitude
        let power = signal_power(&noisy);
        assert!((power - 2e-8).abs() < 1e-9);
    }

    #[test]
    fn test_baseline_wander_is_slow() {
        let clean = vec![0.0f32; 2500];
        let config = NoiseConfig::default().with_seed(9).with_baseline_wander(0.3, 5e-4);
        let noisy = apply_noise(&clean, &config, 250.0);
        let max_step = noisy
            .windows(2)
            .map(|w| (w[1] - w[0]).abs())
            .fold(0.0f32, f32::max);
        assert!(max_step < 5e-6);
    }

    #[test]
    fn test_impulse_noise_adds_bursts() {
        let clean = vec![0.0f32; 10000];
        let config = NoiseConfig::default().with_seed(42).with_impulse(2.0, 0.05, 3);
        let noisy = apply_noise(&clean, &config, 250.0);

        let hits = noisy.iter().filter(|&&x| x.abs() > 0.04).count();
        assert!(hits > 30);
        assert!(hits < 1000);
    }

    #[test]
    fn test_empty_config_is_identity() {
        let clean: Vec<f32> = (0..100).map(|i| i as f32).collect();
        assert_eq!(apply_noise(&clean, &NoiseConfig::default(), 250.0), clean);
    }

    #[test]
    fn test_toml_config() {
        let config: NoiseConfig = toml::from_str(
            r#"
            seed = 7
            [gaussian]
            std_dev = 2e-5
            [mains]
            frequency_hz = 50.0
            amplitude = 3e-4
            "#,
        )
        .unwrap();
        assert_eq!(config.seed, Some(7));
        assert!(config.gaussian.is_some());
        assert!(config.baseline.is_none());
    }
}

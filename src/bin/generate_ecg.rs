use anyhow::{Context, Result};
use clap::Parser;
use ecgpulse::save_wav;
use ecgpulse::simulation::{
    GaussianNoiseConfig, ImpulseNoiseConfig, MainsHumConfig, NoiseConfig, PQRST_TEMPLATE, Rhythm,
    apply_noise, r_peak_schedule, synthesize_ecg,
};
use serde::Deserialize;
use std::fs;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "generate_ecg")]
#[command(about = "Generate synthetic ECG WAV files with configurable rhythm and noise")]
struct Args {
    /// TOML rhythm/noise configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Output directory
    #[arg(short, long, default_value = "data/synthetic")]
    output_dir: PathBuf,

    /// Heart rates in bpm: comma-separated (e.g., "60,72,90") or range (e.g., "40-180:20")
    #[arg(short, long, default_value = "60-120:20")]
    rates: String,

    /// Number of trials per heart rate
    #[arg(short, long, default_value_t = 3)]
    trials: u32,

    /// Base seed for reproducibility
    #[arg(short, long)]
    seed: Option<u64>,

    /// Signal duration in seconds
    #[arg(short, long, default_value_t = 30.0)]
    duration: f32,

    /// Sample rate in Hz
    #[arg(long, default_value_t = 250)]
    sample_rate: u32,

    /// Time of the first R-peak in seconds
    #[arg(long, default_value_t = 0.5)]
    first_beat: f32,

    /// R-peak amplitude in millivolts
    #[arg(long, default_value_t = 1.0)]
    amplitude_mv: f32,

    /// Volts represented by a full-scale sample in the written file
    #[arg(long, default_value_t = 1.0)]
    volts_per_full_scale: f32,

    /// Output filename prefix
    #[arg(long, default_value = "ecg")]
    prefix: String,

    /// Generate manifest.json with the true R-peak indices
    #[arg(long)]
    manifest: bool,

    /// RR variability as a fraction of the interval (CLI override)
    #[arg(long)]
    variability: Option<f32>,

    /// Gaussian noise standard deviation in volts (CLI override)
    #[arg(long)]
    noise_std: Option<f32>,

    /// Mains hum frequency in Hz (CLI override)
    #[arg(long)]
    mains_hz: Option<f32>,

    /// Mains hum amplitude in volts
    #[arg(long, default_value_t = 2e-4)]
    mains_amplitude: f32,

    /// Impulse artefact rate in Hz (CLI override)
    #[arg(long)]
    impulse_rate: Option<f32>,
}

#[derive(Debug, Deserialize, Default)]
struct TomlConfig {
    rhythm: Option<RhythmSection>,
    #[serde(default)]
    noise: NoiseConfig,
}

#[derive(Debug, Deserialize)]
struct RhythmSection {
    variability: Option<f32>,
    breathing_hz: Option<f32>,
}

#[derive(Debug, serde::Serialize)]
struct ManifestEntry {
    file: String,
    bpm: f32,
    trial: u32,
    seed: u64,
    r_peaks: Vec<usize>,
}

#[derive(Debug, serde::Serialize)]
struct Manifest {
    sample_rate: u32,
    duration: f32,
    volts_per_full_scale: f32,
    files: Vec<ManifestEntry>,
}

fn parse_rates(s: &str) -> Result<Vec<f32>> {
    if s.contains(':') {
        let parts: Vec<&str> = s.split(':').collect();
        if parts.len() != 2 {
            anyhow::bail!("Invalid range format. Use 'start-end:step'");
        }
        let step: f32 = parts[1].parse().context("Invalid step value")?;
        if step <= 0.0 {
            anyhow::bail!("Step must be positive");
        }
        let range_parts: Vec<&str> = parts[0].split('-').collect();
        if range_parts.len() != 2 {
            anyhow::bail!("Invalid range format. Use 'start-end:step'");
        }
        let start: f32 = range_parts[0].parse().context("Invalid start value")?;
        let end: f32 = range_parts[1].parse().context("Invalid end value")?;

        let mut rates = Vec::new();
        let mut r = start;
        while r <= end {
            rates.push(r);
            r += step;
        }
        Ok(rates)
    } else {
        s.split(',')
            .map(|p| p.trim().parse::<f32>().context("Invalid heart rate value"))
            .collect()
    }
}

fn load_toml_config(path: &PathBuf) -> Result<TomlConfig> {
    let content = fs::read_to_string(path).context("Failed to read config file")?;
    toml::from_str(&content).context("Failed to parse config file")
}

fn build_rhythm(toml: &TomlConfig, args: &Args, bpm: f32) -> Rhythm {
    let mut rhythm = Rhythm::steady(bpm);
    if let Some(ref section) = toml.rhythm {
        if let Some(v) = section.variability {
            rhythm.variability = v;
        }
        if let Some(b) = section.breathing_hz {
            rhythm.breathing_hz = b;
        }
    }
    if let Some(v) = args.variability {
        rhythm.variability = v;
    }
    rhythm
}

fn build_noise_config(toml: &TomlConfig, args: &Args, seed: u64) -> NoiseConfig {
    let mut config = toml.noise.clone().with_seed(seed);

    if let Some(std_dev) = args.noise_std {
        config.gaussian = Some(GaussianNoiseConfig { std_dev });
    }

    if let Some(frequency_hz) = args.mains_hz {
        config.mains = Some(MainsHumConfig {
            frequency_hz,
            amplitude: args.mains_amplitude,
        });
    }

    if let Some(rate_hz) = args.impulse_rate {
        config.impulse = Some(ImpulseNoiseConfig {
            rate_hz,
            amplitude: 0.05,
            duration_samples: 3,
        });
    }

    config
}

fn main() -> Result<()> {
    let args = Args::parse();
    env_logger::init();

    if args.volts_per_full_scale <= 0.0 {
        anyhow::bail!("--volts-per-full-scale must be positive");
    }

    fs::create_dir_all(&args.output_dir).context("Failed to create output directory")?;

    let toml_config = if let Some(ref config_path) = args.config {
        load_toml_config(config_path)?
    } else {
        TomlConfig::default()
    };

    let rates = parse_rates(&args.rates)?;
    let base_seed = args.seed.unwrap_or(0);
    let sample_rate = args.sample_rate as f32;
    let num_samples = (args.duration * sample_rate) as usize;

    let mut manifest_entries = Vec::new();
    let total_files = rates.len() * args.trials as usize;
    let mut file_count = 0;

    for &bpm in &rates {
        let rhythm = build_rhythm(&toml_config, &args, bpm);
        let r_peaks = r_peak_schedule(num_samples, sample_rate, args.first_beat, &rhythm);
        let clean = synthesize_ecg(
            num_samples,
            sample_rate,
            &r_peaks,
            &PQRST_TEMPLATE,
            args.amplitude_mv,
        );

        for trial in 0..args.trials {
            let seed = base_seed + trial as u64 * 1000 + bpm as u64;
            let noise_config = build_noise_config(&toml_config, &args, seed);
            let signal: Vec<f32> = apply_noise(&clean, &noise_config, sample_rate)
                .iter()
                .map(|&v| v / args.volts_per_full_scale)
                .collect();

            let filename = format!("{}_{:03}bpm_t{:02}.wav", args.prefix, bpm as i32, trial);
            let filepath = args.output_dir.join(&filename);

            save_wav(&filepath, &signal, args.sample_rate).context("Failed to write WAV file")?;

            manifest_entries.push(ManifestEntry {
                file: filename,
                bpm,
                trial,
                seed,
                r_peaks: r_peaks.clone(),
            });

            file_count += 1;
            eprint!("\rGenerating: {}/{}", file_count, total_files);
        }
    }
    eprintln!();

    if args.manifest {
        let manifest = Manifest {
            sample_rate: args.sample_rate,
            duration: args.duration,
            volts_per_full_scale: args.volts_per_full_scale,
            files: manifest_entries,
        };
        let manifest_path = args.output_dir.join("manifest.json");
        let manifest_json =
            serde_json::to_string_pretty(&manifest).context("Failed to serialize manifest")?;
        fs::write(&manifest_path, manifest_json).context("Failed to write manifest")?;
        eprintln!("Manifest written to: {}", manifest_path.display());
    }

    eprintln!(
        "Generated {} files in {}",
        total_files,
        args.output_dir.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_rates_comma_separated() {
        let rates = parse_rates("60,72, 90").unwrap();
        assert_eq!(rates, vec![60.0, 72.0, 90.0]);
    }

    #[test]
    fn test_parse_rates_range() {
        let rates = parse_rates("40-100:20").unwrap();
        assert_eq!(rates, vec![40.0, 60.0, 80.0, 100.0]);
    }

    #[test]
    fn test_parse_rates_rejects_bad_step() {
        assert!(parse_rates("40-100:0").is_err());
        assert!(parse_rates("40-100:x").is_err());
    }

    #[test]
    fn test_toml_config_sections() {
        let config: TomlConfig = toml::from_str(
            r#"
            [rhythm]
            variability = 0.05

            [noise.gaussian]
            std_dev = 1e-5

            [noise.baseline]
            frequency_hz = 0.3
            amplitude = 5e-4
            "#,
        )
        .unwrap();
        assert!(config.noise.gaussian.is_some());
        assert!(config.noise.mains.is_none());

        let args = Args::parse_from(["generate_ecg", "--variability", "0.1"]);
        let rhythm = build_rhythm(&config, &args, 60.0);
        assert_eq!(rhythm.variability, 0.1);
        let noise = build_noise_config(&config, &args, 5);
        assert_eq!(noise.seed, Some(5));
        assert!(noise.baseline.is_some());
    }
}

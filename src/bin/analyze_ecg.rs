use anyhow::Context;
use clap::Parser;
use rolling_stats::Stats;
use serde::Serialize;
use std::path::{Path, PathBuf};

use ecgpulse::EcgProcessor;
use ecgpulse::acquisition::{SampleSource, TextFileSource, WavFileSource};
use ecgpulse::config::{EcgConfig, MainsFrequency};
use ecgpulse::ecg::{BeatEvent, DetectorPhase};
use ecgpulse::output::{self, BeatOutput, Formatter, OutputFormat};

#[derive(Parser, Debug)]
#[command(name = "analyze_ecg")]
#[command(about = "Run recorded ECG files through the R-peak detector and report heart rate statistics", long_about = None)]
struct Args {
    /// ECG files to analyze (.wav, or text with one voltage per line)
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Output format: text, csv, json
    #[arg(short = 'f', long, value_enum, default_value = "text")]
    format: OutputFormat,

    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Mains frequency to notch out (50 or 60)
    #[arg(short, long)]
    mains: Option<MainsFrequency>,

    /// Sample rate of text files in Hz
    #[arg(long)]
    sample_rate: Option<u32>,

    /// WAV channel carrying the ECG (0-based)
    #[arg(long)]
    channel: Option<usize>,

    /// Volts represented by a full-scale WAV sample
    #[arg(long)]
    volts_per_full_scale: Option<f32>,

    /// Print every accepted beat
    #[arg(short, long)]
    beats: bool,

    /// Increase output verbosity
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Debug, Clone, Serialize)]
struct StatsSummary {
    count: usize,
    mean: f32,
    std_dev: f32,
    min: f32,
    max: f32,
}

impl StatsSummary {
    fn from_stats(stats: &Stats<f32>) -> Option<Self> {
        if stats.count == 0 {
            return None;
        }
        Some(Self {
            count: stats.count,
            mean: stats.mean,
            std_dev: stats.std_dev,
            min: stats.min,
            max: stats.max,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
struct FileAnalysis {
    filename: String,
    sample_rate: u32,
    duration_secs: f32,
    beat_count: usize,
    bpm: Option<StatsSummary>,
    rr_interval_ms: Option<StatsSummary>,
    rejected: u64,
    artefacts: u64,
    /// Fraction of the recording not spent holding off after artefacts
    coverage: f32,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    beats: Vec<BeatOutput>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl FileAnalysis {
    fn failed(filename: String, error: String) -> Self {
        Self {
            filename,
            sample_rate: 0,
            duration_secs: 0.0,
            beat_count: 0,
            bpm: None,
            rr_interval_ms: None,
            rejected: 0,
            artefacts: 0,
            coverage: 0.0,
            beats: Vec::new(),
            error: Some(error),
        }
    }
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let log_level = match args.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    let mut config = match args.config {
        Some(ref path) => EcgConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => EcgConfig::default(),
    };
    if let Some(mains) = args.mains {
        config.filters.mains = mains;
    }
    if let Some(rate) = args.sample_rate {
        config.acquisition.sample_rate = rate;
    }
    if let Some(channel) = args.channel {
        config.acquisition.ecg_channel = channel;
    }
    if let Some(vpfs) = args.volts_per_full_scale {
        config.acquisition.volts_per_full_scale = vpfs;
    }

    let results: Vec<FileAnalysis> = args
        .files
        .iter()
        .map(|path| analyze_file(path, &config, args.beats))
        .collect();

    match args.format {
        OutputFormat::Text => print_text(&results, &config),
        OutputFormat::Csv => print_csv(&results),
        OutputFormat::Json => print_json(&results)?,
    }

    Ok(())
}

fn analyze_file(path: &Path, config: &EcgConfig, keep_beats: bool) -> FileAnalysis {
    let filename = path
        .file_name()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string());

    match analyze_file_impl(path, config, keep_beats) {
        Ok(analysis) => analysis,
        Err(e) => FileAnalysis::failed(filename, format!("{:#}", e)),
    }
}

fn open_source(path: &Path, config: &EcgConfig) -> anyhow::Result<Box<dyn SampleSource>> {
    let acquisition = &config.acquisition;
    let is_wav = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("wav"));

    if is_wav {
        Ok(Box::new(WavFileSource::new(
            path,
            acquisition.ecg_channel,
            acquisition.volts_per_full_scale,
            acquisition.buffer_size,
        )?))
    } else {
        Ok(Box::new(TextFileSource::new(
            path,
            acquisition.sample_rate,
            acquisition.buffer_size,
        )?))
    }
}

fn analyze_file_impl(
    path: &Path,
    config: &EcgConfig,
    keep_beats: bool,
) -> anyhow::Result<FileAnalysis> {
    let filename = path
        .file_name()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string());

    let mut source = open_source(path, config)?;
    let sample_rate = source.sample_rate();
    let fs = sample_rate as f32;

    let mut processor = EcgProcessor::with_sample_rate(config.clone(), fs)
        .with_context(|| format!("Cannot analyze {} at {} Hz", filename, sample_rate))?;

    let mut beats: Vec<BeatEvent> = Vec::new();
    let mut beat_lines = Vec::new();
    let mut total_samples: u64 = 0;
    let mut held_samples: u64 = 0;

    while let Some(buffer) = source.next_buffer()? {
        for &sample in &buffer {
            if let Some(beat) = processor.process_sample(sample) {
                if keep_beats {
                    // Trend as known when the beat arrived
                    let trend = processor.predict_trend(beat.time_secs(fs));
                    beat_lines.push(BeatOutput::new(&beat, fs, trend));
                }
                beats.push(beat);
            }
            total_samples += 1;
            if processor
                .detector()
                .is_some_and(|d| d.phase() == DetectorPhase::ArtefactHold)
            {
                held_samples += 1;
            }
        }
    }

    let mut bpm_stats: Stats<f32> = Stats::new();
    let mut rr_stats: Stats<f32> = Stats::new();
    for beat in &beats {
        bpm_stats.update(beat.bpm);
        rr_stats.update(60_000.0 / beat.bpm);
    }

    let detector_stats = processor
        .detector()
        .map(|d| d.stats())
        .unwrap_or_default();

    let coverage = if total_samples == 0 {
        0.0
    } else {
        1.0 - held_samples as f32 / total_samples as f32
    };

    Ok(FileAnalysis {
        filename,
        sample_rate,
        duration_secs: total_samples as f32 / fs,
        beat_count: beats.len(),
        bpm: StatsSummary::from_stats(&bpm_stats),
        rr_interval_ms: StatsSummary::from_stats(&rr_stats),
        rejected: detector_stats.rejected,
        artefacts: detector_stats.artefacts,
        coverage,
        beats: beat_lines,
        error: None,
    })
}

fn print_text(results: &[FileAnalysis], config: &EcgConfig) {
    eprintln!(
        "Mains notch: {}, band-pass {}-{} Hz",
        config.filters.mains, config.filters.bandpass_low_hz, config.filters.bandpass_high_hz
    );
    eprintln!();

    println!(
        "{:<40} {:>8} {:>8} {:>8} {:>8} {:>8} {:>9}",
        "File", "Beats", "HR", "Std", "Rejected", "Artefact", "Coverage"
    );
    println!("{}", "-".repeat(95));

    for result in results {
        if let Some(ref err) = result.error {
            println!("{:<40} ERROR: {}", result.filename, err);
            continue;
        }

        let hr_mean = result
            .bpm
            .as_ref()
            .map(|s| format!("{:.1}", s.mean))
            .unwrap_or_else(|| "-".to_string());
        let hr_std = result
            .bpm
            .as_ref()
            .map(|s| format!("{:.2}", s.std_dev))
            .unwrap_or_else(|| "-".to_string());

        println!(
            "{:<40} {:>8} {:>8} {:>8} {:>8} {:>8} {:>8.1}%",
            result.filename,
            result.beat_count,
            hr_mean,
            hr_std,
            result.rejected,
            result.artefacts,
            100.0 * result.coverage
        );
    }

    let formatter = output::TextFormatter::new(true);
    for result in results {
        if result.error.is_some() {
            continue;
        }

        if let Some(ref bpm) = result.bpm {
            eprintln!();
            eprintln!("Heart rate for {}:", result.filename);
            eprintln!("  Mean: {:.1} bpm", bpm.mean);
            eprintln!("  Std dev: {:.2} bpm", bpm.std_dev);
            eprintln!("  Min: {:.1} bpm", bpm.min);
            eprintln!("  Max: {:.1} bpm", bpm.max);
            if let Some(ref rr) = result.rr_interval_ms {
                eprintln!("  RR interval: {:.0} ± {:.1} ms", rr.mean, rr.std_dev);
            }
        }

        for beat in &result.beats {
            println!("{}", formatter.format(beat));
        }
    }
}

fn print_csv(results: &[FileAnalysis]) {
    println!(
        "filename,sample_rate,duration_s,beats,bpm_mean,bpm_std,bpm_min,bpm_max,rr_mean_ms,rejected,artefacts,coverage,error"
    );
    for result in results {
        let summary = |f: fn(&StatsSummary) -> f32, s: &Option<StatsSummary>| {
            s.as_ref().map(|s| format!("{:.2}", f(s))).unwrap_or_default()
        };
        let error = result.error.as_deref().unwrap_or("");

        println!(
            "{},{},{:.2},{},{},{},{},{},{},{},{},{:.4},{}",
            result.filename,
            result.sample_rate,
            result.duration_secs,
            result.beat_count,
            summary(|s| s.mean, &result.bpm),
            summary(|s| s.std_dev, &result.bpm),
            summary(|s| s.min, &result.bpm),
            summary(|s| s.max, &result.bpm),
            summary(|s| s.mean, &result.rr_interval_ms),
            result.rejected,
            result.artefacts,
            result.coverage,
            error
        );
    }
}

fn print_json(results: &[FileAnalysis]) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(results)?;
    println!("{}", json);
    Ok(())
}

use anyhow::Context;
use clap::Parser;
use crossbeam_channel::unbounded;
use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};

use ecgpulse::acquisition::{DeviceSource, SampleSource};
use ecgpulse::config::{EcgConfig, MainsFrequency};
use ecgpulse::ecg::{BeatEvent, SharedTrendPredictor};
use ecgpulse::output::{BeatOutput, OutputFormat, create_formatter};
use ecgpulse::EcgProcessor;

#[derive(Parser, Debug)]
#[command(name = "ecgpulse")]
#[command(about = "Live ECG heart rate from a sound-card front end", long_about = None)]
struct Args {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Mains frequency to notch out (50 or 60)
    #[arg(short, long)]
    mains: Option<MainsFrequency>,

    /// Device sample rate in Hz
    #[arg(long)]
    sample_rate: Option<u32>,

    /// Number of input channels to open
    #[arg(long)]
    channels: Option<u16>,

    /// Input channel carrying the ECG (0-based)
    #[arg(long)]
    channel: Option<usize>,

    /// Output format: text, csv, json
    #[arg(short = 'f', long, value_enum, default_value = "text")]
    format: OutputFormat,

    /// Print the trend heart rate every N seconds (0 disables)
    #[arg(long, default_value_t = 0.0)]
    trend_interval: f32,

    /// Increase output verbosity
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    verbose: u8,
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
    if let Some(channels) = args.channels {
        config.acquisition.channels = channels;
    }
    if let Some(channel) = args.channel {
        config.acquisition.ecg_channel = channel;
    }

    eprintln!("=== ecgpulse - live ECG heart rate ===");
    eprintln!("Sample rate: {} Hz", config.acquisition.sample_rate);
    eprintln!(
        "ECG channel: {} of {}",
        config.acquisition.ecg_channel, config.acquisition.channels
    );
    eprintln!("Mains notch: {}", config.filters.mains);
    eprintln!();

    let sample_rate = config.acquisition.sample_rate as f32;
    let mut processor = EcgProcessor::with_sample_rate(config.clone(), sample_rate)
        .context("Failed to initialise detector")?;

    let (beat_tx, beat_rx) = unbounded::<BeatEvent>();
    processor.register_heartbeat_listener(move |beat| {
        let _ = beat_tx.send(beat);
    });

    let trend = processor.trend();
    let format = args.format;
    let printer = thread::spawn(move || print_beats(beat_rx, trend, sample_rate, format, args.verbose > 0));

    eprintln!("Starting capture...");
    let mut source = DeviceSource::new(&config.acquisition)?;
    eprintln!("Capture started. Waiting for heartbeats...\n");

    run_processing_loop(&mut source, &mut processor, args.trend_interval)?;

    // Dropping the processor closes the beat channel
    drop(processor);
    let _ = printer.join();
    Ok(())
}

fn run_processing_loop(
    source: &mut dyn SampleSource,
    processor: &mut EcgProcessor,
    trend_interval: f32,
) -> anyhow::Result<()> {
    let trend_every = (trend_interval > 0.0).then(|| Duration::from_secs_f32(trend_interval));
    let mut last_trend = Instant::now();
    let sample_rate = source.sample_rate() as f64;

    while let Some(buffer) = source.next_buffer()? {
        processor.process_buffer(&buffer);

        if let Some(every) = trend_every
            && last_trend.elapsed() >= every
        {
            let now = processor
                .detector()
                .map(|d| d.sample_index() as f64 / sample_rate)
                .unwrap_or(0.0);
            match processor.predict_trend(now) {
                Some(bpm) => eprintln!("Trend: {:.1} bpm", bpm),
                None => log::info!("Waiting for heartbeats..."),
            }
            last_trend = Instant::now();
        }
    }

    eprintln!("Capture stream closed");
    Ok(())
}

fn print_beats(
    rx: crossbeam_channel::Receiver<BeatEvent>,
    trend: SharedTrendPredictor,
    sample_rate: f32,
    format: OutputFormat,
    verbose: bool,
) {
    let formatter = create_formatter(format, verbose);
    if let Some(header) = formatter.header() {
        println!("{}", header);
    }

    for beat in rx.iter() {
        let trend_bpm = trend.predict(beat.time_secs(sample_rate));
        println!("{}", formatter.format(&BeatOutput::new(&beat, sample_rate, trend_bpm)));
    }
}

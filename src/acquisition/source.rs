use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use anyhow::Context;
use crossbeam_channel::Receiver;
use hound::WavReader;

use super::AudioCapture;
use crate::config::AcquisitionConfig;

/// Anything that delivers buffers of ECG samples in volts
pub trait SampleSource {
    /// Next buffer, or `None` once the source is exhausted
    fn next_buffer(&mut self) -> anyhow::Result<Option<Vec<f32>>>;
    fn sample_rate(&self) -> u32;
}

pub struct DeviceSource {
    rx: Receiver<Vec<f32>>,
    sample_rate: u32,
    _capture: AudioCapture,
}

impl DeviceSource {
    pub fn new(config: &AcquisitionConfig) -> anyhow::Result<Self> {
        let (tx, rx) = crossbeam_channel::bounded(10);
        let capture = AudioCapture::new(config, tx)?;
        Ok(Self {
            rx,
            sample_rate: config.sample_rate,
            _capture: capture,
        })
    }
}

impl SampleSource for DeviceSource {
    fn next_buffer(&mut self) -> anyhow::Result<Option<Vec<f32>>> {
        match self.rx.recv() {
            Ok(data) => Ok(Some(data)),
            Err(_) => Ok(None),
        }
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

/// Buffered replay of an in-memory sample vector
#[derive(Debug, Clone)]
struct Chunker {
    samples: Vec<f32>,
    position: usize,
    chunk_size: usize,
}

impl Chunker {
    fn new(samples: Vec<f32>, chunk_size: usize) -> Self {
        Self {
            samples,
            position: 0,
            chunk_size: chunk_size.max(1),
        }
    }

    fn next_chunk(&mut self) -> Option<Vec<f32>> {
        if self.position >= self.samples.len() {
            return None;
        }
        let end = (self.position + self.chunk_size).min(self.samples.len());
        let chunk = self.samples[self.position..end].to_vec();
        self.position = end;
        Some(chunk)
    }
}

/// WAV recording of an ECG front end
///
/// One channel of a possibly multichannel file is used. Integer samples are
/// normalised to ±1 full scale before the volts-per-full-scale factor is
/// applied.
pub struct WavFileSource {
    chunker: Chunker,
    sample_rate: u32,
}

impl WavFileSource {
    pub fn new<P: AsRef<Path>>(
        path: P,
        ecg_channel: usize,
        volts_per_full_scale: f32,
        chunk_size: usize,
    ) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let reader = WavReader::open(path)
            .with_context(|| format!("Failed to open WAV file {}", path.display()))?;
        let spec = reader.spec();

        if ecg_channel >= spec.channels as usize {
            anyhow::bail!(
                "ECG channel {} requested but WAV file has {} channels",
                ecg_channel,
                spec.channels
            );
        }

        let interleaved = Self::read_samples(reader, &spec)?;
        let samples = interleaved
            .chunks_exact(spec.channels as usize)
            .map(|frame| frame[ecg_channel] * volts_per_full_scale)
            .collect();

        Ok(Self {
            chunker: Chunker::new(samples, chunk_size),
            sample_rate: spec.sample_rate,
        })
    }

    fn read_samples(
        mut reader: WavReader<BufReader<File>>,
        spec: &hound::WavSpec,
    ) -> anyhow::Result<Vec<f32>> {
        let samples = match spec.sample_format {
            hound::SampleFormat::Float => reader.samples::<f32>().collect::<Result<Vec<_>, _>>()?,
            hound::SampleFormat::Int => {
                let max_val = 2f32.powi(spec.bits_per_sample as i32 - 1);
                reader
                    .samples::<i32>()
                    .map(|s| s.map(|v| v as f32 / max_val))
                    .collect::<Result<Vec<_>, _>>()?
            }
        };
        Ok(samples)
    }
}

impl SampleSource for WavFileSource {
    fn next_buffer(&mut self) -> anyhow::Result<Option<Vec<f32>>> {
        Ok(self.chunker.next_chunk())
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

/// Plain text dump, one voltage per line
///
/// Blank lines and lines starting with `#` are skipped. The sample rate is
/// not stored in the file and has to be supplied.
pub struct TextFileSource {
    chunker: Chunker,
    sample_rate: u32,
}

impl TextFileSource {
    pub fn new<P: AsRef<Path>>(path: P, sample_rate: u32, chunk_size: usize) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let file =
            File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
        let samples = Self::parse(BufReader::new(file))
            .with_context(|| format!("Failed to read samples from {}", path.display()))?;
        Ok(Self {
            chunker: Chunker::new(samples, chunk_size),
            sample_rate,
        })
    }

    /// Parse one sample per line
    pub fn parse<R: BufRead>(reader: R) -> anyhow::Result<Vec<f32>> {
        let mut samples = Vec::new();
        for (lineno, line) in reader.lines().enumerate() {
            let line = line?;
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            let value: f32 = trimmed
                .parse()
                .with_context(|| format!("line {}: invalid sample '{}'", lineno + 1, trimmed))?;
            samples.push(value);
        }
        Ok(samples)
    }
}

impl SampleSource for TextFileSource {
    fn next_buffer(&mut self) -> anyhow::Result<Option<Vec<f32>>> {
        Ok(self.chunker.next_chunk())
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

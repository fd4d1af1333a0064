mod csv;
mod json;
mod text;

use chrono::Utc;
use serde::Serialize;

use crate::ecg::BeatEvent;

pub use self::csv::CsvFormatter;
pub use self::json::JsonFormatter;
pub use self::text::TextFormatter;

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
    Csv,
}

/// One reported heartbeat
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BeatOutput {
    /// Seconds since the detector was last reset
    pub timestamp_secs: f64,
    pub bpm: f32,
    /// Smoothed rate at the beat, once the trend has one
    pub trend_bpm: Option<f64>,
    pub amplitude: f64,
    pub confidence: f64,
}

impl BeatOutput {
    pub fn new(beat: &BeatEvent, sample_rate: f32, trend_bpm: Option<f64>) -> Self {
        Self {
            timestamp_secs: beat.time_secs(sample_rate),
            bpm: beat.bpm,
            trend_bpm,
            amplitude: beat.amplitude,
            confidence: beat.confidence,
        }
    }
}

pub trait Formatter: Send {
    fn format(&self, output: &BeatOutput) -> String;

    fn header(&self) -> Option<&'static str> {
        None
    }
}

pub fn create_formatter(format: OutputFormat, verbose: bool) -> Box<dyn Formatter> {
    match format {
        OutputFormat::Text => Box::new(TextFormatter::new(verbose)),
        OutputFormat::Json => Box::new(JsonFormatter),
        OutputFormat::Csv => Box::new(CsvFormatter),
    }
}

pub fn iso8601_timestamp() -> String {
    Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn output() -> BeatOutput {
        BeatOutput {
            timestamp_secs: 3.2,
            bpm: 72.5,
            trend_bpm: Some(71.84),
            amplitude: 0.42,
            confidence: 1.7,
        }
    }

    #[test]
    fn test_from_beat_event() {
        let beat = BeatEvent {
            sample_index: 500,
            bpm: 60.0,
            amplitude: 1.0,
            confidence: 2.0,
        };
        let out = BeatOutput::new(&beat, 250.0, None);
        assert_eq!(out.timestamp_secs, 2.0);
        assert_eq!(out.bpm, 60.0);
        assert_eq!(out.trend_bpm, None);
    }

    #[test]
    fn test_text_format() {
        let line = TextFormatter::new(false).format(&output());
        assert_eq!(line, "HR = 72.5 bpm (trend 71.8)");
        let verbose = TextFormatter::new(true).format(&output());
        assert!(verbose.starts_with("t = "));
        assert!(verbose.contains("conf: 1.70"));
    }

    #[test]
    fn test_csv_format_matches_header() {
        let formatter = CsvFormatter;
        let header = formatter.header().unwrap();
        let line = formatter.format(&output());
        assert_eq!(header.split(',').count(), line.split(',').count());

        let mut empty = output();
        empty.trend_bpm = None;
        assert!(formatter.format(&empty).contains(",72.5,,"));
    }

    #[test]
    fn test_json_format_parses() {
        let line = JsonFormatter.format(&output());
        let value: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(value["bpm"], 72.5);
        assert!(value["ts"].is_string());

        let mut empty = output();
        empty.trend_bpm = None;
        let value: serde_json::Value = serde_json::from_str(&JsonFormatter.format(&empty)).unwrap();
        assert!(value["trend_bpm"].is_null());
    }
}

use super::{BeatOutput, Formatter, iso8601_timestamp};

pub struct CsvFormatter;

impl Formatter for CsvFormatter {
    fn format(&self, output: &BeatOutput) -> String {
        let trend = output
            .trend_bpm
            .map_or(String::new(), |t| format!("{:.1}", t));
        format!(
            "{},{:.3},{:.1},{},{:.4},{:.2}",
            iso8601_timestamp(),
            output.timestamp_secs,
            output.bpm,
            trend,
            output.amplitude,
            output.confidence
        )
    }

    fn header(&self) -> Option<&'static str> {
        Some("ts,time_s,bpm,trend_bpm,amplitude,confidence")
    }
}

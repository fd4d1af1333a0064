use super::{BeatOutput, Formatter};

pub struct TextFormatter {
    verbose: bool,
}

impl TextFormatter {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }
}

impl Formatter for TextFormatter {
    fn format(&self, output: &BeatOutput) -> String {
        let trend = output
            .trend_bpm
            .map_or("-".to_string(), |t| format!("{:.1}", t));
        if self.verbose {
            format!(
                "t = {:>8.3} s  HR = {:>5.1} bpm (trend {}) [amp: {:.3}, conf: {:.2}]",
                output.timestamp_secs, output.bpm, trend, output.amplitude, output.confidence
            )
        } else {
            format!("HR = {:.1} bpm (trend {})", output.bpm, trend)
        }
    }
}

use serde::Serialize;

use super::{BeatOutput, Formatter, iso8601_timestamp};

pub struct JsonFormatter;

#[derive(Serialize)]
struct JsonLine<'a> {
    ts: String,
    #[serde(flatten)]
    beat: &'a BeatOutput,
}

impl Formatter for JsonFormatter {
    fn format(&self, output: &BeatOutput) -> String {
        let line = JsonLine {
            ts: iso8601_timestamp(),
            beat: output,
        };
        serde_json::to_string(&line).unwrap_or_else(|e| format!(r#"{{"error":"{}"}}"#, e))
    }
}

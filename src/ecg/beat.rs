/// A detected R-peak
///
/// Emitted once per accepted heartbeat and handed to every heartbeat
/// listener by value.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct BeatEvent {
    /// Sample position of the R-peak, counted from the last detector reset
    pub sample_index: u64,
    /// Instantaneous heart rate from the preceding RR interval
    pub bpm: f32,
    /// Detector envelope (squared, millivolt-scaled) when the beat was accepted
    pub amplitude: f64,
    /// Peak energy relative to the detection threshold; 1 is just detected,
    /// larger is more confident
    pub confidence: f64,
}

impl BeatEvent {
    /// Time of the R-peak in seconds since the last reset
    pub fn time_secs(&self, sample_rate: f32) -> f64 {
        self.sample_index as f64 / sample_rate as f64
    }
}

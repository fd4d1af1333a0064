use thiserror::Error;

#[derive(Error, Debug)]
pub enum EcgError {
    #[error("Audio device error: {0}")]
    AudioDevice(String),

    #[error("Audio stream error: {0}")]
    AudioStream(String),

    #[error("Filter design failed: {0}")]
    FilterDesign(String),

    #[error("Sample rate {rate:.1} Hz is below the usable minimum of {min:.1} Hz")]
    SampleRateTooLow { rate: f32, min: f32 },

    #[error("Trend timestamp {timestamp:.3}s is not after the latest buffered {latest:.3}s")]
    OutOfOrderTimestamp { timestamp: f64, latest: f64 },

    #[error("Non-finite trend sample: t={timestamp}, bpm={bpm}")]
    NonFiniteSample { timestamp: f64, bpm: f64 },

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, EcgError>;

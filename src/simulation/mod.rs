mod measure;
mod noise;
mod signal;

pub use measure::{BeatComparison, MatchedBeat, compare_beats, detect_beats};
pub use noise::{
    BaselineWanderConfig, GaussianNoiseConfig, ImpulseNoiseConfig, MainsHumConfig, NoiseConfig,
    apply_noise, signal_power,
};
pub use signal::{
    PQRST_TEMPLATE, QRST_TEMPLATE, Rhythm, SPIKE_TEMPLATE, WaveComponent, peaks_from_intervals,
    r_peak_schedule, spike_train, synthesize_ecg,
};

use approx::assert_abs_diff_eq;
use ecgpulse::config::MainsFrequency;
use ecgpulse::simulation::{QRST_TEMPLATE, peaks_from_intervals, synthesize_ecg};
use ecgpulse::{BeatEvent, EcgConfig, EcgProcessor};
use std::sync::{Arc, Mutex};

const FS: f32 = 250.0;
const RR_INTERVALS: [usize; 11] = [160, 170, 165, 175, 168, 162, 172, 166, 170, 164, 168];

/// Ten seconds with a beat during learning and twelve R-peaks after
/// detection arms. Only the twelve are returned.
fn ten_second_recording() -> (Vec<f32>, Vec<usize>) {
    let peaks = peaks_from_intervals(560, &RR_INTERVALS);
    let mut all = vec![340];
    all.extend(&peaks);
    let signal = synthesize_ecg(2500, FS, &all, &QRST_TEMPLATE, 1.0);
    (signal, peaks)
}

fn expected_bpm(rr_samples: usize) -> f32 {
    60.0 * FS / rr_samples as f32
}

#[test]
fn test_twelve_r_peaks_give_eleven_beats() {
    let (signal, _) = ten_second_recording();
    let mut processor = EcgProcessor::with_sample_rate(EcgConfig::default(), FS).unwrap();

    let heard = Arc::new(Mutex::new(Vec::<BeatEvent>::new()));
    let h = Arc::clone(&heard);
    processor.register_heartbeat_listener(move |beat| h.lock().unwrap().push(beat));

    let beats = processor.process_buffer(&signal);
    assert_eq!(beats.len(), 11);
    assert_eq!(*heard.lock().unwrap(), beats);

    for (beat, &rr) in beats.iter().zip(RR_INTERVALS.iter()) {
        let expected = expected_bpm(rr);
        assert!(
            (beat.bpm - expected).abs() <= 1.0,
            "beat at {} reported {} bpm, expected {}",
            beat.sample_index,
            beat.bpm,
            expected
        );
        assert!(beat.amplitude > 0.0);
        assert!(beat.confidence >= 1.0);
    }
}

#[test]
fn test_beats_follow_r_peaks_with_constant_lag() {
    let (signal, peaks) = ten_second_recording();
    let mut processor = EcgProcessor::with_sample_rate(EcgConfig::default(), FS).unwrap();
    let beats = processor.process_buffer(&signal);
    assert_eq!(beats.len(), 11);

    let lags: Vec<i64> = beats
        .iter()
        .zip(&peaks[1..])
        .map(|(beat, &peak)| beat.sample_index as i64 - peak as i64)
        .collect();

    assert!(lags.iter().all(|&lag| lag.abs() < 12), "lags {:?}", lags);
    let first = lags[0];
    assert!(lags.iter().all(|&lag| (lag - first).abs() <= 1), "lags {:?}", lags);

    // Successive beat spacing reproduces the RR intervals
    for (pair, &rr) in beats.windows(2).zip(&RR_INTERVALS[1..]) {
        let spacing = pair[1].sample_index - pair[0].sample_index;
        assert!((spacing as i64 - rr as i64).abs() <= 1);
    }
}

#[test]
fn test_trend_tracks_recording() {
    let (signal, _) = ten_second_recording();
    let mut processor = EcgProcessor::with_sample_rate(EcgConfig::default(), FS).unwrap();
    let beats = processor.process_buffer(&signal);
    assert_eq!(processor.trend().len(), beats.len());

    let min = beats.iter().map(|b| b.bpm as f64).fold(f64::MAX, f64::min);
    let max = beats.iter().map(|b| b.bpm as f64).fold(f64::MIN, f64::max);

    // At a knot the trend equals the reported rate
    let last = beats.last().unwrap();
    let at_last = processor.predict_trend(last.time_secs(FS)).unwrap();
    assert_abs_diff_eq!(at_last, last.bpm as f64, epsilon = 1e-3);

    let mid = beats[5].time_secs(FS) + 0.2;
    let predicted = processor.predict_trend(mid).unwrap();
    assert!(predicted > min - 5.0 && predicted < max + 5.0, "{}", predicted);

    // Beyond the margin the prediction is held
    let margin = EcgConfig::default().trend.margin_secs;
    let edge = processor.predict_trend(last.time_secs(FS) + margin).unwrap();
    let far = processor.predict_trend(last.time_secs(FS) + 60.0).unwrap();
    assert_abs_diff_eq!(edge, far, epsilon = 1e-9);
    assert!(far > min - 15.0 && far < max + 15.0, "{}", far);
}

#[test]
fn test_filtered_stream_has_no_mains() {
    let (clean, _) = ten_second_recording();
    let hum: Vec<f32> = (0..clean.len())
        .map(|i| 0.5e-3 * (2.0 * std::f32::consts::PI * 50.0 * i as f32 / FS).sin())
        .collect();
    let noisy: Vec<f32> = clean.iter().zip(&hum).map(|(c, h)| c + h).collect();

    let mut config = EcgConfig::default();
    config.filters.mains = MainsFrequency::Hz50;
    let mut processor = EcgProcessor::with_sample_rate(config, FS).unwrap();

    let filtered = Arc::new(Mutex::new(Vec::with_capacity(noisy.len())));
    let f = Arc::clone(&filtered);
    processor.register_filtered_sample_listener(move |v| f.lock().unwrap().push(v));

    let beats = processor.process_buffer(&noisy);
    assert_eq!(beats.len(), 11);

    let filtered = filtered.lock().unwrap();
    assert_eq!(filtered.len(), noisy.len());
    // Quiet stretch between the learning beat and the first armed QRS
    let residual = filtered[460..540]
        .iter()
        .map(|v| v.abs())
        .fold(0.0f32, f32::max);
    assert!(residual < 5e-5, "residual hum {}", residual);
}

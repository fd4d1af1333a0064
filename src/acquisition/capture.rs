use crate::config::AcquisitionConfig;
use crate::error::{EcgError, Result};
use audio_thread_priority::RtPriorityHandle;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::Sender;

/// Live input from a sound-card ECG front end
///
/// The device callback picks the ECG channel out of each interleaved
/// buffer, scales it to volts and sends it to the processing thread.
pub struct AudioCapture {
    stream: cpal::Stream,
    _rt_handle: Option<RtPriorityHandle>,
}

impl AudioCapture {
    /// Start capturing from the default input device
    pub fn new(config: &AcquisitionConfig, tx: Sender<Vec<f32>>) -> Result<Self> {
        if config.ecg_channel >= config.channels as usize {
            return Err(EcgError::Config(format!(
                "ECG channel {} out of range for {} channel input",
                config.ecg_channel, config.channels
            )));
        }

        let host = cpal::default_host();

        let device = host
            .default_input_device()
            .ok_or_else(|| EcgError::AudioDevice("No input device found".into()))?;

        match device.description() {
            Ok(desc) => log::info!("Input device: {:?}", desc),
            Err(_) => log::info!("Input device: Unknown"),
        }

        let stream_config = cpal::StreamConfig {
            channels: config.channels,
            sample_rate: config.sample_rate,
            buffer_size: cpal::BufferSize::Fixed(config.buffer_size as u32),
        };

        let acquisition = config.clone();
        let stream = device
            .build_input_stream(
                &stream_config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    if tx.send(acquisition.extract_ecg(data)).is_err() {
                        log::warn!("Sample receiver dropped");
                    }
                },
                |err| log::error!("Audio stream error: {}", err),
                None,
            )
            .map_err(|e| EcgError::AudioStream(format!("{}", e)))?;

        let rt_handle = audio_thread_priority::promote_current_thread_to_real_time(
            config.buffer_size as u32,
            config.sample_rate,
        );

        let rt_handle = match rt_handle {
            Ok(handle) => Some(handle),
            Err(e) => {
                log::warn!("Could not set real-time priority: {}", e);
                None
            }
        };

        stream
            .play()
            .map_err(|e| EcgError::AudioStream(format!("{}", e)))?;

        Ok(Self {
            stream,
            _rt_handle: rt_handle,
        })
    }
}

impl Drop for AudioCapture {
    fn drop(&mut self) {
        let _ = self.stream.pause();
    }
}

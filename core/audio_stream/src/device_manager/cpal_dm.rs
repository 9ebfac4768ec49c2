use std::fmt;

use super::AudioDeviceManager;
use crate::device_manager::{AudioDeviceError, AudioSource, AudioSourceBufferKind};
use cpal::{
    OutputCallbackInfo,
    traits::{DeviceTrait, HostTrait, StreamTrait},
};
use log::{error, info};

#[derive(Default)]
pub struct CpalAudioDeviceManager {
    stream: Option<cpal::Stream>,
}

impl fmt::Debug for CpalAudioDeviceManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CpalAudioDeviceManager")
            .field("running", &self.stream.is_some())
            .finish()
    }
}

impl CpalAudioDeviceManager {
    pub fn new() -> Self {
        Self { stream: None }
    }

    fn default_device() -> Result<(cpal::Device, cpal::SupportedStreamConfig), AudioDeviceError> {
        let host = cpal::default_host();

        let device = host
            .default_output_device()
            .ok_or(AudioDeviceError::DeviceNotFound)?;

        let config = device
            .default_output_config()
            .map_err(|e| AudioDeviceError::StreamBuildFailed(e.to_string()))?;

        Ok((device, config))
    }

    /// Frame rate of the default output device, used as the playbacks' mix rate.
    pub fn default_mix_rate() -> Result<f32, AudioDeviceError> {
        let (_, config) = Self::default_device()?;
        Ok(config.sample_rate().0 as f32)
    }

    pub fn is_running(&self) -> bool {
        self.stream.is_some()
    }

    fn build_output_stream<T, C>(
        device: &cpal::Device,
        config: cpal::SupportedStreamConfig,
        mut cb: C,
    ) -> Result<cpal::Stream, AudioDeviceError>
    where
        T: cpal::SizedSample,
        C: FnMut(&mut [T], usize) + Send + 'static,
    {
        let error_cb = move |err| {
            error!("output stream error: {err}");
        };

        let channels = usize::from(config.channels());
        let data_cb = move |data: &mut [T], _: &OutputCallbackInfo| {
            let frame_size = data.len() / channels;
            cb(data, frame_size);
        };

        let stream = device
            .build_output_stream(&config.into(), data_cb, error_cb, None)
            .map_err(|e| AudioDeviceError::StreamBuildFailed(e.to_string()))?;

        Ok(stream)
    }
}

impl AudioDeviceManager for CpalAudioDeviceManager {
    fn start_output_stream(
        &mut self,
        mut audio_source: Box<dyn AudioSource>,
    ) -> Result<(), AudioDeviceError> {
        let (device, config) = Self::default_device()?;
        info!(
            "opening output stream: {} Hz, {} channels, {}",
            config.sample_rate().0,
            config.channels(),
            config.sample_format()
        );

        let stream = match config.sample_format() {
            cpal::SampleFormat::F32 => {
                Self::build_output_stream(&device, config, move |data, frame_size| {
                    audio_source.fill_buffer(AudioSourceBufferKind::F32(data), frame_size);
                })?
            }
            cpal::SampleFormat::I16 => {
                Self::build_output_stream(&device, config, move |data, frame_size| {
                    audio_source.fill_buffer(AudioSourceBufferKind::I16(data), frame_size);
                })?
            }
            cpal::SampleFormat::U16 => {
                Self::build_output_stream(&device, config, move |data, frame_size| {
                    audio_source.fill_buffer(AudioSourceBufferKind::U16(data), frame_size);
                })?
            }
            format => {
                return Err(AudioDeviceError::UnsupportedSampleFormat(format.to_string()));
            }
        };

        stream
            .play()
            .map_err(|e| AudioDeviceError::StreamStartFailed(e.to_string()))?;

        self.stream = Some(stream);
        Ok(())
    }

    fn stop_output_stream(&mut self) {
        if self.stream.take().is_some() {
            info!("output stream closed");
        }
    }
}

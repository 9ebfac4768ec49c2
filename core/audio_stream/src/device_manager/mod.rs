use cpal::Sample as _;
use thiserror::Error;

use crate::{constants::OUTPUT_SCRATCH_FRAMES, frame::Frame, playback::Playback};

pub mod cpal_dm;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum AudioDeviceError {
    #[error("no default output device")]
    DeviceNotFound,
    #[error("failed to build output stream: {0}")]
    StreamBuildFailed(String),
    #[error("failed to start output stream: {0}")]
    StreamStartFailed(String),
    #[error("unsupported sample format '{0}'")]
    UnsupportedSampleFormat(String),
}

/// Interleaved device buffer in whatever sample format the device asked for.
#[derive(Debug)]
pub enum AudioSourceBufferKind<'a> {
    F32(&'a mut [f32]),
    I16(&'a mut [i16]),
    U16(&'a mut [u16]),
}

impl AudioSourceBufferKind<'_> {
    pub fn len(&self) -> usize {
        match self {
            Self::F32(data) => data.len(),
            Self::I16(data) => data.len(),
            Self::U16(data) => data.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Anything the output callback can pull `frame_size` frames from.
pub trait AudioSource: Send {
    fn fill_buffer(&mut self, buffer: AudioSourceBufferKind<'_>, frame_size: usize);
}

pub trait AudioDeviceManager {
    fn start_output_stream(
        &mut self,
        audio_source: Box<dyn AudioSource>,
    ) -> Result<(), AudioDeviceError>;

    fn stop_output_stream(&mut self);
}

/// Drives a single playback from the device callback.
///
/// The playback is mixed at `rate_scale = 1.0` into a scratch buffer allocated
/// up front, then written out interleaved. Stereo frames go to the first two
/// channels and any extra channels are silent; mono devices get the average.
#[derive(Debug)]
pub struct OutputBus {
    playback: Box<dyn Playback>,
    scratch: Vec<Frame>,
}

impl OutputBus {
    pub fn new(playback: Box<dyn Playback>) -> Self {
        Self {
            playback,
            scratch: vec![Frame::ZERO; OUTPUT_SCRATCH_FRAMES],
        }
    }

    pub fn playback(&self) -> &dyn Playback {
        self.playback.as_ref()
    }

    pub fn playback_mut(&mut self) -> &mut dyn Playback {
        self.playback.as_mut()
    }

    fn fill_samples<T>(&mut self, data: &mut [T], frame_size: usize)
    where
        T: cpal::FromSample<f32>,
    {
        if frame_size == 0 {
            return;
        }
        let channels = data.len() / frame_size;
        if channels == 0 {
            return;
        }

        let mut offset = 0;
        while offset < frame_size {
            let chunk = (frame_size - offset).min(self.scratch.len());
            let scratch = &mut self.scratch[..chunk];
            let mixed = self.playback.mix(scratch, 1.0);
            scratch[mixed..].fill(Frame::ZERO);

            let samples = &mut data[offset * channels..(offset + chunk) * channels];
            write_interleaved(samples, channels, scratch);
            offset += chunk;
        }
    }
}

fn write_interleaved<T>(samples: &mut [T], channels: usize, frames: &[Frame])
where
    T: cpal::FromSample<f32>,
{
    for (slots, frame) in samples.chunks_exact_mut(channels).zip(frames) {
        if let [mono] = slots {
            *mono = ((frame.left + frame.right) * 0.5).to_sample::<T>();
            continue;
        }
        for (channel, slot) in slots.iter_mut().enumerate() {
            let value = match channel {
                0 => frame.left,
                1 => frame.right,
                _ => 0.0,
            };
            *slot = value.to_sample::<T>();
        }
    }
}

impl AudioSource for OutputBus {
    fn fill_buffer(&mut self, buffer: AudioSourceBufferKind<'_>, frame_size: usize) {
        match buffer {
            AudioSourceBufferKind::F32(data) => self.fill_samples(data, frame_size),
            AudioSourceBufferKind::I16(data) => self.fill_samples(data, frame_size),
            AudioSourceBufferKind::U16(data) => self.fill_samples(data, frame_size),
        }
    }
}

#[cfg(test)]
mod output_bus_tests {
    use super::*;
    use crate::{
        constants::AUDIO_SAMPLE_EPSILON,
        stream::{AudioStream, sample::SampleStream, tone::ToneStream},
    };

    fn started(stream: &dyn AudioStream) -> OutputBus {
        let mut playback = stream.instance_playback(44_100.0);
        playback.start(0.0);
        OutputBus::new(playback)
    }

    #[test]
    fn stereo_frames_are_interleaved() {
        let stream = SampleStream::new(vec![Frame::new(0.25, -0.5); 2000], 44_100.0);
        let mut bus = started(&stream);

        let mut data = vec![0.0f32; 64 * 2];
        bus.fill_buffer(AudioSourceBufferKind::F32(&mut data), 64);

        // two frames of interpolation lag
        for pair in data[4..].chunks_exact(2) {
            assert!((pair[0] - 0.25).abs() < AUDIO_SAMPLE_EPSILON);
            assert!((pair[1] + 0.5).abs() < AUDIO_SAMPLE_EPSILON);
        }
    }

    #[test]
    fn mono_devices_get_the_average_and_extra_channels_are_silent() {
        let stream = SampleStream::new(vec![Frame::new(0.25, 0.75); 2000], 44_100.0);

        let mut mono = vec![0.0f32; 32];
        started(&stream).fill_buffer(AudioSourceBufferKind::F32(&mut mono), 32);
        assert!((mono[10] - 0.5).abs() < AUDIO_SAMPLE_EPSILON);

        let mut quad = vec![1.0f32; 32 * 4];
        started(&stream).fill_buffer(AudioSourceBufferKind::F32(&mut quad), 32);
        for slots in quad[8..].chunks_exact(4) {
            assert!((slots[0] - 0.25).abs() < AUDIO_SAMPLE_EPSILON);
            assert!((slots[1] - 0.75).abs() < AUDIO_SAMPLE_EPSILON);
            assert_eq!(slots[2], 0.0);
            assert_eq!(slots[3], 0.0);
        }
    }

    #[test]
    fn requests_larger_than_the_scratch_buffer_are_chunked() {
        let tone = ToneStream::new(441.0, 44_100.0);
        let frames = OUTPUT_SCRATCH_FRAMES * 3 + 17;

        let mut whole = vec![0.0f32; frames * 2];
        started(&tone).fill_buffer(AudioSourceBufferKind::F32(&mut whole), frames);

        let mut direct = tone.instance_playback(44_100.0);
        direct.start(0.0);
        let mut expected = vec![Frame::ZERO; frames];
        assert_eq!(direct.mix(&mut expected, 1.0), frames);

        for (pair, frame) in whole.chunks_exact(2).zip(&expected) {
            assert_eq!(pair[0], frame.left);
            assert_eq!(pair[1], frame.right);
        }
    }

    #[test]
    fn integer_formats_are_converted() {
        let stream = SampleStream::new(vec![Frame::ZERO; 2000], 44_100.0);

        let mut signed = vec![7i16; 16];
        started(&stream).fill_buffer(AudioSourceBufferKind::I16(&mut signed), 8);
        assert!(signed.iter().all(|&sample| sample == 0));

        let mut unsigned = vec![7u16; 16];
        started(&stream).fill_buffer(AudioSourceBufferKind::U16(&mut unsigned), 8);
        assert!(unsigned.iter().all(|&sample| sample == 32_768));
    }

    #[test]
    fn exhausted_or_idle_playback_writes_silence() {
        let stream = SampleStream::new(vec![Frame::mono(1.0); 10], 44_100.0);
        let mut bus = started(&stream);
        let mut data = vec![1.0f32; 128];
        bus.fill_buffer(AudioSourceBufferKind::F32(&mut data), 64);
        assert!(data[40..].iter().all(|&sample| sample == 0.0));

        let mut bus = OutputBus::new(stream.instance_playback(44_100.0));
        bus.playback_mut().stop();
        let mut data = vec![1.0f32; 16];
        bus.fill_buffer(AudioSourceBufferKind::F32(&mut data), 8);
        assert!(data.iter().all(|&sample| sample == 0.0));
        assert!(!bus.playback().is_playing());
    }
}

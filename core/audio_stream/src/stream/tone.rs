use std::f32::consts::PI;

use crate::{
    frame::Frame,
    playback::{
        Playback,
        resampled::{NativeProducer, ResampledPlayback},
    },
    stream::AudioStream,
};

/// Endless sine tone rendered at its own sampling rate.
#[derive(Debug, Clone, Copy)]
pub struct ToneStream {
    frequency: f32,
    sample_rate: f32,
    amplitude: f32,
}

impl ToneStream {
    pub fn new(frequency: f32, sample_rate: f32) -> Self {
        Self {
            frequency,
            sample_rate,
            amplitude: 1.0,
        }
    }

    #[must_use]
    pub fn with_amplitude(mut self, amplitude: f32) -> Self {
        self.amplitude = amplitude;
        self
    }

    pub fn frequency(&self) -> f32 {
        self.frequency
    }
}

impl AudioStream for ToneStream {
    fn instance_playback(&self, mix_rate: f32) -> Box<dyn Playback> {
        let producer = ToneProducer {
            tone: *self,
            phase: 0.0,
            frames_rendered: 0,
            active: false,
        };
        Box::new(ResampledPlayback::new(producer, mix_rate))
    }

    fn stream_name(&self) -> String {
        format!("tone {} Hz", self.frequency)
    }
}

#[derive(Debug)]
pub struct ToneProducer {
    tone: ToneStream,
    phase: f32,
    frames_rendered: u64,
    active: bool,
}

impl ToneProducer {
    fn set_position(&mut self, time: f32) {
        let time = time.max(0.0);
        self.frames_rendered = (time * self.tone.sample_rate) as u64;
        self.phase = (2.0 * PI * self.tone.frequency * time).rem_euclid(2.0 * PI);
    }
}

impl NativeProducer for ToneProducer {
    fn produce_native(&mut self, buffer: &mut [Frame]) -> usize {
        let phase_increment = 2.0 * PI * self.tone.frequency / self.tone.sample_rate;

        for frame in buffer.iter_mut() {
            *frame = Frame::mono(self.phase.sin() * self.tone.amplitude);
            self.phase += phase_increment;
            if self.phase >= 2.0 * PI {
                self.phase -= 2.0 * PI;
            }
        }
        self.frames_rendered += buffer.len() as u64;
        buffer.len()
    }

    fn native_sampling_rate(&self) -> f32 {
        self.tone.sample_rate
    }

    fn start(&mut self, from_position: f32) {
        self.set_position(from_position);
        self.active = true;
    }

    fn stop(&mut self) {
        self.active = false;
    }

    fn is_playing(&self) -> bool {
        self.active
    }

    fn playback_position(&self) -> f32 {
        self.frames_rendered as f32 / self.tone.sample_rate
    }

    fn seek(&mut self, time: f32) {
        self.set_position(time);
    }
}

use std::sync::Arc;

use crate::{
    frame::Frame,
    playback::{Playback, resampled::{NativeProducer, ResampledPlayback}},
    stream::AudioStream,
};

/// `SampleStream` holds in-memory stereo frames recorded at `sample_rate`.
///
/// Frames are shared between every playback created from the stream. When
/// `looping` is set a playback wraps to the first frame instead of ending.
///
/// # Example
/// ```
/// use audio_stream::{frame::Frame, stream::{AudioStream, sample::SampleStream}};
///
/// let stream = SampleStream::new(vec![Frame::mono(0.5); 22_050], 22_050.0);
/// assert_eq!(stream.length(), 1.0);
/// let mut playback = stream.instance_playback(44_100.0);
/// playback.start(0.0);
/// ```
#[derive(Debug, Clone)]
pub struct SampleStream {
    name: String,
    frames: Arc<[Frame]>,
    sample_rate: f32,
    looping: bool,
}

impl SampleStream {
    pub fn new(frames: impl Into<Arc<[Frame]>>, sample_rate: f32) -> Self {
        Self {
            name: "samples".to_owned(),
            frames: frames.into(),
            sample_rate,
            looping: false,
        }
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    #[must_use]
    pub fn looping(mut self, looping: bool) -> Self {
        self.looping = looping;
        self
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    pub fn is_looping(&self) -> bool {
        self.looping
    }
}

impl AudioStream for SampleStream {
    fn instance_playback(&self, mix_rate: f32) -> Box<dyn Playback> {
        let producer = SampleProducer {
            frames: Arc::clone(&self.frames),
            sample_rate: self.sample_rate,
            looping: self.looping,
            position: 0,
            loops: 0,
            active: false,
        };
        Box::new(ResampledPlayback::new(producer, mix_rate))
    }

    fn stream_name(&self) -> String {
        self.name.clone()
    }

    fn length(&self) -> f32 {
        if self.sample_rate > 0.0 {
            self.frames.len() as f32 / self.sample_rate
        } else {
            0.0
        }
    }
}

/// Native-rate reader over a [`SampleStream`]'s frames.
#[derive(Debug)]
pub struct SampleProducer {
    frames: Arc<[Frame]>,
    sample_rate: f32,
    looping: bool,
    /// Current read position (frame index)
    position: usize,
    loops: i32,
    active: bool,
}

impl SampleProducer {
    fn frame_at(&self, time: f32) -> usize {
        let frame = (time.max(0.0) * self.sample_rate) as usize;
        frame.min(self.frames.len())
    }
}

impl NativeProducer for SampleProducer {
    fn produce_native(&mut self, buffer: &mut [Frame]) -> usize {
        let mut written = 0;
        while written < buffer.len() {
            let end = (self.position + buffer.len() - written).min(self.frames.len());
            let count = end - self.position;
            buffer[written..written + count].copy_from_slice(&self.frames[self.position..end]);
            written += count;
            self.position = end;

            if self.position < self.frames.len() {
                continue;
            }
            if self.looping && !self.frames.is_empty() {
                self.position = 0;
                self.loops += 1;
            } else {
                self.active = false;
                break;
            }
        }
        written
    }

    fn native_sampling_rate(&self) -> f32 {
        self.sample_rate
    }

    fn start(&mut self, from_position: f32) {
        self.position = self.frame_at(from_position);
        self.loops = 0;
        self.active = true;
    }

    fn stop(&mut self) {
        self.active = false;
    }

    fn is_playing(&self) -> bool {
        self.active
    }

    fn loop_count(&self) -> i32 {
        self.loops
    }

    fn playback_position(&self) -> f32 {
        if self.sample_rate > 0.0 {
            self.position as f32 / self.sample_rate
        } else {
            0.0
        }
    }

    fn seek(&mut self, time: f32) {
        self.position = self.frame_at(time);
    }
}

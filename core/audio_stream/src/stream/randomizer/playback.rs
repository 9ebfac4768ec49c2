use std::sync::Arc;

use log::debug;

use crate::{
    frame::Frame,
    playback::Playback,
    registry::PlaybackId,
    stream::randomizer::{Draw, RandomizerShared},
};

#[derive(Debug)]
enum PlaybackState {
    Idle,
    Playing {
        /// `None` when the pool had nothing to play.
        playing: Option<Box<dyn Playback>>,
        pitch_scale: f32,
        volume_scale: f32,
    },
}

/// Playback handed out by [`AudioStreamRandomizer`](super::AudioStreamRandomizer).
///
/// Every `start` draws a new pool entry plus a pitch and volume offset, then
/// owns the selected stream's playback until the next `start` or `stop`.
#[derive(Debug)]
pub struct RandomizerPlayback {
    id: PlaybackId,
    randomizer: Arc<RandomizerShared>,
    mix_rate: f32,
    selected_index: Option<usize>,
    state: PlaybackState,
}

impl RandomizerPlayback {
    pub(crate) fn new(randomizer: Arc<RandomizerShared>, mix_rate: f32) -> Self {
        Self {
            id: randomizer.playbacks().register(),
            randomizer,
            mix_rate,
            selected_index: None,
            state: PlaybackState::Idle,
        }
    }

    pub fn id(&self) -> PlaybackId {
        self.id
    }

    /// Pool index picked by the last `start`.
    pub fn selected_index(&self) -> Option<usize> {
        self.selected_index
    }

    pub fn pitch_scale(&self) -> Option<f32> {
        match self.state {
            PlaybackState::Playing { pitch_scale, .. } => Some(pitch_scale),
            PlaybackState::Idle => None,
        }
    }

    pub fn volume_scale(&self) -> Option<f32> {
        match self.state {
            PlaybackState::Playing { volume_scale, .. } => Some(volume_scale),
            PlaybackState::Idle => None,
        }
    }

    fn active(&self) -> Option<&dyn Playback> {
        match &self.state {
            PlaybackState::Playing {
                playing: Some(playing),
                ..
            } => Some(playing.as_ref()),
            _ => None,
        }
    }

    fn active_mut(&mut self) -> Option<&mut Box<dyn Playback>> {
        match &mut self.state {
            PlaybackState::Playing {
                playing: Some(playing),
                ..
            } => Some(playing),
            _ => None,
        }
    }
}

impl Playback for RandomizerPlayback {
    fn start(&mut self, from_position: f32) {
        let Draw {
            selection,
            pitch_scale,
            volume_scale,
        } = self.randomizer.draw();

        self.selected_index = selection.as_ref().map(|selection| selection.index);
        let playing = selection.map(|selection| {
            let mut playing = selection.stream.instance_playback(self.mix_rate);
            playing.start(from_position);
            playing
        });
        debug!(
            "randomizer playback {:?} started index {:?} (pitch {pitch_scale}, volume {volume_scale})",
            self.id, self.selected_index
        );

        self.state = PlaybackState::Playing {
            playing,
            pitch_scale,
            volume_scale,
        };
    }

    fn stop(&mut self) {
        if let Some(playing) = self.active_mut() {
            playing.stop();
        }
        self.state = PlaybackState::Idle;
    }

    fn is_playing(&self) -> bool {
        self.active().is_some_and(|playing| playing.is_playing())
    }

    fn loop_count(&self) -> i32 {
        self.active().map_or(0, |playing| playing.loop_count())
    }

    fn playback_position(&self) -> f32 {
        self.active()
            .map_or(0.0, |playing| playing.playback_position())
    }

    fn seek(&mut self, time: f32) {
        if let Some(playing) = self.active_mut() {
            playing.seek(time);
        }
    }

    fn mix(&mut self, buffer: &mut [Frame], rate_scale: f32) -> usize {
        match &mut self.state {
            PlaybackState::Idle => 0,
            PlaybackState::Playing { playing: None, .. } => {
                buffer.fill(Frame::ZERO);
                buffer.len()
            }
            PlaybackState::Playing {
                playing: Some(playing),
                pitch_scale,
                volume_scale,
            } => {
                let mixed = playing.mix(buffer, rate_scale * *pitch_scale);
                for frame in &mut buffer[..mixed] {
                    *frame *= *volume_scale;
                }
                mixed
            }
        }
    }
}

impl Drop for RandomizerPlayback {
    fn drop(&mut self) {
        self.randomizer.playbacks().deregister(self.id);
    }
}

#[cfg(test)]
mod randomizer_playback_tests {
    use super::*;
    use crate::{
        constants::AUDIO_SAMPLE_EPSILON,
        stream::{
            AudioStream, StreamHandle, randomizer::AudioStreamRandomizer, sample::SampleStream,
        },
    };

    fn constant_stream(len: usize) -> StreamHandle {
        Arc::new(SampleStream::new(vec![Frame::mono(0.5); len], 44_100.0))
    }

    fn steady_randomizer(stream: StreamHandle) -> AudioStreamRandomizer {
        let randomizer = AudioStreamRandomizer::with_seed(42);
        randomizer.set_random_pitch(1.0);
        randomizer.set_random_volume_offset_db(0.0);
        randomizer.push_stream(stream, 1.0).unwrap();
        randomizer
    }

    fn playback_of(randomizer: &AudioStreamRandomizer) -> RandomizerPlayback {
        RandomizerPlayback::new(Arc::clone(&randomizer.shared), 44_100.0)
    }

    #[test]
    fn idle_playback_is_inert() {
        let randomizer = steady_randomizer(constant_stream(100));
        let mut playback = playback_of(&randomizer);
        playback.seek(1.0);

        let mut out = vec![Frame::mono(0.25); 16];
        assert!(!playback.is_playing());
        assert_eq!(playback.loop_count(), 0);
        assert_eq!(playback.playback_position(), 0.0);
        assert_eq!(playback.mix(&mut out, 1.0), 0);
        assert_eq!(playback.selected_index(), None);
        assert_eq!(playback.pitch_scale(), None);
    }

    #[test]
    fn steady_jitter_passes_the_inner_playback_through() {
        let stream = constant_stream(1000);
        let randomizer = steady_randomizer(Arc::clone(&stream));
        let mut playback = playback_of(&randomizer);
        playback.start(0.0);

        let mut direct = stream.instance_playback(44_100.0);
        direct.start(0.0);

        let mut expected = vec![Frame::ZERO; 600];
        let mut out = vec![Frame::ZERO; 600];
        assert_eq!(direct.mix(&mut expected, 1.0), playback.mix(&mut out, 1.0));
        assert_eq!(out, expected);
        assert_eq!(playback.selected_index(), Some(0));
    }

    #[test]
    fn volume_jitter_scales_every_written_frame() {
        let randomizer = steady_randomizer(constant_stream(4000));
        randomizer.set_random_volume_offset_db(6.0);
        let mut playback = playback_of(&randomizer);
        playback.start(0.0);

        let volume = playback.volume_scale().unwrap();
        assert!((0.5..=2.0).contains(&volume));

        let mut out = vec![Frame::ZERO; 256];
        assert_eq!(playback.mix(&mut out, 1.0), 256);
        assert!((out[100].left - 0.5 * volume).abs() < AUDIO_SAMPLE_EPSILON);
    }

    #[test]
    fn pitch_jitter_stays_in_bounds_and_scales_the_rate() {
        let randomizer = steady_randomizer(constant_stream(1000));
        randomizer.set_random_pitch(2.0);
        let mut playback = playback_of(&randomizer);

        for _ in 0..50 {
            playback.start(0.0);
            let pitch = playback.pitch_scale().unwrap();
            assert!((0.5..=2.0).contains(&pitch));
        }

        // 1000 source frames at rate `pitch` run out after about 1000 / pitch frames.
        playback.start(0.0);
        let pitch = playback.pitch_scale().unwrap();
        let mut out = vec![Frame::ZERO; 4000];
        let written = playback.mix(&mut out, 1.0);
        let expected = 1000.0 / pitch;
        assert!((written as f32 - expected).abs() <= 2.0, "{written} vs {expected}");
    }

    #[test]
    fn empty_pool_plays_silence() {
        let randomizer = AudioStreamRandomizer::with_seed(1);
        let mut playback = playback_of(&randomizer);
        playback.start(0.0);

        let mut out = vec![Frame::mono(1.0); 32];
        assert_eq!(playback.mix(&mut out, 1.0), 32);
        assert!(out.iter().all(|frame| frame.is_silent()));
        assert!(!playback.is_playing());
    }

    #[test]
    fn forwarding_reaches_the_selected_playback() {
        let looping: StreamHandle = Arc::new(
            SampleStream::new(vec![Frame::mono(0.5); 100], 44_100.0).looping(true),
        );
        let randomizer = steady_randomizer(looping);
        let mut playback = playback_of(&randomizer);
        playback.start(0.0);

        let mut out = vec![Frame::ZERO; 1024];
        playback.mix(&mut out, 1.0);
        assert!(playback.is_playing());
        assert!(playback.loop_count() > 0);

        playback.seek(50.0 / 44_100.0);
        assert!((playback.playback_position() - 50.0 / 44_100.0).abs() < 1e-6);
    }

    #[test]
    fn stop_returns_to_idle() {
        let randomizer = steady_randomizer(constant_stream(1000));
        let mut playback = playback_of(&randomizer);
        playback.start(0.0);
        assert!(playback.is_playing());

        playback.stop();
        let mut out = vec![Frame::ZERO; 8];
        assert!(!playback.is_playing());
        assert_eq!(playback.mix(&mut out, 1.0), 0);
        assert_eq!(playback.volume_scale(), None);
    }

    #[test]
    fn each_start_draws_a_new_selection() {
        let randomizer = steady_randomizer(constant_stream(10));
        randomizer.push_stream(constant_stream(10), 1.0).unwrap();
        let mut playback = playback_of(&randomizer);

        let mut picked = Vec::new();
        for _ in 0..20 {
            playback.start(0.0);
            picked.push(playback.selected_index().unwrap());
        }
        for pair in picked.windows(2) {
            assert_ne!(pair[0], pair[1]);
        }
    }
}

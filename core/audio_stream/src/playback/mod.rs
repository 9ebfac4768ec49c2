use std::fmt;

use crate::frame::Frame;

pub mod resampled;

/// A sounding instance of a stream.
///
/// `mix` is called from the audio thread and must not block or allocate.
/// Everything else is called from control threads; the host serialises all
/// calls on one instance. Every method has an inert default so variants only
/// override what they support.
pub trait Playback
where
    Self: Send + fmt::Debug,
{
    fn start(&mut self, _from_position: f32) {}

    fn stop(&mut self) {}

    fn is_playing(&self) -> bool {
        false
    }

    /// Number of times the playback wrapped around its loop.
    fn loop_count(&self) -> i32 {
        0
    }

    /// Position in seconds.
    fn playback_position(&self) -> f32 {
        0.0
    }

    fn seek(&mut self, _time: f32) {}

    /// Writes up to `buffer.len()` frames and returns how many were produced.
    /// A short count means the playback ran out; the remaining slots are silence.
    fn mix(&mut self, _buffer: &mut [Frame], _rate_scale: f32) -> usize {
        0
    }
}

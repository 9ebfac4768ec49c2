use std::{fmt, sync::Arc};

use crate::playback::Playback;

pub mod capture;
pub mod randomizer;
pub mod sample;
pub mod tone;

/// Shared handle to a stream resource.
pub type StreamHandle = Arc<dyn AudioStream>;

/// A stream resource that can be instantiated into independent playbacks.
pub trait AudioStream: Send + Sync + fmt::Debug {
    /// Creates a new, idle playback that renders at `mix_rate`.
    fn instance_playback(&self, mix_rate: f32) -> Box<dyn Playback>;

    fn stream_name(&self) -> String;

    /// Length in seconds, `0.0` when unknown or endless.
    fn length(&self) -> f32 {
        0.0
    }

    /// Whether only one playback of this stream should sound at a time.
    fn is_monophonic(&self) -> bool {
        false
    }
}

/// Identity comparison for stream handles.
pub fn same_stream(a: &StreamHandle, b: &StreamHandle) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

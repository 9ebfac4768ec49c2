use std::{
    fmt,
    sync::{Arc, Mutex, PoisonError},
};

use log::{debug, warn};
use rtrb::{Consumer, Producer, RingBuffer};

use crate::{
    frame::Frame,
    playback::{
        Playback,
        resampled::{NativeProducer, ResampledPlayback},
    },
    registry::{PlaybackId, PlaybackRegistry},
    stream::AudioStream,
};

/// Live input pushed by a capture device through a lock-free ring.
///
/// The capture side keeps the [`Producer`] returned by [`CaptureStream::new`]
/// and pushes frames at `sample_rate`. Only one playback reads the ring at a
/// time: it claims the consumer on `start` and hands it back on `stop` or drop.
#[derive(Debug, Clone)]
pub struct CaptureStream {
    shared: Arc<CaptureShared>,
}

struct CaptureShared {
    consumer: Mutex<Option<Consumer<Frame>>>,
    sample_rate: f32,
    playbacks: PlaybackRegistry,
}

impl fmt::Debug for CaptureShared {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CaptureShared")
            .field("sample_rate", &self.sample_rate)
            .field("playbacks", &self.playbacks)
            .finish_non_exhaustive()
    }
}

impl CaptureShared {
    fn claim(&self) -> Option<Consumer<Frame>> {
        self.consumer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    fn release(&self, consumer: Consumer<Frame>) {
        *self.consumer.lock().unwrap_or_else(PoisonError::into_inner) = Some(consumer);
    }
}

impl CaptureStream {
    pub fn new(sample_rate: f32, capacity: usize) -> (Self, Producer<Frame>) {
        let (producer, consumer) = RingBuffer::new(capacity);
        let stream = Self {
            shared: Arc::new(CaptureShared {
                consumer: Mutex::new(Some(consumer)),
                sample_rate,
                playbacks: PlaybackRegistry::new(),
            }),
        };
        (stream, producer)
    }

    pub fn active_playbacks(&self) -> usize {
        self.shared.playbacks.len()
    }
}

impl AudioStream for CaptureStream {
    fn instance_playback(&self, mix_rate: f32) -> Box<dyn Playback> {
        let producer = CaptureProducer {
            id: self.shared.playbacks.register(),
            shared: Arc::clone(&self.shared),
            consumer: None,
            active: false,
        };
        Box::new(ResampledPlayback::new(producer, mix_rate))
    }

    fn stream_name(&self) -> String {
        "capture".to_owned()
    }

    fn is_monophonic(&self) -> bool {
        true
    }
}

pub struct CaptureProducer {
    id: PlaybackId,
    shared: Arc<CaptureShared>,
    consumer: Option<Consumer<Frame>>,
    active: bool,
}

impl fmt::Debug for CaptureProducer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CaptureProducer")
            .field("id", &self.id)
            .field("claimed", &self.consumer.is_some())
            .field("active", &self.active)
            .finish_non_exhaustive()
    }
}

impl CaptureProducer {
    fn release(&mut self) {
        if let Some(consumer) = self.consumer.take() {
            self.shared.release(consumer);
        }
    }
}

impl NativeProducer for CaptureProducer {
    /// Reads what the device has captured so far; an underrun is padded with
    /// silence so the capture never reports an end.
    fn produce_native(&mut self, buffer: &mut [Frame]) -> usize {
        let mut read = 0;
        if let Some(consumer) = self.consumer.as_mut() {
            let available = consumer.slots().min(buffer.len());
            if let Ok(chunk) = consumer.read_chunk(available) {
                let (first, second) = chunk.as_slices();
                buffer[..first.len()].copy_from_slice(first);
                buffer[first.len()..available].copy_from_slice(second);
                chunk.commit_all();
                read = available;
            }
        }
        buffer[read..].fill(Frame::ZERO);
        buffer.len()
    }

    fn native_sampling_rate(&self) -> f32 {
        self.shared.sample_rate
    }

    fn start(&mut self, _from_position: f32) {
        if self.consumer.is_none() {
            self.consumer = self.shared.claim();
        }

        match self.consumer.as_mut() {
            Some(consumer) => {
                // Drop input captured while nobody was listening.
                let stale = consumer.slots();
                if let Ok(chunk) = consumer.read_chunk(stale) {
                    chunk.commit_all();
                }
                debug!("capture playback {:?} started", self.id);
                self.active = true;
            }
            None => {
                warn!("capture input is already in use, playback {:?} stays silent", self.id);
                self.active = false;
            }
        }
    }

    fn stop(&mut self) {
        self.active = false;
        self.release();
    }

    fn is_playing(&self) -> bool {
        self.active
    }
}

impl Drop for CaptureProducer {
    fn drop(&mut self) {
        self.release();
        self.shared.playbacks.deregister(self.id);
    }
}

use std::fmt;

use log::warn;

use crate::{
    constants::{CUBIC_INTERP_HISTORY, DEFAULT_MIX_RATE, FP_BITS, FP_LEN, FP_MASK, INTERNAL_BUFFER_LEN},
    frame::Frame,
    playback::Playback,
};

const BUFFER_LEN: usize = INTERNAL_BUFFER_LEN + CUBIC_INTERP_HISTORY;
/// At most one window is consumed per output frame.
const MAX_PHASE_INCREMENT: u64 = (INTERNAL_BUFFER_LEN as u64) << FP_BITS;

/// A source that renders frames only at its own sampling rate.
///
/// [`ResampledPlayback`] asks for one window of [`INTERNAL_BUFFER_LEN`] frames at a
/// time. Returning fewer frames than requested marks the end of the data. The
/// lifecycle methods mirror [`Playback`] and are forwarded to the producer.
pub trait NativeProducer
where
    Self: Send + fmt::Debug,
{
    fn produce_native(&mut self, buffer: &mut [Frame]) -> usize;

    fn native_sampling_rate(&self) -> f32;

    fn start(&mut self, _from_position: f32) {}

    fn stop(&mut self) {}

    fn is_playing(&self) -> bool {
        false
    }

    fn loop_count(&self) -> i32 {
        0
    }

    fn playback_position(&self) -> f32 {
        0.0
    }

    fn seek(&mut self, _time: f32) {}
}

impl<P> NativeProducer for Box<P>
where
    P: NativeProducer + ?Sized,
{
    fn produce_native(&mut self, buffer: &mut [Frame]) -> usize {
        (**self).produce_native(buffer)
    }

    fn native_sampling_rate(&self) -> f32 {
        (**self).native_sampling_rate()
    }

    fn start(&mut self, from_position: f32) {
        (**self).start(from_position);
    }

    fn stop(&mut self) {
        (**self).stop();
    }

    fn is_playing(&self) -> bool {
        (**self).is_playing()
    }

    fn loop_count(&self) -> i32 {
        (**self).loop_count()
    }

    fn playback_position(&self) -> f32 {
        (**self).playback_position()
    }

    fn seek(&mut self, time: f32) {
        (**self).seek(time);
    }
}

/// Plays a [`NativeProducer`] at the mix rate.
///
/// The phase is a 16.16 fixed-point position inside the current window. Output
/// frames are cubic-interpolated from four buffered frames, and the last
/// [`CUBIC_INTERP_HISTORY`] frames of every window are carried to the head of
/// the buffer before the next refill, so a refill never breaks the curve.
/// The output lags the source by two frames.
pub struct ResampledPlayback<P> {
    producer: P,
    mix_rate: f32,
    internal_buffer: [Frame; BUFFER_LEN],
    /// Window slot of the first silent frame after a short refill.
    internal_buffer_end: Option<usize>,
    mix_offset: u64,
    primed: bool,
}

impl<P> ResampledPlayback<P>
where
    P: NativeProducer,
{
    pub fn new(producer: P, mix_rate: f32) -> Self {
        let mix_rate = if mix_rate.is_finite() && mix_rate > 0.0 {
            mix_rate
        } else {
            warn!("invalid mix rate {mix_rate}, falling back to {DEFAULT_MIX_RATE}");
            DEFAULT_MIX_RATE
        };

        Self {
            producer,
            mix_rate,
            internal_buffer: [Frame::ZERO; BUFFER_LEN],
            internal_buffer_end: None,
            mix_offset: 0,
            primed: false,
        }
    }

    pub fn producer(&self) -> &P {
        &self.producer
    }

    pub fn producer_mut(&mut self) -> &mut P {
        &mut self.producer
    }

    pub fn mix_rate(&self) -> f32 {
        self.mix_rate
    }

    /// Clears the interpolation history and loads the first window.
    fn begin_resample(&mut self) {
        self.internal_buffer[..CUBIC_INTERP_HISTORY].fill(Frame::ZERO);
        self.refill_window();
        self.mix_offset = 0;
        self.primed = true;
    }

    fn refill_window(&mut self) {
        let window = &mut self.internal_buffer[CUBIC_INTERP_HISTORY..];
        if self.producer.is_playing() {
            let mixed = self
                .producer
                .produce_native(window)
                .min(INTERNAL_BUFFER_LEN);
            window[mixed..].fill(Frame::ZERO);
            self.internal_buffer_end = (mixed < INTERNAL_BUFFER_LEN).then_some(mixed);
        } else {
            window.fill(Frame::ZERO);
            self.internal_buffer_end = Some(0);
        }
    }

    fn phase_increment(&self, rate_scale: f32) -> u64 {
        let ratio = f64::from(self.producer.native_sampling_rate()) * f64::from(rate_scale)
            / f64::from(self.mix_rate);
        ((ratio * FP_LEN as f64).round().max(0.0) as u64).min(MAX_PHASE_INCREMENT)
    }

    fn is_exhausted_at(&self, idx: usize) -> bool {
        self.internal_buffer_end
            .is_some_and(|end| idx >= CUBIC_INTERP_HISTORY + end)
    }
}

impl<P> Playback for ResampledPlayback<P>
where
    P: NativeProducer,
{
    fn start(&mut self, from_position: f32) {
        self.producer.start(from_position);
        self.begin_resample();
    }

    fn stop(&mut self) {
        self.producer.stop();
    }

    fn is_playing(&self) -> bool {
        self.producer.is_playing()
    }

    fn loop_count(&self) -> i32 {
        self.producer.loop_count()
    }

    fn playback_position(&self) -> f32 {
        self.producer.playback_position()
    }

    fn seek(&mut self, time: f32) {
        self.producer.seek(time);
    }

    fn mix(&mut self, buffer: &mut [Frame], rate_scale: f32) -> usize {
        if !rate_scale.is_finite() || rate_scale <= 0.0 {
            return 0;
        }
        if !self.primed {
            self.begin_resample();
        }

        let increment = self.phase_increment(rate_scale);
        let mut written = 0;

        while written < buffer.len() {
            let idx = CUBIC_INTERP_HISTORY + (self.mix_offset >> FP_BITS) as usize;
            if self.is_exhausted_at(idx) {
                break;
            }

            let mu = (self.mix_offset & FP_MASK) as f32 / FP_LEN as f32;
            buffer[written] = cubic_interpolate(
                self.internal_buffer[idx - 3],
                self.internal_buffer[idx - 2],
                self.internal_buffer[idx - 1],
                self.internal_buffer[idx],
                mu,
            );
            written += 1;

            self.mix_offset += increment;
            while (self.mix_offset >> FP_BITS) as usize >= INTERNAL_BUFFER_LEN {
                self.internal_buffer.copy_within(INTERNAL_BUFFER_LEN.., 0);
                self.refill_window();
                self.mix_offset -= (INTERNAL_BUFFER_LEN as u64) << FP_BITS;
            }
        }

        buffer[written..].fill(Frame::ZERO);
        written
    }
}

impl<P> fmt::Debug for ResampledPlayback<P>
where
    P: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResampledPlayback")
            .field("producer", &self.producer)
            .field("mix_rate", &self.mix_rate)
            .field("internal_buffer_end", &self.internal_buffer_end)
            .field("mix_offset", &self.mix_offset)
            .finish_non_exhaustive()
    }
}

/// 4-point cubic (Catmull-Rom) interpolation between `y1` and `y2`.
fn cubic_interpolate(y0: Frame, y1: Frame, y2: Frame, y3: Frame, mu: f32) -> Frame {
    let mu2 = mu * mu;
    let a0 = y1 * 3.0 - y2 * 3.0 + y3 - y0;
    let a1 = y0 * 2.0 - y1 * 5.0 + y2 * 4.0 - y3;
    let a2 = y2 - y0;
    let a3 = y1 * 2.0;

    (a0 * (mu * mu2) + a1 * mu2 + a2 * mu + a3) / 2.0
}

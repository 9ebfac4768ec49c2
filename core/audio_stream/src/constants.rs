/// Fractional bits of the resampler's fixed-point phase.
pub const FP_BITS: u32 = 16;
pub const FP_LEN: u64 = 1 << FP_BITS;
pub const FP_MASK: u64 = FP_LEN - 1;

/// Frames requested from a native producer per refill.
pub const INTERNAL_BUFFER_LEN: usize = 256;
/// Trailing frames carried over a refill for the 4-tap interpolator.
pub const CUBIC_INTERP_HISTORY: usize = 4;

pub const DEFAULT_MIX_RATE: f32 = 44_100.0;

pub const DEFAULT_RANDOM_PITCH_SCALE: f32 = 1.1;
pub const DEFAULT_RANDOM_VOLUME_OFFSET_DB: f32 = 5.0;
/// Upper jitter bounds; wider ranges overflow the uniform float sampler.
pub const MAX_RANDOM_PITCH_SCALE: f32 = 16.0;
pub const MAX_RANDOM_VOLUME_OFFSET_DB: f32 = 40.0;

/// Frames mixed per pass by the output bus.
pub const OUTPUT_SCRATCH_FRAMES: usize = 1024;

pub const AUDIO_SAMPLE_EPSILON: f32 = 1e-6;

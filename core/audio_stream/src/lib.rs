//! Resampled playback of native-rate audio producers, plus a weighted stream randomizer.

pub mod constants;
pub mod device_manager;
pub mod error;
pub mod frame;
pub mod playback;
pub mod registry;
pub mod stream;

use std::sync::Arc;

use audio_stream::{
    device_manager::{AudioDeviceManager, OutputBus, cpal_dm::CpalAudioDeviceManager},
    error::PoolError,
    stream::{AudioStream, randomizer::AudioStreamRandomizer, tone::ToneStream},
};
use log::{error, info};

fn tone_randomizer(mix_rate: f32) -> Result<AudioStreamRandomizer, PoolError> {
    let randomizer = AudioStreamRandomizer::new();
    for (frequency, weight) in [(220.0, 1.0), (277.18, 1.0), (329.63, 2.0), (440.0, 0.5)] {
        randomizer.push_stream(Arc::new(ToneStream::new(frequency, mix_rate)), weight)?;
    }
    randomizer.set_random_pitch(1.2);
    randomizer.set_random_volume_offset_db(3.0);
    Ok(randomizer)
}

fn main() {
    env_logger::init();

    let mix_rate = match CpalAudioDeviceManager::default_mix_rate() {
        Ok(rate) => rate,
        Err(e) => {
            error!("no usable output device: {e}");
            return;
        }
    };

    let randomizer = match tone_randomizer(mix_rate) {
        Ok(randomizer) => randomizer,
        Err(e) => {
            error!("failed to fill the stream pool: {e}");
            return;
        }
    };

    let mut playback = randomizer.instance_playback(mix_rate);
    playback.start(0.0);
    info!(
        "playing pool entry {:?} of {}",
        randomizer.last_selected_index(),
        randomizer.streams_count()
    );

    let mut manager = CpalAudioDeviceManager::new();
    match manager.start_output_stream(Box::new(OutputBus::new(playback))) {
        Ok(()) => {
            info!("audio stream started at {mix_rate} Hz");
            std::thread::park(); // keep main alive so the stream keeps running
        }
        Err(e) => error!("failed to start audio stream: {e}"),
    }
}

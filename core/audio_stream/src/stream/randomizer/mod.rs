use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use log::{debug, warn};
use rand::{Rng, SeedableRng, rngs::StdRng};

use crate::{
    constants::{
        DEFAULT_RANDOM_PITCH_SCALE, DEFAULT_RANDOM_VOLUME_OFFSET_DB, MAX_RANDOM_PITCH_SCALE,
        MAX_RANDOM_VOLUME_OFFSET_DB,
    },
    error::PoolError,
    playback::Playback,
    registry::PlaybackRegistry,
    stream::{AudioStream, StreamHandle, same_stream},
};

pub mod playback;
pub mod pool;

use playback::RandomizerPlayback;
use pool::StreamPool;

/// How the next stream is picked from the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackMode {
    /// Weighted random, never the same stream twice in a row.
    #[default]
    RandomNoRepeats,
    /// Weighted random.
    Random,
    /// Pool order, wrapping.
    Sequential,
}

/// Plays one stream out of a weighted pool each time a playback starts.
///
/// Pool edits and selections share one lock that is only taken on control
/// threads; a started playback owns its selected inner playback, so editing
/// the pool never reaches a playback that is already sounding.
///
/// # Example
/// ```
/// use std::sync::Arc;
/// use audio_stream::stream::{AudioStream, randomizer::AudioStreamRandomizer, tone::ToneStream};
///
/// let randomizer = AudioStreamRandomizer::new();
/// randomizer.add_stream(0).unwrap();
/// randomizer.set_stream(0, Some(Arc::new(ToneStream::new(440.0, 44_100.0)))).unwrap();
///
/// let mut playback = randomizer.instance_playback(44_100.0);
/// playback.start(0.0);
/// assert!(playback.is_playing());
/// ```
#[derive(Debug)]
pub struct AudioStreamRandomizer {
    shared: Arc<RandomizerShared>,
}

#[derive(Debug)]
pub(crate) struct RandomizerShared {
    state: Mutex<RandomizerState>,
    playbacks: PlaybackRegistry,
}

#[derive(Debug)]
struct RandomizerState {
    pool: StreamPool,
    playback_mode: PlaybackMode,
    random_pitch_scale: f32,
    random_volume_offset_db: f32,
    last_selection: Option<Selection>,
    rng: StdRng,
}

/// A pool entry picked for one playback.
#[derive(Debug, Clone)]
pub struct Selection {
    pub index: usize,
    pub stream: StreamHandle,
}

/// Everything a playback instance takes away from one start.
#[derive(Debug)]
pub(crate) struct Draw {
    pub(crate) selection: Option<Selection>,
    pub(crate) pitch_scale: f32,
    pub(crate) volume_scale: f32,
}

#[derive(Debug, Clone, Copy)]
struct Candidate<'a> {
    index: usize,
    stream: &'a StreamHandle,
    weight: f32,
}

impl Candidate<'_> {
    fn to_selection(self) -> Selection {
        Selection {
            index: self.index,
            stream: Arc::clone(self.stream),
        }
    }
}

fn db_to_linear(db: f32) -> f32 {
    10.0f32.powf(db / 20.0)
}

/// Entries that can be played, in pool order.
fn eligible(pool: &StreamPool) -> Vec<Candidate<'_>> {
    pool.entries()
        .iter()
        .enumerate()
        .filter_map(|(index, entry)| {
            entry.stream.as_ref().map(|stream| Candidate {
                index,
                stream,
                weight: entry.weight,
            })
        })
        .collect()
}

/// Draws over the cumulative weights; zero-weight candidates are never picked
/// unless every weight is zero, in which case the draw is uniform.
fn pick_weighted(candidates: &[Candidate<'_>], rng: &mut impl Rng) -> Option<Selection> {
    if candidates.is_empty() {
        return None;
    }

    let total: f64 = candidates.iter().map(|c| f64::from(c.weight)).sum();
    if total <= 0.0 {
        let index = rng.gen_range(0..candidates.len());
        return Some(candidates[index].to_selection());
    }

    let chosen = rng.gen_range(0.0..total);
    let mut cumulative = 0.0;
    candidates
        .iter()
        .find(|c| {
            cumulative += f64::from(c.weight);
            cumulative > chosen
        })
        // float rounding can leave `chosen` just past the last boundary
        .or_else(|| candidates.iter().rev().find(|c| c.weight > 0.0))
        .map(|c| c.to_selection())
}

impl RandomizerState {
    fn select(&mut self) -> Option<Selection> {
        let selection = match self.playback_mode {
            PlaybackMode::Random => self.select_random(),
            PlaybackMode::RandomNoRepeats => self.select_no_repeats(),
            PlaybackMode::Sequential => self.select_sequential(),
        };

        match &selection {
            Some(selection) => {
                debug!(
                    "randomizer picked pool index {} ({})",
                    selection.index,
                    selection.stream.stream_name()
                );
                self.last_selection = Some(selection.clone());
            }
            None => debug!("randomizer has nothing to play"),
        }
        selection
    }

    fn select_random(&mut self) -> Option<Selection> {
        pick_weighted(&eligible(&self.pool), &mut self.rng)
    }

    fn select_no_repeats(&mut self) -> Option<Selection> {
        let eligible = eligible(&self.pool);
        let positive: Vec<Candidate<'_>> =
            eligible.iter().copied().filter(|c| c.weight > 0.0).collect();
        let candidates = if positive.is_empty() { eligible } else { positive };

        let fresh: Vec<Candidate<'_>> = match &self.last_selection {
            Some(last) => candidates
                .iter()
                .copied()
                .filter(|c| !same_stream(c.stream, &last.stream))
                .collect(),
            None => candidates.clone(),
        };

        // A single distinct stream has to repeat.
        if fresh.is_empty() {
            pick_weighted(&candidates, &mut self.rng)
        } else {
            pick_weighted(&fresh, &mut self.rng)
        }
    }

    fn select_sequential(&self) -> Option<Selection> {
        let mut distinct: Vec<Candidate<'_>> = Vec::new();
        for candidate in eligible(&self.pool) {
            if distinct.iter().any(|c| same_stream(c.stream, candidate.stream)) {
                warn!(
                    "pool index {} repeats an earlier stream, skipped in sequential playback",
                    candidate.index
                );
                continue;
            }
            distinct.push(candidate);
        }

        // Follow the last stream, not its index, so pool edits keep the cycle going.
        let next = self
            .last_selection
            .as_ref()
            .and_then(|last| {
                distinct
                    .iter()
                    .position(|c| same_stream(c.stream, &last.stream))
            })
            .map_or(0, |position| (position + 1) % distinct.len());
        distinct.get(next).map(|c| c.to_selection())
    }

    fn jitter(&mut self) -> (f32, f32) {
        let pitch_scale = self
            .rng
            .gen_range(1.0 / self.random_pitch_scale..=self.random_pitch_scale);
        let offset = self.random_volume_offset_db;
        let volume_db = self.rng.gen_range(-offset..=offset);
        (pitch_scale, db_to_linear(volume_db))
    }
}

impl RandomizerShared {
    fn state(&self) -> MutexGuard<'_, RandomizerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn draw(&self) -> Draw {
        let mut state = self.state();
        let selection = state.select();
        let (pitch_scale, volume_scale) = state.jitter();
        Draw {
            selection,
            pitch_scale,
            volume_scale,
        }
    }

    pub(crate) fn playbacks(&self) -> &PlaybackRegistry {
        &self.playbacks
    }
}

impl AudioStreamRandomizer {
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    /// Randomizer whose selections and jitter repeat for the same seed.
    pub fn with_seed(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> Self {
        Self {
            shared: Arc::new(RandomizerShared {
                state: Mutex::new(RandomizerState {
                    pool: StreamPool::new(),
                    playback_mode: PlaybackMode::default(),
                    random_pitch_scale: DEFAULT_RANDOM_PITCH_SCALE,
                    random_volume_offset_db: DEFAULT_RANDOM_VOLUME_OFFSET_DB,
                    last_selection: None,
                    rng,
                }),
                playbacks: PlaybackRegistry::new(),
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, RandomizerState> {
        self.shared.state()
    }

    pub fn add_stream(&self, index: usize) -> Result<(), PoolError> {
        self.state().pool.add(index)
    }

    pub fn move_stream(&self, from: usize, to: usize) -> Result<(), PoolError> {
        self.state().pool.move_stream(from, to)
    }

    pub fn remove_stream(&self, index: usize) -> Result<(), PoolError> {
        self.state().pool.remove(index).map(drop)
    }

    pub fn set_stream(&self, index: usize, stream: Option<StreamHandle>) -> Result<(), PoolError> {
        self.state().pool.set_stream(index, stream)
    }

    pub fn stream(&self, index: usize) -> Result<Option<StreamHandle>, PoolError> {
        self.state().pool.stream(index)
    }

    pub fn set_stream_weight(&self, index: usize, weight: f32) -> Result<(), PoolError> {
        self.state().pool.set_weight(index, weight)
    }

    pub fn stream_weight(&self, index: usize) -> Result<f32, PoolError> {
        self.state().pool.weight(index)
    }

    pub fn set_streams_count(&self, count: usize) {
        self.state().pool.set_count(count);
    }

    pub fn streams_count(&self) -> usize {
        self.state().pool.count()
    }

    /// Appends a stream with the given weight and returns its index.
    pub fn push_stream(&self, stream: StreamHandle, weight: f32) -> Result<usize, PoolError> {
        let mut state = self.state();
        let index = state.pool.count();
        state.pool.add(index)?;
        state.pool.set_stream(index, Some(stream))?;
        if let Err(err) = state.pool.set_weight(index, weight) {
            state.pool.remove(index)?;
            return Err(err);
        }
        Ok(index)
    }

    /// Pitch jitter bound; each start picks a scale in `[1 / scale, scale]`.
    /// Clamped to `[1, MAX_RANDOM_PITCH_SCALE]`.
    pub fn set_random_pitch(&self, pitch_scale: f32) {
        let clamped = if pitch_scale.is_nan() {
            1.0
        } else {
            pitch_scale.clamp(1.0, MAX_RANDOM_PITCH_SCALE)
        };
        if clamped != pitch_scale {
            warn!("random pitch scale {pitch_scale} clamped to {clamped}");
        }
        self.state().random_pitch_scale = clamped;
    }

    pub fn random_pitch(&self) -> f32 {
        self.state().random_pitch_scale
    }

    /// Volume jitter bound; each start picks an offset in `[-db, +db]`.
    /// Clamped to `[0, MAX_RANDOM_VOLUME_OFFSET_DB]`.
    pub fn set_random_volume_offset_db(&self, offset_db: f32) {
        let clamped = if offset_db.is_nan() {
            0.0
        } else {
            offset_db.clamp(0.0, MAX_RANDOM_VOLUME_OFFSET_DB)
        };
        if clamped != offset_db {
            warn!("random volume offset {offset_db} dB clamped to {clamped} dB");
        }
        self.state().random_volume_offset_db = clamped;
    }

    pub fn random_volume_offset_db(&self) -> f32 {
        self.state().random_volume_offset_db
    }

    pub fn set_playback_mode(&self, playback_mode: PlaybackMode) {
        self.state().playback_mode = playback_mode;
    }

    pub fn playback_mode(&self) -> PlaybackMode {
        self.state().playback_mode
    }

    /// Pool index of the most recent selection.
    pub fn last_selected_index(&self) -> Option<usize> {
        self.state().last_selection.as_ref().map(|last| last.index)
    }

    /// Playback instances created by this randomizer that are still alive.
    pub fn active_playbacks(&self) -> usize {
        self.shared.playbacks.len()
    }

    pub(crate) fn select(&self) -> Option<Selection> {
        self.state().select()
    }
}

impl Default for AudioStreamRandomizer {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioStream for AudioStreamRandomizer {
    fn instance_playback(&self, mix_rate: f32) -> Box<dyn Playback> {
        Box::new(RandomizerPlayback::new(Arc::clone(&self.shared), mix_rate))
    }

    fn stream_name(&self) -> String {
        "Randomizer".to_owned()
    }

    /// Length of the most recently selected stream.
    fn length(&self) -> f32 {
        let last = self.state().last_selection.clone();
        last.map_or(0.0, |last| last.stream.length())
    }

    fn is_monophonic(&self) -> bool {
        let streams: Vec<StreamHandle> = self
            .state()
            .pool
            .entries()
            .iter()
            .filter_map(|entry| entry.stream.clone())
            .collect();
        streams.iter().any(|stream| stream.is_monophonic())
    }
}

//! Arbitration between one-shot ritual sounds and looping background music.
//!
//! # Invariants
//! - Background music that was playing when an effect started is paused
//!   before the effect plays.
//! - Once the last overlapping effect has finished, paused music is resumed
//!   after a grace delay. Load, play or stop failures never skip this step.
//! - At most one instance of a given effect is alive at a time.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::{
    assets::{AssetStore, SoundAsset},
    config::AudioConfig,
    timeline::{Millis, Scheduler, TimerId},
    Result, TempleError,
};

/// Closed set of one-shot ritual sounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SoundEffect {
    Bell,
    Conch,
}

impl SoundEffect {
    pub fn asset_key(self) -> &'static str {
        match self {
            Self::Bell => "bell",
            Self::Conch => "conch",
        }
    }
}

/// Opaque handle to a sound loaded by an [`AudioBackend`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SoundHandle(pub u64);

/// Platform audio device.
pub trait AudioBackend {
    fn is_music_playing(&self) -> bool;
    fn pause_music(&mut self) -> Result<()>;
    fn resume_music(&mut self) -> Result<()>;
    fn load(&mut self, asset: &SoundAsset) -> Result<SoundHandle>;
    fn play(&mut self, handle: SoundHandle) -> Result<()>;
    fn stop(&mut self, handle: SoundHandle) -> Result<()>;
    fn unload(&mut self, handle: SoundHandle) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AudioTimer {
    StopEffect { effect: SoundEffect, generation: u64 },
    ResumeMusic,
}

#[derive(Debug, Clone, Copy)]
struct ActiveEffect {
    handle: Option<SoundHandle>,
    generation: u64,
    stop_timer: TimerId,
}

/// Serializes foreground effects against the background track.
#[derive(Debug)]
pub struct SyncCoordinator<B> {
    backend: B,
    config: AudioConfig,
    cache: HashMap<SoundEffect, SoundHandle>,
    active: HashMap<SoundEffect, ActiveEffect>,
    timers: Scheduler<AudioTimer>,
    music_owed: bool,
    generation: u64,
}

impl<B: AudioBackend> SyncCoordinator<B> {
    pub fn new(backend: B, config: AudioConfig) -> Self {
        Self {
            backend,
            config,
            cache: HashMap::new(),
            active: HashMap::new(),
            timers: Scheduler::new(),
            music_owed: false,
            generation: 0,
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn into_backend(self) -> B {
        self.backend
    }

    pub fn is_effect_active(&self, effect: SoundEffect) -> bool {
        self.active.contains_key(&effect)
    }

    /// Whether background music is paused on behalf of an effect.
    pub fn holds_music(&self) -> bool {
        self.music_owed
    }

    pub fn is_idle(&self) -> bool {
        self.active.is_empty() && self.timers.is_empty()
    }

    /// Plays `effect`, pausing background music first.
    ///
    /// The stop and resume schedule is armed even when loading or playing
    /// fails; the first failure is then returned for the caller to surface.
    pub fn play_effect(&mut self, now: Millis, effect: SoundEffect, assets: &AssetStore) -> Result<()> {
        let mut failure = None;

        if self.backend.is_music_playing() {
            match self.backend.pause_music() {
                Ok(()) => {
                    tracing::debug!(?effect, "paused background music");
                    self.music_owed = true;
                }
                Err(err) => {
                    tracing::warn!(?effect, error = %err, "failed to pause background music");
                    failure.get_or_insert(err);
                }
            }
        }
        self.timers.cancel_where(|timer| *timer == AudioTimer::ResumeMusic);

        if let Some(previous) = self.active.remove(&effect) {
            tracing::debug!(?effect, "superseding running effect");
            self.timers.cancel(previous.stop_timer);
            if let Some(handle) = previous.handle {
                self.release(effect, handle);
            }
        }

        let handle = match self.start(effect, assets) {
            Ok(handle) => Some(handle),
            Err(err) => {
                tracing::warn!(?effect, error = %err, "effect playback failed");
                failure.get_or_insert(err);
                None
            }
        };

        self.generation += 1;
        let generation = self.generation;
        let stop_timer = self.timers.schedule_at(
            now + self.config.effect_duration_ms,
            AudioTimer::StopEffect { effect, generation },
        );
        self.active.insert(
            effect,
            ActiveEffect {
                handle,
                generation,
                stop_timer,
            },
        );

        match failure {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Runs every stop and resume that came due. Returns the failures that
    /// were recovered from along the way.
    pub fn tick(&mut self, now: Millis) -> Vec<TempleError> {
        let mut failures = Vec::new();

        while let Some(event) = self.timers.pop_due(now) {
            match event.payload {
                AudioTimer::StopEffect { effect, generation } => {
                    let current = self.active.get(&effect).map(|active| active.generation);
                    if current != Some(generation) {
                        continue;
                    }
                    if let Some(ActiveEffect {
                        handle: Some(handle),
                        ..
                    }) = self.active.remove(&effect)
                    {
                        if let Err(err) = self.backend.stop(handle) {
                            tracing::warn!(?effect, error = %err, "failed to stop effect");
                            failures.push(err);
                        }
                    }
                    tracing::debug!(?effect, "effect finished");

                    if self.active.is_empty() && self.music_owed {
                        self.timers.schedule_at(
                            event.due_at + self.config.resume_grace_ms,
                            AudioTimer::ResumeMusic,
                        );
                    }
                }
                AudioTimer::ResumeMusic => {
                    if let Err(err) = self.resume_if_owed() {
                        failures.push(err);
                    }
                }
            }
        }

        failures
    }

    /// Stops and unloads everything and gives the music back. Used when the
    /// owning screen goes away.
    pub fn teardown(&mut self) -> Vec<TempleError> {
        let mut failures = Vec::new();
        self.timers.clear();

        let active: Vec<_> = self.active.drain().collect();
        for (effect, entry) in active {
            if let Some(handle) = entry.handle {
                if let Err(err) = self.backend.stop(handle) {
                    tracing::warn!(?effect, error = %err, "failed to stop effect during teardown");
                    failures.push(err);
                }
            }
        }

        let cached: Vec<_> = self.cache.drain().collect();
        for (effect, handle) in cached {
            if let Err(err) = self.backend.unload(handle) {
                tracing::warn!(?effect, error = %err, "failed to unload effect");
                failures.push(err);
            }
        }

        if let Err(err) = self.resume_if_owed() {
            failures.push(err);
        }
        failures
    }

    fn start(&mut self, effect: SoundEffect, assets: &AssetStore) -> Result<SoundHandle> {
        let handle = match self.cache.get(&effect) {
            Some(handle) => *handle,
            None => {
                let asset = assets.resolve_sound(effect.asset_key())?;
                let handle = self.backend.load(asset)?;
                self.cache.insert(effect, handle);
                handle
            }
        };
        self.backend.play(handle)?;
        Ok(handle)
    }

    fn release(&mut self, effect: SoundEffect, handle: SoundHandle) {
        if let Err(err) = self.backend.stop(handle) {
            tracing::warn!(?effect, error = %err, "failed to stop superseded effect");
        }
        if let Err(err) = self.backend.unload(handle) {
            tracing::warn!(?effect, error = %err, "failed to unload superseded effect");
        }
        self.cache.remove(&effect);
    }

    fn resume_if_owed(&mut self) -> Result<()> {
        if !self.music_owed || !self.active.is_empty() {
            return Ok(());
        }
        self.music_owed = false;
        match self.backend.resume_music() {
            Ok(()) => {
                tracing::debug!("resumed background music");
                Ok(())
            }
            Err(err) => {
                tracing::warn!(error = %err, "failed to resume background music");
                Err(err)
            }
        }
    }
}

/// Observable action taken by a [`SimulatedAudioDevice`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceEvent {
    MusicPaused,
    MusicResumed,
    Loaded { key: String, handle: SoundHandle },
    Played(SoundHandle),
    Stopped(SoundHandle),
    Unloaded(SoundHandle),
}

/// In-process audio device that records what it was asked to do.
///
/// Used by the command line harness and the tests in place of a platform
/// audio stack. Individual operations can be made to fail.
#[derive(Debug, Default)]
pub struct SimulatedAudioDevice {
    music_playing: bool,
    next_handle: u64,
    loaded: HashMap<SoundHandle, String>,
    playing: HashSet<SoundHandle>,
    max_concurrent: usize,
    failing_loads: HashSet<String>,
    fail_play: bool,
    fail_stop: bool,
    events: Vec<DeviceEvent>,
}

impl SimulatedAudioDevice {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_music(mut self) -> Self {
        self.music_playing = true;
        self
    }

    pub fn start_music(&mut self) {
        self.music_playing = true;
    }

    pub fn fail_loads_of(&mut self, key: impl Into<String>) {
        self.failing_loads.insert(key.into());
    }

    pub fn fail_plays(&mut self, fail: bool) {
        self.fail_play = fail;
    }

    pub fn fail_stops(&mut self, fail: bool) {
        self.fail_stop = fail;
    }

    pub fn events(&self) -> &[DeviceEvent] {
        &self.events
    }

    pub fn playing_count(&self) -> usize {
        self.playing.len()
    }

    /// Highest number of effects that were ever audible at once.
    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    pub fn loaded_count(&self) -> usize {
        self.loaded.len()
    }
}

impl AudioBackend for SimulatedAudioDevice {
    fn is_music_playing(&self) -> bool {
        self.music_playing
    }

    fn pause_music(&mut self) -> Result<()> {
        self.music_playing = false;
        self.events.push(DeviceEvent::MusicPaused);
        Ok(())
    }

    fn resume_music(&mut self) -> Result<()> {
        self.music_playing = true;
        self.events.push(DeviceEvent::MusicResumed);
        Ok(())
    }

    fn load(&mut self, asset: &SoundAsset) -> Result<SoundHandle> {
        if self.failing_loads.contains(&asset.key) {
            return Err(TempleError::AudioDeviceFailure(format!(
                "cannot decode `{}`",
                asset.path
            )));
        }
        self.next_handle += 1;
        let handle = SoundHandle(self.next_handle);
        self.loaded.insert(handle, asset.key.clone());
        self.events.push(DeviceEvent::Loaded {
            key: asset.key.clone(),
            handle,
        });
        Ok(handle)
    }

    fn play(&mut self, handle: SoundHandle) -> Result<()> {
        if self.fail_play || !self.loaded.contains_key(&handle) {
            return Err(TempleError::AudioDeviceFailure(format!(
                "cannot play sound {}",
                handle.0
            )));
        }
        self.playing.insert(handle);
        self.max_concurrent = self.max_concurrent.max(self.playing.len());
        self.events.push(DeviceEvent::Played(handle));
        Ok(())
    }

    fn stop(&mut self, handle: SoundHandle) -> Result<()> {
        self.playing.remove(&handle);
        if self.fail_stop {
            return Err(TempleError::AudioDeviceFailure(format!(
                "cannot stop sound {}",
                handle.0
            )));
        }
        self.events.push(DeviceEvent::Stopped(handle));
        Ok(())
    }

    fn unload(&mut self, handle: SoundHandle) -> Result<()> {
        self.playing.remove(&handle);
        self.loaded.remove(&handle);
        self.events.push(DeviceEvent::Unloaded(handle));
        Ok(())
    }
}

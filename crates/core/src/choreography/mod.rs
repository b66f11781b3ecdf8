//! Transient ritual animations: flower showers, bell swings and the
//! offering-tray orbit.
//!
//! # Responsibility
//! - Spawn, advance and retire actors against the virtual clock.
//! - Keep the "shower running" and "ritual active" flags honest.
//! - Report sound cues for the audio coordinator to play.
//!
//! # Invariants
//! - A shower request while one is running is ignored.
//! - Finishing or stopping the ritual stops its flower generator and clears
//!   every petal it spawned in the same call.
//! - A failed spawn leaves no flag set.

mod actor;
mod bell;
mod orbit;
mod shower;

pub use actor::{ActorId, ActorKind, AnimatedActor, BellSide, FlowerChoice, FlowerKind};
pub use bell::{BellPhase, BELL_PHASES};
pub use orbit::{orbit_point, ORBIT_WAYPOINTS};
pub use shower::{ShowerRequest, MAX_PETALS_PER_SHOWER};

use rand_chacha::ChaCha8Rng;

use bell::BellSwing;
use orbit::TrayOrbit;
use shower::{spawn_petals, FallingPetal, PetalSource};

use crate::{
    audio::SoundEffect,
    config::{AppConfig, BellConfig, RitualConfig, ShowerConfig},
    geometry::{Point, ScreenSize},
    timeline::{Millis, Scheduler},
    Result, TempleError,
};

/// Something observable that happened while advancing the choreography.
#[derive(Debug, Clone, PartialEq)]
pub enum ChoreoEvent {
    /// The last petal of the running shower retired.
    ShowerFinished,
    BellPhaseEntered {
        side: BellSide,
        index: usize,
        phase: BellPhase,
    },
    BellSettled { side: BellSide },
    /// The tray orbit ended or was stopped; its petals are gone.
    RitualFinished { petals_cleared: usize },
    /// A sound that should start now.
    Cue(SoundEffect),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChoreoTimer {
    RitualFlowers,
}

/// Screen-scoped driver for every ritual animation.
#[derive(Debug)]
pub struct Choreographer {
    screen: ScreenSize,
    shower: ShowerConfig,
    bells_config: BellConfig,
    ritual: RitualConfig,
    rng: ChaCha8Rng,
    next_actor: u64,
    petals: Vec<FallingPetal>,
    bells: Vec<BellSwing>,
    tray: Option<TrayOrbit>,
    shower_running: bool,
    ritual_active: bool,
    timers: Scheduler<ChoreoTimer>,
}

impl Choreographer {
    pub fn new(config: &AppConfig, rng: ChaCha8Rng) -> Self {
        Self {
            screen: config.screen,
            shower: config.shower.clone(),
            bells_config: config.bells.clone(),
            ritual: config.ritual.clone(),
            rng,
            next_actor: 0,
            petals: Vec::new(),
            bells: Vec::new(),
            tray: None,
            shower_running: false,
            ritual_active: false,
            timers: Scheduler::new(),
        }
    }

    pub fn is_shower_running(&self) -> bool {
        self.shower_running
    }

    pub fn is_ritual_active(&self) -> bool {
        self.ritual_active
    }

    pub fn petal_count(&self) -> usize {
        self.petals.len()
    }

    pub fn shower_petal_count(&self) -> usize {
        self.count_petals(PetalSource::Shower)
    }

    pub fn ritual_petal_count(&self) -> usize {
        self.count_petals(PetalSource::Ritual)
    }

    pub fn bells_swinging(&self) -> usize {
        self.bells.len()
    }

    /// Nothing is animating and no timer is pending.
    pub fn is_idle(&self) -> bool {
        self.petals.is_empty() && self.bells.is_empty() && self.tray.is_none() && self.timers.is_empty()
    }

    /// Default shower for the configured grid.
    pub fn shower_request(&self, choice: FlowerChoice) -> ShowerRequest {
        ShowerRequest {
            choice,
            rows: self.shower.row_count,
            per_row: self.shower.items_per_row,
        }
    }

    /// Starts a flower shower. Returns `Ok(false)` when one is already
    /// running.
    pub fn drop_flowers(&mut self, now: Millis, request: ShowerRequest) -> Result<bool> {
        if self.shower_running {
            tracing::debug!("shower already running, ignoring drop");
            return Ok(false);
        }

        let petals = spawn_petals(
            &mut self.rng,
            &mut self.next_actor,
            self.screen,
            &self.shower,
            request,
            PetalSource::Shower,
            now,
        )?;
        tracing::info!(count = petals.len(), choice = ?request.choice, "flower shower started");
        self.petals.extend(petals);
        self.shower_running = true;
        Ok(true)
    }

    /// Swings both bells. A new call replaces any swing in progress.
    pub fn ring_bells(&mut self, now: Millis, double_ring: bool) -> Vec<ChoreoEvent> {
        if !self.bells.is_empty() {
            tracing::debug!("restarting bell swing");
            self.bells.clear();
        }

        let y = self.screen.height * 0.08;
        let anchors = [
            (BellSide::Left, Point::new(self.screen.width * 0.12, y), now),
            (
                BellSide::Right,
                Point::new(self.screen.width * 0.78, y),
                now + self.bells_config.stagger_ms,
            ),
        ];
        for (side, anchor, starts_at) in anchors {
            let id = self.next_id();
            self.bells
                .push(BellSwing::new(id, side, anchor, &self.bells_config, starts_at, double_ring));
        }

        let mut events = Vec::new();
        self.advance_bells(now, &mut events);
        events
    }

    /// Starts the offering-tray orbit and its flower generator. Returns
    /// `Ok(false)` when the ritual is already under way.
    pub fn perform_ritual(&mut self, now: Millis) -> Result<bool> {
        if self.ritual_active {
            tracing::debug!("ritual already active, ignoring request");
            return Ok(false);
        }
        if self.ritual.orbit_duration_ms == 0 || self.ritual.flower_interval_ms == 0 {
            return Err(TempleError::InvalidInput("ritual timings must be positive"));
        }

        let first_batch = self.spawn_ritual_batch(now)?;
        let tray_id = self.next_id();
        self.tray = Some(TrayOrbit::new(
            tray_id,
            now,
            self.ritual.orbit_duration_ms,
            self.screen,
            self.ritual.tray_size_px,
        ));
        self.petals.extend(first_batch);
        self.timers.schedule_repeating(
            now + self.ritual.flower_interval_ms,
            self.ritual.flower_interval_ms,
            ChoreoTimer::RitualFlowers,
        );
        self.ritual_active = true;
        tracing::info!(duration_ms = self.ritual.orbit_duration_ms, "ritual started");
        Ok(true)
    }

    /// Ends the ritual: stops the generator, clears its petals and the tray.
    /// Returns how many petals were cleared.
    pub fn stop_ritual(&mut self) -> usize {
        self.timers.cancel_where(|timer| *timer == ChoreoTimer::RitualFlowers);
        let before = self.petals.len();
        self.petals.retain(|petal| petal.source != PetalSource::Ritual);
        let cleared = before - self.petals.len();
        self.tray = None;
        if self.ritual_active {
            tracing::info!(cleared, "ritual finished");
        }
        self.ritual_active = false;
        cleared
    }

    /// Global dismiss gesture: halts every falling petal and the ritual.
    pub fn dismiss(&mut self) -> Vec<ChoreoEvent> {
        let mut events = Vec::new();
        if self.ritual_active {
            let petals_cleared = self.stop_ritual();
            events.push(ChoreoEvent::RitualFinished { petals_cleared });
        }
        if !self.petals.is_empty() {
            tracing::debug!(count = self.petals.len(), "dismissing petals");
        }
        self.petals.clear();
        if self.shower_running {
            self.shower_running = false;
            events.push(ChoreoEvent::ShowerFinished);
        }
        events
    }

    /// Drops every actor and timer. Used when the owning screen unmounts.
    pub fn teardown(&mut self) {
        self.dismiss();
        self.bells.clear();
        self.timers.clear();
    }

    /// Advances all actors to `now`.
    pub fn tick(&mut self, now: Millis) -> Vec<ChoreoEvent> {
        let mut events = Vec::new();
        let orbit_end = self.tray.as_ref().map(TrayOrbit::ends_at);

        while let Some(timer) = self.timers.pop_due(now) {
            match timer.payload {
                ChoreoTimer::RitualFlowers => {
                    if orbit_end.is_some_and(|end| timer.due_at >= end) {
                        continue;
                    }
                    match self.spawn_ritual_batch(timer.due_at) {
                        Ok(batch) => self.petals.extend(batch),
                        Err(err) => tracing::warn!(error = %err, "skipping ritual flower batch"),
                    }
                }
            }
        }

        self.advance_bells(now, &mut events);

        if self.tray.as_ref().is_some_and(|tray| tray.is_complete(now)) {
            let petals_cleared = self.stop_ritual();
            events.push(ChoreoEvent::RitualFinished { petals_cleared });
        }

        self.petals.retain(|petal| petal.retire_at() > now);
        if self.shower_running && self.count_petals(PetalSource::Shower) == 0 {
            self.shower_running = false;
            tracing::debug!("flower shower finished");
            events.push(ChoreoEvent::ShowerFinished);
        }

        events
    }

    /// Current pose of every live actor.
    pub fn actors(&self, now: Millis) -> Vec<AnimatedActor> {
        let mut actors: Vec<AnimatedActor> = self.petals.iter().map(|petal| petal.actor(now)).collect();
        actors.extend(self.bells.iter().map(|bell| bell.actor(now)));
        actors.extend(self.tray.iter().map(|tray| tray.actor(now)));
        actors
    }

    fn advance_bells(&mut self, now: Millis, events: &mut Vec<ChoreoEvent>) {
        for bell in &mut self.bells {
            for (index, step) in bell.poll(now) {
                if let Some(effect) = step.cue {
                    events.push(ChoreoEvent::Cue(effect));
                }
                events.push(ChoreoEvent::BellPhaseEntered {
                    side: bell.side,
                    index,
                    phase: step.phase,
                });
            }
        }
        self.bells.retain(|bell| {
            let finished = bell.is_finished(now);
            if finished {
                events.push(ChoreoEvent::BellSettled { side: bell.side });
            }
            !finished
        });
    }

    fn spawn_ritual_batch(&mut self, at: Millis) -> Result<Vec<FallingPetal>> {
        let request = ShowerRequest {
            choice: FlowerChoice::Mixed,
            rows: 1,
            per_row: self.ritual.flowers_per_batch,
        };
        spawn_petals(
            &mut self.rng,
            &mut self.next_actor,
            self.screen,
            &self.shower,
            request,
            PetalSource::Ritual,
            at,
        )
    }

    fn count_petals(&self, source: PetalSource) -> usize {
        self.petals.iter().filter(|petal| petal.source == source).count()
    }

    fn next_id(&mut self) -> ActorId {
        self.next_actor += 1;
        ActorId(self.next_actor)
    }
}

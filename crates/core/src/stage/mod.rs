//! Screen-scoped context tying the temple subsystems together.
//!
//! A [`TempleStage`] is created when a temple screen mounts and consumed when
//! it unmounts. It owns the clock, the RNG, the sound cache and every
//! animation flag, so two screens never share state.

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::{
    assets::{AssetStore, DeityId, TempleCatalog},
    audio::{AudioBackend, SoundEffect, SyncCoordinator},
    choreography::{AnimatedActor, ChoreoEvent, Choreographer, FlowerChoice},
    config::AppConfig,
    notice::{Notice, NoticeBoard, NoticeKind},
    persistence::{PersistenceGateway, TempleConfiguration, UserId},
    placement::{EntityId, PlacementModel},
    timeline::{Millis, VirtualClock},
    wizard::{ConfigurationWizard, WizardStep},
    Result, TempleError,
};

/// Ritual icons the user can tap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RitualAction {
    DropFlowers(FlowerChoice),
    RingBells { double_ring: bool },
    PerformRitual,
    BlowConch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StageMode {
    Viewing,
    Editing,
}

pub struct TempleStage<B> {
    config: AppConfig,
    user: UserId,
    catalog: TempleCatalog,
    assets: AssetStore,
    clock: VirtualClock,
    saved: TempleConfiguration,
    wizard: Option<ConfigurationWizard>,
    choreographer: Choreographer,
    audio: SyncCoordinator<B>,
    notices: NoticeBoard,
}

impl<B: AudioBackend> TempleStage<B> {
    /// Mounts a stage for `user`, loading their saved temple.
    ///
    /// A missing record starts from an empty temple; a failing gateway does
    /// too, with a notice.
    pub fn mount(
        config: AppConfig,
        user: UserId,
        gateway: &mut dyn PersistenceGateway,
        backend: B,
    ) -> Result<Self> {
        let catalog = TempleCatalog::bundled();
        let assets = AssetStore::bundled(&catalog);
        Self::mount_with(config, user, gateway, backend, catalog, assets)
    }

    /// Like [`TempleStage::mount`] with an explicit catalog and asset store.
    pub fn mount_with(
        config: AppConfig,
        user: UserId,
        gateway: &mut dyn PersistenceGateway,
        backend: B,
        catalog: TempleCatalog,
        assets: AssetStore,
    ) -> Result<Self> {
        config.validate()?;
        let seed = config.seed.unwrap_or_else(rand::random::<u64>);
        let rng = ChaCha8Rng::seed_from_u64(seed);
        let mut notices = NoticeBoard::new(config.notices.ttl_ms);

        let saved = match gateway.load_configuration(&user) {
            Ok(Some(saved)) => {
                tracing::info!(user = %user, entities = saved.entities.len(), "loaded saved temple");
                saved
            }
            Ok(None) => {
                tracing::info!(user = %user, "no saved temple, starting fresh");
                TempleConfiguration::empty(config.screen)
            }
            Err(err) => {
                tracing::warn!(user = %user, error = %err, "failed to load temple");
                notices.post(0, err.notice_kind(), err.to_string());
                TempleConfiguration::empty(config.screen)
            }
        };

        tracing::debug!(seed, "temple stage mounted");
        Ok(Self {
            choreographer: Choreographer::new(&config, rng),
            audio: SyncCoordinator::new(backend, config.audio.clone()),
            config,
            user,
            catalog,
            assets,
            clock: VirtualClock::new(),
            saved,
            wizard: None,
            notices,
        })
    }

    /// Tears everything down and hands back the audio backend.
    pub fn unmount(mut self) -> B {
        self.wizard = None;
        self.choreographer.teardown();
        for failure in self.audio.teardown() {
            tracing::warn!(error = %failure, "audio teardown failure");
        }
        tracing::debug!(user = %self.user, "temple stage unmounted");
        self.audio.into_backend()
    }

    pub fn now(&self) -> Millis {
        self.clock.now()
    }

    pub fn user(&self) -> &UserId {
        &self.user
    }

    pub fn mode(&self) -> StageMode {
        if self.wizard.is_some() {
            StageMode::Editing
        } else {
            StageMode::Viewing
        }
    }

    pub fn catalog(&self) -> &TempleCatalog {
        &self.catalog
    }

    pub fn assets(&self) -> &AssetStore {
        &self.assets
    }

    pub fn choreographer(&self) -> &Choreographer {
        &self.choreographer
    }

    pub fn audio(&self) -> &SyncCoordinator<B> {
        &self.audio
    }

    pub fn audio_mut(&mut self) -> &mut SyncCoordinator<B> {
        &mut self.audio
    }

    pub fn wizard(&self) -> Option<&ConfigurationWizard> {
        self.wizard.as_ref()
    }

    pub fn wizard_mut(&mut self) -> Option<&mut ConfigurationWizard> {
        self.wizard.as_mut()
    }

    pub fn saved(&self) -> &TempleConfiguration {
        &self.saved
    }

    /// The saved temple laid out on this stage's screen.
    pub fn scene(&self) -> TempleConfiguration {
        let mut placement = PlacementModel::new(self.config.screen, self.config.placement.clone());
        placement.replace_all(self.saved.entities.clone(), self.saved.screen);
        TempleConfiguration {
            backdrop: self.saved.backdrop.clone(),
            temple_style: self.saved.temple_style.clone(),
            entities: placement.entities().to_vec(),
            screen: self.config.screen,
        }
    }

    pub fn notices(&self) -> Vec<Notice> {
        self.notices.active(self.clock.now()).cloned().collect()
    }

    pub fn is_showing(&self, kind: NoticeKind) -> bool {
        self.notices.is_showing(self.clock.now(), kind)
    }

    pub fn actors(&self) -> Vec<AnimatedActor> {
        self.choreographer.actors(self.clock.now())
    }

    /// Advances the clock by `delta` and runs everything that came due.
    pub fn advance(&mut self, delta: Millis) -> Vec<ChoreoEvent> {
        let now = self.clock.advance(delta);
        if let Some(wizard) = self.wizard.as_mut() {
            wizard.tick(now);
        }
        let events = self.choreographer.tick(now);
        self.route_cues(&events);
        for failure in self.audio.tick(now) {
            self.surface(failure);
        }
        self.notices.tick(now);
        events
    }

    /// Advances in `step` increments until `delta` has elapsed.
    pub fn run_for(&mut self, delta: Millis, step: Millis) -> Vec<ChoreoEvent> {
        let step = step.max(1);
        let mut events = Vec::new();
        let mut remaining = delta;
        while remaining > 0 {
            let slice = remaining.min(step);
            events.extend(self.advance(slice));
            remaining -= slice;
        }
        events
    }

    /// Handles a ritual icon tap. Returns `Ok(false)` when the action was
    /// ignored because the same animation is already running.
    pub fn perform(&mut self, action: RitualAction) -> Result<bool> {
        let now = self.clock.now();
        tracing::debug!(?action, now, "ritual action");
        match action {
            RitualAction::DropFlowers(choice) => {
                let request = self.choreographer.shower_request(choice);
                let started = self.choreographer.drop_flowers(now, request);
                started.map_err(|err| self.surface(err))
            }
            RitualAction::RingBells { double_ring } => {
                let events = self.choreographer.ring_bells(now, double_ring);
                self.route_cues(&events);
                Ok(true)
            }
            RitualAction::PerformRitual => {
                let started = self.choreographer.perform_ritual(now);
                started.map_err(|err| self.surface(err))
            }
            RitualAction::BlowConch => {
                self.play(SoundEffect::Conch);
                Ok(true)
            }
        }
    }

    /// Global tap-to-dismiss.
    pub fn dismiss(&mut self) -> Vec<ChoreoEvent> {
        self.choreographer.dismiss()
    }

    /// Opens the wizard on the last saved configuration.
    pub fn begin_editing(&mut self) -> &mut ConfigurationWizard {
        let saved = &self.saved;
        let screen = self.config.screen;
        let placement = &self.config.placement;
        self.wizard
            .get_or_insert_with(|| ConfigurationWizard::resume(saved, screen, placement))
    }

    /// Leaves the wizard without saving.
    pub fn cancel_editing(&mut self) {
        self.wizard = None;
    }

    pub fn next_step(&mut self) -> Result<WizardStep> {
        let result = self.editing()?.next();
        result.map_err(|err| self.surface(err))
    }

    pub fn previous_step(&mut self) -> Result<WizardStep> {
        let result = self.editing()?.back();
        result.map_err(|err| self.surface(err))
    }

    pub fn select_deity(&mut self, deity: &DeityId, artwork: &str) -> Result<EntityId> {
        let catalog = self.catalog.clone();
        let result = self.editing()?.select_deity(&catalog, deity, artwork);
        result.map_err(|err| self.surface(err))
    }

    /// Saves the session and returns to viewing. On failure the session and
    /// the previously saved temple stay untouched.
    pub fn save(&mut self, gateway: &mut dyn PersistenceGateway) -> Result<()> {
        let user = self.user.clone();
        let result = self.editing()?.save(gateway, &user);
        match result {
            Ok(configuration) => {
                self.saved = configuration;
                self.wizard = None;
                self.notices.post(self.clock.now(), NoticeKind::Saved, "temple saved");
                Ok(())
            }
            Err(err) => Err(self.surface(err)),
        }
    }

    fn editing(&mut self) -> Result<&mut ConfigurationWizard> {
        self.wizard
            .as_mut()
            .ok_or(TempleError::InvalidInput("the configuration wizard is not open"))
    }

    fn route_cues(&mut self, events: &[ChoreoEvent]) {
        for event in events {
            if let ChoreoEvent::Cue(effect) = event {
                self.play(*effect);
            }
        }
    }

    fn play(&mut self, effect: SoundEffect) {
        let now = self.clock.now();
        if let Err(err) = self.audio.play_effect(now, effect, &self.assets) {
            self.surface(err);
        }
    }

    /// Posts `err` as a transient notice and hands it back.
    fn surface(&mut self, err: TempleError) -> TempleError {
        self.notices
            .post(self.clock.now(), err.notice_kind(), err.to_string());
        err
    }
}

//! Four-step temple configuration flow.
//!
//! # Invariants
//! - The step is always one of Background, Style, Deity, Placement.
//! - Leaving Deity for Placement needs at least one selected deity.
//! - Saving is only possible from Placement and never alters local state
//!   when the gateway fails.
//! - Held placement controls repeat on a cancellable timer; releasing one
//!   cancels its timer immediately.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{
    assets::{DeityId, TempleCatalog},
    config::PlacementConfig,
    geometry::{Point, ScreenSize},
    persistence::{PersistenceGateway, TempleConfiguration, UserId},
    placement::{Direction, EntityId, PlacementModel},
    timeline::{Millis, Scheduler, TimerId},
    Result, TempleError,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum WizardStep {
    Background = 1,
    Style = 2,
    Deity = 3,
    Placement = 4,
}

impl WizardStep {
    pub fn index(self) -> u8 {
        self as u8
    }

    pub fn next(self) -> Option<Self> {
        match self {
            Self::Background => Some(Self::Style),
            Self::Style => Some(Self::Deity),
            Self::Deity => Some(Self::Placement),
            Self::Placement => None,
        }
    }

    pub fn previous(self) -> Option<Self> {
        match self {
            Self::Background => None,
            Self::Style => Some(Self::Background),
            Self::Deity => Some(Self::Style),
            Self::Placement => Some(Self::Deity),
        }
    }
}

impl fmt::Display for WizardStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.index())
    }
}

/// A placement button. Each button is its own hold-repeat identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlacementControl {
    Grow,
    Shrink,
    Nudge(Direction),
}

/// Repeats held controls on a fixed interval until they are released.
#[derive(Debug, Clone)]
struct HoldRepeater {
    interval: Millis,
    timers: Scheduler<PlacementControl>,
    held: HashMap<PlacementControl, TimerId>,
}

impl HoldRepeater {
    fn new(interval: Millis) -> Self {
        Self {
            interval,
            timers: Scheduler::new(),
            held: HashMap::new(),
        }
    }

    fn press(&mut self, control: PlacementControl, now: Millis) {
        self.release(control);
        let id = self
            .timers
            .schedule_repeating(now + self.interval, self.interval, control);
        self.held.insert(control, id);
    }

    fn release(&mut self, control: PlacementControl) -> bool {
        match self.held.remove(&control) {
            Some(id) => self.timers.cancel(id),
            None => false,
        }
    }

    fn release_all(&mut self) {
        self.held.clear();
        self.timers.clear();
    }

    fn due(&mut self, now: Millis) -> Vec<PlacementControl> {
        self.timers
            .drain_due(now)
            .into_iter()
            .map(|event| event.payload)
            .collect()
    }

    fn is_held(&self, control: PlacementControl) -> bool {
        self.held.contains_key(&control)
    }
}

/// One editing session over a [`TempleConfiguration`].
#[derive(Debug, Clone)]
pub struct ConfigurationWizard {
    step: WizardStep,
    backdrop: Vec<String>,
    temple_style: String,
    placement: PlacementModel,
    config: PlacementConfig,
    hold: HoldRepeater,
}

impl ConfigurationWizard {
    /// Opens the wizard on top of the last saved configuration.
    pub fn resume(saved: &TempleConfiguration, screen: ScreenSize, config: &PlacementConfig) -> Self {
        let mut placement = PlacementModel::new(screen, config.clone());
        placement.replace_all(saved.entities.clone(), saved.screen);
        Self {
            step: WizardStep::Background,
            backdrop: saved.backdrop.clone(),
            temple_style: saved.temple_style.clone(),
            placement,
            config: config.clone(),
            hold: HoldRepeater::new(config.hold_tick_ms),
        }
    }

    pub fn step(&self) -> WizardStep {
        self.step
    }

    pub fn placement(&self) -> &PlacementModel {
        &self.placement
    }

    pub fn backdrop(&self) -> &[String] {
        &self.backdrop
    }

    pub fn temple_style(&self) -> &str {
        &self.temple_style
    }

    pub fn selected_deity_count(&self) -> usize {
        self.placement.len()
    }

    /// Moves one step forward if the guard allows it.
    pub fn next(&mut self) -> Result<WizardStep> {
        let Some(to) = self.step.next() else {
            return Err(TempleError::InvalidTransition {
                from: self.step,
                to: self.step,
            });
        };
        if to == WizardStep::Placement && self.placement.is_empty() {
            return Err(TempleError::InvalidTransition { from: self.step, to });
        }
        tracing::debug!(from = %self.step, to = %to, "wizard advanced");
        self.step = to;
        Ok(to)
    }

    /// Moves one step back. Selections are kept.
    pub fn back(&mut self) -> Result<WizardStep> {
        let Some(to) = self.step.previous() else {
            return Err(TempleError::InvalidTransition {
                from: self.step,
                to: self.step,
            });
        };
        if self.step == WizardStep::Placement {
            self.hold.release_all();
            self.placement.select_for_edit(None);
        }
        self.step = to;
        Ok(to)
    }

    pub fn choose_backdrop(&mut self, colors: Vec<String>) -> Result<()> {
        if colors.is_empty() {
            return Err(TempleError::InvalidInput("a backdrop needs at least one color"));
        }
        self.backdrop = colors;
        Ok(())
    }

    pub fn choose_style(&mut self, style: impl Into<String>) {
        self.temple_style = style.into();
    }

    /// Places `deity` with `artwork`, or swaps the artwork when the deity is
    /// already placed. Only the Deity and Placement steps accept selections.
    pub fn select_deity(
        &mut self,
        catalog: &TempleCatalog,
        deity: &DeityId,
        artwork: &str,
    ) -> Result<EntityId> {
        if self.step < WizardStep::Deity {
            return Err(TempleError::InvalidTransition {
                from: self.step,
                to: WizardStep::Deity,
            });
        }
        let known = catalog
            .deity(deity)
            .ok_or_else(|| TempleError::AssetResolutionFailure(format!("unknown deity `{deity}`")))?;
        if !known.artworks.iter().any(|candidate| candidate == artwork) {
            return Err(TempleError::AssetResolutionFailure(format!(
                "`{artwork}` is not an artwork of `{deity}`"
            )));
        }

        if let Some(existing) = self.placement.find_deity(deity).map(|entity| entity.entity_id) {
            self.placement.set_image(existing, artwork);
            return Ok(existing);
        }
        self.placement.add_entity(deity.clone(), artwork)
    }

    pub fn deselect_deity(&mut self, deity: &DeityId) {
        if let Some(id) = self.placement.find_deity(deity).map(|entity| entity.entity_id) {
            self.placement.remove_entity(id);
        }
    }

    pub fn clear_deities(&mut self) {
        self.hold.release_all();
        self.placement.clear();
    }

    /// Tap inside the placement scene: selects the entity under the finger
    /// or clears the edit target.
    pub fn tap(&mut self, point: Point) -> Option<EntityId> {
        if self.step != WizardStep::Placement {
            return None;
        }
        let hit = self.placement.hit_test(point);
        self.placement.select_for_edit(hit);
        hit
    }

    pub fn select_target(&mut self, id: EntityId) -> bool {
        self.step == WizardStep::Placement && self.placement.select_for_edit(Some(id))
    }

    pub fn edit_target(&self) -> Option<EntityId> {
        self.placement.selected()
    }

    /// Applies one discrete adjustment to the edit target.
    pub fn apply(&mut self, control: PlacementControl) -> bool {
        if self.step != WizardStep::Placement {
            return false;
        }
        let Some(target) = self.placement.selected() else {
            return false;
        };
        match control {
            PlacementControl::Grow => self.placement.resize(target, self.config.grow_factor),
            PlacementControl::Shrink => self.placement.resize(target, self.config.shrink_factor),
            PlacementControl::Nudge(direction) => {
                self.placement
                    .move_entity(target, direction, self.config.move_step_px)
            }
        }
    }

    /// Starts holding a control: adjusts once now and then every tick until
    /// released. Nothing is armed without an edit target.
    pub fn press(&mut self, control: PlacementControl, now: Millis) -> bool {
        if !self.apply(control) {
            return false;
        }
        self.hold.press(control, now);
        true
    }

    pub fn release(&mut self, control: PlacementControl) -> bool {
        self.hold.release(control)
    }

    pub fn is_held(&self, control: PlacementControl) -> bool {
        self.hold.is_held(control)
    }

    /// Runs repeats that came due. Returns how many adjustments were applied.
    pub fn tick(&mut self, now: Millis) -> usize {
        let mut applied = 0;
        for control in self.hold.due(now) {
            if self.apply(control) {
                applied += 1;
            }
        }
        applied
    }

    /// Snapshot of what this session would save.
    pub fn configuration(&self) -> TempleConfiguration {
        TempleConfiguration {
            backdrop: self.backdrop.clone(),
            temple_style: self.temple_style.clone(),
            entities: self.placement.entities().to_vec(),
            screen: self.placement.screen(),
        }
    }

    /// Saves through `gateway`. Only allowed from the placement step.
    pub fn save(
        &mut self,
        gateway: &mut dyn PersistenceGateway,
        user: &UserId,
    ) -> Result<TempleConfiguration> {
        if self.step != WizardStep::Placement {
            return Err(TempleError::InvalidTransition {
                from: self.step,
                to: WizardStep::Placement,
            });
        }
        let configuration = self.configuration();
        gateway
            .save_configuration(user, &configuration)
            .map_err(|err| match err {
                failure @ TempleError::PersistenceFailure(_) => failure,
                other => TempleError::PersistenceFailure(other.to_string()),
            })?;
        self.hold.release_all();
        tracing::info!(user = %user, entities = configuration.entities.len(), "temple saved");
        Ok(configuration)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::MemoryGateway;

    const SCREEN: ScreenSize = ScreenSize::new(400.0, 800.0);

    fn wizard() -> ConfigurationWizard {
        ConfigurationWizard::resume(
            &TempleConfiguration::empty(SCREEN),
            SCREEN,
            &PlacementConfig::default(),
        )
    }

    fn catalog() -> TempleCatalog {
        TempleCatalog::bundled()
    }

    fn to_deity_step(wizard: &mut ConfigurationWizard) {
        wizard.next().unwrap();
        wizard.next().unwrap();
        assert_eq!(wizard.step(), WizardStep::Deity);
    }

    fn place(wizard: &mut ConfigurationWizard, deity: &str) -> EntityId {
        wizard
            .select_deity(&catalog(), &DeityId::new(deity), &format!("{deity}_1"))
            .unwrap()
    }

    #[test]
    fn placement_needs_a_deity() {
        let mut wizard = wizard();
        to_deity_step(&mut wizard);

        let err = wizard.next().unwrap_err();
        assert!(matches!(
            err,
            TempleError::InvalidTransition {
                from: WizardStep::Deity,
                to: WizardStep::Placement
            }
        ));

        place(&mut wizard, "ganesha");
        assert_eq!(wizard.next().unwrap(), WizardStep::Placement);
    }

    #[test]
    fn cannot_go_back_from_first_or_forward_from_last() {
        let mut wizard = wizard();
        assert!(wizard.back().is_err());
        assert_eq!(wizard.step(), WizardStep::Background);

        to_deity_step(&mut wizard);
        place(&mut wizard, "ganesha");
        wizard.next().unwrap();
        assert!(wizard.next().is_err());
        assert_eq!(wizard.step(), WizardStep::Placement);
    }

    #[test]
    fn back_keeps_selections() {
        let mut wizard = wizard();
        to_deity_step(&mut wizard);
        place(&mut wizard, "ganesha");
        wizard.next().unwrap();

        assert_eq!(wizard.back().unwrap(), WizardStep::Deity);
        assert_eq!(wizard.back().unwrap(), WizardStep::Style);
        assert_eq!(wizard.selected_deity_count(), 1);
    }

    #[test]
    fn deities_are_chosen_from_the_deity_step() {
        let mut wizard = wizard();
        let ganesha = DeityId::new("ganesha");
        let early = wizard.select_deity(&catalog(), &ganesha, "ganesha_1");
        assert!(matches!(
            early,
            Err(TempleError::InvalidTransition {
                from: WizardStep::Background,
                to: WizardStep::Deity
            })
        ));

        wizard.next().unwrap();
        assert!(wizard.select_deity(&catalog(), &ganesha, "ganesha_1").is_err());
        assert_eq!(wizard.selected_deity_count(), 0);

        wizard.next().unwrap();
        let id = place(&mut wizard, "ganesha");
        wizard.next().unwrap();
        assert_eq!(place(&mut wizard, "ganesha"), id);
    }

    #[test]
    fn fourth_deity_is_rejected() {
        let mut wizard = wizard();
        to_deity_step(&mut wizard);
        for deity in ["ganesha", "lakshmi", "shiva"] {
            place(&mut wizard, deity);
        }
        let err = wizard
            .select_deity(&catalog(), &DeityId::new("krishna"), "krishna_1")
            .unwrap_err();
        assert!(matches!(err, TempleError::MaxEntitiesExceeded));
        assert_eq!(wizard.selected_deity_count(), 3);
    }

    #[test]
    fn reselecting_swaps_artwork_in_place() {
        let mut wizard = wizard();
        to_deity_step(&mut wizard);
        let first = place(&mut wizard, "shiva");
        let again = wizard
            .select_deity(&catalog(), &DeityId::new("shiva"), "shiva_3")
            .unwrap();

        assert_eq!(first, again);
        assert_eq!(wizard.selected_deity_count(), 1);
        assert_eq!(wizard.placement().get(first).unwrap().image_ref, "shiva_3");
    }

    #[test]
    fn unknown_deities_and_artworks_fail() {
        let mut wizard = wizard();
        to_deity_step(&mut wizard);
        let unknown = wizard.select_deity(&catalog(), &DeityId::new("zeus"), "zeus_1");
        assert!(matches!(unknown, Err(TempleError::AssetResolutionFailure(_))));
        let wrong_art = wizard.select_deity(&catalog(), &DeityId::new("shiva"), "ganesha_1");
        assert!(matches!(wrong_art, Err(TempleError::AssetResolutionFailure(_))));
    }

    #[test]
    fn deselecting_removes_the_entity() {
        let mut wizard = wizard();
        to_deity_step(&mut wizard);
        place(&mut wizard, "ganesha");
        place(&mut wizard, "durga");
        wizard.deselect_deity(&DeityId::new("ganesha"));
        wizard.deselect_deity(&DeityId::new("ganesha"));

        assert_eq!(wizard.selected_deity_count(), 1);
        wizard.clear_deities();
        assert_eq!(wizard.selected_deity_count(), 0);
    }

    #[test]
    fn controls_need_a_target() {
        let mut wizard = wizard();
        to_deity_step(&mut wizard);
        let id = place(&mut wizard, "ganesha");
        wizard.next().unwrap();

        assert!(!wizard.press(PlacementControl::Grow, 0));
        assert!(!wizard.is_held(PlacementControl::Grow));

        let tapped = wizard.tap(Point::new(0.1 * 400.0 + 5.0, 0.35 * 800.0 + 5.0));
        assert_eq!(tapped, Some(id));
        assert!(wizard.press(PlacementControl::Grow, 0));
    }

    #[test]
    fn holding_repeats_until_release() {
        let mut wizard = wizard();
        to_deity_step(&mut wizard);
        let id = place(&mut wizard, "ganesha");
        wizard.next().unwrap();
        wizard.select_target(id);

        let start = wizard.placement().get(id).unwrap().position;
        assert!(wizard.press(PlacementControl::Nudge(Direction::Right), 1_000));
        assert_eq!(wizard.tick(1_099), 0);
        assert_eq!(wizard.tick(1_350), 3);
        assert!(wizard.release(PlacementControl::Nudge(Direction::Right)));
        assert_eq!(wizard.tick(5_000), 0);

        let end = wizard.placement().get(id).unwrap().position;
        assert_eq!(end.x - start.x, 4.0 * 5.0);
    }

    #[test]
    fn controls_repeat_independently() {
        let mut wizard = wizard();
        to_deity_step(&mut wizard);
        let id = place(&mut wizard, "ganesha");
        wizard.next().unwrap();
        wizard.select_target(id);

        wizard.press(PlacementControl::Shrink, 0);
        wizard.press(PlacementControl::Nudge(Direction::Down), 50);
        assert_eq!(wizard.tick(200), 3);
        wizard.release(PlacementControl::Shrink);
        assert_eq!(wizard.tick(300), 1);
    }

    #[test]
    fn save_only_from_placement_and_keeps_state_on_failure() {
        let mut wizard = wizard();
        let mut gateway = MemoryGateway::new();
        let user = UserId::new("devotee");

        assert!(matches!(
            wizard.save(&mut gateway, &user),
            Err(TempleError::InvalidTransition { .. })
        ));

        to_deity_step(&mut wizard);
        place(&mut wizard, "ganesha");
        wizard.next().unwrap();

        gateway.fail_saves(true);
        let before = wizard.configuration();
        let err = wizard.save(&mut gateway, &user).unwrap_err();
        assert!(matches!(err, TempleError::PersistenceFailure(_)));
        assert_eq!(wizard.configuration(), before);
        assert_eq!(wizard.step(), WizardStep::Placement);

        gateway.fail_saves(false);
        let saved = wizard.save(&mut gateway, &user).unwrap();
        assert_eq!(saved, before);
    }

    #[test]
    fn resume_rehydrates_saved_configuration() {
        let mut first = wizard();
        first.choose_backdrop(vec!["#000".into(), "#fff".into()]).unwrap();
        first.choose_style("dravida");
        to_deity_step(&mut first);
        place(&mut first, "lakshmi");
        let saved = first.configuration();

        let second = ConfigurationWizard::resume(&saved, SCREEN, &PlacementConfig::default());
        assert_eq!(second.configuration(), saved);
        assert_eq!(second.step(), WizardStep::Background);
        assert!(first.choose_backdrop(Vec::new()).is_err());
    }
}

use proptest::prelude::*;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use virtual_temple_core::{
    assets::AssetStore,
    audio::{AudioBackend as _, SimulatedAudioDevice, SoundEffect, SyncCoordinator},
    config::{AppConfig, AudioConfig, PlacementConfig},
    persistence::TempleConfiguration,
    wizard::{ConfigurationWizard, PlacementControl},
    Choreographer, DeityId, Direction, EntityId, FlowerChoice, FlowerKind, PlacementModel, ScreenSize,
    TempleCatalog, WizardStep, MAX_ENTITIES,
};

const EPSILON: f64 = 1e-9;
const DEITIES: [&str; 6] = ["ganesha", "lakshmi", "shiva", "krishna", "hanuman", "durga"];

#[derive(Debug, Clone)]
enum PlacementOp {
    Add(usize),
    Remove(u32),
    Select(u32),
    Resize(f64),
    Move(Direction, f64),
}

fn direction() -> impl Strategy<Value = Direction> {
    prop_oneof![
        Just(Direction::Up),
        Just(Direction::Down),
        Just(Direction::Left),
        Just(Direction::Right),
    ]
}

fn placement_op() -> impl Strategy<Value = PlacementOp> {
    prop_oneof![
        (0..DEITIES.len()).prop_map(PlacementOp::Add),
        (1u32..8).prop_map(PlacementOp::Remove),
        (1u32..8).prop_map(PlacementOp::Select),
        (0.2f64..5.0).prop_map(PlacementOp::Resize),
        (direction(), 0.0f64..2_000.0).prop_map(|(dir, step)| PlacementOp::Move(dir, step)),
    ]
}

fn screen() -> impl Strategy<Value = ScreenSize> {
    (200.0f64..2_000.0, 200.0f64..2_000.0).prop_map(|(w, h)| ScreenSize::new(w, h))
}

fn assert_on_screen(model: &PlacementModel) {
    let screen = model.screen();
    for entity in model.entities() {
        let rect = entity.rect();
        assert!(rect.origin.x >= -EPSILON && rect.origin.y >= -EPSILON, "{rect:?}");
        assert!(rect.right() <= screen.width + EPSILON, "{rect:?} on {screen:?}");
        assert!(rect.bottom() <= screen.height + EPSILON, "{rect:?} on {screen:?}");
    }
}

proptest! {
    #[test]
    fn placement_never_exceeds_limit_or_screen(
        screen in screen(),
        ops in prop::collection::vec(placement_op(), 0..60),
    ) {
        let mut model = PlacementModel::new(screen, PlacementConfig::default());
        for op in ops {
            match op {
                PlacementOp::Add(index) => {
                    let before = model.len();
                    let result = model.add_entity(DeityId::new(DEITIES[index]), "art");
                    prop_assert_eq!(result.is_err(), before == MAX_ENTITIES);
                }
                PlacementOp::Remove(id) => model.remove_entity(EntityId(id)),
                PlacementOp::Select(id) => {
                    model.select_for_edit(Some(EntityId(id)));
                }
                PlacementOp::Resize(factor) => {
                    if let Some(id) = model.selected() {
                        model.resize(id, factor);
                    }
                }
                PlacementOp::Move(direction, step) => {
                    if let Some(id) = model.selected() {
                        model.move_entity(id, direction, step);
                    }
                }
            }
            prop_assert!(model.len() <= MAX_ENTITIES);
            assert_on_screen(&model);
        }
    }

    #[test]
    fn rehydrated_entities_fit_any_screen(
        composed_on in screen(),
        shown_on in screen(),
        grow in 0usize..40,
    ) {
        let mut model = PlacementModel::new(composed_on, PlacementConfig::default());
        for deity in &DEITIES[..3] {
            model.add_entity(DeityId::new(*deity), "art").unwrap();
        }
        model.select_for_edit(Some(EntityId(2)));
        for _ in 0..grow {
            model.resize(EntityId(2), 1.05);
        }

        let mut shown = PlacementModel::new(shown_on, PlacementConfig::default());
        shown.replace_all(model.entities().to_vec(), composed_on);
        prop_assert_eq!(shown.len(), 3);
        assert_on_screen(&shown);
    }

    #[test]
    fn wizard_step_stays_in_range(
        moves in prop::collection::vec(any::<bool>(), 0..40),
        deity_after in prop::option::of(0usize..40),
    ) {
        let catalog = TempleCatalog::bundled();
        let saved = TempleConfiguration::empty(ScreenSize::default());
        let mut wizard = ConfigurationWizard::resume(&saved, ScreenSize::default(), &PlacementConfig::default());

        for (index, forward) in moves.into_iter().enumerate() {
            if deity_after == Some(index) {
                let selected = wizard.select_deity(&catalog, &DeityId::new("ganesha"), "ganesha_1");
                prop_assert_eq!(selected.is_ok(), wizard.step() >= WizardStep::Deity);
            }
            let before = wizard.step();
            let result = if forward { wizard.next() } else { wizard.back() };
            let after = wizard.step();

            prop_assert!((1..=4).contains(&after.index()));
            if result.is_err() {
                prop_assert_eq!(before, after);
            }
            if before == WizardStep::Deity && after == WizardStep::Placement {
                prop_assert!(wizard.selected_deity_count() >= 1);
            }
            if after == WizardStep::Placement {
                prop_assert!(wizard.selected_deity_count() >= 1);
            }
        }
    }

    #[test]
    fn held_controls_stop_on_release(
        hold_ms in 0u64..2_000,
        after_ms in 0u64..2_000,
    ) {
        let catalog = TempleCatalog::bundled();
        let saved = TempleConfiguration::empty(ScreenSize::default());
        let config = PlacementConfig::default();
        let mut wizard = ConfigurationWizard::resume(&saved, ScreenSize::default(), &config);
        wizard.next().unwrap();
        wizard.next().unwrap();
        wizard.select_deity(&catalog, &DeityId::new("shiva"), "shiva_1").unwrap();
        wizard.next().unwrap();
        wizard.select_target(EntityId(1));

        let control = PlacementControl::Nudge(Direction::Down);
        prop_assert!(wizard.press(control, 0));
        wizard.tick(hold_ms);
        wizard.release(control);
        let y = wizard.placement().entities()[0].position.y;

        prop_assert_eq!(wizard.tick(hold_ms + after_ms), 0);
        prop_assert_eq!(wizard.placement().entities()[0].position.y, y);
    }

    #[test]
    fn second_shower_is_ignored_while_running(
        seed in any::<u64>(),
        mixed in any::<bool>(),
        delay in 0u64..2_000,
    ) {
        let config = AppConfig::default();
        let mut choreographer = Choreographer::new(&config, ChaCha8Rng::seed_from_u64(seed));
        let choice = if mixed {
            FlowerChoice::Mixed
        } else {
            FlowerChoice::Single(FlowerKind::Rose)
        };
        let request = choreographer.shower_request(choice);

        prop_assert!(choreographer.drop_flowers(0, request).unwrap());
        let count = choreographer.petal_count();
        prop_assert_eq!(count, (config.shower.row_count * config.shower.items_per_row) as usize);

        choreographer.tick(delay);
        let live = choreographer.petal_count();
        prop_assert!(choreographer.is_shower_running());
        prop_assert!(!choreographer.drop_flowers(delay, request).unwrap());
        prop_assert_eq!(choreographer.petal_count(), live);
    }

    #[test]
    fn ritual_end_leaves_no_petals(
        seed in any::<u64>(),
        ticks in prop::collection::vec(1u64..900, 1..20),
        dismiss in any::<bool>(),
    ) {
        let config = AppConfig::default();
        let mut choreographer = Choreographer::new(&config, ChaCha8Rng::seed_from_u64(seed));
        prop_assert!(choreographer.perform_ritual(0).unwrap());

        let mut now = 0;
        for delta in ticks {
            now += delta;
            choreographer.tick(now);
            if !choreographer.is_ritual_active() {
                break;
            }
        }

        if dismiss {
            choreographer.dismiss();
        } else {
            choreographer.tick(now.max(config.ritual.orbit_duration_ms));
        }
        prop_assert!(!choreographer.is_ritual_active());
        prop_assert_eq!(choreographer.ritual_petal_count(), 0);

        choreographer.tick(now + 60_000);
        prop_assert_eq!(choreographer.ritual_petal_count(), 0);
    }

    #[test]
    fn music_always_comes_back(
        plays in prop::collection::vec((0u64..4_000, any::<bool>()), 1..12),
        bell_load_fails in any::<bool>(),
        play_fails in any::<bool>(),
    ) {
        let assets = AssetStore::bundled(&TempleCatalog::bundled());
        let mut device = SimulatedAudioDevice::new().with_music();
        if bell_load_fails {
            device.fail_loads_of("bell");
        }
        device.fail_plays(play_fails);
        let audio_config = AudioConfig::default();
        let mut audio = SyncCoordinator::new(device, audio_config.clone());

        let mut now = 0;
        for (delta, conch) in plays {
            now += delta;
            audio.tick(now);
            let effect = if conch { SoundEffect::Conch } else { SoundEffect::Bell };
            let _ = audio.play_effect(now, effect, &assets);
            prop_assert!(!audio.backend().is_music_playing());
        }

        audio.tick(now + audio_config.effect_duration_ms + audio_config.resume_grace_ms);
        prop_assert!(audio.backend().is_music_playing());
        prop_assert!(audio.is_idle());
        prop_assert_eq!(audio.backend().playing_count(), 0);
    }
}

use serde::{Deserialize, Serialize};

use super::actor::{ActorId, ActorKind, AnimatedActor, BellSide};
use crate::{
    audio::SoundEffect,
    config::BellConfig,
    easing::{Ease, Lerp},
    geometry::Point,
    timeline::{Millis, Sequence, SequenceDriver, Step},
};

/// Number of phases in one bell swing.
pub const BELL_PHASES: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BellPhase {
    Rest,
    Swing,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct BellStep {
    pub phase: BellPhase,
    pub target_deg: f64,
    pub cue: Option<SoundEffect>,
}

/// rest, swing, rest, swing, rest. Only the left bell carries sound cues so
/// the pair rings once.
fn bell_sequence(config: &BellConfig, side: BellSide, double_ring: bool) -> Sequence<BellStep> {
    let angle = config.swing_deg * side.sign();
    let cue = |wanted: bool| (wanted && side == BellSide::Left).then_some(SoundEffect::Bell);
    let step = |phase, target_deg, cue| Step::new(config.phase_ms, BellStep { phase, target_deg, cue });

    Sequence::new(vec![
        step(BellPhase::Rest, 0.0, cue(true)),
        step(BellPhase::Swing, angle, None),
        step(BellPhase::Rest, 0.0, None),
        step(BellPhase::Swing, angle, cue(double_ring)),
        step(BellPhase::Rest, 0.0, None),
    ])
}

/// One bell working through its phase sequence.
#[derive(Debug, Clone)]
pub(crate) struct BellSwing {
    pub id: ActorId,
    pub side: BellSide,
    anchor: Point,
    driver: SequenceDriver<BellStep>,
}

impl BellSwing {
    pub fn new(
        id: ActorId,
        side: BellSide,
        anchor: Point,
        config: &BellConfig,
        starts_at: Millis,
        double_ring: bool,
    ) -> Self {
        Self {
            id,
            side,
            anchor,
            driver: SequenceDriver::new(bell_sequence(config, side, double_ring), starts_at),
        }
    }

    pub fn poll(&mut self, now: Millis) -> Vec<(usize, BellStep)> {
        self.driver.poll(now)
    }

    pub fn is_finished(&self, now: Millis) -> bool {
        self.driver.is_finished(now)
    }

    pub fn rotation_deg(&self, now: Millis) -> f64 {
        let Some(cursor) = self.driver.cursor(now) else {
            return 0.0;
        };
        let steps = self.driver.sequence().steps();
        let from = cursor
            .index
            .checked_sub(1)
            .map(|previous| steps[previous].action.target_deg)
            .unwrap_or(0.0);
        let to = steps[cursor.index].action.target_deg;
        f64::lerp(&from, &to, Ease::InOutSine.apply(cursor.progress))
    }

    pub fn actor(&self, now: Millis) -> AnimatedActor {
        AnimatedActor {
            id: self.id,
            kind: ActorKind::Bell(self.side),
            spawn_time: self.driver.started_at(),
            origin_position: self.anchor,
            position: self.anchor,
            opacity: 1.0,
            scale: 1.0,
            rotation_deg: self.rotation_deg(now),
            retire_at: self.driver.ends_at(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> BellConfig {
        BellConfig {
            phase_ms: 100,
            swing_deg: 20.0,
            stagger_ms: 50,
        }
    }

    #[test]
    fn sequence_has_five_alternating_phases() {
        let seq = bell_sequence(&config(), BellSide::Left, false);
        let phases: Vec<_> = seq.steps().iter().map(|s| s.action.phase).collect();
        assert_eq!(phases.len(), BELL_PHASES);
        assert_eq!(
            phases,
            vec![
                BellPhase::Rest,
                BellPhase::Swing,
                BellPhase::Rest,
                BellPhase::Swing,
                BellPhase::Rest
            ]
        );
    }

    #[test]
    fn bells_mirror_each_other() {
        let left = BellSwing::new(ActorId(1), BellSide::Left, Point::ORIGIN, &config(), 0, false);
        let right = BellSwing::new(ActorId(2), BellSide::Right, Point::ORIGIN, &config(), 0, false);

        assert_eq!(left.rotation_deg(200), 20.0);
        assert_eq!(right.rotation_deg(200), -20.0);
        assert!((left.rotation_deg(150) + right.rotation_deg(150)).abs() < 1e-12);
        assert_eq!(left.rotation_deg(10_000), 0.0);
    }

    #[test]
    fn only_the_left_bell_cues_sound() {
        let left = bell_sequence(&config(), BellSide::Left, true);
        let right = bell_sequence(&config(), BellSide::Right, true);

        let cues = |seq: &Sequence<BellStep>| seq.steps().iter().filter(|s| s.action.cue.is_some()).count();
        assert_eq!(cues(&left), 2);
        assert_eq!(cues(&right), 0);
        assert_eq!(cues(&bell_sequence(&config(), BellSide::Left, false)), 1);
    }

    #[test]
    fn rests_before_start() {
        let bell = BellSwing::new(ActorId(1), BellSide::Left, Point::ORIGIN, &config(), 500, false);
        assert_eq!(bell.rotation_deg(100), 0.0);
        assert!(!bell.is_finished(100));
        assert_eq!(bell.actor(0).retire_at, 1_000);
    }
}

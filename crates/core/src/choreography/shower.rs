use rand::Rng;

use super::actor::{ActorId, ActorKind, AnimatedActor, FlowerChoice, FlowerKind};
use crate::{
    config::ShowerConfig,
    easing::{progress, Ease},
    geometry::{Point, ScreenSize},
    timeline::Millis,
    Result, TempleError,
};

/// Who spawned a petal. Ritual petals are cleared with the orbit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PetalSource {
    Shower,
    Ritual,
}

/// A single falling flower. Its pose is a pure function of time.
#[derive(Debug, Clone)]
pub(crate) struct FallingPetal {
    pub id: ActorId,
    pub flower: FlowerKind,
    pub source: PetalSource,
    pub spawn_at: Millis,
    pub start: Point,
    pub target_y: f64,
    pub fall_ms: Millis,
    scale_in_ms: Millis,
    fade_start: f64,
    fade_end: f64,
}

impl FallingPetal {
    pub fn retire_at(&self) -> Millis {
        self.spawn_at + self.fall_ms
    }

    /// Fraction of the fall distance covered at `now`.
    pub fn fall_fraction(&self, now: Millis) -> f64 {
        Ease::InQuad.apply(progress(now, self.spawn_at, self.fall_ms))
    }

    pub fn opacity(&self, now: Millis) -> f64 {
        let fallen = self.fall_fraction(now);
        if fallen <= self.fade_start {
            1.0
        } else if fallen >= self.fade_end {
            0.0
        } else {
            1.0 - (fallen - self.fade_start) / (self.fade_end - self.fade_start)
        }
    }

    pub fn actor(&self, now: Millis) -> AnimatedActor {
        let fallen = self.fall_fraction(now);
        let scale = Ease::OutCubic.apply(progress(now, self.spawn_at, self.scale_in_ms));
        AnimatedActor {
            id: self.id,
            kind: ActorKind::Flower(self.flower),
            spawn_time: self.spawn_at,
            origin_position: self.start,
            position: Point::new(self.start.x, self.start.y + (self.target_y - self.start.y) * fallen),
            opacity: self.opacity(now),
            scale,
            rotation_deg: 0.0,
            retire_at: self.retire_at(),
        }
    }
}

/// Upper bound on the petals a single request may spawn.
pub const MAX_PETALS_PER_SHOWER: usize = 10_000;

/// Shape of one batch of falling petals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShowerRequest {
    pub choice: FlowerChoice,
    pub rows: u32,
    pub per_row: u32,
}

/// Lays out `rows x per_row` petals spread evenly across the width.
///
/// Nothing is returned unless every petal could be set up.
pub(crate) fn spawn_petals<R: Rng + ?Sized>(
    rng: &mut R,
    next_id: &mut u64,
    screen: ScreenSize,
    config: &ShowerConfig,
    request: ShowerRequest,
    source: PetalSource,
    now: Millis,
) -> Result<Vec<FallingPetal>> {
    if request.rows == 0 || request.per_row == 0 {
        return Err(TempleError::InvalidInput("a shower needs at least one row and column"));
    }
    let total = request
        .rows
        .checked_mul(request.per_row)
        .and_then(|total| usize::try_from(total).ok())
        .filter(|total| *total <= MAX_PETALS_PER_SHOWER)
        .ok_or(TempleError::InvalidInput("too many petals in one shower"))?;
    if !(screen.width > 0.0 && screen.height > 0.0) {
        return Err(TempleError::InvalidInput("cannot drop flowers on an empty screen"));
    }
    if !(config.fade_start_fraction < config.fade_end_fraction) {
        return Err(TempleError::InvalidInput("fade must start before it ends"));
    }

    let size = config.particle_size_px;
    let spacing = screen.width / f64::from(request.per_row);
    let max_x = (screen.width - size).max(0.0);
    let max_y = (screen.height - size).max(0.0);
    let start_band = config.start_band_y_fraction * screen.height;
    let target_band = config.target_band_y_fraction * screen.height;

    let mut petals = Vec::with_capacity(total);
    for row in 0..request.rows {
        for column in 0..request.per_row {
            let centre = (f64::from(column) + 0.5) * spacing - size / 2.0;
            let x = (centre + jitter(rng, config.x_jitter_px)).clamp(0.0, max_x);
            let y = (start_band + band_offset(rng, config.y_jitter_px)).min(max_y);
            let target_y = (target_band + band_offset(rng, config.y_jitter_px)).min(max_y);
            let fall_ms = config.fall_ms
                + rng.random_range(0..=config.fall_jitter_ms)
                + u64::from(row) * config.row_delay_ms;

            *next_id += 1;
            petals.push(FallingPetal {
                id: ActorId(*next_id),
                flower: request.choice.pick(rng),
                source,
                spawn_at: now,
                start: Point::new(x, y),
                target_y: target_y.max(y),
                fall_ms: fall_ms.max(1),
                scale_in_ms: config.scale_in_ms,
                fade_start: config.fade_start_fraction,
                fade_end: config.fade_end_fraction,
            });
        }
    }
    Ok(petals)
}

fn jitter<R: Rng + ?Sized>(rng: &mut R, amplitude: f64) -> f64 {
    if amplitude > 0.0 {
        rng.random_range(-amplitude..=amplitude)
    } else {
        0.0
    }
}

fn band_offset<R: Rng + ?Sized>(rng: &mut R, depth: f64) -> f64 {
    if depth > 0.0 {
        rng.random_range(0.0..=depth)
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    const SCREEN: ScreenSize = ScreenSize::new(400.0, 800.0);

    fn spawn(request: ShowerRequest) -> Result<Vec<FallingPetal>> {
        let mut rng = ChaCha8Rng::seed_from_u64(9);
        let mut next_id = 0;
        spawn_petals(
            &mut rng,
            &mut next_id,
            SCREEN,
            &ShowerConfig::default(),
            request,
            PetalSource::Shower,
            1_000,
        )
    }

    fn request(rows: u32, per_row: u32) -> ShowerRequest {
        ShowerRequest {
            choice: FlowerChoice::Single(FlowerKind::Marigold),
            rows,
            per_row,
        }
    }

    #[test]
    fn spawns_rows_times_columns_on_screen() {
        let petals = spawn(request(3, 4)).unwrap();
        assert_eq!(petals.len(), 12);
        for petal in &petals {
            assert!(petal.start.x >= 0.0 && petal.start.x <= SCREEN.width - 32.0);
            assert!(petal.start.y < petal.target_y);
            assert_eq!(petal.spawn_at, 1_000);
        }
    }

    #[test]
    fn later_rows_fall_longer() {
        let config = ShowerConfig::default();
        let petals = spawn(request(3, 2)).unwrap();
        let last_row = &petals[4];
        assert!(last_row.fall_ms >= config.fall_ms + 2 * config.row_delay_ms);
        assert!(petals[0].fall_ms <= config.fall_ms + config.fall_jitter_ms);
    }

    #[test]
    fn columns_are_spread_across_width() {
        let petals = spawn(request(1, 4)).unwrap();
        let xs: Vec<f64> = petals.iter().map(|p| p.start.x).collect();
        assert!(xs.windows(2).all(|pair| pair[0] < pair[1]));
    }

    #[test]
    fn empty_requests_fail() {
        assert!(spawn(request(0, 3)).is_err());
        assert!(spawn(request(3, 0)).is_err());
    }

    #[test]
    fn oversized_grids_fail_without_spawning() {
        let mut next_id = 0;
        let mut rng = ChaCha8Rng::seed_from_u64(9);
        for (rows, per_row) in [(u32::MAX, 2), (200, 200)] {
            let result = spawn_petals(
                &mut rng,
                &mut next_id,
                SCREEN,
                &ShowerConfig::default(),
                request(rows, per_row),
                PetalSource::Shower,
                0,
            );
            assert!(matches!(result, Err(TempleError::InvalidInput(_))));
        }
        assert_eq!(next_id, 0);
        assert_eq!(spawn(request(100, 100)).unwrap().len(), MAX_PETALS_PER_SHOWER);
    }

    #[test]
    fn fades_out_before_landing() {
        let petal = &spawn(request(1, 1)).unwrap()[0];
        assert_eq!(petal.opacity(petal.spawn_at), 1.0);
        assert_eq!(petal.opacity(petal.retire_at()), 0.0);

        let before_fade = petal.actor(petal.spawn_at + petal.fall_ms / 2);
        assert_eq!(before_fade.opacity, 1.0);
        assert!(before_fade.position.y > petal.start.y);
        assert!(before_fade.position.y < petal.target_y);
    }

    #[test]
    fn scales_in_quickly() {
        let petal = &spawn(request(1, 1)).unwrap()[0];
        assert_eq!(petal.actor(petal.spawn_at).scale, 0.0);
        assert!(petal.actor(petal.spawn_at + 100).scale > 0.5);
        assert_eq!(petal.actor(petal.spawn_at + 300).scale, 1.0);
    }
}

use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::{geometry::Point, timeline::Millis};

/// Closed set of flowers a shower can drop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FlowerKind {
    Marigold,
    Rose,
    Jasmine,
    Lotus,
    Hibiscus,
}

impl FlowerKind {
    /// Palette used when a shower asks for mixed flowers.
    pub const PALETTE: [FlowerKind; 5] = [
        Self::Marigold,
        Self::Rose,
        Self::Jasmine,
        Self::Lotus,
        Self::Hibiscus,
    ];

    pub fn asset_key(self) -> &'static str {
        match self {
            Self::Marigold => "flower_marigold",
            Self::Rose => "flower_rose",
            Self::Jasmine => "flower_jasmine",
            Self::Lotus => "flower_lotus",
            Self::Hibiscus => "flower_hibiscus",
        }
    }
}

/// Which flowers a shower drops.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlowerChoice {
    Single(FlowerKind),
    /// Every particle draws its own kind from [`FlowerKind::PALETTE`].
    Mixed,
}

impl FlowerChoice {
    pub(crate) fn pick<R: Rng + ?Sized>(self, rng: &mut R) -> FlowerKind {
        match self {
            Self::Single(kind) => kind,
            Self::Mixed => FlowerKind::PALETTE[rng.random_range(0..FlowerKind::PALETTE.len())],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BellSide {
    Left,
    Right,
}

impl BellSide {
    /// Sign applied to the swing angle so the two bells mirror each other.
    pub fn sign(self) -> f64 {
        match self {
            Self::Left => 1.0,
            Self::Right => -1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActorKind {
    Flower(FlowerKind),
    Bell(BellSide),
    Tray,
}

impl ActorKind {
    pub fn asset_key(self) -> &'static str {
        match self {
            Self::Flower(kind) => kind.asset_key(),
            Self::Bell(_) => "bell",
            Self::Tray => "thali",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ActorId(pub u64);

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "actor-{}", self.0)
    }
}

/// Render-ready pose of one transient animated unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnimatedActor {
    pub id: ActorId,
    pub kind: ActorKind,
    pub spawn_time: Millis,
    pub origin_position: Point,
    pub position: Point,
    pub opacity: f64,
    pub scale: f64,
    pub rotation_deg: f64,
    /// The actor retires once the clock reaches this time.
    pub retire_at: Millis,
}

impl AnimatedActor {
    pub fn is_retired(&self, now: Millis) -> bool {
        now >= self.retire_at
    }
}

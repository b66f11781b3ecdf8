use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{
    choreography::MAX_PETALS_PER_SHOWER, geometry::ScreenSize, timeline::Millis, Result, TempleError,
};

/// Top-level configuration structure for the application.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub screen: ScreenSize,
    pub placement: PlacementConfig,
    pub shower: ShowerConfig,
    pub bells: BellConfig,
    pub ritual: RitualConfig,
    pub audio: AudioConfig,
    pub notices: NoticeConfig,
    /// Seed for every jittered or randomly assigned animation value. A fresh
    /// seed is drawn when absent.
    pub seed: Option<u64>,
}

impl AppConfig {
    /// Parses a configuration from JSON, filling omitted fields with defaults.
    pub fn from_json_str(raw: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and validates a JSON configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    /// Rejects configurations the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        if !(self.screen.width > 0.0 && self.screen.height > 0.0) {
            return Err(TempleError::InvalidInput("screen dimensions must be positive"));
        }
        self.placement.validate()?;
        if self.shower.row_count == 0 || self.shower.items_per_row == 0 {
            return Err(TempleError::InvalidInput("shower must spawn at least one particle"));
        }
        let petals = u64::from(self.shower.row_count) * u64::from(self.shower.items_per_row);
        if petals > MAX_PETALS_PER_SHOWER as u64 {
            return Err(TempleError::InvalidInput("shower grid is too large"));
        }
        if self.shower.fade_start_fraction >= self.shower.fade_end_fraction {
            return Err(TempleError::InvalidInput("shower fade must start before it ends"));
        }
        if self.bells.phase_ms == 0 {
            return Err(TempleError::InvalidInput("bell phases need a duration"));
        }
        if self.ritual.flower_interval_ms == 0 || self.ritual.orbit_duration_ms == 0 {
            return Err(TempleError::InvalidInput("ritual timings must be positive"));
        }
        if self.ritual.flowers_per_batch == 0 {
            return Err(TempleError::InvalidInput("ritual batches need at least one flower"));
        }
        Ok(())
    }
}

/// Layout and bounds for placed deity images.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlacementConfig {
    /// Horizontal position of each insertion slot, as a fraction of width.
    pub slot_x_fractions: Vec<f64>,
    /// Top edge of a freshly placed entity, as a fraction of height.
    pub default_y_fraction: f64,
    /// Default entity width as a fraction of screen width.
    pub default_width_fraction: f64,
    /// Height divided by width for the source artwork.
    pub aspect_ratio: f64,
    /// Smallest allowed width as a fraction of screen width.
    pub min_width_fraction: f64,
    /// Largest allowed extent as a fraction of the matching screen dimension.
    pub max_extent_fraction: f64,
    pub grow_factor: f64,
    pub shrink_factor: f64,
    pub move_step_px: f64,
    /// Repeat interval of a press-and-hold control.
    pub hold_tick_ms: Millis,
}

impl PlacementConfig {
    fn validate(&self) -> Result<()> {
        if self.slot_x_fractions.is_empty() {
            return Err(TempleError::InvalidInput("placement needs at least one slot"));
        }
        if !(self.aspect_ratio > 0.0 && self.default_width_fraction > 0.0) {
            return Err(TempleError::InvalidInput("entity size must be positive"));
        }
        if !(self.min_width_fraction > 0.0 && self.min_width_fraction < self.max_extent_fraction) {
            return Err(TempleError::InvalidInput("minimum size must be below the maximum"));
        }
        if self.max_extent_fraction > 1.0 {
            return Err(TempleError::InvalidInput("entities cannot outgrow the screen"));
        }
        if self.hold_tick_ms == 0 {
            return Err(TempleError::InvalidInput("hold tick must be positive"));
        }
        Ok(())
    }
}

impl Default for PlacementConfig {
    fn default() -> Self {
        Self {
            slot_x_fractions: vec![0.1, 0.4, 0.7],
            default_y_fraction: 0.35,
            default_width_fraction: 0.3,
            aspect_ratio: 1.2,
            min_width_fraction: 0.15,
            max_extent_fraction: 0.9,
            grow_factor: 1.05,
            shrink_factor: 0.95,
            move_step_px: 5.0,
            hold_tick_ms: 100,
        }
    }
}

/// Falling flower shower parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShowerConfig {
    pub row_count: u32,
    pub items_per_row: u32,
    /// Top of the spawn band, as a fraction of height.
    pub start_band_y_fraction: f64,
    /// Top of the landing band, as a fraction of height.
    pub target_band_y_fraction: f64,
    /// Maximum absolute jitter applied to start x.
    pub x_jitter_px: f64,
    /// Maximum jitter (downwards) within the start and target bands.
    pub y_jitter_px: f64,
    pub scale_in_ms: Millis,
    pub fall_ms: Millis,
    pub fall_jitter_ms: Millis,
    pub row_delay_ms: Millis,
    /// Fraction of the fall after which the particle starts fading.
    pub fade_start_fraction: f64,
    /// Fraction of the fall at which the particle is fully transparent.
    pub fade_end_fraction: f64,
    pub particle_size_px: f64,
}

impl Default for ShowerConfig {
    fn default() -> Self {
        Self {
            row_count: 5,
            items_per_row: 6,
            start_band_y_fraction: 0.02,
            target_band_y_fraction: 0.85,
            x_jitter_px: 12.0,
            y_jitter_px: 20.0,
            scale_in_ms: 300,
            fall_ms: 4_000,
            fall_jitter_ms: 800,
            row_delay_ms: 350,
            fade_start_fraction: 0.7,
            fade_end_fraction: 0.95,
            particle_size_px: 32.0,
        }
    }
}

/// Bell swing choreography.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BellConfig {
    pub phase_ms: Millis,
    pub swing_deg: f64,
    /// Delay before the right bell starts its sequence.
    pub stagger_ms: Millis,
}

impl Default for BellConfig {
    fn default() -> Self {
        Self {
            phase_ms: 250,
            swing_deg: 20.0,
            stagger_ms: 150,
        }
    }
}

/// Offering tray orbit and its accompanying flower generator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RitualConfig {
    pub orbit_duration_ms: Millis,
    pub flower_interval_ms: Millis,
    pub flowers_per_batch: u32,
    pub tray_size_px: f64,
}

impl Default for RitualConfig {
    fn default() -> Self {
        Self {
            orbit_duration_ms: 8_000,
            flower_interval_ms: 700,
            flowers_per_batch: 4,
            tray_size_px: 96.0,
        }
    }
}

/// Configuration specific to the audio subsystem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// How long a one-shot effect plays before it is stopped.
    pub effect_duration_ms: Millis,
    /// Pause between stopping an effect and resuming background music.
    pub resume_grace_ms: Millis,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            effect_duration_ms: 3_000,
            resume_grace_ms: 200,
        }
    }
}

/// Transient notice behaviour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NoticeConfig {
    pub ttl_ms: Millis,
}

impl Default for NoticeConfig {
    fn default() -> Self {
        Self { ttl_ms: 2_500 }
    }
}

//! Core library for the Virtual Temple experience.
//!
//! The crate models a personalised devotional scene: a four-step wizard that
//! composes a temple (backdrop, style, up to three deities and their
//! placement), ritual animations played over it, and the coordination of
//! short sound effects with background music. Every module runs against a
//! virtual clock so the whole stage can be driven deterministically from the
//! command line or from tests.

pub mod assets;
pub mod audio;
pub mod choreography;
pub mod config;
pub mod easing;
pub mod error;
pub mod geometry;
pub mod notice;
pub mod persistence;
pub mod placement;
pub mod stage;
pub mod timeline;
pub mod wizard;

pub use assets::{AssetStore, Deity, DeityId, TempleCatalog};
pub use audio::{AudioBackend, SimulatedAudioDevice, SoundEffect, SyncCoordinator};
pub use choreography::{AnimatedActor, ChoreoEvent, Choreographer, FlowerChoice, FlowerKind};
pub use config::AppConfig;
pub use easing::{Ease, Lerp};
pub use error::{Result, TempleError};
pub use geometry::{Point, Rect, ScreenSize, Size};
pub use notice::{Notice, NoticeBoard, NoticeKind};
pub use persistence::{JsonFileGateway, MemoryGateway, PersistenceGateway, TempleConfiguration, UserId};
pub use placement::{Direction, EntityId, PlacedEntity, PlacementModel, MAX_ENTITIES};
pub use stage::{RitualAction, StageMode, TempleStage};
pub use timeline::{Millis, ScheduledEvent, Scheduler, Sequence, SequenceDriver, Step, VirtualClock};
pub use wizard::{ConfigurationWizard, PlacementControl, WizardStep};

//! Positions and sizes of the deity images placed in the temple.
//!
//! # Invariants
//! - At most [`MAX_ENTITIES`] entities are live.
//! - Every entity's bounding box lies inside the screen.
//! - Widths stay between the configured floor and ceiling and heights follow
//!   the entity's own aspect ratio.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{
    assets::DeityId,
    config::PlacementConfig,
    geometry::{clamp_origin, remap_rect, Point, Rect, ScreenSize, Size},
    Result, TempleError,
};

pub const MAX_ENTITIES: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(pub u32);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "entity-{}", self.0)
    }
}

/// One deity image placed by the user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlacedEntity {
    pub entity_id: EntityId,
    pub deity_id: DeityId,
    pub image_ref: String,
    pub position: Point,
    pub size: Size,
}

impl PlacedEntity {
    pub fn rect(&self) -> Rect {
        Rect::new(self.position, self.size)
    }

    fn aspect(&self) -> f64 {
        if self.size.width > 0.0 {
            self.size.height / self.size.width
        } else {
            1.0
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    fn delta(self, step: f64) -> (f64, f64) {
        match self {
            Self::Up => (0.0, -step),
            Self::Down => (0.0, step),
            Self::Left => (-step, 0.0),
            Self::Right => (step, 0.0),
        }
    }
}

/// In-memory placement state for one editing session. Performs no I/O.
#[derive(Debug, Clone)]
pub struct PlacementModel {
    screen: ScreenSize,
    config: PlacementConfig,
    entities: Vec<PlacedEntity>,
    selected: Option<EntityId>,
    next_id: u32,
}

impl PlacementModel {
    pub fn new(screen: ScreenSize, config: PlacementConfig) -> Self {
        Self {
            screen,
            config,
            entities: Vec::new(),
            selected: None,
            next_id: 1,
        }
    }

    pub fn screen(&self) -> ScreenSize {
        self.screen
    }

    pub fn entities(&self) -> &[PlacedEntity] {
        &self.entities
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn get(&self, id: EntityId) -> Option<&PlacedEntity> {
        self.entities.iter().find(|entity| entity.entity_id == id)
    }

    pub fn find_deity(&self, deity: &DeityId) -> Option<&PlacedEntity> {
        self.entities.iter().find(|entity| &entity.deity_id == deity)
    }

    /// Places a new entity at the default slot for its insertion index.
    pub fn add_entity(&mut self, deity_id: DeityId, image_ref: impl Into<String>) -> Result<EntityId> {
        if self.entities.len() >= MAX_ENTITIES {
            return Err(TempleError::MaxEntitiesExceeded);
        }

        let index = self.entities.len();
        let slot = self
            .config
            .slot_x_fractions
            .get(index)
            .or_else(|| self.config.slot_x_fractions.last())
            .copied()
            .unwrap_or(0.0);

        let aspect = self.config.aspect_ratio;
        let (min_w, max_w) = self.width_bounds(aspect);
        let width = (self.config.default_width_fraction * self.screen.width).clamp(min_w, max_w);
        let size = Size::new(width, width * aspect);
        let origin = Point::new(
            slot * self.screen.width,
            self.config.default_y_fraction * self.screen.height,
        );

        let entity_id = EntityId(self.next_id);
        self.next_id += 1;
        self.entities.push(PlacedEntity {
            entity_id,
            deity_id,
            image_ref: image_ref.into(),
            position: clamp_origin(origin, size, self.screen),
            size,
        });
        tracing::debug!(entity = %entity_id, index, "placed entity");
        Ok(entity_id)
    }

    /// Removes an entity. Unknown ids are ignored.
    pub fn remove_entity(&mut self, id: EntityId) {
        self.entities.retain(|entity| entity.entity_id != id);
        if self.selected == Some(id) {
            self.selected = None;
        }
    }

    pub fn clear(&mut self) {
        self.entities.clear();
        self.selected = None;
    }

    /// Swaps the artwork of an entity without moving it.
    pub fn set_image(&mut self, id: EntityId, image_ref: impl Into<String>) -> bool {
        match self.entity_mut(id) {
            Some(entity) => {
                entity.image_ref = image_ref.into();
                true
            }
            None => false,
        }
    }

    /// Marks the entity targeted by resize and move controls. Selecting an
    /// unknown id clears the target and returns `false`.
    pub fn select_for_edit(&mut self, id: Option<EntityId>) -> bool {
        match id {
            Some(id) if self.get(id).is_some() => {
                self.selected = Some(id);
                true
            }
            Some(_) => {
                self.selected = None;
                false
            }
            None => {
                self.selected = None;
                true
            }
        }
    }

    pub fn selected(&self) -> Option<EntityId> {
        self.selected
    }

    /// Topmost entity under `point`.
    pub fn hit_test(&self, point: Point) -> Option<EntityId> {
        self.entities
            .iter()
            .rev()
            .find(|entity| {
                let rect = entity.rect();
                point.x >= rect.origin.x
                    && point.x <= rect.right()
                    && point.y >= rect.origin.y
                    && point.y <= rect.bottom()
            })
            .map(|entity| entity.entity_id)
    }

    /// Scales the selected entity by `factor`, keeping its top-left anchor
    /// and aspect ratio. No-op unless `id` is the edit target.
    pub fn resize(&mut self, id: EntityId, factor: f64) -> bool {
        if self.selected != Some(id) || !(factor.is_finite() && factor > 0.0) {
            return false;
        }
        let Some(aspect) = self.get(id).map(PlacedEntity::aspect) else {
            return false;
        };
        let (min_w, max_w) = self.width_bounds(aspect);
        let screen = self.screen;
        let Some(entity) = self.entity_mut(id) else {
            return false;
        };

        let width = (entity.size.width * factor).clamp(min_w, max_w);
        entity.size = Size::new(width, width * aspect);
        entity.position = clamp_origin(entity.position, entity.size, screen);
        true
    }

    /// Translates the selected entity, keeping it on screen. No-op unless
    /// `id` is the edit target.
    pub fn move_entity(&mut self, id: EntityId, direction: Direction, step_px: f64) -> bool {
        if self.selected != Some(id) || !step_px.is_finite() {
            return false;
        }
        let screen = self.screen;
        let Some(entity) = self.entity_mut(id) else {
            return false;
        };

        let (dx, dy) = direction.delta(step_px);
        let moved = Point::new(entity.position.x + dx, entity.position.y + dy);
        entity.position = clamp_origin(moved, entity.size, screen);
        true
    }

    /// Replaces the whole set with entities composed on `composed_on`.
    ///
    /// Entities are remapped when the screens differ, then clamped. Anything
    /// beyond [`MAX_ENTITIES`] is dropped.
    pub fn replace_all(&mut self, entities: Vec<PlacedEntity>, composed_on: ScreenSize) {
        if entities.len() > MAX_ENTITIES {
            tracing::warn!(count = entities.len(), "dropping entities beyond the limit");
        }
        self.entities = entities
            .into_iter()
            .take(MAX_ENTITIES)
            .map(|entity| self.rehydrate(entity, composed_on))
            .collect();
        self.selected = None;
        self.next_id = self
            .entities
            .iter()
            .map(|entity| entity.entity_id.0)
            .max()
            .unwrap_or(0)
            + 1;
    }

    fn rehydrate(&self, mut entity: PlacedEntity, composed_on: ScreenSize) -> PlacedEntity {
        if composed_on == self.screen && entity.rect().is_within(&self.screen.bounds()) {
            return entity;
        }
        let rect = remap_rect(entity.rect(), composed_on, self.screen);
        let aspect = if rect.size.width > 0.0 {
            rect.size.height / rect.size.width
        } else {
            self.config.aspect_ratio
        };
        let (min_w, max_w) = self.width_bounds(aspect);
        let width = rect.size.width.clamp(min_w, max_w);
        entity.size = Size::new(width, width * aspect);
        entity.position = clamp_origin(rect.origin, entity.size, self.screen);
        entity
    }

    /// Allowed width range for content with the given height/width ratio.
    fn width_bounds(&self, aspect: f64) -> (f64, f64) {
        let ceiling = self.config.max_extent_fraction;
        let max_w = (ceiling * self.screen.width).min(ceiling * self.screen.height / aspect);
        let min_w = (self.config.min_width_fraction * self.screen.width).min(max_w);
        (min_w, max_w)
    }

    fn entity_mut(&mut self, id: EntityId) -> Option<&mut PlacedEntity> {
        self.entities.iter_mut().find(|entity| entity.entity_id == id)
    }
}

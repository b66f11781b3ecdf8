use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{audio::SoundEffect, choreography::FlowerKind, Result, TempleError};

/// Loadable image referenced by an opaque key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageAsset {
    pub key: String,
    pub path: String,
}

/// Loadable sound referenced by an opaque key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SoundAsset {
    pub key: String,
    pub path: String,
}

/// Registry for every image and sound the temple can reference.
///
/// Unknown keys resolve to the registered placeholder when one exists.
#[derive(Debug, Default, Clone)]
pub struct AssetStore {
    images: HashMap<String, ImageAsset>,
    sounds: HashMap<String, SoundAsset>,
    placeholder_image: Option<ImageAsset>,
    placeholder_sound: Option<SoundAsset>,
}

impl AssetStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store populated with the bundled artwork, flowers and ritual sounds.
    pub fn bundled(catalog: &TempleCatalog) -> Self {
        let mut store = Self::new();
        for deity in &catalog.deities {
            for artwork in &deity.artworks {
                store.register_image(artwork, format!("images/deities/{artwork}.png"));
            }
        }
        for style in &catalog.styles {
            store.register_image(&style.image_ref, format!("images/temples/{}.png", style.image_ref));
        }
        for flower in FlowerKind::PALETTE {
            let key = flower.asset_key();
            store.register_image(key, format!("images/flowers/{key}.png"));
        }
        for effect in [SoundEffect::Bell, SoundEffect::Conch] {
            let key = effect.asset_key();
            store.register_sound(key, format!("sounds/{key}.mp3"));
        }
        store.register_image("thali", "images/ritual/thali.png");
        store.register_image("bell", "images/ritual/bell.png");
        store.set_placeholder_image("images/placeholder.png");
        store
    }

    pub fn register_image(&mut self, key: impl Into<String>, path: impl Into<String>) {
        let key = key.into();
        self.images.insert(
            key.clone(),
            ImageAsset {
                key,
                path: path.into(),
            },
        );
    }

    pub fn register_sound(&mut self, key: impl Into<String>, path: impl Into<String>) {
        let key = key.into();
        self.sounds.insert(
            key.clone(),
            SoundAsset {
                key,
                path: path.into(),
            },
        );
    }

    pub fn set_placeholder_image(&mut self, path: impl Into<String>) {
        self.placeholder_image = Some(ImageAsset {
            key: "placeholder".to_string(),
            path: path.into(),
        });
    }

    pub fn set_placeholder_sound(&mut self, path: impl Into<String>) {
        self.placeholder_sound = Some(SoundAsset {
            key: "placeholder".to_string(),
            path: path.into(),
        });
    }

    pub fn resolve_image(&self, key: &str) -> Result<&ImageAsset> {
        if let Some(asset) = self.images.get(key) {
            return Ok(asset);
        }
        match &self.placeholder_image {
            Some(placeholder) => {
                tracing::warn!(image = key, "unknown image, using placeholder");
                Ok(placeholder)
            }
            None => Err(TempleError::AssetResolutionFailure(format!(
                "unknown image `{key}`"
            ))),
        }
    }

    pub fn resolve_sound(&self, key: &str) -> Result<&SoundAsset> {
        if let Some(asset) = self.sounds.get(key) {
            return Ok(asset);
        }
        match &self.placeholder_sound {
            Some(placeholder) => {
                tracing::warn!(sound = key, "unknown sound, using placeholder");
                Ok(placeholder)
            }
            None => Err(TempleError::AssetResolutionFailure(format!(
                "unknown sound `{key}`"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DeityId(pub String);

impl DeityId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl fmt::Display for DeityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deity {
    pub id: DeityId,
    pub name: String,
    /// Image keys the user can pick from for this deity.
    pub artworks: Vec<String>,
}

/// Gradient shown behind the temple, top to bottom.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Backdrop {
    pub id: String,
    pub colors: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TempleStyle {
    pub id: String,
    pub image_ref: String,
}

/// Everything the configuration wizard offers for selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TempleCatalog {
    pub deities: Vec<Deity>,
    pub backdrops: Vec<Backdrop>,
    pub styles: Vec<TempleStyle>,
}

impl TempleCatalog {
    pub fn bundled() -> Self {
        let deity = |id: &str, name: &str, count: usize| Deity {
            id: DeityId::new(id),
            name: name.to_string(),
            artworks: (1..=count).map(|n| format!("{id}_{n}")).collect(),
        };
        let backdrop = |id: &str, colors: &[&str]| Backdrop {
            id: id.to_string(),
            colors: colors.iter().map(|c| c.to_string()).collect(),
        };
        let style = |id: &str| TempleStyle {
            id: id.to_string(),
            image_ref: format!("temple_{id}"),
        };

        Self {
            deities: vec![
                deity("ganesha", "Ganesha", 3),
                deity("lakshmi", "Lakshmi", 2),
                deity("shiva", "Shiva", 3),
                deity("krishna", "Krishna", 2),
                deity("hanuman", "Hanuman", 2),
                deity("durga", "Durga", 2),
            ],
            backdrops: vec![
                backdrop("saffron", &["#FF9933", "#FFCC80"]),
                backdrop("dusk", &["#4A148C", "#F06292", "#FFB74D"]),
                backdrop("sandal", &["#FFF3E0", "#FFE0B2"]),
            ],
            styles: vec![style("nagara"), style("dravida"), style("vesara")],
        }
    }

    pub fn deity(&self, id: &DeityId) -> Option<&Deity> {
        self.deities.iter().find(|deity| &deity.id == id)
    }

    pub fn backdrop(&self, id: &str) -> Option<&Backdrop> {
        self.backdrops.iter().find(|backdrop| backdrop.id == id)
    }

    pub fn style(&self, id: &str) -> Option<&TempleStyle> {
        self.styles.iter().find(|style| style.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_registered_assets() {
        let mut store = AssetStore::new();
        store.register_image("ganesha_1", "ganesha.png");

        assert_eq!(store.resolve_image("ganesha_1").unwrap().path, "ganesha.png");
    }

    #[test]
    fn errors_on_missing_assets_without_placeholder() {
        let store = AssetStore::new();
        let err = store.resolve_sound("missing").unwrap_err();
        assert!(matches!(err, TempleError::AssetResolutionFailure(_)));
        assert!(format!("{err}").contains("missing"));
    }

    #[test]
    fn falls_back_to_placeholder() {
        let mut store = AssetStore::new();
        store.set_placeholder_image("placeholder.png");
        store.set_placeholder_sound("silence.mp3");

        assert_eq!(store.resolve_image("nope").unwrap().key, "placeholder");
        assert_eq!(store.resolve_sound("nope").unwrap().path, "silence.mp3");
    }

    #[test]
    fn bundled_store_covers_every_flower_and_effect() {
        let catalog = TempleCatalog::bundled();
        let store = AssetStore::bundled(&catalog);

        for flower in FlowerKind::PALETTE {
            assert_ne!(store.resolve_image(flower.asset_key()).unwrap().key, "placeholder");
        }
        assert!(store.resolve_sound(SoundEffect::Bell.asset_key()).is_ok());
        assert!(store.resolve_sound(SoundEffect::Conch.asset_key()).is_ok());
    }

    #[test]
    fn catalog_lookups() {
        let catalog = TempleCatalog::bundled();
        let ganesha = catalog.deity(&DeityId::new("ganesha")).unwrap();
        assert_eq!(ganesha.artworks[0], "ganesha_1");
        assert!(catalog.backdrop("dusk").is_some());
        assert!(catalog.style("gothic").is_none());
    }
}

//! Saved temple configurations.
//!
//! The backend is treated as a last-write-wins key-value store keyed by
//! user id. Retrying is left to the user.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{geometry::ScreenSize, placement::PlacedEntity, Result, TempleError};

const STORAGE_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Everything a user composed in the wizard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TempleConfiguration {
    /// Backdrop gradient colors, top to bottom.
    pub backdrop: Vec<String>,
    pub temple_style: String,
    pub entities: Vec<PlacedEntity>,
    /// Screen the entities were positioned on.
    pub screen: ScreenSize,
}

impl TempleConfiguration {
    pub fn empty(screen: ScreenSize) -> Self {
        Self {
            backdrop: vec!["#FF9933".to_string(), "#FFCC80".to_string()],
            temple_style: "nagara".to_string(),
            entities: Vec::new(),
            screen,
        }
    }
}

/// Backend the temple configuration is saved to.
pub trait PersistenceGateway {
    /// Returns `Ok(None)` when the user has never saved.
    fn load_configuration(&mut self, user: &UserId) -> Result<Option<TempleConfiguration>>;
    fn save_configuration(&mut self, user: &UserId, configuration: &TempleConfiguration) -> Result<()>;
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredConfiguration {
    version: u32,
    user_id: UserId,
    configuration: TempleConfiguration,
}

fn encode(user: &UserId, configuration: &TempleConfiguration) -> Result<String> {
    let stored = StoredConfiguration {
        version: STORAGE_VERSION,
        user_id: user.clone(),
        configuration: configuration.clone(),
    };
    serde_json::to_string_pretty(&stored)
        .map_err(|err| TempleError::PersistenceFailure(format!("cannot encode configuration: {err}")))
}

fn decode(user: &UserId, raw: &str) -> Result<TempleConfiguration> {
    let stored: StoredConfiguration = serde_json::from_str(raw).map_err(|err| {
        TempleError::PersistenceFailure(format!("corrupt configuration for `{user}`: {err}"))
    })?;
    if stored.version != STORAGE_VERSION {
        return Err(TempleError::PersistenceFailure(format!(
            "unsupported configuration version {}",
            stored.version
        )));
    }
    if stored.user_id != *user {
        return Err(TempleError::PersistenceFailure(format!(
            "record for `{}` found under `{user}`",
            stored.user_id
        )));
    }
    Ok(stored.configuration)
}

/// Gateway holding encoded records in memory. Saves and loads can be made
/// to fail.
#[derive(Debug, Default)]
pub struct MemoryGateway {
    records: HashMap<UserId, String>,
    fail_saves: bool,
    fail_loads: bool,
    saves: usize,
}

impl MemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_saves(&mut self, fail: bool) {
        self.fail_saves = fail;
    }

    pub fn fail_loads(&mut self, fail: bool) {
        self.fail_loads = fail;
    }

    /// Number of successful saves.
    pub fn save_count(&self) -> usize {
        self.saves
    }

    pub fn raw_record(&self, user: &UserId) -> Option<&str> {
        self.records.get(user).map(String::as_str)
    }
}

impl PersistenceGateway for MemoryGateway {
    fn load_configuration(&mut self, user: &UserId) -> Result<Option<TempleConfiguration>> {
        if self.fail_loads {
            return Err(TempleError::PersistenceFailure("backend unavailable".to_string()));
        }
        self.records.get(user).map(|raw| decode(user, raw)).transpose()
    }

    fn save_configuration(&mut self, user: &UserId, configuration: &TempleConfiguration) -> Result<()> {
        if self.fail_saves {
            return Err(TempleError::PersistenceFailure("backend unavailable".to_string()));
        }
        let raw = encode(user, configuration)?;
        self.records.insert(user.clone(), raw);
        self.saves += 1;
        Ok(())
    }
}

/// Gateway storing one JSON document per user inside a directory.
#[derive(Debug, Clone)]
pub struct JsonFileGateway {
    dir: PathBuf,
}

impl JsonFileGateway {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File holding `user`'s record. Bytes outside `[A-Za-z0-9-]` are
    /// written as `_XX` hex escapes, so distinct ids never share a file.
    pub fn path_for(&self, user: &UserId) -> PathBuf {
        let mut stem = String::with_capacity(user.0.len());
        for byte in user.0.bytes() {
            if byte.is_ascii_alphanumeric() || byte == b'-' {
                stem.push(char::from(byte));
            } else {
                stem.push_str(&format!("_{byte:02X}"));
            }
        }
        self.dir.join(format!("{stem}.json"))
    }
}

impl PersistenceGateway for JsonFileGateway {
    fn load_configuration(&mut self, user: &UserId) -> Result<Option<TempleConfiguration>> {
        let path = self.path_for(user);
        let raw = match std::fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => {
                return Err(TempleError::PersistenceFailure(format!(
                    "cannot read `{}`: {err}",
                    path.display()
                )))
            }
        };
        decode(user, &raw).map(Some)
    }

    fn save_configuration(&mut self, user: &UserId, configuration: &TempleConfiguration) -> Result<()> {
        let raw = encode(user, configuration)?;
        let path = self.path_for(user);
        let staging = path.with_extension("json.tmp");
        let write = || -> std::io::Result<()> {
            std::fs::create_dir_all(&self.dir)?;
            std::fs::write(&staging, raw.as_bytes())?;
            std::fs::rename(&staging, &path)
        };
        write().map_err(|err| {
            TempleError::PersistenceFailure(format!("cannot write `{}`: {err}", path.display()))
        })?;
        tracing::debug!(path = %path.display(), "configuration written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::DeityId;
    use crate::geometry::{Point, Size};
    use crate::placement::EntityId;

    fn sample() -> TempleConfiguration {
        let mut config = TempleConfiguration::empty(ScreenSize::new(390.0, 844.0));
        config.entities.push(PlacedEntity {
            entity_id: EntityId(1),
            deity_id: DeityId::new("ganesha"),
            image_ref: "ganesha_2".to_string(),
            position: Point::new(39.000000000000004, 295.4),
            size: Size::new(0.1 * 3.0 * 390.0, 140.39999999999998),
        });
        config
    }

    #[test]
    fn memory_gateway_round_trips_exactly() {
        let mut gateway = MemoryGateway::new();
        let user = UserId::new("devotee");

        assert_eq!(gateway.load_configuration(&user).unwrap(), None);
        gateway.save_configuration(&user, &sample()).unwrap();

        let loaded = gateway.load_configuration(&user).unwrap().unwrap();
        assert_eq!(loaded, sample());
        assert_eq!(
            loaded.entities[0].position.x.to_bits(),
            sample().entities[0].position.x.to_bits()
        );
        assert_eq!(gateway.save_count(), 1);
    }

    #[test]
    fn failing_saves_keep_previous_record() {
        let mut gateway = MemoryGateway::new();
        let user = UserId::new("devotee");
        gateway.save_configuration(&user, &sample()).unwrap();

        gateway.fail_saves(true);
        let err = gateway
            .save_configuration(&user, &TempleConfiguration::empty(ScreenSize::default()))
            .unwrap_err();
        assert!(matches!(err, TempleError::PersistenceFailure(_)));

        gateway.fail_saves(false);
        assert_eq!(gateway.load_configuration(&user).unwrap(), Some(sample()));
    }

    #[test]
    fn rejects_unknown_versions() {
        let user = UserId::new("devotee");
        let raw = encode(&user, &sample()).unwrap().replace("\"version\": 1", "\"version\": 9");
        let err = decode(&user, &raw).unwrap_err();
        assert!(err.to_string().contains("version 9"));
    }

    #[test]
    fn file_gateway_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let mut gateway = JsonFileGateway::new(dir.path().join("temples"));
        let user = UserId::new("dev/otee");

        assert_eq!(gateway.load_configuration(&user).unwrap(), None);
        gateway.save_configuration(&user, &sample()).unwrap();

        assert!(gateway.path_for(&user).ends_with("dev_2Fotee.json"));
        assert_eq!(gateway.load_configuration(&user).unwrap(), Some(sample()));
    }

    #[test]
    fn file_gateway_keeps_lookalike_users_apart() {
        let dir = tempfile::tempdir().unwrap();
        let mut gateway = JsonFileGateway::new(dir.path());
        let dotted = UserId::new("a.b");
        let underscored = UserId::new("a_b");

        gateway.save_configuration(&dotted, &sample()).unwrap();
        assert_ne!(gateway.path_for(&dotted), gateway.path_for(&underscored));
        assert_eq!(gateway.load_configuration(&underscored).unwrap(), None);

        let other = TempleConfiguration::empty(ScreenSize::default());
        gateway.save_configuration(&underscored, &other).unwrap();
        assert_eq!(gateway.load_configuration(&dotted).unwrap(), Some(sample()));
        assert_eq!(gateway.load_configuration(&underscored).unwrap(), Some(other));
    }

    #[test]
    fn records_belong_to_their_user() {
        let dir = tempfile::tempdir().unwrap();
        let mut gateway = JsonFileGateway::new(dir.path());
        let owner = UserId::new("owner");
        let intruder = UserId::new("intruder");
        gateway.save_configuration(&owner, &sample()).unwrap();
        std::fs::copy(gateway.path_for(&owner), gateway.path_for(&intruder)).unwrap();

        let err = gateway.load_configuration(&intruder).unwrap_err();
        assert!(matches!(err, TempleError::PersistenceFailure(_)));
        assert!(err.to_string().contains("owner"));
    }

    #[test]
    fn file_gateway_reports_corruption() {
        let dir = tempfile::tempdir().unwrap();
        let mut gateway = JsonFileGateway::new(dir.path());
        let user = UserId::new("devotee");
        std::fs::write(gateway.path_for(&user), "{ not json").unwrap();

        let err = gateway.load_configuration(&user).unwrap_err();
        assert!(matches!(err, TempleError::PersistenceFailure(_)));
    }
}

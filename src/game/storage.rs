use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use serde::{Deserialize, Serialize};
use sled::IVec;

use crate::game::errors::GameError;
use crate::game::types::{PlayerProfile, PROFILE_SCHEMA_VERSION};

const TREE_PROFILES: &str = "profiles";
const TREE_NAMES: &str = "profile_names";

/// Keyed persistence for player profiles.
///
/// Implementations give no atomicity across a get/modify/put sequence;
/// callers serialize per account key (see [`crate::game::locks::AccountLocks`]).
pub trait ProfileStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<PlayerProfile>, GameError>;

    fn put(&self, key: &str, profile: &PlayerProfile) -> Result<(), GameError>;

    fn delete(&self, key: &str) -> Result<(), GameError>;

    /// Resolve a display name to its account key and profile.
    ///
    /// When several accounts carry the same name, the one that most recently
    /// claimed it (created or renamed into it) owns it. Writes that keep the
    /// name, such as a robbery or a trip, never move ownership, except to fill
    /// an index slot left empty by a deleted owner.
    fn find_by_display_name(&self, name: &str)
        -> Result<Option<(String, PlayerProfile)>, GameError>;

    /// Every stored `(account key, profile)` pair.
    fn list_profiles(&self) -> Result<Vec<(String, PlayerProfile)>, GameError>;
}

#[derive(Serialize, Deserialize)]
struct StoredProfile {
    schema_version: u8,
    profile: PlayerProfile,
}

/// Helper builder so tests can easily create throwaway stores with custom paths.
pub struct SledProfileStoreBuilder {
    path: PathBuf,
    temporary: bool,
}

impl SledProfileStoreBuilder {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            temporary: false,
        }
    }

    /// Remove the database files when the store is dropped.
    pub fn temporary(mut self) -> Self {
        self.temporary = true;
        self
    }

    pub fn open(self) -> Result<SledProfileStore, GameError> {
        SledProfileStore::open_with_options(self.path, self.temporary)
    }
}

/// Sled-backed profile persistence.
///
/// Profiles live in one tree keyed by account key; a second tree maps
/// display names to account keys so lookups by name avoid a full scan.
pub struct SledProfileStore {
    _db: sled::Db,
    profiles: sled::Tree,
    names: sled::Tree,
}

impl SledProfileStore {
    /// Open (or create) the store rooted at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, GameError> {
        Self::open_with_options(path, false)
    }

    fn open_with_options<P: AsRef<Path>>(path: P, temporary: bool) -> Result<Self, GameError> {
        let path_ref = path.as_ref();
        std::fs::create_dir_all(path_ref)?;
        let db = sled::Config::new()
            .path(path_ref)
            .temporary(temporary)
            .open()?;
        let profiles = db.open_tree(TREE_PROFILES)?;
        let names = db.open_tree(TREE_NAMES)?;
        Ok(Self {
            _db: db,
            profiles,
            names,
        })
    }

    fn serialize(profile: &PlayerProfile) -> Result<Vec<u8>, GameError> {
        let stored = StoredProfile {
            schema_version: PROFILE_SCHEMA_VERSION,
            profile: profile.clone(),
        };
        Ok(bincode::serialize(&stored)?)
    }

    fn deserialize(bytes: IVec) -> Result<PlayerProfile, GameError> {
        let stored: StoredProfile = bincode::deserialize(&bytes)?;
        if stored.schema_version != PROFILE_SCHEMA_VERSION {
            return Err(GameError::SchemaMismatch {
                entity: "profile",
                expected: PROFILE_SCHEMA_VERSION,
                found: stored.schema_version,
            });
        }
        Ok(stored.profile)
    }

    fn drop_name_index(&self, name: &str, key: &str) -> Result<(), GameError> {
        // Only remove the index entry if it still points at this account.
        if let Some(owner) = self.names.get(name.as_bytes())? {
            if owner.as_ref() == key.as_bytes() {
                self.names.remove(name.as_bytes())?;
            }
        }
        Ok(())
    }
}

impl ProfileStore for SledProfileStore {
    fn get(&self, key: &str) -> Result<Option<PlayerProfile>, GameError> {
        match self.profiles.get(key.as_bytes())? {
            Some(bytes) => Ok(Some(Self::deserialize(bytes)?)),
            None => Ok(None),
        }
    }

    fn put(&self, key: &str, profile: &PlayerProfile) -> Result<(), GameError> {
        let bytes = Self::serialize(profile)?;
        let previous = match self.profiles.insert(key.as_bytes(), bytes)? {
            Some(previous) => Some(Self::deserialize(previous)?),
            None => None,
        };
        let claims_name = match &previous {
            Some(previous) if previous.display_name == profile.display_name => false,
            Some(previous) => {
                self.drop_name_index(&previous.display_name, key)?;
                true
            }
            None => true,
        };
        let name = profile.display_name.as_bytes();
        if claims_name || !self.names.contains_key(name)? {
            self.names.insert(name, key.as_bytes())?;
        }
        self.profiles.flush()?;
        self.names.flush()?;
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), GameError> {
        if let Some(previous) = self.profiles.remove(key.as_bytes())? {
            let previous = Self::deserialize(previous)?;
            self.drop_name_index(&previous.display_name, key)?;
        }
        self.profiles.flush()?;
        self.names.flush()?;
        Ok(())
    }

    fn find_by_display_name(
        &self,
        name: &str,
    ) -> Result<Option<(String, PlayerProfile)>, GameError> {
        let Some(key) = self.names.get(name.as_bytes())? else {
            return Ok(None);
        };
        let key = std::str::from_utf8(&key)
            .map_err(|e| GameError::Internal(format!("non-utf8 account key: {e}")))?
            .to_string();
        Ok(self.get(&key)?.map(|profile| (key, profile)))
    }

    fn list_profiles(&self) -> Result<Vec<(String, PlayerProfile)>, GameError> {
        let mut out = Vec::new();
        for entry in self.profiles.iter() {
            let (key, value) = entry?;
            let key = String::from_utf8_lossy(&key).into_owned();
            out.push((key, Self::deserialize(value)?));
        }
        Ok(out)
    }
}

/// In-process store for tests and `start --memory`.
#[derive(Default)]
pub struct MemoryProfileStore {
    inner: RwLock<MemoryTables>,
}

#[derive(Default)]
struct MemoryTables {
    profiles: HashMap<String, PlayerProfile>,
    /// display name -> account key
    names: HashMap<String, String>,
}

impl MemoryTables {
    fn drop_name_index(&mut self, name: &str, key: &str) {
        if self.names.get(name).is_some_and(|owner| owner == key) {
            self.names.remove(name);
        }
    }
}

impl MemoryProfileStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn poisoned() -> GameError {
        GameError::Internal("memory store lock poisoned".to_string())
    }
}

impl ProfileStore for MemoryProfileStore {
    fn get(&self, key: &str) -> Result<Option<PlayerProfile>, GameError> {
        let guard = self.inner.read().map_err(|_| Self::poisoned())?;
        Ok(guard.profiles.get(key).cloned())
    }

    fn put(&self, key: &str, profile: &PlayerProfile) -> Result<(), GameError> {
        let mut guard = self.inner.write().map_err(|_| Self::poisoned())?;
        let claims_name = match guard.profiles.insert(key.to_string(), profile.clone()) {
            Some(previous) if previous.display_name == profile.display_name => false,
            Some(previous) => {
                guard.drop_name_index(&previous.display_name, key);
                true
            }
            None => true,
        };
        if claims_name || !guard.names.contains_key(&profile.display_name) {
            guard
                .names
                .insert(profile.display_name.clone(), key.to_string());
        }
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), GameError> {
        let mut guard = self.inner.write().map_err(|_| Self::poisoned())?;
        if let Some(previous) = guard.profiles.remove(key) {
            guard.drop_name_index(&previous.display_name, key);
        }
        Ok(())
    }

    fn find_by_display_name(
        &self,
        name: &str,
    ) -> Result<Option<(String, PlayerProfile)>, GameError> {
        let guard = self.inner.read().map_err(|_| Self::poisoned())?;
        Ok(guard.names.get(name).and_then(|key| {
            guard
                .profiles
                .get(key)
                .map(|profile| (key.clone(), profile.clone()))
        }))
    }

    fn list_profiles(&self) -> Result<Vec<(String, PlayerProfile)>, GameError> {
        let guard = self.inner.read().map_err(|_| Self::poisoned())?;
        Ok(guard
            .profiles
            .iter()
            .map(|(k, p)| (k.clone(), p.clone()))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn store_round_trip_profile() {
        let dir = TempDir::new().expect("tempdir");
        let store = SledProfileStoreBuilder::new(dir.path()).open().expect("store");
        let mut profile = PlayerProfile::new("Alice", 42, 90, "Paris");
        profile.push_tokens.insert("ExponentPushToken[a]".to_string());
        store.put("acct-1", &profile).expect("put");
        let fetched = store.get("acct-1").expect("get").expect("present");
        assert_eq!(fetched, profile);
        assert!(store.get("acct-2").expect("get").is_none());
    }

    #[test]
    fn rename_moves_name_index() {
        let dir = TempDir::new().expect("tempdir");
        let store = SledProfileStoreBuilder::new(dir.path()).open().expect("store");
        let mut profile = PlayerProfile::new("Alice", 0, 100, "Paris");
        store.put("acct-1", &profile).expect("put");
        profile.display_name = "Alicia".to_string();
        store.put("acct-1", &profile).expect("put renamed");
        assert!(store.find_by_display_name("Alice").unwrap().is_none());
        let (key, found) = store.find_by_display_name("Alicia").unwrap().unwrap();
        assert_eq!(key, "acct-1");
        assert_eq!(found.display_name, "Alicia");
    }

    #[test]
    fn delete_clears_profile_and_index() {
        let dir = TempDir::new().expect("tempdir");
        let store = SledProfileStoreBuilder::new(dir.path()).open().expect("store");
        store
            .put("acct-1", &PlayerProfile::new("Alice", 0, 100, "Paris"))
            .expect("put");
        store.delete("acct-1").expect("delete");
        assert!(store.get("acct-1").unwrap().is_none());
        assert!(store.find_by_display_name("Alice").unwrap().is_none());
        // deleting twice is fine
        store.delete("acct-1").expect("delete again");
    }

    #[test]
    fn memory_store_matches_contract() {
        let store = MemoryProfileStore::new();
        store
            .put("k", &PlayerProfile::new("Bob", 1, 100, "Tokyo"))
            .unwrap();
        assert_eq!(store.find_by_display_name("Bob").unwrap().unwrap().0, "k");
        assert_eq!(store.list_profiles().unwrap().len(), 1);
        store.delete("k").unwrap();
        assert!(store.get("k").unwrap().is_none());
    }
}

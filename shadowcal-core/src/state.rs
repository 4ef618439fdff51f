//! Persisted sync state: which calendar holds the shadows and the cursor for
//! the next incremental fetch.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::{ShadowError, ShadowResult};

const SHADOW_CALENDAR_ID_KEY: &str = "shadow_calendar_id";
const SYNC_TOKEN_KEY: &str = "sync_token";

/// A small string key/value store.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> ShadowResult<Option<String>>;
    fn set(&self, key: &str, value: &str) -> ShadowResult<()>;
    fn delete(&self, key: &str) -> ShadowResult<()>;
}

/// Store backed by a TOML file of string values.
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        FileStore { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> ShadowResult<BTreeMap<String, String>> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }

        let content = std::fs::read_to_string(&self.path)?;
        toml::from_str(&content).map_err(|e| {
            ShadowError::State(format!("Could not parse {}: {e}", self.path.display()))
        })
    }

    fn write(&self, values: &BTreeMap<String, String>) -> ShadowResult<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content =
            toml::to_string_pretty(values).map_err(|e| ShadowError::Serialization(e.to_string()))?;

        let mut temp = self.path.clone().into_os_string();
        temp.push(".tmp");
        std::fs::write(&temp, content)?;
        std::fs::rename(&temp, &self.path)?;
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> ShadowResult<Option<String>> {
        Ok(self.read()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> ShadowResult<()> {
        let mut values = self.read()?;
        values.insert(key.to_string(), value.to_string());
        self.write(&values)
    }

    fn delete(&self, key: &str) -> ShadowResult<()> {
        let mut values = self.read()?;
        if values.remove(key).is_some() {
            self.write(&values)?;
        }
        Ok(())
    }
}

/// Store that lives only as long as the process.
#[derive(Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    fn values(&self) -> ShadowResult<std::sync::MutexGuard<'_, HashMap<String, String>>> {
        self.values
            .lock()
            .map_err(|_| ShadowError::State("memory store lock poisoned".into()))
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> ShadowResult<Option<String>> {
        Ok(self.values()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> ShadowResult<()> {
        self.values()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn delete(&self, key: &str) -> ShadowResult<()> {
        self.values()?.remove(key);
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncState {
    pub shadow_calendar_id: Option<String>,
    pub sync_token: Option<String>,
}

impl SyncState {
    pub fn load(store: &dyn KeyValueStore) -> ShadowResult<Self> {
        Ok(SyncState {
            shadow_calendar_id: store.get(SHADOW_CALENDAR_ID_KEY)?,
            sync_token: store.get(SYNC_TOKEN_KEY)?,
        })
    }

    pub fn save(&self, store: &dyn KeyValueStore) -> ShadowResult<()> {
        put(store, SHADOW_CALENDAR_ID_KEY, self.shadow_calendar_id.as_deref())?;
        put(store, SYNC_TOKEN_KEY, self.sync_token.as_deref())
    }

    /// Forget the sync token, in memory and in the store.
    pub fn clear_sync_token(&mut self, store: &dyn KeyValueStore) -> ShadowResult<()> {
        self.sync_token = None;
        store.delete(SYNC_TOKEN_KEY)
    }
}

fn put(store: &dyn KeyValueStore, key: &str, value: Option<&str>) -> ShadowResult<()> {
    match value {
        Some(value) => store.set(key, value),
        None => store.delete(key),
    }
}

//!
//! uniteam durable client storage
//! ------------------------------
//! Small key/value persistence used by the session store and the UI preferences.
//! Values are opaque strings stored under fixed key names, so a restart can rebuild
//! the session field by field.
//!
//! Two backends are provided:
//! - `MemoryBackend`: process-local map, used by tests and ephemeral sessions.
//! - `FileBackend`: a single JSON object on disk, rewritten on every mutation.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use parking_lot::{Mutex, RwLock};
use tracing::warn;

use crate::error::{AppError, AppResult};
use crate::tprintln;

pub const KEY_ACCESS_TOKEN: &str = "access_token";
pub const KEY_REFRESH_TOKEN: &str = "refresh_token";
pub const KEY_USER: &str = "user";
pub const KEY_THEME: &str = "theme";
pub const KEY_SIDEBAR_COLLAPSED: &str = "sidebarCollapsed";

/// Durable key/value persistence. Implementations must be safe to share across tasks.
pub trait KeyValueBackend: Send + Sync {
    fn load(&self, key: &str) -> AppResult<Option<String>>;
    fn save(&self, key: &str, value: &str) -> AppResult<()>;
    fn clear(&self, key: &str) -> AppResult<()>;
}

#[derive(Debug, Default)]
pub struct MemoryBackend {
    map: RwLock<BTreeMap<String, String>>,
}

impl MemoryBackend {
    pub fn new() -> Self { Self::default() }

    /// Seed with existing entries, as if persisted by an earlier run.
    pub fn with_entries<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let map = entries.into_iter().map(|(k, v)| (k.into(), v.into())).collect();
        Self { map: RwLock::new(map) }
    }

    pub fn snapshot(&self) -> BTreeMap<String, String> { self.map.read().clone() }
}

impl KeyValueBackend for MemoryBackend {
    fn load(&self, key: &str) -> AppResult<Option<String>> {
        Ok(self.map.read().get(key).cloned())
    }

    fn save(&self, key: &str, value: &str) -> AppResult<()> {
        self.map.write().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn clear(&self, key: &str) -> AppResult<()> {
        self.map.write().remove(key);
        Ok(())
    }
}

/// JSON file backend. The whole map is read on each load and rewritten on each mutation;
/// the lock serializes writers within this process. Writes land in a sibling temp file that
/// is renamed over the target, so a crash mid-write leaves the previous contents intact.
/// Loads report an unparseable file as `corrupt_store`; mutations replace it.
pub struct FileBackend {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileBackend {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into(), lock: Mutex::new(()) }
    }

    pub fn path(&self) -> &Path { &self.path }

    fn read_map(&self) -> AppResult<BTreeMap<String, String>> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let content = std::fs::read_to_string(&self.path)?;
        if content.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        serde_json::from_str(&content).map_err(|e| AppError::Storage {
            code: "corrupt_store".into(),
            message: format!("{}: {}", self.path.display(), e),
        })
    }

    /// Map to mutate, plus whether the file must be rewritten even if the mutation is a no-op.
    fn read_map_for_write(&self) -> AppResult<(BTreeMap<String, String>, bool)> {
        match self.read_map() {
            Ok(map) => Ok((map, false)),
            Err(e) if e.code_str() == "corrupt_store" => {
                warn!(target: "uniteam::session", "replacing unreadable store: {}", e);
                Ok((BTreeMap::new(), true))
            }
            Err(e) => Err(e),
        }
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn write_map(&self, map: &BTreeMap<String, String>) -> AppResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let content = serde_json::to_string_pretty(map)?;
        let tmp = self.temp_path();
        std::fs::write(&tmp, content)?;
        std::fs::rename(&tmp, &self.path)?;
        tprintln!("storage.write path={} keys={}", self.path.display(), map.len());
        Ok(())
    }
}

impl KeyValueBackend for FileBackend {
    fn load(&self, key: &str) -> AppResult<Option<String>> {
        let _g = self.lock.lock();
        Ok(self.read_map()?.remove(key))
    }

    fn save(&self, key: &str, value: &str) -> AppResult<()> {
        let _g = self.lock.lock();
        let (mut map, _) = self.read_map_for_write()?;
        map.insert(key.to_string(), value.to_string());
        self.write_map(&map)
    }

    fn clear(&self, key: &str) -> AppResult<()> {
        let _g = self.lock.lock();
        let (mut map, replace) = self.read_map_for_write()?;
        if map.remove(key).is_some() || replace {
            self.write_map(&map)?;
        }
        Ok(())
    }
}

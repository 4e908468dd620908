//! Versioned configuration snapshots with mtime-driven reload.
//!
//! Readers call [`ConfigStore::get`], which compares the file's modification
//! time against the cached snapshot and reloads on change. Writers are
//! serialized through a mutex and commit via write-temporary-then-rename, so
//! a concurrent reader never parses a half-written file.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::SystemTime;

use super::Config;
use crate::error::ConfigError;

/// An immutable configuration value tagged with a monotonically increasing version.
#[derive(Debug, Clone)]
pub struct ConfigSnapshot {
    /// Bumped on every (re)load
    pub version: u64,
    pub config: Config,
}

struct Cached {
    mtime: Option<SystemTime>,
    snapshot: Arc<ConfigSnapshot>,
}

/// File-backed configuration cache.
pub struct ConfigStore {
    path: PathBuf,
    cache: RwLock<Option<Cached>>,
    write_lock: Mutex<()>,
    next_version: AtomicU64,
}

impl ConfigStore {
    /// Create a store for the given file. Nothing is read until the first `get`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cache: RwLock::new(None),
            write_lock: Mutex::new(()),
            next_version: AtomicU64::new(1),
        }
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current snapshot, reloading first if the file changed since the last read.
    ///
    /// A missing file yields the default configuration.
    pub fn get(&self) -> Result<Arc<ConfigSnapshot>, ConfigError> {
        let current_mtime = self.current_mtime();
        {
            let cache = self.cache.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(cached) = cache.as_ref() {
                if cached.mtime == current_mtime {
                    return Ok(cached.snapshot.clone());
                }
            }
        }
        self.reload()
    }

    /// Unconditionally re-read the file and publish a new snapshot.
    pub fn reload(&self) -> Result<Arc<ConfigSnapshot>, ConfigError> {
        let mtime = self.current_mtime();
        let config = if mtime.is_some() {
            Config::load_from(&self.path)?
        } else {
            Config::default()
        };
        Ok(self.publish(config, mtime))
    }

    /// Validate and persist `config`, then publish it as the current snapshot.
    pub fn write(&self, config: &Config) -> Result<Arc<ConfigSnapshot>, ConfigError> {
        config.validate()?;
        let content = config.to_toml()?;

        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let tmp_path = tmp_path_for(&self.path);
        {
            let mut file = std::fs::File::create(&tmp_path)?;
            file.write_all(content.as_bytes())?;
            file.sync_all()?;
        }
        std::fs::rename(&tmp_path, &self.path)?;
        tracing::info!("Configuration written to {}", self.path.display());

        Ok(self.publish(config.clone(), self.current_mtime()))
    }

    fn publish(&self, config: Config, mtime: Option<SystemTime>) -> Arc<ConfigSnapshot> {
        let version = self.next_version.fetch_add(1, Ordering::SeqCst);
        let snapshot = Arc::new(ConfigSnapshot { version, config });
        let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);
        *cache = Some(Cached {
            mtime,
            snapshot: snapshot.clone(),
        });
        tracing::debug!("Published config snapshot v{version}");
        snapshot
    }

    fn current_mtime(&self) -> Option<SystemTime> {
        std::fs::metadata(&self.path)
            .and_then(|meta| meta.modified())
            .ok()
    }
}

fn tmp_path_for(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "config.toml".into());
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::new(dir.path().join("config.toml"));
        let snapshot = store.get().unwrap();
        assert_eq!(snapshot.config.thumbnail.max_edge, 100);
    }

    #[test]
    fn test_get_is_cached_while_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[pagination]\npage_size = 7\n").unwrap();
        let store = ConfigStore::new(&path);

        let first = store.get().unwrap();
        let second = store.get().unwrap();
        assert_eq!(first.version, second.version);
        assert_eq!(second.config.pagination.page_size, 7);
    }

    #[test]
    fn test_get_reloads_after_external_change() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[pagination]\npage_size = 7\n").unwrap();
        let store = ConfigStore::new(&path);
        let first = store.get().unwrap();

        std::fs::write(&path, "[pagination]\npage_size = 9\n").unwrap();
        let later = SystemTime::now() + Duration::from_secs(5);
        std::fs::File::options()
            .write(true)
            .open(&path)
            .unwrap()
            .set_modified(later)
            .unwrap();

        let second = store.get().unwrap();
        assert!(second.version > first.version);
        assert_eq!(second.config.pagination.page_size, 9);
    }

    #[test]
    fn test_write_replaces_file_and_publishes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let store = ConfigStore::new(&path);

        let mut config = Config::default();
        config.thumbnail.max_edge = 64;
        let snapshot = store.write(&config).unwrap();
        assert_eq!(snapshot.config.thumbnail.max_edge, 64);

        assert!(path.exists());
        assert!(!tmp_path_for(&path).exists());
        let reread = Config::load_from(&path).unwrap();
        assert_eq!(reread.thumbnail.max_edge, 64);
        assert_eq!(store.get().unwrap().version, snapshot.version);
    }

    #[test]
    fn test_write_rejects_invalid_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let store = ConfigStore::new(&path);

        let mut config = Config::default();
        config.thumbnail.quality_step = 0;
        assert!(store.write(&config).is_err());
        assert!(!path.exists());
    }
}

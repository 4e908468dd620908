//! Storage layout: collision-free relative paths for originals and backups.
//!
//! Originals live at `<root>/YYYY/MM/DD/<token>.<ext>` and pre-edit backups at
//! `<backup_root>/YYYY/MM/DD/<token>_<YYYYMMDDHHMMSS>.<ext>`, where `<token>`
//! is an 8-character alphanumeric value from the OS CSPRNG. A second backup
//! within the same second gets a `_<n>` suffix after the timestamp.

use chrono::{DateTime, Datelike, Utc};
use rand::distributions::Alphanumeric;
use rand::rngs::OsRng;
use rand::Rng;
use std::path::{Component, Path, PathBuf};

use crate::error::{PixvaultError, Result};

/// Length of the random filename token.
pub const TOKEN_LENGTH: usize = 8;

/// Allocation attempts before giving up on a collision streak.
pub const MAX_ALLOCATION_ATTEMPTS: usize = 16;

/// A freshly allocated storage location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllocatedPath {
    /// `YYYY/MM/DD/<token>.<ext>`
    pub relpath: String,
    /// The random token (also stored as the image hash)
    pub token: String,
    /// `relpath` joined onto the storage root
    pub absolute: PathBuf,
}

/// Resolves relative storage paths against the configured roots.
#[derive(Debug, Clone)]
pub struct StorageLayout {
    root: PathBuf,
    backup_root: PathBuf,
}

impl StorageLayout {
    pub fn new(root: impl Into<PathBuf>, backup_root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            backup_root: backup_root.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn backup_root(&self) -> &Path {
        &self.backup_root
    }

    /// Absolute path of a stored original.
    pub fn resolve(&self, relpath: &str) -> PathBuf {
        self.root.join(relpath)
    }

    /// Allocate a path for a new upload that does not exist yet.
    ///
    /// Regenerates the token on collision, failing with a storage error after
    /// [`MAX_ALLOCATION_ATTEMPTS`].
    pub fn allocate(&self, ext: &str) -> Result<AllocatedPath> {
        self.allocate_at(ext, Utc::now())
    }

    pub(crate) fn allocate_at(&self, ext: &str, now: DateTime<Utc>) -> Result<AllocatedPath> {
        for attempt in 0..MAX_ALLOCATION_ATTEMPTS {
            let token = random_token();
            let relpath = storage_relpath(&token, ext, now);
            let absolute = self.root.join(&relpath);
            if !absolute.exists() {
                return Ok(AllocatedPath {
                    relpath,
                    token,
                    absolute,
                });
            }
            tracing::debug!("Storage path collision on attempt {}: {}", attempt + 1, relpath);
        }
        Err(PixvaultError::storage(
            &self.root,
            format!("no free storage path after {MAX_ALLOCATION_ATTEMPTS} attempts"),
        ))
    }

    /// Backup paths to try, in order, for the image identified by `token`.
    ///
    /// The caller takes the first one it can create exclusively; there are
    /// [`MAX_ALLOCATION_ATTEMPTS`] of them.
    pub fn backup_candidates(&self, token: &str, ext: &str, now: DateTime<Utc>) -> Vec<PathBuf> {
        (0..MAX_ALLOCATION_ATTEMPTS)
            .map(|n| self.backup_root.join(numbered_backup_relpath(token, ext, now, n)))
            .collect()
    }
}

/// Draw an 8-character token from `[A-Za-z0-9]` using the OS CSPRNG.
pub fn random_token() -> String {
    OsRng
        .sample_iter(&Alphanumeric)
        .take(TOKEN_LENGTH)
        .map(char::from)
        .collect()
}

/// `YYYY/MM/DD/<token>.<ext>` for the given instant.
pub fn storage_relpath(token: &str, ext: &str, now: DateTime<Utc>) -> String {
    format!("{}/{}.{}", date_segment(now), token, ext)
}

/// `YYYY/MM/DD/<token>_<YYYYMMDDHHMMSS>.<ext>` for the given instant.
pub fn backup_relpath(token: &str, ext: &str, now: DateTime<Utc>) -> String {
    format!(
        "{}/{}_{}.{}",
        date_segment(now),
        token,
        now.format("%Y%m%d%H%M%S"),
        ext
    )
}

/// [`backup_relpath`] with a `_<n>` suffix for `n > 0`.
pub fn numbered_backup_relpath(token: &str, ext: &str, now: DateTime<Utc>, n: usize) -> String {
    if n == 0 {
        return backup_relpath(token, ext, now);
    }
    format!(
        "{}/{}_{}_{}.{}",
        date_segment(now),
        token,
        now.format("%Y%m%d%H%M%S"),
        n,
        ext
    )
}

/// Rebuild a storage relpath from the four public URL segments.
///
/// Returns `None` unless `filename` is a single plain path component.
pub fn compose_relpath(year: u32, month: u32, day: u32, filename: &str) -> Option<String> {
    let mut components = Path::new(filename).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) if !filename.contains(['/', '\\']) => {}
        _ => return None,
    }
    Some(format!("{year:04}/{month:02}/{day:02}/{filename}"))
}

fn date_segment(now: DateTime<Utc>) -> String {
    format!("{:04}/{:02}/{:02}", now.year(), now.month(), now.day())
}

/// Create the parent directory of `path` if needed.
pub fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    Ok(())
}

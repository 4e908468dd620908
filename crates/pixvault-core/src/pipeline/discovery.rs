//! File discovery for batch uploads from directories.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::config::UploadConfig;

/// Finds uploadable image files under a path.
pub struct FileDiscovery {
    config: UploadConfig,
}

/// Information about a discovered file.
#[derive(Debug, Clone)]
pub struct DiscoveredFile {
    /// Full path to the file
    pub path: PathBuf,
    /// File size in bytes
    pub size: u64,
}

impl FileDiscovery {
    pub fn new(config: UploadConfig) -> Self {
        Self { config }
    }

    /// Uploadable files at `path`, sorted by path.
    ///
    /// A file path yields itself when its extension is allowed. Directories
    /// are walked recursively; hidden entries (dot-files and dot-directories)
    /// are skipped.
    pub fn discover(&self, path: &Path) -> Vec<DiscoveredFile> {
        if path.is_file() {
            return self.candidate(path).into_iter().collect();
        }

        let mut files: Vec<DiscoveredFile> = WalkDir::new(path)
            .follow_links(true)
            .into_iter()
            .filter_entry(|entry| entry.depth() == 0 || !is_hidden(entry.file_name()))
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .filter_map(|entry| self.candidate(entry.path()))
            .collect();

        files.sort_by(|a, b| a.path.cmp(&b.path));
        files
    }

    fn candidate(&self, path: &Path) -> Option<DiscoveredFile> {
        if !self.is_supported(path) {
            return None;
        }
        let size = std::fs::metadata(path).ok()?.len();
        Some(DiscoveredFile {
            path: path.to_path_buf(),
            size,
        })
    }

    fn is_supported(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| self.config.allows(ext))
            .unwrap_or(false)
    }

    /// Combined byte size, used to size the upload progress bar.
    pub fn total_size(files: &[DiscoveredFile]) -> u64 {
        files.iter().map(|f| f.size).sum()
    }
}

fn is_hidden(name: &OsStr) -> bool {
    name.to_str().is_some_and(|n| n.starts_with('.'))
}

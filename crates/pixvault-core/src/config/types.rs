//! Sub-configuration structs with their defaults.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Storage layout settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Root under which originals live as `YYYY/MM/DD/<token>.<ext>`
    pub root_dir: PathBuf,

    /// Parallel root for pre-edit backups
    pub backup_dir: PathBuf,

    /// SQLite catalog file
    pub database: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root_dir: PathBuf::from("~/.pixvault/storage"),
            backup_dir: PathBuf::from("~/.pixvault/backup"),
            database: PathBuf::from("~/.pixvault/library.db"),
        }
    }
}

/// Upload acceptance limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    /// Maximum upload size in megabytes
    pub max_size_mb: u64,

    /// Accepted file extensions (lowercase, no dot)
    pub allowed_exts: Vec<String>,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_size_mb: 20,
            allowed_exts: ["jpg", "jpeg", "png", "gif", "webp", "bmp", "tiff"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl UploadConfig {
    /// Upload size limit in bytes.
    pub fn max_size_bytes(&self) -> u64 {
        self.max_size_mb.saturating_mul(1024 * 1024)
    }

    /// Whether `ext` (any case) is on the whitelist.
    pub fn allows(&self, ext: &str) -> bool {
        let ext = ext.to_ascii_lowercase();
        self.allowed_exts
            .iter()
            .any(|allowed| allowed.trim().eq_ignore_ascii_case(&ext))
    }
}

/// Pagination defaults for list queries.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PaginationConfig {
    /// Default and maximum page size
    pub page_size: u32,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self { page_size: 20 }
    }
}

/// Thumbnail synthesis settings.
///
/// Changing these only affects images thumbnailed afterwards; cached
/// thumbnails are never regenerated on a parameter change.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ThumbnailConfig {
    /// Longest edge in pixels
    pub max_edge: u32,

    /// Byte budget for the encoded thumbnail
    pub max_bytes: u64,

    /// Output format ("jpeg", "png" or "webp")
    pub format: String,

    /// Initial encoder quality (lossy formats only)
    pub quality: u8,

    /// Lowest quality tried before accepting a budget overage
    pub quality_floor: u8,

    /// Quality decrement per re-encode
    pub quality_step: u8,
}

impl Default for ThumbnailConfig {
    fn default() -> Self {
        Self {
            max_edge: 100,
            max_bytes: 102_400,
            format: "jpeg".to_string(),
            quality: 80,
            quality_floor: 40,
            quality_step: 10,
        }
    }
}

/// External text-generation service used by free-text search.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AiConfig {
    /// Whether free-text search and image tagging are available
    pub enabled: bool,

    /// Provider identifier ("openai", "dashscope", "anthropic")
    pub provider: String,

    /// API base URL (OpenAI-compatible or DashScope base)
    pub base_url: String,

    /// API key (supports ${ENV_VAR} syntax)
    pub api_key: String,

    /// Model name for free-text search
    pub model: String,

    /// Vision model used to tag individual images
    pub vision_model: String,

    /// Upper bound on tags generated for one image
    pub max_tags: usize,

    /// Total attempts for rate-limited or server-failed calls
    pub max_retries: u32,

    /// Base backoff delay in milliseconds
    pub retry_delay_ms: u64,

    /// Per-request timeout in milliseconds
    pub timeout_ms: u64,

    /// Maximum tokens to generate
    pub max_tokens: u32,

    /// Sampling temperature
    pub temperature: f32,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            provider: "openai".to_string(),
            base_url: "https://dashscope.aliyuncs.com/compatible-mode/v1".to_string(),
            api_key: "${PIXVAULT_AI_API_KEY}".to_string(),
            model: "qwen-plus".to_string(),
            vision_model: "qwen-vl-plus".to_string(),
            max_tags: 5,
            max_retries: 3,
            retry_delay_ms: 1000,
            timeout_ms: 60_000,
            max_tokens: 800,
            temperature: 0.2,
        }
    }
}

/// Link construction settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LinksConfig {
    /// Prefix for public image URLs; empty yields relative `/images/...` links
    pub public_base_url: String,
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: error, warn, info, debug, trace
    pub level: String,

    /// Log format: "pretty" or "json"
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

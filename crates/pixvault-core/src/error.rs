//! Error types for the Pixvault image library.
//!
//! Every failure a caller can see is a [`PixvaultError`], which carries an
//! HTTP-style status and a machine-readable code alongside the human message,
//! so a transport layer can map it without inspecting strings.

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for Pixvault operations.
#[derive(Error, Debug)]
pub enum PixvaultError {
    /// Malformed or out-of-range input (crop ratios, hue delta, tag payloads)
    #[error("Validation error: {0}")]
    Validation(String),

    /// No usable principal was supplied
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// The principal lacks the role or ownership required
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Image row or its backing file is missing
    #[error("Not found: {0}")]
    NotFound(String),

    /// Upload exceeds the configured size limit
    #[error("Payload too large: {size} bytes > {max} bytes")]
    PayloadTooLarge { size: u64, max: u64 },

    /// Upload extension or content is not an accepted image
    #[error("Unsupported media type: {0}")]
    UnsupportedMediaType(String),

    /// The external text-generation service failed
    #[error("Upstream service error: {message}")]
    Upstream {
        message: String,
        status_code: Option<u16>,
    },

    /// A feature was reached that has no implementation behind it
    #[error("Not implemented: {0}")]
    NotImplemented(String),

    /// Storage layout failure (path allocation, backup, in-place replace)
    #[error("Storage error for {path}: {message}")]
    Storage { path: PathBuf, message: String },

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Catalog database errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Image decode/encode errors
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// General I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl PixvaultError {
    /// HTTP-style status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Validation(_) => 400,
            Self::Unauthorized(_) => 401,
            Self::Forbidden(_) => 403,
            Self::NotFound(_) => 404,
            Self::PayloadTooLarge { .. } => 413,
            Self::UnsupportedMediaType(_) => 415,
            Self::NotImplemented(_) => 501,
            Self::Upstream { .. } => 502,
            Self::Storage { .. }
            | Self::Config(_)
            | Self::Database(_)
            | Self::Image(_)
            | Self::Io(_)
            | Self::Json(_) => 500,
        }
    }

    /// Machine-readable error code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Unauthorized(_) => "UNAUTHORIZED",
            Self::Forbidden(_) => "FORBIDDEN",
            Self::NotFound(_) => "NOT_FOUND",
            Self::PayloadTooLarge { .. } => "PAYLOAD_TOO_LARGE",
            Self::UnsupportedMediaType(_) => "UNSUPPORTED_MEDIA_TYPE",
            Self::Upstream { .. } => "UPSTREAM_SERVICE_ERROR",
            Self::NotImplemented(_) => "NOT_IMPLEMENTED",
            Self::Config(_) => "CONFIG_ERROR",
            Self::Storage { .. }
            | Self::Database(_)
            | Self::Image(_)
            | Self::Io(_)
            | Self::Json(_) => "INTERNAL_ERROR",
        }
    }

    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub(crate) fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub(crate) fn upstream(message: impl Into<String>, status_code: Option<u16>) -> Self {
        Self::Upstream {
            message: message.into(),
            status_code,
        }
    }

    pub(crate) fn storage(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Storage {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read the config file from disk
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    /// Failed to parse TOML configuration
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Failed to serialize configuration back to TOML
    #[error("Failed to serialize config: {0}")]
    SerializeError(#[from] toml::ser::Error),

    /// Configuration values are invalid
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Convenience type alias for Pixvault results.
pub type Result<T> = std::result::Result<T, PixvaultError>;

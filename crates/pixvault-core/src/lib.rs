//! Pixvault Core - image ingestion and retrieval engine.
//!
//! Pixvault stores uploaded photos under a dated storage root, catalogs them
//! in SQLite, and serves size-bounded thumbnails, crop/hue edits and
//! tag-based retrieval.
//!
//! # Architecture
//!
//! ```text
//! Upload → Validate → Allocate path → Write → Verify → EXIF → Catalog → Thumbnail
//! Search → Resolve tags (LLM) → Rank by tag overlap → Summaries
//! Analyze → Encode JPEG → Vision model → Replace AI tags
//! Edit   → Validate → Backup → Transform → Atomic replace → Invalidate thumbnail
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use pixvault_core::{Config, Library, Principal, Role, UploadRequest};
//!
//! let mut library = Library::open(Config::load()?)?;
//! let me = Principal::new(1, Role::User);
//! let receipt = library.upload(&me, UploadRequest {
//!     filename: "cat.jpg".into(),
//!     bytes: std::fs::read("cat.jpg")?,
//!     mime_type: None,
//!     declared_size: None,
//!     tags: vec!["cat".into()],
//! })?;
//! println!("{}", receipt.public_url);
//! ```

// Module declarations
pub mod access;
pub mod config;
pub mod db;
pub mod error;
pub mod library;
pub mod llm;
pub mod pipeline;
pub mod storage;
pub mod types;

// Re-exports for convenient access
pub use config::{Config, ConfigSnapshot, ConfigStore};
pub use error::{ConfigError, PixvaultError, Result};
pub use library::Library;
pub use llm::{ImageTagger, ResolvedTags, TagResolver};
pub use pipeline::DiscoveredFile;
pub use types::{
    AiSearchResult, AiTagsView, AnalysisStatus, CropRequest, EditRequest, HueRequest, ImageDetail,
    ImageSummary, ListQuery, Page, Principal, Role, TagMode, TagSource, ThumbnailPayload,
    UploadReceipt, UploadRequest,
};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

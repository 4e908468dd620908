//! Image processing stages.
//!
//! - **validate**: Upload checks before and after the write
//! - **decode**: Load and decode images with format sniffing
//! - **metadata**: Extract EXIF dictionary, capture time, location, vocabulary
//! - **hash**: BLAKE3 content digests
//! - **thumbnail**: Byte-budgeted thumbnail synthesis
//! - **edit**: Crop and hue transforms, previews, backup-then-replace commits
//! - **discovery**: Find image files in directories

pub mod decode;
pub mod discovery;
pub mod edit;
pub mod hash;
pub mod metadata;
pub mod thumbnail;
pub mod validate;

// Re-exports for convenient access
pub use decode::{DecodedImage, ImageDecoder};
pub use discovery::{DiscoveredFile, FileDiscovery};
pub use edit::{CommittedEdit, CropBox};
pub use hash::Hasher;
pub use metadata::{ExtractedMetadata, MetadataExtractor};
pub use thumbnail::{ThumbnailFormat, ThumbnailSynthesizer};
pub use validate::UploadValidator;

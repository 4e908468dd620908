//! Core data types for the Pixvault image library.
//!
//! These are the request payloads the library accepts and the serializable
//! views it hands back to a transport layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::PixvaultError;

// === Collaborator contract ===

/// Role of an authenticated principal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Pending,
    User,
    Admin,
}

impl FromStr for Role {
    type Err = PixvaultError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "user" => Ok(Self::User),
            "admin" => Ok(Self::Admin),
            other => Err(PixvaultError::validation(format!("unknown role '{other}'"))),
        }
    }
}

/// The authenticated caller, as supplied by the auth layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: i64,
    pub role: Role,
}

impl Principal {
    pub fn new(id: i64, role: Role) -> Self {
        Self { id, role }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

// === Tags ===

/// Provenance of a tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TagSource {
    /// Entered by the uploader
    Custom,
    /// Derived from camera metadata
    Exif,
    /// Generated by the vision model
    Ai,
}

impl TagSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Custom => "custom",
            Self::Exif => "exif",
            Self::Ai => "ai",
        }
    }
}

impl fmt::Display for TagSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TagSource {
    type Err = PixvaultError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "custom" => Ok(Self::Custom),
            "exif" => Ok(Self::Exif),
            "ai" => Ok(Self::Ai),
            other => Err(PixvaultError::validation(format!(
                "unknown tag source '{other}'"
            ))),
        }
    }
}

/// How a requested tag set must match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TagMode {
    /// Image must carry every requested name
    #[default]
    All,
    /// Image must carry at least one requested name
    Any,
}

impl FromStr for TagMode {
    type Err = PixvaultError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(Self::All),
            "any" => Ok(Self::Any),
            other => Err(PixvaultError::validation(format!(
                "tag_mode must be all or any, got '{other}'"
            ))),
        }
    }
}

/// Split a comma-separated tag string into trimmed, non-empty names.
pub fn parse_tag_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

// === Requests ===

/// A file handed over by the transport layer.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    /// Client-side filename; its extension selects the stored extension
    pub filename: String,
    pub bytes: Vec<u8>,
    pub mime_type: Option<String>,
    /// Size the client declared up front, if any
    pub declared_size: Option<u64>,
    /// Custom tags to attach
    pub tags: Vec<String>,
}

/// List filter and page selection.
#[derive(Debug, Clone, Default)]
pub struct ListQuery {
    /// 1-based page number (0 is treated as 1)
    pub page: u32,
    /// Requested page size; clamped to the configured maximum
    pub page_size: Option<u32>,
    pub tags: Vec<String>,
    pub tag_mode: TagMode,
    /// Only honored for admins
    pub include_deleted: bool,
}

/// Crop margins, each a percentage of the corresponding edge.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CropRequest {
    pub top: f64,
    pub bottom: f64,
    pub left: f64,
    pub right: f64,
}

/// Hue rotation in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HueRequest {
    pub delta: f64,
}

/// Either edit, for previews.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum EditRequest {
    Crop(CropRequest),
    Hue(HueRequest),
}

// === Views ===

/// Cached preview payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThumbnailPayload {
    pub format: String,
    pub width: u32,
    pub height: u32,
    /// Base64-encoded image bytes
    pub data: String,
    pub size_bytes: u64,
}

/// Thumbnail fields exposed in list views.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThumbnailRef {
    pub format: String,
    pub data: String,
}

/// Row in a list or search result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageSummary {
    pub id: i64,
    pub created_at: DateTime<Utc>,
    pub thumbnail: ThumbnailRef,
    pub tags: Vec<String>,
    pub is_deleted: bool,
    pub is_favorite: bool,
    pub public_url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

/// Capture time as parsed plus the raw EXIF string it came from.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CaptureTime {
    pub taken_at: Option<DateTime<Utc>>,
    pub taken_at_raw: Option<String>,
}

/// Decimal-degree location.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Location {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub altitude: Option<f64>,
    /// GPS sub-tags serialized as JSON, kept for audit
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gps_raw: Option<String>,
}

impl Location {
    pub fn is_empty(&self) -> bool {
        self.latitude.is_none()
            && self.longitude.is_none()
            && self.altitude.is_none()
            && self.gps_raw.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExifEntry {
    pub key: String,
    pub value: Option<String>,
}

/// Full image view.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageDetail {
    pub id: i64,
    pub owner_id: i64,
    pub storage_relpath: String,
    pub original_filename: Option<String>,
    pub size_bytes: u64,
    pub mime_type: Option<String>,
    pub content_digest: Option<String>,
    pub dimensions: Option<Dimensions>,
    pub capture_time: Option<CaptureTime>,
    pub location: Option<Location>,
    pub exif: Vec<ExifEntry>,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub is_deleted: bool,
    pub is_favorite: bool,
    pub public_url: String,
}

/// One page of results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub page: u32,
    pub page_size: u32,
    pub total: u64,
    pub items: Vec<T>,
}

/// What an upload hands back.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadReceipt {
    pub id: i64,
    pub storage_relpath: String,
    pub public_url: String,
}

/// Model-generated tags of one image.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiTagsView {
    pub image_id: i64,
    pub tags: Vec<String>,
    /// Always [`TagSource::Ai`]
    pub source: TagSource,
    pub status: AnalysisStatus,
}

/// State of an image's AI tags. Analysis runs synchronously, so a stored
/// result is always ready.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisStatus {
    Ready,
}

/// Free-text search result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiSearchResult {
    pub query: String,
    pub tags: Vec<String>,
    /// Raw model text, reasoning included
    pub ai_output: String,
    pub items: Vec<ImageSummary>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tag_list_trims_and_skips_empty() {
        assert_eq!(
            parse_tag_list(" cat, ,outdoor ,"),
            vec!["cat".to_string(), "outdoor".to_string()]
        );
        assert!(parse_tag_list("").is_empty());
    }

    #[test]
    fn test_role_from_str() {
        assert_eq!("Admin".parse::<Role>().unwrap(), Role::Admin);
        assert!("root".parse::<Role>().is_err());
    }

    #[test]
    fn test_tag_mode_from_str() {
        assert_eq!("any".parse::<TagMode>().unwrap(), TagMode::Any);
        assert_eq!(TagMode::default(), TagMode::All);
        assert!("some".parse::<TagMode>().is_err());
    }

    #[test]
    fn test_edit_request_tagged_serde() {
        let req: EditRequest =
            serde_json::from_str(r#"{"mode":"crop","top":10,"left":5}"#).unwrap();
        assert_eq!(
            req,
            EditRequest::Crop(CropRequest {
                top: 10.0,
                bottom: 0.0,
                left: 5.0,
                right: 0.0
            })
        );

        let req: EditRequest = serde_json::from_str(r#"{"mode":"hue","delta":-30}"#).unwrap();
        assert_eq!(req, EditRequest::Hue(HueRequest { delta: -30.0 }));
    }

    #[test]
    fn test_location_skips_absent_gps_raw() {
        let loc = Location {
            latitude: Some(-10.5),
            ..Default::default()
        };
        let json = serde_json::to_string(&loc).unwrap();
        assert!(!json.contains("gps_raw"));
        assert!(!loc.is_empty());
        assert!(Location::default().is_empty());
    }
}

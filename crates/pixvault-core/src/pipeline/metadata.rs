//! EXIF metadata extraction from uploaded images.
//!
//! Produces four things from a container's primary IFD: a flat tag dictionary,
//! the capture time, a decimal-degree location, and camera vocabulary tags.
//! Extraction is lenient throughout; images without EXIF yield an empty result.

use chrono::NaiveDateTime;
use exif::{Context, Field, In, Reader, Tag, Value};
use std::io::Cursor;

use crate::types::{CaptureTime, ExifEntry, Location};

/// Timestamp layout used by EXIF date fields.
pub const EXIF_DATETIME_FORMAT: &str = "%Y:%m:%d %H:%M:%S";

/// Fields whose values become `exif`-sourced tags, in order.
const VOCABULARY_TAGS: [Tag; 3] = [Tag::Make, Tag::Model, Tag::LensModel];

/// Everything pulled out of one image's EXIF block.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractedMetadata {
    /// One entry per decoded primary-IFD field
    pub entries: Vec<ExifEntry>,
    /// Present when either date field exists
    pub capture_time: Option<CaptureTime>,
    pub location: Location,
    /// Make, model and lens, de-duplicated
    pub vocabulary: Vec<String>,
}

impl ExtractedMetadata {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Extracts EXIF metadata from image bytes.
pub struct MetadataExtractor;

impl MetadataExtractor {
    /// Extract metadata from an encoded image.
    ///
    /// Returns an empty result if the buffer carries no readable EXIF.
    pub fn extract(bytes: &[u8]) -> ExtractedMetadata {
        let mut cursor = Cursor::new(bytes);
        match Reader::new().read_from_container(&mut cursor) {
            Ok(exif) => Self::from_fields(exif.fields()),
            Err(e) => {
                tracing::debug!("No EXIF data: {}", e);
                ExtractedMetadata::default()
            }
        }
    }

    /// Build the metadata from already-decoded fields.
    pub fn from_fields<'a>(fields: impl IntoIterator<Item = &'a Field>) -> ExtractedMetadata {
        let primary: Vec<&Field> = fields
            .into_iter()
            .filter(|f| f.ifd_num == In::PRIMARY)
            .collect();

        let entries = primary
            .iter()
            .map(|f| ExifEntry {
                key: f.tag.to_string(),
                value: Some(field_text(f)),
            })
            .collect();

        ExtractedMetadata {
            entries,
            capture_time: Self::capture_time(&primary),
            location: Self::location(&primary),
            vocabulary: Self::vocabulary(&primary),
        }
    }

    /// Capture time, preferring DateTimeOriginal over DateTime.
    fn capture_time(fields: &[&Field]) -> Option<CaptureTime> {
        let raw = find(fields, Tag::DateTimeOriginal)
            .or_else(|| find(fields, Tag::DateTime))
            .map(field_text)?;
        Some(CaptureTime {
            taken_at: parse_exif_datetime(&raw).map(|dt| dt.and_utc()),
            taken_at_raw: Some(raw),
        })
    }

    fn location(fields: &[&Field]) -> Location {
        let gps: Vec<&Field> = fields
            .iter()
            .copied()
            .filter(|f| f.tag.context() == Context::Gps)
            .collect();
        if gps.is_empty() {
            return Location::default();
        }

        let mut raw = serde_json::Map::new();
        for field in &gps {
            raw.insert(
                field.tag.to_string(),
                serde_json::Value::String(field_text(field)),
            );
        }

        Location {
            latitude: coordinate(&gps, Tag::GPSLatitude, Tag::GPSLatitudeRef),
            longitude: coordinate(&gps, Tag::GPSLongitude, Tag::GPSLongitudeRef),
            altitude: find(&gps, Tag::GPSAltitude).and_then(|f| first_rational(&f.value)),
            gps_raw: Some(serde_json::Value::Object(raw).to_string()),
        }
    }

    fn vocabulary(fields: &[&Field]) -> Vec<String> {
        let mut tags: Vec<String> = Vec::new();
        for tag in VOCABULARY_TAGS {
            if let Some(field) = find(fields, tag) {
                let text = field_text(field);
                let text = text.trim();
                if !text.is_empty() && !tags.iter().any(|t| t == text) {
                    tags.push(text.to_string());
                }
            }
        }
        tags
    }
}

/// Parse an EXIF timestamp; `None` on any deviation from the fixed layout.
pub fn parse_exif_datetime(raw: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw.trim(), EXIF_DATETIME_FORMAT).ok()
}

/// Degrees/minutes/seconds to decimal degrees, negated for S or W.
pub fn dms_to_decimal(degrees: f64, minutes: f64, seconds: f64, negative: bool) -> f64 {
    let value = degrees + minutes / 60.0 + seconds / 3600.0;
    if negative {
        -value
    } else {
        value
    }
}

fn find<'a>(fields: &[&'a Field], tag: Tag) -> Option<&'a Field> {
    fields.iter().copied().find(|f| f.tag == tag)
}

/// Both the coordinate and its reference must be present.
fn coordinate(fields: &[&Field], coord_tag: Tag, ref_tag: Tag) -> Option<f64> {
    let coord = find(fields, coord_tag)?;
    let reference = field_text(find(fields, ref_tag)?);
    match &coord.value {
        Value::Rational(parts) if parts.len() >= 3 => {
            let negative = matches!(reference.trim(), "S" | "W" | "s" | "w");
            Some(dms_to_decimal(
                parts[0].to_f64(),
                parts[1].to_f64(),
                parts[2].to_f64(),
                negative,
            ))
        }
        _ => None,
    }
}

fn first_rational(value: &Value) -> Option<f64> {
    match value {
        Value::Rational(v) => v.first().map(|r| r.to_f64()),
        _ => None,
    }
}

/// Display text for a field, with ASCII values unquoted.
fn field_text(field: &Field) -> String {
    match &field.value {
        Value::Ascii(parts) => parts
            .iter()
            .map(|p| String::from_utf8_lossy(p).trim_end_matches('\0').to_string())
            .collect::<Vec<_>>()
            .join(" ")
            .trim()
            .to_string(),
        _ => field.display_value().to_string(),
    }
}

//! Image decoding with content-based format detection.

use image::error::{ImageFormatHint, UnsupportedError, UnsupportedErrorKind};
use image::{DynamicImage, GenericImageView, ImageError, ImageFormat, ImageResult};
use std::io::Cursor;
use std::path::Path;

use crate::error::{PixvaultError, Result};

/// Decodes raster images from memory or from the storage root.
pub struct ImageDecoder;

/// Result of decoding an image.
pub struct DecodedImage {
    /// The decoded image data
    pub image: DynamicImage,
    /// Detected image format
    pub format: ImageFormat,
    /// Image width in pixels
    pub width: u32,
    /// Image height in pixels
    pub height: u32,
    /// Encoded size in bytes
    pub file_size: u64,
}

impl ImageDecoder {
    /// Decode an in-memory buffer, sniffing the format from its content.
    pub fn decode_bytes(bytes: &[u8]) -> ImageResult<DecodedImage> {
        let reader = image::ImageReader::new(Cursor::new(bytes)).with_guessed_format()?;
        let format = reader.format().ok_or_else(|| {
            ImageError::Unsupported(UnsupportedError::from_format_and_kind(
                ImageFormatHint::Unknown,
                UnsupportedErrorKind::Format(ImageFormatHint::Unknown),
            ))
        })?;
        let image = reader.decode()?;

        let (width, height) = image.dimensions();
        Ok(DecodedImage {
            image,
            format,
            width,
            height,
            file_size: bytes.len() as u64,
        })
    }

    /// Read and decode a stored file.
    ///
    /// A missing file is reported as `NotFound`; undecodable content as an
    /// image error.
    pub fn open(path: &Path) -> Result<(Vec<u8>, DecodedImage)> {
        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(PixvaultError::not_found(format!(
                    "image file missing: {}",
                    path.display()
                )));
            }
            Err(e) => return Err(e.into()),
        };
        let decoded = Self::decode_bytes(&bytes)?;
        Ok((bytes, decoded))
    }
}

/// Convert an ImageFormat to a string representation.
pub fn format_to_string(format: ImageFormat) -> String {
    match format {
        ImageFormat::Jpeg => "jpeg".to_string(),
        ImageFormat::Png => "png".to_string(),
        ImageFormat::WebP => "webp".to_string(),
        ImageFormat::Gif => "gif".to_string(),
        ImageFormat::Tiff => "tiff".to_string(),
        ImageFormat::Bmp => "bmp".to_string(),
        ImageFormat::Ico => "ico".to_string(),
        ImageFormat::Pnm => "pnm".to_string(),
        ImageFormat::Avif => "avif".to_string(),
        _ => "unknown".to_string(),
    }
}

/// MIME type for a detected format, when it has a well-known one.
pub fn format_mime_type(format: ImageFormat) -> Option<&'static str> {
    match format {
        ImageFormat::Jpeg => Some("image/jpeg"),
        ImageFormat::Png => Some("image/png"),
        ImageFormat::WebP => Some("image/webp"),
        ImageFormat::Gif => Some("image/gif"),
        ImageFormat::Tiff => Some("image/tiff"),
        ImageFormat::Bmp => Some("image/bmp"),
        _ => None,
    }
}

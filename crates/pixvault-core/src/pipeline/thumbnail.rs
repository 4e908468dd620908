//! Byte-budgeted thumbnail synthesis.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, GenericImageView, ImageFormat, RgbImage};
use std::io::Cursor;

use crate::config::ThumbnailConfig;
use crate::error::{ConfigError, Result};
use crate::types::ThumbnailPayload;

/// Output encodings a thumbnail can use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThumbnailFormat {
    Jpeg,
    Png,
    WebP,
}

impl ThumbnailFormat {
    /// Parse a config value (`jpeg`, `jpg`, `png`, `webp`).
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "jpeg" | "jpg" => Some(Self::Jpeg),
            "png" => Some(Self::Png),
            "webp" => Some(Self::WebP),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Jpeg => "jpeg",
            Self::Png => "png",
            Self::WebP => "webp",
        }
    }

    /// Whether re-encoding at a lower quality can shrink the output.
    pub fn is_lossy(&self) -> bool {
        matches!(self, Self::Jpeg)
    }
}

/// Generates size-bounded thumbnails.
pub struct ThumbnailSynthesizer {
    config: ThumbnailConfig,
    format: ThumbnailFormat,
}

impl ThumbnailSynthesizer {
    /// Create a synthesizer from the thumbnail section of the config.
    pub fn new(config: ThumbnailConfig) -> Result<Self> {
        let format = ThumbnailFormat::parse(&config.format).ok_or_else(|| {
            ConfigError::ValidationError(format!(
                "thumbnail.format '{}' is not one of jpeg, png, webp",
                config.format
            ))
        })?;
        Ok(Self { config, format })
    }

    pub fn format(&self) -> ThumbnailFormat {
        self.format
    }

    /// Build the thumbnail payload for an image.
    ///
    /// The longer edge is fitted to `max_edge` (never upscaled). A budget
    /// overrun that remains at the quality floor is accepted.
    pub fn synthesize(&self, image: &DynamicImage) -> Result<ThumbnailPayload> {
        let rgb = self.fit(image);
        let (bytes, quality) = self.encode_within_budget(&rgb)?;
        tracing::debug!(
            "Thumbnail {}x{} {} at quality {}: {} bytes",
            rgb.width(),
            rgb.height(),
            self.format.as_str(),
            quality,
            bytes.len()
        );

        Ok(ThumbnailPayload {
            format: self.format.as_str().to_string(),
            width: rgb.width(),
            height: rgb.height(),
            size_bytes: bytes.len() as u64,
            data: BASE64.encode(bytes),
        })
    }

    /// Convert to RGB and shrink into the edge box.
    fn fit(&self, image: &DynamicImage) -> RgbImage {
        let max_edge = self.config.max_edge;
        let (width, height) = image.dimensions();
        let rgb = DynamicImage::ImageRgb8(image.to_rgb8());
        if width <= max_edge && height <= max_edge {
            return rgb.into_rgb8();
        }
        rgb.thumbnail(max_edge, max_edge).into_rgb8()
    }

    /// Encode, stepping quality down while over budget and above the floor.
    ///
    /// Returns the final bytes with the quality they were encoded at.
    fn encode_within_budget(&self, rgb: &RgbImage) -> Result<(Vec<u8>, u8)> {
        let floor = self.config.quality_floor;
        let mut quality = self.config.quality;
        let mut bytes = self.encode(rgb, quality)?;

        if !self.format.is_lossy() {
            return Ok((bytes, quality));
        }

        while bytes.len() as u64 > self.config.max_bytes && quality > floor {
            quality = quality.saturating_sub(self.config.quality_step).max(floor);
            bytes = self.encode(rgb, quality)?;
        }
        Ok((bytes, quality))
    }

    fn encode(&self, rgb: &RgbImage, quality: u8) -> Result<Vec<u8>> {
        let mut buffer = Cursor::new(Vec::new());
        match self.format {
            ThumbnailFormat::Jpeg => {
                let mut encoder = JpegEncoder::new_with_quality(&mut buffer, quality);
                encoder.encode_image(rgb)?;
            }
            ThumbnailFormat::Png => rgb.write_to(&mut buffer, ImageFormat::Png)?,
            ThumbnailFormat::WebP => rgb.write_to(&mut buffer, ImageFormat::WebP)?,
        }
        Ok(buffer.into_inner())
    }
}

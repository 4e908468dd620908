//! Upload validation: extension whitelist, size limit, magic bytes.

use std::path::Path;

use crate::config::UploadConfig;
use crate::error::{PixvaultError, Result};

/// Validates uploads before and after they land on disk.
pub struct UploadValidator {
    config: UploadConfig,
}

impl UploadValidator {
    /// Create a new validator with the given limits.
    pub fn new(config: UploadConfig) -> Self {
        Self { config }
    }

    /// Lowercased extension of an uploaded filename.
    pub fn extension(filename: &str) -> Option<String> {
        Path::new(filename)
            .extension()
            .and_then(|ext| ext.to_str())
            .filter(|ext| !ext.is_empty())
            .map(|ext| ext.to_ascii_lowercase())
    }

    /// Resolve and whitelist the extension the file will be stored under.
    pub fn check_extension(&self, filename: &str) -> Result<String> {
        let ext = Self::extension(filename).ok_or_else(|| {
            PixvaultError::UnsupportedMediaType(format!("'{filename}' has no file extension"))
        })?;
        if !self.config.allows(&ext) {
            return Err(PixvaultError::UnsupportedMediaType(format!(
                "extension '{ext}' is not allowed"
            )));
        }
        Ok(ext)
    }

    /// Reject a size above the configured limit.
    pub fn check_size(&self, size: u64) -> Result<()> {
        let max = self.config.max_size_bytes();
        if size > max {
            return Err(PixvaultError::PayloadTooLarge { size, max });
        }
        Ok(())
    }

    /// Reject content whose header matches no known image format.
    pub fn check_magic_bytes(&self, bytes: &[u8]) -> Result<()> {
        let mut header = [0u8; 12];
        let bytes_read = bytes.len().min(header.len());
        header[..bytes_read].copy_from_slice(&bytes[..bytes_read]);

        if bytes_read < 4 {
            return Err(PixvaultError::UnsupportedMediaType(
                "file too small to be a valid image".to_string(),
            ));
        }
        if !Self::is_valid_image_header(&header, bytes_read) {
            return Err(PixvaultError::UnsupportedMediaType(
                "unrecognized image format (invalid magic bytes)".to_string(),
            ));
        }
        Ok(())
    }

    /// Check if the header bytes match known image formats.
    fn is_valid_image_header(header: &[u8; 12], bytes_read: usize) -> bool {
        if bytes_read < 4 {
            return false;
        }

        // JPEG: FF D8 FF
        if header[0] == 0xFF && header[1] == 0xD8 && header[2] == 0xFF {
            return true;
        }

        // PNG: 89 50 4E 47
        if header[0] == 0x89 && header[1] == b'P' && header[2] == b'N' && header[3] == b'G' {
            return true;
        }

        // GIF: GIF8
        if &header[..4] == b"GIF8" {
            return true;
        }

        // WebP: RIFF....WEBP
        if &header[..4] == b"RIFF" {
            return bytes_read >= 12 && &header[8..12] == b"WEBP";
        }

        // BMP: BM
        if header[0] == b'B' && header[1] == b'M' {
            return true;
        }

        // TIFF: II or MM followed by version 42
        let is_tiff_le =
            header[0] == b'I' && header[1] == b'I' && header[2] == 0x2A && header[3] == 0x00;
        let is_tiff_be =
            header[0] == b'M' && header[1] == b'M' && header[2] == 0x00 && header[3] == 0x2A;
        is_tiff_le || is_tiff_be
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validator() -> UploadValidator {
        UploadValidator::new(UploadConfig::default())
    }

    #[test]
    fn test_extension_is_lowercased() {
        assert_eq!(UploadValidator::extension("IMG_001.JPG").as_deref(), Some("jpg"));
        assert_eq!(UploadValidator::extension("archive.tar.gz").as_deref(), Some("gz"));
        assert!(UploadValidator::extension("README").is_none());
    }

    #[test]
    fn test_disallowed_extension_is_415() {
        let err = validator().check_extension("notes.txt").unwrap_err();
        assert_eq!(err.status_code(), 415);
        assert_eq!(validator().check_extension("cat.PNG").unwrap(), "png");
    }

    #[test]
    fn test_size_limit_is_413() {
        let v = validator();
        let max = UploadConfig::default().max_size_bytes();
        assert!(v.check_size(max).is_ok());
        let err = v.check_size(max + 1).unwrap_err();
        assert_eq!(err.status_code(), 413);
    }

    #[test]
    fn test_magic_bytes() {
        let v = validator();
        assert!(v.check_magic_bytes(&[0xFF, 0xD8, 0xFF, 0xE0, 0, 0]).is_ok());
        assert!(v
            .check_magic_bytes(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A])
            .is_ok());
        assert!(v.check_magic_bytes(b"RIFF\0\0\0\0WEBP").is_ok());
        assert!(v.check_magic_bytes(b"RIFF\0\0\0\0WAVE").is_err());
        assert!(v.check_magic_bytes(&[b'I', b'I', 0x2A, 0x00]).is_ok());
        assert!(v.check_magic_bytes(&[b'I', b'I', 0x00, 0x00]).is_err());
        assert!(v.check_magic_bytes(b"hello world").is_err());
        assert!(v.check_magic_bytes(b"ab").is_err());
    }
}

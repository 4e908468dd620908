//! Configuration validation with range checks.

use crate::error::ConfigError;

use super::Config;

impl Config {
    /// Validate configuration values are within acceptable ranges.
    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if self.upload.max_size_mb == 0 {
            return Err(ConfigError::ValidationError(
                "upload.max_size_mb must be > 0".into(),
            ));
        }
        if self.upload.allowed_exts.is_empty() {
            return Err(ConfigError::ValidationError(
                "upload.allowed_exts must not be empty".into(),
            ));
        }
        if self.pagination.page_size == 0 {
            return Err(ConfigError::ValidationError(
                "pagination.page_size must be > 0".into(),
            ));
        }
        if self.thumbnail.max_edge == 0 {
            return Err(ConfigError::ValidationError(
                "thumbnail.max_edge must be > 0".into(),
            ));
        }
        if self.thumbnail.max_bytes == 0 {
            return Err(ConfigError::ValidationError(
                "thumbnail.max_bytes must be > 0".into(),
            ));
        }
        if self.thumbnail.quality == 0 || self.thumbnail.quality > 100 {
            return Err(ConfigError::ValidationError(
                "thumbnail.quality must be between 1 and 100".into(),
            ));
        }
        if self.thumbnail.quality_floor == 0 || self.thumbnail.quality_floor > self.thumbnail.quality
        {
            return Err(ConfigError::ValidationError(
                "thumbnail.quality_floor must be between 1 and thumbnail.quality".into(),
            ));
        }
        if self.thumbnail.quality_step == 0 {
            return Err(ConfigError::ValidationError(
                "thumbnail.quality_step must be > 0".into(),
            ));
        }
        if crate::pipeline::ThumbnailFormat::parse(&self.thumbnail.format).is_none() {
            return Err(ConfigError::ValidationError(format!(
                "thumbnail.format '{}' is not one of jpeg, png, webp",
                self.thumbnail.format
            )));
        }
        if self.ai.max_retries == 0 {
            return Err(ConfigError::ValidationError(
                "ai.max_retries must be > 0".into(),
            ));
        }
        if self.ai.timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "ai.timeout_ms must be > 0".into(),
            ));
        }
        if !(1..=20).contains(&self.ai.max_tags) {
            return Err(ConfigError::ValidationError(
                "ai.max_tags must be between 1 and 20".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_passes_validation() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_page_size() {
        let mut config = Config::default();
        config.pagination.page_size = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("page_size"));
    }

    #[test]
    fn test_validate_rejects_zero_max_edge() {
        let mut config = Config::default();
        config.thumbnail.max_edge = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("thumbnail.max_edge"));
    }

    #[test]
    fn test_validate_rejects_floor_above_quality() {
        let mut config = Config::default();
        config.thumbnail.quality_floor = 90;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("quality_floor"));
    }

    #[test]
    fn test_validate_rejects_unknown_thumbnail_format() {
        let mut config = Config::default();
        config.thumbnail.format = "heic".into();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("heic"));
    }

    #[test]
    fn test_validate_rejects_zero_retries() {
        let mut config = Config::default();
        config.ai.max_retries = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("max_retries"));
    }

    #[test]
    fn test_validate_rejects_zero_max_tags() {
        let mut config = Config::default();
        config.ai.max_tags = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("ai.max_tags"));
    }
}

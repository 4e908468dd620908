//! Text-generation provider trait and request/reply types.
//!
//! Defines the interface that all providers implement, plus the factory
//! that creates the right provider from the `[ai]` config section.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use image::DynamicImage;
use std::io::Cursor;
use std::time::Duration;

use crate::config::AiConfig;
use crate::error::{PixvaultError, Result};

/// Longest edge of an image sent for analysis.
pub const ANALYSIS_MAX_EDGE: u32 = 1024;

/// JPEG quality of an image sent for analysis.
pub const ANALYSIS_JPEG_QUALITY: u8 = 85;

/// Base64-encoded image ready to send to a vision model.
#[derive(Debug, Clone)]
pub struct ImageInput {
    /// Base64-encoded image bytes
    pub data: String,
    /// MIME type (e.g., "image/jpeg")
    pub media_type: String,
}

impl ImageInput {
    /// Encode raw bytes of the given MIME type.
    pub fn from_bytes(bytes: &[u8], media_type: &str) -> Self {
        Self {
            data: BASE64.encode(bytes),
            media_type: media_type.to_string(),
        }
    }

    /// Flatten to RGB, shrink to [`ANALYSIS_MAX_EDGE`] and encode as JPEG.
    pub fn from_image(image: &DynamicImage) -> Result<Self> {
        let fitted = if image.width().max(image.height()) > ANALYSIS_MAX_EDGE {
            image.thumbnail(ANALYSIS_MAX_EDGE, ANALYSIS_MAX_EDGE)
        } else {
            image.clone()
        };
        let rgb = fitted.to_rgb8();
        let mut buffer = Cursor::new(Vec::new());
        image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buffer, ANALYSIS_JPEG_QUALITY)
            .encode_image(&rgb)?;
        Ok(Self::from_bytes(buffer.get_ref(), "image/jpeg"))
    }

    /// Data URL for OpenAI-style APIs.
    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.media_type, self.data)
    }
}

/// A single-turn prompt, optionally about one image.
#[derive(Debug, Clone)]
pub struct LlmRequest {
    /// Image shown to the model before the prompt
    pub image: Option<ImageInput>,
    /// Text prompt for the model
    pub prompt: String,
    /// Maximum tokens to generate
    pub max_tokens: u32,
    /// Sampling temperature
    pub temperature: f32,
}

/// A successful generation.
#[derive(Debug, Clone)]
pub struct LlmResponse {
    /// Generated text
    pub text: String,
    /// Model identifier used
    pub model: String,
    /// Number of tokens used (input + output), if reported
    pub tokens_used: Option<u32>,
    /// Round-trip latency in milliseconds
    pub latency_ms: u64,
}

/// Outcome of one provider call.
///
/// Transport failures and unparseable bodies carry no status code.
#[derive(Debug, Clone)]
pub enum Completion {
    Text(LlmResponse),
    Error {
        status_code: Option<u16>,
        message: String,
    },
}

impl Completion {
    pub(crate) fn error(status_code: Option<u16>, message: impl Into<String>) -> Self {
        Self::Error {
            status_code,
            message: message.into(),
        }
    }
}

/// Trait that all providers implement.
///
/// Uses `async_trait` because native async fn in trait is not object-safe
/// (we need `Box<dyn LlmProvider>` for dynamic dispatch).
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Provider name for logging (e.g., "openai", "dashscope").
    fn name(&self) -> &str;

    /// Run one generation. Never fails outright; errors are a `Completion::Error`.
    async fn generate(&self, request: &LlmRequest) -> Completion;

    /// Per-request timeout for this provider.
    fn timeout(&self) -> Duration;

    /// Whether requests may carry an [`ImageInput`].
    fn accepts_images(&self) -> bool {
        true
    }
}

/// Resolve `${ENV_VAR}` references in config strings.
pub fn resolve_env_var(value: &str) -> Option<String> {
    if value.starts_with("${") && value.ends_with('}') {
        let var_name = &value[2..value.len() - 1];
        std::env::var(var_name).ok().filter(|v| !v.is_empty())
    } else if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// Factory that creates the configured provider.
pub struct LlmProviderFactory;

impl LlmProviderFactory {
    /// Create a provider from the `[ai]` section with an already-resolved key.
    ///
    /// * `openai` - OpenAI-compatible chat completions at `base_url`
    /// * `dashscope` - DashScope native text generation at `base_url`
    /// * `anthropic` - Anthropic Messages API
    pub fn create(config: &AiConfig, api_key: &str) -> Result<Box<dyn LlmProvider>> {
        Self::create_for_model(config, api_key, &config.model)
    }

    /// Like [`create`](Self::create) but talking to `model` instead of `ai.model`.
    pub fn create_for_model(
        config: &AiConfig,
        api_key: &str,
        model: &str,
    ) -> Result<Box<dyn LlmProvider>> {
        let timeout = Duration::from_millis(config.timeout_ms);
        match config.provider.as_str() {
            "openai" => Ok(Box::new(super::openai::OpenAiProvider::new(
                &config.base_url,
                api_key,
                model,
                timeout,
            ))),
            "dashscope" => Ok(Box::new(super::dashscope::DashScopeProvider::new(
                &config.base_url,
                api_key,
                model,
                timeout,
            ))),
            "anthropic" => Ok(Box::new(super::anthropic::AnthropicProvider::new(
                api_key,
                model,
                timeout,
            ))),
            other => Err(PixvaultError::validation(format!(
                "unknown ai.provider '{other}'"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_env_var() {
        // Non-env-var strings pass through
        assert_eq!(resolve_env_var("plain-key"), Some("plain-key".to_string()));
        // Empty returns None
        assert_eq!(resolve_env_var(""), None);
        // Unset env var returns None
        assert_eq!(resolve_env_var("${DEFINITELY_NOT_SET_XYZ_123}"), None);
    }

    #[test]
    fn test_factory_selects_provider() {
        let mut config = AiConfig::default();
        for name in ["openai", "dashscope", "anthropic"] {
            config.provider = name.to_string();
            let provider = LlmProviderFactory::create(&config, "key").unwrap();
            assert_eq!(provider.name(), name);
            assert_eq!(provider.timeout(), Duration::from_millis(config.timeout_ms));
        }
    }

    #[test]
    fn test_factory_uses_requested_model_and_image_support() {
        let config = AiConfig {
            provider: "dashscope".into(),
            ..AiConfig::default()
        };
        let provider = LlmProviderFactory::create_for_model(&config, "key", "qwen-vl-plus").unwrap();
        assert!(!provider.accepts_images());

        let config = AiConfig::default();
        let provider = LlmProviderFactory::create_for_model(&config, "key", "qwen-vl-plus").unwrap();
        assert!(provider.accepts_images());
    }

    #[test]
    fn test_image_input_is_bounded_jpeg() {
        let image = DynamicImage::new_rgba8(2048, 512);
        let input = ImageInput::from_image(&image).unwrap();
        assert_eq!(input.media_type, "image/jpeg");
        assert!(input.data_url().starts_with("data:image/jpeg;base64,/9j/"));

        let bytes = BASE64.decode(&input.data).unwrap();
        let decoded = image::load_from_memory(&bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (1024, 256));
    }

    #[test]
    fn test_factory_rejects_unknown_provider() {
        let config = AiConfig {
            provider: "ollama".into(),
            ..AiConfig::default()
        };
        let err = LlmProviderFactory::create(&config, "key").err().unwrap();
        assert_eq!(err.status_code(), 400);
    }
}

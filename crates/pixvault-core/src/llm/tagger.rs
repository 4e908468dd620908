//! Per-image tag generation with a vision model.

use std::sync::Arc;

use tracing::info;

use super::provider::{ImageInput, LlmProvider, LlmProviderFactory, LlmRequest};
use super::resolver::{answer_line, split_tags, TagResolver, ANSWER_DELIMITER};
use super::retry::RetryPolicy;
use crate::config::AiConfig;
use crate::error::{PixvaultError, Result};

/// Asks a vision model for short descriptive tags of one image.
pub struct ImageTagger {
    provider: Arc<dyn LlmProvider>,
    retry: RetryPolicy,
    max_tags: usize,
    max_tokens: u32,
    temperature: f32,
}

impl ImageTagger {
    pub fn new(provider: Arc<dyn LlmProvider>, config: &AiConfig) -> Self {
        Self {
            provider,
            retry: RetryPolicy::from_config(config),
            max_tags: config.max_tags.max(1),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        }
    }

    /// Build a provider for `ai.vision_model`.
    pub fn from_config(config: &AiConfig) -> Result<Self> {
        let api_key = TagResolver::check_available(config)?;
        let provider: Arc<dyn LlmProvider> =
            LlmProviderFactory::create_for_model(config, &api_key, &config.vision_model)?.into();
        Ok(Self::new(provider, config))
    }

    /// Distinct, non-empty tags for `image`, at most `ai.max_tags`.
    ///
    /// Providers that cannot take images fail with `NotImplemented` before
    /// any request is sent.
    pub async fn tag(&self, image: ImageInput) -> Result<Vec<String>> {
        if !self.provider.accepts_images() {
            return Err(PixvaultError::NotImplemented(format!(
                "image analysis is not supported by the '{}' provider",
                self.provider.name()
            )));
        }

        let request = LlmRequest {
            image: Some(image),
            prompt: build_prompt(self.max_tags),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        };
        let text = self.retry.generate(self.provider.as_ref(), &request).await?;

        let mut tags = parse_tags(&text);
        tags.truncate(self.max_tags);
        if tags.is_empty() {
            return Err(PixvaultError::upstream("provider returned no tags", None));
        }
        info!(provider = self.provider.name(), tags = ?tags, "Generated image tags");
        Ok(tags)
    }
}

fn build_prompt(max_tags: usize) -> String {
    format!(
        "Give at most {max_tags} short tags (one or two words each) describing this photo: \
         the main subject, the setting, and notable objects or activities.\n\
         Reply with only the tags, separated by \"{ANSWER_DELIMITER}\"."
    )
}

/// Tags from a reply, taken from an `###### answer:` line if the model added one.
fn parse_tags(text: &str) -> Vec<String> {
    split_tags(answer_line(text).unwrap_or(text))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::provider::{Completion, LlmResponse};
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Records the requests it sees and answers with a fixed reply.
    struct VisionProvider {
        reply: Completion,
        accepts_images: bool,
        seen: Mutex<Vec<LlmRequest>>,
    }

    impl VisionProvider {
        fn replying(text: &str) -> Self {
            Self {
                reply: Completion::Text(LlmResponse {
                    text: text.to_string(),
                    model: "vision-mock".into(),
                    tokens_used: None,
                    latency_ms: 1,
                }),
                accepts_images: true,
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl LlmProvider for VisionProvider {
        fn name(&self) -> &str {
            "vision-mock"
        }

        async fn generate(&self, request: &LlmRequest) -> Completion {
            self.seen.lock().unwrap().push(request.clone());
            self.reply.clone()
        }

        fn timeout(&self) -> Duration {
            Duration::from_secs(1)
        }

        fn accepts_images(&self) -> bool {
            self.accepts_images
        }
    }

    fn config(max_tags: usize) -> AiConfig {
        AiConfig {
            enabled: true,
            api_key: "k".into(),
            max_tags,
            retry_delay_ms: 1,
            ..AiConfig::default()
        }
    }

    fn image() -> ImageInput {
        ImageInput::from_bytes(b"jpeg", "image/jpeg")
    }

    #[test]
    fn test_parse_tags_plain_and_marked() {
        assert_eq!(parse_tags("cat。sofa。indoor"), vec!["cat", "sofa", "indoor"]);
        assert_eq!(
            parse_tags("Here you go:\n###### answer: beach, sunset"),
            vec!["beach", "sunset"]
        );
        assert_eq!(parse_tags("dog、dog、park\n\n"), vec!["dog", "park"]);
    }

    #[test]
    fn test_prompt_states_limit_and_delimiter() {
        let prompt = build_prompt(4);
        assert!(prompt.contains("at most 4"));
        assert!(prompt.contains("。"));
    }

    #[tokio::test]
    async fn test_tag_sends_image_and_caps_result() {
        let provider = Arc::new(VisionProvider::replying("cat。sofa。window。lamp"));
        let tagger = ImageTagger::new(provider.clone(), &config(2));
        let tags = tagger.tag(image()).await.unwrap();
        assert_eq!(tags, vec!["cat", "sofa"]);

        let seen = provider.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].image.as_ref().unwrap().media_type, "image/jpeg");
    }

    #[tokio::test]
    async fn test_text_only_provider_is_not_implemented() {
        let mut provider = VisionProvider::replying("cat");
        provider.accepts_images = false;
        let provider = Arc::new(provider);
        let tagger = ImageTagger::new(provider.clone(), &config(5));
        let err = tagger.tag(image()).await.unwrap_err();
        assert_eq!(err.status_code(), 501);
        assert!(provider.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_reply_without_tags_is_upstream_error() {
        let tagger = ImageTagger::new(Arc::new(VisionProvider::replying("。，")), &config(5));
        let err = tagger.tag(image()).await.unwrap_err();
        assert_eq!(err.status_code(), 502);
    }
}

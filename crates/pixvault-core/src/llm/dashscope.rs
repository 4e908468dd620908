//! DashScope native text-generation provider.
//!
//! The text-generation endpoint takes no images; vision requests need the
//! OpenAI-compatible mode instead.

use super::provider::{Completion, LlmProvider, LlmRequest, LlmResponse};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Provider for `/services/aigc/text-generation/generation`.
pub struct DashScopeProvider {
    api_key: String,
    model: String,
    client: reqwest::Client,
    endpoint: String,
    timeout: Duration,
}

impl DashScopeProvider {
    pub fn new(base_url: &str, api_key: &str, model: &str, timeout: Duration) -> Self {
        Self {
            api_key: api_key.to_string(),
            model: model.to_string(),
            client: reqwest::Client::new(),
            endpoint: format!(
                "{}/services/aigc/text-generation/generation",
                base_url.trim_end_matches('/')
            ),
            timeout,
        }
    }
}

// --- Request types ---

#[derive(Serialize)]
struct GenerationRequest<'a> {
    model: &'a str,
    input: Input<'a>,
    parameters: Parameters,
}

#[derive(Serialize)]
struct Input<'a> {
    messages: Vec<Message<'a>>,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct Parameters {
    max_tokens: u32,
    temperature: f32,
    result_format: &'static str,
}

// --- Response types ---

#[derive(Deserialize)]
struct GenerationResponse {
    output: Output,
    usage: Option<Usage>,
}

/// Either `text` or `choices`, depending on `result_format`.
#[derive(Deserialize)]
struct Output {
    text: Option<String>,
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct Usage {
    #[serde(default)]
    input_tokens: u32,
    #[serde(default)]
    output_tokens: u32,
}

impl Output {
    fn into_text(self) -> Option<String> {
        self.choices
            .into_iter()
            .find_map(|c| c.message.content)
            .or(self.text)
    }
}

#[async_trait]
impl LlmProvider for DashScopeProvider {
    fn name(&self) -> &str {
        "dashscope"
    }

    async fn generate(&self, request: &LlmRequest) -> Completion {
        let start = Instant::now();

        let body = GenerationRequest {
            model: &self.model,
            input: Input {
                messages: vec![Message {
                    role: "user",
                    content: &request.prompt,
                }],
            },
            parameters: Parameters {
                max_tokens: request.max_tokens,
                temperature: request.temperature,
                result_format: "message",
            },
        };

        let resp = match self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .header("X-DashScope-SSE", "disable")
            .json(&body)
            .timeout(self.timeout())
            .send()
            .await
        {
            Ok(resp) => resp,
            Err(e) => return Completion::error(None, format!("DashScope request failed: {e}")),
        };

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Completion::error(
                Some(status.as_u16()),
                format!("DashScope HTTP {status}: {text}"),
            );
        }

        let parsed: GenerationResponse = match resp.json().await {
            Ok(parsed) => parsed,
            Err(e) => {
                return Completion::error(
                    None,
                    format!("Failed to parse DashScope response: {e}"),
                )
            }
        };

        let tokens_used = parsed.usage.map(|u| u.input_tokens + u.output_tokens);
        let Some(text) = parsed.output.into_text() else {
            return Completion::error(None, "DashScope returned no text");
        };

        Completion::Text(LlmResponse {
            text: text.trim().to_string(),
            model: self.model.clone(),
            tokens_used,
            latency_ms: start.elapsed().as_millis() as u64,
        })
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    fn accepts_images(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_prefers_message_choices() {
        let parsed: GenerationResponse = serde_json::from_str(
            r#"{"output":{"choices":[{"message":{"role":"assistant","content":"a。b"}}]},
                "usage":{"input_tokens":10,"output_tokens":3}}"#,
        )
        .unwrap();
        assert_eq!(parsed.output.into_text().as_deref(), Some("a。b"));
    }

    #[test]
    fn test_output_falls_back_to_text() {
        let parsed: GenerationResponse =
            serde_json::from_str(r#"{"output":{"text":"plain"}}"#).unwrap();
        assert_eq!(parsed.output.into_text().as_deref(), Some("plain"));
    }

    #[test]
    fn test_endpoint() {
        let provider = DashScopeProvider::new(
            "https://dashscope.aliyuncs.com/api/v1",
            "key",
            "qwen-plus",
            Duration::from_secs(1),
        );
        assert!(provider
            .endpoint
            .ends_with("/api/v1/services/aigc/text-generation/generation"));
    }
}

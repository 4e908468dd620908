//! Anthropic provider using the Messages API.
//!
//! Images are sent as base64 content blocks ahead of the prompt text.

use super::provider::{Completion, LlmProvider, LlmRequest, LlmResponse};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

const MESSAGES_ENDPOINT: &str = "https://api.anthropic.com/v1/messages";

/// Anthropic provider using the Messages API.
pub struct AnthropicProvider {
    api_key: String,
    model: String,
    client: reqwest::Client,
    timeout: Duration,
}

impl AnthropicProvider {
    pub fn new(api_key: &str, model: &str, timeout: Duration) -> Self {
        Self {
            api_key: api_key.to_string(),
            model: model.to_string(),
            client: reqwest::Client::new(),
            timeout,
        }
    }
}

// --- Request types ---

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<Message<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'a str,
    content: Vec<ContentBlock<'a>>,
}

#[derive(Serialize)]
#[serde(tag = "type")]
enum ContentBlock<'a> {
    #[serde(rename = "image")]
    Image { source: ImageSource<'a> },
    #[serde(rename = "text")]
    Text { text: &'a str },
}

#[derive(Serialize)]
struct ImageSource<'a> {
    #[serde(rename = "type")]
    source_type: &'static str,
    media_type: &'a str,
    data: &'a str,
}

fn content_blocks(request: &LlmRequest) -> Vec<ContentBlock<'_>> {
    let mut blocks = Vec::with_capacity(2);
    if let Some(image) = &request.image {
        blocks.push(ContentBlock::Image {
            source: ImageSource {
                source_type: "base64",
                media_type: &image.media_type,
                data: &image.data,
            },
        });
    }
    blocks.push(ContentBlock::Text {
        text: &request.prompt,
    });
    blocks
}

// --- Response types ---

#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<ResponseContent>,
    model: String,
    usage: Usage,
}

#[derive(Deserialize)]
struct ResponseContent {
    text: Option<String>,
}

#[derive(Deserialize)]
struct Usage {
    input_tokens: u32,
    output_tokens: u32,
}

#[async_trait]
impl LlmProvider for AnthropicProvider {
    fn name(&self) -> &str {
        "anthropic"
    }

    async fn generate(&self, request: &LlmRequest) -> Completion {
        let start = Instant::now();

        let body = MessagesRequest {
            model: &self.model,
            max_tokens: request.max_tokens,
            temperature: Some(request.temperature),
            messages: vec![Message {
                role: "user",
                content: content_blocks(request),
            }],
        };

        let resp = match self
            .client
            .post(MESSAGES_ENDPOINT)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&body)
            .timeout(self.timeout())
            .send()
            .await
        {
            Ok(resp) => resp,
            Err(e) => return Completion::error(None, format!("Anthropic request failed: {e}")),
        };

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Completion::error(
                Some(status.as_u16()),
                format!("Anthropic HTTP {status}: {text}"),
            );
        }

        let messages_resp: MessagesResponse = match resp.json().await {
            Ok(parsed) => parsed,
            Err(e) => {
                return Completion::error(
                    None,
                    format!("Failed to parse Anthropic response: {e}"),
                )
            }
        };

        let text = messages_resp
            .content
            .into_iter()
            .filter_map(|c| c.text)
            .collect::<Vec<_>>()
            .join("");

        Completion::Text(LlmResponse {
            text: text.trim().to_string(),
            model: messages_resp.model,
            tokens_used: Some(messages_resp.usage.input_tokens + messages_resp.usage.output_tokens),
            latency_ms: start.elapsed().as_millis() as u64,
        })
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }
}

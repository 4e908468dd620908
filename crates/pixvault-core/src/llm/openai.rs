//! OpenAI-compatible provider using the Chat Completions API.
//!
//! Works against any endpoint that speaks the format, including DashScope's
//! compatible mode (the default `base_url`). Images travel as a data URL in
//! the user message's content array.

use super::provider::{Completion, LlmProvider, LlmRequest, LlmResponse};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// OpenAI-compatible provider.
pub struct OpenAiProvider {
    api_key: String,
    model: String,
    client: reqwest::Client,
    endpoint: String,
    timeout: Duration,
}

impl OpenAiProvider {
    pub fn new(base_url: &str, api_key: &str, model: &str, timeout: Duration) -> Self {
        Self {
            api_key: api_key.to_string(),
            model: model.to_string(),
            client: reqwest::Client::new(),
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
            timeout,
        }
    }
}

// --- Request types ---

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: MessageContent<'a>,
}

/// Plain text, or content parts when an image is attached.
#[derive(Serialize)]
#[serde(untagged)]
enum MessageContent<'a> {
    Text(&'a str),
    Parts(Vec<ContentPart<'a>>),
}

#[derive(Serialize)]
#[serde(tag = "type")]
enum ContentPart<'a> {
    #[serde(rename = "image_url")]
    ImageUrl { image_url: ImageUrl },
    #[serde(rename = "text")]
    Text { text: &'a str },
}

#[derive(Serialize)]
struct ImageUrl {
    url: String,
}

fn message_content(request: &LlmRequest) -> MessageContent<'_> {
    match &request.image {
        Some(image) => MessageContent::Parts(vec![
            ContentPart::ImageUrl {
                image_url: ImageUrl {
                    url: image.data_url(),
                },
            },
            ContentPart::Text {
                text: &request.prompt,
            },
        ]),
        None => MessageContent::Text(&request.prompt),
    }
}

// --- Response types ---

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
    #[serde(default)]
    model: Option<String>,
    usage: Option<ChatUsage>,
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
struct ChatUsage {
    total_tokens: u32,
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    async fn generate(&self, request: &LlmRequest) -> Completion {
        let start = Instant::now();

        let body = ChatRequest {
            model: &self.model,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            messages: vec![ChatMessage {
                role: "user",
                content: message_content(request),
            }],
        };

        let resp = match self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .timeout(self.timeout())
            .send()
            .await
        {
            Ok(resp) => resp,
            Err(e) => return Completion::error(None, format!("OpenAI request failed: {e}")),
        };

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Completion::error(
                Some(status.as_u16()),
                format!("OpenAI HTTP {status}: {text}"),
            );
        }

        let chat_resp: ChatResponse = match resp.json().await {
            Ok(parsed) => parsed,
            Err(e) => {
                return Completion::error(None, format!("Failed to parse OpenAI response: {e}"))
            }
        };

        let Some(text) = chat_resp
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
        else {
            return Completion::error(None, "OpenAI returned no choices");
        };

        Completion::Text(LlmResponse {
            text: text.trim().to_string(),
            model: chat_resp.model.unwrap_or_else(|| self.model.clone()),
            tokens_used: chat_resp.usage.map(|u| u.total_tokens),
            latency_ms: start.elapsed().as_millis() as u64,
        })
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::provider::ImageInput;

    #[test]
    fn test_endpoint_joins_base_url() {
        let provider = OpenAiProvider::new(
            "https://dashscope.aliyuncs.com/compatible-mode/v1/",
            "key",
            "qwen-plus",
            Duration::from_secs(5),
        );
        assert_eq!(
            provider.endpoint,
            "https://dashscope.aliyuncs.com/compatible-mode/v1/chat/completions"
        );
    }

    #[test]
    fn test_request_body_shape() {
        let body = ChatRequest {
            model: "qwen-plus",
            max_tokens: 800,
            temperature: 0.2,
            messages: vec![ChatMessage {
                role: "user",
                content: MessageContent::Text("hello"),
            }],
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["messages"][0]["content"], "hello");
        assert_eq!(json["max_tokens"], 800);
    }

    #[test]
    fn test_image_request_uses_content_parts() {
        let request = LlmRequest {
            image: Some(ImageInput::from_bytes(b"abc", "image/jpeg")),
            prompt: "tag this".into(),
            max_tokens: 100,
            temperature: 0.2,
        };
        let json = serde_json::to_value(message_content(&request)).unwrap();
        assert_eq!(json[0]["type"], "image_url");
        assert_eq!(json[0]["image_url"]["url"], "data:image/jpeg;base64,YWJj");
        assert_eq!(json[1]["type"], "text");
        assert_eq!(json[1]["text"], "tag this");
    }

    #[test]
    fn test_response_parses_without_usage() {
        let parsed: ChatResponse =
            serde_json::from_str(r#"{"choices":[{"message":{"content":"hi"}}]}"#).unwrap();
        assert_eq!(parsed.choices[0].message.content.as_deref(), Some("hi"));
        assert!(parsed.usage.is_none());
    }
}

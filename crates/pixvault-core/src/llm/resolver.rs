//! Free-text to tag resolution.
//!
//! Turns a natural-language query into a short list of catalog tag names by
//! asking a text-generation provider to choose from the vocabulary, then
//! parsing the marker line out of its reply.

use std::sync::Arc;

use tracing::info;

use super::provider::{resolve_env_var, LlmProvider, LlmProviderFactory, LlmRequest};
use super::retry::RetryPolicy;
use crate::config::AiConfig;
use crate::error::{PixvaultError, Result};

/// Upper bound on tags chosen for one query.
pub const MAX_RESOLVED_TAGS: usize = 5;

/// Delimiter the model is told to use on the marker line.
pub const ANSWER_DELIMITER: char = '。';

const MARKER_PREFIX: &str = "######";
const SPLIT_CHARS: &[char] = &['。', '．', '，', ',', '、', '；', ';', '\n'];
const TRIM_CHARS: &[char] = &[
    '，', '。', '；', '：', ',', '.', ';', ':', '！', '？', '!', '?', ' ', '\t', '\r', '\u{3000}',
];

/// Tags chosen for a query, plus the raw model text.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedTags {
    pub ai_output: String,
    pub tags: Vec<String>,
}

/// Calls a provider with bounded retries and parses its answer.
pub struct TagResolver {
    provider: Arc<dyn LlmProvider>,
    retry: RetryPolicy,
    max_tokens: u32,
    temperature: f32,
}

impl TagResolver {
    /// Wrap an existing provider with the retry and sampling settings of `config`.
    pub fn new(provider: Arc<dyn LlmProvider>, config: &AiConfig) -> Self {
        Self {
            provider,
            retry: RetryPolicy::from_config(config),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        }
    }

    /// Build the configured provider. Fails when the feature is off or no key is set.
    pub fn from_config(config: &AiConfig) -> Result<Self> {
        let api_key = Self::check_available(config)?;
        let provider: Arc<dyn LlmProvider> = LlmProviderFactory::create(config, &api_key)?.into();
        Ok(Self::new(provider, config))
    }

    /// Check the enable flag and credential, returning the resolved key.
    pub fn check_available(config: &AiConfig) -> Result<String> {
        if !config.enabled {
            return Err(PixvaultError::validation("AI features are disabled"));
        }
        resolve_env_var(&config.api_key)
            .ok_or_else(|| PixvaultError::validation("AI features have no API key configured"))
    }

    /// Resolve `query` against `vocabulary` (distinct tag names).
    pub async fn resolve(&self, vocabulary: &[String], query: &str) -> Result<ResolvedTags> {
        if vocabulary.is_empty() {
            return Err(PixvaultError::validation(
                "no tags in the library to search against",
            ));
        }

        let max_tags = MAX_RESOLVED_TAGS.min(vocabulary.len());
        let request = LlmRequest {
            image: None,
            prompt: build_prompt(vocabulary, query, max_tags),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        };

        let ai_output = self.retry.generate(self.provider.as_ref(), &request).await?;
        let tags = parse_answer(&ai_output, vocabulary, max_tags);
        info!(
            provider = self.provider.name(),
            query,
            tags = ?tags,
            "Resolved free-text query"
        );
        Ok(ResolvedTags { ai_output, tags })
    }
}

/// Build the single-turn prompt.
pub fn build_prompt(vocabulary: &[String], query: &str, max_tags: usize) -> String {
    let mut prompt = String::from("You are choosing tags for a photo search.\n\nAvailable tags:\n");
    for tag in vocabulary {
        prompt.push_str("- ");
        prompt.push_str(tag);
        prompt.push('\n');
    }
    prompt.push_str(&format!("\nSearch request: {query}\n\n"));
    prompt.push_str(&format!(
        "Requirements:\n\
         1. Choose at most {max_tags} tags that best match the request.\n\
         2. Only use tags from the list above, spelled exactly as listed.\n\
         3. Explain your reasoning briefly first.\n\
         4. End with exactly one line in this form, tags separated by \"{ANSWER_DELIMITER}\":\n\
         {MARKER_PREFIX} answer: tag1{ANSWER_DELIMITER}tag2\n"
    ));
    prompt
}

/// Extract tags from a model reply.
///
/// Without a usable marker line the whole reply is parsed. Tokens found in
/// `vocabulary` win, then vocabulary words inside longer phrases; if neither
/// matches, the raw tokens are kept. The result has at most `max_tags` entries.
pub fn parse_answer(text: &str, vocabulary: &[String], max_tags: usize) -> Vec<String> {
    let raw = answer_line(text).unwrap_or(text);
    let parsed = split_tags(raw);
    let mut tags = in_vocabulary(&parsed, vocabulary);
    if tags.is_empty() {
        tags = in_vocabulary(&dedupe_trimmed(raw.split_whitespace()), vocabulary);
    }
    if tags.is_empty() {
        tags = parsed;
    }
    tags.truncate(max_tags);
    tags
}

fn in_vocabulary(tokens: &[String], vocabulary: &[String]) -> Vec<String> {
    tokens
        .iter()
        .filter(|tag| vocabulary.contains(tag))
        .cloned()
        .collect()
}

/// The payload of the first `###### answer:` line with something after the colon.
pub(crate) fn answer_line(text: &str) -> Option<&str> {
    text.lines().find_map(|line| {
        let rest = line.trim().strip_prefix(MARKER_PREFIX)?.trim_start();
        let keyword = rest.get(..6)?;
        if !keyword.eq_ignore_ascii_case("answer") {
            return None;
        }
        let rest = rest[6..].trim_start();
        rest.strip_prefix(':')
            .or_else(|| rest.strip_prefix('：'))
            .map(str::trim)
            .filter(|payload| !payload.is_empty())
    })
}

/// Split on list punctuation (falling back to whitespace), trim, and dedupe.
pub fn split_tags(raw: &str) -> Vec<String> {
    let tags = dedupe_trimmed(raw.split(SPLIT_CHARS));
    if tags.is_empty() {
        dedupe_trimmed(raw.split_whitespace())
    } else {
        tags
    }
}

fn dedupe_trimmed<'a>(parts: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for part in parts {
        let tag = part.trim().trim_matches(TRIM_CHARS);
        if !tag.is_empty() && !out.iter().any(|t| t == tag) {
            out.push(tag.to_string());
        }
    }
    out
}

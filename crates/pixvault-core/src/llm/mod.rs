//! Tag resolution and image tagging backed by a generation service.
//!
//! Provides a provider abstraction over several HTTP backends (OpenAI-compatible,
//! DashScope native, Anthropic), the resolver that turns a search query into
//! catalog tag names, and the tagger that asks a vision model about one image.

pub(crate) mod anthropic;
pub(crate) mod dashscope;
pub(crate) mod openai;
pub(crate) mod provider;
pub(crate) mod resolver;
pub(crate) mod retry;
pub(crate) mod tagger;

pub use provider::{
    Completion, ImageInput, LlmProvider, LlmProviderFactory, LlmRequest, LlmResponse,
};
pub use resolver::{ResolvedTags, TagResolver, MAX_RESOLVED_TAGS};
pub use retry::RetryPolicy;
pub use tagger::ImageTagger;

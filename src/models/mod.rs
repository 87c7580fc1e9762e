//! Embedding and text-generation providers.
//!
//! Provides:
//! - `Embedder` / `Generator` capability traits
//! - OpenAI (async-openai) and Mistral (REST) implementations
//! - `ProviderRegistry`, which maps a configuration key to a provider

pub mod mistral;
pub mod openai;
pub mod registry;

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::Result;

pub use mistral::{MistralClient, MistralEmbedder, MistralGenerator};
pub use openai::{OpenAiEmbedder, OpenAiGenerator};
pub use registry::{ProviderEntry, ProviderRegistry, MISTRAL, OPENAI};

/// Lazy, finite, non-restartable sequence of generated text fragments.
pub type TextStream = BoxStream<'static, Result<String>>;

/// Options applied when constructing a generator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GenerationOptions {
    /// Ask the provider for a JSON object response
    pub json_response: bool,
}

impl GenerationOptions {
    pub fn json() -> Self {
        Self {
            json_response: true,
        }
    }
}

/// Maps text to a fixed-length vector.
#[async_trait]
pub trait Embedder: Send + Sync {
    fn model_name(&self) -> &str;

    /// Vector length produced by this model
    fn dimension(&self) -> usize;

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_batch(&[text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| crate::Error::ProviderError("No embedding returned".to_string()))
    }
}

/// Maps a prompt to generated text.
#[async_trait]
pub trait Generator: Send + Sync {
    fn model_name(&self) -> &str;

    async fn complete(&self, prompt: &str) -> Result<String>;

    /// Stream the answer as it is produced.
    async fn stream(&self, prompt: &str) -> Result<TextStream>;
}

/// Character-safe truncation used before sending text to an embedding API.
pub(crate) fn truncate_chars(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

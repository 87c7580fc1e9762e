//! OpenAI embeddings and chat completions via async-openai

use async_openai::{
    config::OpenAIConfig,
    types::{
        ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequest,
        CreateChatCompletionRequestArgs, CreateEmbeddingRequestArgs, EmbeddingInput,
        ResponseFormat,
    },
    Client,
};
use async_trait::async_trait;
use futures::StreamExt;
use tracing::{debug, info};

use super::{truncate_chars, Embedder, GenerationOptions, Generator, TextStream};
use crate::{Error, Result};

pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-ada-002";
pub const DEFAULT_CHAT_MODEL: &str = "gpt-4o";

const MAX_EMBED_CHARS: usize = 8000;

/// Build the client config from `OPENAI_API_KEY` and optional `OPENAI_BASE_URL`.
pub fn config_from_env() -> Result<OpenAIConfig> {
    let api_key = std::env::var("OPENAI_API_KEY")
        .map_err(|_| Error::InvalidArgument("OPENAI_API_KEY not set".to_string()))?;
    if api_key.trim().is_empty() {
        return Err(Error::InvalidArgument("OPENAI_API_KEY is empty".to_string()));
    }

    let mut config = OpenAIConfig::new().with_api_key(api_key);
    if let Ok(base) = std::env::var("OPENAI_BASE_URL") {
        config = config.with_api_base(base);
    }
    Ok(config)
}

/// OpenAI embedding provider
pub struct OpenAiEmbedder {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiEmbedder {
    pub fn from_env() -> Result<Self> {
        Ok(Self::with_config(config_from_env()?, DEFAULT_EMBEDDING_MODEL))
    }

    pub fn with_config(config: OpenAIConfig, model: impl Into<String>) -> Self {
        Self {
            client: Client::with_config(config),
            model: model.into(),
        }
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dimension(&self) -> usize {
        match self.model.as_str() {
            "text-embedding-3-large" => 3072,
            _ => 1536,
        }
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!("Generating embeddings for {} texts", texts.len());

        let processed: Vec<String> = texts
            .iter()
            .map(|t| truncate_chars(t.trim(), MAX_EMBED_CHARS))
            .filter(|t| !t.is_empty())
            .collect();

        if processed.is_empty() {
            return Ok(vec![Vec::new(); texts.len()]);
        }

        let expected = processed.len();
        let request = CreateEmbeddingRequestArgs::default()
            .model(&self.model)
            .input(EmbeddingInput::StringArray(processed))
            .build()?;

        let response = self.client.embeddings().create(request).await?;

        info!(
            "Generated {} embeddings, tokens used: {}",
            response.data.len(),
            response.usage.total_tokens
        );

        if response.data.len() != expected {
            return Err(Error::ProviderError(format!(
                "Expected {} embeddings, got {}",
                expected,
                response.data.len()
            )));
        }

        // Map back to original indices (empty texts get empty vectors)
        let mut data = response.data;
        data.sort_by_key(|e| e.index);
        let mut embed_iter = data.into_iter();
        let mut result = Vec::with_capacity(texts.len());

        for text in texts {
            if text.trim().is_empty() {
                result.push(Vec::new());
            } else if let Some(embed) = embed_iter.next() {
                result.push(embed.embedding);
            }
        }

        Ok(result)
    }
}

/// OpenAI chat generator, temperature fixed at zero.
pub struct OpenAiGenerator {
    client: Client<OpenAIConfig>,
    model: String,
    json_response: bool,
}

impl OpenAiGenerator {
    pub fn from_env(options: &GenerationOptions) -> Result<Self> {
        Ok(Self::with_config(
            config_from_env()?,
            DEFAULT_CHAT_MODEL,
            options,
        ))
    }

    pub fn with_config(
        config: OpenAIConfig,
        model: impl Into<String>,
        options: &GenerationOptions,
    ) -> Self {
        Self {
            client: Client::with_config(config),
            model: model.into(),
            json_response: options.json_response,
        }
    }

    fn request(&self, prompt: &str) -> Result<CreateChatCompletionRequest> {
        let message = ChatCompletionRequestUserMessageArgs::default()
            .content(prompt)
            .build()?;

        let mut args = CreateChatCompletionRequestArgs::default();
        args.model(&self.model)
            .messages(vec![message.into()])
            .temperature(0.0);
        if self.json_response {
            args.response_format(ResponseFormat::JsonObject);
        }
        Ok(args.build()?)
    }
}

#[async_trait]
impl Generator for OpenAiGenerator {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        let response = self.client.chat().create(self.request(prompt)?).await?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| Error::ProviderError("Empty response from OpenAI".to_string()))
    }

    async fn stream(&self, prompt: &str) -> Result<TextStream> {
        let stream = self
            .client
            .chat()
            .create_stream(self.request(prompt)?)
            .await?;

        let fragments = stream.filter_map(|item| async move {
            match item {
                Ok(chunk) => chunk
                    .choices
                    .into_iter()
                    .next()
                    .and_then(|c| c.delta.content)
                    .filter(|text| !text.is_empty())
                    .map(Ok),
                Err(err) => Some(Err(Error::from(err))),
            }
        });

        Ok(fragments.boxed())
    }
}

//! Mistral AI client (chat, streaming chat, embeddings).

use std::env;

use async_trait::async_trait;
use futures::{stream, StreamExt};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{truncate_chars, Embedder, GenerationOptions, Generator, TextStream};
use crate::sse::SseDecoder;
use crate::{Error, Result};

const MISTRAL_API_URL: &str = "https://api.mistral.ai/v1";

pub const DEFAULT_CHAT_MODEL: &str = "mistral-large-latest";
pub const DEFAULT_EMBEDDING_MODEL: &str = "mistral-embed";

const MAX_EMBED_CHARS: usize = 8000;

/// Mistral REST client.
#[derive(Debug, Clone)]
pub struct MistralClient {
    http: Client,
    api_key: String,
    base_url: String,
}

impl MistralClient {
    /// Create client from `MISTRAL_API_KEY` (and optional `MISTRAL_BASE_URL`).
    pub fn from_env() -> Result<Self> {
        let api_key = env::var("MISTRAL_API_KEY")
            .map_err(|_| Error::InvalidArgument("MISTRAL_API_KEY not set".to_string()))?;
        let client = Self::new(api_key)?;
        Ok(match env::var("MISTRAL_BASE_URL") {
            Ok(base) => client.with_base_url(base),
            Err(_) => client,
        })
    }

    /// Create client with API key.
    pub fn new<S: Into<String>>(api_key: S) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(Error::InvalidArgument("MISTRAL_API_KEY is empty".to_string()));
        }

        let http = Client::builder()
            .user_agent("graphrag_backend/0.1.0")
            .build()
            .map_err(|e| Error::InvalidArgument(format!("HTTP client error: {}", e)))?;

        Ok(Self {
            http,
            api_key,
            base_url: MISTRAL_API_URL.to_string(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    async fn post<T: Serialize>(&self, path: &str, body: &T) -> Result<reqwest::Response> {
        let response = self
            .http
            .post(format!("{}{}", self.base_url, path))
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| Error::ProviderError(format!("Mistral request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(Error::ProviderError(format!(
                "Mistral error {}: {}",
                status, text
            )));
        }
        Ok(response)
    }

    /// Single-turn chat completion.
    pub async fn chat(&self, model: &str, prompt: &str, json_response: bool) -> Result<String> {
        let request = ChatRequest::new(model, prompt, json_response, false);
        let text = self
            .post("/chat/completions", &request)
            .await?
            .text()
            .await
            .map_err(|e| Error::ProviderError(format!("Failed to read response: {}", e)))?;

        let response: ChatResponse = serde_json::from_str(&text)
            .map_err(|e| Error::ProviderError(format!("Invalid response: {}", e)))?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| Error::ProviderError("Empty response from Mistral".to_string()))
    }

    /// Streaming chat completion; yields content deltas until `[DONE]`.
    pub async fn chat_stream(
        &self,
        model: &str,
        prompt: &str,
        json_response: bool,
    ) -> Result<TextStream> {
        let request = ChatRequest::new(model, prompt, json_response, true);
        let response = self.post("/chat/completions", &request).await?;
        Ok(delta_stream(response.bytes_stream()))
    }

    /// Embed a batch of texts, ordered like the input.
    pub async fn embeddings(&self, model: &str, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let request = EmbeddingRequest {
            model: model.to_string(),
            input: texts.to_vec(),
        };
        let mut response: EmbeddingResponse = self
            .post("/embeddings", &request)
            .await?
            .json()
            .await
            .map_err(|e| Error::ProviderError(format!("Invalid response: {}", e)))?;

        response.data.sort_by_key(|d| d.index);
        Ok(response.data.into_iter().map(|d| d.embedding).collect())
    }
}

/// Turn a Mistral SSE byte stream into content fragments.
fn delta_stream<S>(bytes: S) -> TextStream
where
    S: futures::Stream<Item = reqwest::Result<bytes::Bytes>> + Send + 'static,
{
    struct State<S> {
        bytes: std::pin::Pin<Box<S>>,
        decoder: SseDecoder,
        pending: std::collections::VecDeque<Result<String>>,
        done: bool,
    }

    let state = State {
        bytes: Box::pin(bytes),
        decoder: SseDecoder::new(),
        pending: Default::default(),
        done: false,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if let Some(item) = state.pending.pop_front() {
                return Some((item, state));
            }
            if state.done {
                return None;
            }

            let events = match state.bytes.next().await {
                Some(Ok(chunk)) => state.decoder.push(&chunk),
                Some(Err(err)) => {
                    state.done = true;
                    return Some((Err(Error::from(err)), state));
                }
                None => {
                    state.done = true;
                    state.decoder.finish().into_iter().collect()
                }
            };

            for event in events {
                if event.data.trim() == "[DONE]" {
                    state.done = true;
                    break;
                }
                match serde_json::from_str::<StreamChunk>(&event.data) {
                    Ok(chunk) => {
                        if let Some(text) = chunk
                            .choices
                            .into_iter()
                            .next()
                            .and_then(|c| c.delta.content)
                            .filter(|t| !t.is_empty())
                        {
                            state.pending.push_back(Ok(text));
                        }
                    }
                    Err(err) => {
                        state.pending.push_back(Err(Error::ProviderError(format!(
                            "Invalid stream chunk: {}",
                            err
                        ))));
                        state.done = true;
                        break;
                    }
                }
            }
        }
    })
    .boxed()
}

/// Mistral embedding provider
pub struct MistralEmbedder {
    client: MistralClient,
    model: String,
}

impl MistralEmbedder {
    pub fn from_env() -> Result<Self> {
        Ok(Self::new(MistralClient::from_env()?, DEFAULT_EMBEDDING_MODEL))
    }

    pub fn new(client: MistralClient, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }
}

#[async_trait]
impl Embedder for MistralEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dimension(&self) -> usize {
        1024
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let processed: Vec<String> = texts
            .iter()
            .map(|t| truncate_chars(t.trim(), MAX_EMBED_CHARS))
            .filter(|t| !t.is_empty())
            .collect();
        if processed.is_empty() {
            return Ok(vec![Vec::new(); texts.len()]);
        }

        debug!("Generating Mistral embeddings for {} texts", processed.len());
        let embeddings = self.client.embeddings(&self.model, &processed).await?;
        if embeddings.len() != processed.len() {
            return Err(Error::ProviderError(format!(
                "Expected {} embeddings, got {}",
                processed.len(),
                embeddings.len()
            )));
        }
        let mut embeddings = embeddings.into_iter();

        Ok(texts
            .iter()
            .map(|t| {
                if t.trim().is_empty() {
                    Vec::new()
                } else {
                    embeddings.next().unwrap_or_default()
                }
            })
            .collect())
    }
}

/// Mistral chat generator
pub struct MistralGenerator {
    client: MistralClient,
    model: String,
    json_response: bool,
}

impl MistralGenerator {
    pub fn from_env(options: &GenerationOptions) -> Result<Self> {
        Ok(Self::new(MistralClient::from_env()?, DEFAULT_CHAT_MODEL, options))
    }

    pub fn new(client: MistralClient, model: impl Into<String>, options: &GenerationOptions) -> Self {
        Self {
            client,
            model: model.into(),
            json_response: options.json_response,
        }
    }
}

#[async_trait]
impl Generator for MistralGenerator {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        self.client.chat(&self.model, prompt, self.json_response).await
    }

    async fn stream(&self, prompt: &str) -> Result<TextStream> {
        self.client
            .chat_stream(&self.model, prompt, self.json_response)
            .await
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
    stream: bool,
}

impl ChatRequest {
    fn new(model: &str, prompt: &str, json_response: bool, stream: bool) -> Self {
        Self {
            model: model.to_string(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: Some(prompt.to_string()),
            }],
            response_format: json_response.then(|| ResponseFormat {
                kind: "json_object".to_string(),
            }),
            stream,
        }
    }
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: String,
}

/// Chat message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct StreamChunk {
    choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    delta: StreamDelta,
}

#[derive(Debug, Deserialize)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest {
    model: String,
    input: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    #[serde(default)]
    index: usize,
    embedding: Vec<f32>,
}

//! Shared fakes for integration tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use http_body_util::{BodyExt, Full};
use hyper::{Request, Response};

use graphrag_backend::graph::MemoryGraphStore;
use graphrag_backend::graphrag::{GraphRag, RagTemplate, VectorRetriever};
use graphrag_backend::models::{Embedder, Generator, TextStream};
use graphrag_backend::server::{self, AppState, ResponseBody};
use graphrag_backend::{Error, Result};

/// Constant three-dimensional embedding.
pub struct FixedEmbedder;

#[async_trait]
impl Embedder for FixedEmbedder {
    fn model_name(&self) -> &str {
        "fixed"
    }

    fn dimension(&self) -> usize {
        3
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|_| vec![0.1, 0.2, 0.3]).collect())
    }
}

/// Returns its prompt as the answer and records every prompt.
#[derive(Default)]
pub struct EchoGenerator {
    pub prompts: Mutex<Vec<String>>,
}

#[async_trait]
impl Generator for EchoGenerator {
    fn model_name(&self) -> &str {
        "echo"
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        Ok(prompt.to_string())
    }

    async fn stream(&self, prompt: &str) -> Result<TextStream> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        Ok(futures::stream::iter(vec![Ok(prompt.to_string())]).boxed())
    }
}

/// Streams a fixed list of fragments, optionally failing at the end.
pub struct ScriptedGenerator {
    pub fragments: Vec<&'static str>,
    pub fail_after: bool,
}

#[async_trait]
impl Generator for ScriptedGenerator {
    fn model_name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, _prompt: &str) -> Result<String> {
        Ok(self.fragments.concat())
    }

    async fn stream(&self, _prompt: &str) -> Result<TextStream> {
        let mut items: Vec<Result<String>> =
            self.fragments.iter().map(|f| Ok(f.to_string())).collect();
        if self.fail_after {
            items.push(Err(Error::ProviderError("stream interrupted".into())));
        }
        Ok(futures::stream::iter(items).boxed())
    }
}

pub fn app_state(store: &MemoryGraphStore, generator: Arc<dyn Generator>) -> Arc<AppState> {
    let retriever = VectorRetriever::new(Arc::new(store.clone()), Arc::new(FixedEmbedder));
    Arc::new(AppState::new(GraphRag::new(
        retriever,
        generator,
        RagTemplate::default(),
    )))
}

pub fn request(method: &str, path: &str, body: &str, accept: Option<&str>) -> Request<Full<Bytes>> {
    let mut builder = Request::builder().method(method).uri(path);
    if let Some(accept) = accept {
        builder = builder.header("accept", accept);
    }
    builder
        .body(Full::new(Bytes::from(body.to_string())))
        .unwrap()
}

pub async fn call(state: &Arc<AppState>, req: Request<Full<Bytes>>) -> Response<ResponseBody> {
    server::handle(state.clone(), req).await
}

pub async fn body_bytes(response: Response<ResponseBody>) -> Bytes {
    response.into_body().collect().await.unwrap().to_bytes()
}

pub async fn body_json(response: Response<ResponseBody>) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

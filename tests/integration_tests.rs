//! Integration tests for graphrag_backend
//!
//! These tests drive the public API end to end with in-memory graph stores,
//! fake providers, and `httpmock` standing in for OpenAI.

mod common;

use std::sync::Arc;
use std::time::Duration;

use async_openai::config::OpenAIConfig;
use httpmock::prelude::*;
use serde_json::json;
use tokio::time::Instant;

use common::{app_state, body_bytes, body_json, call, request, EchoGenerator, ScriptedGenerator};
use graphrag_backend::graph::{establish, GraphStore, MemoryGraphStore, Statement};
use graphrag_backend::graphrag::{GraphRag, RagTemplate, VectorRetriever};
use graphrag_backend::models::{
    Embedder, GenerationOptions, Generator, OpenAiEmbedder, OpenAiGenerator, ProviderEntry,
    ProviderRegistry, MISTRAL, OPENAI,
};
use graphrag_backend::seeder::{political_statements, seed_statements};
use graphrag_backend::server::{self, AppState};
use graphrag_backend::sse::decode_all;
use graphrag_backend::{Error, RetryPolicy};

// ============================================================================
// Status
// ============================================================================

#[tokio::test]
async fn test_status_returns_fixed_payload() {
    // graph store that cannot even be pinged; /status must not care
    let store = MemoryGraphStore::new().with_ping_failures(u32::MAX);
    let state = app_state(&store, Arc::new(EchoGenerator::default()));

    let response = call(&state, request("GET", "/status", "", None)).await;
    assert_eq!(response.status(), 200);

    let body = body_json(response).await;
    assert_eq!(
        body,
        json!({
            "status": "ok",
            "message": "Service is running smoothly!",
            "version": "1.0.0"
        })
    );
    assert!(store.searches().is_empty());
    assert_eq!(store.ping_count(), 0);
}

#[tokio::test]
async fn test_status_rejects_post() {
    let state = app_state(&MemoryGraphStore::new(), Arc::new(EchoGenerator::default()));
    let response = call(&state, request("POST", "/status", "{}", None)).await;

    assert_eq!(response.status(), 405);
    assert_eq!(response.headers().get("allow").unwrap(), "GET");
    let body = body_json(response).await;
    assert_eq!(body["error"]["kind"], "method_not_allowed");
}

#[tokio::test]
async fn test_unknown_route_is_404_envelope() {
    let state = app_state(&MemoryGraphStore::new(), Arc::new(EchoGenerator::default()));
    let response = call(&state, request("GET", "/nope", "", None)).await;

    assert_eq!(response.status(), 404);
    let body = body_json(response).await;
    assert_eq!(body["error"]["kind"], "not_found");
}

// ============================================================================
// Query
// ============================================================================

#[tokio::test]
async fn test_query_prompt_contains_question_and_retrieved_chunk() {
    let store = MemoryGraphStore::new().with_chunks(["X is Y"]);
    let generator = Arc::new(EchoGenerator::default());
    let state = app_state(&store, generator.clone());

    let response = call(
        &state,
        request(
            "POST",
            "/api/query",
            r#"{"query": "What is X?"}"#,
            Some("application/json"),
        ),
    )
    .await;
    assert_eq!(response.status(), 200);

    let body = body_json(response).await;
    let answer = body["response"].as_str().unwrap();
    assert!(answer.contains("What is X?"));
    assert!(answer.contains("X is Y"));

    let prompts = generator.prompts.lock().unwrap();
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].contains("# Question:\n    What is X?"));
    assert!(prompts[0].contains("# Context:\n    X is Y"));

    let searches = store.searches();
    assert_eq!(searches.len(), 1);
    assert_eq!(searches[0].top_k, 5);
    assert_eq!(searches[0].index_name, "text_embeddings");
    assert_eq!(searches[0].text_property, "text");
}

#[tokio::test]
async fn test_query_streams_fragments_as_sse_by_default() {
    let store = MemoryGraphStore::new().with_chunks(["X is Y"]);
    let state = app_state(
        &store,
        Arc::new(ScriptedGenerator {
            fragments: vec!["Hel", "lo"],
            fail_after: false,
        }),
    );

    let response = call(
        &state,
        request("POST", "/api/query", r#"{"query": "hi"}"#, None),
    )
    .await;
    assert_eq!(response.status(), 200);
    assert_eq!(
        response.headers().get("content-type").unwrap(),
        "text/event-stream"
    );

    let body = body_bytes(response).await;
    assert_eq!(&body[..], b"data: Hel\n\ndata: lo\n\n");

    let events = decode_all(&body);
    assert_eq!(events.len(), 2);
    assert!(events.iter().all(|e| e.event.is_none()));
}

#[tokio::test]
async fn test_query_stream_failure_emits_single_error_event() {
    let state = app_state(
        &MemoryGraphStore::new(),
        Arc::new(ScriptedGenerator {
            fragments: vec!["partial"],
            fail_after: true,
        }),
    );

    let response = call(
        &state,
        request(
            "POST",
            "/api/query",
            r#"{"query": "hi"}"#,
            Some("text/event-stream"),
        ),
    )
    .await;
    let events = decode_all(&body_bytes(response).await);

    assert_eq!(events.len(), 2);
    assert_eq!(events[0].data, "partial");
    assert_eq!(events[1].event.as_deref(), Some("error"));
    assert!(events[1].data.contains("stream interrupted"));
}

#[tokio::test]
async fn test_query_malformed_body_is_400() {
    let state = app_state(&MemoryGraphStore::new(), Arc::new(EchoGenerator::default()));

    for body in ["not json", r#"{"question": "wrong field"}"#] {
        let response = call(&state, request("POST", "/api/query", body, None)).await;
        assert_eq!(response.status(), 400, "body: {}", body);
        let json = body_json(response).await;
        assert_eq!(json["error"]["kind"], "serialization");
    }
}

#[tokio::test]
async fn test_query_rejects_get() {
    let state = app_state(&MemoryGraphStore::new(), Arc::new(EchoGenerator::default()));
    let response = call(&state, request("GET", "/api/query", "", None)).await;
    assert_eq!(response.status(), 405);
}

#[tokio::test]
async fn test_query_with_openai_over_http() {
    let server = MockServer::start_async().await;

    let embeddings = server.mock(|when, then| {
        when.method(POST).path("/embeddings");
        then.status(200).json_body(json!({
            "object": "list",
            "model": "text-embedding-ada-002",
            "data": [{ "object": "embedding", "index": 0, "embedding": [0.5, 0.5] }],
            "usage": { "prompt_tokens": 3, "total_tokens": 3 }
        }));
    });

    let chunk = |content: &str| {
        format!(
            "data: {}\n\n",
            json!({
                "id": "chatcmpl-1",
                "object": "chat.completion.chunk",
                "created": 1700000000,
                "model": "gpt-4o",
                "choices": [{ "index": 0, "delta": { "content": content }, "finish_reason": null }]
            })
        )
    };
    let completions = server.mock(|when, then| {
        when.method(POST)
            .path("/chat/completions")
            .body_includes("What is X?")
            .body_includes("X is Y");
        then.status(200)
            .header("content-type", "text/event-stream")
            .body(format!("{}{}data: [DONE]\n\n", chunk("Hel"), chunk("lo")));
    });

    let config = OpenAIConfig::new()
        .with_api_key("test_key")
        .with_api_base(server.base_url());
    let store = MemoryGraphStore::new().with_chunks(["X is Y"]);
    let rag = GraphRag::new(
        VectorRetriever::new(
            Arc::new(store.clone()),
            Arc::new(OpenAiEmbedder::with_config(config.clone(), "text-embedding-ada-002")),
        ),
        Arc::new(OpenAiGenerator::with_config(
            config,
            "gpt-4o",
            &GenerationOptions::default(),
        )),
        RagTemplate::default(),
    );
    let state = Arc::new(AppState::new(rag));

    let response = call(
        &state,
        request("POST", "/api/query", r#"{"query": "What is X?"}"#, None),
    )
    .await;
    let events = decode_all(&body_bytes(response).await);

    let data: Vec<&str> = events.iter().map(|e| e.data.as_str()).collect();
    assert_eq!(data, vec!["Hel", "lo"]);
    assert_eq!(store.searches()[0].dimensions, 2);
    embeddings.assert_calls(1);
    completions.assert_calls(1);
}

#[tokio::test]
async fn test_metrics_endpoint_counts_requests() {
    let state = app_state(&MemoryGraphStore::new(), Arc::new(EchoGenerator::default()));
    call(&state, request("GET", "/status", "", None)).await;

    let response = call(&state, request("GET", "/metrics", "", None)).await;
    assert_eq!(response.status(), 200);

    let text = String::from_utf8(body_bytes(response).await.to_vec()).unwrap();
    assert!(text.contains("graphrag_http_requests_total"));
    assert!(text.contains(r#"route="/status""#));
}

// ============================================================================
// Server loop
// ============================================================================

#[tokio::test]
async fn test_serve_answers_over_tcp_and_shuts_down() {
    let state = app_state(&MemoryGraphStore::new(), Arc::new(EchoGenerator::default()));
    let listener = server::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let (stop, stopped) = tokio::sync::oneshot::channel::<()>();
    let handle = tokio::spawn(server::serve(listener, state, async {
        let _ = stopped.await;
    }));

    let status: serde_json::Value = reqwest::get(format!("http://{}/status", addr))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(status["status"], "ok");

    stop.send(()).unwrap();
    handle.await.unwrap().unwrap();
}

// ============================================================================
// Provider registry
// ============================================================================

struct Named(&'static str);

#[async_trait::async_trait]
impl Embedder for Named {
    fn model_name(&self) -> &str {
        self.0
    }

    fn dimension(&self) -> usize {
        1
    }

    async fn embed_batch(&self, texts: &[String]) -> graphrag_backend::Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|_| vec![1.0]).collect())
    }
}

fn registry() -> ProviderRegistry {
    ProviderRegistry::new(OPENAI)
        .register(
            MISTRAL,
            ProviderEntry::new(
                || Ok(Arc::new(Named("mistral-embed")) as Arc<dyn Embedder>),
                |_| Ok(Arc::new(EchoGenerator::default()) as Arc<dyn Generator>),
            ),
        )
        .register(
            OPENAI,
            ProviderEntry::new(
                || Ok(Arc::new(Named("text-embedding-ada-002")) as Arc<dyn Embedder>),
                |_| {
                    Ok(Arc::new(ScriptedGenerator {
                        fragments: vec!["openai"],
                        fail_after: false,
                    }) as Arc<dyn Generator>)
                },
            ),
        )
}

#[test]
fn test_registry_selects_primary_only_for_mistral() {
    let registry = registry();

    let primary = registry.embedder(Some("mistral")).unwrap();
    assert_eq!(primary.model_name(), "mistral-embed");
    assert_eq!(
        registry
            .generator(Some("mistral"), &GenerationOptions::default())
            .unwrap()
            .model_name(),
        "echo"
    );

    for key in [Some("openai"), Some("gpt"), Some(""), None] {
        assert_eq!(
            registry.embedder(key).unwrap().model_name(),
            "text-embedding-ada-002",
            "key {:?}",
            key
        );
        assert_eq!(
            registry
                .generator(key, &GenerationOptions::default())
                .unwrap()
                .model_name(),
            "scripted",
            "key {:?}",
            key
        );
    }
}

#[tokio::test]
async fn test_app_state_from_settings_uses_configured_providers() {
    let mut settings = graphrag_backend::Settings::from_env();
    settings.embedding_model_type = Some("mistral".into());
    settings.llm_model_type = Some("unknown".into());

    let store = MemoryGraphStore::new().with_chunks(["ctx"]);
    let state = Arc::new(
        AppState::from_settings(&settings, Arc::new(store.clone()), &registry()).unwrap(),
    );

    let response = call(
        &state,
        request("POST", "/api/query", r#"{"query": "q"}"#, Some("application/json")),
    )
    .await;
    let body = body_json(response).await;

    // fallback generator answers; primary embedder produced a 1-dim vector
    assert_eq!(body["response"], "openai");
    assert_eq!(store.searches()[0].dimensions, 1);
}

// ============================================================================
// Connection and seeding
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_connection_backoff_total_delay() {
    let store = MemoryGraphStore::new().with_ping_failures(3);
    let started = Instant::now();

    let live = establish(&RetryPolicy::unbounded(), || {
        let store = store.clone();
        async move { Ok(store) }
    })
    .await
    .unwrap();

    // 2*2^1 + 2*2^2 + 2*2^3
    assert_eq!(started.elapsed(), Duration::from_secs(28));
    assert!(live.ping().await.is_ok());
    assert_eq!(store.ping_count(), 5);
}

#[tokio::test(start_paused = true)]
async fn test_connection_gives_up_when_capped() {
    let store = MemoryGraphStore::new().with_ping_failures(u32::MAX);

    let result = establish(
        &RetryPolicy::unbounded().with_max_elapsed(Duration::from_secs(10)),
        || {
            let store = store.clone();
            async move { Ok(store) }
        },
    )
    .await;

    assert!(matches!(result, Err(Error::RetryExhausted { .. })));
}

#[tokio::test(start_paused = true)]
async fn test_fixed_seeding_replays_from_first_statement() {
    let statements = political_statements();
    let failing = 4;
    let store = MemoryGraphStore::new().with_failing_run(failing);

    seed_statements(&store, &statements, &RetryPolicy::unbounded())
        .await
        .unwrap();

    let attempted = store.attempted();
    assert_eq!(attempted.len(), failing + statements.len());
    assert_eq!(attempted[failing], statements[0]);
    assert_eq!(&attempted[failing..], &statements[..]);

    let committed: Vec<Statement> = store.committed();
    assert_eq!(committed.len(), failing - 1 + statements.len());
}

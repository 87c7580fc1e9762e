//! HTTP API.
//!
//! Routes:
//! - `GET /status`: fixed liveness payload
//! - `POST /api/query`: `{"query": "..."}`; SSE fragments by default, or
//!   `{"response": "..."}` when the client accepts only JSON
//! - `GET /metrics`: Prometheus text exposition
//!
//! Failures before the first byte use the JSON error envelope. A generation
//! failure mid-stream ends the stream with one `event: error`.

use std::convert::Infallible;
use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;

use bytes::Bytes;
use futures::{future, StreamExt};
use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::{BodyExt, Full, StreamBody};
use hyper::body::{Body, Frame};
use hyper::header::{HeaderValue, ACCEPT, ALLOW, CACHE_CONTROL, CONTENT_TYPE};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::config::Settings;
use crate::error::ErrorEnvelope;
use crate::graph::GraphStore;
use crate::graphrag::{GraphRag, RagTemplate, VectorRetriever};
use crate::models::{GenerationOptions, ProviderRegistry, TextStream};
use crate::sse::{encode_data, encode_named};
use crate::metrics::{self, RequestGuard};
use crate::{Error, Result};

pub type ResponseBody = UnsyncBoxBody<Bytes, Infallible>;

const STATUS_ROUTE: &str = "/status";
const QUERY_ROUTE: &str = "/api/query";
const METRICS_ROUTE: &str = "/metrics";

/// Shared, read-only request state.
pub struct AppState {
    pub rag: GraphRag,
}

impl AppState {
    pub fn new(rag: GraphRag) -> Self {
        Self { rag }
    }

    /// Wire the retriever and generator selected by `settings`.
    pub fn from_settings(
        settings: &Settings,
        store: Arc<dyn GraphStore>,
        registry: &ProviderRegistry,
    ) -> Result<Self> {
        let embedder = registry.embedder(settings.embedding_model_type.as_deref())?;
        let generator = registry.generator(
            settings.llm_model_type.as_deref(),
            &GenerationOptions::default(),
        )?;
        let retriever = VectorRetriever::new(store, embedder);

        Ok(Self::new(GraphRag::new(
            retriever,
            generator,
            RagTemplate::load()?,
        )))
    }
}

#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    pub query: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct QueryResponse {
    pub response: String,
}

#[derive(Debug, Serialize)]
struct StatusResponse {
    status: &'static str,
    message: &'static str,
    version: &'static str,
}

const STATUS: StatusResponse = StatusResponse {
    status: "ok",
    message: "Service is running smoothly!",
    version: "1.0.0",
};

fn full(body: impl Into<Bytes>) -> ResponseBody {
    Full::new(body.into()).boxed_unsync()
}

fn build_response(
    status: StatusCode,
    content_type: &'static str,
    body: ResponseBody,
) -> Response<ResponseBody> {
    let mut response = Response::new(body);
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    response
}

fn json_response<T: Serialize>(status: StatusCode, value: &T) -> Response<ResponseBody> {
    match serde_json::to_vec(value) {
        Ok(body) => build_response(status, "application/json", full(body)),
        Err(err) => {
            error!("Failed to serialize response: {}", err);
            build_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "application/json",
                full(r#"{"error":{"kind":"serialization","message":"response encoding failed"}}"#),
            )
        }
    }
}

fn envelope_response(status: StatusCode, envelope: &ErrorEnvelope) -> Response<ResponseBody> {
    json_response(status, envelope)
}

fn error_response(err: &Error) -> Response<ResponseBody> {
    let status =
        StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    envelope_response(status, &err.envelope())
}

fn method_not_allowed(allow: &'static str) -> Response<ResponseBody> {
    let mut response = envelope_response(
        StatusCode::METHOD_NOT_ALLOWED,
        &ErrorEnvelope::new("method_not_allowed", format!("Use {}", allow)),
    );
    response
        .headers_mut()
        .insert(ALLOW, HeaderValue::from_static(allow));
    response
}

fn not_found(path: &str) -> Response<ResponseBody> {
    envelope_response(
        StatusCode::NOT_FOUND,
        &ErrorEnvelope::new("not_found", format!("No route for {}", path)),
    )
}

/// Metric label for a request path; unknown paths share one label.
fn route_label(path: &str) -> &'static str {
    match path {
        STATUS_ROUTE => STATUS_ROUTE,
        QUERY_ROUTE => QUERY_ROUTE,
        METRICS_ROUTE => METRICS_ROUTE,
        _ => "unmatched",
    }
}

/// True when the client accepts JSON but not an event stream.
pub fn wants_json(accept: Option<&HeaderValue>) -> bool {
    let Some(accept) = accept.and_then(|v| v.to_str().ok()) else {
        return false;
    };
    let types: Vec<String> = accept
        .split(',')
        .filter_map(|part| part.split(';').next())
        .map(|t| t.trim().to_ascii_lowercase())
        .collect();

    types.iter().any(|t| t == "application/json")
        && !types.iter().any(|t| t == "text/event-stream")
}

/// Route one request.
pub async fn handle<B>(state: Arc<AppState>, req: Request<B>) -> Response<ResponseBody>
where
    B: Body,
    B::Error: Display,
{
    let guard = RequestGuard::start(route_label(req.uri().path()));
    let response = dispatch(&state, req).await;
    guard.finish(response.status().as_u16());
    response
}

async fn dispatch<B>(state: &AppState, req: Request<B>) -> Response<ResponseBody>
where
    B: Body,
    B::Error: Display,
{
    match (req.method(), req.uri().path()) {
        (&Method::GET, STATUS_ROUTE) => json_response(StatusCode::OK, &STATUS),
        (_, STATUS_ROUTE) => method_not_allowed("GET"),
        (&Method::POST, QUERY_ROUTE) => query(state, req).await,
        (_, QUERY_ROUTE) => method_not_allowed("POST"),
        (&Method::GET, METRICS_ROUTE) => metrics_response(),
        (_, METRICS_ROUTE) => method_not_allowed("GET"),
        (_, path) => not_found(path),
    }
}

fn metrics_response() -> Response<ResponseBody> {
    match metrics::render() {
        Ok((content_type, body)) => {
            let mut response = build_response(StatusCode::OK, "text/plain", full(body));
            if let Ok(value) = HeaderValue::from_str(&content_type) {
                response.headers_mut().insert(CONTENT_TYPE, value);
            }
            response
        }
        Err(err) => {
            error!("{}", err);
            error_response(&err)
        }
    }
}

async fn read_query<B>(req: Request<B>) -> Result<QueryRequest>
where
    B: Body,
    B::Error: Display,
{
    let body = req
        .into_body()
        .collect()
        .await
        .map_err(|e| Error::InvalidArgument(format!("Failed to read request body: {}", e)))?
        .to_bytes();

    Ok(serde_json::from_slice(&body)?)
}

async fn query<B>(state: &AppState, req: Request<B>) -> Response<ResponseBody>
where
    B: Body,
    B::Error: Display,
{
    let json = wants_json(req.headers().get(ACCEPT));

    let request = match read_query(req).await {
        Ok(request) => request,
        Err(err) => {
            warn!("Rejected query request: {}", err);
            return error_response(&err);
        }
    };
    info!("Got user query: {}", request.query);

    if json {
        return match state.rag.answer(&request.query).await {
            Ok(answer) => json_response(StatusCode::OK, &QueryResponse { response: answer }),
            Err(err) => {
                error!("Query failed: {}", err);
                error_response(&err)
            }
        };
    }

    match state.rag.answer_stream(&request.query).await {
        Ok(fragments) => {
            info!("Starting to stream response for user query...");
            sse_response(fragments)
        }
        Err(err) => {
            error!("Query failed: {}", err);
            error_response(&err)
        }
    }
}

/// One `data:` event per non-empty fragment. An error ends the stream after
/// a single `event: error` carrying the envelope.
pub fn sse_response(fragments: TextStream) -> Response<ResponseBody> {
    let events = fragments
        .filter(|item| future::ready(!matches!(item, Ok(text) if text.is_empty())))
        .scan(false, |failed, item| {
            let event = if *failed {
                None
            } else {
                match item {
                    Ok(text) => Some(encode_data(&text)),
                    Err(err) => {
                        *failed = true;
                        error!("Generation failed mid-stream: {}", err);
                        let payload = serde_json::to_string(&err.envelope())
                            .unwrap_or_else(|_| err.to_string());
                        Some(encode_named("error", &payload))
                    }
                }
            };
            future::ready(event)
        })
        .map(|bytes| Ok::<_, Infallible>(Frame::data(bytes)));

    let mut response = build_response(
        StatusCode::OK,
        "text/event-stream",
        StreamBody::new(events).boxed_unsync(),
    );
    response
        .headers_mut()
        .insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    response
}

/// Bind the API listener.
pub async fn bind(addr: &str) -> Result<TcpListener> {
    let listener = TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, "Query API listening");
    Ok(listener)
}

/// Accept connections until `shutdown` resolves. One task per connection.
pub async fn serve<F>(listener: TcpListener, state: Arc<AppState>, shutdown: F) -> Result<()>
where
    F: Future<Output = ()>,
{
    metrics::init_collectors();
    tokio::pin!(shutdown);

    loop {
        let (stream, peer) = tokio::select! {
            accepted = listener.accept() => accepted?,
            _ = &mut shutdown => {
                info!("Shutting down query API");
                return Ok(());
            }
        };

        let state = state.clone();
        let service = service_fn(move |req| {
            let state = state.clone();
            async move { Ok::<_, Infallible>(handle(state, req).await) }
        });
        let io = TokioIo::new(stream);

        tokio::spawn(async move {
            if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                warn!(?peer, "Connection error: {}", err);
            }
        });
    }
}

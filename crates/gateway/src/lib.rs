//! HTTP API gateway for Docloom.
//!
//! Endpoints:
//!
//! - `GET  /health`          — liveness probe
//! - `POST /v1/ask`          — ask a question, get the folded answer
//! - `POST /v1/ask/stream`   — ask a question, get the SSE event stream
//!
//! Built on Axum. The gateway owns no pipeline logic: it translates an
//! HTTP request into a [`Query`], hands it to the orchestrator, and
//! frames the resulting events.

use axum::extract::DefaultBodyLimit;
use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::sse::{Event as SseEvent, Sse},
    response::Json,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::sync::Arc;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::ReceiverStream;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::{info, warn};

use docloom_agent::{AgentOrchestrator, AnswerResponse};
use docloom_config::AppConfig;
use docloom_core::query::Query;

/// Shared application state for the gateway.
pub struct GatewayState {
    pub orchestrator: AgentOrchestrator,
}

type SharedState = Arc<GatewayState>;

/// Build the Axum router with all gateway routes.
///
/// `allowed_origins` restricts CORS to the listed origins; an empty
/// list allows any origin.
pub fn build_router(state: SharedState, allowed_origins: &[String]) -> Router {
    let origin = if allowed_origins.is_empty() {
        AllowOrigin::any()
    } else {
        let parsed: Vec<_> = allowed_origins
            .iter()
            .filter_map(|o| match axum::http::HeaderValue::from_str(o) {
                Ok(value) => Some(value),
                Err(_) => {
                    warn!(origin = %o, "Ignoring invalid CORS origin");
                    None
                }
            })
            .collect();
        AllowOrigin::list(parsed)
    };

    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([axum::http::Method::GET, axum::http::Method::POST])
        .allow_headers([axum::http::header::CONTENT_TYPE]);

    Router::new()
        .route("/health", get(health_handler))
        .route("/v1/ask", post(ask_handler))
        .route("/v1/ask/stream", post(ask_stream_handler))
        .layer(DefaultBodyLimit::max(1024 * 1024))
        .layer(cors)
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the gateway HTTP server. Runs until the process exits.
pub async fn start(
    config: &AppConfig,
    orchestrator: AgentOrchestrator,
) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);
    let state = Arc::new(GatewayState { orchestrator });
    let app = build_router(state, &config.gateway.cors_allow_origin);

    info!(addr = %addr, "Gateway starting");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// --- Request / Response types ---

#[derive(Deserialize)]
struct AskRequest {
    /// The user's question.
    question: String,

    /// Restrict retrieval to these document ids.
    #[serde(default)]
    document_ids: Option<Vec<String>>,

    /// Override the configured retrieval width.
    #[serde(default)]
    top_k: Option<usize>,

    /// Topic scope for retrieval and memory.
    #[serde(default)]
    topic_id: Option<String>,

    /// Existing conversation id (omit to start a new conversation).
    #[serde(default)]
    conversation_id: Option<String>,
}

impl AskRequest {
    fn into_query(self) -> Query {
        let conversation_id = self
            .conversation_id
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let mut query = Query::in_conversation(self.question, conversation_id);
        query.document_ids = self.document_ids;
        query.project_id = self.topic_id;
        query.top_k = self.top_k;
        query
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

fn bad_request(message: impl Into<String>) -> (StatusCode, Json<ErrorResponse>) {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}

// --- Handlers ---

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// `POST /v1/ask` — ask a question, wait for the complete answer.
async fn ask_handler(
    State(state): State<SharedState>,
    Json(payload): Json<AskRequest>,
) -> Result<Json<AnswerResponse>, (StatusCode, Json<ErrorResponse>)> {
    if payload.question.trim().is_empty() {
        return Err(bad_request("Question must not be empty"));
    }
    info!(question_len = payload.question.len(), "v1/ask request");

    let response = state
        .orchestrator
        .run(payload.into_query())
        .await
        .map_err(|e| {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: e.to_string(),
                }),
            )
        })?;

    Ok(Json(response))
}

/// `POST /v1/ask/stream` — ask a question, receive the SSE event stream.
///
/// Each stream event is framed with its event type as the SSE event
/// name and the JSON-serialized event as data. The client closing the
/// connection cancels the request.
async fn ask_stream_handler(
    State(state): State<SharedState>,
    Json(payload): Json<AskRequest>,
) -> Result<
    Sse<impl futures::Stream<Item = Result<SseEvent, Infallible>>>,
    (StatusCode, Json<ErrorResponse>),
> {
    if payload.question.trim().is_empty() {
        return Err(bad_request("Question must not be empty"));
    }
    info!(question_len = payload.question.len(), "v1/ask/stream SSE request");

    let rx = state.orchestrator.run_stream(payload.into_query());

    let stream = ReceiverStream::new(rx).map(|event| {
        let name = event.event_type();
        let data = serde_json::to_string(&event).unwrap_or_default();
        Ok(SseEvent::default().event(name).data(data))
    });

    Ok(Sse::new(stream))
}

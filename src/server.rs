//! Search proxy HTTP server.
//!
//! A thin, stateless front for the hosted index: it turns a free-text
//! query into an index search (with optional rerank) and returns the hits
//! as flat project objects.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/search` | Search projects |
//! | `POST` | `/` | Same as `/search`, for function-style hosting |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! Request body: `{ "query": "AI healthcare" }`. Response:
//!
//! ```json
//! { "projects": [ { "_id": "project-4", "title": "...", "techUsed": ["..."] } ] }
//! ```
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "query must not be empty" } }
//! ```
//!
//! Error codes: `bad_request` (400), `upstream_error` (502).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted, on error responses too.

use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use hackathon_search_core::index::{Rerank, SearchQuery, VectorIndex};
use hackathon_search_core::models::{SearchHit, RECORD_FIELDS, TEXT_FIELD};

use crate::config::{Config, SearchConfig};

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    config: Arc<Config>,
    index: Arc<dyn VectorIndex>,
}

impl AppState {
    pub fn new(config: Arc<Config>, index: Arc<dyn VectorIndex>) -> Self {
        Self { config, index }
    }
}

/// Bind to `[server].bind` and serve until the process is terminated.
pub async fn run_server(config: Arc<Config>, index: Arc<dyn VectorIndex>) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();
    let app = router(AppState::new(config, index));

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!(addr = %listener.local_addr()?, "search proxy listening");
    axum::serve(listener, app).await?;
    Ok(())
}

/// Build the proxy router. Exposed so tests can serve it on any listener.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", post(handle_search))
        .route("/search", post(handle_search))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(state)
}

/// Build the index query for `text` from search settings.
pub fn build_query(search: &SearchConfig, text: &str) -> SearchQuery {
    let rerank = search
        .rerank_model
        .as_deref()
        .filter(|m| !m.trim().is_empty())
        .map(|model| Rerank {
            model: model.to_string(),
            top_n: search.rerank_top_n.unwrap_or(search.top_k),
            rank_fields: vec![TEXT_FIELD.to_string()],
        });
    SearchQuery {
        text: text.to_string(),
        top_k: search.top_k,
        fields: RECORD_FIELDS.iter().map(|f| f.to_string()).collect(),
        rerank,
    }
}

/// Search the configured namespace and flatten each hit to
/// `{ "_id": ..., ...fields }`.
pub async fn search_projects(
    config: &Config,
    index: &dyn VectorIndex,
    text: &str,
) -> anyhow::Result<Vec<Value>> {
    let query = build_query(&config.search, text);
    let hits = index
        .search_records(&config.pinecone.namespace, &query)
        .await?;
    Ok(hits.into_iter().map(SearchHit::into_project).collect())
}

// ============ Error handling ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

#[derive(Debug)]
struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code.to_string(),
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request",
        message: message.into(),
    }
}

fn upstream_error(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_GATEWAY,
        code: "upstream_error",
        message: message.into(),
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ POST /search ============

#[derive(Deserialize, Default)]
struct SearchRequest {
    #[serde(default)]
    query: Value,
}

#[derive(Serialize)]
struct SearchResponse {
    projects: Vec<Value>,
}

/// Pull the query text out of a request body. An empty body reads as `{}`;
/// a missing or non-string `query` reads as empty.
fn parse_query(body: &[u8]) -> Result<String, AppError> {
    let request: SearchRequest = if body.iter().all(u8::is_ascii_whitespace) {
        SearchRequest::default()
    } else {
        serde_json::from_slice(body)
            .map_err(|e| bad_request(format!("invalid JSON body: {}", e)))?
    };
    let text = request.query.as_str().unwrap_or("").trim().to_string();
    if text.is_empty() {
        return Err(bad_request("query must not be empty"));
    }
    Ok(text)
}

async fn handle_search(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<SearchResponse>, AppError> {
    let text = parse_query(&body)?;

    match search_projects(&state.config, state.index.as_ref(), &text).await {
        Ok(projects) => {
            tracing::debug!(query = %text, hits = projects.len(), "search");
            Ok(Json(SearchResponse { projects }))
        }
        Err(e) => {
            tracing::error!(query = %text, error = %format!("{:#}", e), "upstream search failed");
            Err(upstream_error(format!("search failed: {:#}", e)))
        }
    }
}

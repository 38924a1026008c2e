//! shelfmark HTTP endpoint.
//!
//! - `POST /api/add-book` with `{"input": "..."}` (or `{"url": "..."}`):
//!   look the book up and store it, non-interactively
//! - `GET  /health` for liveness
//! - anything else is served from the static directory

use std::path::Path;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;

use shelfmark_core::{BookStore, ShelfList};
use shelfmark_lookup::{LookupPipeline, Resolution};

// ── Server state ──────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<LookupPipeline>,
    pub store: Arc<dyn BookStore>,
}

impl AppState {
    pub fn new(pipeline: LookupPipeline, store: Arc<dyn BookStore>) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            store,
        }
    }
}

// ── Request / response types ──────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct AddBookRequest {
    #[serde(default)]
    pub input: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

impl AddBookRequest {
    /// `input`, else `url`, ignoring blank values.
    fn raw(&self) -> Option<&str> {
        [&self.input, &self.url]
            .into_iter()
            .flatten()
            .map(|s| s.trim())
            .find(|s| !s.is_empty())
    }
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    storage: String,
}

// ── Router ────────────────────────────────────────────────────────────────

pub fn router(state: AppState, static_dir: impl AsRef<Path>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/add-book", post(add_book))
        .fallback_service(ServeDir::new(static_dir.as_ref()))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ── Handlers ──────────────────────────────────────────────────────────────

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        storage: state.store.backend().to_string(),
    })
}

/// Runs the lookup pipeline without any prompts: first match, "To Read",
/// no tags or notes. A malformed or missing body counts as missing input.
pub async fn add_book(State(state): State<AppState>, body: Bytes) -> Response {
    let request: AddBookRequest = serde_json::from_slice(&body).unwrap_or_default();
    let Some(raw) = request.raw() else {
        return error(StatusCode::BAD_REQUEST, json!({"error": "Missing `input` parameter"}));
    };

    let built = state.pipeline.build_query(raw).await;
    let query = if built.is_empty() {
        raw.to_string()
    } else {
        built.query.clone()
    };

    let candidate = match state
        .pipeline
        .resolve(&query, built.cover.as_deref(), state.store.as_ref())
        .await
    {
        Resolution::Found(candidate) => candidate,
        Resolution::NotFound { query } => {
            return error(
                StatusCode::NOT_FOUND,
                json!({"error": "No match found in the book catalog", "query": query}),
            );
        }
    };

    let mut book = candidate.record;
    book.list = ShelfList::ToRead;

    if candidate.is_duplicate {
        return (
            StatusCode::OK,
            Json(json!({"status": "exists", "message": "Book already in library", "book": book})),
        )
            .into_response();
    }

    book.stamp();
    match state.store.insert(&book).await {
        Ok(id) => {
            tracing::info!(id = %id, title = %book.title, "book saved");
            (StatusCode::CREATED, Json(json!({"status": "ok", "book": book}))).into_response()
        }
        Err(e) => {
            tracing::error!(backend = state.store.backend(), "write failed: {e}");
            error(
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({"error": format!("Error saving book: {e}")}),
            )
        }
    }
}

fn error(status: StatusCode, body: serde_json::Value) -> Response {
    (status, Json(body)).into_response()
}

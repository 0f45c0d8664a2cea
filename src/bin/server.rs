//! `atom-server`: thin HTTP surface over the library's `api` functions.
//!
//! The router itself stays deliberately minimal — request parsing, one
//! call into `atom_engine::api`, response serialization. All retrieval
//! and ingest logic lives in the library.

use std::sync::Arc;

use atom_engine::api::{
    self, IngestRequest, RegisterGithubRepoRequest, SearchRequest,
};
use atom_engine::config::Config;
use atom_engine::persistence::{Backend, SqliteBackend};
use atom_engine::Engine;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use tracing_subscriber::EnvFilter;

#[derive(Clone)]
struct AppState {
    backend: Arc<dyn Backend>,
    engine: Arc<Engine>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env();
    let db_path = std::env::var("ATOM_DB_PATH").unwrap_or_else(|_| "atom-engine.db".to_string());
    let database_url = format!("sqlite://{db_path}?mode=rwc");
    let backend: Arc<dyn Backend> = Arc::new(SqliteBackend::connect(&database_url).await?);
    let engine = Arc::new(Engine::new(backend.clone(), config));

    let state = AppState { backend, engine };
    let app = Router::new()
        .route("/v1/ingest", post(ingest))
        .route("/v1/memory/search", post(search))
        .route("/v1/github/repos", get(list_repos).post(register_repo))
        .route("/v1/github/repos/{id}/sync", post(sync_repo))
        .route("/v1/github/repos/{id}", delete(remove_repo))
        .route("/v1/github/rate-limit", get(rate_limit))
        .with_state(state);

    let addr = std::env::var("ATOM_SERVER_ADDR").unwrap_or_else(|_| "127.0.0.1:8787".to_string());
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "listening");
    axum::serve(listener, app).await?;
    Ok(())
}

async fn ingest(State(state): State<AppState>, Json(req): Json<IngestRequest>) -> impl IntoResponse {
    let now_ms = chrono::Utc::now().timestamp_millis();
    match api::ingest_content(req, &state.backend, &state.engine.keyword_registry, &state.engine.config, now_ms).await {
        Ok(resp) => (StatusCode::OK, Json(resp)).into_response(),
        Err(e) => error_response(&e),
    }
}

async fn search(State(state): State<AppState>, Json(req): Json<SearchRequest>) -> impl IntoResponse {
    let now_ms = chrono::Utc::now().timestamp_millis();
    let engine = state.engine.retrieval_engine();
    Json(api::search(req, &engine, now_ms).await).into_response()
}

async fn register_repo(State(state): State<AppState>, Json(req): Json<RegisterGithubRepoRequest>) -> impl IntoResponse {
    let fetcher = state.engine.remote_fetcher();
    match api::register_github_repo(req, &fetcher).await {
        Ok(resp) => (StatusCode::OK, Json(resp)).into_response(),
        Err(e) => error_response(&e),
    }
}

async fn list_repos(State(state): State<AppState>) -> impl IntoResponse {
    match api::list_github_repos(&state.backend).await {
        Ok(repos) => Json(repos).into_response(),
        Err(e) => error_response(&atom_engine::IngestError::from(e)),
    }
}

async fn sync_repo(State(state): State<AppState>, Path(id): Path<String>) -> impl IntoResponse {
    let fetcher = state.engine.remote_fetcher();
    let token = state.engine.config.github_token.clone();
    match api::sync_github_repo(&id, &fetcher, token.as_deref()).await {
        Ok(resp) => (StatusCode::OK, Json(resp)).into_response(),
        Err(e) => error_response(&e),
    }
}

async fn remove_repo(State(state): State<AppState>, Path(id): Path<String>) -> impl IntoResponse {
    let fetcher = state.engine.remote_fetcher();
    match api::remove_github_repo(&id, &fetcher).await {
        Ok(resp) => (StatusCode::OK, Json(resp)).into_response(),
        Err(e) => error_response(&e),
    }
}

async fn rate_limit(State(state): State<AppState>) -> impl IntoResponse {
    Json(api::rate_limit(state.engine.config.github_token.is_some()))
}

fn error_response(err: &atom_engine::IngestError) -> axum::response::Response {
    let body = api::ErrorBody::from(err);
    let status = match err {
        atom_engine::IngestError::Fetch(atom_engine::error::FetchError::RateLimited { .. }) => StatusCode::TOO_MANY_REQUESTS,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(body)).into_response()
}

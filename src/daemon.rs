use std::future::Future;
use std::sync::Arc;

use axum::{
    extract::{Json, Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, patch, post},
    Router,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::config::Config;
use crate::config_store;
use crate::domains::ai::{
    AiEntity, AiOverview, CreateAiRequest, DeleteAiRequest, RagLogEntry, UpdateAiRequest,
    UsagePatch,
};
use crate::error::{AiRegistryError, Result};
use crate::services::registry::AiRegistry;

#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<AiRegistry>,
    /// Required on mutating routes; empty disables the check.
    pub token: String,
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
}

#[derive(Deserialize)]
struct PageQuery {
    offset: Option<i64>,
    limit: Option<i64>,
}

#[derive(Deserialize)]
struct TrendQuery {
    offset: Option<i64>,
    limit: Option<i64>,
    category: Option<String>,
}

#[derive(Serialize)]
struct AiListResponse {
    ais: Vec<AiEntity>,
}

#[derive(Serialize)]
struct OverviewListResponse {
    ais: Vec<AiOverview>,
}

#[derive(Serialize)]
struct RagListResponse {
    logs: Vec<RagLogEntry>,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    lingering: Option<Vec<String>>,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route(
            "/ais",
            get(list_ais)
                .post(create_ai)
                .put(update_ai)
                .delete(delete_ai),
        )
        .route("/ais/id/:ai_id", get(get_ai))
        .route("/ais/detail/:ai_id", get(get_detail))
        .route("/ais/today", get(today_ais))
        .route("/ais/trend", get(trending_ais))
        .route("/ais/search/:name", get(search_ais))
        .route("/ais/user/:address", get(creator_ais))
        .route("/ais/:ai_id/rags", get(rag_logs))
        .route("/ais/:ai_id/usage", patch(update_usage))
        .with_state(state)
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

async fn list_ais(State(state): State<AppState>, Query(query): Query<PageQuery>) -> Response {
    match state
        .registry
        .list_ais(query.offset.unwrap_or(0), query.limit)
        .await
    {
        Ok(ais) => (StatusCode::OK, Json(AiListResponse { ais })).into_response(),
        Err(err) => error_response(err),
    }
}

async fn get_ai(State(state): State<AppState>, Path(ai_id): Path<String>) -> Response {
    match state.registry.get_ai(&ai_id).await {
        Ok(Some(ai)) => (StatusCode::OK, Json(ai)).into_response(),
        Ok(None) => error_response(AiRegistryError::NotFound("AI not found".to_string())),
        Err(err) => error_response(err),
    }
}

async fn get_detail(State(state): State<AppState>, Path(ai_id): Path<String>) -> Response {
    match state.registry.get_detail(&ai_id).await {
        Ok(Some(detail)) => (StatusCode::OK, Json(detail)).into_response(),
        Ok(None) => error_response(AiRegistryError::NotFound("AI not found".to_string())),
        Err(err) => error_response(err),
    }
}

async fn today_ais(State(state): State<AppState>) -> Response {
    match state.registry.recent_overview().await {
        Ok(ais) => (StatusCode::OK, Json(OverviewListResponse { ais })).into_response(),
        Err(err) => error_response(err),
    }
}

async fn trending_ais(State(state): State<AppState>, Query(query): Query<TrendQuery>) -> Response {
    match state
        .registry
        .list_trending(
            query.offset.unwrap_or(0),
            query.limit,
            query.category.as_deref(),
        )
        .await
    {
        Ok(ais) => (StatusCode::OK, Json(AiListResponse { ais })).into_response(),
        Err(err) => error_response(err),
    }
}

async fn search_ais(State(state): State<AppState>, Path(name): Path<String>) -> Response {
    match state.registry.search_by_name(&name).await {
        Ok(ais) => (StatusCode::OK, Json(AiListResponse { ais })).into_response(),
        Err(err) => error_response(err),
    }
}

async fn creator_ais(State(state): State<AppState>, Path(address): Path<String>) -> Response {
    match state.registry.list_by_creator(&address).await {
        Ok(ais) => (StatusCode::OK, Json(AiListResponse { ais })).into_response(),
        Err(err) => error_response(err),
    }
}

async fn rag_logs(State(state): State<AppState>, Path(ai_id): Path<String>) -> Response {
    match state.registry.list_rag_entries(&ai_id).await {
        Ok(logs) => (StatusCode::OK, Json(RagListResponse { logs })).into_response(),
        Err(err) => error_response(err),
    }
}

async fn create_ai(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<CreateAiRequest>,
) -> Response {
    if let Err(err) = authorize(&headers, &state.token) {
        return err.into_response();
    }
    match state.registry.create_ai(&payload).await {
        Ok(ai) => (StatusCode::CREATED, Json(ai)).into_response(),
        Err(err) => error_response(err),
    }
}

async fn update_ai(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<UpdateAiRequest>,
) -> Response {
    if let Err(err) = authorize(&headers, &state.token) {
        return err.into_response();
    }
    match state.registry.update_ai(&payload).await {
        Ok(ai) => (StatusCode::OK, Json(ai)).into_response(),
        Err(err) => error_response(err),
    }
}

async fn update_usage(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(ai_id): Path<String>,
    Json(payload): Json<UsagePatch>,
) -> Response {
    if let Err(err) = authorize(&headers, &state.token) {
        return err.into_response();
    }
    match state.registry.update_usage(&ai_id, &payload).await {
        Ok(Some(ai)) => (StatusCode::OK, Json(ai)).into_response(),
        Ok(None) => error_response(AiRegistryError::NotFound("AI not found".to_string())),
        Err(err) => error_response(err),
    }
}

async fn delete_ai(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<DeleteAiRequest>,
) -> Response {
    if let Err(err) = authorize(&headers, &state.token) {
        return err.into_response();
    }
    match state.registry.delete_ai(&payload).await {
        Ok(deleted) => (StatusCode::OK, Json(deleted)).into_response(),
        Err(err) => error_response(err),
    }
}

fn status_for(err: &AiRegistryError) -> StatusCode {
    match err {
        AiRegistryError::NotFound(_) => StatusCode::NOT_FOUND,
        AiRegistryError::Conflict(_) => StatusCode::CONFLICT,
        AiRegistryError::NotAuthorized(_) => StatusCode::FORBIDDEN,
        AiRegistryError::Validation(_) => StatusCode::BAD_REQUEST,
        AiRegistryError::Collaborator { .. }
        | AiRegistryError::PartialCreation { .. }
        | AiRegistryError::PartialUpdate { .. } => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_response(err: AiRegistryError) -> Response {
    let status = status_for(&err);
    if status.is_server_error() {
        error!(error = %err, "request failed");
    }
    let lingering = err.lingering().map(<[String]>::to_vec);
    (
        status,
        Json(ErrorResponse {
            error: err.to_string(),
            lingering,
        }),
    )
        .into_response()
}

fn authorize(
    headers: &HeaderMap,
    token: &str,
) -> std::result::Result<(), (StatusCode, Json<ErrorResponse>)> {
    if token.is_empty() {
        return Ok(());
    }
    let header = headers
        .get("authorization")
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();
    let api_key = headers
        .get("x-api-key")
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();
    let bearer = header.strip_prefix("Bearer ").unwrap_or("");

    if bearer == token || api_key == token {
        Ok(())
    } else {
        Err((
            StatusCode::UNAUTHORIZED,
            Json(ErrorResponse {
                error: "Unauthorized".to_string(),
                lingering: None,
            }),
        ))
    }
}

/// Resolves the effective config: an explicit file wins and is persisted,
/// otherwise the stored config, otherwise local defaults (also persisted).
pub fn resolve_config(db_path: &str, config_file: Option<&str>) -> Result<Config> {
    if let Some(path) = config_file {
        let mut config = Config::from_file(path)?;
        if config.database.is_none() {
            config.database = Config::local_default(db_path).database;
        }
        config_store::save_config(db_path, &config)?;
        return Ok(config);
    }
    config_store::load_or_init(db_path, || Config::local_default(db_path))
}

pub async fn run_with_shutdown<F>(
    host: &str,
    port: u16,
    db_path: &str,
    token: &str,
    config_file: Option<&str>,
    shutdown: F,
) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let config = resolve_config(db_path, config_file)?;
    let registry = Arc::new(AiRegistry::from_config(&config).await?);
    let state = AppState {
        registry,
        token: token.to_string(),
    };
    let app = build_router(state);

    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| AiRegistryError::Runtime(e.to_string()))?;
    info!(%addr, db = %config.sqlite_path(), "ai registry listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| AiRegistryError::Runtime(e.to_string()))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        assert_eq!(
            status_for(&AiRegistryError::NotFound("x".to_string())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_for(&AiRegistryError::Conflict("x".to_string())),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_for(&AiRegistryError::NotAuthorized("x".to_string())),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            status_for(&AiRegistryError::collaborator("blockchain", "down")),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            status_for(&AiRegistryError::Database("x".to_string())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn empty_token_disables_auth() {
        let headers = HeaderMap::new();
        assert!(authorize(&headers, "").is_ok());
        assert!(authorize(&headers, "secret").is_err());

        let mut headers = HeaderMap::new();
        headers.insert("x-api-key", "secret".parse().unwrap());
        assert!(authorize(&headers, "secret").is_ok());
    }
}

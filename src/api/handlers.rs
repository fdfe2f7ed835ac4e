//! API Handlers
//!
//! HTTP request handlers for each diagnostic endpoint.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};
use tracing::info;

use crate::error::{CacheError, Result};
use crate::fetch::FetchCoordinator;
use crate::models::{
    ClearResponse, EntryResponse, EvictResponse, HealthResponse, ObtainRequest, ObtainResponse,
    RemoveResponse, StatsResponse,
};

/// Application state shared across all handlers.
///
/// The coordinator does its own locking, so handlers share it behind a
/// plain `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub coordinator: Arc<FetchCoordinator>,
}

impl AppState {
    /// Creates a new AppState around an already constructed coordinator.
    pub fn new(coordinator: Arc<FetchCoordinator>) -> Self {
        Self { coordinator }
    }
}

/// Handler for POST /obtain
///
/// Serves the artifact from the cache, fetching it on a miss.
pub async fn obtain_handler(
    State(state): State<AppState>,
    Json(req): Json<ObtainRequest>,
) -> Result<Json<ObtainResponse>> {
    if let Some(error_msg) = req.validate() {
        return Err(CacheError::InvalidSource(error_msg));
    }

    let obtained = state.coordinator.obtain(&req.id, &req.url).await?;
    info!(
        id = %req.id,
        title = req.title.as_deref().unwrap_or(""),
        from_cache = obtained.from_cache,
        "Artifact obtained"
    );

    Ok(Json(ObtainResponse::from(obtained)))
}

/// Handler for GET /entries/:id
///
/// Looks up a live entry without fetching. Misses are 404.
pub async fn lookup_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<EntryResponse>> {
    match state.coordinator.lookup(&id).await?.entry() {
        Some(entry) => Ok(Json(EntryResponse::from(entry))),
        None => Err(CacheError::NotFound(id)),
    }
}

/// Handler for DELETE /entries/:id
pub async fn remove_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<RemoveResponse>> {
    if !state.coordinator.remove(&id).await? {
        return Err(CacheError::NotFound(id));
    }

    Ok(Json(RemoveResponse::new(id)))
}

/// Handler for POST /evict
///
/// Runs an eviction pass outside of any insertion.
pub async fn evict_handler(State(state): State<AppState>) -> Result<Json<EvictResponse>> {
    let report = state.coordinator.evict().await?;
    Ok(Json(EvictResponse::from(report)))
}

/// Handler for POST /clear
pub async fn clear_handler(State(state): State<AppState>) -> Result<Json<ClearResponse>> {
    state.coordinator.clear().await?;
    Ok(Json(ClearResponse::cleared()))
}

/// Handler for GET /stats
///
/// Returns current cache statistics.
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(StatsResponse::from(state.coordinator.stats().await))
}

/// Handler for GET /health
///
/// Returns health status of the server. A degraded cache is still healthy.
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse::healthy(state.coordinator.mode()))
}

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use crate::error::AppError;
use crate::models::server::MapServerDescriptor;
use crate::registry::RegistryError;
use crate::state::DirectoryState;

impl From<RegistryError> for AppError {
    fn from(e: RegistryError) -> Self {
        match e {
            RegistryError::NotRegistered(_) => AppError::NotRegistered(e.to_string()),
            RegistryError::Store(inner) => inner.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct HeartbeatRequest {
    pub id: String,
    pub current_players: Option<i64>,
    pub load: Option<f64>,
}

pub async fn register(
    State(state): State<DirectoryState>,
    Json(input): Json<MapServerDescriptor>,
) -> Result<Json<serde_json::Value>, AppError> {
    // A server with no maps would hold a live record that routes nothing.
    if input.supported_maps.is_empty() {
        return Err(AppError::BadRequest(
            "supported_maps must not be empty".to_string(),
        ));
    }
    let record = state.registry.register(input).await?;
    Ok(Json(serde_json::json!(record)))
}

pub async fn heartbeat(
    State(state): State<DirectoryState>,
    Json(input): Json<HeartbeatRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    state
        .registry
        .heartbeat(&input.id, input.current_players, input.load)
        .await?;
    Ok(Json(serde_json::json!({ "status": "ok" })))
}

pub async fn find_for_map(
    State(state): State<DirectoryState>,
    Path(map_id): Path<i64>,
) -> Result<Json<serde_json::Value>, AppError> {
    match state.registry.find_server_for_map(map_id).await? {
        Some(server) => Ok(Json(serde_json::json!(server))),
        None => Err(AppError::NotFound(format!(
            "no live server for map {map_id}"
        ))),
    }
}

pub async fn find_by_id(
    State(state): State<DirectoryState>,
    Path(server_id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    match state.registry.find_server_by_id(&server_id).await? {
        Some(server) => Ok(Json(serde_json::json!(server))),
        None => Err(AppError::NotFound(format!("no server {server_id}"))),
    }
}

pub async fn list_all(
    State(state): State<DirectoryState>,
) -> Result<Json<serde_json::Value>, AppError> {
    let servers = state.registry.list_all().await?;
    Ok(Json(serde_json::json!(servers)))
}

pub async fn unregister(
    State(state): State<DirectoryState>,
    Path(server_id): Path<String>,
) -> Result<StatusCode, AppError> {
    state.registry.unregister(&server_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use crate::error::AppError;
use crate::state::DirectoryState;

#[derive(Debug, Deserialize)]
pub struct SetOnlineRequest {
    pub user_id: String,
    pub gateway_id: String,
}

#[derive(Debug, Deserialize)]
pub struct AnnounceGatewayRequest {
    pub gateway_id: String,
    pub kick_url: String,
}

pub async fn set_online(
    State(state): State<DirectoryState>,
    Json(input): Json<SetOnlineRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    state
        .sessions
        .set_online(&input.user_id, &input.gateway_id)
        .await?;
    Ok(Json(serde_json::json!({ "status": "ok" })))
}

pub async fn set_offline(
    State(state): State<DirectoryState>,
    Path(user_id): Path<String>,
) -> Result<StatusCode, AppError> {
    state.sessions.set_offline(&user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn get_session(
    State(state): State<DirectoryState>,
    Path(user_id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    match state.sessions.get_session(&user_id).await? {
        Some(session) => Ok(Json(serde_json::json!(session))),
        None => Err(AppError::NotFound(format!("user {user_id} is not online"))),
    }
}

pub async fn status(
    State(state): State<DirectoryState>,
    Path(user_id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let online = state.sessions.is_online(&user_id).await?;
    Ok(Json(serde_json::json!({ "online": online })))
}

pub async fn extend(
    State(state): State<DirectoryState>,
    Path(user_id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    state.sessions.extend(&user_id).await?;
    Ok(Json(serde_json::json!({ "status": "ok" })))
}

pub async fn online_count(
    State(state): State<DirectoryState>,
) -> Result<Json<serde_json::Value>, AppError> {
    let count = state.sessions.online_count().await?;
    Ok(Json(serde_json::json!({ "count": count })))
}

pub async fn token_version(
    State(state): State<DirectoryState>,
    Path(user_id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let version = state.sessions.current_token_version(&user_id).await?;
    Ok(Json(serde_json::json!({ "version": version })))
}

pub async fn takeover(
    State(state): State<DirectoryState>,
    Path(user_id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let outcome = state.takeover.claim(&user_id).await?;
    Ok(Json(serde_json::json!(outcome)))
}

pub async fn announce_gateway(
    State(state): State<DirectoryState>,
    Json(input): Json<AnnounceGatewayRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    state
        .sessions
        .announce_gateway(&input.gateway_id, &input.kick_url)
        .await?;
    Ok(Json(serde_json::json!({ "status": "ok" })))
}

pub async fn retire_gateway(
    State(state): State<DirectoryState>,
    Path(gateway_id): Path<String>,
) -> Result<StatusCode, AppError> {
    state.sessions.retire_gateway(&gateway_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

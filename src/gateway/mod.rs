pub mod connections;
pub mod events;

use std::sync::Arc;

use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, Query, State};
use axum::response::Response;
use axum::routing::{get, post};
use axum::{Json, Router};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::account_client::{AccountClient, AccountClientError};
use crate::gateway::connections::{ConnectionHandle, ConnectionTable};
use crate::token::TokenSigner;
use crate::world_client::WorldClient;
use events::{close_code, error_code, ClientEvent, EnterWorldData, JoinMapData};

#[derive(Clone)]
pub struct GatewayState {
    pub gateway_id: String,
    pub connections: Arc<ConnectionTable>,
    pub world: Arc<WorldClient>,
    pub account: Arc<AccountClient>,
    pub signer: Arc<TokenSigner>,
}

/// Build the gateway router: the player-facing socket plus the internal
/// kick endpoint targeted by the takeover flow.
pub fn router(state: GatewayState) -> Router {
    Router::new()
        .route("/ws", get(ws_upgrade))
        .route("/kick/{user_id}", post(kick_user))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[derive(Debug, Deserialize)]
pub struct ConnectParams {
    token: Option<String>,
}

pub async fn ws_upgrade(
    ws: WebSocketUpgrade,
    Query(params): Query<ConnectParams>,
    State(state): State<GatewayState>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state, params.token))
}

/// Kick endpoint. Absence is not an error: HTTP 200 either way, with the
/// outcome in the body, so callers can stay fire-and-forget.
pub async fn kick_user(
    State(state): State<GatewayState>,
    Path(user_id): Path<String>,
) -> Json<serde_json::Value> {
    let kicked = state.connections.kick(&user_id);
    if kicked {
        tracing::info!("kicked user {user_id}");
    } else {
        tracing::info!("kick for user {user_id}: not connected here");
    }
    Json(serde_json::json!({
        "status": if kicked { "kicked" } else { "not_found" }
    }))
}

pub async fn health(State(state): State<GatewayState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "gateway_id": state.gateway_id,
        "connections": state.connections.len(),
    }))
}

async fn handle_socket(socket: WebSocket, state: GatewayState, token: Option<String>) {
    let (mut ws_sink, mut ws_stream) = socket.split();

    let close_policy = |reason: &'static str| {
        Message::Close(Some(CloseFrame {
            code: close_code::POLICY_VIOLATION,
            reason: reason.into(),
        }))
    };

    // Authenticate before anything else: bearer token from the handshake
    // query, signature and expiry checked locally.
    let token = match token {
        Some(token) => token,
        None => {
            tracing::warn!("connection attempt missing token");
            let _ = ws_sink.send(close_policy("token missing")).await;
            return;
        }
    };

    let claims = match state.signer.verify(&token) {
        Ok(claims) => claims,
        Err(e) => {
            tracing::warn!("connection attempt with invalid token: {e}");
            let _ = ws_sink.send(close_policy("invalid token")).await;
            return;
        }
    };

    // Version check against the directory. A readable mismatch always
    // rejects; an unreachable directory fails open, trading consistency for
    // availability.
    match state.world.token_version(&claims.sub).await {
        Ok(current) => {
            let valid = match current {
                None => true,
                Some(version) => version == claims.ver,
            };
            if !valid {
                tracing::warn!("user {} presented a stale token version", claims.sub);
                let _ = ws_sink.send(close_policy("stale token")).await;
                return;
            }
        }
        Err(e) => {
            tracing::warn!(
                "token version check for {} unavailable ({e}), failing open",
                claims.sub
            );
        }
    }

    // Identity is immutable from here on.
    let user_id = claims.sub;
    let conn_id = uuid::Uuid::new_v4().to_string();

    let (kick_tx, mut kick_rx) = mpsc::unbounded_channel();
    state.connections.insert(ConnectionHandle::new(
        conn_id.clone(),
        user_id.clone(),
        kick_tx,
    ));

    // Presence registration is best-effort; the session TTL is the backstop
    // if this gateway dies before cleaning up.
    if let Err(e) = state
        .world
        .register_session(&user_id, &state.gateway_id)
        .await
    {
        tracing::error!("failed to register session for user {user_id}: {e}");
    }

    tracing::info!("user {user_id} connected");

    if ws_sink
        .send(Message::Text(events::welcome_event().into()))
        .await
        .is_err()
    {
        cleanup(&state, &user_id, &conn_id).await;
        return;
    }

    // The character currently entered with, if any. The only per-connection
    // state that changes after authentication.
    let mut active_character: Option<String> = None;

    loop {
        tokio::select! {
            // Inbound kick from the takeover flow.
            _ = kick_rx.recv() => {
                tracing::info!("closing connection of user {user_id}: session replaced");
                let _ = ws_sink
                    .send(Message::Close(Some(CloseFrame {
                        code: close_code::SESSION_REPLACED,
                        reason: "session replaced by a newer login".into(),
                    })))
                    .await;
                break;
            }
            msg = ws_stream.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        let event = match serde_json::from_str::<ClientEvent>(&text) {
                            Ok(event) => event,
                            Err(_) => continue,
                        };
                        if let Some(reply) =
                            dispatch(&state, &user_id, &mut active_character, event).await
                        {
                            if ws_sink.send(Message::Text(reply.into())).await.is_err() {
                                break;
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(_)) => break,
                    _ => {}
                }
            }
        }
    }

    cleanup(&state, &user_id, &conn_id).await;
    tracing::info!("user {user_id} disconnected");
}

async fn cleanup(state: &GatewayState, user_id: &str, conn_id: &str) {
    state.connections.remove(user_id, conn_id);
    if let Err(e) = state.world.remove_session(user_id).await {
        tracing::error!("failed to remove session for user {user_id}: {e}");
    }
}

async fn dispatch(
    state: &GatewayState,
    user_id: &str,
    active_character: &mut Option<String>,
    event: ClientEvent,
) -> Option<String> {
    match event.event.as_str() {
        "enter_world" => {
            let data: EnterWorldData = serde_json::from_value(event.data?).ok()?;
            Some(enter_world(state, user_id, active_character, data).await)
        }
        "join_map" => {
            let data: JoinMapData = serde_json::from_value(event.data?).ok()?;
            Some(join_map(state, user_id, data.map_id).await)
        }
        _ => None,
    }
}

/// Resolve a character to its map shard. Ownership is checked first through
/// the account service; the registry is only consulted for characters the
/// user actually owns.
async fn enter_world(
    state: &GatewayState,
    user_id: &str,
    active_character: &mut Option<String>,
    data: EnterWorldData,
) -> String {
    tracing::info!(
        "user {user_id} requesting to enter world with character {}",
        data.character_id
    );

    let character = match state.account.get_character(&data.character_id).await {
        Ok(character) => character,
        Err(AccountClientError::NotFound) => {
            // An unknown character is indistinguishable from someone else's.
            tracing::warn!("user {user_id}: character {} not found", data.character_id);
            return events::error_event(error_code::FORBIDDEN, "You do not own this character");
        }
        Err(e) => {
            tracing::error!("enter_world failed: {e}");
            return events::error_event(
                error_code::INTERNAL_ERROR,
                "Failed to process enter_world request",
            );
        }
    };

    if character.user_id != user_id {
        tracing::warn!(
            "user {user_id} does not own character {}",
            data.character_id
        );
        return events::error_event(error_code::FORBIDDEN, "You do not own this character");
    }

    let server = match state.world.get_map_server(character.map_id).await {
        Ok(Some(server)) => server,
        Ok(None) => {
            return events::error_event(
                error_code::MAP_NOT_FOUND,
                &format!("Map {} not available", character.map_id),
            );
        }
        Err(e) => {
            tracing::error!("enter_world failed: {e}");
            return events::error_event(
                error_code::INTERNAL_ERROR,
                "Failed to process enter_world request",
            );
        }
    };

    *active_character = Some(character.id.clone());
    let ticket = state.signer.mint_ticket(user_id, character.map_id);

    tracing::info!("sending enter_world_success for character {}", character.id);
    serde_json::json!({
        "event": "enter_world_success",
        "data": {
            "character_id": character.id,
            "map_id": character.map_id,
            "map_ip": server.host,
            "map_port": server.port,
            "ticket": ticket,
            "spawn_pos": character.position,
        }
    })
    .to_string()
}

async fn join_map(state: &GatewayState, user_id: &str, map_id: i64) -> String {
    tracing::info!("user {user_id} requesting to join map {map_id}");

    match state.world.get_map_server(map_id).await {
        Ok(Some(server)) => {
            let ticket = state.signer.mint_ticket(user_id, map_id);
            serde_json::json!({
                "event": "join_map_success",
                "data": {
                    "map_ip": server.host,
                    "map_port": server.port,
                    "ticket": ticket,
                }
            })
            .to_string()
        }
        Ok(None) => events::error_event(
            error_code::MAP_NOT_FOUND,
            &format!("Map {map_id} not available"),
        ),
        Err(e) => {
            tracing::error!("join_map failed: {e}");
            events::error_event(
                error_code::INTERNAL_ERROR,
                "Failed to process join_map request",
            )
        }
    }
}

mod health;
mod registry;
mod session;

use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::DirectoryState;

/// Build the directory service router. Everything under /session, /gateway
/// and /map-registry is an internal API consumed by gateways, map servers
/// and the account service.
pub fn router(state: DirectoryState) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route("/version", get(health::version))
        // Session directory
        .route("/session/online", post(session::set_online))
        .route("/session/stats/count", get(session::online_count))
        .route(
            "/session/{user_id}",
            get(session::get_session).delete(session::set_offline),
        )
        .route("/session/{user_id}/status", get(session::status))
        .route("/session/{user_id}/extend", post(session::extend))
        .route(
            "/session/{user_id}/token-version",
            get(session::token_version),
        )
        .route("/session/{user_id}/takeover", post(session::takeover))
        // Gateway roster
        .route("/gateway/announce", post(session::announce_gateway))
        .route("/gateway/{gateway_id}", delete(session::retire_gateway))
        // Map registry
        .route("/map-registry/register", post(registry::register))
        .route("/map-registry/heartbeat", post(registry::heartbeat))
        .route("/map-registry/map/{map_id}", get(registry::find_for_map))
        .route(
            "/map-registry/server/{server_id}",
            get(registry::find_by_id).delete(registry::unregister),
        )
        .route("/map-registry/servers", get(registry::list_all))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

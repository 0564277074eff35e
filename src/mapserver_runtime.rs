use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use axum::routing::get;
use axum::{Json, Router};
use rand::Rng;
use tokio::net::TcpListener;
use tokio::signal;

use crate::config::MapServerConfig;
use crate::models::server::MapServerDescriptor;
use crate::registry_client::{RegistryClient, RegistryClientError};
use crate::store::keys;

#[derive(Clone)]
struct MapServerState {
    server_id: String,
    supported_maps: Vec<i64>,
    current_players: Arc<AtomicI64>,
}

async fn health(
    axum::extract::State(state): axum::extract::State<MapServerState>,
) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "server_id": state.server_id,
        "supported_maps": state.supported_maps,
        "current_players": state.current_players.load(Ordering::Relaxed),
    }))
}

/// Registration shell for a map-server process: keeps the directory's view
/// of this shard alive. The simulation loop itself is a separate concern and
/// would feed `current_players` here.
pub async fn run(config: MapServerConfig, port: u16) {
    let descriptor = MapServerDescriptor {
        id: config.server_id.clone(),
        name: config.name.clone(),
        host: config.host.clone(),
        port: config.game_port,
        supported_maps: config.supported_maps.clone(),
        max_players: config.max_players,
    };

    let client = Arc::new(RegistryClient::new(config.directory_url.clone(), descriptor));

    // Register with exponential backoff; the directory may come up after us.
    // Jitter keeps a fleet restart from hammering it in lockstep.
    let mut delay = std::time::Duration::from_secs(1);
    let max_delay = std::time::Duration::from_secs(30);
    loop {
        match client.register().await {
            Ok(()) => {
                tracing::info!("registered with directory as '{}'", config.server_id);
                break;
            }
            Err(e) => {
                tracing::warn!("failed to register with directory: {e}, retrying in {delay:?}");
                let jitter =
                    std::time::Duration::from_millis(rand::thread_rng().gen_range(0..250));
                tokio::time::sleep(delay + jitter).await;
                delay = (delay * 2).min(max_delay);
            }
        }
    }

    let state = MapServerState {
        server_id: config.server_id.clone(),
        supported_maps: config.supported_maps.clone(),
        current_players: Arc::new(AtomicI64::new(0)),
    };

    let app = Router::new()
        .route("/health", get(health))
        .with_state(state.clone());

    let listener = TcpListener::bind(("0.0.0.0", port))
        .await
        .expect("failed to bind map server listener");

    eprintln!("  \x1b[32m→ listening on 0.0.0.0:{port}\x1b[0m");
    eprintln!();

    // Heartbeats must land well inside the liveness window; anything slower
    // than TTL/3 risks a false expiry under transient delay, so the interval
    // is clamped.
    let hb_interval = config
        .heartbeat_interval_secs
        .clamp(1, keys::MAP_SERVER_TTL.as_secs() / 3);
    if hb_interval != config.heartbeat_interval_secs {
        tracing::warn!(
            "heartbeat interval {}s clamped to {hb_interval}s",
            config.heartbeat_interval_secs
        );
    }

    let hb_client = Arc::clone(&client);
    let hb_players = Arc::clone(&state.current_players);
    let heartbeat_handle = tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(hb_interval));
        loop {
            interval.tick().await;
            let players = hb_players.load(Ordering::Relaxed);
            let load = players as f64;
            match hb_client.heartbeat(players, load).await {
                Ok(()) => {}
                Err(RegistryClientError::NotRegistered) => {
                    // Our record lapsed (e.g. directory restart); registration
                    // is mandatory before the next heartbeat counts.
                    tracing::warn!("directory lost our record, re-registering");
                    if let Err(e) = hb_client.register().await {
                        tracing::warn!("re-registration failed: {e}");
                    }
                }
                Err(e) => {
                    tracing::warn!("heartbeat failed: {e}");
                }
            }
        }
    });

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("map server error");

    // Graceful shutdown: stop heartbeating and drop our routes now instead
    // of letting them linger until TTL expiry.
    heartbeat_handle.abort();
    tracing::info!("shutting down map server '{}'", config.server_id);

    if let Err(e) = client.deregister().await {
        tracing::warn!("failed to deregister on shutdown: {e}");
    } else {
        tracing::info!("deregistered map server '{}'", config.server_id);
    }
}

pub async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

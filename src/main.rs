use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;

use shardgate::config::{Config, GatewayConfig, ShardgateMode};
use shardgate::gateway::connections::ConnectionTable;
use shardgate::gateway::GatewayState;
use shardgate::registry::MapRegistry;
use shardgate::session::SessionDirectory;
use shardgate::state::DirectoryState;
use shardgate::store::keys;
use shardgate::store::memory::MemoryStore;
use shardgate::takeover::SessionTakeover;
use shardgate::token::TokenSigner;
use shardgate::world_client::WorldClient;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "shardgate=debug,tower_http=debug".into()),
        )
        .init();

    let config = Config::from_env();
    print_banner(&config);

    match config.mode {
        ShardgateMode::Directory => run_directory(config).await,
        ShardgateMode::Gateway => run_gateway(config).await,
        ShardgateMode::MapServer => run_map_server(config).await,
    }
}

fn print_banner(config: &Config) {
    let version = env!("CARGO_PKG_VERSION");
    let mode = match config.mode {
        ShardgateMode::Directory => "directory",
        ShardgateMode::Gateway => "gateway",
        ShardgateMode::MapServer => "mapserver",
    };

    eprintln!();
    eprintln!("  \x1b[1;36mshardgate\x1b[0m \x1b[2mv{version}\x1b[0m");
    eprintln!();
    eprintln!("  \x1b[2mmode\x1b[0m         {mode}");
    eprintln!("  \x1b[2mport\x1b[0m         {}", config.port);

    match config.mode {
        ShardgateMode::Directory => {}
        ShardgateMode::Gateway => {
            if let Some(ref gw) = config.gateway {
                eprintln!("  \x1b[2mgateway id\x1b[0m   {}", gw.gateway_id);
                eprintln!("  \x1b[2mdirectory\x1b[0m    {}", gw.directory_url);
                eprintln!("  \x1b[2maccount\x1b[0m      {}", gw.account_url);
            }
        }
        ShardgateMode::MapServer => {
            if let Some(ref ms) = config.map_server {
                eprintln!("  \x1b[2mserver id\x1b[0m    {}", ms.server_id);
                eprintln!("  \x1b[2mdirectory\x1b[0m    {}", ms.directory_url);
                eprintln!("  \x1b[2mmaps\x1b[0m         {:?}", ms.supported_maps);
            }
        }
    }

    eprintln!();
}

async fn run_directory(config: Config) {
    let store = Arc::new(MemoryStore::new());
    let sessions = Arc::new(SessionDirectory::new(
        store.clone(),
        Duration::from_secs(config.token_ttl_secs),
    ));
    let registry = Arc::new(MapRegistry::new(store));
    let takeover = Arc::new(SessionTakeover::new(sessions.clone()));

    let state = DirectoryState {
        sessions,
        registry,
        takeover,
    };

    let app = shardgate::routes::router(state);

    let listener = TcpListener::bind(("0.0.0.0", config.port))
        .await
        .expect("failed to bind");

    eprintln!("  \x1b[32m→ listening on 0.0.0.0:{}\x1b[0m", config.port);
    eprintln!();

    axum::serve(listener, app).await.expect("server error");
}

async fn run_gateway(config: Config) {
    let gw: GatewayConfig = config
        .gateway
        .expect("gateway config is required in gateway mode");

    let world = Arc::new(WorldClient::new(gw.directory_url.clone()));
    let state = GatewayState {
        gateway_id: gw.gateway_id.clone(),
        connections: Arc::new(ConnectionTable::new()),
        world: world.clone(),
        account: Arc::new(shardgate::account_client::AccountClient::new(
            gw.account_url.clone(),
        )),
        signer: Arc::new(TokenSigner::new(&gw.token_secret)),
    };

    let app = shardgate::gateway::router(state);

    let listener = TcpListener::bind(("0.0.0.0", config.port))
        .await
        .expect("failed to bind");

    eprintln!("  \x1b[32m→ listening on 0.0.0.0:{}\x1b[0m", config.port);
    eprintln!();

    // Keep this gateway's roster entry alive so the takeover flow can route
    // kicks here. Announce cadence stays well inside the roster TTL.
    let announce_world = world.clone();
    let announce_id = gw.gateway_id.clone();
    let announce_url = gw.kick_url.clone();
    let announce_handle = tokio::spawn(async move {
        let mut interval =
            tokio::time::interval(Duration::from_secs(keys::GATEWAY_TTL.as_secs() / 3));
        loop {
            interval.tick().await;
            if let Err(e) = announce_world
                .announce_gateway(&announce_id, &announce_url)
                .await
            {
                tracing::warn!("gateway announce failed: {e}");
            }
        }
    });

    axum::serve(listener, app)
        .with_graceful_shutdown(shardgate::mapserver_runtime::shutdown_signal())
        .await
        .expect("server error");

    announce_handle.abort();
    tracing::info!("shutting down gateway '{}'", gw.gateway_id);
    if let Err(e) = world.retire_gateway(&gw.gateway_id).await {
        tracing::warn!("failed to retire gateway roster entry: {e}");
    }
}

async fn run_map_server(config: Config) {
    let ms = config
        .map_server
        .clone()
        .expect("map server config is required in mapserver mode");

    shardgate::mapserver_runtime::run(ms, config.port).await;
}

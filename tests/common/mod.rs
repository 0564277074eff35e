#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};
use http::{Method, Request, StatusCode};
use tower::util::ServiceExt;

use shardgate::account_client::AccountClient;
use shardgate::gateway::connections::ConnectionTable;
use shardgate::gateway::GatewayState;
use shardgate::models::character::{CharacterData, Position};
use shardgate::registry::MapRegistry;
use shardgate::session::SessionDirectory;
use shardgate::state::DirectoryState;
use shardgate::store::memory::MemoryStore;
use shardgate::takeover::SessionTakeover;
use shardgate::token::TokenSigner;
use shardgate::world_client::WorldClient;

pub const TEST_SECRET: &str = "test-secret";

pub fn signer() -> TokenSigner {
    TokenSigner::new(TEST_SECRET)
}

pub fn mint_token(user_id: &str, version: i64) -> String {
    signer().mint(user_id, version, Duration::from_secs(3600))
}

/// Directory service over a fresh in-memory store. Each instance is
/// isolated, safe for parallel tests.
pub struct TestDirectory {
    pub state: DirectoryState,
}

impl TestDirectory {
    pub fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        let sessions = Arc::new(SessionDirectory::new(
            store.clone(),
            Duration::from_secs(3600),
        ));
        let registry = Arc::new(MapRegistry::new(store));
        let takeover = Arc::new(SessionTakeover::new(sessions.clone()));
        Self {
            state: DirectoryState {
                sessions,
                registry,
                takeover,
            },
        }
    }

    pub fn router(&self) -> Router {
        shardgate::routes::router(self.state.clone())
    }

    /// Binds a listener on port 0, spawns the server, returns the base URL.
    pub async fn spawn(&self) -> String {
        spawn_router(self.router()).await
    }
}

/// Gateway wired to a (spawned) directory and account service.
pub struct TestGateway {
    pub state: GatewayState,
}

impl TestGateway {
    pub fn new(gateway_id: &str, directory_url: &str, account_url: &str) -> Self {
        Self {
            state: GatewayState {
                gateway_id: gateway_id.to_string(),
                connections: Arc::new(ConnectionTable::new()),
                world: Arc::new(WorldClient::new(directory_url.to_string())),
                account: Arc::new(AccountClient::new(account_url.to_string())),
                signer: Arc::new(signer()),
            },
        }
    }

    pub fn router(&self) -> Router {
        shardgate::gateway::router(self.state.clone())
    }

    pub async fn spawn(&self) -> String {
        spawn_router(self.router()).await
    }
}

pub async fn spawn_router(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://127.0.0.1:{}", addr.port())
}

pub fn character(id: &str, user_id: &str, map_id: i64) -> CharacterData {
    CharacterData {
        id: id.to_string(),
        user_id: user_id.to_string(),
        name: format!("{id}-hero"),
        level: 5,
        class_id: 2,
        map_id,
        position: Position { x: 12.0, y: -4.5 },
        stats: serde_json::json!({ "hp": 100, "mp": 50 }),
    }
}

/// Minimal stand-in for the account service's internal character endpoint.
pub async fn spawn_account_stub(characters: Vec<CharacterData>) -> String {
    let by_id: HashMap<String, CharacterData> = characters
        .into_iter()
        .map(|c| (c.id.clone(), c))
        .collect();

    async fn get_character(
        State(by_id): State<Arc<HashMap<String, CharacterData>>>,
        Path(id): Path<String>,
    ) -> Result<Json<CharacterData>, StatusCode> {
        by_id
            .get(&id)
            .cloned()
            .map(Json)
            .ok_or(StatusCode::NOT_FOUND)
    }

    let app = Router::new()
        .route("/characters/{id}/internal", get(get_character))
        .with_state(Arc::new(by_id));
    spawn_router(app).await
}

/// Drive a router in-process and return (status, parsed JSON body).
pub async fn request(
    app: &Router,
    method: Method,
    path: &str,
    body: Option<serde_json::Value>,
) -> (StatusCode, serde_json::Value) {
    let mut builder = Request::builder().method(method).uri(path);
    let body = match body {
        Some(json) => {
            builder = builder.header("content-type", "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };

    let response = app
        .clone()
        .oneshot(builder.body(body).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

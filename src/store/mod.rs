pub mod memory;

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;

/// Errors surfaced by a store backend. `Unavailable` covers transport-level
/// failures; `Corrupt` covers values that cannot be interpreted (e.g. a
/// non-numeric value under an `increment` key).
#[derive(Debug)]
pub enum StoreError {
    Unavailable(String),
    Corrupt(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Unavailable(msg) => write!(f, "store unavailable: {msg}"),
            StoreError::Corrupt(msg) => write!(f, "corrupt store value: {msg}"),
        }
    }
}

impl std::error::Error for StoreError {}

/// Ephemeral key-value store contract. Every operation is atomic per key;
/// nothing here assumes cross-key transactions. All liveness state in the
/// system lives behind this trait, which keeps the protocol logic independent
/// of the concrete backend and lets tests run against [`memory::MemoryStore`].
#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Set a value, replacing any previous value and TTL. `None` means the
    /// key never expires.
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), StoreError>;

    /// Delete a key. Deleting an absent key is not an error.
    async fn delete(&self, key: &str) -> Result<(), StoreError>;

    /// Reset the TTL of an existing key. Returns false (and does nothing) if
    /// the key is absent or already expired, so a lapsed entry can never be
    /// resurrected by a late refresh.
    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, StoreError>;

    async fn exists(&self, key: &str) -> Result<bool, StoreError>;

    /// Atomically increment an integer value, creating it at 0 first if
    /// absent, and return the new value. The first call on a fresh key
    /// returns 1. An existing TTL is preserved.
    async fn increment(&self, key: &str) -> Result<i64, StoreError>;

    /// List all live keys starting with `prefix`.
    async fn scan(&self, prefix: &str) -> Result<Vec<String>, StoreError>;
}

/// Key patterns and liveness windows shared by every component that touches
/// the store.
pub mod keys {
    use std::time::Duration;

    /// Map servers must heartbeat within this window or drop out of routing.
    pub const MAP_SERVER_TTL: Duration = Duration::from_secs(30);
    /// Safety net for sessions orphaned by a gateway crash.
    pub const USER_SESSION_TTL: Duration = Duration::from_secs(3600);
    /// Gateways re-announce frequently; a stale roster entry only delays kicks.
    pub const GATEWAY_TTL: Duration = Duration::from_secs(60);

    pub fn map_server(server_id: &str) -> String {
        format!("map_server:{server_id}")
    }

    pub fn map_allocation(map_id: i64) -> String {
        format!("map_allocation:{map_id}")
    }

    pub fn user_session(user_id: &str) -> String {
        format!("session:{user_id}")
    }

    pub fn gateway(gateway_id: &str) -> String {
        format!("gateway:{gateway_id}")
    }

    pub fn token_version(user_id: &str) -> String {
        format!("token_version:{user_id}")
    }
}

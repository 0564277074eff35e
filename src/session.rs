use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use crate::models::session::{GatewayRecord, UserSession};
use crate::store::{keys, KvStore, StoreError};

/// Presence registry plus the per-user token-version counter. Everything is
/// a thin protocol over the store's atomic per-key operations; the directory
/// holds no state of its own.
pub struct SessionDirectory {
    store: Arc<dyn KvStore>,
    token_ttl: Duration,
}

impl SessionDirectory {
    pub fn new(store: Arc<dyn KvStore>, token_ttl: Duration) -> Self {
        Self { store, token_ttl }
    }

    /// Record that a user is online on a gateway. Last writer wins: the
    /// takeover flow guarantees any prior connection is already torn down
    /// before a new login reaches this point.
    pub async fn set_online(&self, user_id: &str, gateway_id: &str) -> Result<(), StoreError> {
        let session = UserSession {
            user_id: user_id.to_string(),
            gateway_id: gateway_id.to_string(),
            established_at: Utc::now(),
        };
        let value = serde_json::to_string(&session)
            .map_err(|e| StoreError::Corrupt(format!("session encode: {e}")))?;
        self.store
            .set(
                &keys::user_session(user_id),
                &value,
                Some(keys::USER_SESSION_TTL),
            )
            .await?;
        tracing::info!("user {user_id} is now online on gateway {gateway_id}");
        Ok(())
    }

    /// Delete the presence record. Idempotent.
    pub async fn set_offline(&self, user_id: &str) -> Result<(), StoreError> {
        self.store.delete(&keys::user_session(user_id)).await?;
        tracing::info!("user {user_id} is now offline");
        Ok(())
    }

    pub async fn get_session(&self, user_id: &str) -> Result<Option<UserSession>, StoreError> {
        match self.store.get(&keys::user_session(user_id)).await? {
            Some(raw) => {
                let session = serde_json::from_str(&raw)
                    .map_err(|e| StoreError::Corrupt(format!("session decode: {e}")))?;
                Ok(Some(session))
            }
            None => Ok(None),
        }
    }

    /// Cheap liveness probe: key existence only, no deserialization.
    pub async fn is_online(&self, user_id: &str) -> Result<bool, StoreError> {
        self.store.exists(&keys::user_session(user_id)).await
    }

    /// Reset the session TTL if the session still exists. A session that
    /// already expired stays expired.
    pub async fn extend(&self, user_id: &str) -> Result<(), StoreError> {
        self.store
            .expire(&keys::user_session(user_id), keys::USER_SESSION_TTL)
            .await?;
        Ok(())
    }

    /// Bump the user's token version and return the new value. Called exactly
    /// once per successful login; the returned version is embedded in the
    /// freshly issued token, which invalidates every earlier token for this
    /// user regardless of whether the socket kick landed.
    pub async fn increment_token_version(&self, user_id: &str) -> Result<i64, StoreError> {
        let key = keys::token_version(user_id);
        let version = self.store.increment(&key).await?;
        self.store.expire(&key, self.token_ttl).await?;
        Ok(version)
    }

    pub async fn current_token_version(&self, user_id: &str) -> Result<Option<i64>, StoreError> {
        match self.store.get(&keys::token_version(user_id)).await? {
            Some(raw) => {
                let version = raw
                    .parse()
                    .map_err(|_| StoreError::Corrupt(format!("token version for {user_id}")))?;
                Ok(Some(version))
            }
            None => Ok(None),
        }
    }

    /// A token is valid when no version is stored (never-invalidated or
    /// expired counter) or when the stored version matches the presented one.
    pub async fn validate_token_version(
        &self,
        user_id: &str,
        presented: i64,
    ) -> Result<bool, StoreError> {
        Ok(match self.current_token_version(user_id).await? {
            None => true,
            Some(current) => current == presented,
        })
    }

    /// Operational query, not a hot path: O(online users).
    pub async fn online_count(&self) -> Result<usize, StoreError> {
        Ok(self.store.scan("session:").await?.len())
    }

    /// Record or refresh a gateway's roster entry.
    pub async fn announce_gateway(
        &self,
        gateway_id: &str,
        kick_url: &str,
    ) -> Result<(), StoreError> {
        let record = GatewayRecord {
            gateway_id: gateway_id.to_string(),
            kick_url: kick_url.to_string(),
            announced_at: Utc::now(),
        };
        let value = serde_json::to_string(&record)
            .map_err(|e| StoreError::Corrupt(format!("gateway record encode: {e}")))?;
        self.store
            .set(&keys::gateway(gateway_id), &value, Some(keys::GATEWAY_TTL))
            .await
    }

    pub async fn get_gateway(&self, gateway_id: &str) -> Result<Option<GatewayRecord>, StoreError> {
        match self.store.get(&keys::gateway(gateway_id)).await? {
            Some(raw) => {
                let record = serde_json::from_str(&raw)
                    .map_err(|e| StoreError::Corrupt(format!("gateway record decode: {e}")))?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    /// Graceful-shutdown path for a gateway; otherwise the roster entry
    /// lapses via TTL.
    pub async fn retire_gateway(&self, gateway_id: &str) -> Result<(), StoreError> {
        self.store.delete(&keys::gateway(gateway_id)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;

    fn directory() -> SessionDirectory {
        SessionDirectory::new(Arc::new(MemoryStore::new()), Duration::from_secs(3600))
    }

    #[tokio::test]
    async fn test_online_offline_roundtrip() {
        let dir = directory();
        assert!(!dir.is_online("u1").await.unwrap());

        dir.set_online("u1", "gw-1").await.unwrap();
        assert!(dir.is_online("u1").await.unwrap());

        let session = dir.get_session("u1").await.unwrap().unwrap();
        assert_eq!(session.user_id, "u1");
        assert_eq!(session.gateway_id, "gw-1");

        dir.set_offline("u1").await.unwrap();
        assert!(!dir.is_online("u1").await.unwrap());
        assert!(dir.get_session("u1").await.unwrap().is_none());

        // Offline twice is fine.
        dir.set_offline("u1").await.unwrap();
    }

    #[tokio::test]
    async fn test_set_online_overwrites_gateway() {
        let dir = directory();
        dir.set_online("u1", "gw-1").await.unwrap();
        dir.set_online("u1", "gw-2").await.unwrap();
        let session = dir.get_session("u1").await.unwrap().unwrap();
        assert_eq!(session.gateway_id, "gw-2");
        assert_eq!(dir.online_count().await.unwrap(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_session_expires_without_extend() {
        let dir = directory();
        dir.set_online("u1", "gw-1").await.unwrap();

        tokio::time::advance(Duration::from_secs(3500)).await;
        dir.extend("u1").await.unwrap();

        // Extended past the original deadline.
        tokio::time::advance(Duration::from_secs(200)).await;
        assert!(dir.is_online("u1").await.unwrap());

        tokio::time::advance(Duration::from_secs(3601)).await;
        assert!(!dir.is_online("u1").await.unwrap());

        // Extending a dead session must not resurrect it.
        dir.extend("u1").await.unwrap();
        assert!(!dir.is_online("u1").await.unwrap());
    }

    #[tokio::test]
    async fn test_token_version_strictly_increasing() {
        let dir = directory();
        let v1 = dir.increment_token_version("u1").await.unwrap();
        let v2 = dir.increment_token_version("u1").await.unwrap();
        let v3 = dir.increment_token_version("u1").await.unwrap();
        assert_eq!((v1, v2, v3), (1, 2, 3));

        // Counters are per user.
        assert_eq!(dir.increment_token_version("u2").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_validate_token_version() {
        let dir = directory();

        // No stored version: fail-permissive for never-invalidated tokens.
        assert!(dir.validate_token_version("u1", 7).await.unwrap());

        let v = dir.increment_token_version("u1").await.unwrap();
        assert!(dir.validate_token_version("u1", v).await.unwrap());
        assert!(!dir.validate_token_version("u1", v - 1).await.unwrap());

        let v2 = dir.increment_token_version("u1").await.unwrap();
        assert!(!dir.validate_token_version("u1", v).await.unwrap());
        assert!(dir.validate_token_version("u1", v2).await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_token_version_expires_with_token_lifetime() {
        let dir = directory();
        dir.increment_token_version("u1").await.unwrap();

        tokio::time::advance(Duration::from_secs(3601)).await;
        assert_eq!(dir.current_token_version("u1").await.unwrap(), None);
        // Absent again means any signed token passes the version check.
        assert!(dir.validate_token_version("u1", 1).await.unwrap());
    }

    #[tokio::test]
    async fn test_online_count() {
        let dir = directory();
        assert_eq!(dir.online_count().await.unwrap(), 0);
        dir.set_online("u1", "gw-1").await.unwrap();
        dir.set_online("u2", "gw-1").await.unwrap();
        dir.set_online("u3", "gw-2").await.unwrap();
        assert_eq!(dir.online_count().await.unwrap(), 3);
        dir.set_offline("u2").await.unwrap();
        assert_eq!(dir.online_count().await.unwrap(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_gateway_roster() {
        let dir = directory();
        dir.announce_gateway("gw-1", "http://gw-1:7301")
            .await
            .unwrap();
        let record = dir.get_gateway("gw-1").await.unwrap().unwrap();
        assert_eq!(record.kick_url, "http://gw-1:7301");

        dir.retire_gateway("gw-1").await.unwrap();
        assert!(dir.get_gateway("gw-1").await.unwrap().is_none());

        // Entries lapse on their own when announcements stop.
        dir.announce_gateway("gw-2", "http://gw-2:7301")
            .await
            .unwrap();
        tokio::time::advance(Duration::from_secs(61)).await;
        assert!(dir.get_gateway("gw-2").await.unwrap().is_none());
    }
}

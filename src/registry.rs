use std::fmt;
use std::sync::Arc;

use chrono::Utc;

use crate::models::server::{MapServerDescriptor, MapServerRecord};
use crate::store::{keys, KvStore, StoreError};

#[derive(Debug)]
pub enum RegistryError {
    /// Heartbeat from a server with no live record. The server must
    /// re-register before it is routable again.
    NotRegistered(String),
    Store(StoreError),
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistryError::NotRegistered(id) => {
                write!(f, "map server {id} not found, must register first")
            }
            RegistryError::Store(e) => write!(f, "{e}"),
        }
    }
}

impl From<StoreError> for RegistryError {
    fn from(e: StoreError) -> Self {
        RegistryError::Store(e)
    }
}

/// Heartbeat-based service discovery for map shards. A server is live exactly
/// while its record has not expired; there is no push-based failure detector.
pub struct MapRegistry {
    store: Arc<dyn KvStore>,
}

impl MapRegistry {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self { store }
    }

    /// Upsert a server record and one allocation entry per supported map.
    /// Re-registration overwrites cleanly.
    pub async fn register(
        &self,
        descriptor: MapServerDescriptor,
    ) -> Result<MapServerRecord, RegistryError> {
        let record = MapServerRecord::from_descriptor(descriptor);
        self.write_record(&record).await?;

        for map_id in &record.supported_maps {
            self.store
                .set(
                    &keys::map_allocation(*map_id),
                    &record.id,
                    Some(keys::MAP_SERVER_TTL),
                )
                .await?;
        }

        tracing::info!(
            "map server \"{}\" ({}) registered at {}:{}",
            record.name,
            record.id,
            record.host,
            record.port
        );
        Ok(record)
    }

    /// Refresh a server's mutable fields and re-arm the TTL on its record and
    /// every allocation it owns. An allocation that lapsed while the record
    /// stayed live is re-written, so a live server can never be left
    /// unroutable for a map it serves.
    pub async fn heartbeat(
        &self,
        server_id: &str,
        current_players: Option<i64>,
        load: Option<f64>,
    ) -> Result<(), RegistryError> {
        let mut record = self
            .find_server_by_id(server_id)
            .await?
            .ok_or_else(|| RegistryError::NotRegistered(server_id.to_string()))?;

        record.last_heartbeat = Utc::now();
        if let Some(players) = current_players {
            record.current_players = players;
        }
        if let Some(load) = load {
            record.load = load;
        }

        self.write_record(&record).await?;

        for map_id in &record.supported_maps {
            let key = keys::map_allocation(*map_id);
            if !self.store.expire(&key, keys::MAP_SERVER_TTL).await? {
                self.store
                    .set(&key, &record.id, Some(keys::MAP_SERVER_TTL))
                    .await?;
            }
        }

        tracing::debug!("heartbeat received from map server {server_id}");
        Ok(())
    }

    /// Two-step lookup: allocation, then record. Absence of either hop means
    /// "no live server currently serves this map", not an error.
    pub async fn find_server_for_map(
        &self,
        map_id: i64,
    ) -> Result<Option<MapServerRecord>, RegistryError> {
        let server_id = match self.store.get(&keys::map_allocation(map_id)).await? {
            Some(id) => id,
            None => return Ok(None),
        };
        self.find_server_by_id(&server_id).await
    }

    pub async fn find_server_by_id(
        &self,
        server_id: &str,
    ) -> Result<Option<MapServerRecord>, RegistryError> {
        match self.store.get(&keys::map_server(server_id)).await? {
            Some(raw) => {
                let record = serde_json::from_str(&raw)
                    .map_err(|e| StoreError::Corrupt(format!("server record decode: {e}")))?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    pub async fn list_all(&self) -> Result<Vec<MapServerRecord>, RegistryError> {
        let mut servers = Vec::new();
        for key in self.store.scan("map_server:").await? {
            if let Some(raw) = self.store.get(&key).await? {
                let record = serde_json::from_str(&raw)
                    .map_err(|e| StoreError::Corrupt(format!("server record decode: {e}")))?;
                servers.push(record);
            }
        }
        Ok(servers)
    }

    /// Graceful-shutdown path: drop the record and its allocations now
    /// instead of waiting for TTL expiry. Idempotent.
    pub async fn unregister(&self, server_id: &str) -> Result<(), RegistryError> {
        if let Some(record) = self.find_server_by_id(server_id).await? {
            for map_id in &record.supported_maps {
                self.store.delete(&keys::map_allocation(*map_id)).await?;
            }
        }
        self.store.delete(&keys::map_server(server_id)).await?;
        tracing::info!("map server {server_id} unregistered");
        Ok(())
    }

    async fn write_record(&self, record: &MapServerRecord) -> Result<(), StoreError> {
        let value = serde_json::to_string(record)
            .map_err(|e| StoreError::Corrupt(format!("server record encode: {e}")))?;
        self.store
            .set(
                &keys::map_server(&record.id),
                &value,
                Some(keys::MAP_SERVER_TTL),
            )
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;
    use std::time::Duration;

    fn registry() -> MapRegistry {
        MapRegistry::new(Arc::new(MemoryStore::new()))
    }

    fn descriptor(id: &str, maps: &[i64]) -> MapServerDescriptor {
        MapServerDescriptor {
            id: id.to_string(),
            name: format!("{id}-name"),
            host: "10.0.0.1".to_string(),
            port: 5500,
            supported_maps: maps.to_vec(),
            max_players: 100,
        }
    }

    #[tokio::test]
    async fn test_register_then_find_for_every_map() {
        let reg = registry();
        reg.register(descriptor("s1", &[1, 2])).await.unwrap();

        for map_id in [1, 2] {
            let server = reg.find_server_for_map(map_id).await.unwrap().unwrap();
            assert_eq!(server.id, "s1");
            assert_eq!(server.current_players, 0);
        }
        assert!(reg.find_server_for_map(3).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_heartbeat_before_register_fails() {
        let reg = registry();
        let err = reg.heartbeat("ghost", None, None).await.unwrap_err();
        assert!(matches!(err, RegistryError::NotRegistered(_)));
    }

    #[tokio::test]
    async fn test_heartbeat_updates_mutable_fields() {
        let reg = registry();
        reg.register(descriptor("s1", &[1])).await.unwrap();
        reg.heartbeat("s1", Some(42), Some(0.5)).await.unwrap();

        let server = reg.find_server_by_id("s1").await.unwrap().unwrap();
        assert_eq!(server.current_players, 42);
        assert_eq!(server.load, 0.5);

        // Omitted fields keep their previous values.
        reg.heartbeat("s1", None, None).await.unwrap();
        let server = reg.find_server_by_id("s1").await.unwrap().unwrap();
        assert_eq!(server.current_players, 42);
        assert_eq!(server.load, 0.5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_record_expires_without_heartbeat() {
        let reg = registry();
        reg.register(descriptor("s1", &[1])).await.unwrap();

        tokio::time::advance(Duration::from_secs(31)).await;
        assert!(reg.find_server_for_map(1).await.unwrap().is_none());
        assert!(reg.find_server_by_id("s1").await.unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_heartbeat_keeps_server_and_allocations_alive() {
        let reg = registry();
        reg.register(descriptor("s1", &[1, 2])).await.unwrap();

        // Three windows' worth of time, heartbeating every 10s.
        for _ in 0..9 {
            tokio::time::advance(Duration::from_secs(10)).await;
            reg.heartbeat("s1", None, None).await.unwrap();
        }

        assert_eq!(
            reg.find_server_for_map(1).await.unwrap().unwrap().id,
            "s1"
        );
        assert_eq!(
            reg.find_server_for_map(2).await.unwrap().unwrap().id,
            "s1"
        );
    }

    #[tokio::test]
    async fn test_unregister_removes_routes_immediately() {
        let reg = registry();
        reg.register(descriptor("s1", &[1, 2])).await.unwrap();
        assert_eq!(reg.find_server_for_map(1).await.unwrap().unwrap().id, "s1");

        reg.heartbeat("s1", None, None).await.unwrap();
        assert_eq!(reg.find_server_for_map(2).await.unwrap().unwrap().id, "s1");

        reg.unregister("s1").await.unwrap();
        assert!(reg.find_server_for_map(1).await.unwrap().is_none());
        assert!(reg.find_server_for_map(2).await.unwrap().is_none());
        assert!(reg.find_server_by_id("s1").await.unwrap().is_none());

        // Unregistering again is harmless.
        reg.unregister("s1").await.unwrap();
    }

    #[tokio::test]
    async fn test_reregistration_overwrites() {
        let reg = registry();
        reg.register(descriptor("s1", &[1])).await.unwrap();
        reg.heartbeat("s1", Some(10), None).await.unwrap();

        // Fresh registration resets counters and can change the map set.
        reg.register(descriptor("s1", &[2])).await.unwrap();
        let server = reg.find_server_by_id("s1").await.unwrap().unwrap();
        assert_eq!(server.current_players, 0);
        assert_eq!(server.supported_maps, vec![2]);
        assert_eq!(reg.find_server_for_map(2).await.unwrap().unwrap().id, "s1");
    }

    #[tokio::test]
    async fn test_list_all() {
        let reg = registry();
        reg.register(descriptor("s1", &[1])).await.unwrap();
        reg.register(descriptor("s2", &[2])).await.unwrap();

        let mut ids: Vec<String> = reg
            .list_all()
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.id)
            .collect();
        ids.sort();
        assert_eq!(ids, vec!["s1", "s2"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_heartbeat_restores_lapsed_allocation() {
        let store = Arc::new(MemoryStore::new());
        let reg = MapRegistry::new(store.clone());
        reg.register(descriptor("s1", &[1])).await.unwrap();

        // Simulate the allocation disappearing while the record is live
        // (e.g. clobbered by another server's unregister).
        use crate::store::KvStore;
        store.delete("map_allocation:1").await.unwrap();
        assert!(reg.find_server_for_map(1).await.unwrap().is_none());

        reg.heartbeat("s1", None, None).await.unwrap();
        assert_eq!(reg.find_server_for_map(1).await.unwrap().unwrap().id, "s1");
    }
}

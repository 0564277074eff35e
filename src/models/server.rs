use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Registration payload a map server submits to the directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MapServerDescriptor {
    pub id: String,
    pub name: String,
    pub host: String,
    pub port: u16,
    pub supported_maps: Vec<i64>,
    pub max_players: i64,
}

/// Live registry record for a map server. Mutable fields are refreshed on
/// every heartbeat; the record expires from the store if the heartbeat
/// window lapses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MapServerRecord {
    pub id: String,
    pub name: String,
    pub host: String,
    pub port: u16,
    pub supported_maps: Vec<i64>,
    pub max_players: i64,
    pub current_players: i64,
    pub load: f64,
    pub last_heartbeat: DateTime<Utc>,
}

impl MapServerRecord {
    pub fn from_descriptor(desc: MapServerDescriptor) -> Self {
        Self {
            id: desc.id,
            name: desc.name,
            host: desc.host,
            port: desc.port,
            supported_maps: desc.supported_maps,
            max_players: desc.max_players,
            current_players: 0,
            load: 0.0,
            last_heartbeat: Utc::now(),
        }
    }
}

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

/// Character data as served by the account service's internal endpoint.
/// Owned entirely by that service; the gateway only reads it to check
/// ownership and resolve the character's current map.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CharacterData {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub level: i64,
    pub class_id: i64,
    pub map_id: i64,
    pub position: Position,
    #[serde(default)]
    pub stats: serde_json::Value,
}

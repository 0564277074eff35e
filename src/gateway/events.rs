use serde::Deserialize;

/// Structured error codes sent back over the socket. Errors never close the
/// connection.
pub mod error_code {
    pub const FORBIDDEN: &str = "FORBIDDEN";
    pub const MAP_NOT_FOUND: &str = "MAP_NOT_FOUND";
    pub const INTERNAL_ERROR: &str = "INTERNAL_ERROR";
}

/// Close codes for connections that never reach (or lose) authenticated
/// state.
pub mod close_code {
    /// RFC 6455 policy violation: token missing, invalid or stale.
    pub const POLICY_VIOLATION: u16 = 1008;
    /// The session was taken over by a newer login.
    pub const SESSION_REPLACED: u16 = 4000;
}

/// Envelope for every client->gateway message.
#[derive(Debug, Deserialize)]
pub struct ClientEvent {
    pub event: String,
    pub data: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub struct EnterWorldData {
    pub character_id: String,
}

#[derive(Debug, Deserialize)]
pub struct JoinMapData {
    pub map_id: i64,
}

pub fn welcome_event() -> String {
    serde_json::json!({
        "event": "welcome",
        "data": { "message": "Connected to Gateway" }
    })
    .to_string()
}

pub fn error_event(code: &str, message: &str) -> String {
    serde_json::json!({
        "event": "error",
        "data": { "code": code, "message": message }
    })
    .to_string()
}

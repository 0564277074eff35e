use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Presence record for one live player connection. Exactly one of these may
/// exist per user; the takeover flow, not the store, enforces that.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserSession {
    pub user_id: String,
    pub gateway_id: String,
    pub established_at: DateTime<Utc>,
}

/// Roster entry a gateway periodically announces so the takeover flow can
/// find its internal kick endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayRecord {
    pub gateway_id: String,
    pub kick_url: String,
    pub announced_at: DateTime<Utc>,
}

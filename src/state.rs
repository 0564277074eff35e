use std::sync::Arc;

use crate::registry::MapRegistry;
use crate::session::SessionDirectory;
use crate::takeover::SessionTakeover;

/// Shared state for the directory service. All three collaborators sit on
/// the same injected store; nothing here is durable.
#[derive(Clone)]
pub struct DirectoryState {
    pub sessions: Arc<SessionDirectory>,
    pub registry: Arc<MapRegistry>,
    pub takeover: Arc<SessionTakeover>,
}

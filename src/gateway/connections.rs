use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::mpsc;

/// Handle to one live, authenticated connection. The identity fields are
/// fixed at authentication time; the handle's only capability afterwards is
/// delivering a kick signal to the socket task.
#[derive(Debug)]
pub struct ConnectionHandle {
    pub conn_id: String,
    pub user_id: String,
    pub established_at: DateTime<Utc>,
    kick_tx: mpsc::UnboundedSender<()>,
}

impl ConnectionHandle {
    pub fn new(conn_id: String, user_id: String, kick_tx: mpsc::UnboundedSender<()>) -> Self {
        Self {
            conn_id,
            user_id,
            established_at: Utc::now(),
            kick_tx,
        }
    }
}

/// Process-local lookup table for the kick endpoint, keyed by user id.
/// Inserting for a user replaces any previous handle, so a re-login through
/// the same gateway always targets the newest connection.
#[derive(Default)]
pub struct ConnectionTable {
    inner: DashMap<String, ConnectionHandle>,
}

impl ConnectionTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, handle: ConnectionHandle) {
        self.inner.insert(handle.user_id.clone(), handle);
    }

    /// Signal the user's connection on this process to close. Returns false
    /// when the user is not connected here or the socket task is already
    /// tearing down; both count as "nothing to kick".
    pub fn kick(&self, user_id: &str) -> bool {
        match self.inner.get(user_id) {
            Some(handle) => handle.kick_tx.send(()).is_ok(),
            None => false,
        }
    }

    /// Remove a connection's entry, but only if it is still the one that
    /// registered it. A late cleanup from a kicked connection must never
    /// evict the connection that replaced it.
    pub fn remove(&self, user_id: &str, conn_id: &str) {
        self.inner.remove_if(user_id, |_, h| h.conn_id == conn_id);
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

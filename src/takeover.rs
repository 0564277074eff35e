use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::session::SessionDirectory;

#[derive(Debug, Serialize)]
pub struct TakeoverOutcome {
    /// Whether a previous connection was actually force-closed. Best-effort
    /// information only; the version bump below is what invalidates the old
    /// token.
    pub kicked: bool,
    /// The new token version to embed in the freshly issued token.
    pub version: i64,
}

#[derive(Debug, Deserialize)]
struct KickResponse {
    status: String,
}

/// Single-session enforcement, invoked by the account service at login time.
/// Evicts any stale connection via the owning gateway's kick endpoint, then
/// bumps the token version so every earlier token is rejected on its next
/// validation even if the socket kick never landed.
pub struct SessionTakeover {
    sessions: Arc<SessionDirectory>,
    http: reqwest::Client,
}

impl SessionTakeover {
    pub fn new(sessions: Arc<SessionDirectory>) -> Self {
        Self {
            sessions,
            http: reqwest::Client::new(),
        }
    }

    pub async fn claim(&self, user_id: &str) -> Result<TakeoverOutcome, AppError> {
        let kicked = self.kick_previous(user_id).await;

        // This write is the correctness mechanism and must not be skipped or
        // swallowed: a failure here fails the whole takeover.
        let version = self.sessions.increment_token_version(user_id).await?;

        tracing::info!("takeover for user {user_id}: kicked={kicked}, version={version}");
        Ok(TakeoverOutcome { kicked, version })
    }

    /// Steps 1-3 of the kick flow. Every failure path logs and returns false:
    /// the recorded gateway may be gone, the user may have already
    /// disconnected, and login must not block on any of it.
    async fn kick_previous(&self, user_id: &str) -> bool {
        let session = match self.sessions.get_session(user_id).await {
            Ok(Some(session)) => session,
            Ok(None) => return false,
            Err(e) => {
                tracing::warn!("takeover: session lookup for {user_id} failed: {e}");
                return false;
            }
        };

        let gateway = match self.sessions.get_gateway(&session.gateway_id).await {
            Ok(Some(gateway)) => gateway,
            Ok(None) => {
                tracing::warn!(
                    "takeover: gateway {} holds a session for {user_id} but is not in the roster",
                    session.gateway_id
                );
                return false;
            }
            Err(e) => {
                tracing::warn!("takeover: roster lookup for {} failed: {e}", session.gateway_id);
                return false;
            }
        };

        let url = format!("{}/kick/{user_id}", gateway.kick_url);
        match self.http.post(&url).send().await {
            Ok(resp) if resp.status().is_success() => match resp.json::<KickResponse>().await {
                Ok(body) => body.status == "kicked",
                Err(e) => {
                    tracing::warn!("takeover: bad kick response from {url}: {e}");
                    false
                }
            },
            Ok(resp) => {
                tracing::warn!("takeover: kick at {url} returned {}", resp.status());
                false
            }
            Err(e) => {
                tracing::warn!("takeover: kick at {url} failed: {e}");
                false
            }
        }
    }
}

use std::fmt;

use reqwest::Client;
use serde_json::json;

use crate::models::server::MapServerRecord;

#[derive(Debug)]
pub enum WorldClientError {
    Http(reqwest::Error),
    ServerError { status: u16, body: String },
}

impl fmt::Display for WorldClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorldClientError::Http(e) => write!(f, "HTTP error: {e}"),
            WorldClientError::ServerError { status, body } => {
                write!(f, "directory returned {status}: {body}")
            }
        }
    }
}

impl From<reqwest::Error> for WorldClientError {
    fn from(e: reqwest::Error) -> Self {
        WorldClientError::Http(e)
    }
}

/// Gateway-side client for the world directory: presence writes, map
/// routing lookups, token-version reads and roster announcements.
pub struct WorldClient {
    client: Client,
    base_url: String,
}

impl WorldClient {
    pub fn new(base_url: String) -> Self {
        Self {
            client: Client::new(),
            base_url,
        }
    }

    pub async fn register_session(
        &self,
        user_id: &str,
        gateway_id: &str,
    ) -> Result<(), WorldClientError> {
        let url = format!("{}/session/online", self.base_url);
        let resp = self
            .client
            .post(&url)
            .json(&json!({ "user_id": user_id, "gateway_id": gateway_id }))
            .send()
            .await?;
        self.expect_success(resp).await?;
        Ok(())
    }

    pub async fn remove_session(&self, user_id: &str) -> Result<(), WorldClientError> {
        let url = format!("{}/session/{user_id}", self.base_url);
        let resp = self.client.delete(&url).send().await?;
        self.expect_success(resp).await?;
        Ok(())
    }

    /// Two outcomes matter to the caller: `Ok(None)` means no live server
    /// serves the map (surfaced as MAP_NOT_FOUND), `Err` means the lookup
    /// itself failed (surfaced as INTERNAL_ERROR).
    pub async fn get_map_server(
        &self,
        map_id: i64,
    ) -> Result<Option<MapServerRecord>, WorldClientError> {
        let url = format!("{}/map-registry/map/{map_id}", self.base_url);
        let resp = self.client.get(&url).send().await?;

        if resp.status().as_u16() == 404 {
            return Ok(None);
        }
        let resp = self.expect_success(resp).await?;
        Ok(Some(resp.json().await?))
    }

    /// Current token version for a user, `None` when no version is stored.
    pub async fn token_version(&self, user_id: &str) -> Result<Option<i64>, WorldClientError> {
        let url = format!("{}/session/{user_id}/token-version", self.base_url);
        let resp = self.client.get(&url).send().await?;
        let resp = self.expect_success(resp).await?;

        #[derive(serde::Deserialize)]
        struct VersionResponse {
            version: Option<i64>,
        }
        let body: VersionResponse = resp.json().await?;
        Ok(body.version)
    }

    pub async fn announce_gateway(
        &self,
        gateway_id: &str,
        kick_url: &str,
    ) -> Result<(), WorldClientError> {
        let url = format!("{}/gateway/announce", self.base_url);
        let resp = self
            .client
            .post(&url)
            .json(&json!({ "gateway_id": gateway_id, "kick_url": kick_url }))
            .send()
            .await?;
        self.expect_success(resp).await?;
        Ok(())
    }

    pub async fn retire_gateway(&self, gateway_id: &str) -> Result<(), WorldClientError> {
        let url = format!("{}/gateway/{gateway_id}", self.base_url);
        let resp = self.client.delete(&url).send().await?;
        self.expect_success(resp).await?;
        Ok(())
    }

    async fn expect_success(
        &self,
        resp: reqwest::Response,
    ) -> Result<reqwest::Response, WorldClientError> {
        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(WorldClientError::ServerError { status, body });
        }
        Ok(resp)
    }
}

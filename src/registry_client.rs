use std::fmt;

use reqwest::Client;
use serde_json::json;

use crate::models::server::MapServerDescriptor;

#[derive(Debug)]
pub enum RegistryClientError {
    Http(reqwest::Error),
    /// 404 on heartbeat: the directory no longer knows this server and a
    /// fresh registration is required.
    NotRegistered,
    ServerError { status: u16, body: String },
}

impl fmt::Display for RegistryClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistryClientError::Http(e) => write!(f, "HTTP error: {e}"),
            RegistryClientError::NotRegistered => write!(f, "server not registered"),
            RegistryClientError::ServerError { status, body } => {
                write!(f, "directory returned {status}: {body}")
            }
        }
    }
}

impl From<reqwest::Error> for RegistryClientError {
    fn from(e: reqwest::Error) -> Self {
        RegistryClientError::Http(e)
    }
}

/// Map-server-side client for the directory's registry endpoints.
pub struct RegistryClient {
    client: Client,
    base_url: String,
    descriptor: MapServerDescriptor,
}

impl RegistryClient {
    pub fn new(base_url: String, descriptor: MapServerDescriptor) -> Self {
        Self {
            client: Client::new(),
            base_url,
            descriptor,
        }
    }

    pub async fn register(&self) -> Result<(), RegistryClientError> {
        let url = format!("{}/map-registry/register", self.base_url);
        let resp = self.client.post(&url).json(&self.descriptor).send().await?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(RegistryClientError::ServerError { status, body });
        }
        Ok(())
    }

    pub async fn heartbeat(
        &self,
        current_players: i64,
        load: f64,
    ) -> Result<(), RegistryClientError> {
        let url = format!("{}/map-registry/heartbeat", self.base_url);
        let resp = self
            .client
            .post(&url)
            .json(&json!({
                "id": self.descriptor.id,
                "current_players": current_players,
                "load": load,
            }))
            .send()
            .await?;

        if resp.status().as_u16() == 404 {
            return Err(RegistryClientError::NotRegistered);
        }
        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(RegistryClientError::ServerError { status, body });
        }
        Ok(())
    }

    pub async fn deregister(&self) -> Result<(), RegistryClientError> {
        let url = format!(
            "{}/map-registry/server/{}",
            self.base_url, self.descriptor.id
        );
        let resp = self.client.delete(&url).send().await?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(RegistryClientError::ServerError { status, body });
        }
        Ok(())
    }
}

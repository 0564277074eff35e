use std::fmt;

use reqwest::Client;

use crate::models::character::CharacterData;

#[derive(Debug)]
pub enum AccountClientError {
    Http(reqwest::Error),
    /// The account service does not know this character.
    NotFound,
    ServerError { status: u16, body: String },
}

impl fmt::Display for AccountClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccountClientError::Http(e) => write!(f, "HTTP error: {e}"),
            AccountClientError::NotFound => write!(f, "character not found"),
            AccountClientError::ServerError { status, body } => {
                write!(f, "account service returned {status}: {body}")
            }
        }
    }
}

impl From<reqwest::Error> for AccountClientError {
    fn from(e: reqwest::Error) -> Self {
        AccountClientError::Http(e)
    }
}

/// Gateway-side client for the account service's internal character
/// endpoint. Character persistence and ownership live entirely on that
/// side; the gateway only reads.
pub struct AccountClient {
    client: Client,
    base_url: String,
}

impl AccountClient {
    pub fn new(base_url: String) -> Self {
        Self {
            client: Client::new(),
            base_url,
        }
    }

    pub async fn get_character(
        &self,
        character_id: &str,
    ) -> Result<CharacterData, AccountClientError> {
        let url = format!("{}/characters/{character_id}/internal", self.base_url);
        let resp = self.client.get(&url).send().await?;

        if resp.status().as_u16() == 404 {
            return Err(AccountClientError::NotFound);
        }
        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(AccountClientError::ServerError { status, body });
        }

        Ok(resp.json().await?)
    }
}

use std::fmt;
use std::time::Duration;

use data_encoding::BASE64URL_NOPAD;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// How long a map-handoff ticket stays valid. Long enough to connect to the
/// shard, short enough that a leaked ticket is useless.
pub const TICKET_TTL: Duration = Duration::from_secs(30);

#[derive(Debug, PartialEq)]
pub enum TokenError {
    Malformed,
    BadSignature,
    Expired,
}

impl fmt::Display for TokenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenError::Malformed => write!(f, "malformed token"),
            TokenError::BadSignature => write!(f, "bad token signature"),
            TokenError::Expired => write!(f, "token expired"),
        }
    }
}

/// Claims carried by a session bearer token. `ver` is the per-user token
/// version; a token is only accepted while it matches the directory's
/// current version for that user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub ver: i64,
    pub exp: i64,
}

/// Claims carried by a map-handoff ticket, presented by the client to the
/// map server it was routed to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TicketClaims {
    pub sub: String,
    pub map: i64,
    pub exp: i64,
}

/// HMAC-SHA256 signer shared by the account service (minting), gateways
/// (verification, ticket minting) and map servers (ticket verification).
/// Tokens are `base64url(payload) "." base64url(mac)`.
#[derive(Clone)]
pub struct TokenSigner {
    secret: Vec<u8>,
}

impl TokenSigner {
    pub fn new(secret: &str) -> Self {
        Self {
            secret: secret.as_bytes().to_vec(),
        }
    }

    pub fn mint(&self, user_id: &str, version: i64, ttl: Duration) -> String {
        let claims = Claims {
            sub: user_id.to_string(),
            ver: version,
            exp: chrono::Utc::now().timestamp() + ttl.as_secs() as i64,
        };
        self.sign(&claims)
    }

    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        self.open(token)
    }

    pub fn mint_ticket(&self, user_id: &str, map_id: i64) -> String {
        let claims = TicketClaims {
            sub: user_id.to_string(),
            map: map_id,
            exp: chrono::Utc::now().timestamp() + TICKET_TTL.as_secs() as i64,
        };
        self.sign(&claims)
    }

    pub fn verify_ticket(&self, ticket: &str) -> Result<TicketClaims, TokenError> {
        self.open(ticket)
    }

    fn sign<T: Serialize>(&self, claims: &T) -> String {
        // Claims are plain structs of strings and integers; encoding them
        // cannot fail.
        let payload = serde_json::to_vec(claims).unwrap_or_default();
        let encoded = BASE64URL_NOPAD.encode(&payload);
        let mac = self.mac_of(encoded.as_bytes());
        format!("{encoded}.{}", BASE64URL_NOPAD.encode(&mac))
    }

    fn open<T: for<'de> Deserialize<'de> + ExpiringClaims>(
        &self,
        token: &str,
    ) -> Result<T, TokenError> {
        let (payload, sig) = token.split_once('.').ok_or(TokenError::Malformed)?;
        let sig = BASE64URL_NOPAD
            .decode(sig.as_bytes())
            .map_err(|_| TokenError::Malformed)?;

        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .expect("HMAC accepts keys of any length");
        mac.update(payload.as_bytes());
        mac.verify_slice(&sig)
            .map_err(|_| TokenError::BadSignature)?;

        let payload = BASE64URL_NOPAD
            .decode(payload.as_bytes())
            .map_err(|_| TokenError::Malformed)?;
        let claims: T = serde_json::from_slice(&payload).map_err(|_| TokenError::Malformed)?;

        if claims.exp() <= chrono::Utc::now().timestamp() {
            return Err(TokenError::Expired);
        }
        Ok(claims)
    }

    fn mac_of(&self, data: &[u8]) -> Vec<u8> {
        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .expect("HMAC accepts keys of any length");
        mac.update(data);
        mac.finalize().into_bytes().to_vec()
    }
}

trait ExpiringClaims {
    fn exp(&self) -> i64;
}

impl ExpiringClaims for Claims {
    fn exp(&self) -> i64 {
        self.exp
    }
}

impl ExpiringClaims for TicketClaims {
    fn exp(&self) -> i64 {
        self.exp
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mint_verify_roundtrip() {
        let signer = TokenSigner::new("secret");
        let token = signer.mint("u1", 3, Duration::from_secs(60));
        let claims = signer.verify(&token).unwrap();
        assert_eq!(claims.sub, "u1");
        assert_eq!(claims.ver, 3);
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let token = TokenSigner::new("secret-a").mint("u1", 1, Duration::from_secs(60));
        let err = TokenSigner::new("secret-b").verify(&token).unwrap_err();
        assert_eq!(err, TokenError::BadSignature);
    }

    #[test]
    fn test_tampered_payload_rejected() {
        let signer = TokenSigner::new("secret");
        let token = signer.mint("u1", 1, Duration::from_secs(60));
        let (_, sig) = token.split_once('.').unwrap();

        let forged_payload = BASE64URL_NOPAD
            .encode(br#"{"sub":"u1","ver":99,"exp":9999999999}"#);
        let forged = format!("{forged_payload}.{sig}");
        assert_eq!(signer.verify(&forged).unwrap_err(), TokenError::BadSignature);
    }

    #[test]
    fn test_expired_token_rejected() {
        let signer = TokenSigner::new("secret");
        let token = signer.mint("u1", 1, Duration::from_secs(0));
        assert_eq!(signer.verify(&token).unwrap_err(), TokenError::Expired);
    }

    #[test]
    fn test_garbage_rejected() {
        let signer = TokenSigner::new("secret");
        assert_eq!(signer.verify("not-a-token").unwrap_err(), TokenError::Malformed);
        assert_eq!(signer.verify("a.b.c").unwrap_err(), TokenError::Malformed);
        assert_eq!(signer.verify("").unwrap_err(), TokenError::Malformed);
    }

    #[test]
    fn test_ticket_roundtrip() {
        let signer = TokenSigner::new("secret");
        let ticket = signer.mint_ticket("u1", 7);
        let claims = signer.verify_ticket(&ticket).unwrap();
        assert_eq!(claims.sub, "u1");
        assert_eq!(claims.map, 7);
    }

    #[test]
    fn test_session_token_is_not_a_ticket() {
        let signer = TokenSigner::new("secret");
        let token = signer.mint("u1", 1, Duration::from_secs(60));
        // A session token lacks the `map` claim and must not open as a ticket.
        assert_eq!(
            signer.verify_ticket(&token).unwrap_err(),
            TokenError::Malformed
        );
    }
}

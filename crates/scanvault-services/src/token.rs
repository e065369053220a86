//! Short-lived signed download tokens (HS256 JWT).
//!
//! A token grants access to exactly one file until its expiry. Tokens are
//! bearer credentials; nothing about them is stored server-side, so they
//! cannot be revoked before expiry.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const TOKEN_KIND: &str = "download";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("Download token has expired")]
    Expired,
    #[error("Invalid download token")]
    Invalid,
}

#[derive(Debug, Serialize, Deserialize)]
struct DownloadClaims {
    file_id: Uuid,
    iat: i64,
    exp: i64,
    #[serde(rename = "type")]
    kind: String,
}

#[derive(Clone)]
pub struct DownloadTokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl: Duration,
}

impl DownloadTokenService {
    pub fn new(secret: &str, ttl_secs: i64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            ttl: Duration::seconds(ttl_secs),
        }
    }

    /// Issue a token for the file, returning it with its expiry time.
    pub fn issue(&self, file_id: Uuid) -> Result<(String, DateTime<Utc>), TokenError> {
        let now = Utc::now();
        let expires_at = now + self.ttl;
        let claims = DownloadClaims {
            file_id,
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
            kind: TOKEN_KIND.to_string(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|_| TokenError::Invalid)?;
        Ok((token, expires_at))
    }

    /// Verify a token's signature, expiry, and kind; returns the file id.
    pub fn verify(&self, token: &str) -> Result<Uuid, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp"]);

        let data = decode::<DownloadClaims>(token, &self.decoding_key, &validation).map_err(
            |e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Invalid,
            },
        )?;

        if data.claims.kind != TOKEN_KIND {
            return Err(TokenError::Invalid);
        }

        // The library accepts `exp == now`; a token is invalid AT its expiry.
        if data.claims.exp <= Utc::now().timestamp() {
            return Err(TokenError::Expired);
        }

        Ok(data.claims.file_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let service = DownloadTokenService::new("test-secret", 3600);
        let file_id = Uuid::new_v4();

        let (token, expires_at) = service.issue(file_id).unwrap();
        assert!(expires_at > Utc::now());
        assert_eq!(service.verify(&token).unwrap(), file_id);
    }

    #[test]
    fn expired_token_rejected() {
        let service = DownloadTokenService::new("test-secret", -60);
        let (token, _) = service.issue(Uuid::new_v4()).unwrap();
        assert_eq!(service.verify(&token).unwrap_err(), TokenError::Expired);
    }

    #[test]
    fn token_rejected_at_exact_expiry() {
        // ttl 0 puts `exp` at (or just behind) the current second.
        let service = DownloadTokenService::new("test-secret", 0);
        let (token, _) = service.issue(Uuid::new_v4()).unwrap();
        assert_eq!(service.verify(&token).unwrap_err(), TokenError::Expired);
    }

    #[test]
    fn wrong_secret_rejected() {
        let issuer = DownloadTokenService::new("secret-a", 3600);
        let verifier = DownloadTokenService::new("secret-b", 3600);

        let (token, _) = issuer.issue(Uuid::new_v4()).unwrap();
        assert_eq!(verifier.verify(&token).unwrap_err(), TokenError::Invalid);
    }

    #[test]
    fn tampered_token_rejected() {
        let service = DownloadTokenService::new("test-secret", 3600);
        let (token, _) = service.issue(Uuid::new_v4()).unwrap();

        let mut tampered = token.clone();
        tampered.pop();
        tampered.push(if token.ends_with('a') { 'b' } else { 'a' });
        assert_eq!(service.verify(&tampered).unwrap_err(), TokenError::Invalid);
    }

    #[test]
    fn garbage_token_rejected() {
        let service = DownloadTokenService::new("test-secret", 3600);
        assert_eq!(
            service.verify("not-a-jwt").unwrap_err(),
            TokenError::Invalid
        );
    }
}

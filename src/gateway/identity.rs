//! Identity token verification.
//!
//! Tokens are RS256 JWTs issued by the identity provider. Signing keys are
//! fetched as a JWK set and cached; an unknown key id forces a refetch, at
//! most once per `MIN_REFETCH_INTERVAL`.

use async_trait::async_trait;
use jsonwebtoken::{decode, decode_header, jwk::JwkSet, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

use super::GatewayError;

const JWKS_URL: &str =
    "https://www.googleapis.com/service_accounts/v1/jwk/securetoken@system.gserviceaccount.com";

const KEYS_TTL: Duration = Duration::from_secs(3600);

/// Unknown key ids within this window of the last fetch are rejected
/// without asking the provider again.
const MIN_REFETCH_INTERVAL: Duration = Duration::from_secs(60);

/// Verified claims of an identity token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityClaims {
    pub sub: String,
    #[serde(default)]
    pub email: Option<String>,
    /// Custom claim carrying the admin role.
    #[serde(default)]
    pub admin: bool,
    #[serde(default)]
    pub exp: i64,
    #[serde(default)]
    pub iat: i64,
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Invalid or expired token: {0}")]
    InvalidToken(#[from] jsonwebtoken::errors::Error),

    #[error("Invalid token: missing key id")]
    MissingKeyId,

    #[error("Invalid token: unknown signing key {0}")]
    UnknownKey(String),

    #[error("Invalid token: missing subject")]
    MissingSubject,

    #[error("failed to fetch signing keys: {0}")]
    KeyFetch(#[from] reqwest::Error),

    #[error(transparent)]
    Unavailable(GatewayError),
}

#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    async fn verify_token(&self, token: &str) -> Result<IdentityClaims, AuthError>;
}

struct CachedKeys {
    keys: JwkSet,
    fetched_at: Instant,
}

pub struct FirebaseIdentity {
    project_id: String,
    http: reqwest::Client,
    keys: RwLock<Option<CachedKeys>>,
}

impl FirebaseIdentity {
    pub fn new(project_id: &str, http: reqwest::Client) -> Self {
        Self {
            project_id: project_id.to_string(),
            http,
            keys: RwLock::new(None),
        }
    }

    fn validation(&self) -> Validation {
        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_audience(&[self.project_id.as_str()]);
        validation.set_issuer(&[format!("https://securetoken.google.com/{}", self.project_id)]);
        validation
    }

    async fn decoding_key(&self, kid: &str) -> Result<DecodingKey, AuthError> {
        {
            let cached = self.keys.read().await;
            if let Some(cached) = cached.as_ref() {
                let age = cached.fetched_at.elapsed();
                if age < KEYS_TTL {
                    if let Some(jwk) = cached.keys.find(kid) {
                        return Ok(DecodingKey::from_jwk(jwk)?);
                    }
                }
                if age < MIN_REFETCH_INTERVAL {
                    return Err(AuthError::UnknownKey(kid.to_string()));
                }
            }
        }

        let keys: JwkSet = self
            .http
            .get(JWKS_URL)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        tracing::debug!(count = keys.keys.len(), "identity signing keys refreshed");

        let key = keys
            .find(kid)
            .map(DecodingKey::from_jwk)
            .transpose()?
            .ok_or_else(|| AuthError::UnknownKey(kid.to_string()));

        *self.keys.write().await = Some(CachedKeys {
            keys,
            fetched_at: Instant::now(),
        });

        key
    }
}

#[async_trait]
impl IdentityVerifier for FirebaseIdentity {
    async fn verify_token(&self, token: &str) -> Result<IdentityClaims, AuthError> {
        let header = decode_header(token)?;
        let kid = header.kid.ok_or(AuthError::MissingKeyId)?;
        let key = self.decoding_key(&kid).await?;

        let claims = decode::<IdentityClaims>(token, &key, &self.validation())?.claims;
        if claims.sub.is_empty() {
            return Err(AuthError::MissingSubject);
        }
        Ok(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_malformed_token_is_rejected_before_key_fetch() {
        let identity = FirebaseIdentity::new("demo-project", reqwest::Client::new());
        let err = identity.verify_token("not.a.jwt").await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidToken(_)));
    }

    #[tokio::test]
    async fn test_unknown_key_within_refetch_interval_skips_provider() {
        // The client points nowhere, so any fetch would surface as KeyFetch.
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(50))
            .build()
            .unwrap();
        let identity = FirebaseIdentity::new("demo-project", http);
        *identity.keys.write().await = Some(CachedKeys {
            keys: JwkSet { keys: Vec::new() },
            fetched_at: Instant::now(),
        });

        for _ in 0..3 {
            let err = identity.decoding_key("forged-kid").await.err().unwrap();
            assert!(matches!(err, AuthError::UnknownKey(ref kid) if kid == "forged-kid"));
        }
    }

    #[test]
    fn test_claims_default_to_non_admin() {
        let claims: IdentityClaims =
            serde_json::from_value(serde_json::json!({ "sub": "uid-1" })).unwrap();
        assert!(!claims.admin);
        assert!(claims.email.is_none());
    }

    #[test]
    fn test_validation_pins_audience_and_issuer() {
        let identity = FirebaseIdentity::new("demo-project", reqwest::Client::new());
        let validation = identity.validation();
        assert_eq!(validation.algorithms, vec![Algorithm::RS256]);
        assert!(validation
            .iss
            .as_ref()
            .map(|iss| iss.contains("https://securetoken.google.com/demo-project"))
            .unwrap_or(false));
    }
}

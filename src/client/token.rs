//! Access tokens for the control-plane API.
//!
//! Tokens come from the OAuth2 client-credentials endpoint and are cached
//! until shortly before they expire.

use std::time::{Duration, Instant};

use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::ProviderError;

/// Path of the token endpoint, relative to the control-plane base URL.
pub const TOKEN_PATH: &str = "/v1/users/oidc/token";

/// Tokens are renewed this long before they actually expire.
const TOKEN_EXPIRY_BUFFER: Duration = Duration::from_secs(60);

/// Lifetime assumed when the endpoint omits `expires_in`.
const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    token_type: Option<String>,
    #[serde(default)]
    expires_in: Option<u64>,
}

#[derive(Clone)]
struct CachedToken {
    access_token: String,
    /// Expiry with the buffer already applied.
    expires_at: Instant,
}

impl CachedToken {
    fn is_valid(&self) -> bool {
        Instant::now() < self.expires_at
    }
}

/// Client-credentials token source with an in-memory cache.
pub struct TokenSource {
    http: reqwest::Client,
    token_url: String,
    client_id: String,
    client_secret: String,
    cache: RwLock<Option<CachedToken>>,
}

impl std::fmt::Debug for TokenSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSource")
            .field("token_url", &self.token_url)
            .field("client_id", &self.client_id)
            .finish_non_exhaustive()
    }
}

impl TokenSource {
    /// Create a token source for the given control-plane base URL.
    pub fn new(
        http: reqwest::Client,
        base_url: &str,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        Self {
            http,
            token_url: format!("{}{}", base_url, TOKEN_PATH),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            cache: RwLock::new(None),
        }
    }

    /// Return a valid access token, fetching a new one when the cached token
    /// is missing or about to expire.
    pub async fn token(&self) -> Result<String, ProviderError> {
        {
            let cache = self.cache.read().await;
            if let Some(cached) = cache.as_ref().filter(|c| c.is_valid()) {
                return Ok(cached.access_token.clone());
            }
        }

        let mut cache = self.cache.write().await;
        // Another task may have renewed it while we waited for the lock.
        if let Some(cached) = cache.as_ref().filter(|c| c.is_valid()) {
            return Ok(cached.access_token.clone());
        }

        let fresh = self.fetch().await?;
        let token = fresh.access_token.clone();
        *cache = Some(fresh);
        Ok(token)
    }

    /// Drop the cached token so the next call fetches a new one.
    pub async fn invalidate(&self) {
        *self.cache.write().await = None;
    }

    async fn fetch(&self) -> Result<CachedToken, ProviderError> {
        debug!("Requesting access token from {}", self.token_url);

        let response = self
            .http
            .post(&self.token_url)
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
            ])
            .send()
            .await
            .map_err(|e| ProviderError::Authentication(format!("token request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::Authentication(format!(
                "token endpoint returned status code {}",
                status.as_u16()
            )));
        }

        let body: TokenResponse = response.json().await.map_err(|e| {
            ProviderError::Authentication(format!("invalid token response: {}", e))
        })?;

        if let Some(kind) = body.token_type.as_deref() {
            if !kind.eq_ignore_ascii_case("bearer") {
                return Err(ProviderError::Authentication(format!(
                    "unsupported token type '{}'",
                    kind
                )));
            }
        }

        let lifetime = body
            .expires_in
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_TOKEN_TTL);
        let expires_at = Instant::now() + lifetime.saturating_sub(TOKEN_EXPIRY_BUFFER);

        debug!("New token cached, expires in ~{}s", lifetime.as_secs());

        Ok(CachedToken {
            access_token: body.access_token,
            expires_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cached_token_validity() {
        let valid = CachedToken {
            access_token: "t".to_string(),
            expires_at: Instant::now() + Duration::from_secs(30),
        };
        assert!(valid.is_valid());

        let expired = CachedToken {
            access_token: "t".to_string(),
            expires_at: Instant::now(),
        };
        assert!(!expired.is_valid());
    }

    #[test]
    fn test_token_url_and_debug_hide_secret() {
        let source = TokenSource::new(
            reqwest::Client::new(),
            "https://tenant.app.cyral.com",
            "client",
            "very-secret",
        );
        assert_eq!(
            source.token_url,
            "https://tenant.app.cyral.com/v1/users/oidc/token"
        );
        assert!(!format!("{:?}", source).contains("very-secret"));
    }

    #[test]
    fn test_token_response_defaults() {
        let body: TokenResponse = serde_json::from_str(r#"{"access_token":"abc"}"#).unwrap();
        assert_eq!(body.access_token, "abc");
        assert!(body.token_type.is_none());
        assert!(body.expires_in.is_none());
    }
}

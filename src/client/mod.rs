//! HTTP client for the Cyral control-plane API.

mod token;

pub use token::{TokenSource, TOKEN_PATH};

pub use reqwest::Method;
use serde_json::Value;
use tracing::{debug, error};

use crate::config::ClientConfig;
use crate::error::{HttpError, ProviderError};

/// Maximum length of a response body written to the log.
const MAX_LOG_BODY_LENGTH: usize = 200;

/// Truncate a response body and strip control characters before logging it.
fn sanitize_for_log(body: &str) -> String {
    let truncated = if body.len() > MAX_LOG_BODY_LENGTH {
        let mut end = MAX_LOG_BODY_LENGTH;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}... [truncated, {} bytes total]", &body[..end], body.len())
    } else {
        body.to_string()
    };

    truncated.replace(|c: char| c.is_control(), "")
}

/// Base URL for a control-plane address. Addresses that already carry a
/// scheme are used as given.
pub fn base_url_for(control_plane: &str) -> String {
    let trimmed = control_plane.trim_end_matches('/');
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("https://{}", trimmed)
    }
}

/// Authenticated control-plane client.
#[derive(Debug)]
pub struct Client {
    http: reqwest::Client,
    control_plane: String,
    base_url: String,
    tokens: TokenSource,
}

impl Client {
    /// Build a client from resolved provider settings.
    pub fn new(config: &ClientConfig) -> Result<Self, ProviderError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("terraform-provider-cyral/", env!("CARGO_PKG_VERSION")))
            .danger_accept_invalid_certs(config.tls_skip_verify)
            .build()?;

        let base_url = base_url_for(&config.control_plane);
        let tokens = TokenSource::new(
            http.clone(),
            &base_url,
            config.client_id.clone(),
            config.client_secret.clone(),
        );

        Ok(Self {
            http,
            control_plane: config.control_plane.clone(),
            base_url,
            tokens,
        })
    }

    /// Control-plane address as configured.
    pub fn control_plane(&self) -> &str {
        &self.control_plane
    }

    /// Scheme and authority every request goes to.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Absolute URL for an API path such as `/v1/repos`.
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// The token source used by this client.
    pub fn tokens(&self) -> &TokenSource {
        &self.tokens
    }

    /// Issue one request and return the raw response body.
    ///
    /// Any status outside 2xx becomes [`HttpError`] carrying the status code
    /// and the response body.
    pub async fn do_request(
        &self,
        url: &str,
        method: Method,
        body: Option<&Value>,
    ) -> Result<Vec<u8>, ProviderError> {
        debug!("{} {}", method, url);

        let token = self.tokens.token().await?;
        let mut request = self.http.request(method.clone(), url).bearer_auth(token);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();
        let bytes = response.bytes().await?.to_vec();

        if !status.is_success() {
            let text = String::from_utf8_lossy(&bytes).into_owned();
            error!(
                "{} {} failed: {} - {}",
                method,
                url,
                status,
                sanitize_for_log(&text)
            );
            if status == reqwest::StatusCode::UNAUTHORIZED {
                self.tokens.invalidate().await;
            }
            let message = if text.is_empty() {
                status
                    .canonical_reason()
                    .unwrap_or("request failed")
                    .to_string()
            } else {
                text
            };
            return Err(HttpError::new(status.as_u16(), message).into());
        }

        Ok(bytes)
    }
}

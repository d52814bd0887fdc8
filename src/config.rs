//! Provider configuration.
//!
//! The provider block carries the control-plane address and the API client
//! credentials. Each field falls back to an environment variable when the
//! configuration leaves it unset.

use serde::Deserialize;
use serde_json::Value;

use crate::error::ProviderError;
use crate::schema::{Attribute, Schema};

/// Environment variable for `client_id`.
pub const ENV_CLIENT_ID: &str = "CYRAL_TF_CLIENT_ID";
/// Environment variable for `client_secret`.
pub const ENV_CLIENT_SECRET: &str = "CYRAL_TF_CLIENT_SECRET";
/// Environment variable for `control_plane`.
pub const ENV_CONTROL_PLANE: &str = "CYRAL_TF_CONTROL_PLANE";
/// Environment variable for `tls_skip_verify`.
pub const ENV_TLS_SKIP_VERIFY: &str = "CYRAL_TF_TLS_SKIP_VERIFY";

/// Provider block as written by the user, before env fallbacks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ProviderConfig {
    /// API client ID.
    #[serde(default)]
    pub client_id: Option<String>,
    /// API client secret.
    #[serde(default)]
    pub client_secret: Option<String>,
    /// Control plane address, `host[:port]`.
    #[serde(default)]
    pub control_plane: Option<String>,
    /// Skip TLS certificate verification.
    #[serde(default)]
    pub tls_skip_verify: Option<bool>,
}

/// Fully resolved settings needed to build a [`crate::client::Client`].
#[derive(Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// API client ID.
    pub client_id: String,
    /// API client secret.
    pub client_secret: String,
    /// Control plane address.
    pub control_plane: String,
    /// Skip TLS certificate verification.
    pub tls_skip_verify: bool,
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("control_plane", &self.control_plane)
            .field("tls_skip_verify", &self.tls_skip_verify)
            .finish()
    }
}

impl ProviderConfig {
    /// Decode the provider block. `null` is an empty block.
    pub fn from_value(config: &Value) -> Result<Self, ProviderError> {
        if config.is_null() {
            return Ok(Self::default());
        }
        Ok(serde_json::from_value(config.clone())?)
    }

    /// Fill unset fields from the process environment.
    pub fn with_env(self) -> Self {
        self.with_env_from(|key| std::env::var(key).ok())
    }

    /// Fill unset fields using the given lookup. Values already present in
    /// configuration are kept.
    pub fn with_env_from<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.is_empty());

        if self.client_id.is_none() {
            self.client_id = non_empty(ENV_CLIENT_ID);
        }
        if self.client_secret.is_none() {
            self.client_secret = non_empty(ENV_CLIENT_SECRET);
        }
        if self.control_plane.is_none() {
            self.control_plane = non_empty(ENV_CONTROL_PLANE);
        }
        if self.tls_skip_verify.is_none() {
            self.tls_skip_verify = non_empty(ENV_TLS_SKIP_VERIFY).and_then(|v| parse_bool(&v));
        }
        self
    }

    /// Check that every required setting is present.
    pub fn resolve(self) -> Result<ClientConfig, ProviderError> {
        let mut missing = Vec::new();
        if self.client_id.is_none() {
            missing.push(format!("client_id ({})", ENV_CLIENT_ID));
        }
        if self.client_secret.is_none() {
            missing.push(format!("client_secret ({})", ENV_CLIENT_SECRET));
        }
        if self.control_plane.is_none() {
            missing.push(format!("control_plane ({})", ENV_CONTROL_PLANE));
        }

        match (self.client_id, self.client_secret, self.control_plane) {
            (Some(client_id), Some(client_secret), Some(control_plane)) => Ok(ClientConfig {
                client_id,
                client_secret,
                control_plane,
                tls_skip_verify: self.tls_skip_verify.unwrap_or(false),
            }),
            _ => Err(ProviderError::Configuration(format!(
                "missing provider settings: {}",
                missing.join(", ")
            ))),
        }
    }

    /// Schema of the provider block.
    pub fn schema() -> Schema {
        Schema::v0()
            .with_description("Cyral control plane connection settings.")
            .with_attribute(
                "client_id",
                Attribute::optional_string()
                    .sensitive()
                    .with_description(format!("API client ID. Falls back to `{}`.", ENV_CLIENT_ID)),
            )
            .with_attribute(
                "client_secret",
                Attribute::optional_string().sensitive().with_description(format!(
                    "API client secret. Falls back to `{}`.",
                    ENV_CLIENT_SECRET
                )),
            )
            .with_attribute(
                "control_plane",
                Attribute::optional_string().with_description(format!(
                    "Control plane host and optional port, e.g. `tenant.app.cyral.com`. Falls back to `{}`.",
                    ENV_CONTROL_PLANE
                )),
            )
            .with_attribute(
                "tls_skip_verify",
                Attribute::optional_bool().with_description(format!(
                    "Skip TLS certificate verification. Falls back to `{}`.",
                    ENV_TLS_SKIP_VERIFY
                )),
            )
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" => Some(true),
        "false" | "0" => Some(false),
        _ => None,
    }
}

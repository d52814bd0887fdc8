//! Policies for failed HTTP steps.

use async_trait::async_trait;
use tracing::info;

use crate::client::Client;
use crate::error::ProviderError;
use crate::state::ResourceData;

/// Decides what a failed step means.
///
/// Returning `Ok(())` turns the failure into a success with no response
/// processing. Returning an error fails the step with that error.
#[async_trait]
pub trait RequestErrorHandler: Send + Sync {
    /// Handle `err` for the resource described by `data`.
    async fn handle_error(
        &self,
        err: ProviderError,
        data: &mut ResourceData,
        client: &Client,
    ) -> Result<(), ProviderError>;
}

/// Treats a 404 as "the resource is gone": clears the ID and succeeds.
///
/// On reads the host then plans a recreate. On deletes it makes the delete
/// idempotent.
#[derive(Debug, Clone)]
pub struct IgnoreHttpNotFound {
    /// Human-readable resource name used in the log line.
    pub resource_name: String,
}

impl IgnoreHttpNotFound {
    /// Create a handler for the named resource.
    pub fn new(resource_name: impl Into<String>) -> Self {
        Self {
            resource_name: resource_name.into(),
        }
    }
}

#[async_trait]
impl RequestErrorHandler for IgnoreHttpNotFound {
    async fn handle_error(
        &self,
        err: ProviderError,
        data: &mut ResourceData,
        _client: &Client,
    ) -> Result<(), ProviderError> {
        if !err.is_not_found() {
            return Err(err);
        }
        info!(
            "{} not found. Skipping operation and removing it from state.",
            self.resource_name
        );
        data.clear_id();
        Ok(())
    }
}

//! Cyral Terraform Provider
//!
//! This crate implements the Cyral provider: repositories, sidecars,
//! policies, data labels, integrations and service accounts managed through
//! the Cyral control-plane REST API.
//!
//! # Overview
//!
//! - **ProviderService**: the lifecycle seam the plugin host drives
//! - **CyralProvider**: the implementation, backed by a [`ProviderRegistry`](core::ProviderRegistry)
//! - **Dispatcher**: each lifecycle operation is an ordered
//!   [`OperationSequence`](core::OperationSequence) of HTTP steps. A step builds its
//!   URL and body from state, and its response is written back into state.
//!   Failures go to the step's [`RequestErrorHandler`](core::RequestErrorHandler).
//! - **Client**: an authenticated HTTP client that caches the OAuth token
//! - **Schema & validation**: attribute schemas checked locally before any request
//! - **Logging**: `tracing` output honoring `RUST_LOG` and `TF_LOG`
//!
//! # Quick Start
//!
//! ```ignore
//! use cyral_provider::{CyralProvider, ProviderService};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     cyral_provider::init_logging();
//!
//!     let provider = CyralProvider::new()?;
//!     provider
//!         .configure(json!({
//!             "client_id": "sa/default/abc",
//!             "client_secret": "...",
//!             "control_plane": "tenant.app.cyral.com",
//!         }))
//!         .await?;
//!
//!     let plan = provider
//!         .plan("cyral_sidecar", None, json!({"name": "edge", "deployment_method": "helm3"}), json!({}))
//!         .await?;
//!     let state = provider.create("cyral_sidecar", plan.planned_state).await?;
//!     println!("created sidecar {}", state["id"]);
//!     Ok(())
//! }
//! ```
//!
//! # Resource IDs
//!
//! Resources nested under a parent use composed IDs such as
//! `{policy_id}/{policy_rule_id}`; see [`ids`].

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod client;
pub mod config;
pub mod core;
pub mod error;
pub mod ids;
pub mod logging;
pub mod provider;
pub mod schema;
pub mod service;
pub mod state;
pub mod testing;
pub mod types;
pub mod validation;

#[allow(missing_docs)]
pub mod resources;

// Re-export main types at crate root
pub use client::Client;
pub use config::{ClientConfig, ProviderConfig};
pub use error::{HttpError, ProviderError};
pub use logging::{init_logging, init_logging_with_default, try_init_logging};
pub use provider::{plan_resource, CyralProvider};
pub use schema::{Diagnostic, ProviderSchema};
pub use service::ProviderService;
pub use state::ResourceData;
pub use types::{
    AttributeChange, ImportedResource, PlanResult, ProviderMetadata, ServerCapabilities,
};
pub use validation::{is_valid, validate, validate_result};

// Re-export async_trait for convenience
pub use async_trait::async_trait;

// Re-export commonly used external types
pub use serde_json;
pub use tracing;

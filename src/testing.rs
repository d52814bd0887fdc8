//! Drive a provider through the same call sequences the plugin host makes.
//!
//! The harness needs no plugin transport. Point [`ProviderTester::cyral`] at a
//! mock control plane (for example a `wiremock::MockServer`) and exercise
//! whole lifecycles.
//!
//! # Example
//!
//! ```ignore
//! use cyral_provider::testing::ProviderTester;
//! use serde_json::json;
//!
//! #[tokio::test]
//! async fn creates_a_sidecar() {
//!     let server = wiremock::MockServer::start().await;
//!     // ... mount the token endpoint and /v1/sidecars mocks ...
//!     let tester = ProviderTester::cyral(&server.uri()).await.unwrap();
//!
//!     let state = tester
//!         .lifecycle_create("cyral_sidecar", json!({"name": "edge", "deployment_method": "helm3"}))
//!         .await
//!         .unwrap();
//!     assert_eq!(state["id"], "sc1");
//! }
//! ```

use serde_json::{json, Value};
use thiserror::Error;

use crate::error::ProviderError;
use crate::provider::CyralProvider;
use crate::schema::{Diagnostic, DiagnosticSeverity, ProviderSchema};
use crate::service::ProviderService;
use crate::types::{ImportedResource, PlanResult};

/// Client credentials [`ProviderTester::cyral`] configures.
pub const TEST_CLIENT_ID: &str = "test-client";
/// See [`TEST_CLIENT_ID`].
pub const TEST_CLIENT_SECRET: &str = "test-secret";

/// Wraps a [`ProviderService`] with host-like call sequences.
pub struct ProviderTester<P: ProviderService = CyralProvider> {
    provider: P,
}

impl ProviderTester<CyralProvider> {
    /// A configured Cyral provider talking to `control_plane`.
    ///
    /// Environment fallbacks are disabled so the ambient environment cannot
    /// leak into tests.
    pub async fn cyral(control_plane: &str) -> Result<Self, TestError> {
        let provider = CyralProvider::new()?.with_env_lookup(|_| None);
        let tester = Self::new(provider);
        tester
            .configure(json!({
                "client_id": TEST_CLIENT_ID,
                "client_secret": TEST_CLIENT_SECRET,
                "control_plane": control_plane,
            }))
            .await?;
        Ok(tester)
    }
}

impl<P: ProviderService> ProviderTester<P> {
    /// Wrap `provider`. It is not configured.
    pub fn new(provider: P) -> Self {
        Self { provider }
    }

    /// The wrapped provider.
    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// The provider's schema.
    pub fn schema(&self) -> ProviderSchema {
        self.provider.schema()
    }

    /// Served resource type names.
    pub fn resource_types(&self) -> Vec<String> {
        self.provider.metadata().resources
    }

    /// Served data source type names.
    pub fn data_source_types(&self) -> Vec<String> {
        self.provider.metadata().data_sources
    }

    /// Validate the provider block; error diagnostics become `Err`.
    pub async fn validate_provider_config(&self, config: Value) -> Result<(), TestError> {
        check_diagnostics(self.provider.validate_provider_config(config).await?)
    }

    /// Configure the provider; error diagnostics become `Err`.
    pub async fn configure(&self, config: Value) -> Result<(), TestError> {
        check_diagnostics(self.provider.configure(config).await?)
    }

    /// Stop the provider.
    pub async fn stop(&self) -> Result<(), ProviderError> {
        self.provider.stop().await
    }

    /// Validate a resource configuration; error diagnostics become `Err`.
    pub async fn validate_resource_config(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<(), TestError> {
        check_diagnostics(
            self.provider
                .validate_resource_config(resource_type, config)
                .await?,
        )
    }

    /// Plan a resource that does not exist yet.
    pub async fn plan_create(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<PlanResult, ProviderError> {
        self.provider
            .plan(resource_type, None, config.clone(), config)
            .await
    }

    /// Plan a change to an existing resource.
    pub async fn plan_update(
        &self,
        resource_type: &str,
        prior_state: Value,
        config: Value,
    ) -> Result<PlanResult, ProviderError> {
        self.provider
            .plan(resource_type, Some(prior_state), config.clone(), config)
            .await
    }

    /// Plan the destruction of a resource.
    pub async fn plan_delete(
        &self,
        resource_type: &str,
        prior_state: Value,
    ) -> Result<PlanResult, ProviderError> {
        self.provider
            .plan(resource_type, Some(prior_state), Value::Null, Value::Null)
            .await
    }

    /// Create a resource from a planned state.
    pub async fn create(&self, resource_type: &str, planned_state: Value) -> Result<Value, ProviderError> {
        self.provider.create(resource_type, planned_state).await
    }

    /// Read a resource. The returned `id` is `null` when it is gone.
    pub async fn read(&self, resource_type: &str, current_state: Value) -> Result<Value, ProviderError> {
        self.provider.read(resource_type, current_state).await
    }

    /// Read a resource, `None` when it is gone.
    pub async fn refresh(
        &self,
        resource_type: &str,
        current_state: Value,
    ) -> Result<Option<Value>, ProviderError> {
        let state = self.read(resource_type, current_state).await?;
        Ok(if is_gone(&state) { None } else { Some(state) })
    }

    /// Update a resource in place.
    pub async fn update(
        &self,
        resource_type: &str,
        prior_state: Value,
        planned_state: Value,
    ) -> Result<Value, ProviderError> {
        self.provider
            .update(resource_type, prior_state, planned_state)
            .await
    }

    /// Delete a resource.
    pub async fn delete(&self, resource_type: &str, current_state: Value) -> Result<(), ProviderError> {
        self.provider.delete(resource_type, current_state).await
    }

    /// Import an existing object by ID.
    pub async fn import_resource(
        &self,
        resource_type: &str,
        id: &str,
    ) -> Result<Vec<ImportedResource>, ProviderError> {
        self.provider.import_resource(resource_type, id).await
    }

    /// Upgrade stored state from `version`.
    pub async fn upgrade_resource_state(
        &self,
        resource_type: &str,
        version: i64,
        state: Value,
    ) -> Result<Value, ProviderError> {
        self.provider
            .upgrade_resource_state(resource_type, version, state)
            .await
    }

    /// Validate then read a data source.
    pub async fn read_data_source(&self, data_source_type: &str, config: Value) -> Result<Value, TestError> {
        check_diagnostics(
            self.provider
                .validate_data_source_config(data_source_type, config.clone())
                .await?,
        )?;
        Ok(self.provider.read_data_source(data_source_type, config).await?)
    }

    /// validate → plan → create. Returns the state create read back.
    pub async fn lifecycle_create(&self, resource_type: &str, config: Value) -> Result<Value, TestError> {
        self.validate_resource_config(resource_type, config.clone())
            .await?;
        let plan = self.plan_create(resource_type, config).await?;
        Ok(self.create(resource_type, plan.planned_state).await?)
    }

    /// validate → plan → update, or delete then create when the plan
    /// requires replacement.
    pub async fn lifecycle_update(
        &self,
        resource_type: &str,
        prior_state: Value,
        config: Value,
    ) -> Result<Value, TestError> {
        self.validate_resource_config(resource_type, config.clone())
            .await?;
        let plan = self
            .plan_update(resource_type, prior_state.clone(), config)
            .await?;
        if !plan.has_changes() {
            return Ok(prior_state);
        }
        if plan.requires_replace {
            self.delete(resource_type, prior_state).await?;
            return Ok(self.create(resource_type, plan.planned_state).await?);
        }
        Ok(self
            .update(resource_type, prior_state, plan.planned_state)
            .await?)
    }

    /// plan destroy → delete.
    pub async fn lifecycle_delete(&self, resource_type: &str, current_state: Value) -> Result<(), TestError> {
        self.plan_delete(resource_type, current_state.clone())
            .await?;
        Ok(self.delete(resource_type, current_state).await?)
    }

    /// create → update → delete. Returns the state after the update.
    pub async fn lifecycle_crud(
        &self,
        resource_type: &str,
        initial_config: Value,
        updated_config: Value,
    ) -> Result<Value, TestError> {
        let created = self.lifecycle_create(resource_type, initial_config).await?;
        let updated = self
            .lifecycle_update(resource_type, created, updated_config)
            .await?;
        self.lifecycle_delete(resource_type, updated.clone()).await?;
        Ok(updated)
    }
}

/// Failure of a harness call.
#[derive(Debug, Error)]
pub enum TestError {
    /// The call returned error diagnostics.
    #[error("{}", render_diagnostics(.0))]
    Diagnostics(Vec<Diagnostic>),
    /// The call failed outright.
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),
}

fn render_diagnostics(diagnostics: &[Diagnostic]) -> String {
    let mut out = format!("{} error diagnostic(s):", diagnostics.len());
    for d in diagnostics {
        out.push_str("\n  ");
        out.push_str(&d.summary);
        if let Some(detail) = &d.detail {
            out.push_str(": ");
            out.push_str(detail);
        }
        if let Some(attribute) = &d.attribute {
            out.push_str(&format!(" (at {})", attribute));
        }
    }
    out
}

fn check_diagnostics(diagnostics: Vec<Diagnostic>) -> Result<(), TestError> {
    let errors: Vec<Diagnostic> = diagnostics.into_iter().filter(Diagnostic::is_error).collect();
    if errors.is_empty() {
        Ok(())
    } else {
        Err(TestError::Diagnostics(errors))
    }
}

fn is_gone(state: &Value) -> bool {
    state.get("id").map_or(true, Value::is_null)
}

fn error_summaries(diagnostics: &[Diagnostic]) -> Vec<&str> {
    diagnostics
        .iter()
        .filter(|d| matches!(d.severity, DiagnosticSeverity::Error))
        .map(|d| d.summary.as_str())
        .collect()
}

/// Panics unless the plan creates without replacing.
pub fn assert_plan_creates(plan: &PlanResult) {
    assert!(plan.has_changes(), "create plan has no changes");
    assert!(!plan.requires_replace, "create plan requires replacement");
    assert!(plan.planned_state["id"].is_null(), "create plan already has an id");
}

/// Panics if the plan has changes.
pub fn assert_plan_no_changes(plan: &PlanResult) {
    assert!(
        !plan.has_changes(),
        "expected no changes, got {:?}",
        plan.changes.iter().map(|c| &c.path).collect::<Vec<_>>()
    );
}

/// Panics unless the plan replaces the resource.
pub fn assert_plan_replaces(plan: &PlanResult) {
    assert!(plan.requires_replace, "expected the plan to replace the resource");
}

/// Panics if the plan replaces the resource.
pub fn assert_plan_updates_in_place(plan: &PlanResult) {
    assert!(!plan.requires_replace, "expected an in-place update, got a replacement");
}

/// Panics unless the plan changes `path`.
pub fn assert_plan_changes_attribute(plan: &PlanResult, path: &str) {
    assert!(
        plan.changes.iter().any(|c| c.path == path),
        "expected a change to '{}', changed: {:?}",
        path,
        plan.changes.iter().map(|c| &c.path).collect::<Vec<_>>()
    );
}

/// Panics unless `state` describes a resource that no longer exists.
pub fn assert_gone(state: &Value) {
    assert!(is_gone(state), "expected the resource to be gone, id is {}", state["id"]);
}

/// Panics on any error diagnostic.
pub fn assert_no_errors(diagnostics: &[Diagnostic]) {
    let errors = error_summaries(diagnostics);
    assert!(errors.is_empty(), "expected no errors, got {:?}", errors);
}

/// Panics unless there is at least one error diagnostic.
pub fn assert_has_errors(diagnostics: &[Diagnostic]) {
    assert!(
        !error_summaries(diagnostics).is_empty(),
        "expected at least one error diagnostic"
    );
}

/// Panics unless an error diagnostic's summary or detail contains `needle`.
pub fn assert_error_contains(diagnostics: &[Diagnostic], needle: &str) {
    let found = diagnostics.iter().filter(|d| d.is_error()).any(|d| {
        d.summary.contains(needle) || d.detail.as_deref().is_some_and(|detail| detail.contains(needle))
    });
    assert!(
        found,
        "no error mentions '{}', errors: {:?}",
        needle,
        error_summaries(diagnostics)
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_cyral_tester_is_configured() {
        let tester = ProviderTester::cyral("http://127.0.0.1:1").await.unwrap();
        assert!(tester.provider().is_configured().await);
        assert!(tester.resource_types().contains(&"cyral_policy_rule".to_string()));
        assert!(tester.data_source_types().contains(&"cyral_system_info".to_string()));
    }

    #[tokio::test]
    async fn test_plans_without_network() {
        let tester = ProviderTester::cyral("http://127.0.0.1:1").await.unwrap();

        let plan = tester
            .plan_create("cyral_repository_conf_auth", json!({"repository_id": "r1"}))
            .await
            .unwrap();
        assert_plan_creates(&plan);
        assert_eq!(plan.planned_state["client_tls"], "disable");

        let prior = json!({
            "id": "r1",
            "repository_id": "r1",
            "allow_native_auth": false,
            "client_tls": "disable",
            "repo_tls": "disable",
            "auth_type": "ACCESS_TOKEN",
        });
        let plan = tester
            .plan_update(
                "cyral_repository_conf_auth",
                prior.clone(),
                json!({"repository_id": "r1"}),
            )
            .await
            .unwrap();
        assert_plan_no_changes(&plan);

        let plan = tester
            .plan_update(
                "cyral_repository_conf_auth",
                prior.clone(),
                json!({"repository_id": "r1", "client_tls": "enable"}),
            )
            .await
            .unwrap();
        assert_plan_changes_attribute(&plan, "client_tls");
        assert_plan_updates_in_place(&plan);

        let plan = tester
            .plan_update("cyral_repository_conf_auth", prior, json!({"repository_id": "r2"}))
            .await
            .unwrap();
        assert_plan_replaces(&plan);
    }

    #[tokio::test]
    async fn test_validation_failure_is_reported() {
        let tester = ProviderTester::cyral("http://127.0.0.1:1").await.unwrap();
        let err = tester
            .lifecycle_create("cyral_sidecar", json!({"name": "edge", "deployment_method": "ansible"}))
            .await
            .unwrap_err();

        match err {
            TestError::Diagnostics(diagnostics) => {
                assert_has_errors(&diagnostics);
                assert_error_contains(&diagnostics, "deployment_method");
            },
            other => panic!("expected diagnostics, got {}", other),
        }
    }

    #[tokio::test]
    async fn test_unconfigured_provider_reports_configuration_error() {
        let tester = ProviderTester::new(CyralProvider::new().unwrap().with_env_lookup(|_| None));
        let err = tester
            .configure(json!({"control_plane": "tenant.app.cyral.com"}))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("client_id"));
    }

    #[test]
    fn test_assert_no_errors_ignores_warnings() {
        assert_no_errors(&[Diagnostic::warning("deprecated attribute")]);
    }

    #[test]
    #[should_panic(expected = "expected no errors")]
    fn test_assert_no_errors_panics() {
        assert_no_errors(&[Diagnostic::error("boom")]);
    }

    #[test]
    fn test_assert_gone() {
        assert_gone(&json!({"id": null, "name": "x"}));
        assert_gone(&json!({}));
    }

    #[test]
    fn test_error_display_lists_diagnostics() {
        let err = TestError::Diagnostics(vec![
            Diagnostic::error("Missing required attribute 'name'").with_attribute("name"),
            Diagnostic::error("Invalid value").with_detail("Expected one of [a, b]"),
        ]);
        let text = err.to_string();
        assert!(text.starts_with("2 error diagnostic(s):"));
        assert!(text.contains("(at name)"));
        assert!(text.contains("Expected one of [a, b]"));
    }
}

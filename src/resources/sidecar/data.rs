//! Sidecar lookups: `cyral_sidecar_id` and `cyral_sidecar_bound_ports`.

use std::collections::BTreeSet;

use serde::Deserialize;

use super::listener::ListenerEnvelope;
use super::SIDECARS_PATH;
use crate::client::Method;
use crate::core::{
    DataSourceDefinition, OperationSequence, OperationType, ResourceOperationConfig, SchemaWriter,
};
use crate::error::ProviderError;
use crate::resources::{fixed_url, segment};
use crate::schema::{Attribute, AttributeFlags, AttributeType, Schema};
use crate::state::ResourceData;

#[derive(Debug, Clone, Deserialize)]
pub struct SidecarSummary {
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SidecarEntry {
    pub id: String,
    pub sidecar: SidecarSummary,
}

/// `GET /v1/sidecars` returns a bare array.
#[derive(Debug, Clone, Deserialize)]
#[serde(transparent)]
pub struct ListSidecarsResponse(pub Vec<SidecarEntry>);

impl SchemaWriter for ListSidecarsResponse {
    fn write_to_schema(&self, data: &mut ResourceData) -> Result<(), ProviderError> {
        let name = data.require_str("sidecar_name")?.to_string();
        let entry = self
            .0
            .iter()
            .find(|entry| entry.sidecar.name == name)
            .ok_or_else(|| ProviderError::NotFound(format!("no sidecar named '{}'", name)))?;
        data.set_id(entry.id.clone());
        Ok(())
    }
}

/// `cyral_sidecar_id` data source.
pub fn sidecar_id_data_source() -> DataSourceDefinition {
    DataSourceDefinition::new(
        "cyral_sidecar_id",
        Schema::resource(0)
            .with_description("Resolves a sidecar name to its ID.")
            .with_attribute("sidecar_name", Attribute::required_string()),
        OperationSequence::read(
            ResourceOperationConfig::new(
                "SidecarIdDataSourceRead",
                OperationType::Read,
                Method::GET,
                fixed_url(SIDECARS_PATH),
            )
            .with_response::<ListSidecarsResponse>(),
        ),
    )
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListListenersResponse {
    #[serde(default)]
    pub listener_configs: Vec<ListenerEnvelope>,
}

impl ListListenersResponse {
    /// Ports of every listener, ascending and without duplicates.
    pub fn bound_ports(&self) -> Vec<i64> {
        self.listener_configs
            .iter()
            .map(|config| config.listener.network_address.port)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

impl SchemaWriter for ListListenersResponse {
    fn write_to_schema(&self, data: &mut ResourceData) -> Result<(), ProviderError> {
        let sidecar_id = data.require_str("sidecar_id")?.to_string();
        data.set("bound_ports", self.bound_ports());
        data.set_id(sidecar_id);
        Ok(())
    }
}

/// `cyral_sidecar_bound_ports` data source.
pub fn bound_ports_data_source() -> DataSourceDefinition {
    DataSourceDefinition::new(
        "cyral_sidecar_bound_ports",
        Schema::resource(0)
            .with_description("Ports currently bound by the listeners of a sidecar.")
            .with_attribute("sidecar_id", Attribute::required_string())
            .with_attribute(
                "bound_ports",
                Attribute::new(AttributeType::list(AttributeType::Int64), AttributeFlags::computed()),
            ),
        OperationSequence::read(
            ResourceOperationConfig::new(
                "SidecarBoundPortsDataSourceRead",
                OperationType::Read,
                Method::GET,
                |data, client| {
                    Ok(client.url(&format!(
                        "{}/{}/listeners",
                        SIDECARS_PATH,
                        segment(data.require_str("sidecar_id")?)
                    )))
                },
            )
            .with_response::<ListListenersResponse>(),
        ),
    )
}

//! Control-plane lookups: `cyral_saml_certificate` and `cyral_system_info`.

use serde::Deserialize;

use super::fixed_url;
use crate::client::Method;
use crate::core::{
    DataSourceDefinition, OperationSequence, OperationType, ResourceOperationConfig, SchemaWriter,
};
use crate::error::ProviderError;
use crate::schema::{Attribute, Schema};
use crate::state::ResourceData;

#[derive(Debug, Clone, Deserialize)]
pub struct SamlCertificate {
    pub certificate: String,
}

impl SchemaWriter for SamlCertificate {
    fn write_to_schema(&self, data: &mut ResourceData) -> Result<(), ProviderError> {
        data.set_id("saml-certificate");
        data.set("certificate", self.certificate.clone());
        Ok(())
    }
}

/// `cyral_saml_certificate` data source.
pub fn saml_certificate_data_source() -> DataSourceDefinition {
    DataSourceDefinition::new(
        "cyral_saml_certificate",
        Schema::resource(0)
            .with_description("The certificate the control plane signs SAML requests with.")
            .with_attribute("certificate", Attribute::computed_string()),
        OperationSequence::read(
            ResourceOperationConfig::new(
                "SAMLCertificateDataSourceRead",
                OperationType::Read,
                Method::GET,
                fixed_url("/v1/integrations/saml/rsa/cert"),
            )
            .with_response::<SamlCertificate>(),
        ),
    )
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemInfo {
    #[serde(default)]
    pub control_plane_version: String,
    #[serde(default)]
    pub sidecar_latest_version: String,
}

impl SchemaWriter for SystemInfo {
    fn write_to_schema(&self, data: &mut ResourceData) -> Result<(), ProviderError> {
        data.set_id("system-info");
        data.set("control_plane_version", self.control_plane_version.clone());
        data.set("sidecar_latest_version", self.sidecar_latest_version.clone());
        Ok(())
    }
}

/// `cyral_system_info` data source.
pub fn system_info_data_source() -> DataSourceDefinition {
    DataSourceDefinition::new(
        "cyral_system_info",
        Schema::resource(0)
            .with_description("Versions reported by the control plane.")
            .with_attribute("control_plane_version", Attribute::computed_string())
            .with_attribute("sidecar_latest_version", Attribute::computed_string()),
        OperationSequence::read(
            ResourceOperationConfig::new(
                "SystemInfoDataSourceRead",
                OperationType::Read,
                Method::GET,
                fixed_url("/v1/systemInfo"),
            )
            .with_response::<SystemInfo>(),
        ),
    )
}

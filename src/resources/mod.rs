//! Every Cyral resource and data source.
//!
//! [`registry`] is the single place the provider's types are listed.

use std::borrow::Cow;

use crate::client::Client;
use crate::core::{DataSourceDefinition, IgnoreHttpNotFound, ProviderRegistry, ResourceDefinition};
use crate::error::ProviderError;
use crate::state::ResourceData;

pub mod datalabel;
pub mod integration;
pub mod policy;
pub mod repository;
pub mod service_account;
pub mod sidecar;
pub mod system;

/// Build the registry of everything the provider serves.
pub fn registry() -> Result<ProviderRegistry, ProviderError> {
    let mut registry = ProviderRegistry::new();
    for definition in resources() {
        registry.register_resource(definition)?;
    }
    for definition in data_sources() {
        registry.register_data_source(definition)?;
    }
    Ok(registry)
}

/// All resource definitions.
pub fn resources() -> Vec<ResourceDefinition> {
    vec![
        repository::resource(),
        repository::binding::resource(),
        repository::confauth::resource(),
        repository::confanalysis::resource(),
        repository::user_account::resource(),
        repository::access_rules::resource(),
        repository::network_access::resource(),
        repository::access_gateway::resource(),
        sidecar::resource(),
        sidecar::listener::resource(),
        sidecar::credentials::resource(),
        policy::resource(),
        policy::rule::resource(),
        policy::rego::resource(),
        datalabel::resource(),
        integration::slack::resource(),
        integration::splunk::resource(),
        integration::saml::draft_resource(),
        integration::saml::resource(),
        service_account::resource(),
    ]
}

/// All data source definitions.
pub fn data_sources() -> Vec<DataSourceDefinition> {
    vec![
        repository::data_source(),
        sidecar::data::sidecar_id_data_source(),
        sidecar::data::bound_ports_data_source(),
        system::saml_certificate_data_source(),
        system::system_info_data_source(),
        datalabel::data_source(),
    ]
}

/// Percent-encode one path segment.
pub(crate) fn segment(value: &str) -> Cow<'_, str> {
    urlencoding::encode(value)
}

/// URL factory for `<prefix>/<resource id>`.
pub(crate) fn id_url(
    prefix: &'static str,
) -> impl Fn(&ResourceData, &Client) -> Result<String, ProviderError> + Send + Sync + 'static {
    move |data, client| {
        let id = data.require_id()?;
        Ok(client.url(&format!("{}/{}", prefix, segment(id))))
    }
}

/// URL factory for a fixed path.
pub(crate) fn fixed_url(
    path: &'static str,
) -> impl Fn(&ResourceData, &Client) -> Result<String, ProviderError> + Send + Sync + 'static {
    move |_, client| Ok(client.url(path))
}

/// 404 handler for reads and deletes.
pub(crate) fn ignore_not_found(resource_name: &str) -> IgnoreHttpNotFound {
    IgnoreHttpNotFound::new(resource_name)
}

/// The resource ID, or the attribute it is derived from when the ID is not
/// set yet (right after create).
pub(crate) fn id_or<'a>(data: &'a ResourceData, key: &str) -> Result<&'a str, ProviderError> {
    match data.id() {
        Some(id) => Ok(id),
        None => data.require_str(key),
    }
}

/// The optional string attribute, `None` when unset or empty.
pub(crate) fn opt_string(data: &ResourceData, key: &str) -> Option<String> {
    data.get_str(key).filter(|s| !s.is_empty()).map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_builds() {
        let registry = registry().unwrap();
        assert_eq!(registry.resource_names().len(), resources().len());
        assert!(registry.resource("cyral_policy_rule").is_ok());
        assert!(registry.data_source("cyral_sidecar_id").is_ok());
    }

    #[test]
    fn test_every_resource_has_computed_id() {
        for definition in resources() {
            let id = definition
                .schema
                .attribute("id")
                .unwrap_or_else(|| panic!("{} has no id", definition.name));
            assert!(id.flags.computed, "{}", definition.name);
        }
    }

    #[test]
    fn test_mutations_are_followed_by_read() {
        use crate::core::OperationType;

        for definition in resources() {
            let create = definition.create.steps();
            assert_eq!(
                create.last().map(|s| s.kind()),
                Some(OperationType::Read),
                "{} create does not end with a read",
                definition.name
            );
            if let Some(update) = &definition.update {
                assert_eq!(
                    update.steps().last().map(|s| s.kind()),
                    Some(OperationType::Read),
                    "{} update does not end with a read",
                    definition.name
                );
            }
        }
    }

    #[test]
    fn test_nested_block_names_do_not_collide_with_attributes() {
        for definition in resources() {
            let block = &definition.schema.block;
            for name in block.blocks.keys() {
                assert!(!block.attributes.contains_key(name), "{}.{}", definition.name, name);
            }
        }
    }

    #[test]
    fn test_segment_encodes() {
        assert_eq!(segment("a b/c"), "a%20b%2Fc");
        assert_eq!(segment("repo-1"), "repo-1");
    }
}

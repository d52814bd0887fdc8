//! Generic SAML identity providers.
//!
//! A SAML integration is made in two steps. First a draft is created, which
//! yields the service-provider metadata to register with the identity
//! provider. Then the integration is completed by posting the IdP metadata
//! against the draft. Completing a draft consumes it, so a draft that vanishes
//! may either have been deleted or turned into an integration.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;

use crate::client::{Client, Method};
use crate::core::{
    passthrough_importer, IdBasedResponse, OperationSequence, OperationType, RequestErrorHandler,
    ResourceDefinition, ResourceOperationConfig, SchemaReader, SchemaWriter,
};
use crate::error::ProviderError;
use crate::resources::{fixed_url, id_url, ignore_not_found, opt_string, segment};
use crate::schema::{Attribute, AttributeFlags, AttributeType, Block, NestedBlock, Schema};
use crate::state::ResourceData;

const DRAFTS_PATH: &str = "/v1/integrations/generic-saml/drafts";
const SSO_PATH: &str = "/v1/integrations/generic-saml/sso";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequiredUserAttributes {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub first_name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub last_name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub email: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub groups: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct AssertionConsumerService {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub index: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceProviderMetadata {
    #[serde(default)]
    pub xml_document: String,
    #[serde(default)]
    pub url: String,
    #[serde(rename = "entityID", default)]
    pub entity_id: String,
    #[serde(rename = "singleLogoutURL", default)]
    pub single_logout_url: String,
    #[serde(default)]
    pub assertion_consumer_services: Vec<AssertionConsumerService>,
}

impl ServiceProviderMetadata {
    fn to_state(&self) -> Value {
        let services: Vec<Value> = self
            .assertion_consumer_services
            .iter()
            .map(|s| json!({"url": s.url, "index": s.index}))
            .collect();
        json!({
            "xml_document": self.xml_document,
            "url": self.url,
            "entity_id": self.entity_id,
            "single_logout_url": self.single_logout_url,
            "assertion_consumer_services": services,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenericSamlDraftRequest {
    pub display_name: String,
    #[serde(rename = "disableIdPInitiatedLogin")]
    pub disable_idp_initiated_login: bool,
    #[serde(rename = "idpType", skip_serializing_if = "Option::is_none")]
    pub idp_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attributes: Option<RequiredUserAttributes>,
}

impl SchemaReader for GenericSamlDraftRequest {
    fn read_from_schema(data: &ResourceData) -> Result<Self, ProviderError> {
        Ok(Self {
            display_name: data.require_str("display_name")?.to_string(),
            disable_idp_initiated_login: data.get_bool("disable_idp_initiated_login").unwrap_or(false),
            idp_type: opt_string(data, "idp_type"),
            attributes: data.get_block("attributes").map(|b| RequiredUserAttributes {
                first_name: b.get_string("first_name"),
                last_name: b.get_string("last_name"),
                email: b.get_string("email"),
                groups: b.get_string("groups"),
            }),
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenericSamlDraft {
    pub id: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(rename = "disableIdPInitiatedLogin", default)]
    pub disable_idp_initiated_login: bool,
    #[serde(rename = "idpType", default)]
    pub idp_type: String,
    #[serde(default)]
    pub attributes: Option<RequiredUserAttributes>,
    #[serde(default)]
    pub sp_metadata: Option<ServiceProviderMetadata>,
}

/// Create and read response: `{"draft": {...}}`.
#[derive(Debug, Clone, Deserialize)]
pub struct GenericSamlDraftResponse {
    pub draft: GenericSamlDraft,
}

impl SchemaWriter for GenericSamlDraftResponse {
    fn write_to_schema(&self, data: &mut ResourceData) -> Result<(), ProviderError> {
        let draft = &self.draft;
        data.set_id(draft.id.clone());
        data.set("display_name", draft.display_name.clone());
        data.set("disable_idp_initiated_login", draft.disable_idp_initiated_login);
        data.set_opt(
            "idp_type",
            Some(draft.idp_type.clone()).filter(|t| !t.is_empty()),
        );
        data.set_opt(
            "attributes",
            draft.attributes.as_ref().map(|a| {
                json!({
                    "first_name": a.first_name,
                    "last_name": a.last_name,
                    "email": a.email,
                    "groups": a.groups,
                })
            }),
        );
        data.set_opt(
            "service_provider_metadata",
            draft.sp_metadata.as_ref().map(ServiceProviderMetadata::to_state),
        );
        Ok(())
    }
}

/// Read handler for drafts.
///
/// On a 404 it asks whether a completed integration now exists under the same
/// ID. Found means the draft was superseded, absent means it was deleted
/// upstream. Both clear the ID so the draft is recreated. Any other error,
/// from either request, is returned.
#[derive(Debug, Clone, Default)]
pub struct ReadGenericSamlDraftErrorHandler;

#[async_trait]
impl RequestErrorHandler for ReadGenericSamlDraftErrorHandler {
    async fn handle_error(
        &self,
        err: ProviderError,
        data: &mut ResourceData,
        client: &Client,
    ) -> Result<(), ProviderError> {
        if !err.is_not_found() {
            return Err(err);
        }

        let id = data.require_id()?.to_string();
        let url = client.url(&format!("{}/{}", SSO_PATH, segment(&id)));
        match client.do_request(&url, Method::GET, None).await {
            Ok(_) => info!(
                "SAML draft {} was completed into an integration. Removing it from state.",
                id
            ),
            Err(e) if e.is_not_found() => {
                info!("SAML draft {} not found. Removing it from state.", id)
            },
            Err(e) => return Err(e),
        }
        data.clear_id();
        Ok(())
    }
}

fn draft_schema() -> Schema {
    let metadata = AttributeType::object([
        ("xml_document", AttributeType::String),
        ("url", AttributeType::String),
        ("entity_id", AttributeType::String),
        ("single_logout_url", AttributeType::String),
        (
            "assertion_consumer_services",
            AttributeType::list(AttributeType::object([
                ("url", AttributeType::String),
                ("index", AttributeType::Int64),
            ])),
        ),
    ]);

    Schema::resource(0)
        .with_description("A draft SAML integration and its service-provider metadata.")
        .with_attribute("display_name", Attribute::required_string())
        .with_attribute(
            "disable_idp_initiated_login",
            Attribute::optional_bool().with_default(false),
        )
        .with_attribute("idp_type", Attribute::optional_string())
        .with_block(
            "attributes",
            NestedBlock::single(
                Block::new()
                    .with_attribute("first_name", Attribute::optional_string())
                    .with_attribute("last_name", Attribute::optional_string())
                    .with_attribute("email", Attribute::optional_string())
                    .with_attribute("groups", Attribute::optional_string()),
            ),
        )
        .with_attribute(
            "service_provider_metadata",
            Attribute::new(metadata, AttributeFlags::computed()),
        )
}

fn draft_read_step() -> ResourceOperationConfig {
    ResourceOperationConfig::new(
        "GenericSAMLDraftResourceRead",
        OperationType::Read,
        Method::GET,
        id_url(DRAFTS_PATH),
    )
    .with_response::<GenericSamlDraftResponse>()
    .with_error_handler(ReadGenericSamlDraftErrorHandler)
}

/// `cyral_integration_idp_saml_draft`. No update: any change replaces the draft.
pub fn draft_resource() -> ResourceDefinition {
    ResourceDefinition::new(
        "cyral_integration_idp_saml_draft",
        draft_schema(),
        OperationSequence::create(
            ResourceOperationConfig::new(
                "GenericSAMLDraftResourceCreate",
                OperationType::Create,
                Method::POST,
                fixed_url(DRAFTS_PATH),
            )
            .with_request::<GenericSamlDraftRequest>()
            .with_response::<GenericSamlDraftResponse>(),
            draft_read_step(),
        ),
        OperationSequence::read(draft_read_step()),
        OperationSequence::delete(
            ResourceOperationConfig::new(
                "GenericSAMLDraftResourceDelete",
                OperationType::Delete,
                Method::DELETE,
                id_url(DRAFTS_PATH),
            )
            .with_error_handler(ignore_not_found("Generic SAML draft")),
        ),
    )
    .with_importer(passthrough_importer())
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IdpMetadata {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub url: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub xml: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateGenericSamlRequest {
    pub draft_id: String,
    pub idp_metadata: IdpMetadata,
}

impl SchemaReader for CreateGenericSamlRequest {
    fn read_from_schema(data: &ResourceData) -> Result<Self, ProviderError> {
        let url = data.get_string("idp_metadata_url");
        let xml = data.get_string("idp_metadata_xml");
        if url.is_empty() == xml.is_empty() {
            return Err(ProviderError::Validation(
                "exactly one of 'idp_metadata_url' and 'idp_metadata_xml' must be set".to_string(),
            ));
        }
        Ok(Self {
            draft_id: data.require_str("saml_draft_id")?.to_string(),
            idp_metadata: IdpMetadata { url, xml },
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdpIntegration {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub idp_metadata: Option<IdpMetadata>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadGenericSamlResponse {
    pub idp_integration: IdpIntegration,
}

impl SchemaWriter for ReadGenericSamlResponse {
    fn write_to_schema(&self, data: &mut ResourceData) -> Result<(), ProviderError> {
        let integration = &self.idp_integration;
        data.set("display_name", integration.display_name.clone());
        if let Some(metadata) = &integration.idp_metadata {
            if !metadata.url.is_empty() {
                data.set("idp_metadata_url", metadata.url.clone());
            }
            if !metadata.xml.is_empty() {
                data.set("idp_metadata_xml", metadata.xml.clone());
            }
        }
        Ok(())
    }
}

fn read_step() -> ResourceOperationConfig {
    ResourceOperationConfig::new(
        "GenericSAMLResourceRead",
        OperationType::Read,
        Method::GET,
        id_url(SSO_PATH),
    )
    .with_response::<ReadGenericSamlResponse>()
    .with_error_handler(ignore_not_found("Generic SAML integration"))
}

fn schema() -> Schema {
    Schema::resource(0)
        .with_description("Completes a SAML draft with the identity provider's metadata.")
        .with_attribute("saml_draft_id", Attribute::required_string().with_force_new())
        .with_attribute(
            "idp_metadata_url",
            Attribute::optional_string()
                .with_force_new()
                .with_conflicts_with(&["idp_metadata_xml"]),
        )
        .with_attribute(
            "idp_metadata_xml",
            Attribute::optional_string()
                .with_force_new()
                .with_conflicts_with(&["idp_metadata_url"]),
        )
        .with_exactly_one_of(&["idp_metadata_url", "idp_metadata_xml"])
        .with_attribute("display_name", Attribute::computed_string())
}

/// `cyral_integration_idp_saml`. No update.
pub fn resource() -> ResourceDefinition {
    ResourceDefinition::new(
        "cyral_integration_idp_saml",
        schema(),
        OperationSequence::create(
            ResourceOperationConfig::new(
                "GenericSAMLResourceCreate",
                OperationType::Create,
                Method::POST,
                fixed_url(SSO_PATH),
            )
            .with_request::<CreateGenericSamlRequest>()
            .with_response::<IdBasedResponse>(),
            read_step(),
        ),
        OperationSequence::read(read_step()),
        OperationSequence::delete(
            ResourceOperationConfig::new(
                "GenericSAMLResourceDelete",
                OperationType::Delete,
                Method::DELETE,
                id_url(SSO_PATH),
            )
            .with_error_handler(ignore_not_found("Generic SAML integration")),
        ),
    )
    .with_importer(passthrough_importer())
}

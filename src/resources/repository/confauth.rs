//! `cyral_repository_conf_auth`: authentication settings of a repository.

use serde::{Deserialize, Serialize};

use crate::client::{Client, Method};
use crate::core::{
    passthrough_importer, OperationSequence, OperationType, ResourceDefinition,
    ResourceOperationConfig, SchemaReader, SchemaWriter,
};
use crate::error::ProviderError;
use crate::resources::{id_or, ignore_not_found, segment};
use crate::schema::{Attribute, Schema};
use crate::state::ResourceData;

const TLS_MODES: &[&str] = &["enable", "disable"];
const AUTH_TYPES: &[&str] = &["ACCESS_TOKEN", "AWS_IAM"];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepositoryConfAuthData {
    #[serde(default)]
    pub allow_native_auth: bool,
    #[serde(rename = "clientTLS", default)]
    pub client_tls: String,
    #[serde(default)]
    pub identity_provider: String,
    #[serde(rename = "repoTLS", default)]
    pub repo_tls: String,
    #[serde(default)]
    pub auth_type: String,
}

impl SchemaReader for RepositoryConfAuthData {
    fn read_from_schema(data: &ResourceData) -> Result<Self, ProviderError> {
        let string_or = |key: &str, default: &str| {
            data.get_str(key).unwrap_or(default).to_string()
        };
        Ok(Self {
            allow_native_auth: data.get_bool("allow_native_auth").unwrap_or(false),
            client_tls: string_or("client_tls", "disable"),
            identity_provider: data.get_string("identity_provider"),
            repo_tls: string_or("repo_tls", "disable"),
            auth_type: string_or("auth_type", "ACCESS_TOKEN"),
        })
    }
}

/// `GET /v1/repos/{id}/conf/auth` response.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadRepositoryConfAuthResponse {
    pub auth_info: RepositoryConfAuthData,
}

impl SchemaWriter for ReadRepositoryConfAuthResponse {
    fn write_to_schema(&self, data: &mut ResourceData) -> Result<(), ProviderError> {
        let info = &self.auth_info;
        let repository_id = id_or(data, "repository_id")?.to_string();
        data.set_id(repository_id.clone());
        data.set("repository_id", repository_id);
        data.set("allow_native_auth", info.allow_native_auth);
        data.set("client_tls", info.client_tls.clone());
        data.set("repo_tls", info.repo_tls.clone());
        data.set("auth_type", info.auth_type.clone());
        data.set_opt(
            "identity_provider",
            Some(info.identity_provider.clone()).filter(|s| !s.is_empty()),
        );
        Ok(())
    }
}

fn conf_auth_url(repository_id: &str, client: &Client) -> String {
    client.url(&format!("/v1/repos/{}/conf/auth", segment(repository_id)))
}

fn by_id(data: &ResourceData, client: &Client) -> Result<String, ProviderError> {
    Ok(conf_auth_url(id_or(data, "repository_id")?, client))
}

fn read_step() -> ResourceOperationConfig {
    ResourceOperationConfig::new("ConfAuthResourceRead", OperationType::Read, Method::GET, by_id)
        .with_response::<ReadRepositoryConfAuthResponse>()
        .with_error_handler(ignore_not_found("Repository conf auth"))
}

fn schema() -> Schema {
    Schema::resource(0)
        .with_description("Authentication settings of a repository.")
        .with_attribute("repository_id", Attribute::required_string().with_force_new())
        .with_attribute("allow_native_auth", Attribute::optional_bool().with_default(false))
        .with_attribute(
            "client_tls",
            Attribute::optional_string()
                .with_allowed_values(TLS_MODES)
                .with_default("disable"),
        )
        .with_attribute(
            "repo_tls",
            Attribute::optional_string()
                .with_allowed_values(TLS_MODES)
                .with_default("disable"),
        )
        .with_attribute("identity_provider", Attribute::optional_string())
        .with_attribute(
            "auth_type",
            Attribute::optional_string()
                .with_allowed_values(AUTH_TYPES)
                .with_default("ACCESS_TOKEN"),
        )
}

/// `cyral_repository_conf_auth`.
pub fn resource() -> ResourceDefinition {
    ResourceDefinition::new(
        "cyral_repository_conf_auth",
        schema(),
        OperationSequence::create(
            ResourceOperationConfig::new(
                "ConfAuthResourceCreate",
                OperationType::Create,
                Method::POST,
                |data, client| Ok(conf_auth_url(data.require_str("repository_id")?, client)),
            )
            .with_request::<RepositoryConfAuthData>(),
            read_step(),
        ),
        OperationSequence::read(read_step()),
        OperationSequence::delete(
            ResourceOperationConfig::new(
                "ConfAuthResourceDelete",
                OperationType::Delete,
                Method::DELETE,
                by_id,
            )
            .with_error_handler(ignore_not_found("Repository conf auth")),
        ),
    )
    .with_update(OperationSequence::update(
        ResourceOperationConfig::new(
            "ConfAuthResourceUpdate",
            OperationType::Update,
            Method::PUT,
            by_id,
        )
        .with_request::<RepositoryConfAuthData>(),
        read_step(),
    ))
    .with_importer(passthrough_importer())
}

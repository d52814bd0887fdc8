//! `cyral_repository_user_account`: a database account Cyral can hand out.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::client::{Client, Method};
use crate::core::{
    composed_id_importer, OperationSequence, OperationType, ResourceDefinition,
    ResourceOperationConfig, SchemaReader, SchemaWriter,
};
use crate::error::ProviderError;
use crate::ids::{marshal_composed_id, unmarshal_named_id, ID_SEPARATOR};
use crate::resources::{ignore_not_found, segment};
use crate::schema::{Attribute, Block, NestedBlock, Schema};
use crate::state::{BlockRef, ResourceData};

const ID_FIELDS: &[&str] = &["repository_id", "user_account_id"];

const AUTH_SCHEMES: &[&str] = &[
    "aws_iam",
    "aws_secrets_manager",
    "cyral_storage",
    "hashicorp_vault",
    "environment_variable",
    "kubernetes_secret",
    "gcp_secret_manager",
];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AwsIam {
    #[serde(rename = "roleARN")]
    pub role_arn: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AwsSecretsManager {
    pub secret_arn: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CyralStorage {
    pub password: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HashicorpVault {
    pub path: String,
    #[serde(default)]
    pub is_dynamic_user_account: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentVariable {
    pub variable_name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KubernetesSecret {
    pub secret_name: String,
    pub secret_key: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GcpSecretManager {
    pub secret_name: String,
}

/// Where the account credentials live. Exactly one member is set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthScheme {
    #[serde(rename = "awsIAM", default, skip_serializing_if = "Option::is_none")]
    pub aws_iam: Option<AwsIam>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aws_secrets_manager: Option<AwsSecretsManager>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cyral_storage: Option<CyralStorage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hashicorp_vault: Option<HashicorpVault>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment_variable: Option<EnvironmentVariable>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kubernetes_secret: Option<KubernetesSecret>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gcp_secret_manager: Option<GcpSecretManager>,
}

impl AuthScheme {
    fn from_block(block: BlockRef<'_>) -> Result<Self, ProviderError> {
        let scheme = Self {
            aws_iam: match block.get_block("aws_iam") {
                Some(b) => Some(AwsIam {
                    role_arn: b.require_str("role_arn")?.to_string(),
                }),
                None => None,
            },
            aws_secrets_manager: match block.get_block("aws_secrets_manager") {
                Some(b) => Some(AwsSecretsManager {
                    secret_arn: b.require_str("secret_arn")?.to_string(),
                }),
                None => None,
            },
            cyral_storage: match block.get_block("cyral_storage") {
                Some(b) => Some(CyralStorage {
                    password: b.require_str("password")?.to_string(),
                }),
                None => None,
            },
            hashicorp_vault: match block.get_block("hashicorp_vault") {
                Some(b) => Some(HashicorpVault {
                    path: b.require_str("path")?.to_string(),
                    is_dynamic_user_account: b.get_bool("is_dynamic_user_account").unwrap_or(false),
                }),
                None => None,
            },
            environment_variable: match block.get_block("environment_variable") {
                Some(b) => Some(EnvironmentVariable {
                    variable_name: b.require_str("variable_name")?.to_string(),
                }),
                None => None,
            },
            kubernetes_secret: match block.get_block("kubernetes_secret") {
                Some(b) => Some(KubernetesSecret {
                    secret_name: b.require_str("secret_name")?.to_string(),
                    secret_key: b.require_str("secret_key")?.to_string(),
                }),
                None => None,
            },
            gcp_secret_manager: match block.get_block("gcp_secret_manager") {
                Some(b) => Some(GcpSecretManager {
                    secret_name: b.require_str("secret_name")?.to_string(),
                }),
                None => None,
            },
        };

        match scheme.count() {
            1 => Ok(scheme),
            n => Err(ProviderError::Validation(format!(
                "auth_scheme must set exactly one of [{}], got {}",
                AUTH_SCHEMES.join(", "),
                n
            ))),
        }
    }

    fn count(&self) -> usize {
        [
            self.aws_iam.is_some(),
            self.aws_secrets_manager.is_some(),
            self.cyral_storage.is_some(),
            self.hashicorp_vault.is_some(),
            self.environment_variable.is_some(),
            self.kubernetes_secret.is_some(),
            self.gcp_secret_manager.is_some(),
        ]
        .iter()
        .filter(|set| **set)
        .count()
    }

    /// State representation. The stored password is kept from prior state
    /// since reads never return it.
    fn to_state(&self, prior: Option<BlockRef<'_>>) -> Value {
        let mut block = serde_json::Map::new();
        if let Some(s) = &self.aws_iam {
            block.insert("aws_iam".into(), json!({"role_arn": s.role_arn}));
        }
        if let Some(s) = &self.aws_secrets_manager {
            block.insert("aws_secrets_manager".into(), json!({"secret_arn": s.secret_arn}));
        }
        if let Some(s) = &self.cyral_storage {
            let password = if s.password.is_empty() {
                prior
                    .and_then(|p| p.get_block("cyral_storage"))
                    .map(|b| b.get_string("password"))
                    .unwrap_or_default()
            } else {
                s.password.clone()
            };
            block.insert("cyral_storage".into(), json!({"password": password}));
        }
        if let Some(s) = &self.hashicorp_vault {
            block.insert(
                "hashicorp_vault".into(),
                json!({"path": s.path, "is_dynamic_user_account": s.is_dynamic_user_account}),
            );
        }
        if let Some(s) = &self.environment_variable {
            block.insert(
                "environment_variable".into(),
                json!({"variable_name": s.variable_name}),
            );
        }
        if let Some(s) = &self.kubernetes_secret {
            block.insert(
                "kubernetes_secret".into(),
                json!({"secret_name": s.secret_name, "secret_key": s.secret_key}),
            );
        }
        if let Some(s) = &self.gcp_secret_manager {
            block.insert("gcp_secret_manager".into(), json!({"secret_name": s.secret_name}));
        }
        Value::Object(block)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalConfig {
    #[serde(default)]
    pub automatic_grant: bool,
    #[serde(default)]
    pub max_automatic_grant_duration: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserAccountConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approval: Option<ApprovalConfig>,
}

/// A repository user account as exchanged with the API.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserAccount {
    #[serde(rename = "userAccountID", default, skip_serializing_if = "String::is_empty")]
    pub user_account_id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub auth_database_name: String,
    pub auth_scheme: AuthScheme,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<UserAccountConfig>,
}

impl SchemaReader for UserAccount {
    fn read_from_schema(data: &ResourceData) -> Result<Self, ProviderError> {
        let scheme = data.get_block("auth_scheme").ok_or_else(|| {
            ProviderError::Validation("attribute 'auth_scheme' is required".to_string())
        })?;

        let config = data.get_block("approval_config").map(|b| UserAccountConfig {
            approval: Some(ApprovalConfig {
                automatic_grant: b.get_bool("automatic_grant").unwrap_or(false),
                max_automatic_grant_duration: b.get_string("max_auto_grant_duration"),
            }),
        });

        Ok(Self {
            user_account_id: data.get_string("user_account_id"),
            name: data.require_str("name")?.to_string(),
            auth_database_name: data.get_string("auth_database_name"),
            auth_scheme: AuthScheme::from_block(scheme)?,
            config,
        })
    }
}

impl SchemaWriter for UserAccount {
    fn write_to_schema(&self, data: &mut ResourceData) -> Result<(), ProviderError> {
        let ids = unmarshal_named_id(data.require_id()?, ID_SEPARATOR, ID_FIELDS)?;
        let scheme = self.auth_scheme.to_state(data.get_block("auth_scheme"));

        data.set("repository_id", ids[0].clone());
        data.set("user_account_id", ids[1].clone());
        data.set("name", self.name.clone());
        data.set_opt(
            "auth_database_name",
            Some(self.auth_database_name.clone()).filter(|s| !s.is_empty()),
        );
        data.set("auth_scheme", scheme);

        let approval = self
            .config
            .as_ref()
            .and_then(|c| c.approval.as_ref())
            .map(|a| {
                json!({
                    "automatic_grant": a.automatic_grant,
                    "max_auto_grant_duration": a.max_automatic_grant_duration,
                })
            });
        data.set_opt("approval_config", approval);
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateUserAccountResponse {
    #[serde(rename = "userAccountID")]
    pub user_account_id: String,
}

impl SchemaWriter for CreateUserAccountResponse {
    fn write_to_schema(&self, data: &mut ResourceData) -> Result<(), ProviderError> {
        let repository_id = data.require_str("repository_id")?.to_string();
        data.set("user_account_id", self.user_account_id.clone());
        data.set_id(marshal_composed_id(
            &[repository_id.as_str(), self.user_account_id.as_str()],
            ID_SEPARATOR,
        ));
        Ok(())
    }
}

fn account_url(data: &ResourceData, client: &Client) -> Result<String, ProviderError> {
    let ids = unmarshal_named_id(data.require_id()?, ID_SEPARATOR, ID_FIELDS)?;
    Ok(client.url(&format!(
        "/v1/repos/{}/userAccounts/{}",
        segment(&ids[0]),
        segment(&ids[1])
    )))
}

fn read_step() -> ResourceOperationConfig {
    ResourceOperationConfig::new("RepositoryUserAccountRead", OperationType::Read, Method::GET, account_url)
        .with_response::<UserAccount>()
        .with_error_handler(ignore_not_found("Repository user account"))
}

fn auth_scheme_block() -> Block {
    let single = |block: Block| NestedBlock::single(block);
    Block::new()
        .with_block(
            "aws_iam",
            single(Block::new().with_attribute("role_arn", Attribute::required_string())),
        )
        .with_block(
            "aws_secrets_manager",
            single(Block::new().with_attribute("secret_arn", Attribute::required_string())),
        )
        .with_block(
            "cyral_storage",
            single(Block::new().with_attribute("password", Attribute::required_string().sensitive())),
        )
        .with_block(
            "hashicorp_vault",
            single(
                Block::new()
                    .with_attribute("path", Attribute::required_string())
                    .with_attribute(
                        "is_dynamic_user_account",
                        Attribute::optional_bool().with_default(false),
                    ),
            ),
        )
        .with_block(
            "environment_variable",
            single(Block::new().with_attribute("variable_name", Attribute::required_string())),
        )
        .with_block(
            "kubernetes_secret",
            single(
                Block::new()
                    .with_attribute("secret_name", Attribute::required_string())
                    .with_attribute("secret_key", Attribute::required_string()),
            ),
        )
        .with_block(
            "gcp_secret_manager",
            single(Block::new().with_attribute("secret_name", Attribute::required_string())),
        )
        .with_exactly_one_of(AUTH_SCHEMES)
}

fn schema() -> Schema {
    Schema::resource(0)
        .with_description("A database account that Cyral can grant access to.")
        .with_attribute("repository_id", Attribute::required_string().with_force_new())
        .with_attribute("user_account_id", Attribute::computed_string())
        .with_attribute("name", Attribute::required_string())
        .with_attribute("auth_database_name", Attribute::optional_string())
        .with_block("auth_scheme", NestedBlock::single(auth_scheme_block()).required())
        .with_block(
            "approval_config",
            NestedBlock::single(
                Block::new()
                    .with_attribute("automatic_grant", Attribute::optional_bool().with_default(false))
                    .with_attribute("max_auto_grant_duration", Attribute::optional_string()),
            ),
        )
}

/// `cyral_repository_user_account`.
pub fn resource() -> ResourceDefinition {
    ResourceDefinition::new(
        "cyral_repository_user_account",
        schema(),
        OperationSequence::create(
            ResourceOperationConfig::new(
                "RepositoryUserAccountCreate",
                OperationType::Create,
                Method::POST,
                |data, client| {
                    Ok(client.url(&format!(
                        "/v1/repos/{}/userAccounts",
                        segment(data.require_str("repository_id")?)
                    )))
                },
            )
            .with_request::<UserAccount>()
            .with_response::<CreateUserAccountResponse>(),
            read_step(),
        ),
        OperationSequence::read(read_step()),
        OperationSequence::delete(
            ResourceOperationConfig::new(
                "RepositoryUserAccountDelete",
                OperationType::Delete,
                Method::DELETE,
                account_url,
            )
            .with_error_handler(ignore_not_found("Repository user account")),
        ),
    )
    .with_update(OperationSequence::update(
        ResourceOperationConfig::new(
            "RepositoryUserAccountUpdate",
            OperationType::Update,
            Method::PUT,
            account_url,
        )
        .with_request::<UserAccount>(),
        read_step(),
    ))
    .with_importer(composed_id_importer(ID_FIELDS))
}

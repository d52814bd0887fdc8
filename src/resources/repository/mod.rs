//! `cyral_repository` and the resources attached to a repository.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::{id_url, ignore_not_found, opt_string, segment};
use crate::client::Method;
use crate::core::{
    passthrough_importer, DataSourceDefinition, IdBasedResponse, OperationSequence,
    OperationType, ResourceDefinition, ResourceOperationConfig, SchemaReader, SchemaWriter,
};
use crate::error::ProviderError;
use crate::schema::{Attribute, AttributeType, Block, NestedBlock, Schema};
use crate::state::{BlockRef, ResourceData};

pub mod access_gateway;
pub mod access_rules;
pub mod binding;
pub mod confanalysis;
pub mod confauth;
pub mod network_access;
pub mod user_account;

/// Repository types accepted by the control plane.
pub const REPO_TYPES: &[&str] = &[
    "denodo",
    "dremio",
    "dynamodb",
    "dynamodbproxy",
    "galera",
    "mariadb",
    "mongodb",
    "mysql",
    "oracle",
    "postgresql",
    "redshift",
    "s3",
    "snowflake",
    "sqlserver",
];

const MONGODB_SERVER_TYPES: &[&str] = &["replicaset", "standalone", "sharded"];
const MONGODB_FLAVORS: &[&str] = &["mongodb", "documentdb"];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepoNode {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub host: String,
    #[serde(default)]
    pub port: i64,
    #[serde(default)]
    pub dynamic: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnDraining {
    #[serde(default)]
    pub auto: bool,
    #[serde(default)]
    pub wait_time: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conn_draining: Option<ConnDraining>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MongoDbSettings {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub replica_set_name: String,
    #[serde(default)]
    pub server_type: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub srv_record_name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub flavor: String,
}

/// A repository as exchanged with `/v1/repos`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepoInfo {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(rename = "type")]
    pub repo_type: String,
    pub name: String,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub repo_nodes: Vec<RepoNode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conn_params: Option<ConnParams>,
    #[serde(
        rename = "mongoDBSettings",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub mongodb_settings: Option<MongoDbSettings>,
}

impl RepoInfo {
    /// Flat summary used by the `cyral_repository` data source.
    fn summary(&self) -> Value {
        json!({
            "id": self.id,
            "name": self.name,
            "type": self.repo_type,
            "labels": self.labels,
        })
    }
}

fn repo_node_from_block(node: BlockRef<'_>) -> RepoNode {
    RepoNode {
        name: node.get_string("name"),
        host: node.get_string("host"),
        port: node.get_i64("port").unwrap_or_default(),
        dynamic: node.get_bool("dynamic").unwrap_or_default(),
    }
}

impl SchemaReader for RepoInfo {
    fn read_from_schema(data: &ResourceData) -> Result<Self, ProviderError> {
        let repo_nodes = data
            .get_block_list("repo_node")
            .into_iter()
            .map(repo_node_from_block)
            .collect();

        let conn_params = data.get_block("connection_draining").map(|b| ConnParams {
            conn_draining: Some(ConnDraining {
                auto: b.get_bool("auto").unwrap_or_default(),
                wait_time: b.get_i64("wait_time").unwrap_or_default(),
            }),
        });

        let mongodb_settings = data.get_block("mongodb_settings").map(|b| MongoDbSettings {
            replica_set_name: b.get_string("replica_set_name"),
            server_type: b.get_string("server_type"),
            srv_record_name: b.get_string("srv_record_name"),
            flavor: b.get_string("flavor"),
        });

        Ok(Self {
            id: data.id().unwrap_or_default().to_string(),
            repo_type: data.require_str("type")?.to_string(),
            name: data.require_str("name")?.to_string(),
            labels: data.get_string_list("labels"),
            repo_nodes,
            conn_params,
            mongodb_settings,
        })
    }
}

/// `GET /v1/repos/{id}` response.
#[derive(Debug, Clone, Deserialize)]
pub struct GetRepoByIdResponse {
    pub repo: RepoInfo,
}

impl SchemaWriter for GetRepoByIdResponse {
    fn write_to_schema(&self, data: &mut ResourceData) -> Result<(), ProviderError> {
        let repo = &self.repo;
        data.set("type", repo.repo_type.clone());
        data.set("name", repo.name.clone());
        data.set("labels", repo.labels.clone());

        let nodes: Vec<Value> = repo
            .repo_nodes
            .iter()
            .map(|n| {
                json!({
                    "name": if n.name.is_empty() { Value::Null } else { json!(n.name) },
                    "host": if n.host.is_empty() { Value::Null } else { json!(n.host) },
                    "port": n.port,
                    "dynamic": n.dynamic,
                })
            })
            .collect();
        data.set("repo_node", nodes);

        let draining = repo
            .conn_params
            .as_ref()
            .and_then(|p| p.conn_draining.as_ref())
            .map(|d| json!({"auto": d.auto, "wait_time": d.wait_time}));
        data.set_opt("connection_draining", draining);

        let mongodb = repo.mongodb_settings.as_ref().map(|m| {
            json!({
                "replica_set_name": m.replica_set_name,
                "server_type": m.server_type,
                "srv_record_name": m.srv_record_name,
                "flavor": m.flavor,
            })
        });
        data.set_opt("mongodb_settings", mongodb);
        Ok(())
    }
}

const REPOS_PATH: &str = "/v1/repos";

fn schema() -> Schema {
    Schema::resource(0)
        .with_description("Manages a repository that can be protected by Cyral.")
        .with_attribute(
            "type",
            Attribute::required_string()
                .with_allowed_values(REPO_TYPES)
                .with_description("Repository type."),
        )
        .with_attribute("name", Attribute::required_string().with_description("Repository name."))
        .with_attribute("labels", Attribute::optional_string_list())
        .with_block(
            "repo_node",
            NestedBlock::list(
                Block::new()
                    .with_attribute("name", Attribute::optional_string())
                    .with_attribute("host", Attribute::optional_string())
                    .with_attribute("port", Attribute::optional_int64())
                    .with_attribute("dynamic", Attribute::optional_bool().with_default(false)),
            )
            .with_min_items(1),
        )
        .with_block(
            "connection_draining",
            NestedBlock::single(
                Block::new()
                    .with_attribute("auto", Attribute::optional_bool().with_default(false))
                    .with_attribute("wait_time", Attribute::optional_int64().with_default(0)),
            ),
        )
        .with_block(
            "mongodb_settings",
            NestedBlock::single(
                Block::new()
                    .with_attribute("replica_set_name", Attribute::optional_string())
                    .with_attribute(
                        "server_type",
                        Attribute::required_string().with_allowed_values(MONGODB_SERVER_TYPES),
                    )
                    .with_attribute("srv_record_name", Attribute::optional_string())
                    .with_attribute(
                        "flavor",
                        Attribute::optional_string().with_allowed_values(MONGODB_FLAVORS),
                    ),
            ),
        )
}

fn read_step() -> ResourceOperationConfig {
    ResourceOperationConfig::new("RepositoryRead", OperationType::Read, Method::GET, id_url(REPOS_PATH))
        .with_response::<GetRepoByIdResponse>()
        .with_error_handler(ignore_not_found("Repository"))
}

/// `cyral_repository`.
pub fn resource() -> ResourceDefinition {
    ResourceDefinition::new(
        "cyral_repository",
        schema(),
        OperationSequence::create(
            ResourceOperationConfig::new(
                "RepositoryCreate",
                OperationType::Create,
                Method::POST,
                super::fixed_url(REPOS_PATH),
            )
            .with_request::<RepoInfo>()
            .with_response::<IdBasedResponse>(),
            read_step(),
        ),
        OperationSequence::read(read_step()),
        OperationSequence::delete(
            ResourceOperationConfig::new(
                "RepositoryDelete",
                OperationType::Delete,
                Method::DELETE,
                id_url(REPOS_PATH),
            )
            .with_error_handler(ignore_not_found("Repository")),
        ),
    )
    .with_update(OperationSequence::update(
        ResourceOperationConfig::new(
            "RepositoryUpdate",
            OperationType::Update,
            Method::PUT,
            id_url(REPOS_PATH),
        )
        .with_request::<RepoInfo>(),
        read_step(),
    ))
    .with_importer(passthrough_importer())
}

/// `GET /v1/repos` response.
#[derive(Debug, Clone, Deserialize)]
pub struct GetReposResponse {
    #[serde(default)]
    pub repos: Vec<GetRepoByIdResponse>,
}

impl SchemaWriter for GetReposResponse {
    fn write_to_schema(&self, data: &mut ResourceData) -> Result<(), ProviderError> {
        let list: Vec<Value> = self.repos.iter().map(|r| r.repo.summary()).collect();
        data.set("repository_list", list);
        let id = format!(
            "{}-{}",
            data.get_string("name"),
            data.get_string("type")
        );
        data.set_id(if id == "-" { "all".to_string() } else { id });
        Ok(())
    }
}

/// `cyral_repository` data source.
pub fn data_source() -> DataSourceDefinition {
    DataSourceDefinition::new(
        "cyral_repository",
        Schema::resource(0)
            .with_description("Lists repositories, filtered by name and type.")
            .with_attribute(
                "name",
                Attribute::optional_string().with_description("Regular expression matched against the repository name."),
            )
            .with_attribute(
                "type",
                Attribute::optional_string().with_allowed_values(REPO_TYPES),
            )
            .with_attribute(
                "repository_list",
                Attribute::new(
                    AttributeType::list(AttributeType::object([
                        ("id", AttributeType::String),
                        ("name", AttributeType::String),
                        ("type", AttributeType::String),
                        ("labels", AttributeType::list(AttributeType::String)),
                    ])),
                    crate::schema::AttributeFlags::computed(),
                ),
            ),
        OperationSequence::read(
            ResourceOperationConfig::new(
                "RepositoryDataSourceRead",
                OperationType::Read,
                Method::GET,
                |data, client| {
                    let name = opt_string(data, "name").unwrap_or_default();
                    let repo_type = opt_string(data, "type").unwrap_or_default();
                    Ok(client.url(&format!(
                        "{}?name={}&type={}",
                        REPOS_PATH,
                        segment(&name),
                        segment(&repo_type)
                    )))
                },
            )
            .with_response::<GetReposResponse>(),
        ),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn repo_data() -> ResourceData {
        ResourceData::from_state(json!({
            "id": "repo-1",
            "type": "mongodb",
            "name": "mongo-prod",
            "labels": ["prod"],
            "repo_node": [{"host": "mongo.local", "port": 27017}],
            "connection_draining": {"auto": true, "wait_time": 30},
            "mongodb_settings": {"server_type": "replicaset", "replica_set_name": "rs0"},
        }))
        .unwrap()
    }

    #[test]
    fn test_read_from_schema_wire_shape() {
        let repo = RepoInfo::read_from_schema(&repo_data()).unwrap();
        let wire = serde_json::to_value(&repo).unwrap();
        assert_eq!(
            wire,
            json!({
                "id": "repo-1",
                "type": "mongodb",
                "name": "mongo-prod",
                "labels": ["prod"],
                "repoNodes": [{"host": "mongo.local", "port": 27017, "dynamic": false}],
                "connParams": {"connDraining": {"auto": true, "waitTime": 30}},
                "mongoDBSettings": {"replicaSetName": "rs0", "serverType": "replicaset"},
            })
        );
    }

    #[test]
    fn test_write_to_schema() {
        let response: GetRepoByIdResponse = serde_json::from_value(json!({
            "repo": {
                "id": "repo-1",
                "type": "postgresql",
                "name": "pg",
                "repoNodes": [{"name": "primary", "host": "pg.local", "port": 5432}],
            }
        }))
        .unwrap();

        let mut data = ResourceData::new();
        data.set_id("repo-1");
        response.write_to_schema(&mut data).unwrap();

        assert_eq!(data.get_str("type"), Some("postgresql"));
        let nodes = data.get_block_list("repo_node");
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].get_str("name"), Some("primary"));
        assert_eq!(nodes[0].get_i64("port"), Some(5432));
        assert!(data.get_block("connection_draining").is_none());
        assert!(data.get_block("mongodb_settings").is_none());
    }

    #[test]
    fn test_missing_name_rejected() {
        let data = ResourceData::from_state(json!({"type": "mysql"})).unwrap();
        assert!(RepoInfo::read_from_schema(&data).is_err());
    }

    #[test]
    fn test_data_source_response() {
        let response: GetReposResponse = serde_json::from_value(json!({
            "repos": [
                {"repo": {"id": "a", "type": "mysql", "name": "m1", "labels": ["x"]}},
                {"repo": {"id": "b", "type": "mysql", "name": "m2"}},
            ]
        }))
        .unwrap();

        let mut data = ResourceData::from_state(json!({"type": "mysql"})).unwrap();
        response.write_to_schema(&mut data).unwrap();

        assert_eq!(data.id(), Some("-mysql"));
        let list = data.get_block_list("repository_list");
        assert_eq!(list.len(), 2);
        assert_eq!(list[1].get_str("name"), Some("m2"));
    }
}

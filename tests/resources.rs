//! Resource lifecycles driven through the provider against a mocked control
//! plane.

mod common;

use cyral_provider::testing::{
    assert_gone, assert_plan_changes_attribute, assert_plan_creates, assert_plan_no_changes,
    assert_plan_replaces, assert_plan_updates_in_place,
};
use cyral_provider::ProviderError;
use serde_json::{json, Value};
use wiremock::matchers::{body_json, body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn rule_body(rows: i64) -> Value {
    json!({
        "id": "r1",
        "reads": [{"data": ["EMAIL"], "rows": rows, "severity": "medium"}],
        "hosts": ["10.0.0.1"]
    })
}

async fn mount_rule_read(server: &MockServer, body: Value) {
    Mock::given(method("GET"))
        .and(path("/v1/policies/p1/rules/r1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

mod policy_rule {
    use super::*;

    #[tokio::test]
    async fn test_create_composes_id() {
        let server = common::control_plane().await;
        Mock::given(method("POST"))
            .and(path("/v1/policies/p1/rules"))
            .and(body_partial_json(json!({
                "reads": [{"data": ["EMAIL"], "rows": 5, "severity": "medium", "rateLimit": 0}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "r1"})))
            .expect(1)
            .mount(&server)
            .await;
        mount_rule_read(&server, rule_body(5)).await;

        let tester = common::tester(&server).await;
        let config = json!({
            "policy_id": "p1",
            "reads": [{"data": ["EMAIL"], "rows": 5, "severity": "medium"}],
            "hosts": ["10.0.0.1"]
        });

        let plan = tester.plan_create("cyral_policy_rule", config.clone()).await.unwrap();
        assert_plan_creates(&plan);

        let state = tester.lifecycle_create("cyral_policy_rule", config).await.unwrap();
        assert_eq!(state["id"], "p1/r1");
        assert_eq!(state["policy_id"], "p1");
        assert_eq!(state["policy_rule_id"], "r1");
        assert_eq!(state["reads"][0]["rows"], 5);
        assert_eq!(state["hosts"], json!(["10.0.0.1"]));
    }

    #[tokio::test]
    async fn test_replan_after_create_has_no_changes() {
        let server = common::control_plane().await;
        Mock::given(method("POST"))
            .and(path("/v1/policies/p1/rules"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "r1"})))
            .mount(&server)
            .await;
        mount_rule_read(&server, json!({"id": "r1", "reads": [{"data": ["EMAIL"]}]})).await;

        let tester = common::tester(&server).await;
        let config = json!({"policy_id": "p1", "reads": [{"data": ["EMAIL"]}]});
        let state = tester
            .lifecycle_create("cyral_policy_rule", config.clone())
            .await
            .unwrap();
        assert_eq!(state["reads"][0]["rows"], 1);
        assert_eq!(state["reads"][0]["severity"], "low");
        assert_eq!(state["reads"][0]["rate_limit"], 0);

        let plan = tester
            .plan_update("cyral_policy_rule", state, config)
            .await
            .unwrap();
        assert_plan_no_changes(&plan);
    }

    #[tokio::test]
    async fn test_read_of_deleted_rule_is_gone() {
        let server = common::control_plane().await;
        Mock::given(method("GET"))
            .and(path("/v1/policies/p1/rules/r1"))
            .respond_with(ResponseTemplate::new(404).set_body_string("rule not found"))
            .mount(&server)
            .await;

        let tester = common::tester(&server).await;
        let state = tester
            .read("cyral_policy_rule", json!({"id": "p1/r1", "policy_id": "p1"}))
            .await
            .unwrap();
        assert_gone(&state);

        let refreshed = tester
            .refresh("cyral_policy_rule", json!({"id": "p1/r1", "policy_id": "p1"}))
            .await
            .unwrap();
        assert!(refreshed.is_none());
    }

    #[tokio::test]
    async fn test_delete_of_deleted_rule_succeeds() {
        let server = common::control_plane().await;
        Mock::given(method("DELETE"))
            .and(path("/v1/policies/p1/rules/r1"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let tester = common::tester(&server).await;
        tester
            .lifecycle_delete("cyral_policy_rule", json!({"id": "p1/r1", "policy_id": "p1"}))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_import_by_composed_id() {
        let server = common::control_plane().await;
        mount_rule_read(&server, rule_body(1)).await;

        let tester = common::tester(&server).await;
        let imported = tester
            .import_resource("cyral_policy_rule", "p1/r1")
            .await
            .unwrap();

        assert_eq!(imported.len(), 1);
        assert_eq!(imported[0].state["id"], "p1/r1");
        assert_eq!(imported[0].state["policy_id"], "p1");
        assert_eq!(imported[0].state["reads"][0]["severity"], "medium");
    }

    #[tokio::test]
    async fn test_import_rejects_malformed_id() {
        let server = common::control_plane().await;
        let tester = common::tester(&server).await;

        let err = tester
            .import_resource("cyral_policy_rule", "r1")
            .await
            .unwrap_err();
        assert!(matches!(err.root(), ProviderError::InvalidId { .. }), "{}", err);
        assert!(err.to_string().contains("{policy_id}/{policy_rule_id}"));
    }

    #[tokio::test]
    async fn test_update_in_place_then_moving_policy_replaces() {
        let server = common::control_plane().await;
        Mock::given(method("PUT"))
            .and(path("/v1/policies/p1/rules/r1"))
            .and(body_partial_json(json!({"reads": [{"rows": 10}]})))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;
        mount_rule_read(&server, rule_body(10)).await;

        let tester = common::tester(&server).await;
        let prior = json!({
            "id": "p1/r1",
            "policy_id": "p1",
            "policy_rule_id": "r1",
            "reads": [{"data": ["EMAIL"], "rows": 5, "severity": "medium", "rate_limit": 0, "dataset_rewrites": []}],
            "hosts": ["10.0.0.1"]
        });

        let updated_config = json!({
            "policy_id": "p1",
            "reads": [{"data": ["EMAIL"], "rows": 10, "severity": "medium"}],
            "hosts": ["10.0.0.1"]
        });
        let plan = tester
            .plan_update("cyral_policy_rule", prior.clone(), updated_config.clone())
            .await
            .unwrap();
        assert_plan_updates_in_place(&plan);
        assert_plan_changes_attribute(&plan, "reads");

        let state = tester
            .lifecycle_update("cyral_policy_rule", prior.clone(), updated_config)
            .await
            .unwrap();
        assert_eq!(state["reads"][0]["rows"], 10);

        let moved = tester
            .plan_update(
                "cyral_policy_rule",
                prior,
                json!({"policy_id": "p2", "hosts": ["10.0.0.1"]}),
            )
            .await
            .unwrap();
        assert_plan_replaces(&moved);
    }

    #[tokio::test]
    async fn test_v0_state_upgrades_then_reads() {
        let server = common::control_plane().await;
        mount_rule_read(&server, rule_body(1)).await;

        let tester = common::tester(&server).await;
        let upgraded = tester
            .upgrade_resource_state("cyral_policy_rule", 0, json!({"id": "r1", "policy_id": "p1"}))
            .await
            .unwrap();
        assert_eq!(upgraded["id"], "p1/r1");

        let state = tester.read("cyral_policy_rule", upgraded).await.unwrap();
        assert_eq!(state["policy_rule_id"], "r1");
    }
}

mod sidecar {
    use super::*;

    #[tokio::test]
    async fn test_crud_lifecycle() {
        let server = common::control_plane().await;
        Mock::given(method("POST"))
            .and(path("/v1/sidecars"))
            .and(body_json(json!({
                "name": "edge",
                "labels": [],
                "properties": {"deploymentMethod": "helm3"}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "s1"})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/sidecars/s1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "name": "edge",
                "labels": [],
                "properties": {"deploymentMethod": "helm3"}
            })))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/v1/sidecars/s1"))
            .and(body_partial_json(json!({"name": "edge-2"})))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/sidecars/s1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "name": "edge-2",
                "labels": [],
                "properties": {"deploymentMethod": "helm3"}
            })))
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/v1/sidecars/s1"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let tester = common::tester(&server).await;
        let state = tester
            .lifecycle_crud(
                "cyral_sidecar",
                json!({"name": "edge", "deployment_method": "helm3"}),
                json!({"name": "edge-2", "deployment_method": "helm3"}),
            )
            .await
            .unwrap();

        assert_eq!(state["id"], "s1");
        assert_eq!(state["name"], "edge-2");
    }

    #[tokio::test]
    async fn test_invalid_deployment_method_is_rejected_before_any_request() {
        let server = MockServer::start().await;
        let tester = common::tester(&server).await;

        let err = tester
            .lifecycle_create("cyral_sidecar", json!({"name": "edge", "deployment_method": "ftp"}))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("deployment_method"), "{}", err);
        assert!(server.received_requests().await.unwrap_or_default().is_empty());
    }
}

mod sidecar_listener {
    use super::*;

    #[tokio::test]
    async fn test_replan_after_create_has_no_changes() {
        let server = common::control_plane().await;
        Mock::given(method("POST"))
            .and(path("/v1/sidecars/sc1/listeners"))
            .and(body_json(json!({"listener": {
                "repoTypes": ["mysql"],
                "networkAddress": {"port": 3306},
                "mysqlSettings": {"dbVersion": "8.0.4"},
            }})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"listenerId": "l1"})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/sidecars/sc1/listeners/l1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "listenerConfig": {"listener": {
                    "id": "l1",
                    "repoTypes": ["mysql"],
                    "networkAddress": {"port": 3306},
                    "mysqlSettings": {"dbVersion": "8.0.4"},
                }}
            })))
            .mount(&server)
            .await;

        let tester = common::tester(&server).await;
        let config = json!({
            "sidecar_id": "sc1",
            "repo_types": ["mysql"],
            "network_address": [{"port": 3306}],
            "mysql_settings": {"db_version": "8.0.4"},
        });
        let state = tester
            .lifecycle_create("cyral_sidecar_listener", config.clone())
            .await
            .unwrap();
        assert_eq!(state["id"], "sc1/l1");
        assert_eq!(state["mysql_settings"]["character_set"], "");

        let plan = tester
            .plan_update("cyral_sidecar_listener", state, config)
            .await
            .unwrap();
        assert_plan_no_changes(&plan);
    }
}

mod repository {
    use super::*;

    #[tokio::test]
    async fn test_replan_after_create_has_no_changes() {
        let server = common::control_plane().await;
        Mock::given(method("POST"))
            .and(path("/v1/repos"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "repo-1"})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/repos/repo-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "repo": {
                    "id": "repo-1",
                    "type": "mongodb",
                    "name": "users",
                    "repoNodes": [{"host": "mongo.internal", "port": 27017}],
                    "mongoDBSettings": {"serverType": "standalone"},
                }
            })))
            .mount(&server)
            .await;

        let tester = common::tester(&server).await;
        let config = json!({
            "type": "mongodb",
            "name": "users",
            "repo_node": [{"host": "mongo.internal", "port": 27017}],
            "mongodb_settings": {"server_type": "standalone"},
        });
        let state = tester
            .lifecycle_create("cyral_repository", config.clone())
            .await
            .unwrap();
        assert_eq!(state["id"], "repo-1");
        assert_eq!(state["repo_node"][0]["dynamic"], false);

        let plan = tester
            .plan_update("cyral_repository", state.clone(), config)
            .await
            .unwrap();
        assert_plan_no_changes(&plan);

        let new_port = tester
            .plan_update(
                "cyral_repository",
                state,
                json!({
                    "type": "mongodb",
                    "name": "users",
                    "repo_node": [{"host": "mongo.internal", "port": 27018}],
                    "mongodb_settings": {"server_type": "standalone"},
                }),
            )
            .await
            .unwrap();
        assert_plan_changes_attribute(&new_port, "repo_node");
        assert_plan_updates_in_place(&new_port);
    }
}

mod saml_draft {
    use super::*;

    async fn mount_missing_draft(server: &MockServer) {
        Mock::given(method("GET"))
            .and(path("/v1/integrations/generic-saml/drafts/d1"))
            .respond_with(ResponseTemplate::new(404))
            .mount(server)
            .await;
    }

    fn draft_state() -> Value {
        json!({"id": "d1", "display_name": "okta"})
    }

    #[tokio::test]
    async fn test_completed_draft_is_removed_from_state() {
        let server = common::control_plane().await;
        mount_missing_draft(&server).await;
        Mock::given(method("GET"))
            .and(path("/v1/integrations/generic-saml/sso/d1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"idpIntegration": {}})))
            .expect(1)
            .mount(&server)
            .await;

        let tester = common::tester(&server).await;
        let state = tester
            .read("cyral_integration_idp_saml_draft", draft_state())
            .await
            .unwrap();
        assert_gone(&state);
    }

    #[tokio::test]
    async fn test_deleted_draft_is_removed_from_state() {
        let server = common::control_plane().await;
        mount_missing_draft(&server).await;
        Mock::given(method("GET"))
            .and(path("/v1/integrations/generic-saml/sso/d1"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let tester = common::tester(&server).await;
        let state = tester
            .read("cyral_integration_idp_saml_draft", draft_state())
            .await
            .unwrap();
        assert_gone(&state);
    }

    #[tokio::test]
    async fn test_integration_lookup_failure_propagates() {
        let server = common::control_plane().await;
        mount_missing_draft(&server).await;
        Mock::given(method("GET"))
            .and(path("/v1/integrations/generic-saml/sso/d1"))
            .respond_with(ResponseTemplate::new(500).set_body_string("internal"))
            .mount(&server)
            .await;

        let tester = common::tester(&server).await;
        let err = tester
            .read("cyral_integration_idp_saml_draft", draft_state())
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), Some(500));
    }

    #[tokio::test]
    async fn test_existing_draft_keeps_metadata() {
        let server = common::control_plane().await;
        Mock::given(method("GET"))
            .and(path("/v1/integrations/generic-saml/drafts/d1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "draft": {
                    "id": "d1",
                    "displayName": "okta",
                    "spMetadata": {"entityID": "urn:cyral", "url": "https://sp/metadata"}
                }
            })))
            .mount(&server)
            .await;

        let tester = common::tester(&server).await;
        let state = tester
            .read("cyral_integration_idp_saml_draft", draft_state())
            .await
            .unwrap();
        assert_eq!(state["id"], "d1");
        assert_eq!(state["service_provider_metadata"]["entity_id"], "urn:cyral");
    }
}

mod data_sources {
    use super::*;

    async fn mount_sidecars(server: &MockServer) {
        Mock::given(method("GET"))
            .and(path("/v1/sidecars"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"id": "s1", "sidecar": {"name": "edge"}},
                {"id": "s2", "sidecar": {"name": "core"}}
            ])))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_sidecar_id_by_name() {
        let server = common::control_plane().await;
        mount_sidecars(&server).await;

        let tester = common::tester(&server).await;
        let state = tester
            .read_data_source("cyral_sidecar_id", json!({"sidecar_name": "core"}))
            .await
            .unwrap();
        assert_eq!(state["id"], "s2");
    }

    #[tokio::test]
    async fn test_unknown_sidecar_name_fails() {
        let server = common::control_plane().await;
        mount_sidecars(&server).await;

        let tester = common::tester(&server).await;
        let err = tester
            .read_data_source("cyral_sidecar_id", json!({"sidecar_name": "missing"}))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("missing"), "{}", err);
    }

    #[tokio::test]
    async fn test_bound_ports() {
        let server = common::control_plane().await;
        Mock::given(method("GET"))
            .and(path("/v1/sidecars/s1/listeners"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "listenerConfigs": [
                    {"listener": {"repoTypes": ["postgresql"], "networkAddress": {"port": 5432}}},
                    {"listener": {"repoTypes": ["mysql"], "networkAddress": {"port": 3306}}},
                    {"listener": {"repoTypes": ["postgresql"], "networkAddress": {"port": 5432}}}
                ]
            })))
            .mount(&server)
            .await;

        let tester = common::tester(&server).await;
        let state = tester
            .read_data_source("cyral_sidecar_bound_ports", json!({"sidecar_id": "s1"}))
            .await
            .unwrap();
        assert_eq!(state["id"], "s1");
        assert_eq!(state["bound_ports"], json!([3306, 5432]));
    }

    #[tokio::test]
    async fn test_system_info() {
        let server = common::control_plane().await;
        Mock::given(method("GET"))
            .and(path("/v1/systemInfo"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "controlPlaneVersion": "v4.10.1",
                "sidecarLatestVersion": "v4.10.0"
            })))
            .mount(&server)
            .await;

        let tester = common::tester(&server).await;
        let state = tester
            .read_data_source("cyral_system_info", json!({}))
            .await
            .unwrap();
        assert_eq!(state["id"], "system-info");
        assert_eq!(state["sidecar_latest_version"], "v4.10.0");
    }
}

//! Property-based tests for composed resource IDs.

use cyral_provider::ids::{marshal_composed_id, unmarshal_composed_id, ID_SEPARATOR};
use cyral_provider::CyralProvider;
use cyral_provider::ProviderService;
use proptest::prelude::*;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;

/// Any segment that does not contain the separator, including the empty one.
fn arb_segment() -> impl Strategy<Value = String> {
    "[^/]{0,24}"
}

/// Attributes a v0 rule state may carry next to its ID.
fn arb_rule_attributes() -> impl Strategy<Value = BTreeMap<String, Value>> {
    prop::collection::btree_map(
        "[a-z_]{1,12}",
        prop_oneof![
            any::<i64>().prop_map(Value::from),
            "[a-z0-9 ]{0,8}".prop_map(Value::from),
            prop::collection::vec("[A-Z]{1,6}", 0..3).prop_map(|v| json!([{"data": v}])),
        ],
        0..6,
    )
}

proptest! {
    #[test]
    fn composed_ids_split_back_into_their_parts(
        parts in prop::collection::vec(arb_segment(), 1..5)
    ) {
        let id = marshal_composed_id(&parts, ID_SEPARATOR);
        let split = unmarshal_composed_id(&id, ID_SEPARATOR, parts.len()).unwrap();
        prop_assert_eq!(split, parts);
    }

    #[test]
    fn wrong_field_count_is_rejected(
        parts in prop::collection::vec(arb_segment(), 1..5),
        extra in 1usize..3
    ) {
        let id = marshal_composed_id(&parts, ID_SEPARATOR);
        prop_assert!(unmarshal_composed_id(&id, ID_SEPARATOR, parts.len() + extra).is_err());
    }

    #[test]
    fn v0_rule_state_gains_policy_prefix(
        policy_id in arb_segment(),
        rule_id in arb_segment(),
        attributes in arb_rule_attributes()
    ) {
        let mut state: Map<String, Value> = attributes.into_iter().collect();
        state.insert("id".to_string(), json!(rule_id));
        state.insert("policy_id".to_string(), json!(policy_id));

        let mut expected = state.clone();
        expected.insert("id".to_string(), json!(format!("{}/{}", policy_id, rule_id)));

        let provider = CyralProvider::new().unwrap();
        let upgraded = tokio_test::block_on(provider.upgrade_resource_state(
            "cyral_policy_rule",
            0,
            Value::Object(state),
        ))
        .unwrap();
        prop_assert_eq!(upgraded, Value::Object(expected));
    }
}

#[test]
fn current_rule_state_is_left_alone() {
    let provider = CyralProvider::new().unwrap();
    let state = json!({"id": "p1/r1", "policy_id": "p1"});
    let upgraded = tokio_test::block_on(provider.upgrade_resource_state(
        "cyral_policy_rule",
        1,
        state.clone(),
    ))
    .unwrap();
    assert_eq!(upgraded, state);
}

#[test]
fn unknown_state_version_is_rejected() {
    let provider = CyralProvider::new().unwrap();
    let result = tokio_test::block_on(provider.upgrade_resource_state(
        "cyral_sidecar",
        -1,
        json!({"id": "s1"}),
    ));
    assert!(result.is_err());
}

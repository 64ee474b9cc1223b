//! Deep merge of a sparse patch onto a state tree.

use serde_json::{Map, Value};

/// Apply a sparse patch onto `base` in place.
///
/// Object-valued patch fields recurse. Everything else (primitives, arrays,
/// null) is a leaf and replaces whatever `base` holds at that key, including
/// keys `base` never had. A shape conflict, where the patch descends into a
/// position whose base value is not an object, replaces the base value
/// wholesale: a mismatch between old shape and new patch shape is an
/// intentional shape replacement, not an error.
///
/// The store calls this on a fresh clone of the current root, so the merged
/// tree is always a new allocation and previously returned roots stay
/// untouched.
pub fn merge(base: &mut Value, patch: &Value) {
    let changes = match patch.as_object() {
        Some(changes) => changes,
        None => {
            *base = patch.clone();
            return;
        }
    };

    if !base.is_object() {
        *base = Value::Object(Map::new());
    }

    if let Value::Object(fields) = base {
        for (key, change) in changes {
            match fields.get_mut(key) {
                Some(slot) if change.is_object() => merge(slot, change),
                Some(slot) => *slot = change.clone(),
                None => {
                    fields.insert(key.clone(), change.clone());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn merged(base: Value, patch: Value) -> Value {
        let mut result = base;
        merge(&mut result, &patch);
        result
    }

    #[test]
    fn test_updates_nested_field() {
        let result = merged(json!({"a": {"b": "c"}, "d": "e"}), json!({"a": {"b": "f"}}));
        assert_eq!(result, json!({"a": {"b": "f"}, "d": "e"}));
    }

    #[test]
    fn test_keeps_unmentioned_keys() {
        let result = merged(
            json!({"text": "ABC", "data": "Useless", "obj": {"x": 1, "y": 2}}),
            json!({"obj": {"x": 10}}),
        );
        assert_eq!(result, json!({"text": "ABC", "data": "Useless", "obj": {"x": 10, "y": 2}}));
    }

    #[test]
    fn test_introduces_new_keys() {
        let result = merged(json!({"a": 1}), json!({"b": 2, "c": {"d": 3}}));
        assert_eq!(result, json!({"a": 1, "b": 2, "c": {"d": 3}}));
    }

    #[test]
    fn test_arrays_are_leaves() {
        // Arrays replace wholesale, never merge element-wise.
        let result = merged(json!({"items": [1, 2, 3]}), json!({"items": [9]}));
        assert_eq!(result, json!({"items": [9]}));
    }

    #[test]
    fn test_shape_conflict_overwrites() {
        let result = merged(json!({"a": "x"}), json!({"a": {"b": 1}}));
        assert_eq!(result, json!({"a": {"b": 1}}));
    }

    #[test]
    fn test_shape_conflict_object_to_leaf() {
        let result = merged(json!({"a": {"b": 1}}), json!({"a": "flat"}));
        assert_eq!(result, json!({"a": "flat"}));
    }

    #[test]
    fn test_null_is_a_leaf() {
        let result = merged(json!({"a": {"b": 1}}), json!({"a": null}));
        assert_eq!(result, json!({"a": null}));
    }

    #[test]
    fn test_non_object_patch_replaces_base() {
        let result = merged(json!({"a": 1}), json!("flat"));
        assert_eq!(result, json!("flat"));
    }

    #[test]
    fn test_empty_patch_is_identity() {
        let base = json!({"a": {"b": 1}, "c": [1, 2]});
        assert_eq!(merged(base.clone(), json!({})), base);
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        fn arb_leaf() -> impl Strategy<Value = Value> {
            prop_oneof![
                Just(Value::Null),
                any::<bool>().prop_map(Value::Bool),
                any::<i32>().prop_map(|n| json!(n)),
                "[a-z]{0,6}".prop_map(Value::String),
            ]
        }

        fn arb_tree() -> impl Strategy<Value = Value> {
            arb_leaf().prop_recursive(3, 24, 4, |inner| {
                prop::collection::btree_map("[a-e]{1,2}", inner, 0..4)
                    .prop_map(|fields| Value::Object(fields.into_iter().collect()))
            })
        }

        fn arb_object() -> impl Strategy<Value = Value> {
            prop::collection::btree_map("[a-e]{1,2}", arb_tree(), 0..4)
                .prop_map(|fields| Value::Object(fields.into_iter().collect()))
        }

        /// Keys not mentioned by the patch keep their base value, at every
        /// level the patch recurses into.
        fn check_unmentioned_kept(base: &Value, patch: &Value, result: &Value) {
            let (base_fields, patch_fields, result_fields) =
                match (base.as_object(), patch.as_object(), result.as_object()) {
                    (Some(b), Some(p), Some(r)) => (b, p, r),
                    _ => return,
                };
            for (key, base_value) in base_fields {
                match patch_fields.get(key) {
                    None => assert_eq!(result_fields.get(key), Some(base_value)),
                    Some(change) if change.is_object() && base_value.is_object() => {
                        check_unmentioned_kept(base_value, change, &result_fields[key]);
                    }
                    Some(_) => {}
                }
            }
        }

        /// Leaf keys mentioned by the patch end up with the patch value.
        fn check_mentioned_set(patch: &Value, result: &Value) {
            let (patch_fields, result_fields) = match (patch.as_object(), result.as_object()) {
                (Some(p), Some(r)) => (p, r),
                _ => return,
            };
            for (key, change) in patch_fields {
                if change.is_object() {
                    check_mentioned_set(change, &result_fields[key]);
                } else {
                    assert_eq!(result_fields.get(key), Some(change));
                }
            }
        }

        proptest! {
            #[test]
            fn merge_keeps_unmentioned_and_sets_mentioned(
                base in arb_object(),
                patch in arb_object(),
            ) {
                let mut result = base.clone();
                merge(&mut result, &patch);
                check_unmentioned_kept(&base, &patch, &result);
                check_mentioned_set(&patch, &result);
            }

            #[test]
            fn merge_with_empty_patch_is_identity(base in arb_object()) {
                let mut result = base.clone();
                merge(&mut result, &json!({}));
                prop_assert_eq!(result, base);
            }
        }
    }
}

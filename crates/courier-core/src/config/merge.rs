//! Recursive merge of a base config value with an override.

use serde_json::Value;

/// Merge `overlay` on top of `base`.
///
/// - objects: merged key by key, recursively
/// - arrays: merged index by index; extra base elements are kept
/// - anything else: `overlay` wins
pub fn deep_merge(base: &Value, overlay: &Value) -> Value {
    match (base, overlay) {
        (Value::Object(base), Value::Object(overlay)) => {
            let mut merged = base.clone();
            for (key, value) in overlay {
                let next = match merged.get(key) {
                    Some(existing) => deep_merge(existing, value),
                    None => value.clone(),
                };
                merged.insert(key.clone(), next);
            }
            Value::Object(merged)
        }
        (Value::Array(base), Value::Array(overlay)) => {
            let len = base.len().max(overlay.len());
            let merged = (0..len)
                .map(|i| match (base.get(i), overlay.get(i)) {
                    (Some(b), Some(o)) => deep_merge(b, o),
                    (Some(b), None) => b.clone(),
                    (None, Some(o)) => o.clone(),
                    (None, None) => Value::Null,
                })
                .collect();
            Value::Array(merged)
        }
        (_, overlay) => overlay.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    #[test]
    fn override_key_wins_and_base_keys_survive() {
        let merged = deep_merge(&json!({"a": 1, "b": 2}), &json!({"b": 3}));
        assert_eq!(merged, json!({"a": 1, "b": 3}));
    }

    #[test]
    fn nested_objects_are_merged_not_replaced() {
        let base = json!({"delete": {"enabled": true, "error": {"suppression": false}}});
        let overlay = json!({"delete": {"error": {"suppression": true}}});

        let merged = deep_merge(&base, &overlay);
        assert_eq!(
            merged,
            json!({"delete": {"enabled": true, "error": {"suppression": true}}})
        );
    }

    #[test]
    fn arrays_are_merged_by_index() {
        let base = json!({"tags": ["a", "b", "c"]});
        let overlay = json!({"tags": ["x"]});

        let merged = deep_merge(&base, &overlay);
        assert_eq!(merged, json!({"tags": ["x", "b", "c"]}));
    }

    #[rstest]
    #[case::scalar_over_object(json!({"a": 1}), json!(5), json!(5))]
    #[case::object_over_scalar(json!(5), json!({"a": 1}), json!({"a": 1}))]
    #[case::null_overrides(json!({"a": 1}), json!({"a": null}), json!({"a": null}))]
    fn mismatched_shapes_take_the_override(
        #[case] base: Value,
        #[case] overlay: Value,
        #[case] expected: Value,
    ) {
        assert_eq!(deep_merge(&base, &overlay), expected);
    }
}

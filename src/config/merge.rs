//! Configuration merge logic
//!
//! - Objects: deep-merge by key
//! - Arrays: REPLACE (last wins)
//! - Scalars: override (last wins)

use serde_json::Value;

/// Deep merge two JSON values. `null` in the overlay overrides too, which
/// is how a later layer unsets an optional key.
pub fn deep_merge(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        (Value::Object(mut base_map), Value::Object(overlay_map)) => {
            for (key, overlay_value) in overlay_map {
                let merged = match base_map.remove(&key) {
                    Some(base_value) => deep_merge(base_value, overlay_value),
                    None => overlay_value,
                };
                base_map.insert(key, merged);
            }
            Value::Object(base_map)
        }

        // Anything else, arrays included: overlay wins
        (_, overlay) => overlay,
    }
}

/// Merge layers in order (first is base, last has highest precedence)
pub fn merge_layers(layers: Vec<Value>) -> Value {
    layers.into_iter().fold(Value::Null, deep_merge)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_object_deep_merge() {
        let base = json!({"server": {"bind": "0.0.0.0:8080", "workers": 4}});
        let overlay = json!({"server": {"workers": 16}});
        let result = deep_merge(base, overlay);

        assert_eq!(result["server"]["workers"], 16);
        assert_eq!(result["server"]["bind"], "0.0.0.0:8080");
    }

    #[test]
    fn test_array_replace() {
        let base = json!({"hosts": ["a", "b", "c"]});
        let overlay = json!({"hosts": ["x"]});
        let result = deep_merge(base, overlay);
        assert_eq!(result["hosts"], json!(["x"]));
    }

    #[test]
    fn test_null_unsets() {
        let base = json!({"audit": {"max_candidates": 8}});
        let overlay = json!({"audit": {"max_candidates": null}});
        let result = deep_merge(base, overlay);
        assert!(result["audit"]["max_candidates"].is_null());
    }

    #[test]
    fn test_merge_layers() {
        let builtin = json!({"registry": {"scheme": "https", "timeout_ms": 10000}});
        let file = json!({"registry": {"timeout_ms": 2000}, "manifests": {"dir": "/etc/promo"}});
        let cli = json!({"manifests": {"dir": "./local"}});

        let result = merge_layers(vec![builtin, file, cli]);

        assert_eq!(result["registry"]["scheme"], "https");
        assert_eq!(result["registry"]["timeout_ms"], 2000);
        assert_eq!(result["manifests"]["dir"], "./local");
    }
}

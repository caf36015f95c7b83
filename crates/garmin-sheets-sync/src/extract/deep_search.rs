//! Key lookup inside Garmin payloads whose shape drifts between API
//! versions and devices.
//!
//! Only `null` and missing keys count as "not found". `0`, `""` and `false`
//! are real measurements and are returned like any other value.

use serde_json::Value;

/// Nesting depth beyond which a subtree is treated as absent.
pub const MAX_DEPTH: usize = 64;

/// Find the first non-null value stored under `key` anywhere in `tree`.
///
/// A direct, non-null hit on the top-level mapping wins over anything nested
/// deeper. Otherwise children are searched depth-first in iteration order.
pub fn find<'a>(tree: &'a Value, key: &str) -> Option<&'a Value> {
    find_bounded(tree, key, 0)
}

fn find_bounded<'a>(tree: &'a Value, key: &str, depth: usize) -> Option<&'a Value> {
    if depth > MAX_DEPTH {
        return None;
    }

    match tree {
        Value::Object(map) => {
            if let Some(hit) = map.get(key).filter(|v| !v.is_null()) {
                return Some(hit);
            }
            map.values()
                .filter(|v| v.is_object() || v.is_array())
                .find_map(|v| find_bounded(v, key, depth + 1))
        }
        Value::Array(items) => items.iter().find_map(|v| find_bounded(v, key, depth + 1)),
        _ => None,
    }
}

/// Follow an exact key chain from the root. A `null` at the end of the chain
/// is reported as absent.
pub fn lookup<'a>(tree: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter()
        .try_fold(tree, |node, segment| node.get(*segment))
        .filter(|v| !v.is_null())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_find_nested_value() {
        let tree = json!({
            "dailySleepDTO": { "sleepScores": { "overall": { "value": 81 } } }
        });
        assert_eq!(find(&tree, "value"), Some(&json!(81)));
    }

    #[test]
    fn test_find_missing_key() {
        let tree = json!({ "a": { "b": [1, 2, { "c": 3 }] } });
        assert_eq!(find(&tree, "sleepScore"), None);
    }

    #[test]
    fn test_find_returns_zero_and_empty_string() {
        assert_eq!(find(&json!({ "x": { "acuteLoad": 0 } }), "acuteLoad"), Some(&json!(0)));
        assert_eq!(find(&json!([{ "name": "" }]), "name"), Some(&json!("")));
        assert_eq!(find(&json!({ "flag": false }), "flag"), Some(&json!(false)));
    }

    #[test]
    fn test_find_skips_null_and_keeps_searching() {
        let tree = json!({
            "sleepScore": null,
            "nested": { "sleepScore": 77 }
        });
        assert_eq!(find(&tree, "sleepScore"), Some(&json!(77)));
    }

    #[test]
    fn test_top_level_hit_wins_over_deeper_value() {
        let tree = json!({
            "deeper": { "vo2MaxValue": 40 },
            "vo2MaxValue": 52
        });
        assert_eq!(find(&tree, "vo2MaxValue"), Some(&json!(52)));
    }

    #[test]
    fn test_first_match_in_iteration_order() {
        let tree = json!([
            { "other": 1 },
            { "inner": { "lastNightAvg": 48 } },
            { "lastNightAvg": 60 }
        ]);
        assert_eq!(find(&tree, "lastNightAvg"), Some(&json!(48)));
    }

    #[test]
    fn test_scalars_and_null_are_absent() {
        assert_eq!(find(&json!(42), "x"), None);
        assert_eq!(find(&Value::Null, "x"), None);
        assert_eq!(find(&json!("x"), "x"), None);
    }

    #[test]
    fn test_depth_limit_fails_safe() {
        let mut tree = json!({ "needle": 1 });
        for _ in 0..(MAX_DEPTH + 10) {
            tree = json!({ "wrap": tree });
        }
        assert_eq!(find(&tree, "needle"), None);

        let mut shallow = json!({ "needle": 1 });
        for _ in 0..10 {
            shallow = json!({ "wrap": shallow });
        }
        assert_eq!(find(&shallow, "needle"), Some(&json!(1)));
    }

    #[test]
    fn test_lookup_key_chain() {
        let tree = json!({ "hrvSummary": { "lastNightAvg": 55, "status": null } });
        assert_eq!(lookup(&tree, &["hrvSummary", "lastNightAvg"]), Some(&json!(55)));
        assert_eq!(lookup(&tree, &["hrvSummary", "status"]), None);
        assert_eq!(lookup(&tree, &["hrvSummary", "missing"]), None);
        assert_eq!(lookup(&json!([]), &["a"]), None);
    }
}

//! Document normalization passes that run around flattening.
//!
//! `unify_xms_paths` runs before flattening and folds `x-ms-paths` entries
//! into `paths`; `enforce_strictness` runs after flattening and closes every
//! definition that does not opt into open objects.

use serde_json::{Map, Value};

/// Fold `x-ms-paths` into `paths` so operation iteration sees one map.
///
/// `x-ms-paths` holds path templates that are illegal in plain `paths`
/// (query strings in the template). Entries already present in `paths` are
/// left alone. The `x-ms-paths` key is removed afterward.
pub fn unify_xms_paths(doc: &mut Value) {
    let Some(root) = doc.as_object_mut() else {
        return;
    };
    let Some(Value::Object(extra)) = root.remove("x-ms-paths") else {
        return;
    };

    let paths = root
        .entry("paths")
        .or_insert_with(|| Value::Object(Map::new()));
    if let Some(paths) = paths.as_object_mut() {
        for (template, item) in extra {
            paths.entry(template).or_insert(item);
        }
    }
}

/// Insert `additionalProperties: false` into every definition that does not
/// set `additionalProperties` itself. Shallow per model; nested property
/// schemas are untouched.
pub fn enforce_strictness(doc: &mut Value) {
    let Some(defs) = doc.get_mut("definitions").and_then(Value::as_object_mut) else {
        return;
    };

    for model in defs.values_mut() {
        if let Some(model) = model.as_object_mut() {
            model
                .entry("additionalProperties")
                .or_insert(Value::Bool(false));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn xms_paths_merge_into_paths() {
        let mut doc = json!({
            "paths": {
                "/widgets": { "get": {} }
            },
            "x-ms-paths": {
                "/widgets?kind=special": { "get": {} }
            }
        });
        unify_xms_paths(&mut doc);

        assert!(doc.get("x-ms-paths").is_none());
        let paths = doc["paths"].as_object().unwrap();
        assert!(paths.contains_key("/widgets"));
        assert!(paths.contains_key("/widgets?kind=special"));
    }

    #[test]
    fn existing_paths_entry_wins() {
        let mut doc = json!({
            "paths": { "/widgets": { "get": { "operationId": "fromPaths" } } },
            "x-ms-paths": { "/widgets": { "get": { "operationId": "fromXms" } } }
        });
        unify_xms_paths(&mut doc);
        assert_eq!(doc["paths"]["/widgets"]["get"]["operationId"], "fromPaths");
    }

    #[test]
    fn xms_paths_without_paths_creates_paths() {
        let mut doc = json!({
            "x-ms-paths": { "/widgets?kind=a": { "get": {} } }
        });
        unify_xms_paths(&mut doc);
        assert!(doc["paths"]["/widgets?kind=a"].is_object());
    }

    #[test]
    fn strictness_closes_open_definitions() {
        let mut doc = json!({
            "definitions": {
                "Closed": { "type": "object" },
                "Open": { "type": "object", "additionalProperties": true },
                "Typed": {
                    "type": "object",
                    "additionalProperties": { "type": "string" }
                }
            }
        });
        enforce_strictness(&mut doc);

        assert_eq!(doc["definitions"]["Closed"]["additionalProperties"], json!(false));
        assert_eq!(doc["definitions"]["Open"]["additionalProperties"], json!(true));
        assert_eq!(
            doc["definitions"]["Typed"]["additionalProperties"],
            json!({ "type": "string" })
        );
    }

    #[test]
    fn strictness_is_shallow() {
        let mut doc = json!({
            "definitions": {
                "Outer": {
                    "type": "object",
                    "properties": {
                        "inner": { "type": "object" }
                    }
                }
            }
        });
        enforce_strictness(&mut doc);

        let outer = &doc["definitions"]["Outer"];
        assert_eq!(outer["additionalProperties"], json!(false));
        assert!(outer["properties"]["inner"].get("additionalProperties").is_none());
    }

    #[test]
    fn strictness_without_definitions_is_noop() {
        let mut doc = json!({ "paths": {} });
        enforce_strictness(&mut doc);
        assert!(doc.get("definitions").is_none());
    }
}

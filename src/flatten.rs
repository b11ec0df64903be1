//! `allOf` flattening for model definitions.
//!
//! Every definition with an `allOf` list is merged with its (recursively
//! flattened) parents: properties are a shallow union with the child winning
//! on name collisions, `required` is a set union, and `x-ms-azure-resource`
//! is inherited unless the child overrides it. After merging, the `allOf`
//! key is removed. Discriminator relationships discovered along the way are
//! recorded into an [`InheritanceForest`].
//!
//! Models are processed recursively per model, not in document order: a
//! model may appear as another's ancestor before its own flattening has run,
//! and re-flattening an already-flattened ancestor is a no-op. In-progress
//! model names are tracked so a cyclic `allOf` chain fails with
//! [`SpecError::CyclicAllOf`] instead of recursing forever.

use std::collections::HashSet;

use serde_json::{Map, Value};

use crate::error::SpecError;
use crate::inheritance::InheritanceForest;
use crate::loader::{parent_dir, DocumentCache};
use crate::refs::RefResolver;

/// Flatten every definition in the document, in place.
///
/// Returns the inheritance forest built from discriminator parents. A
/// reference to a non-existent model fails with `ObjectNotFound` and aborts
/// the document's flattening.
pub fn flatten_definitions(
    doc: &mut Value,
    resolver: &RefResolver,
) -> Result<InheritanceForest, SpecError> {
    let mut forest = InheritanceForest::new();
    let Some(defs) = doc.get("definitions").and_then(Value::as_object).cloned() else {
        return Ok(forest);
    };

    // Snapshot for resolving allOf members that point outside `definitions`.
    let snapshot = doc.clone();
    let mut defs = defs;
    let mut in_progress = HashSet::new();
    let mut done = HashSet::new();

    let names: Vec<String> = defs.keys().cloned().collect();
    for name in &names {
        flatten_model(
            name,
            &mut defs,
            &snapshot,
            resolver,
            &mut in_progress,
            &mut done,
            &mut forest,
        )?;
    }

    doc["definitions"] = Value::Object(defs);
    Ok(forest)
}

fn flatten_model(
    name: &str,
    defs: &mut Map<String, Value>,
    snapshot: &Value,
    resolver: &RefResolver,
    in_progress: &mut HashSet<String>,
    done: &mut HashSet<String>,
    forest: &mut InheritanceForest,
) -> Result<(), SpecError> {
    if done.contains(name) {
        return Ok(());
    }
    if !in_progress.insert(name.to_string()) {
        return Err(SpecError::CyclicAllOf {
            model: name.to_string(),
        });
    }

    let members = defs
        .get(name)
        .and_then(|d| d.get("allOf"))
        .and_then(Value::as_array)
        .cloned();

    if let Some(members) = members {
        let mut parents = Vec::with_capacity(members.len());
        for member in &members {
            let parent = resolve_member(
                name, member, defs, snapshot, resolver, in_progress, done, forest,
            )?;
            parents.push(parent);
        }
        if let Some(model) = defs.get_mut(name).and_then(Value::as_object_mut) {
            for parent in &parents {
                merge_parent(model, parent);
            }
            model.remove("allOf");
        }
    }

    in_progress.remove(name);
    done.insert(name.to_string());
    Ok(())
}

/// Resolve one `allOf` member to a fully flattened parent object.
#[allow(clippy::too_many_arguments)]
fn resolve_member(
    model_name: &str,
    member: &Value,
    defs: &mut Map<String, Value>,
    snapshot: &Value,
    resolver: &RefResolver,
    in_progress: &mut HashSet<String>,
    done: &mut HashSet<String>,
    forest: &mut InheritanceForest,
) -> Result<Value, SpecError> {
    let Some(reference) = member.get("$ref").and_then(Value::as_str) else {
        // Inline member; may itself carry an allOf chain.
        let mut visited = HashSet::new();
        return flatten_in_document(
            member.clone(),
            snapshot,
            resolver.spec_path(),
            resolver.cache(),
            &mut visited,
        );
    };

    if let Some(raw_name) = reference.strip_prefix("#/definitions/") {
        let parent_name = raw_name.replace("~1", "/").replace("~0", "~");
        if !defs.contains_key(&parent_name) {
            return Err(SpecError::ObjectNotFound {
                reference: reference.to_string(),
                document: resolver.spec_path().to_string(),
            });
        }
        flatten_model(
            &parent_name,
            defs,
            snapshot,
            resolver,
            in_progress,
            done,
            forest,
        )?;
        let parent = defs.get(&parent_name).cloned().unwrap_or(Value::Null);
        if parent.get("discriminator").is_some_and(Value::is_string) {
            forest.add_child(&parent_name, model_name);
        }
        return Ok(parent);
    }

    // Cross-file (or non-definitions local) parent: resolve it and flatten
    // it in its own document's context.
    let mut visited = HashSet::new();
    visited.insert(format!("{}|{}", resolver.spec_path(), reference));
    let (raw, found_in) = resolver.resolve_with_context(reference, snapshot)?;
    if found_in == resolver.spec_path() {
        flatten_in_document(raw, snapshot, &found_in, resolver.cache(), &mut visited)
    } else {
        let parent_doc = resolver.cache().load(&found_in)?;
        flatten_in_document(raw, &parent_doc, &found_in, resolver.cache(), &mut visited)
    }
}

/// Flatten an arbitrary schema object against the document it lives in.
///
/// Used for inline `allOf` members and for parents that live in other
/// documents. `visited` carries `"<doc path>|<reference>"` keys so a cyclic
/// chain across documents is caught.
fn flatten_in_document(
    mut def: Value,
    doc: &Value,
    doc_path: &str,
    cache: &DocumentCache,
    visited: &mut HashSet<String>,
) -> Result<Value, SpecError> {
    let Some(members) = def.get("allOf").and_then(Value::as_array).cloned() else {
        return Ok(def);
    };

    let doc_dir = parent_dir(doc_path);
    let resolver = RefResolver::new(cache, doc_path, &doc_dir);

    let mut parents = Vec::with_capacity(members.len());
    for member in members {
        let parent = match member.get("$ref").and_then(Value::as_str) {
            Some(reference) => {
                let key = format!("{doc_path}|{reference}");
                if !visited.insert(key.clone()) {
                    return Err(SpecError::CyclicAllOf {
                        model: reference.to_string(),
                    });
                }
                let (raw, found_in) = resolver.resolve_with_context(reference, doc)?;
                let flattened = if found_in == doc_path {
                    flatten_in_document(raw, doc, doc_path, cache, visited)?
                } else {
                    let parent_doc = cache.load(&found_in)?;
                    flatten_in_document(raw, &parent_doc, &found_in, cache, visited)?
                };
                visited.remove(&key);
                flattened
            }
            None => flatten_in_document(member, doc, doc_path, cache, visited)?,
        };
        parents.push(parent);
    }

    if let Some(model) = def.as_object_mut() {
        for parent in &parents {
            merge_parent(model, parent);
        }
        model.remove("allOf");
    }
    Ok(def)
}

/// Merge a flattened parent into a child model.
///
/// Properties: shallow union, child wins. Required: set union.
/// `x-ms-azure-resource`: inherited when the parent declares it and the
/// child does not override it.
fn merge_parent(child: &mut Map<String, Value>, parent: &Value) {
    if let Some(parent_props) = parent.get("properties").and_then(Value::as_object) {
        let child_props = child
            .entry("properties")
            .or_insert_with(|| Value::Object(Map::new()));
        if let Some(child_props) = child_props.as_object_mut() {
            for (key, value) in parent_props {
                child_props.entry(key.clone()).or_insert_with(|| value.clone());
            }
        }
    }

    if let Some(parent_required) = parent.get("required").and_then(Value::as_array) {
        let child_required = child
            .entry("required")
            .or_insert_with(|| Value::Array(Vec::new()));
        if let Some(child_required) = child_required.as_array_mut() {
            for entry in parent_required {
                if !child_required.contains(entry) {
                    child_required.push(entry.clone());
                }
            }
        }
    }

    if parent.get("x-ms-azure-resource").and_then(Value::as_bool) == Some(true) {
        child
            .entry("x-ms-azure-resource")
            .or_insert(Value::Bool(true));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn flatten(doc: &mut Value) -> Result<InheritanceForest, SpecError> {
        let cache = DocumentCache::new();
        let resolver = RefResolver::new(&cache, "spec.json", ".");
        flatten_definitions(doc, &resolver)
    }

    #[test]
    fn merges_properties_and_required_union() {
        let mut doc = json!({
            "definitions": {
                "A": {
                    "properties": { "id": { "type": "string" } },
                    "required": ["id"]
                },
                "B": {
                    "properties": { "name": { "type": "string" } },
                    "required": ["name"]
                },
                "C": {
                    "allOf": [
                        { "$ref": "#/definitions/A" },
                        { "$ref": "#/definitions/B" }
                    ],
                    "properties": { "age": { "type": "integer" } },
                    "required": ["age"]
                }
            }
        });
        flatten(&mut doc).unwrap();

        let c = &doc["definitions"]["C"];
        assert!(c.get("allOf").is_none());
        for key in ["id", "name", "age"] {
            assert!(c["properties"].get(key).is_some(), "missing {key}");
        }
        let required = c["required"].as_array().unwrap();
        assert_eq!(required.len(), 3);
        for key in ["id", "name", "age"] {
            assert!(required.contains(&json!(key)));
        }
    }

    #[test]
    fn child_wins_on_property_collision() {
        let mut doc = json!({
            "definitions": {
                "Base": {
                    "properties": { "kind": { "type": "string" } }
                },
                "Child": {
                    "allOf": [{ "$ref": "#/definitions/Base" }],
                    "properties": { "kind": { "type": "string", "enum": ["special"] } }
                }
            }
        });
        flatten(&mut doc).unwrap();

        assert_eq!(
            doc["definitions"]["Child"]["properties"]["kind"]["enum"],
            json!(["special"])
        );
    }

    #[test]
    fn flattening_is_idempotent_without_all_of() {
        let mut doc = json!({
            "definitions": {
                "Plain": {
                    "type": "object",
                    "properties": { "a": { "type": "string" } }
                }
            }
        });
        let before = doc.clone();
        flatten(&mut doc).unwrap();
        assert_eq!(doc, before);
        flatten(&mut doc).unwrap();
        assert_eq!(doc, before);
    }

    #[test]
    fn ancestor_flattened_on_demand_regardless_of_order() {
        // Grandchild appears before its ancestors in the document.
        let mut doc = json!({
            "definitions": {
                "Grandchild": {
                    "allOf": [{ "$ref": "#/definitions/Child" }]
                },
                "Child": {
                    "allOf": [{ "$ref": "#/definitions/Base" }]
                },
                "Base": {
                    "properties": { "id": { "type": "string" } },
                    "required": ["id"]
                }
            }
        });
        flatten(&mut doc).unwrap();

        let grandchild = &doc["definitions"]["Grandchild"];
        assert!(grandchild["properties"].get("id").is_some());
        assert!(grandchild["required"].as_array().unwrap().contains(&json!("id")));
        assert!(doc["definitions"]["Child"].get("allOf").is_none());
    }

    #[test]
    fn azure_resource_flag_is_inherited() {
        let mut doc = json!({
            "definitions": {
                "Resource": {
                    "x-ms-azure-resource": true,
                    "properties": { "id": { "type": "string" } }
                },
                "Tracked": {
                    "allOf": [{ "$ref": "#/definitions/Resource" }]
                },
                "Opted": {
                    "allOf": [{ "$ref": "#/definitions/Resource" }],
                    "x-ms-azure-resource": false
                }
            }
        });
        flatten(&mut doc).unwrap();

        assert_eq!(doc["definitions"]["Tracked"]["x-ms-azure-resource"], json!(true));
        // Child override is preserved.
        assert_eq!(doc["definitions"]["Opted"]["x-ms-azure-resource"], json!(false));
    }

    #[test]
    fn discriminator_parents_build_the_forest() {
        let mut doc = json!({
            "definitions": {
                "Pet": {
                    "discriminator": "petType",
                    "properties": { "petType": { "type": "string" } },
                    "required": ["petType"]
                },
                "Cat": { "allOf": [{ "$ref": "#/definitions/Pet" }] },
                "Dog": { "allOf": [{ "$ref": "#/definitions/Pet" }] },
                "Labeled": {
                    // No discriminator on the parent: no edge recorded.
                    "allOf": [{ "$ref": "#/definitions/Tag" }]
                },
                "Tag": { "properties": { "label": { "type": "string" } } }
            }
        });
        let forest = flatten(&mut doc).unwrap();

        assert_eq!(forest.roots(), vec!["Pet"]);
        let children = forest.children_of("Pet").unwrap();
        assert!(children.contains("Cat") && children.contains("Dog"));
        assert!(forest.children_of("Tag").is_none());
    }

    #[test]
    fn missing_parent_is_object_not_found() {
        let mut doc = json!({
            "definitions": {
                "Child": { "allOf": [{ "$ref": "#/definitions/Gone" }] }
            }
        });
        let err = flatten(&mut doc).unwrap_err();
        match err {
            SpecError::ObjectNotFound { reference, .. } => {
                assert_eq!(reference, "#/definitions/Gone");
            }
            other => panic!("expected ObjectNotFound, got {other:?}"),
        }
    }

    #[test]
    fn cyclic_all_of_is_rejected() {
        let mut doc = json!({
            "definitions": {
                "A": { "allOf": [{ "$ref": "#/definitions/B" }] },
                "B": { "allOf": [{ "$ref": "#/definitions/A" }] }
            }
        });
        let err = flatten(&mut doc).unwrap_err();
        assert!(matches!(err, SpecError::CyclicAllOf { .. }));
    }

    #[test]
    fn inline_all_of_member_is_merged() {
        let mut doc = json!({
            "definitions": {
                "Widget": {
                    "allOf": [
                        { "properties": { "inline": { "type": "boolean" } }, "required": ["inline"] }
                    ],
                    "properties": { "name": { "type": "string" } }
                }
            }
        });
        flatten(&mut doc).unwrap();

        let widget = &doc["definitions"]["Widget"];
        assert!(widget["properties"].get("inline").is_some());
        assert!(widget["properties"].get("name").is_some());
        assert!(widget["required"].as_array().unwrap().contains(&json!("inline")));
    }

    #[test]
    fn cross_file_parent_is_resolved_and_flattened() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("common.json"),
            serde_json::to_string(&json!({
                "definitions": {
                    "Resource": {
                        "properties": { "id": { "type": "string" } },
                        "required": ["id"],
                        "x-ms-azure-resource": true
                    },
                    "Tracked": {
                        "allOf": [{ "$ref": "#/definitions/Resource" }],
                        "properties": { "location": { "type": "string" } }
                    }
                }
            }))
            .unwrap(),
        )
        .unwrap();

        let mut doc = json!({
            "definitions": {
                "Redis": {
                    "allOf": [{ "$ref": "common.json#/definitions/Tracked" }],
                    "properties": { "sku": { "type": "string" } }
                }
            }
        });

        let cache = DocumentCache::new();
        let spec_dir = dir.path().to_str().unwrap().to_string();
        let spec_path = format!("{spec_dir}/main.json");
        let resolver = RefResolver::new(&cache, &spec_path, &spec_dir);
        flatten_definitions(&mut doc, &resolver).unwrap();

        let redis = &doc["definitions"]["Redis"];
        // Both the parent's own properties and the grandparent's come through.
        for key in ["sku", "location", "id"] {
            assert!(redis["properties"].get(key).is_some(), "missing {key}");
        }
        assert!(redis["required"].as_array().unwrap().contains(&json!("id")));
        assert_eq!(redis["x-ms-azure-resource"], json!(true));
    }
}

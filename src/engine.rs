//! Schema-validation engine and sample-value generation.
//!
//! The engine owns every pass/fail judgment on scalar and structural schema
//! checks. The orchestrator never inspects payloads itself; it builds a
//! schema and an instance and asks the engine. Swapping the engine (for a
//! draft upgrade or a test double) never touches resolution or result code.

use serde_json::{json, Map, Value};

use crate::error::{SpecError, ValidationIssue};

/// What the engine found for one schema/instance pair.
#[derive(Debug, Clone, Default)]
pub struct EngineOutcome {
    pub errors: Vec<ValidationIssue>,
    pub warnings: Vec<ValidationIssue>,
}

impl EngineOutcome {
    pub fn valid() -> Self {
        EngineOutcome::default()
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Judges an instance against a schema.
///
/// A schema mismatch is a successful validation with errors in the outcome;
/// `Err` means the engine itself could not run (e.g. the schema does not
/// compile).
pub trait ValidationEngine {
    fn validate(&self, schema: &Value, instance: &Value) -> Result<EngineOutcome, SpecError>;
}

/// Default engine backed by the `jsonschema` crate.
#[derive(Debug, Default)]
pub struct JsonSchemaEngine;

impl JsonSchemaEngine {
    pub fn new() -> Self {
        JsonSchemaEngine
    }
}

impl ValidationEngine for JsonSchemaEngine {
    fn validate(&self, schema: &Value, instance: &Value) -> Result<EngineOutcome, SpecError> {
        let validator =
            jsonschema::validator_for(schema).map_err(|e| SpecError::Internal {
                message: format!("schema did not compile: {e}"),
            })?;

        let errors = validator
            .iter_errors(instance)
            .map(|e| {
                let path = e.instance_path.to_string();
                let location = if path.is_empty() { "#" } else { &path };
                ValidationIssue::with_code("SchemaViolation", format!("{location}: {e}"))
            })
            .collect();

        Ok(EngineOutcome {
            errors,
            warnings: Vec::new(),
        })
    }
}

/// Wrap a schema so its local `#/definitions/...` references resolve.
///
/// Schemas handed to the engine are cut out of the spec document, so their
/// references would dangle. Wrapping in `allOf` with the spec's definitions
/// alongside keeps them resolvable without rewriting the schema.
pub fn schema_with_definitions(schema: &Value, spec: &Value) -> Value {
    match spec.get("definitions") {
        Some(defs) => json!({ "allOf": [schema], "definitions": defs }),
        None => schema.clone(),
    }
}

/// Produces a plausible instance value for a schema.
///
/// Used on the in-spec example path to synthesize parameter values that the
/// example does not cover.
pub trait SampleGenerator {
    fn sample(&self, schema: &Value) -> Value;
}

/// Schema-driven generator: declared `example`, then `default`, then the
/// first `enum` entry, then a fixed value per declared type.
#[derive(Debug, Default)]
pub struct SchemaSampleGenerator;

impl SchemaSampleGenerator {
    pub fn new() -> Self {
        SchemaSampleGenerator
    }
}

impl SampleGenerator for SchemaSampleGenerator {
    fn sample(&self, schema: &Value) -> Value {
        if let Some(example) = schema.get("example") {
            return example.clone();
        }
        if let Some(default) = schema.get("default") {
            return default.clone();
        }
        if let Some(first) = schema
            .get("enum")
            .and_then(Value::as_array)
            .and_then(|e| e.first())
        {
            return first.clone();
        }

        match schema.get("type").and_then(Value::as_str) {
            Some("string") => json!("sample"),
            Some("integer") => json!(42),
            Some("number") => json!(1.5),
            Some("boolean") => json!(true),
            Some("array") => {
                let item = schema
                    .get("items")
                    .map(|items| self.sample(items))
                    .unwrap_or(Value::Null);
                json!([item])
            }
            Some("object") | None => {
                let mut obj = Map::new();
                if let Some(props) = schema.get("properties").and_then(Value::as_object) {
                    for (name, prop) in props {
                        obj.insert(name.clone(), self.sample(prop));
                    }
                }
                Value::Object(obj)
            }
            _ => Value::Null,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_accepts_matching_instance() {
        let schema = json!({
            "type": "object",
            "properties": { "name": { "type": "string" } },
            "required": ["name"]
        });
        let outcome = JsonSchemaEngine::new()
            .validate(&schema, &json!({ "name": "cache1" }))
            .unwrap();
        assert!(outcome.is_valid());
    }

    #[test]
    fn engine_reports_type_mismatch_with_path() {
        let schema = json!({
            "type": "object",
            "properties": { "count": { "type": "integer" } }
        });
        let outcome = JsonSchemaEngine::new()
            .validate(&schema, &json!({ "count": "three" }))
            .unwrap();
        assert_eq!(outcome.errors.len(), 1);
        assert_eq!(outcome.errors[0].code, "SchemaViolation");
        assert!(outcome.errors[0].message.contains("/count"));
    }

    #[test]
    fn engine_collects_multiple_errors() {
        let schema = json!({
            "type": "object",
            "properties": {
                "a": { "type": "string" },
                "b": { "type": "integer" }
            },
            "required": ["a", "b"]
        });
        let outcome = JsonSchemaEngine::new()
            .validate(&schema, &json!({}))
            .unwrap();
        assert_eq!(outcome.errors.len(), 2);
    }

    #[test]
    fn wrapped_schema_resolves_internal_refs() {
        let spec = json!({
            "definitions": {
                "Sku": {
                    "type": "object",
                    "properties": { "name": { "type": "string" } },
                    "required": ["name"]
                }
            }
        });
        let schema = json!({ "$ref": "#/definitions/Sku" });
        let wrapped = schema_with_definitions(&schema, &spec);

        let engine = JsonSchemaEngine::new();
        assert!(engine
            .validate(&wrapped, &json!({ "name": "Basic" }))
            .unwrap()
            .is_valid());
        assert!(!engine.validate(&wrapped, &json!({})).unwrap().is_valid());
    }

    #[test]
    fn sampler_prefers_example_then_default_then_enum() {
        let gen = SchemaSampleGenerator::new();
        assert_eq!(gen.sample(&json!({ "type": "string", "example": "ex" })), json!("ex"));
        assert_eq!(gen.sample(&json!({ "type": "string", "default": "dv" })), json!("dv"));
        assert_eq!(
            gen.sample(&json!({ "type": "string", "enum": ["first", "second"] })),
            json!("first")
        );
    }

    #[test]
    fn sampler_builds_typed_values() {
        let gen = SchemaSampleGenerator::new();
        assert_eq!(gen.sample(&json!({ "type": "integer" })), json!(42));
        assert_eq!(gen.sample(&json!({ "type": "boolean" })), json!(true));
        assert_eq!(
            gen.sample(&json!({ "type": "array", "items": { "type": "string" } })),
            json!(["sample"])
        );
        assert_eq!(
            gen.sample(&json!({
                "type": "object",
                "properties": { "kind": { "type": "string" } }
            })),
            json!({ "kind": "sample" })
        );
    }
}

//! Spec validator: resolution pipeline plus the operation validation
//! orchestrator.
//!
//! One `SpecValidator` owns one spec document. `initialize` runs the
//! resolution pipeline (load, unify `x-ms-paths`, flatten `allOf`, enforce
//! strictness); `validate_operations` walks every operation's documented
//! examples and folds engine outcomes into the result tree;
//! `validate_spec_semantics` runs the structural checks that schema
//! validation cannot express.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use crate::engine::{
    schema_with_definitions, EngineOutcome, JsonSchemaEngine, SampleGenerator,
    SchemaSampleGenerator, ValidationEngine,
};
use crate::error::{ErrorCode, SpecError, ValidationIssue};
use crate::flatten::flatten_definitions;
use crate::inheritance::InheritanceForest;
use crate::loader::{is_url, parent_dir, rewrite_github_url, DocumentCache};
use crate::normalize::{enforce_strictness, unify_xms_paths};
use crate::refs::{inline_external_refs, RefResolver};
use crate::result::{ScenarioOutcome, SpecValidationResult};

const HTTP_METHODS: [&str; 7] = ["get", "put", "post", "delete", "options", "head", "patch"];

/// A parameter value routed into a request, with its URL-encoding flag.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParameterValue {
    pub value: Value,
    pub skip_url_encoding: bool,
}

/// A request assembled from an example, never sent anywhere.
#[derive(Debug, Clone, Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct SyntheticRequest {
    pub method: String,
    pub path_template: String,
    pub path_parameters: BTreeMap<String, ParameterValue>,
    pub query_parameters: BTreeMap<String, ParameterValue>,
    pub headers: BTreeMap<String, Value>,
    /// The example's body verbatim; never re-serialized.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
}

/// A response wrapper assembled from an example.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyntheticResponse {
    pub status_code: String,
    pub headers: BTreeMap<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
}

/// One operation pulled out of the resolved spec.
#[derive(Debug, Clone)]
struct OperationInfo {
    id: String,
    method: String,
    path: String,
    /// Dereferenced path-level plus operation-level parameters.
    parameters: Vec<Value>,
    operation: Value,
}

/// Validates one spec document end to end.
pub struct SpecValidator {
    spec_path: String,
    spec_dir: String,
    cache: Arc<DocumentCache>,
    spec: Option<Value>,
    inheritance: InheritanceForest,
    engine: Box<dyn ValidationEngine>,
    sampler: Box<dyn SampleGenerator>,
    result: SpecValidationResult,
}

impl SpecValidator {
    /// A validator for the given path or URL, sharing the given cache.
    pub fn new(spec_path: &str, cache: Arc<DocumentCache>) -> Self {
        let spec_path = if is_url(spec_path) {
            rewrite_github_url(spec_path)
        } else {
            spec_path.to_string()
        };
        let spec_dir = parent_dir(&spec_path);
        SpecValidator {
            spec_path,
            spec_dir,
            cache,
            spec: None,
            inheritance: InheritanceForest::new(),
            engine: Box::new(JsonSchemaEngine::new()),
            sampler: Box::new(SchemaSampleGenerator::new()),
            result: SpecValidationResult::new(),
        }
    }

    /// Replace the schema-validation engine.
    pub fn with_engine(mut self, engine: Box<dyn ValidationEngine>) -> Self {
        self.engine = engine;
        self
    }

    /// Replace the sample generator used on the in-spec example path.
    pub fn with_sampler(mut self, sampler: Box<dyn SampleGenerator>) -> Self {
        self.sampler = sampler;
        self
    }

    pub fn spec_path(&self) -> &str {
        &self.spec_path
    }

    /// Run the resolution pipeline.
    ///
    /// On failure the document is rejected whole: no partially-flattened
    /// spec is exposed, and the failure is recorded in the result tree.
    pub fn initialize(&mut self) -> Result<(), SpecError> {
        match self.resolve_spec() {
            Ok((spec, inheritance)) => {
                self.spec = Some(spec);
                self.inheritance = inheritance;
                tracing::info!(path = %self.spec_path, "spec resolved");
                Ok(())
            }
            Err(trigger) => {
                let err = SpecError::ResolveSpec {
                    path: self.spec_path.clone(),
                    source: Box::new(trigger),
                };
                self.result.record_resolve_failure(err.to_issue());
                Err(err)
            }
        }
    }

    fn resolve_spec(&self) -> Result<(Value, InheritanceForest), SpecError> {
        let doc = self.cache.load(&self.spec_path)?;
        let mut spec = (*doc).clone();
        unify_xms_paths(&mut spec);
        let resolver = RefResolver::new(&self.cache, &self.spec_path, &self.spec_dir);
        let inheritance = flatten_definitions(&mut spec, &resolver)?;
        inline_external_refs(&mut spec, &self.spec_path, &self.cache)?;
        enforce_strictness(&mut spec);
        Ok((spec, inheritance))
    }

    /// The resolved document, if `initialize` has succeeded.
    pub fn resolved_spec(&self) -> Option<&Value> {
        self.spec.as_ref()
    }

    /// Discriminator inheritance recorded during flattening.
    pub fn inheritance(&self) -> &InheritanceForest {
        &self.inheritance
    }

    pub fn result(&self) -> &SpecValidationResult {
        &self.result
    }

    pub fn into_result(self) -> SpecValidationResult {
        self.result
    }

    /// Validate documented examples for every operation, or for the subset
    /// named in `operation_ids` (comma-separated).
    ///
    /// The filter is advisory: if it matches nothing, all operations are
    /// validated.
    pub fn validate_operations(&mut self, operation_ids: Option<&str>) -> Result<(), SpecError> {
        let spec = self.spec.clone().ok_or_else(|| SpecError::Uninitialized {
            path: self.spec_path.clone(),
        })?;

        let mut operations = self.collect_operations(&spec)?;
        if let Some(filter) = operation_ids {
            let wanted: HashSet<&str> = filter
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .collect();
            let matched: Vec<OperationInfo> = operations
                .iter()
                .filter(|op| wanted.contains(op.id.as_str()))
                .cloned()
                .collect();
            if matched.is_empty() {
                tracing::warn!(
                    filter,
                    "no operation matches the requested ids, validating all operations"
                );
            } else {
                operations = matched;
            }
        }

        for op in &operations {
            self.validate_xms_examples(&spec, op)?;
            self.validate_example_in_spec(&spec, op);
        }
        Ok(())
    }

    /// Structural checks over the resolved spec that schema validation
    /// cannot express.
    pub fn validate_spec_semantics(&mut self) -> Result<(), SpecError> {
        let spec = self.spec.clone().ok_or_else(|| SpecError::Uninitialized {
            path: self.spec_path.clone(),
        })?;

        let mut errors = Vec::new();
        let operations = self.collect_operations(&spec)?;

        // Duplicate operationIds.
        let mut seen: HashSet<&str> = HashSet::new();
        for op in &operations {
            if !seen.insert(&op.id) {
                errors.push(ValidationIssue::new(
                    ErrorCode::SemanticValidationError,
                    format!("operationId \"{}\" is not unique across the spec", op.id),
                ));
            }
        }

        for op in &operations {
            // Path template and path parameters must agree.
            let template_vars = path_template_variables(&op.path);
            let declared: HashSet<String> = op
                .parameters
                .iter()
                .filter(|p| p.get("in").and_then(Value::as_str) == Some("path"))
                .filter_map(|p| p.get("name").and_then(Value::as_str))
                .map(str::to_string)
                .collect();
            for var in &template_vars {
                if !declared.contains(var) {
                    errors.push(ValidationIssue::new(
                        ErrorCode::SemanticValidationError,
                        format!(
                            "path template \"{}\" in operation \"{}\" names parameter \"{var}\" but no path parameter declares it",
                            op.path, op.id
                        ),
                    ));
                }
            }
            for name in &declared {
                if !template_vars.contains(name) {
                    errors.push(ValidationIssue::new(
                        ErrorCode::SemanticValidationError,
                        format!(
                            "path parameter \"{name}\" in operation \"{}\" does not appear in path template \"{}\"",
                            op.id, op.path
                        ),
                    ));
                }
            }

            // At most one body parameter.
            let body_count = op
                .parameters
                .iter()
                .filter(|p| p.get("in").and_then(Value::as_str) == Some("body"))
                .count();
            if body_count > 1 {
                errors.push(ValidationIssue::new(
                    ErrorCode::SemanticValidationError,
                    format!(
                        "operation \"{}\" declares {body_count} body parameters, at most one is allowed",
                        op.id
                    ),
                ));
            }
        }

        // Every required property must exist.
        if let Some(defs) = spec.get("definitions").and_then(Value::as_object) {
            for (name, model) in defs {
                let Some(required) = model.get("required").and_then(Value::as_array) else {
                    continue;
                };
                for entry in required.iter().filter_map(Value::as_str) {
                    let exists = model
                        .get("properties")
                        .and_then(Value::as_object)
                        .is_some_and(|props| props.contains_key(entry));
                    if !exists {
                        errors.push(ValidationIssue::new(
                            ErrorCode::SemanticValidationError,
                            format!(
                                "model \"{name}\" requires property \"{entry}\" but does not define it"
                            ),
                        ));
                    }
                }
            }
        }

        self.result.record_semantic(errors);
        Ok(())
    }

    fn collect_operations(&self, spec: &Value) -> Result<Vec<OperationInfo>, SpecError> {
        let resolver = RefResolver::new(&self.cache, &self.spec_path, &self.spec_dir);
        let mut operations = Vec::new();

        let Some(paths) = spec.get("paths").and_then(Value::as_object) else {
            return Ok(operations);
        };

        for (path, item) in paths {
            let path_params = item
                .get("parameters")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default();

            for method in HTTP_METHODS {
                let Some(operation) = item.get(method) else {
                    continue;
                };
                let id = operation
                    .get("operationId")
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("{method} {path}"));

                let mut parameters = Vec::new();
                let op_params = operation
                    .get("parameters")
                    .and_then(Value::as_array)
                    .cloned()
                    .unwrap_or_default();
                for param in path_params.iter().chain(op_params.iter()) {
                    parameters.push(deref_parameter(param, spec, &resolver)?);
                }

                operations.push(OperationInfo {
                    id,
                    method: method.to_string(),
                    path: path.clone(),
                    parameters,
                    operation: operation.clone(),
                });
            }
        }
        Ok(operations)
    }

    fn validate_xms_examples(&mut self, spec: &Value, op: &OperationInfo) -> Result<(), SpecError> {
        let Some(examples) = op.operation.get("x-ms-examples").and_then(Value::as_object) else {
            self.result.record_xms_examples_missing(&op.id);
            return Ok(());
        };
        let examples = examples.clone();

        let resolver = RefResolver::new(&self.cache, &self.spec_path, &self.spec_dir);
        for (scenario, entry) in &examples {
            // A scenario is either inline or a $ref to an example file. A
            // broken reference is fatal for this scenario only.
            let example = match entry.get("$ref").and_then(Value::as_str) {
                Some(reference) => match resolver.resolve(reference, spec) {
                    Ok(example) => example,
                    Err(err) => {
                        let outcome = ScenarioOutcome {
                            request_fatal: Some(err.to_issue()),
                            ..ScenarioOutcome::default()
                        };
                        self.result.record_xms_scenario(&op.id, scenario, &outcome);
                        continue;
                    }
                },
                None => entry.clone(),
            };

            let outcome = self.validate_scenario(spec, op, scenario, &example);
            self.result.record_xms_scenario(&op.id, scenario, &outcome);
        }
        Ok(())
    }

    /// Validate one scenario's request and responses against the spec.
    fn validate_scenario(
        &self,
        spec: &Value,
        op: &OperationInfo,
        scenario: &str,
        example: &Value,
    ) -> ScenarioOutcome {
        let mut outcome = ScenarioOutcome::default();

        let example_params = example.get("parameters").and_then(Value::as_object);
        match self.build_request(spec, op, example_params) {
            Ok((_, request_outcome)) => outcome.request = request_outcome,
            Err(issue) => outcome.request_fatal = Some(issue),
        }

        let example_responses = example
            .get("responses")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();
        let spec_responses = op.operation.get("responses").and_then(Value::as_object);

        for (status_code, example_response) in &example_responses {
            let mut part = EngineOutcome::valid();

            let Some(spec_response) = spec_responses.and_then(|r| r.get(status_code)) else {
                // Undocumented status code: recorded against this response,
                // the rest of the scenario still runs.
                part.errors.push(ValidationIssue::new(
                    ErrorCode::ResponseStatusCodeNotInSpec,
                    format!(
                        "response with statusCode \"{status_code}\" for x-ms-example \"{scenario}\" in operation \"{}\" is not documented in the spec",
                        op.id
                    ),
                ));
                outcome.responses.insert(status_code.clone(), part);
                continue;
            };

            let response = build_response(op, status_code, example_response);
            match (spec_response.get("schema"), response.body) {
                (Some(schema), Some(body)) => {
                    self.run_engine(
                        spec,
                        schema,
                        &body,
                        &mut part,
                        &format!(
                            "response \"{status_code}\" of x-ms-example \"{scenario}\" in operation \"{}\"",
                            op.id
                        ),
                    );
                }
                (None, Some(_)) => {
                    part.errors.push(ValidationIssue::new(
                        ErrorCode::ResponseSchemaNotInSpec,
                        format!(
                            "response with statusCode \"{status_code}\" for x-ms-example \"{scenario}\" in operation \"{}\" has a body but the spec declares no schema for it",
                            op.id
                        ),
                    ));
                }
                _ => {}
            }
            outcome.responses.insert(status_code.clone(), part);
        }

        outcome
    }

    /// Build a request from example parameter values, validating each value
    /// as it is routed.
    ///
    /// A required parameter missing from the example makes the whole request
    /// unbuildable; no partial request is validated.
    fn build_request(
        &self,
        spec: &Value,
        op: &OperationInfo,
        example_params: Option<&serde_json::Map<String, Value>>,
    ) -> Result<(SyntheticRequest, EngineOutcome), ValidationIssue> {
        let mut request = SyntheticRequest {
            method: op.method.clone(),
            path_template: op.path.clone(),
            ..SyntheticRequest::default()
        };
        let mut outcome = EngineOutcome::valid();

        for param in &op.parameters {
            let name = param.get("name").and_then(Value::as_str).unwrap_or_default();
            let location = param.get("in").and_then(Value::as_str).unwrap_or_default();
            let required = location == "path"
                || param.get("required").and_then(Value::as_bool) == Some(true);

            let Some(value) = example_params.and_then(|p| p.get(name)) else {
                if required {
                    return Err(ValidationIssue::new(
                        ErrorCode::RequiredParameterNotInExample,
                        format!(
                            "parameter \"{name}\" is required by operation \"{}\" but the example provides no value for it",
                            op.id
                        ),
                    ));
                }
                continue;
            };

            let skip_url_encoding =
                param.get("x-ms-skip-url-encoding").and_then(Value::as_bool) == Some(true);
            match location {
                "path" => {
                    request.path_parameters.insert(
                        name.to_string(),
                        ParameterValue {
                            value: value.clone(),
                            skip_url_encoding,
                        },
                    );
                }
                "query" => {
                    request.query_parameters.insert(
                        name.to_string(),
                        ParameterValue {
                            value: value.clone(),
                            skip_url_encoding,
                        },
                    );
                }
                "header" => {
                    request.headers.insert(name.to_string(), value.clone());
                }
                "body" => {
                    request.body = Some(value.clone());
                }
                _ => {}
            }

            let context = format!("parameter \"{name}\" of operation \"{}\"", op.id);
            if location == "body" {
                if let Some(schema) = param.get("schema") {
                    self.run_engine(spec, schema, value, &mut outcome, &context);
                }
            } else {
                let schema = parameter_schema(param);
                self.run_engine(spec, &schema, value, &mut outcome, &context);
            }
        }

        Ok((request, outcome))
    }

    /// Validate the literal example embedded in the spec, if any.
    fn validate_example_in_spec(&mut self, spec: &Value, op: &OperationInfo) {
        let mut outcome = ScenarioOutcome::default();
        let mut found_any = false;

        // Body schema with a declared example; sibling parameters are
        // synthesized so the request is complete.
        let body_param = op
            .parameters
            .iter()
            .find(|p| p.get("in").and_then(Value::as_str) == Some("body"));
        if let Some(param) = body_param {
            if let Some(schema) = param.get("schema") {
                if let Some(example) = self.schema_example(spec, schema) {
                    found_any = true;
                    let mut synthesized = serde_json::Map::new();
                    for sibling in &op.parameters {
                        let name = sibling
                            .get("name")
                            .and_then(Value::as_str)
                            .unwrap_or_default();
                        if sibling.get("in").and_then(Value::as_str) == Some("body") {
                            synthesized.insert(name.to_string(), example.clone());
                        } else {
                            synthesized.insert(name.to_string(), self.sampler.sample(sibling));
                        }
                    }
                    match self.build_request(spec, op, Some(&synthesized)) {
                        Ok((_, request_outcome)) => outcome.request = request_outcome,
                        Err(issue) => outcome.request_fatal = Some(issue),
                    }
                }
            }
        }

        // Response `examples` MIME maps.
        if let Some(responses) = op.operation.get("responses").and_then(Value::as_object) {
            for (status_code, response) in responses {
                let Some(examples) = response.get("examples").and_then(Value::as_object) else {
                    continue;
                };
                found_any = true;
                let mut part = EngineOutcome::valid();
                for (mime, body) in examples {
                    match response.get("schema") {
                        Some(schema) => {
                            self.run_engine(
                                spec,
                                schema,
                                body,
                                &mut part,
                                &format!(
                                    "example \"{mime}\" of response \"{status_code}\" in operation \"{}\"",
                                    op.id
                                ),
                            );
                        }
                        None => {
                            part.errors.push(ValidationIssue::new(
                                ErrorCode::ResponseSchemaNotInSpec,
                                format!(
                                    "response with statusCode \"{status_code}\" in operation \"{}\" carries an example but the spec declares no schema for it",
                                    op.id
                                ),
                            ));
                        }
                    }
                }
                outcome.responses.insert(status_code.clone(), part);
            }
        }

        if found_any {
            self.result.record_example_in_spec(&op.id, &outcome);
        }
    }

    /// The `example` declared on a schema, following a `$ref` one level.
    fn schema_example(&self, spec: &Value, schema: &Value) -> Option<Value> {
        if let Some(example) = schema.get("example") {
            return Some(example.clone());
        }
        let reference = schema.get("$ref").and_then(Value::as_str)?;
        let resolver = RefResolver::new(&self.cache, &self.spec_path, &self.spec_dir);
        resolver
            .resolve(reference, spec)
            .ok()
            .and_then(|target| target.get("example").cloned())
    }

    /// Run the engine, folding its outcome (or its own failure) into `part`.
    ///
    /// An engine failure is an `InternalError` recorded against this example;
    /// it never aborts the remaining examples.
    fn run_engine(
        &self,
        spec: &Value,
        schema: &Value,
        instance: &Value,
        part: &mut EngineOutcome,
        context: &str,
    ) {
        let wrapped = schema_with_definitions(schema, spec);
        match self.engine.validate(&wrapped, instance) {
            Ok(engine_outcome) => {
                for error in engine_outcome.errors {
                    part.errors.push(ValidationIssue::with_code(
                        error.code,
                        format!("{context}: {}", error.message),
                    ));
                }
                part.warnings.extend(engine_outcome.warnings);
            }
            Err(err) => {
                part.errors.push(ValidationIssue::new(
                    ErrorCode::InternalError,
                    format!("validation of {context} failed: {err}"),
                ));
            }
        }
    }
}

/// Dereference a `{"$ref": ...}` parameter to its target object.
fn deref_parameter(
    param: &Value,
    spec: &Value,
    resolver: &RefResolver,
) -> Result<Value, SpecError> {
    match param.get("$ref").and_then(Value::as_str) {
        Some(reference) => resolver.resolve(reference, spec),
        None => Ok(param.clone()),
    }
}

/// Strip Swagger parameter metadata, leaving only schema keywords.
///
/// `required` in a parameter object is a boolean, which a schema compiler
/// would reject, and `name`/`in`/extension keys are not schema vocabulary.
fn parameter_schema(param: &Value) -> Value {
    let mut schema = param.clone();
    if let Some(obj) = schema.as_object_mut() {
        obj.remove("name");
        obj.remove("in");
        obj.remove("required");
        obj.remove("description");
        obj.remove("collectionFormat");
        obj.retain(|key, _| !key.starts_with("x-"));
    }
    schema
}

/// Variable names appearing as `{name}` in a path template.
fn path_template_variables(path: &str) -> HashSet<String> {
    let mut vars = HashSet::new();
    let mut rest = path;
    while let Some(start) = rest.find('{') {
        let Some(len) = rest[start..].find('}') else {
            break;
        };
        vars.insert(rest[start + 1..start + len].to_string());
        rest = &rest[start + len + 1..];
    }
    vars
}

fn build_response(
    op: &OperationInfo,
    status_code: &str,
    example_response: &Value,
) -> SyntheticResponse {
    let mut headers: BTreeMap<String, Value> = example_response
        .get("headers")
        .and_then(Value::as_object)
        .map(|h| h.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
        .unwrap_or_default();

    // Default the content type to the operation's first `produces` entry.
    if !headers.contains_key("content-type") {
        if let Some(mime) = op
            .operation
            .get("produces")
            .and_then(Value::as_array)
            .and_then(|p| p.first())
            .and_then(Value::as_str)
        {
            headers.insert("content-type".to_string(), Value::String(mime.to_string()));
        }
    }

    SyntheticResponse {
        status_code: status_code.to_string(),
        headers,
        body: example_response.get("body").cloned(),
    }
}

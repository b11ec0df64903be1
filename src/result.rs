//! Nested validation result tree.
//!
//! Mirrors the shape consumers aggregate on: per-operation, per-example-kind,
//! per-scenario, with request and per-status-code response leaves. Leaf
//! invalidity propagates upward and the run-level `validityStatus` only ever
//! moves from `true` to `false`. The tree is append-only; recording never
//! rewrites an earlier entry.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::engine::EngineOutcome;
use crate::error::{ErrorCode, ValidationIssue};

/// One request or one response leaf.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PartResult {
    pub is_valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ValidationIssue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<Vec<ValidationIssue>>,
}

impl PartResult {
    fn valid(message: String) -> Self {
        PartResult {
            is_valid: true,
            result: Some(message),
            error: None,
            warning: None,
        }
    }

    fn invalid(error: ValidationIssue) -> Self {
        PartResult {
            is_valid: false,
            result: None,
            error: Some(error),
            warning: None,
        }
    }

    fn with_warnings(mut self, warnings: Vec<ValidationIssue>) -> Self {
        if !warnings.is_empty() {
            self.warning = Some(warnings);
        }
        self
    }
}

/// One scenario: a request leaf plus a response leaf per status code.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioResult {
    pub is_valid: bool,
    pub request: PartResult,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub responses: BTreeMap<String, PartResult>,
}

/// Raw engine outcomes for one scenario, before folding into the tree.
#[derive(Debug, Default)]
pub struct ScenarioOutcome {
    pub request: EngineOutcome,
    /// Set when the request could not be built at all; overrides `request`.
    pub request_fatal: Option<ValidationIssue>,
    pub responses: BTreeMap<String, EngineOutcome>,
}

/// Results for an operation's `x-ms-examples` scenarios.
#[derive(Debug, Clone, Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ScenariosResult {
    pub is_valid: bool,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub scenarios: BTreeMap<String, ScenarioResult>,
    /// Advisory only (operation has no x-ms-examples); never flips validity.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ValidationIssue>,
}

/// All recorded results for one operation, keyed the way consumers expect.
#[derive(Debug, Clone, Serialize, Default)]
pub struct OperationResult {
    #[serde(rename = "x-ms-examples", skip_serializing_if = "Option::is_none")]
    pub xms_examples: Option<ScenariosResult>,
    #[serde(rename = "example-in-spec", skip_serializing_if = "Option::is_none")]
    pub example_in_spec: Option<ScenarioResult>,
}

/// Outcome of the semantic (structural) spec checks.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SemanticResult {
    pub is_valid: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<ValidationIssue>,
}

/// The full result tree for one spec document.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpecValidationResult {
    pub validity_status: bool,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub operations: BTreeMap<String, OperationResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolve_spec: Option<ValidationIssue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validate_spec: Option<SemanticResult>,
}

impl Default for SpecValidationResult {
    fn default() -> Self {
        SpecValidationResult {
            validity_status: true,
            operations: BTreeMap::new(),
            resolve_spec: None,
            validate_spec: None,
        }
    }
}

impl SpecValidationResult {
    pub fn new() -> Self {
        SpecValidationResult::default()
    }

    /// Monotonic validity update: once false, stays false.
    pub fn update_validity_status(&mut self, valid: bool) {
        if !valid {
            self.validity_status = false;
        }
    }

    /// Record a resolution failure for the whole document.
    pub fn record_resolve_failure(&mut self, issue: ValidationIssue) {
        tracing::error!(code = %issue.code, message = %issue.message, "spec resolution failed");
        self.resolve_spec = Some(issue);
        self.update_validity_status(false);
    }

    /// Record the outcome of the semantic spec checks.
    pub fn record_semantic(&mut self, errors: Vec<ValidationIssue>) {
        let is_valid = errors.is_empty();
        if is_valid {
            tracing::info!("semantic validation passed");
        } else {
            for error in &errors {
                tracing::error!(code = %error.code, message = %error.message, "semantic validation error");
            }
        }
        self.validate_spec = Some(SemanticResult { is_valid, errors });
        self.update_validity_status(is_valid);
    }

    /// Fold one x-ms-examples scenario outcome into the tree.
    pub fn record_xms_scenario(
        &mut self,
        operation_id: &str,
        scenario: &str,
        outcome: &ScenarioOutcome,
    ) {
        let label = format!("x-ms-example \"{scenario}\" in operation \"{operation_id}\"");
        let result = construct_scenario_result(&label, outcome);
        self.update_validity_status(result.is_valid);

        let entry = self
            .operations
            .entry(operation_id.to_string())
            .or_default()
            .xms_examples
            .get_or_insert_with(|| ScenariosResult {
                is_valid: true,
                ..ScenariosResult::default()
            });
        if !result.is_valid {
            entry.is_valid = false;
        }
        entry.scenarios.insert(scenario.to_string(), result);
    }

    /// Record the advisory for an operation with no x-ms-examples.
    pub fn record_xms_examples_missing(&mut self, operation_id: &str) {
        let issue = ValidationIssue::new(
            ErrorCode::XmsExampleNotFoundError,
            format!("x-ms-example not found in operation \"{operation_id}\"."),
        );
        tracing::warn!(operation_id, "{}", issue.message);
        let entry = self
            .operations
            .entry(operation_id.to_string())
            .or_default()
            .xms_examples
            .get_or_insert_with(|| ScenariosResult {
                is_valid: true,
                ..ScenariosResult::default()
            });
        entry.error = Some(issue);
    }

    /// Fold the in-spec example outcome into the tree.
    pub fn record_example_in_spec(&mut self, operation_id: &str, outcome: &ScenarioOutcome) {
        let label = format!("example in spec for operation \"{operation_id}\"");
        let result = construct_scenario_result(&label, outcome);
        self.update_validity_status(result.is_valid);
        self.operations
            .entry(operation_id.to_string())
            .or_default()
            .example_in_spec = Some(result);
    }
}

/// Build one scenario's result with human-readable messages.
fn construct_scenario_result(label: &str, outcome: &ScenarioOutcome) -> ScenarioResult {
    let request = match &outcome.request_fatal {
        Some(issue) => {
            tracing::error!(code = %issue.code, "{}", issue.message);
            PartResult::invalid(issue.clone())
        }
        None => fold_part(
            &outcome.request,
            format!("Request parameters for {label} is valid."),
            format!("Found errors in validating the request for {label}."),
            ErrorCode::RequestValidationError,
        ),
    };

    let mut responses = BTreeMap::new();
    for (status_code, part) in &outcome.responses {
        let result = fold_part(
            part,
            format!("Response with statusCode \"{status_code}\" for {label} is valid."),
            format!(
                "Found errors in validating the response with statusCode \"{status_code}\" for {label}."
            ),
            ErrorCode::ResponseValidationError,
        );
        responses.insert(status_code.clone(), result);
    }

    let is_valid = request.is_valid && responses.values().all(|r| r.is_valid);
    ScenarioResult {
        is_valid,
        request,
        responses,
    }
}

fn fold_part(
    outcome: &EngineOutcome,
    valid_message: String,
    invalid_message: String,
    code: ErrorCode,
) -> PartResult {
    for warning in &outcome.warnings {
        tracing::warn!(code = %warning.code, "{}", warning.message);
    }

    if outcome.is_valid() {
        tracing::info!("{valid_message}");
        PartResult::valid(valid_message).with_warnings(outcome.warnings.clone())
    } else {
        tracing::error!("{invalid_message}");
        let error = ValidationIssue::new(code, invalid_message).wrap(outcome.errors.clone());
        PartResult::invalid(error).with_warnings(outcome.warnings.clone())
    }
}

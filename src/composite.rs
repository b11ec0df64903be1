//! Composite spec manifests: one document listing many spec files.
//!
//! A composite spec is a JSON document with a non-empty `documents` array of
//! paths or URLs. Member documents are validated sequentially in manifest
//! order; each gets its own validator and result, and the aggregate validity
//! flag is the only state shared across them.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use crate::error::SpecError;
use crate::loader::{is_url, join_spec_path, parent_dir, DocumentCache};
use crate::result::SpecValidationResult;
use crate::validator::SpecValidator;

/// Resolve a composite manifest to the member document paths, in order.
///
/// HTTP entries are kept verbatim; relative entries are joined onto the
/// manifest's directory after trimming a leading `./`.
pub fn documents_from_composite_spec(
    manifest_path: &str,
    cache: &DocumentCache,
) -> Result<Vec<String>, SpecError> {
    let manifest = cache.load(manifest_path)?;
    let documents = manifest
        .get("documents")
        .and_then(Value::as_array)
        .ok_or_else(|| SpecError::InvalidManifest {
            path: manifest_path.to_string(),
            message: "must contain a \"documents\" array".to_string(),
        })?;
    if documents.is_empty() {
        return Err(SpecError::InvalidManifest {
            path: manifest_path.to_string(),
            message: "\"documents\" array must not be empty".to_string(),
        });
    }

    let manifest_dir = parent_dir(manifest_path);
    let mut paths = Vec::with_capacity(documents.len());
    for entry in documents {
        let Some(doc) = entry.as_str() else {
            return Err(SpecError::InvalidManifest {
                path: manifest_path.to_string(),
                message: format!("\"documents\" entries must be strings, got {entry}"),
            });
        };
        if is_url(doc) {
            paths.push(doc.to_string());
        } else {
            let trimmed = doc.strip_prefix("./").unwrap_or(doc);
            paths.push(join_spec_path(&manifest_dir, trimmed));
        }
    }
    Ok(paths)
}

/// Results of a run over one or more documents, keyed by document path.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateResult {
    pub validity_status: bool,
    pub results: BTreeMap<String, SpecValidationResult>,
}

impl Default for AggregateResult {
    fn default() -> Self {
        AggregateResult {
            validity_status: true,
            results: BTreeMap::new(),
        }
    }
}

impl AggregateResult {
    pub fn new() -> Self {
        AggregateResult::default()
    }

    /// Record one document's result. The overall flag only moves to false.
    pub fn record(&mut self, path: &str, result: SpecValidationResult) {
        if !result.validity_status {
            self.validity_status = false;
        }
        self.results.insert(path.to_string(), result);
    }
}

/// Validate documented examples for every member of a composite spec.
///
/// A member that fails to resolve contributes its failed result and does not
/// stop the remaining members.
pub fn validate_examples_in_composite_spec(
    manifest_path: &str,
    cache: Arc<DocumentCache>,
    operation_ids: Option<&str>,
) -> Result<AggregateResult, SpecError> {
    let documents = documents_from_composite_spec(manifest_path, &cache)?;
    let mut aggregate = AggregateResult::new();

    for doc in &documents {
        tracing::info!(path = %doc, "validating examples");
        let mut validator = SpecValidator::new(doc, cache.clone());
        let path = validator.spec_path().to_string();
        let run = match validator.initialize() {
            Ok(()) => validator.validate_operations(operation_ids),
            Err(err) => Err(err),
        };
        let mut result = validator.into_result();
        record_member_failure(&mut result, &path, run);
        aggregate.record(&path, result);
    }
    Ok(aggregate)
}

/// Run semantic validation for every member of a composite spec.
pub fn validate_spec_in_composite_spec(
    manifest_path: &str,
    cache: Arc<DocumentCache>,
) -> Result<AggregateResult, SpecError> {
    let documents = documents_from_composite_spec(manifest_path, &cache)?;
    let mut aggregate = AggregateResult::new();

    for doc in &documents {
        tracing::info!(path = %doc, "validating spec");
        let mut validator = SpecValidator::new(doc, cache.clone());
        let path = validator.spec_path().to_string();
        let run = match validator.initialize() {
            Ok(()) => validator.validate_spec_semantics(),
            Err(err) => Err(err),
        };
        let mut result = validator.into_result();
        record_member_failure(&mut result, &path, run);
        aggregate.record(&path, result);
    }
    Ok(aggregate)
}

/// Fold a member's resolution failure into its own result.
///
/// Resolution errors are fatal per document, never for the composite run.
/// Initialization failures are already in the result; this catches the ones
/// surfacing later, like an operation parameter `$ref` to a missing key.
fn record_member_failure(
    result: &mut SpecValidationResult,
    path: &str,
    run: Result<(), SpecError>,
) {
    if let Err(err) = run {
        if result.resolve_spec.is_none() {
            let wrapped = SpecError::ResolveSpec {
                path: path.to_string(),
                source: Box::new(err),
            };
            result.record_resolve_failure(wrapped.to_issue());
        }
    }
}

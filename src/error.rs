//! Error codes and typed errors for spec resolution and example validation.

use serde::Serialize;
use thiserror::Error;

/// Stable error codes surfaced at the crate boundary.
///
/// These are the strings callers match on; they never change between
/// releases even when the accompanying messages do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    InitializationError,
    ResolveSpecError,
    ObjectNotFound,
    CyclicAllOf,
    SemanticValidationError,
    RequestValidationError,
    ResponseValidationError,
    ResponseStatusCodeNotInSpec,
    ResponseSchemaNotInSpec,
    RequiredParameterNotInExample,
    XmsExampleNotFoundError,
    InternalError,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::InitializationError => "InitializationError",
            ErrorCode::ResolveSpecError => "ResolveSpecError",
            ErrorCode::ObjectNotFound => "ObjectNotFound",
            ErrorCode::CyclicAllOf => "CyclicAllOf",
            ErrorCode::SemanticValidationError => "SemanticValidationError",
            ErrorCode::RequestValidationError => "RequestValidationError",
            ErrorCode::ResponseValidationError => "ResponseValidationError",
            ErrorCode::ResponseStatusCodeNotInSpec => "ResponseStatusCodeNotInSpec",
            ErrorCode::ResponseSchemaNotInSpec => "ResponseSchemaNotInSpec",
            ErrorCode::RequiredParameterNotInExample => "RequiredParameterNotInExample",
            ErrorCode::XmsExampleNotFoundError => "XmsExampleNotFoundError",
            ErrorCode::InternalError => "InternalError",
        }
    }
}

impl Serialize for ErrorCode {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A structured validation outcome recorded in the result tree.
///
/// Validation outcomes are data, not errors: a schema mismatch is reported
/// through one of these, never as a `SpecError`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationIssue {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub inner_errors: Vec<ValidationIssue>,
}

impl ValidationIssue {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        ValidationIssue {
            code: code.as_str().to_string(),
            message: message.into(),
            inner_errors: Vec::new(),
        }
    }

    /// Issue with a free-form code, used for inner details reported by the
    /// schema-validation engine.
    pub fn with_code(code: impl Into<String>, message: impl Into<String>) -> Self {
        ValidationIssue {
            code: code.into(),
            message: message.into(),
            inner_errors: Vec::new(),
        }
    }

    pub fn wrap(mut self, inner: Vec<ValidationIssue>) -> Self {
        self.inner_errors = inner;
        self
    }
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

/// Fatal errors: configuration problems and resolution failures.
///
/// These abort the document (or scenario) being processed; they are always
/// caught and converted before crossing the orchestrator boundary.
#[derive(Debug, Error)]
pub enum SpecError {
    // IO errors (exit code 3)
    #[error("spec file not found: {path}")]
    FileNotFound { path: String },

    #[error("cannot read {path}: {source}")]
    ReadError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[cfg(feature = "remote")]
    #[error("failed to fetch {url}: {source}")]
    NetworkError {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    // Spec errors (exit code 2)
    #[error("invalid JSON in {path}: {source}")]
    InvalidJson {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("reference \"{reference}\" not found in document \"{document}\"")]
    ObjectNotFound { reference: String, document: String },

    #[error("cyclic allOf chain detected at model \"{model}\"")]
    CyclicAllOf { model: String },

    #[error("invalid composite spec {path}: {message}")]
    InvalidManifest { path: String, message: String },

    #[error("failed to resolve spec {path}")]
    ResolveSpec {
        path: String,
        #[source]
        source: Box<SpecError>,
    },

    #[error("validator for {path} is not initialized: call initialize() first")]
    Uninitialized { path: String },

    #[error("internal error: {message}")]
    Internal { message: String },
}

impl SpecError {
    /// Stable error code for this failure.
    pub fn code(&self) -> ErrorCode {
        match self {
            SpecError::ObjectNotFound { .. } => ErrorCode::ObjectNotFound,
            SpecError::CyclicAllOf { .. } => ErrorCode::CyclicAllOf,
            SpecError::Uninitialized { .. } => ErrorCode::InitializationError,
            SpecError::Internal { .. } => ErrorCode::InternalError,
            _ => ErrorCode::ResolveSpecError,
        }
    }

    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            SpecError::FileNotFound { .. } | SpecError::ReadError { .. } => 3,
            #[cfg(feature = "remote")]
            SpecError::NetworkError { .. } => 3,
            // The wrapper keeps the trigger's I/O classification.
            SpecError::ResolveSpec { source, .. } => source.exit_code(),
            _ => 2,
        }
    }

    /// Converts this error into an issue suitable for the result tree.
    pub fn to_issue(&self) -> ValidationIssue {
        ValidationIssue::new(self.code(), self.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_codes_are_stable_strings() {
        assert_eq!(ErrorCode::ResolveSpecError.as_str(), "ResolveSpecError");
        assert_eq!(ErrorCode::ObjectNotFound.as_str(), "ObjectNotFound");
        assert_eq!(
            ErrorCode::ResponseStatusCodeNotInSpec.as_str(),
            "ResponseStatusCodeNotInSpec"
        );
        assert_eq!(
            ErrorCode::XmsExampleNotFoundError.as_str(),
            "XmsExampleNotFoundError"
        );
    }

    #[test]
    fn spec_error_exit_codes() {
        let err = SpecError::FileNotFound {
            path: "swagger.json".into(),
        };
        assert_eq!(err.exit_code(), 3);

        let err = SpecError::ObjectNotFound {
            reference: "#/definitions/Missing".into(),
            document: "swagger.json".into(),
        };
        assert_eq!(err.exit_code(), 2);
        assert_eq!(err.code(), ErrorCode::ObjectNotFound);
    }

    #[test]
    fn resolve_spec_wraps_trigger() {
        let inner = SpecError::ObjectNotFound {
            reference: "#/definitions/Base".into(),
            document: "swagger.json".into(),
        };
        let err = SpecError::ResolveSpec {
            path: "swagger.json".into(),
            source: Box::new(inner),
        };
        assert_eq!(err.code(), ErrorCode::ResolveSpecError);
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn issue_display() {
        let issue = ValidationIssue::new(ErrorCode::ResponseValidationError, "body mismatch");
        assert_eq!(issue.to_string(), "ResponseValidationError: body mismatch");
    }
}

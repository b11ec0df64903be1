//! OpenAPI 2.0 spec validation.
//!
//! Resolves a Swagger document (recursive `$ref` and `allOf` flattening,
//! strictness normalization) and validates its documented examples against
//! the declared schemas, producing a nested, serializable result tree.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use swagger_validator::{DocumentCache, SpecValidator};
//!
//! let cache = Arc::new(DocumentCache::new());
//! let mut validator = SpecValidator::new("redis.json", cache);
//! validator.initialize()?;
//! validator.validate_operations(None)?;
//!
//! let result = validator.result();
//! if !result.validity_status {
//!     println!("{}", serde_json::to_string_pretty(result)?);
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # Pipeline
//!
//! `initialize` transforms the raw document in three passes before any
//! validation runs:
//!
//! 1. `x-ms-paths` entries are folded into `paths`.
//! 2. Every definition's `allOf` chain is flattened: properties are unioned
//!    (child wins on collisions), `required` lists are merged, and
//!    discriminator parents are recorded into an inheritance forest. Cyclic
//!    chains are rejected.
//! 3. Remaining cross-document `$ref`s are inlined so every schema handed to
//!    the engine resolves within the document itself.
//! 4. Definitions that do not set `additionalProperties` are closed with
//!    `additionalProperties: false`.
//!
//! Scalar pass/fail judgments are delegated to the [`ValidationEngine`]
//! trait; the default implementation is backed by the `jsonschema` crate.
//!
//! # Composite specs
//!
//! A manifest with a `documents` array validates each member in order,
//! sharing one [`DocumentCache`]; see [`validate_examples_in_composite_spec`].

mod composite;
mod engine;
mod error;
mod flatten;
mod inheritance;
mod loader;
mod normalize;
mod refs;
mod result;
mod validator;

pub use composite::{
    documents_from_composite_spec, validate_examples_in_composite_spec,
    validate_spec_in_composite_spec, AggregateResult,
};
pub use engine::{
    schema_with_definitions, EngineOutcome, JsonSchemaEngine, SampleGenerator,
    SchemaSampleGenerator, ValidationEngine,
};
pub use error::{ErrorCode, SpecError, ValidationIssue};
pub use flatten::flatten_definitions;
pub use inheritance::{InheritanceForest, InheritanceTree};
pub use loader::{
    is_url, join_spec_path, parent_dir, rewrite_github_url, strip_bom, DocumentCache,
};
pub use normalize::{enforce_strictness, unify_xms_paths};
pub use refs::{
    inline_external_refs, parse_reference, walk_pointer, ParsedReference, RefResolver,
};
pub use result::{
    OperationResult, PartResult, ScenarioOutcome, ScenarioResult, ScenariosResult, SemanticResult,
    SpecValidationResult,
};
pub use validator::{ParameterValue, SpecValidator, SyntheticRequest, SyntheticResponse};

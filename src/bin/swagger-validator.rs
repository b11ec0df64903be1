//! Swagger Validator CLI
//!
//! Command-line interface for resolving OpenAPI 2.0 specs and validating
//! their documented examples.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use swagger_validator::{
    documents_from_composite_spec, validate_examples_in_composite_spec,
    validate_spec_in_composite_spec, AggregateResult, DocumentCache, SpecValidator,
};

#[derive(Parser)]
#[command(name = "swagger-validator")]
#[command(about = "Validate OpenAPI 2.0 specs and their documented examples")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate x-ms-examples and in-spec examples against the spec's schemas
    ValidateExample {
        /// Spec source: file path or URL (http:// or https://)
        spec: String,

        /// Treat the spec as a composite manifest with a "documents" array
        #[arg(long)]
        composite: bool,

        /// Only validate these operationIds (comma-separated, advisory)
        #[arg(long)]
        operation_ids: Option<String>,

        /// Pretty-print the result tree
        #[arg(long)]
        pretty: bool,
    },

    /// Run structural (semantic) checks over the resolved spec
    ValidateSpec {
        /// Spec source: file path or URL
        spec: String,

        /// Treat the spec as a composite manifest
        #[arg(long)]
        composite: bool,

        /// Pretty-print the result tree
        #[arg(long)]
        pretty: bool,
    },

    /// Resolve a spec (flatten allOf, normalize) and emit the result
    Resolve {
        /// Spec source: file path or URL
        spec: String,

        /// Treat the spec as a composite manifest; requires --output-dir
        #[arg(long, requires = "output_dir")]
        composite: bool,

        /// Output file (stdout if not specified)
        #[arg(long, conflicts_with = "output_dir")]
        output: Option<PathBuf>,

        /// Directory to write one resolved file per document into
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::ValidateExample {
            spec,
            composite,
            operation_ids,
            pretty,
        } => run_validate_example(&spec, composite, operation_ids.as_deref(), pretty),

        Commands::ValidateSpec {
            spec,
            composite,
            pretty,
        } => run_validate_spec(&spec, composite, pretty),

        Commands::Resolve {
            spec,
            composite,
            output,
            output_dir,
        } => run_resolve(&spec, composite, output, output_dir),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(code) => ExitCode::from(code),
    }
}

fn run_validate_example(
    spec: &str,
    composite: bool,
    operation_ids: Option<&str>,
    pretty: bool,
) -> Result<(), u8> {
    let cache = Arc::new(DocumentCache::new());

    let aggregate = if composite {
        validate_examples_in_composite_spec(spec, cache, operation_ids).map_err(|e| {
            eprintln!("Error: {}", e);
            e.exit_code() as u8
        })?
    } else {
        let mut validator = SpecValidator::new(spec, cache);
        let path = validator.spec_path().to_string();
        if validator.initialize().is_ok() {
            validator.validate_operations(operation_ids).map_err(|e| {
                eprintln!("Error: {}", e);
                e.exit_code() as u8
            })?;
        }
        let mut aggregate = AggregateResult::new();
        aggregate.record(&path, validator.into_result());
        aggregate
    };

    print_aggregate(&aggregate, pretty)
}

fn run_validate_spec(spec: &str, composite: bool, pretty: bool) -> Result<(), u8> {
    let cache = Arc::new(DocumentCache::new());

    let aggregate = if composite {
        validate_spec_in_composite_spec(spec, cache).map_err(|e| {
            eprintln!("Error: {}", e);
            e.exit_code() as u8
        })?
    } else {
        let mut validator = SpecValidator::new(spec, cache);
        let path = validator.spec_path().to_string();
        if validator.initialize().is_ok() {
            validator.validate_spec_semantics().map_err(|e| {
                eprintln!("Error: {}", e);
                e.exit_code() as u8
            })?;
        }
        let mut aggregate = AggregateResult::new();
        aggregate.record(&path, validator.into_result());
        aggregate
    };

    print_aggregate(&aggregate, pretty)
}

/// Print the result tree; exit code 1 when anything failed validation.
fn print_aggregate(aggregate: &AggregateResult, pretty: bool) -> Result<(), u8> {
    let json = if pretty {
        serde_json::to_string_pretty(aggregate)
    } else {
        serde_json::to_string(aggregate)
    }
    .map_err(|e| {
        eprintln!("Error serializing output: {}", e);
        2u8
    })?;
    println!("{}", json);

    if aggregate.validity_status {
        Ok(())
    } else {
        Err(1)
    }
}

fn run_resolve(
    spec: &str,
    composite: bool,
    output: Option<PathBuf>,
    output_dir: Option<PathBuf>,
) -> Result<(), u8> {
    let cache = Arc::new(DocumentCache::new());

    let documents = if composite {
        documents_from_composite_spec(spec, &cache).map_err(|e| {
            eprintln!("Error: {}", e);
            e.exit_code() as u8
        })?
    } else {
        vec![spec.to_string()]
    };

    for doc in &documents {
        let mut validator = SpecValidator::new(doc, cache.clone());
        validator.initialize().map_err(|e| {
            eprintln!("Error: {}", e);
            e.exit_code() as u8
        })?;
        let resolved = validator.resolved_spec().ok_or_else(|| {
            eprintln!("Error: spec {} did not resolve", doc);
            2u8
        })?;

        let json = serde_json::to_string_pretty(resolved).map_err(|e| {
            eprintln!("Error serializing output: {}", e);
            2u8
        })?;

        if let Some(dir) = &output_dir {
            std::fs::create_dir_all(dir).map_err(|e| {
                eprintln!("Error creating {}: {}", dir.display(), e);
                3u8
            })?;
            let file_name = doc.rsplit('/').next().unwrap_or("resolved.json");
            let target = dir.join(file_name);
            std::fs::write(&target, &json).map_err(|e| {
                eprintln!("Error writing to {}: {}", target.display(), e);
                3u8
            })?;
        } else if let Some(path) = &output {
            std::fs::write(path, &json).map_err(|e| {
                eprintln!("Error writing to {}: {}", path.display(), e);
                3u8
            })?;
        } else {
            println!("{}", json);
        }
    }

    Ok(())
}

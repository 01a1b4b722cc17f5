//! Validates a resource file against one or more loaded schema files and
//! prints the resulting issue list as JSON.
//!
//! ```bash
//! conform-cli --schema patient.structuredefinition.json --resource patient.json
//! conform-cli --schema fhir-r4-core.bundle.json --resource bundle.json --references --terminology
//! ```

mod logging;

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use conform_validator::{new_validator, CancelToken, Registry, TerminologyService, ValidatorOptions};

#[derive(Parser, Debug)]
#[clap(name = "conform-cli", about = "Validate a resource against StructureDefinition schemas")]
struct Args {
    /// A schema file to load — either a single StructureDefinition or a
    /// Bundle of them. Repeatable.
    #[clap(short, long = "schema", required = true)]
    schemas: Vec<PathBuf>,

    /// The resource file to validate.
    #[clap(short, long)]
    resource: PathBuf,

    /// A Bundle of ValueSet/CodeSystem resources to validate bindings against.
    #[clap(long)]
    terminology_bundle: Option<PathBuf>,

    /// Validate against a specific profile URL instead of the resource's own type.
    #[clap(long)]
    profile: Option<String>,

    /// Run the terminology binding checker.
    #[clap(long)]
    terminology: bool,

    /// Run the reference checker.
    #[clap(long)]
    references: bool,

    /// Skip the constraint (invariant) checker.
    #[clap(long)]
    no_constraints: bool,

    /// Skip the extension checker.
    #[clap(long)]
    no_extensions: bool,

    /// Treat unknown extension URLs as warnings instead of ignoring them.
    #[clap(long)]
    strict: bool,

    /// Stop after this many blocking issues (0 means unlimited).
    #[clap(long, default_value_t = 0)]
    max_errors: u32,
}

fn main() -> Result<ExitCode> {
    logging::init();
    let args = Args::parse();

    let registry = Registry::new();
    for schema_path in &args.schemas {
        load_schema_file(&registry, schema_path)?;
    }
    tracing::info!(schemas = registry.list().len(), "schemas loaded");

    let options = ValidatorOptions::new()
        .with_constraints(!args.no_constraints)
        .with_terminology(args.terminology)
        .with_references(args.references)
        .with_extensions(!args.no_extensions)
        .with_strict_mode(args.strict)
        .with_max_errors(args.max_errors);
    let options = match &args.profile {
        Some(url) => options.with_profile_url(url.clone()),
        None => options,
    };

    let mut validator = new_validator(Arc::new(registry), options);
    if let Some(path) = &args.terminology_bundle {
        let bytes = fs::read(path).with_context(|| format!("reading terminology bundle {}", path.display()))?;
        let service = TerminologyService::from_bundle(&bytes).with_context(|| format!("parsing terminology bundle {}", path.display()))?;
        validator = validator.with_terminology_service(service);
    }

    let resource_bytes = fs::read(&args.resource).with_context(|| format!("reading resource {}", args.resource.display()))?;
    let cancel = CancelToken::new();
    let result = validator.validate(&cancel, &resource_bytes);

    println!("{}", serde_json::to_string_pretty(&result)?);

    tracing::info!(valid = result.valid, issues = result.issues.len(), "validation complete");
    Ok(if result.valid { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}

/// Loads one schema file, dispatching on whether it's a lone
/// `StructureDefinition` or a `Bundle` envelope of them.
fn load_schema_file(registry: &Registry, path: &PathBuf) -> Result<()> {
    let bytes = fs::read(path).with_context(|| format!("reading schema file {}", path.display()))?;
    let peek: serde_json::Value = serde_json::from_slice(&bytes).with_context(|| format!("parsing schema file {}", path.display()))?;
    let count = if peek.get("resourceType").and_then(|v| v.as_str()) == Some("Bundle") {
        registry.load_bundle(&bytes)
    } else {
        registry.load_single(&bytes)
    }
    .with_context(|| format!("loading schema file {}", path.display()))?;
    tracing::debug!(path = %path.display(), count, "schema file loaded");
    Ok(())
}

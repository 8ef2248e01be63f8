//! Manifest CLI - inspect application manifests from the command line
//!
//! ```text
//! manifest check <MANIFEST>
//! manifest resolve <MANIFEST> [--target page:home] [--home view:list]
//! manifest route <MODULE> <TARGET> [--record ID] [--record-param record]
//! manifest validate <MANIFEST> <VIEW> [--record JSON]
//! manifest transitions <MANIFEST> <ENTITY> [--record JSON]
//! ```

use anyhow::{bail, Context, Result};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use manifest_cache::{CompileWarning, ManifestCompiler};
use manifest_model::{build_route, CompiledManifest, EntityId, Record, DEFAULT_RECORD_PARAM};
use manifest_runtime::{available_transitions, compute_validation_errors, resolve_in_manifest};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Install the global subscriber (`RUST_LOG`, default `info`, on stderr)
pub fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    let installed = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    if installed.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}

fn manifest_arg() -> Arg {
    Arg::new("manifest")
        .required(true)
        .value_parser(value_parser!(PathBuf))
        .help("Path to the manifest JSON file")
}

fn record_arg() -> Arg {
    Arg::new("record")
        .long("record")
        .help("Record draft as a JSON object")
}

/// Command-line definition
#[must_use]
pub fn command() -> Command {
    Command::new("manifest")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Inspect declarative application manifests")
        .subcommand_required(true)
        .arg(
            Arg::new("json")
                .long("json")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Emit logs as JSON"),
        )
        .subcommand(
            Command::new("check")
                .about("Compile a manifest and list warnings")
                .arg(manifest_arg()),
        )
        .subcommand(
            Command::new("resolve")
                .about("Resolve a target with fallback")
                .arg(manifest_arg())
                .arg(Arg::new("target").long("target").help("Requested target"))
                .arg(Arg::new("home").long("home").help("Default home target")),
        )
        .subcommand(
            Command::new("route")
                .about("Build the route path for a target")
                .arg(Arg::new("module").required(true).help("Module id"))
                .arg(Arg::new("target").required(true).help("page:<id> or view:<id>"))
                .arg(Arg::new("record").long("record").help("Active record id"))
                .arg(
                    Arg::new("record-param")
                        .long("record-param")
                        .default_value(DEFAULT_RECORD_PARAM)
                        .help("Query parameter carrying the record id"),
                ),
        )
        .subcommand(
            Command::new("validate")
                .about("List missing required fields of a draft")
                .arg(manifest_arg())
                .arg(Arg::new("view").required(true).help("Form view id"))
                .arg(record_arg()),
        )
        .subcommand(
            Command::new("transitions")
                .about("List workflow transitions available for a draft")
                .arg(manifest_arg())
                .arg(Arg::new("entity").required(true).help("Entity id"))
                .arg(record_arg()),
        )
}

/// Run the selected subcommand and return its output
///
/// # Errors
/// Unreadable or invalid manifests, unknown views/entities, malformed input.
pub fn run(matches: &ArgMatches) -> Result<String> {
    match matches.subcommand() {
        Some(("check", args)) => {
            let (compiled, warnings) = load_manifest(path(args)?)?;
            Ok(check_report(&compiled, &warnings))
        }
        Some(("resolve", args)) => {
            let (compiled, _) = load_manifest(path(args)?)?;
            resolve(
                &compiled,
                args.get_one::<String>("target").map(String::as_str),
                args.get_one::<String>("home").map(String::as_str),
            )
        }
        Some(("route", args)) => route(
            required(args, "module")?,
            required(args, "target")?,
            args.get_one::<String>("record").map(String::as_str),
            required(args, "record-param")?,
        ),
        Some(("validate", args)) => {
            let (compiled, _) = load_manifest(path(args)?)?;
            let draft = parse_record(args.get_one::<String>("record").map(String::as_str))?;
            validate(&compiled, required(args, "view")?, &draft)
        }
        Some(("transitions", args)) => {
            let (compiled, _) = load_manifest(path(args)?)?;
            let draft = parse_record(args.get_one::<String>("record").map(String::as_str))?;
            transitions(&compiled, required(args, "entity")?, &draft)
        }
        _ => bail!("no subcommand given"),
    }
}

fn path(args: &ArgMatches) -> Result<&Path> {
    args.get_one::<PathBuf>("manifest")
        .map(PathBuf::as_path)
        .context("missing manifest path")
}

fn required<'a>(args: &'a ArgMatches, id: &str) -> Result<&'a str> {
    args.get_one::<String>(id)
        .map(String::as_str)
        .with_context(|| format!("missing argument '{id}'"))
}

/// Read and compile a manifest file
///
/// # Errors
/// Unreadable file or a manifest that does not compile.
pub fn load_manifest(path: &Path) -> Result<(CompiledManifest, Vec<CompileWarning>)> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let compiler = ManifestCompiler::new();
    let compiled = compiler
        .compile_str(&content)
        .with_context(|| format!("failed to compile {}", path.display()))?;
    let warnings = compiler.lint(compiled.manifest());
    Ok((compiled, warnings))
}

/// Parse `--record` into a draft (absent = empty)
///
/// # Errors
/// Input that is not a JSON object.
pub fn parse_record(raw: Option<&str>) -> Result<Record> {
    let Some(raw) = raw else {
        return Ok(Record::new());
    };
    match serde_json::from_str(raw).context("record is not valid JSON")? {
        serde_json::Value::Object(map) => Ok(map),
        _ => bail!("record must be a JSON object"),
    }
}

fn check_report(compiled: &CompiledManifest, warnings: &[CompileWarning]) -> String {
    let manifest = compiled.manifest();
    let mut lines = vec![
        format!("hash: {}", compiled.hash().short()),
        format!(
            "entities: {}, views: {}, pages: {}, actions: {}",
            manifest.entities.len(),
            manifest.views.len(),
            manifest.pages.len(),
            manifest.actions.len()
        ),
    ];
    if warnings.is_empty() {
        lines.push("no warnings".to_string());
    }
    lines.extend(
        warnings
            .iter()
            .map(|w| format!("warning: {}: {}", w.location, w.message)),
    );
    lines.join("\n")
}

/// Resolve a target against a manifest
///
/// # Errors
/// Resolver errors (missing home, invalid target, nothing found).
pub fn resolve(compiled: &CompiledManifest, target: Option<&str>, home: Option<&str>) -> Result<String> {
    let manifest = compiled.manifest();
    let home = home.or(manifest.app.home.as_deref());
    let resolution = resolve_in_manifest(target, home, manifest)?;
    Ok(if resolution.fell_back {
        format!("{} (fallback for {})", resolution.target, resolution.requested)
    } else {
        resolution.target.to_string()
    })
}

/// Route path for a target
///
/// # Errors
/// Malformed module id or target.
pub fn route(module_id: &str, target: &str, record: Option<&str>, record_param: &str) -> Result<String> {
    let Some(route) = build_route(module_id, target) else {
        bail!("invalid route: module '{module_id}', target '{target}'");
    };
    let route = match record {
        Some(id) => route.with_record(id),
        None => route,
    };
    Ok(route.to_path(record_param))
}

/// Missing required fields, one per line
///
/// # Errors
/// Unknown view.
pub fn validate(compiled: &CompiledManifest, view_id: &str, draft: &Record) -> Result<String> {
    let view = compiled
        .manifest()
        .view(view_id)
        .with_context(|| format!("unknown view '{view_id}'"))?;
    let errors = compute_validation_errors(compiled, view, draft);
    if errors.is_empty() {
        return Ok("valid".to_string());
    }
    Ok(errors
        .iter()
        .map(|(field, message)| format!("{field}: {message}"))
        .collect::<Vec<_>>()
        .join("\n"))
}

/// Transitions from the draft's status, one per line
///
/// # Errors
/// Malformed or unknown entity.
pub fn transitions(compiled: &CompiledManifest, entity: &str, draft: &Record) -> Result<String> {
    let entity = EntityId::parse(entity)?;
    if compiled.manifest().entity(&entity).is_none() {
        bail!("unknown entity '{entity}'");
    }
    let available = available_transitions(compiled, &entity, draft);
    if available.is_empty() {
        return Ok("no transitions".to_string());
    }
    Ok(available
        .iter()
        .map(|t| match &t.label {
            Some(label) => format!("{} -> {} ({label})", t.from, t.to),
            None => format!("{} -> {}", t.from, t.to),
        })
        .collect::<Vec<_>>()
        .join("\n"))
}

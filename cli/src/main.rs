mod config;

use std::fs;
use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use rayon::prelude::*;
use schema_resolve_core::{Catalog, FieldKind, Resolver, Schema, Shape, StateOps};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use crate::config::{DEFAULT_CONFIG_FILE, ResolveConfig};

#[derive(Debug, Parser)]
#[command(name = "schema-resolve", version)]
#[command(about = "Resolve hierarchical data schemas against overrides")]
struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// YAML config with resolver options and extra variants
    /// (default: .schema-resolve.yml if present).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Resolve a current schema against an update and print the result.
    Resolve(ResolveArgs),
    /// Print the default state of a schema.
    Default(DefaultArgs),
    /// Resolve a list of named schema pairs in parallel.
    Batch(BatchArgs),
    /// List the registered schema variants.
    Variants,
    /// Print the effective configuration as YAML, or write it to a file.
    Config(ConfigArgs),
}

#[derive(Debug, Args)]
struct ResolveArgs {
    /// Base schema (JSON notation).
    #[arg(long)]
    current: PathBuf,
    /// Override schema (JSON notation).
    #[arg(long)]
    update: PathBuf,
    /// Pretty-print the output.
    #[arg(long)]
    pretty: bool,
}

#[derive(Debug, Args)]
struct DefaultArgs {
    /// Schema file (JSON notation).
    input: PathBuf,
    /// Pretty-print the output.
    #[arg(long)]
    pretty: bool,
}

#[derive(Debug, Args)]
struct BatchArgs {
    /// YAML or JSON list of `{name, current, update}` entries.
    input: PathBuf,
    /// Pretty-print the report.
    #[arg(long)]
    pretty: bool,
}

#[derive(Debug, Args)]
struct ConfigArgs {
    /// Write the configuration here instead of stdout.
    #[arg(long)]
    output: Option<PathBuf>,
}

/// One named pair of a batch file. Either side may be omitted.
#[derive(Debug, Deserialize)]
struct BatchEntry {
    name: String,
    current: Option<Value>,
    update: Option<Value>,
}

/// Report line for one batch entry.
#[derive(Debug, Serialize)]
struct BatchOutcome {
    name: String,
    ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    schema: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

fn main() {
    let cli = Cli::parse();

    // Output goes to stderr so JSON on stdout stays clean for piping.
    let filter = match cli.verbose {
        0 => EnvFilter::new("warn,schema_resolve=info,schema_resolve_core=info"),
        1 => EnvFilter::new("warn,schema_resolve=debug,schema_resolve_core=debug"),
        _ => EnvFilter::new("warn,schema_resolve=trace,schema_resolve_core=trace"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let result = load_config(cli.config.as_deref()).and_then(|config| match cli.command {
        Command::Resolve(args) => run_resolve(&config, args),
        Command::Default(args) => run_default(&config, args),
        Command::Batch(args) => run_batch(&config, args),
        Command::Variants => run_variants(&config),
        Command::Config(args) => run_config(&config, args),
    });

    if let Err(err) = result {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn load_config(path: Option<&Path>) -> Result<ResolveConfig, String> {
    let path = match path {
        Some(path) => path,
        None if Path::new(DEFAULT_CONFIG_FILE).is_file() => Path::new(DEFAULT_CONFIG_FILE),
        None => return Ok(ResolveConfig::default()),
    };
    let config = ResolveConfig::load(path)
        .map_err(|e| format!("Failed to load config '{}': {e}", path.display()))?;
    debug!(path = %path.display(), variants = config.variants.len(), "Loaded config");
    Ok(config)
}

fn build_catalog(config: &ResolveConfig) -> Result<Catalog, String> {
    config
        .catalog()
        .map_err(|e| format!("Failed to build variant catalog: {e}"))
}

fn read_schema(catalog: &Catalog, path: &Path) -> Result<Schema, String> {
    let text = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read '{}': {e}", path.display()))?;
    catalog
        .decode_str(&text)
        .map_err(|e| format!("Failed to decode schema '{}': {e}", path.display()))
}

fn print_json(value: &impl Serialize, pretty: bool) -> Result<(), String> {
    let text = if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    }
    .map_err(|e| format!("Failed to serialize output: {e}"))?;
    println!("{text}");
    Ok(())
}

fn run_resolve(config: &ResolveConfig, args: ResolveArgs) -> Result<(), String> {
    let catalog = build_catalog(config)?;
    let current = read_schema(&catalog, &args.current)?;
    let update = read_schema(&catalog, &args.update)?;

    let resolved = Resolver::new(&catalog)
        .with_options(config.options)
        .resolve_schemas(&current, &update)
        .map_err(|e| e.to_string())?;

    print_json(&catalog.encode(&resolved), args.pretty)
}

fn run_default(config: &ResolveConfig, args: DefaultArgs) -> Result<(), String> {
    let catalog = build_catalog(config)?;
    let schema = read_schema(&catalog, &args.input)?;
    print_json(&catalog.default_state(&schema), args.pretty)
}

fn run_batch(config: &ResolveConfig, args: BatchArgs) -> Result<(), String> {
    let catalog = build_catalog(config)?;
    let text = fs::read_to_string(&args.input)
        .map_err(|e| format!("Failed to read '{}': {e}", args.input.display()))?;
    // YAML is a superset of JSON, so one parser covers both.
    let entries: Vec<BatchEntry> = serde_yaml::from_str(&text)
        .map_err(|e| format!("Failed to parse batch file '{}': {e}", args.input.display()))?;

    let resolver = Resolver::new(&catalog).with_options(config.options);
    let outcomes: Vec<BatchOutcome> = entries
        .par_iter()
        .map(|entry| resolve_entry(&catalog, &resolver, entry))
        .collect();

    let failed = outcomes.iter().filter(|o| !o.ok).count();
    info!(total = outcomes.len(), failed, "Batch resolved");
    print_json(&outcomes, args.pretty)?;

    if failed > 0 {
        return Err(format!("{failed} of {} pairs failed to resolve", outcomes.len()));
    }
    Ok(())
}

fn resolve_entry(catalog: &Catalog, resolver: &Resolver<'_>, entry: &BatchEntry) -> BatchOutcome {
    let decode = |value: &Option<Value>| -> Result<Option<Schema>, String> {
        value
            .as_ref()
            .map(|v| catalog.decode(v).map_err(|e| e.to_string()))
            .transpose()
    };

    let resolved = decode(&entry.current).and_then(|current| {
        let update = decode(&entry.update)?;
        resolver
            .resolve(current.as_ref(), update.as_ref())
            .map_err(|e| e.to_string())
    });

    match resolved {
        Ok(schema) => BatchOutcome {
            name: entry.name.clone(),
            ok: true,
            schema: Some(schema.map_or(Value::Null, |s| catalog.encode(&s))),
            error: None,
        },
        Err(err) => {
            debug!(name = %entry.name, error = %err, "Batch entry failed");
            BatchOutcome {
                name: entry.name.clone(),
                ok: false,
                schema: None,
                error: Some(err),
            }
        }
    }
}

fn run_variants(config: &ResolveConfig) -> Result<(), String> {
    let catalog = build_catalog(config)?;
    for variant in catalog.variants() {
        let fields: Vec<String> = variant
            .fields()
            .iter()
            .map(|f| format!("{}:{}", f.name, field_kind_label(f.kind)))
            .collect();
        println!(
            "{:<12} {:<10} {:<8} {}",
            variant.name(),
            variant.parent().unwrap_or("-"),
            shape_label(variant.shape()),
            fields.join(",")
        );
    }
    Ok(())
}

fn run_config(config: &ResolveConfig, args: ConfigArgs) -> Result<(), String> {
    // refuse to emit a config whose variants would not register
    build_catalog(config)?;

    match args.output {
        Some(path) => {
            config
                .save(&path)
                .map_err(|e| format!("Failed to write config '{}': {e}", path.display()))?;
            info!(path = %path.display(), "Wrote config");
        }
        None => {
            let text = serde_yaml::to_string(config)
                .map_err(|e| format!("Failed to serialize config: {e}"))?;
            print!("{text}");
        }
    }
    Ok(())
}

fn shape_label(shape: Shape) -> &'static str {
    match shape {
        Shape::Plain => "plain",
        Shape::Wrapper => "wrapper",
        Shape::Map => "map",
        Shape::Tree => "tree",
    }
}

fn field_kind_label(kind: FieldKind) -> &'static str {
    match kind {
        FieldKind::Schema => "schema",
        FieldKind::Schemas => "schemas",
        FieldKind::Param => "param",
    }
}

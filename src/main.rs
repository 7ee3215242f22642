//! Fluxgate CLI
//!
//! Entry point for the `fluxgate` command-line tool: resolves the config
//! sources, merges them, and either dumps the merged configuration or
//! checks that it builds.

use std::path::{Path, PathBuf};
use std::process;

use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use fluxgate::{
    ConfigSource, FormatRegistry, MergeEngine, RegistryError, ServerBuilder, ServerConfig,
    StandardFetcher, STDIN_SOURCE,
};

/// Environment variable naming a directory of config files.
const ENV_CONFDIR: &str = "FLUXGATE_CONFDIR";

/// Environment variable naming a single config file.
const ENV_CONFIG: &str = "FLUXGATE_CONFIG";

/// Exit code for configuration errors. Distinct from a plain failure so
/// supervisors can avoid restart loops on a broken config.
const EXIT_CONFIG: i32 = 23;

#[derive(Parser)]
#[command(name = "fluxgate")]
#[command(about = "Fluxgate proxy server configuration tool", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct SourceArgs {
    /// Config file, URL, or "stdin:" (repeatable; merged in order)
    #[arg(long, short = 'c')]
    config: Vec<String>,

    /// Directory of config files to merge after the explicit ones
    #[arg(long)]
    confdir: Option<PathBuf>,

    /// Format of the input files (auto, json, yaml, toml)
    #[arg(long, default_value = "auto")]
    format: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Merge all config sources and print the resulting JSON
    Dump {
        #[command(flatten)]
        sources: SourceArgs,
    },

    /// Merge all config sources and verify the configuration builds
    Check {
        #[command(flatten)]
        sources: SourceArgs,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let code = match cli.command {
        Commands::Dump { sources } => dump_config(&sources),
        Commands::Check { sources } => check_config(&sources),
    };
    process::exit(code);
}

fn dump_config(args: &SourceArgs) -> i32 {
    let registry = FormatRegistry::standard();
    let sources = match resolve_sources(args, &registry) {
        Ok(sources) => sources,
        Err(err) => return report(&err),
    };
    let fetcher = StandardFetcher::new();
    let payloads = fluxgate::conf::payload_registry();
    let engine = MergeEngine::new(&fetcher, &payloads);
    match engine.dump::<ServerConfig>(&sources) {
        Ok(out) => {
            print!("{out}");
            0
        }
        Err(err) => report(&err),
    }
}

fn check_config(args: &SourceArgs) -> i32 {
    let registry = FormatRegistry::standard();
    let sources = match resolve_sources(args, &registry) {
        Ok(sources) => sources,
        Err(err) => return report(&err),
    };
    let fetcher = StandardFetcher::new();
    let payloads = fluxgate::conf::payload_registry();
    let engine = MergeEngine::new(&fetcher, &payloads);
    match engine.build::<ServerConfig, _>(&sources, &ServerBuilder) {
        Ok(_) => {
            println!("Configuration OK.");
            0
        }
        Err(err) => report(&err),
    }
}

/// Print the full error chain to stderr and return the config exit code.
fn report(err: &dyn std::error::Error) -> i32 {
    eprintln!("error: {err}");
    let mut source = err.source();
    while let Some(cause) = source {
        eprintln!("  caused by: {cause}");
        source = cause.source();
    }
    EXIT_CONFIG
}

/// Resolve the list of config sources from flags, environment, and the
/// working directory, in that order of preference.
fn resolve_sources(
    args: &SourceArgs,
    registry: &FormatRegistry,
) -> Result<Vec<ConfigSource>, RegistryError> {
    let names = collect_names(args, registry);
    names
        .into_iter()
        .map(|name| match registry.by_name(&args.format) {
            Some(format) => Ok(ConfigSource::new(name, format)),
            None if args.format == "auto" => ConfigSource::from_name(name, registry),
            None => Err(RegistryError::UnknownFormat(args.format.clone())),
        })
        .collect()
}

fn collect_names(args: &SourceArgs, registry: &FormatRegistry) -> Vec<String> {
    let mut names = args.config.clone();

    let confdir = args
        .confdir
        .clone()
        .or_else(|| std::env::var(ENV_CONFDIR).ok().map(PathBuf::from));
    if let Some(dir) = confdir {
        names.extend(scan_confdir(&dir, &args.format, registry));
    }
    if !names.is_empty() {
        return names;
    }

    // Nothing given: look for a default config in the working directory.
    for ext in ["json", "jsonc", "toml", "yaml", "yml"] {
        let candidate = format!("config.{ext}");
        if Path::new(&candidate).is_file() {
            return vec![candidate];
        }
    }
    if let Ok(path) = std::env::var(ENV_CONFIG) {
        if Path::new(&path).is_file() {
            return vec![path];
        }
    }
    vec![STDIN_SOURCE.to_string()]
}

/// Files in `dir` whose extension matches the active format, sorted by
/// name so the merge order is stable.
fn scan_confdir(dir: &Path, format: &str, registry: &FormatRegistry) -> Vec<String> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(_) => return Vec::new(),
    };
    let forced = registry.by_name(format);
    let mut names: Vec<String> = entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().is_file())
        .filter_map(|entry| {
            let path = entry.path();
            let detected = registry.for_path(path.to_str()?)?;
            match forced {
                Some(wanted) if detected != wanted => None,
                _ => Some(path.to_string_lossy().into_owned()),
            }
        })
        .collect();
    names.sort();
    names
}

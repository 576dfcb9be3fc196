//! Asset Publish CLI
//!
//! Entry point for the `asset-publish` command-line tool.

use asset_publish::config::{env_layer, EffectiveConfig};
use asset_publish::context::session_timestamp;
use asset_publish::schema::VERSION_SCHEMA;
use asset_publish::{
    checked_subset_dir, list_versions, BuiltinValidator, Instance, IntegrateError, Integrator,
    PublishConfig, PublishContext, SchemaValidator, StepResult,
};
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};
use std::process;

/// Config file picked up from the working directory when `--config` is not given
const DEFAULT_CONFIG_PATH: &str = "publish.toml";

#[derive(Parser)]
#[command(name = "asset-publish")]
#[command(about = "Publish staged output as a new version of an asset subset", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct ConfigArgs {
    /// Path to config file (default: ./publish.toml if present)
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,

    /// Repository root (overrides PUBLISH_ROOT)
    #[arg(long)]
    root: Option<PathBuf>,

    /// Silo the asset was authored under (overrides PUBLISH_SILO)
    #[arg(long)]
    silo: Option<String>,

    /// Progress output on stderr
    #[arg(long, short = 'v')]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Publish a staging directory as the next version of a subset
    Integrate {
        #[command(flatten)]
        config: ConfigArgs,

        /// Directory holding the staged output
        #[arg(long)]
        staging_dir: Option<PathBuf>,

        /// Subset to publish into (e.g. "model")
        #[arg(long)]
        subset: String,

        /// Primary family of this publish
        #[arg(long)]
        family: String,

        /// Additional declared families (comma-separated)
        #[arg(long, value_delimiter = ',')]
        families: Vec<String>,

        /// Output file relative to the staging directory (repeatable;
        /// default: every visible file at the top of the staging directory)
        #[arg(long = "file")]
        files: Vec<String>,

        /// Instance name used in messages (default: the subset)
        #[arg(long)]
        name: Option<String>,

        /// Working file the output was produced from (required; relative
        /// paths resolve against the current directory)
        #[arg(long)]
        source: PathBuf,

        /// Publishing user (default: $USER)
        #[arg(long)]
        user: Option<String>,

        /// Session timestamp (default: now, as YYYYMMDDTHHMMSSZ)
        #[arg(long)]
        time: Option<String>,

        /// JSON array of prior step results ({"step", "success"})
        #[arg(long)]
        results: Option<PathBuf>,

        /// Mark the publish session as already partially failed
        #[arg(long)]
        upstream_failed: bool,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Print the version number the next publish of a subset would get
    NextVersion {
        #[command(flatten)]
        config: ConfigArgs,

        /// Subset name
        #[arg(long)]
        subset: String,
    },

    /// List published versions of a subset
    Versions {
        #[command(flatten)]
        config: ConfigArgs,

        /// Subset name
        #[arg(long)]
        subset: String,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Validate a metadata document against the version schema
    Validate {
        /// Path to a .metadata.json file
        file: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Commands::Integrate {
            config,
            staging_dir,
            subset,
            family,
            families,
            files,
            name,
            source,
            user,
            time,
            results,
            upstream_failed,
            json,
        } => {
            let instance = Instance {
                name: name.unwrap_or_else(|| subset.clone()),
                subset,
                family,
                families,
                staging_dir,
                files,
            };
            run_integrate(config, instance, source, user, time, results, upstream_failed, json);
        }
        Commands::NextVersion { config, subset } => {
            run_next_version(config, &subset);
        }
        Commands::Versions {
            config,
            subset,
            json,
        } => {
            run_versions(config, &subset, json);
        }
        Commands::Validate { file } => {
            run_validate(&file);
        }
    }
}

fn load_config(args: ConfigArgs) -> Result<PublishConfig, String> {
    let path = match args.config {
        Some(path) => Some(path),
        None => {
            let default = PathBuf::from(DEFAULT_CONFIG_PATH);
            default.exists().then_some(default)
        }
    };

    let mut cli = Map::new();
    if let Some(root) = args.root {
        cli.insert(
            "root".to_string(),
            Value::String(root.to_string_lossy().into_owned()),
        );
    }
    if let Some(silo) = args.silo {
        cli.insert("silo".to_string(), Value::String(silo));
    }
    if args.verbose {
        cli.insert("verbose".to_string(), Value::Bool(true));
    }

    EffectiveConfig::build(path.as_deref(), env_layer(), Some(Value::Object(cli)))
        .map(|effective| effective.to_publish_config())
        .map_err(|e| e.to_string())
}

fn config_or_exit(args: ConfigArgs) -> PublishConfig {
    match load_config(args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            process::exit(2);
        }
    }
}

fn exit_with(err: IntegrateError) -> ! {
    eprintln!("Error: {}", err);
    if err.is_retryable() {
        eprintln!("Another publish claimed this version; run the command again to allocate a new one.");
    }
    process::exit(err.exit_code());
}

/// Visible top-level files of the staging directory, sorted by name
fn staged_files(staging_dir: &Path) -> Result<Vec<String>, IntegrateError> {
    let mut files = Vec::new();
    for entry in fs::read_dir(staging_dir).map_err(|e| IntegrateError::io(staging_dir, e))? {
        let entry = entry.map_err(|e| IntegrateError::io(staging_dir, e))?;
        let name = entry.file_name().to_string_lossy().into_owned();
        let is_file = entry
            .file_type()
            .map_err(|e| IntegrateError::io(entry.path(), e))?
            .is_file();
        if is_file && !name.starts_with('.') {
            files.push(name);
        }
    }
    files.sort();
    Ok(files)
}

fn current_user() -> String {
    std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "unknown".to_string())
}

#[allow(clippy::too_many_arguments)]
fn run_integrate(
    config_args: ConfigArgs,
    mut instance: Instance,
    source: PathBuf,
    user: Option<String>,
    time: Option<String>,
    results_path: Option<PathBuf>,
    upstream_failed: bool,
    json_output: bool,
) {
    let config = config_or_exit(config_args);
    let integrator = Integrator::new(config);

    if !integrator.accepts(&instance) {
        println!(
            "Skipping \"{}\": family \"{}\" is not handled by this integrator",
            instance.name, instance.family
        );
        process::exit(0);
    }

    let results = match results_path {
        Some(path) => StepResult::load_all(&path).unwrap_or_else(|e| exit_with(e)),
        None => Vec::new(),
    };

    let mut context = PublishContext::from_results(
        &results,
        time.unwrap_or_else(|| session_timestamp(Utc::now())),
        user.unwrap_or_else(current_user),
        source,
    );
    if upstream_failed {
        context.all_prior_steps_succeeded = false;
    }

    if instance.files.is_empty() {
        if let Some(dir) = instance.staging_dir.as_deref().filter(|d| d.is_dir()) {
            instance.files = staged_files(dir).unwrap_or_else(|e| exit_with(e));
        }
    }

    let published = integrator
        .integrate(&instance, &context)
        .unwrap_or_else(|e| exit_with(e));

    if json_output {
        match serde_json::to_string_pretty(&published) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                eprintln!("Error serializing output: {}", e);
                process::exit(1);
            }
        }
    } else {
        println!(
            "Published {} v{} ({} representation(s)) to {}",
            published.subset,
            published.number,
            published.metadata.representations.len(),
            published.path.display()
        );
    }
}

fn run_next_version(config_args: ConfigArgs, subset: &str) {
    let integrator = Integrator::new(config_or_exit(config_args));
    let next = integrator
        .next_version(subset)
        .unwrap_or_else(|e| exit_with(e));
    println!("{}", next);
}

fn run_versions(config_args: ConfigArgs, subset: &str, json_output: bool) {
    let config = config_or_exit(config_args);
    let root = config.require_root().unwrap_or_else(|e| exit_with(e));
    let dir = checked_subset_dir(root, subset).unwrap_or_else(|e| exit_with(e));
    let versions = list_versions(&dir).unwrap_or_else(|e| exit_with(e));

    if json_output {
        let output: Vec<Value> = versions
            .iter()
            .map(|n| {
                let name = asset_publish::format_version(*n);
                serde_json::json!({
                    "version": n,
                    "path": dir.join(&name).to_string_lossy(),
                    "has_metadata": dir.join(&name).join(asset_publish::METADATA_FILENAME).exists(),
                })
            })
            .collect();
        match serde_json::to_string_pretty(&output) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                eprintln!("Error serializing output: {}", e);
                process::exit(1);
            }
        }
    } else if versions.is_empty() {
        println!("No published versions of {}", subset);
    } else {
        for n in versions {
            println!("{}", dir.join(asset_publish::format_version(n)).display());
        }
    }
}

fn run_validate(file: &Path) {
    let document: Value = match fs::read(file)
        .map_err(|e| e.to_string())
        .and_then(|bytes| serde_json::from_slice(&bytes).map_err(|e| e.to_string()))
    {
        Ok(value) => value,
        Err(e) => {
            eprintln!("Error reading {}: {}", file.display(), e);
            process::exit(1);
        }
    };

    match BuiltinValidator.validate(&document, VERSION_SCHEMA) {
        Ok(()) => println!("{}: valid", file.display()),
        Err(violations) => {
            eprintln!("{}: invalid", file.display());
            for violation in &violations.violations {
                eprintln!("  - {}", violation);
            }
            process::exit(20);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integrate_requires_source() {
        let args = [
            "asset-publish",
            "integrate",
            "--staging-dir",
            "/repo/work/stage",
            "--subset",
            "model",
            "--family",
            "model",
        ];
        assert!(Cli::try_parse_from(args).is_err());

        let cli = Cli::try_parse_from(args.iter().copied().chain(["--source", "work/hero.ma"])).unwrap();
        match cli.command {
            Commands::Integrate { source, .. } => assert_eq!(source, PathBuf::from("work/hero.ma")),
            _ => panic!("expected integrate"),
        }
    }
}

// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]
//! Command-line entry point for the ingestion pipeline.
//!
//! Three subcommands: `run` drives configured jobs end to end, `doctor`
//! resolves every job's declared names against the compiled-in registries
//! without touching the network or disk cache, and `list` dumps what this
//! binary knows how to build.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use ingest_config::{apply_env_overrides, load_config, parse_toml, validate_config, AppConfig, ConfigError};
use ingest_core::{JobConfig, TransformTarget};
use ingest_error::IngestError;
use ingest_runtime::plugin::{initializer_table, PluginLoader};
use ingest_runtime::Wiring;

/// Exit code used for any job failure or `doctor` finding unresolved names.
const EXIT_FAILURE: u8 = 1;
/// Exit code used when the configuration file itself cannot be loaded.
const EXIT_CONFIG_ERROR: u8 = 2;

#[derive(Parser, Debug)]
#[command(name = "ingest", version, about = "Offline data-ingestion pipeline driver")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run one or all configured jobs.
    Run {
        /// Path to the pipeline configuration file (TOML).
        config: PathBuf,

        /// Run only this job. Can be repeated to run several by name.
        #[arg(long = "job")]
        jobs: Vec<String>,

        /// Stop dispatching further jobs on the first failure.
        #[arg(long, conflicts_with = "no_fail_fast")]
        fail_fast: bool,

        /// Run every selected job even after a failure.
        #[arg(long)]
        no_fail_fast: bool,
    },

    /// Load the configuration, run the plugin loader, and resolve every
    /// job's declared names without fetching or caching anything.
    Doctor {
        /// Path to the pipeline configuration file (TOML).
        config: PathBuf,
    },

    /// Print every name this binary's compiled-in plugins can register.
    List,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(code) => ExitCode::from(code),
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::from(EXIT_CONFIG_ERROR)
        }
    }
}

async fn run(cli: Cli) -> Result<u8, CliError> {
    match cli.command {
        Commands::Run { config, jobs, fail_fast, no_fail_fast } => {
            let fail_fast_override = if fail_fast {
                Some(true)
            } else if no_fail_fast {
                Some(false)
            } else {
                None
            };
            cmd_run(&config, &jobs, fail_fast_override).await
        }
        Commands::Doctor { config } => cmd_doctor(&config),
        Commands::List => cmd_list(),
    }
}

/// Errors that abort the process before any subcommand logic can produce
/// its own exit code: these are always configuration- or argument-shaped.
#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Ingest(#[from] IngestError),
}

fn load_and_prepare(config_path: &PathBuf) -> Result<(AppConfig, Wiring), CliError> {
    let config = load_config(config_path)?;
    let known_plugins: Vec<&str> = initializer_table().iter().map(|(name, _)| *name).collect();
    let warnings = validate_config(&config, &known_plugins)?;
    for warning in &warnings {
        tracing::warn!(target: "ingest.cli", "{warning}");
    }

    let mut wiring = Wiring::new();
    let mut loader = PluginLoader::new();
    loader.load(&mut wiring, &config.plugins)?;
    Ok((config, wiring))
}

fn select_jobs<'a>(config: &'a AppConfig, names: &[String]) -> Result<Vec<&'a JobConfig>, CliError> {
    if names.is_empty() {
        return Ok(config.jobs.iter().collect());
    }
    let mut selected = Vec::with_capacity(names.len());
    for name in names {
        let job = config
            .jobs
            .iter()
            .find(|job| &job.name == name)
            .ok_or_else(|| ConfigError::ValidationError { reasons: vec![format!("no job named '{name}'")] })?;
        selected.push(job);
    }
    Ok(selected)
}

async fn cmd_run(config_path: &PathBuf, job_names: &[String], fail_fast_override: Option<bool>) -> Result<u8, CliError> {
    ingest_telemetry::init_tracing("info");
    let (config, wiring) = load_and_prepare(config_path)?;
    let fail_fast = fail_fast_override.unwrap_or(config.execution.fail_fast);
    let target: TransformTarget = config.transform_configs.target.clone().try_into().map_err(|reason: String| {
        CliError::Config(ConfigError::ValidationError { reasons: vec![reason] })
    })?;
    let jobs = select_jobs(&config, job_names)?;

    let mut failures = 0u32;
    for job in jobs {
        tracing::info!(target: "ingest.cli", job = %job.name, "starting job");
        let mut runner = ingest_runner::JobRunner::new(
            job.clone(),
            config.cache_configs.raw.clone().into(),
            config.cache_configs.preprocessed.clone().into(),
            config.transform_configs.ir_version,
            target.clone(),
        );

        let outcome = run_one_job(&mut runner, &wiring).await;
        runner.close();

        match outcome {
            Ok(artifact_count) => {
                tracing::info!(target: "ingest.cli", job = %job.name, artifacts = artifact_count, "job finished");
            }
            Err(err) => {
                failures += 1;
                eprintln!("job '{}' failed: {err}", job.name);
                if fail_fast {
                    break;
                }
            }
        }
    }

    Ok(if failures > 0 { EXIT_FAILURE } else { 0 })
}

async fn run_one_job(runner: &mut ingest_runner::JobRunner, wiring: &Wiring) -> Result<usize, IngestError> {
    runner.prepare(wiring)?;
    runner.run(wiring).await?;
    Ok(runner.artifacts().len())
}

fn cmd_doctor(config_path: &PathBuf) -> Result<u8, CliError> {
    let content = std::fs::read_to_string(config_path).map_err(|_| {
        CliError::Config(ConfigError::FileNotFound { path: config_path.display().to_string() })
    })?;
    let mut config = parse_toml(&content)?;
    apply_env_overrides(&mut config);

    let known_plugins: Vec<&str> = initializer_table().iter().map(|(name, _)| *name).collect();
    let warnings = validate_config(&config, &known_plugins)?;

    let mut wiring = Wiring::new();
    let mut loader = PluginLoader::new();
    loader.load(&mut wiring, &config.plugins)?;

    let mut unresolved = 0u32;
    for job in &config.jobs {
        for (slot, name, ok) in [
            ("source", job.source.name.as_str(), wiring.resolve_source(&job.source.name).is_ok()),
            (
                "frontend",
                job.transform.frontend.name.as_str(),
                wiring.resolve_frontend(&job.transform.frontend.name).is_ok(),
            ),
            (
                "optimizer",
                job.transform.optimizer.name.as_str(),
                wiring.resolve_optimizer(&job.transform.optimizer.name).is_ok(),
            ),
            (
                "backend",
                job.transform.backend.name.as_str(),
                wiring.resolve_backend(&job.transform.backend.name).is_ok(),
            ),
        ] {
            if ok {
                println!("ok   {}: {slot} '{name}'", job.name);
            } else {
                unresolved += 1;
                println!("FAIL {}: {slot} '{name}' is not registered by any loaded plugin", job.name);
            }
        }
    }
    for warning in &warnings {
        println!("warn {warning}");
    }

    Ok(if unresolved > 0 { EXIT_FAILURE } else { 0 })
}

fn cmd_list() -> Result<u8, CliError> {
    let mut wiring = Wiring::new();
    let mut loader = PluginLoader::new();
    let all_plugins: Vec<String> = initializer_table().iter().map(|(name, _)| name.to_string()).collect();
    loader.load(&mut wiring, &all_plugins)?;

    println!("sources:");
    for name in wiring.sources.keys() {
        println!("  {name}");
    }
    println!("raw_caches:");
    for name in wiring.raw_caches.keys() {
        println!("  {name}");
    }
    println!("preprocessed_caches:");
    for name in wiring.preprocessed_caches.keys() {
        println!("  {name}");
    }
    println!("frontends:");
    for name in wiring.frontends.keys() {
        println!("  {name}");
    }
    println!("optimizers:");
    for name in wiring.optimizers.keys() {
        println!("  {name}");
    }
    println!("backends:");
    for name in wiring.backends.keys() {
        println!("  {name}");
    }

    Ok(0)
}

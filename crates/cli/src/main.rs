// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! ductile - minimal operator CLI.
//!
//! Not the product's HTTP/webhook/TUI front end (out of scope here) — a
//! small set of commands for local operation: start the engine loop in
//! the foreground, enqueue a one-off job, and inspect jobs/plugins/
//! pipelines by opening the on-disk store directly. Because there is no
//! IPC layer, a command that opens the store will fail to acquire the
//! instance lock while `ductiled` is already running against the same
//! state directory — this tool is for offline inspection and local
//! development, not for talking to a live daemon.

mod env;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use ductile_core::EngineConfig;
use ductile_daemon::lifecycle;
use ductile_engine::{EngineFacade, EnqueueRequest, JobFilter};

#[derive(Parser)]
#[command(name = "ductile", version, about = "Ductile integration gateway CLI")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the engine loop in the foreground until interrupted.
    Start,
    /// Enqueue a one-off job directly, bypassing pipeline routing.
    Enqueue {
        plugin: String,
        command: String,
        #[arg(long, default_value = "{}")]
        payload: String,
        #[arg(long)]
        dedupe_key: Option<String>,
    },
    /// List jobs, optionally filtered by plugin/command/status.
    Jobs {
        #[arg(long)]
        plugin: Option<String>,
        #[arg(long)]
        status: Option<String>,
    },
    /// Show one job by id.
    Job { id: String },
    /// List discovered plugins.
    Plugins,
    /// List compiled pipelines.
    Pipelines,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config()?;

    match cli.command {
        Command::Start => run_start(config).await,
        Command::Enqueue {
            plugin,
            command,
            payload,
            dedupe_key,
        } => run_enqueue(config, plugin, command, payload, dedupe_key).await,
        Command::Jobs { plugin, status } => run_jobs(config, plugin, status).await,
        Command::Job { id } => run_job(config, id).await,
        Command::Plugins => run_plugins(config).await,
        Command::Pipelines => run_pipelines(config).await,
    }
}

fn load_config() -> Result<EngineConfig> {
    let path = env::config_path();
    match std::fs::read_to_string(&path) {
        Ok(raw) => EngineConfig::from_toml_str(&raw).with_context(|| format!("parsing {}", path.display())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(EngineConfig::default()),
        Err(e) => Err(e.into()),
    }
}

async fn run_start(config: EngineConfig) -> Result<()> {
    let result = lifecycle::startup(config).context("starting engine")?;
    println!("engine started, pid {}", std::process::id());

    let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;
    let mut sigint = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::interrupt())?;

    loop {
        tokio::select! {
            outcome = result.engine.dispatch_and_route_once() => {
                if !outcome? {
                    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
                }
            }
            _ = sigterm.recv() => break,
            _ = sigint.recv() => break,
        }
    }

    result.engine.checkpoint().context("final checkpoint")?;
    println!("engine stopped");
    Ok(())
}

async fn run_enqueue(
    config: EngineConfig,
    plugin: String,
    command: String,
    payload: String,
    dedupe_key: Option<String>,
) -> Result<()> {
    let payload: serde_json::Value = serde_json::from_str(&payload).context("parsing --payload as JSON")?;
    let result = lifecycle::startup(config).context("opening engine")?;
    let id = result
        .engine
        .enqueue(EnqueueRequest {
            plugin,
            command,
            payload,
            dedupe_key,
            max_attempts: None,
            submitted_by: "cli".to_string(),
        })
        .await?;
    println!("{}", id.as_str());
    Ok(())
}

async fn run_jobs(config: EngineConfig, plugin: Option<String>, status: Option<String>) -> Result<()> {
    let result = lifecycle::startup(config).context("opening engine")?;
    let status = status.map(|s| parse_status(&s)).transpose()?;
    let jobs = result
        .engine
        .list_jobs(JobFilter {
            plugin,
            command: None,
            status,
        })
        .await?;
    for job in jobs {
        println!("{}\t{}\t{:?}\t{}", job.id.as_str(), job.plugin, job.status, job.command);
    }
    Ok(())
}

async fn run_job(config: EngineConfig, id: String) -> Result<()> {
    let result = lifecycle::startup(config).context("opening engine")?;
    let job_id = ductile_core::JobId::new(id);
    match result.engine.get_job(&job_id).await? {
        Some(job) => println!("{}", serde_json::to_string_pretty(&job)?),
        None => anyhow::bail!("no such job: {}", job_id.as_str()),
    }
    Ok(())
}

async fn run_plugins(config: EngineConfig) -> Result<()> {
    let registry = ductile_registry::Registry::discover(&config.plugin_roots)?;
    for name in registry.names() {
        println!("{name}");
    }
    Ok(())
}

async fn run_pipelines(config: EngineConfig) -> Result<()> {
    if !config.pipelines_dir.exists() {
        return Ok(());
    }
    let pipelines = ductile_pipeline::compile_dir(&config.pipelines_dir)?;
    for pipeline in pipelines {
        println!("{}\t{:?}\t{}", pipeline.name, pipeline.execution_mode, pipeline.steps.len());
    }
    Ok(())
}

fn parse_status(raw: &str) -> Result<ductile_core::JobStatus> {
    use ductile_core::JobStatus::*;
    Ok(match raw.to_ascii_lowercase().as_str() {
        "queued" => Queued,
        "running" => Running,
        "succeeded" => Succeeded,
        "failed" => Failed,
        "timed_out" | "timedout" => TimedOut,
        "dead" => Dead,
        other => anyhow::bail!("unknown job status: {other}"),
    })
}

#[cfg(test)]
#[path = "main_tests.rs"]
mod tests;

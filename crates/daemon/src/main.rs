// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Ductile Daemon (ductiled)
//!
//! Background process that owns the event loop and dispatches work.
//!
//! Architecture:
//! - Dispatch loop: repeatedly calls one dispatch-and-route cycle,
//!   sleeping briefly when the queue is empty.
//! - Tick loop: runs the scheduler (poll timers, circuit breakers) and the
//!   retention pruner on a fixed cadence.
//! - Checkpoint loop: periodically snapshots state and truncates the WAL.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod env;
mod lifecycle;

use std::time::Duration;

use ductile_core::EngineConfig;
use lifecycle::{LifecycleError, StartupResult};
use tokio::signal::unix::{signal, SignalKind};
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    if let Some(arg) = std::env::args().nth(1) {
        match arg.as_str() {
            "--version" | "-V" | "-v" => {
                println!("ductiled {}", env!("CARGO_PKG_VERSION"));
                return Ok(());
            }
            "--help" | "-h" | "help" => {
                println!("ductiled {}", env!("CARGO_PKG_VERSION"));
                println!("Ductile Daemon - background process that owns the event loop and dispatches work");
                println!();
                println!("USAGE:");
                println!("    ductiled");
                println!();
                println!("Configuration is read from the path in DUCTILE_CONFIG, or ./ductile.toml");
                println!("if unset. Missing fields fall back to built-in defaults.");
                println!();
                println!("OPTIONS:");
                println!("    -h, --help       Print help information");
                println!("    -v, --version    Print version information");
                return Ok(());
            }
            _ => {
                eprintln!("error: unexpected argument '{arg}'");
                eprintln!("Usage: ductiled [--help | --version]");
                std::process::exit(1);
            }
        }
    }

    let config = load_config()?;
    let log_guard = setup_logging(&config)?;

    info!("starting ductile daemon");

    let StartupResult { engine, lock, config } = match lifecycle::startup(config) {
        Ok(r) => r,
        Err(LifecycleError::Lock(e)) => {
            eprintln!("ductiled is already running: {e}");
            std::process::exit(1);
        }
        Err(e) => {
            error!("failed to start daemon: {}", e);
            drop(log_guard);
            return Err(e.into());
        }
    };

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    info!("daemon ready");
    println!("READY");

    let dispatch_engine = engine.clone();
    let dispatch_idle = env::dispatch_idle_ms().unwrap_or(Duration::from_millis(50));
    let dispatch_task = tokio::spawn(async move {
        loop {
            match dispatch_engine.dispatch_and_route_once().await {
                Ok(true) => continue,
                Ok(false) => tokio::time::sleep(dispatch_idle).await,
                Err(e) => {
                    error!("dispatch cycle failed: {}", e);
                    tokio::time::sleep(dispatch_idle).await;
                }
            }
        }
    });

    let tick_engine = engine.clone();
    let tick_interval = config.scheduler_tick;
    let tick_task = tokio::spawn(async move {
        let mut interval = tokio::time::interval(tick_interval);
        loop {
            interval.tick().await;
            if let Err(e) = tick_engine.tick() {
                error!("scheduler/pruner tick failed: {}", e);
            }
        }
    });

    let checkpoint_engine = engine.clone();
    let checkpoint_task = tokio::spawn(async move {
        let mut interval = tokio::time::interval(CHECKPOINT_INTERVAL);
        loop {
            interval.tick().await;
            if let Err(e) = checkpoint_engine.checkpoint() {
                tracing::warn!("periodic checkpoint failed: {}", e);
            }
        }
    });

    tokio::select! {
        _ = sigterm.recv() => info!("received SIGTERM, shutting down"),
        _ = sigint.recv() => info!("received SIGINT, shutting down"),
    }

    dispatch_task.abort();
    tick_task.abort();
    checkpoint_task.abort();

    if let Err(e) = engine.checkpoint() {
        error!("final checkpoint failed: {}", e);
    }
    drop(lock);
    info!("daemon stopped");
    Ok(())
}

/// Checkpoint interval.
const CHECKPOINT_INTERVAL: Duration = Duration::from_secs(60);

fn load_config() -> Result<EngineConfig, LifecycleError> {
    let path = env::config_path();
    match std::fs::read_to_string(&path) {
        Ok(raw) => EngineConfig::from_toml_str(&raw)
            .map_err(|e| LifecycleError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e))),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(EngineConfig::default()),
        Err(e) => Err(e.into()),
    }
}

fn setup_logging(config: &EngineConfig) -> Result<tracing_appender::non_blocking::WorkerGuard, LifecycleError> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    std::fs::create_dir_all(&config.state_dir)?;
    let file_appender = tracing_appender::rolling::never(&config.state_dir, "ductiled.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(non_blocking))
        .init();

    Ok(guard)
}

#[cfg(test)]
#[path = "main_tests.rs"]
mod tests;

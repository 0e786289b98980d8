//! permits-agent: conditional permit execution.
//!
//! Loads an agent config, wires the ledger client, evaluator and leases, and
//! either performs one run or serves an HTTP trigger for runs.
//!
//! Usage:
//!   permits-agent run --config agent.toml
//!   permits-agent serve --config agent.toml --bind 0.0.0.0:8080
//!   permits-agent check-config --config agent.toml

mod config;
mod server;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::warn;
use tracing_subscriber::EnvFilter;

use permits_contracts::error::{PermitError, PermitResult};

use crate::config::AgentConfig;
use crate::server::AppState;

// ── CLI definition ────────────────────────────────────────────────────────────

/// Evaluate delegated permits and execute those whose condition holds.
#[derive(Parser)]
#[command(
    name = "permits-agent",
    about = "Conditional permit execution agent",
    long_about = "Fetches the permits delegated to this agent, evaluates each condition with the\n\
                  configured evaluator, and submits the permitted action when it holds."
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Perform one run and print the report as JSON.
    Run {
        #[arg(long, short)]
        config: PathBuf,
    },
    /// Serve `POST /run` as the run trigger.
    Serve {
        #[arg(long, short)]
        config: PathBuf,
        /// Overrides `[server] bind`.
        #[arg(long)]
        bind: Option<String>,
    },
    /// Validate the config and the evaluator's API keys, then exit.
    CheckConfig {
        #[arg(long, short)]
        config: PathBuf,
    },
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() {
    // RUST_LOG=debug shows per-stage evaluator output.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Command::Run { config } => run_once(&config).await,
        Command::Serve { config, bind } => serve(&config, bind).await,
        Command::CheckConfig { config } => check_config(&config),
    };

    if let Err(e) = result {
        eprintln!("permits-agent: {}", e);
        std::process::exit(1);
    }
}

// ── Commands ──────────────────────────────────────────────────────────────────

async fn run_once(path: &Path) -> PermitResult<()> {
    let orchestrator = AgentConfig::from_file(path)?.build_orchestrator()?;
    let report = orchestrator.run().await?;

    let json = serde_json::to_string_pretty(&report).map_err(|e| PermitError::ConfigError {
        reason: format!("failed to render run report: {e}"),
    })?;
    println!("{json}");
    eprintln!(
        "run {}: {} executed, {} failed, {} skipped",
        report.run_id.0,
        report.executed(),
        report.failed(),
        report.skipped()
    );
    Ok(())
}

async fn serve(path: &Path, bind: Option<String>) -> PermitResult<()> {
    let config = AgentConfig::from_file(path)?;
    let orchestrator = config.build_orchestrator()?;
    let addr = bind.unwrap_or_else(|| config.server.bind.clone());

    server::serve(
        AppState {
            orchestrator: Arc::new(orchestrator),
        },
        &addr,
    )
    .await
}

fn check_config(path: &Path) -> PermitResult<()> {
    let config = AgentConfig::from_file(path)?;
    let orchestrator = config.build_orchestrator()?;

    if !config.credential_present() {
        warn!(
            credential_env = %config.agent.credential_env,
            "agent credential is not set; runs will fail until it is"
        );
    }

    println!("config OK");
    println!("  agent      {}", config.agent.address);
    println!("  ledger     {} (contract {})", config.ledger.endpoint, config.ledger.contract);
    println!("  evaluator  {}", orchestrator.evaluator_name());
    if config.lease.enabled {
        println!("  leases     on, ttl {}s", config.lease.ttl_secs);
    } else {
        println!("  leases     off");
    }
    Ok(())
}

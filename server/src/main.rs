mod config;
mod directory;
mod http;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use platform_authz::{Authz, DecisionLog, LocalEvaluator, provision};
use platform_obs::{TelemetryConfig, init_telemetry};
use platform_policy::{PolicyClient, RemotePolicy};
use tracing::info;

use crate::{
    config::AppConfig,
    directory::UserDirectory,
    http::{AppState, ServeConfig},
};

#[derive(Parser, Debug)]
#[command(name = "medsecure-server", version, about = "MedSecure authorization service")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP server.
    Serve(ServeCommand),
    /// Provision the policy engine schema and exit.
    Provision,
}

#[derive(Args, Debug)]
struct ServeCommand {
    #[arg(long, default_value = "0.0.0.0")]
    host: std::net::IpAddr,
    #[arg(long, default_value_t = 8080)]
    port: u16,
}

impl From<ServeCommand> for ServeConfig {
    fn from(value: ServeCommand) -> Self {
        ServeConfig::new(value.host, value.port)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_telemetry(TelemetryConfig::default())?;
    let cli = Cli::parse();
    let config = Arc::new(AppConfig::load()?);
    match cli.command {
        Command::Serve(cmd) => run_server(cmd, config).await,
        Command::Provision => run_provision(config).await,
    }
}

fn build_authz(config: &AppConfig) -> Result<Arc<Authz<PolicyClient>>> {
    let client = PolicyClient::new(config.policy_settings())
        .context("failed to construct policy client")?;
    Ok(Arc::new(Authz::new(
        client,
        LocalEvaluator::hospital_defaults(),
        Arc::new(DecisionLog::new(config.audit_capacity)),
    )))
}

async fn run_server(cmd: ServeCommand, config: Arc<AppConfig>) -> Result<()> {
    let authz = build_authz(&config)?;

    // The one failure allowed to abort startup: the engine answered but
    // rejected the bootstrap. An unreachable engine falls back to local
    // evaluation inside initialize().
    let mode = authz
        .initialize()
        .await
        .context("policy schema bootstrap failed")?;
    info!(?mode, "authorization bootstrap complete");

    let state = AppState {
        authz,
        directory: Arc::new(UserDirectory::with_sample_users(&config.default_tenant)),
        cookie_key: config.cookie_key.clone(),
        config: config.clone(),
    };
    http::serve(cmd.into(), state).await
}

async fn run_provision(config: Arc<AppConfig>) -> Result<()> {
    let client = PolicyClient::new(config.policy_settings())
        .context("failed to construct policy client")?;
    let local = LocalEvaluator::hospital_defaults();
    let schema = provision::build_schema(local.table(), local.rules());
    client
        .provision_schema(&schema)
        .await
        .context("policy schema provisioning failed")?;
    info!("policy engine schema provisioned");
    Ok(())
}

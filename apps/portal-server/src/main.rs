use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use mimalloc::MiMalloc;
use runtime::{AppConfig, CliArgs};
use session_gate::config::SessionGateConfig;
use session_gate::SessionGate;

use portal_server::web;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

/// Config section the session gate reads from `modules`.
const SESSION_GATE_MODULE: &str = "session_gate";

/// Portal Server - sign-in, onboarding and dashboard gate
#[derive(Parser)]
#[command(name = "portal-server")]
#[command(about = "Portal Server - sign-in, onboarding and dashboard gate")]
#[command(version = "0.1.0")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port for HTTP server (overrides config)
    #[arg(short, long)]
    port: Option<u16>,

    /// Print current configuration and exit
    #[arg(long)]
    print_config: bool,

    /// Log verbosity level (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the server
    Run,
    /// Check configuration
    Check,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let args = CliArgs {
        config: cli.config.as_ref().map(|p| p.to_string_lossy().to_string()),
        port: cli.port,
        print_config: cli.print_config,
        verbose: cli.verbose,
    };

    let mut config = AppConfig::load_or_default(cli.config.as_deref())?;
    config.apply_cli_overrides(&args);

    let logging_config = config.logging.as_ref().cloned().unwrap_or_default();
    runtime::logging::init_logging_from_config(&logging_config, &config.home_dir());
    tracing::info!("Portal Server starting");

    if cli.print_config {
        println!("{}", config.to_yaml()?);
        return Ok(());
    }

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run_server(config).await,
        Commands::Check => check_config(config),
    }
}

fn session_gate_config(config: &AppConfig) -> Result<SessionGateConfig> {
    config.module_config::<SessionGateConfig>(SESSION_GATE_MODULE)
}

async fn run_server(config: AppConfig) -> Result<()> {
    let gate_cfg = session_gate_config(&config)?;
    let gate = Arc::new(SessionGate::from_config(&gate_cfg, &config.home_dir())?);

    let listener_task = gate.start().await;

    let router = web::build_router(&gate, &config.server);
    let addr = (config.server.host.as_str(), config.server.port);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}:{}", addr.0, addr.1))?;
    tracing::info!("HTTP server bound on {}", listener.local_addr()?);

    let signals = Arc::clone(&gate);
    tokio::spawn(async move {
        if let Err(e) = runtime::shutdown::wait_for_shutdown().await {
            tracing::error!("shutdown signal handler failed: {e}");
        }
        signals.stop();
    });

    let shutdown = gate.shutdown_token();
    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            shutdown.cancelled().await;
            tracing::info!("HTTP server shutting down gracefully");
        })
        .await?;

    // Ends with the same token
    gate.stop();
    if let Err(e) = listener_task.await {
        tracing::warn!("auth event listener ended abnormally: {e}");
    }
    tracing::info!("Portal Server stopped");
    Ok(())
}

fn check_config(config: AppConfig) -> Result<()> {
    tracing::info!("Checking configuration...");

    let gate_cfg = session_gate_config(&config)?;
    gate_cfg
        .validate()
        .context("invalid session_gate configuration")?;

    let logging_config = config.logging.as_ref().cloned().unwrap_or_default();
    let mut files: Vec<_> =
        runtime::logging::log_file_map(&logging_config, &config.home_dir())
            .into_iter()
            .collect();
    files.sort();

    tracing::info!("Configuration is valid");
    println!("Configuration check passed");
    for (subsystem, path) in files {
        println!("log file [{subsystem}]: {}", path.display());
    }
    println!("Server config:");
    println!("{}", config.to_yaml()?);

    Ok(())
}

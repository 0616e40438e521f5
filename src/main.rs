//! kalshi-mcp: MCP server for the Kalshi prediction-market API
//!
//! Speaks newline-delimited JSON-RPC on stdin/stdout; all logging goes to
//! stderr.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info, Level};
use tracing_subscriber::EnvFilter;

use kalshi_mcp::config;
use kalshi_mcp::kalshi::KalshiClient;
use kalshi_mcp::mcp::{McpServer, ResourceRouter};
use kalshi_mcp::tools::{KalshiTools, ToolRegistry};

/// MCP server for the Kalshi prediction-market API.
///
/// Exposes Kalshi market data and portfolio operations as MCP tools and
/// `kalshi://` resources.
#[derive(Parser, Debug)]
#[command(name = "kalshi-mcp")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(value_name = "CONFIG_FILE")]
    config: Option<PathBuf>,

    /// Increase logging verbosity (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Decrease logging verbosity (only show errors)
    #[arg(short, long)]
    quiet: bool,
}

/// Determines the log level from CLI arguments.
#[allow(clippy::match_same_arms)] // Explicit "warn" arm for clarity
fn get_log_level(verbose: u8, quiet: bool, config_level: &str) -> Level {
    if quiet {
        return Level::ERROR;
    }

    match verbose {
        0 => match config_level.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "info" => Level::INFO,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::WARN,
        },
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    }
}

/// Initialises the tracing subscriber for logging.
fn init_tracing(level: Level) {
    let filter = EnvFilter::from_default_env().add_directive(level.into());

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Entry point for the kalshi-mcp server.
fn main() -> ExitCode {
    let args = Args::parse();

    // Display GPL license notice (required by GPLv3 Section 5d)
    eprintln!(
        "kalshi-mcp {}  Copyright (C) 2026  The Embedded Society",
        env!("CARGO_PKG_VERSION")
    );
    eprintln!("This program comes with ABSOLUTELY NO WARRANTY.");
    eprintln!("This is free software, licensed under GPL-3.0-or-later.");
    eprintln!("Source: {}", env!("CARGO_PKG_REPOSITORY"));
    eprintln!();

    let config_path = args.config.as_deref();
    let cfg = match config::load_config(config_path) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            if config_path.is_none() {
                if let Some(default_path) = config::default_config_path() {
                    eprintln!("\nConfig is read from: {}", default_path.display());
                }
            }
            return ExitCode::FAILURE;
        }
    };

    let log_level = get_log_level(args.verbose, args.quiet, &cfg.logging.level);
    init_tracing(log_level);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        base_url = %cfg.kalshi.base_url,
        "Starting kalshi-mcp server"
    );

    let client = match KalshiClient::from_config(&cfg) {
        Ok(client) => client,
        Err(e) => {
            error!(error = %e, "Failed to create Kalshi client");
            return ExitCode::FAILURE;
        }
    };
    info!(authenticated = client.has_credentials(), "Kalshi client ready");

    let tools: Arc<dyn ToolRegistry> = Arc::new(KalshiTools::new(client));
    let mut server = McpServer::new(Arc::clone(&tools));
    if cfg.resources.enabled {
        server = server.with_resources(ResourceRouter::new(tools));
    }

    info!(
        resources = cfg.resources.enabled,
        "MCP server ready, waiting for client connection..."
    );

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!(error = %e, "Failed to create Tokio runtime");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(server.run()) {
        Ok(()) => {
            info!("Server shut down gracefully");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "Server error");
            ExitCode::FAILURE
        }
    }
}

//! blender-mcp-bridge: MCP server bridging AI assistants to Blender
//!
//! Speaks MCP on stdin/stdout and forwards tool calls to the BlenderMCP
//! add-on's command socket.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info, Level};
use tracing_subscriber::EnvFilter;

use blender_mcp_bridge::blender::BlenderProxy;
use blender_mcp_bridge::config;
use blender_mcp_bridge::jobs::JobTracker;
use blender_mcp_bridge::mcp::{McpServer, StdioTransport};
use blender_mcp_bridge::tools::ToolDispatcher;

/// MCP server bridging AI assistants to Blender.
///
/// Exposes scene inspection, Python execution, viewport screenshots and
/// PolyHaven, Sketchfab, Hyper3D and Hunyuan3D asset workflows as MCP tools.
#[derive(Parser, Debug)]
#[command(name = "blender-mcp-bridge")]
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

    /// Blender add-on host (overrides config and BLENDER_HOST)
    #[arg(long)]
    host: Option<String>,

    /// Blender add-on port (overrides config and BLENDER_PORT)
    #[arg(long, value_parser = clap::value_parser!(u16).range(1..))]
    port: Option<u16>,
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

/// Initialises the tracing subscriber. Logs go to stderr; stdout carries
/// protocol messages only.
fn init_tracing(level: Level) {
    let filter = EnvFilter::from_default_env().add_directive(level.into());

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Entry point for the blender-mcp-bridge server.
fn main() -> ExitCode {
    let args = Args::parse();

    let config_path = args.config.as_deref();
    let mut cfg = match config::load_config(config_path) {
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

    if let Some(host) = args.host {
        cfg.blender.host = host;
    }
    if let Some(port) = args.port {
        cfg.blender.port = port;
    }
    if let Err(e) = cfg.validate() {
        eprintln!("Configuration error: {e}");
        return ExitCode::FAILURE;
    }

    let log_level = get_log_level(args.verbose, args.quiet, &cfg.logging.level);
    init_tracing(log_level);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "Starting blender-mcp-bridge server"
    );

    let proxy = BlenderProxy::from_config(&cfg.blender);
    info!(
        addr = proxy.addr(),
        timeout_secs = cfg.blender.timeout_secs,
        "Blender add-on endpoint configured"
    );

    let jobs = JobTracker::new(&cfg.jobs);
    let mut server = McpServer::new(ToolDispatcher::new(proxy, jobs));

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Failed to create Tokio runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    info!("MCP server ready, waiting for client messages...");

    let result = runtime.block_on(server.run(StdioTransport::new()));

    match result {
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

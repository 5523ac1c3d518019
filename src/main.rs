//! MCP Todo: session-multiplexed todo tool server with an interactive UI
//!
//! `serve` exposes four todo tools over the MCP streamable HTTP endpoint
//! `/mcp`, answering every successful call with a fresh HTML artifact.
//! `host` plays the embedding side: it opens a session, renders the artifact
//! to a file, and turns action messages (one JSON object per stdin line)
//! into tool calls, re-rendering after each.
//!
//! Usage:
//!   mcp-todo serve                                 # Default port 3000
//!   mcp-todo serve --port 8080 --encoding blob     # Base64 artifacts
//!   mcp-todo host --out todo.html < actions.jsonl  # Drive a running server

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use todo_bridge::{ActionBridge, FileRenderer, HostOrchestrator, McpClient};
use todo_protocol::{ArtifactEncoding, Tools};
use todo_server::{McpServer, broadcast_notifier};
use todo_services::{ArtifactBuilder, TodoService, TodoStore};
use todo_transport::{TransportConfig, TransportServer};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast;
use tracing::{error, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "mcp-todo", about = "MCP Todo Server with Interactive UI")]
struct Cli {
    /// Enable verbose logging
    #[arg(long, global = true)]
    verbose: bool,

    /// Write logs to a file (defaults to ~/.mcp-todo/logs/server.log if no path given)
    #[arg(long, global = true, default_missing_value = "DEFAULT", num_args = 0..=1)]
    log_file: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the MCP todo server
    Serve(ServeArgs),
    /// Connect to a server and drive it from action messages on stdin
    Host(HostArgs),
}

#[derive(Args, Debug)]
struct ServeArgs {
    /// Port to listen on (0 for OS-assigned)
    #[arg(long, default_value = "3000")]
    port: u16,

    /// Hostname to bind to
    #[arg(long, default_value = "127.0.0.1")]
    hostname: String,

    /// Disable CORS headers
    #[arg(long)]
    no_cors: bool,

    /// Artifact encoding: text or blob
    #[arg(long, default_value = "text")]
    encoding: ArtifactEncoding,

    /// Seconds between SSE keep-alive comments
    #[arg(long, default_value = "15")]
    keep_alive_secs: u64,
}

impl Default for ServeArgs {
    fn default() -> Self {
        Self {
            port: 3000,
            hostname: "127.0.0.1".into(),
            no_cors: false,
            encoding: ArtifactEncoding::Text,
            keep_alive_secs: 15,
        }
    }
}

#[derive(Args, Debug)]
struct HostArgs {
    /// MCP endpoint of a running server
    #[arg(long, default_value = "http://127.0.0.1:3000/mcp")]
    url: String,

    /// File the rendered artifact is written to
    #[arg(long, default_value = "todo.html")]
    out: PathBuf,
}

fn init_tracing(verbose: bool, log_file: Option<&str>) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    if let Some(log_file_arg) = log_file {
        // Resolve log file path
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".into());
        let log_path = if log_file_arg == "DEFAULT" {
            PathBuf::from(&home).join(".mcp-todo/logs/server.log")
        } else {
            PathBuf::from(log_file_arg)
        };

        if let Some(parent) = log_path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }

        let file = match std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)
        {
            Ok(file) => file,
            Err(e) => {
                eprintln!("Failed to open log file {}: {e}", log_path.display());
                std::process::exit(1);
            }
        };

        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::sync::Mutex::new(file))
            .with_ansi(false)
            .init();

        eprintln!("Logging to {}", log_path.display());
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .init();
    };
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.log_file.as_deref());

    match cli.command {
        Some(Command::Host(args)) => host(args).await,
        Some(Command::Serve(args)) => serve(args, cli.verbose).await,
        None => serve(ServeArgs::default(), cli.verbose).await,
    }
}

async fn serve(args: ServeArgs, verbose: bool) {
    println!();
    println!("  MCP Todo Server v{}", env!("CARGO_PKG_VERSION"));
    println!();

    // Broadcast channel for notifications to session event streams
    let (notification_tx, _) = broadcast::channel::<String>(1024);

    let store = Arc::new(TodoStore::new());
    let todo_service = TodoService::new(store, ArtifactBuilder::new(args.encoding));
    todo_service.set_notify_sender(broadcast_notifier(notification_tx.clone()));

    let mut server = McpServer::new(env!("CARGO_PKG_VERSION"));
    server.register_service(todo_service);

    if let Err(e) = server.initialize().await {
        error!("Failed to initialize server: {e}");
        std::process::exit(1);
    }

    let config = TransportConfig {
        port: args.port,
        hostname: args.hostname.clone(),
        enable_cors: !args.no_cors,
        keep_alive: Duration::from_secs(args.keep_alive_secs),
        verbose_logging: verbose,
    };

    let mut transport =
        match TransportServer::start_with_sender(config, Arc::new(server), notification_tx).await {
            Ok(t) => t,
            Err(e) => {
                error!("Failed to start transport: {e}");
                std::process::exit(1);
            }
        };

    println!("────────────────────────────────────────────────────────────────");
    println!();
    println!("  Server running!");
    println!();
    println!("  MCP endpoint:");
    println!("    http://{}:{}/mcp", args.hostname, transport.port());
    println!();
    println!("  Available tools:");
    for tool in Tools::ALL {
        println!("    - {tool}");
    }
    println!();
    println!("  Artifact encoding: {:?}", args.encoding);
    println!();
    println!("────────────────────────────────────────────────────────────────");
    println!();
    println!("  Press Ctrl+C to stop.");
    println!();

    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl+C: {e}");
    }

    println!();
    println!("  Shutting down...");
    transport.stop().await;
    println!("  Server stopped.");
}

async fn host(args: HostArgs) {
    let (sender, listener) = ActionBridge::channel(64);
    let renderer = FileRenderer::new(&args.out);
    let mut orchestrator = HostOrchestrator::new(McpClient::new(&args.url), listener, renderer);

    if let Err(e) = orchestrator.start().await {
        error!("Failed to connect to {}: {e}", args.url);
        std::process::exit(1);
    }
    eprintln!("Rendering to {}", args.out.display());

    // Each stdin line is one inbound bridge value; the sender drops at EOF,
    // which ends the orchestrator loop.
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) if line.trim().is_empty() => continue,
                Ok(Some(line)) => match serde_json::from_str(&line) {
                    Ok(value) => {
                        if sender.post(value).await.is_err() {
                            return;
                        }
                    }
                    Err(e) => warn!("Ignoring malformed action line: {e}"),
                },
                Ok(None) => return,
                Err(e) => {
                    warn!("Failed to read stdin: {e}");
                    return;
                }
            }
        }
    });

    if let Err(e) = orchestrator.run().await {
        error!("Host stopped: {e}");
        std::process::exit(1);
    }
}

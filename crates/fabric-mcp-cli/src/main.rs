// crates/fabric-mcp-cli/src/main.rs
// ============================================================================
// Module: Fabric MCP CLI Entry Point
// Description: Command dispatcher for the Fabric MCP server.
// Purpose: Start the server and inspect the tool catalog from the shell.
// Dependencies: clap, fabric-mcp, serde_json, tokio
// ============================================================================

//! ## Overview
//! The CLI starts the MCP server (`serve`) and prints the tool catalog
//! (`tools`). Fatal configuration problems exit with status 1 and a message
//! on stderr; the server never starts with incomplete credentials.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use clap::Subcommand;
use clap::ValueEnum;
use fabric_mcp::FabricMcpConfig;
use fabric_mcp::McpServer;
use fabric_mcp::config::ServerTransport;
use fabric_mcp::contract::ToolDefinition;
use fabric_mcp::contract::tool_definitions;
use thiserror::Error;

// ============================================================================
// SECTION: CLI Types
// ============================================================================

/// Top-level CLI definition.
#[derive(Parser, Debug)]
#[command(name = "fabric-mcp", version, about = "MCP server for Power BI and Microsoft Fabric")]
struct Cli {
    /// Selected subcommand.
    #[command(subcommand)]
    command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the MCP server.
    Serve(ServeCommand),
    /// Print the tool catalog.
    Tools(ToolsCommand),
}

/// Arguments for the `serve` command.
#[derive(clap::Args, Debug)]
struct ServeCommand {
    /// Path to the configuration file.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Transport override.
    #[arg(long, value_enum)]
    transport: Option<TransportArg>,
    /// Bind address override for the http transport.
    #[arg(long)]
    bind: Option<String>,
}

/// Arguments for the `tools` command.
#[derive(clap::Args, Debug)]
struct ToolsCommand {
    /// Output format.
    #[arg(long, value_enum, default_value_t = ToolsFormat::Json)]
    format: ToolsFormat,
}

/// Transport selection on the command line.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum TransportArg {
    /// Framed JSON-RPC over stdin/stdout.
    Stdio,
    /// JSON-RPC over HTTP POST.
    Http,
}

/// Tool catalog output formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ToolsFormat {
    /// Pretty-printed JSON definitions.
    Json,
    /// Markdown summary table.
    Markdown,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// CLI failure carrying a user-facing message.
#[derive(Debug, Error)]
#[error("{message}")]
struct CliError {
    /// User-facing message.
    message: String,
}

impl CliError {
    /// Creates a CLI error from a message.
    fn new(message: String) -> Self {
        Self {
            message,
        }
    }
}

/// CLI result alias.
type CliResult<T> = Result<T, CliError>;

// ============================================================================
// SECTION: Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(err) => emit_error(&err.to_string()),
    }
}

/// Executes the CLI command dispatcher.
async fn run() -> CliResult<ExitCode> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Serve(command) => command_serve(command).await,
        Commands::Tools(command) => command_tools(&command),
    }
}

// ============================================================================
// SECTION: Commands
// ============================================================================

/// Loads configuration, applies overrides, and runs the server.
async fn command_serve(command: ServeCommand) -> CliResult<ExitCode> {
    let mut config = FabricMcpConfig::load(command.config.as_deref())
        .map_err(|err| CliError::new(format!("failed to load config: {err}")))?;
    if let Some(transport) = command.transport {
        config.server.transport = match transport {
            TransportArg::Stdio => ServerTransport::Stdio,
            TransportArg::Http => ServerTransport::Http,
        };
    }
    if let Some(bind) = command.bind {
        config.server.bind = Some(bind);
    }
    let server = tokio::task::spawn_blocking(move || McpServer::from_config(config))
        .await
        .map_err(|err| CliError::new(format!("server init failed: init join failed: {err}")))?
        .map_err(|err| CliError::new(format!("server init failed: {err}")))?;
    server
        .serve()
        .await
        .map_err(|err| CliError::new(format!("server failed: {err}")))?;
    Ok(ExitCode::SUCCESS)
}

/// Prints the tool catalog in the requested format.
fn command_tools(command: &ToolsCommand) -> CliResult<ExitCode> {
    let definitions = tool_definitions();
    let output = match command.format {
        ToolsFormat::Json => serde_json::to_string_pretty(&definitions)
            .map_err(|err| CliError::new(format!("serialization failed: {err}")))?,
        ToolsFormat::Markdown => render_markdown(&definitions),
    };
    write_stdout_line(&output)
        .map_err(|err| CliError::new(format!("stdout write failed: {err}")))?;
    Ok(ExitCode::SUCCESS)
}

/// Renders the tool catalog as a markdown summary table.
fn render_markdown(definitions: &[ToolDefinition]) -> String {
    let mut out = String::from("# Fabric MCP Tools\n\n");
    out.push_str("| Tool | Description |\n");
    out.push_str("| --- | --- |\n");
    for definition in definitions {
        out.push_str("| ");
        out.push_str(&definition.name);
        out.push_str(" | ");
        out.push_str(&definition.description);
        out.push_str(" |\n");
    }
    out
}

// ============================================================================
// SECTION: Output Helpers
// ============================================================================

/// Writes a line to stdout without the print macros.
fn write_stdout_line(message: &str) -> std::io::Result<()> {
    let mut stdout = std::io::stdout();
    writeln!(stdout, "{message}")?;
    stdout.flush()
}

/// Writes a line to stderr without the print macros.
fn write_stderr_line(message: &str) -> std::io::Result<()> {
    let mut stderr = std::io::stderr();
    writeln!(stderr, "{message}")?;
    stderr.flush()
}

/// Emits an error message and returns a failing exit code.
fn emit_error(message: &str) -> ExitCode {
    let _ = write_stderr_line(message);
    ExitCode::FAILURE
}

// ============================================================================
// SECTION: Tests
// ============================================================================

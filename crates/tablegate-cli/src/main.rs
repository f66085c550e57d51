// crates/tablegate-cli/src/main.rs
// ============================================================================
// Module: Tablegate CLI Entry Point
// Description: Command dispatcher for the gateway server and config tooling.
// Purpose: Run the MCP gateway and inspect its configuration offline.
// Dependencies: clap, tablegate-config, tablegate-core, tablegate-mcp, tokio.
// ============================================================================

//! ## Overview
//! `tablegate serve` loads the configuration, builds the REST provider and
//! serves both MCP transports until interrupted. The `config` and `tools`
//! subcommands work offline and never contact the upstream service.
//!
//! Exit codes: `0` on success, `1` on runtime failure, `2` on usage or
//! configuration errors.

// ============================================================================
// SECTION: Modules
// ============================================================================


// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Args;
use clap::Parser;
use clap::Subcommand;
use tablegate_config::ConfigError;
use tablegate_config::ProviderConfig;
use tablegate_config::TablegateConfig;
use tablegate_config::config_toml_example;
use tablegate_core::Identity;
use tablegate_core::OperationRegistry;
use tablegate_mcp::GatewayServer;
use tablegate_mcp::ServerError;
use tablegate_provider::RestProvider;
use tablegate_provider::RestProviderConfig;
use thiserror::Error;

// ============================================================================
// SECTION: CLI Types
// ============================================================================

/// Top-level command line.
#[derive(Parser, Debug)]
#[command(name = "tablegate", version, about = "MCP gateway for tabular record stores")]
struct Cli {
    /// Selected subcommand.
    #[command(subcommand)]
    command: Commands,
}

/// Top-level subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Serve the MCP gateway until interrupted.
    Serve(ServeCommand),
    /// Configuration utilities.
    Config {
        /// Selected config subcommand.
        #[command(subcommand)]
        command: ConfigCommand,
    },
    /// Operation catalog utilities.
    Tools {
        /// Selected tools subcommand.
        #[command(subcommand)]
        command: ToolsCommand,
    },
}

/// Arguments for `serve`.
#[derive(Args, Debug)]
struct ServeCommand {
    /// Path to `tablegate.toml`.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

/// Config subcommands.
#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Load and validate a configuration file.
    Validate(ConfigValidateCommand),
    /// Print a canonical example configuration.
    Example,
}

/// Arguments for `config validate`.
#[derive(Args, Debug)]
struct ConfigValidateCommand {
    /// Path to `tablegate.toml`.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

/// Tools subcommands.
#[derive(Subcommand, Debug)]
enum ToolsCommand {
    /// List the operations an identity would be granted.
    List(ToolsListCommand),
}

/// Arguments for `tools list`.
#[derive(Args, Debug)]
struct ToolsListCommand {
    /// Identity identifier to evaluate.
    #[arg(long, value_name = "ID")]
    identity: String,
    /// Path to `tablegate.toml`.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// CLI failures, split by exit code.
#[derive(Debug, Error)]
enum CliError {
    /// Bad arguments or configuration.
    #[error("{0}")]
    Usage(String),
    /// Failure while running a valid command.
    #[error("{0}")]
    Runtime(String),
}

impl CliError {
    /// Returns the process exit code for this error.
    const fn exit_code(&self) -> u8 {
        match self {
            Self::Usage(_) => 2,
            Self::Runtime(_) => 1,
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(error: ConfigError) -> Self {
        Self::Usage(error.to_string())
    }
}

impl From<ServerError> for CliError {
    fn from(error: ServerError) -> Self {
        match error {
            ServerError::Config(_) => Self::Usage(error.to_string()),
            ServerError::Init(_) | ServerError::Transport(_) => Self::Runtime(error.to_string()),
        }
    }
}

/// CLI result alias.
type CliResult<T> = Result<T, CliError>;

// ============================================================================
// SECTION: Entry Point
// ============================================================================

/// Parses arguments and runs the selected command.
#[tokio::main(flavor = "multi_thread")]
async fn main() -> ExitCode {
    match run(Cli::parse()).await {
        Ok(code) => code,
        Err(err) => emit_error(&err),
    }
}

/// Dispatches a parsed command line.
async fn run(cli: Cli) -> CliResult<ExitCode> {
    match cli.command {
        Commands::Serve(command) => command_serve(command).await,
        Commands::Config {
            command,
        } => match command {
            ConfigCommand::Validate(command) => command_config_validate(&command),
            ConfigCommand::Example => command_config_example(),
        },
        Commands::Tools {
            command,
        } => match command {
            ToolsCommand::List(command) => command_tools_list(&command),
        },
    }
}

// ============================================================================
// SECTION: Commands
// ============================================================================

/// Serves the gateway until ctrl-c.
async fn command_serve(command: ServeCommand) -> CliResult<ExitCode> {
    let config = TablegateConfig::load(command.config.as_deref())?;
    let api_key = config.provider.resolve_api_key()?;
    let provider = RestProvider::new(rest_provider_config(&config.provider, api_key))
        .map_err(|err| CliError::Usage(format!("provider config error: {err}")))?;
    let server = GatewayServer::from_config(&config, Arc::new(provider))?;
    write_stderr_line(&format!("tablegate: listening on {}", server.settings().bind))
        .map_err(|err| CliError::Runtime(output_error("stderr", &err)))?;
    server.serve().await?;
    Ok(ExitCode::SUCCESS)
}

/// Loads and validates a configuration file.
fn command_config_validate(command: &ConfigValidateCommand) -> CliResult<ExitCode> {
    TablegateConfig::load(command.config.as_deref())?;
    write_stdout_line("config ok").map_err(|err| CliError::Runtime(output_error("stdout", &err)))?;
    Ok(ExitCode::SUCCESS)
}

/// Prints the canonical example configuration.
fn command_config_example() -> CliResult<ExitCode> {
    let example = config_toml_example();
    write_stdout_line(example.trim_end())
        .map_err(|err| CliError::Runtime(output_error("stdout", &err)))?;
    Ok(ExitCode::SUCCESS)
}

/// Prints the operations an identity would be granted.
fn command_tools_list(command: &ToolsListCommand) -> CliResult<ExitCode> {
    let identity_id = command.identity.trim();
    if identity_id.is_empty() {
        return Err(CliError::Usage("--identity must not be empty".to_string()));
    }
    let config = TablegateConfig::load(command.config.as_deref())?;
    let lines = tool_listing(identity_id, &config);
    for line in &lines {
        write_stdout_line(line).map_err(|err| CliError::Runtime(output_error("stdout", &err)))?;
    }
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Maps provider settings and the resolved credential to the REST client config.
fn rest_provider_config(provider: &ProviderConfig, api_key: String) -> RestProviderConfig {
    RestProviderConfig {
        api_base_url: provider.api_base_url.clone(),
        meta_base_url: provider.meta_base_url.clone(),
        api_key,
        timeout_ms: provider.timeout_ms,
        max_response_bytes: provider.max_response_bytes,
        max_error_excerpt_chars: provider.max_error_excerpt_chars,
        allow_http: provider.allow_http,
        user_agent: provider.user_agent.clone(),
    }
}

/// Renders `name<TAB>classification` lines in catalog order.
fn tool_listing(identity_id: &str, config: &TablegateConfig) -> Vec<String> {
    let identity = Identity::new(identity_id, identity_id);
    let registry = OperationRegistry::for_identity(&identity, &config.access.allow_list());
    registry
        .descriptors()
        .iter()
        .map(|descriptor| {
            format!("{}\t{}", descriptor.name.as_str(), descriptor.classification.as_str())
        })
        .collect()
}

/// Writes a line to stdout.
fn write_stdout_line(message: &str) -> std::io::Result<()> {
    let mut stdout = std::io::stdout().lock();
    writeln!(&mut stdout, "{message}")
}

/// Writes a line to stderr.
fn write_stderr_line(message: &str) -> std::io::Result<()> {
    let mut stderr = std::io::stderr().lock();
    writeln!(&mut stderr, "{message}")
}

/// Formats an output stream failure.
fn output_error(stream: &str, error: &std::io::Error) -> String {
    format!("failed to write to {stream}: {error}")
}

/// Emits an error to stderr and returns its exit code.
fn emit_error(error: &CliError) -> ExitCode {
    let _ = write_stderr_line(&format!("tablegate: {error}"));
    ExitCode::from(error.exit_code())
}

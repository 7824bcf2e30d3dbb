// crates/expense-cli/src/main.rs
// ============================================================================
// Module: Expense Tracker CLI Entry Point
// Description: Command dispatcher for serving and configuring the tracker.
// Purpose: Run the HTTP server, validate or print config, initialize stores.
// Dependencies: clap, expense-config, expense-server, expense-store-sqlite,
//               thiserror, time, tokio.
// ============================================================================

//! ## Overview
//! The `expense-tracker` binary loads `expense-tracker.toml` (or the path in
//! `--config` or `EXPENSE_TRACKER_CONFIG`), then serves the HTTP API,
//! validates configuration, prints an example configuration, or prepares a
//! `SQLite` store. All user-facing strings are routed through the message
//! catalog.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::ArgAction;
use clap::Args;
use clap::CommandFactory;
use clap::Parser;
use clap::Subcommand;
use expense_cli::t;
use expense_config::ExpenseTrackerConfig;
use expense_config::StoreType;
use expense_config::config_toml_example;
use expense_server::ExpenseServer;
use expense_server::ServerError;
use expense_store_sqlite::SqliteExpenseStore;
use thiserror::Error;
use time::OffsetDateTime;

// ============================================================================
// SECTION: CLI Types
// ============================================================================

/// Top-level CLI definition.
#[derive(Parser, Debug)]
#[command(name = "expense-tracker", disable_help_subcommand = true, disable_version_flag = true)]
struct Cli {
    /// Print version information and exit.
    #[arg(long = "version", action = ArgAction::SetTrue, global = true)]
    show_version: bool,
    /// Selected subcommand to execute.
    #[command(subcommand)]
    command: Option<Commands>,
}

/// Supported CLI subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the expense tracker HTTP server.
    Serve(ConfigArgs),
    /// Configuration utilities.
    Config {
        /// Selected config subcommand.
        #[command(subcommand)]
        command: ConfigCommand,
    },
    /// Store utilities.
    Store {
        /// Selected store subcommand.
        #[command(subcommand)]
        command: StoreCommand,
    },
}

/// Shared `--config` argument.
#[derive(Args, Debug)]
struct ConfigArgs {
    /// Optional config file path (defaults to expense-tracker.toml or env override).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

/// Config subcommands.
#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Validate an expense tracker configuration file.
    Validate(ConfigArgs),
    /// Print an example configuration file.
    Example,
}

/// Store subcommands.
#[derive(Subcommand, Debug)]
enum StoreCommand {
    /// Create the `SQLite` schema and reference data.
    Init(StoreInitCommand),
}

/// Arguments for `store init`.
#[derive(Args, Debug)]
struct StoreInitCommand {
    /// Config selection.
    #[command(flatten)]
    config: ConfigArgs,
    /// Insert the demo expense claims when the store is empty.
    #[arg(long, action = ArgAction::SetTrue)]
    with_demo_data: bool,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// CLI error wrapper for catalog messages.
#[derive(Debug, Error)]
#[error("{message}")]
struct CliError {
    /// Human-readable error message.
    message: String,
}

impl CliError {
    /// Constructs a new [`CliError`] from a catalog message.
    const fn new(message: String) -> Self {
        Self {
            message,
        }
    }
}

/// CLI result alias for fallible operations.
type CliResult<T> = Result<T, CliError>;

// ============================================================================
// SECTION: Entry Point
// ============================================================================

/// CLI entry point returning an exit code.
#[tokio::main(flavor = "multi_thread")]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(err) => emit_error(&err.to_string()),
    }
}

/// Executes the CLI command dispatcher.
async fn run() -> CliResult<ExitCode> {
    let cli = Cli::parse();

    if cli.show_version {
        let version = env!("CARGO_PKG_VERSION");
        write_stdout_line(&t!("main.version", version = version))
            .map_err(|err| CliError::new(output_error("stdout", &err)))?;
        return Ok(ExitCode::SUCCESS);
    }

    let Some(command) = cli.command else {
        show_help()?;
        return Ok(ExitCode::SUCCESS);
    };

    match command {
        Commands::Serve(args) => command_serve(args).await,
        Commands::Config {
            command,
        } => command_config(command),
        Commands::Store {
            command,
        } => match command {
            StoreCommand::Init(command) => command_store_init(&command),
        },
    }
}

/// Prints top-level help.
fn show_help() -> CliResult<()> {
    let mut command = Cli::command();
    command.print_help().map_err(|err| CliError::new(output_error("stdout", &err)))?;
    write_stdout_line("").map_err(|err| CliError::new(output_error("stdout", &err)))?;
    Ok(())
}

// ============================================================================
// SECTION: Serve Command
// ============================================================================

/// Executes the `serve` command.
async fn command_serve(args: ConfigArgs) -> CliResult<ExitCode> {
    let config = load_config(&args)?;
    let bind = config.server.bind.clone();
    write_serve_banner(&config)?;

    let server = tokio::task::spawn_blocking(move || ExpenseServer::from_config(config))
        .await
        .map_err(|err| {
            CliError::new(t!("serve.init_failed", error = format!("init join failed: {err}")))
        })?
        .map_err(|err| CliError::new(t!("serve.init_failed", error = err)))?;
    write_stderr_line(&t!("serve.listening", bind = bind))
        .map_err(|err| CliError::new(output_error("stderr", &err)))?;
    server
        .serve()
        .await
        .map_err(|err: ServerError| CliError::new(t!("serve.failed", error = err)))?;

    Ok(ExitCode::SUCCESS)
}

/// Describes the selected store and chat mode on stderr.
fn write_serve_banner(config: &ExpenseTrackerConfig) -> CliResult<()> {
    let store_line = match (config.store.store_type, &config.store.path) {
        (StoreType::Sqlite, Some(path)) => t!("serve.store.sqlite", path = path.display()),
        _ => t!("serve.store.memory"),
    };
    let chat_line = if config.chat.is_configured() {
        t!("serve.chat.enabled", provider = config.chat.provider.as_str())
    } else {
        t!("serve.chat.demo")
    };
    write_stderr_line(&store_line).map_err(|err| CliError::new(output_error("stderr", &err)))?;
    write_stderr_line(&chat_line).map_err(|err| CliError::new(output_error("stderr", &err)))?;
    Ok(())
}

// ============================================================================
// SECTION: Config Commands
// ============================================================================

/// Dispatches config subcommands.
fn command_config(command: ConfigCommand) -> CliResult<ExitCode> {
    match command {
        ConfigCommand::Validate(args) => command_config_validate(&args),
        ConfigCommand::Example => command_config_example(),
    }
}

/// Executes the config validation command.
fn command_config_validate(args: &ConfigArgs) -> CliResult<ExitCode> {
    let _config = load_config(args)?;
    write_stdout_line(&t!("config.validate.ok"))
        .map_err(|err| CliError::new(output_error("stdout", &err)))?;
    Ok(ExitCode::SUCCESS)
}

/// Prints the example configuration.
fn command_config_example() -> CliResult<ExitCode> {
    let mut stdout = std::io::stdout();
    stdout
        .write_all(config_toml_example().as_bytes())
        .map_err(|err| CliError::new(output_error("stdout", &err)))?;
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// SECTION: Store Commands
// ============================================================================

/// Creates the `SQLite` schema, optionally inserting demo expenses.
fn command_store_init(command: &StoreInitCommand) -> CliResult<ExitCode> {
    let config = load_config(&command.config)?;
    let sqlite = config
        .store
        .sqlite_config()
        .ok_or_else(|| CliError::new(t!("store.init.not_sqlite")))?;
    let now = OffsetDateTime::now_utc();
    let store = SqliteExpenseStore::new(&sqlite, now)
        .map_err(|err| CliError::new(t!("store.init.failed", error = err)))?;
    write_stdout_line(&t!("store.init.ok", path = sqlite.path.display()))
        .map_err(|err| CliError::new(output_error("stdout", &err)))?;
    if command.with_demo_data {
        let inserted = store
            .seed_demo_expenses(now)
            .map_err(|err| CliError::new(t!("store.init.failed", error = err)))?;
        let message = if inserted == 0 {
            t!("store.init.seed_skipped")
        } else {
            t!("store.init.seeded", count = inserted)
        };
        write_stdout_line(&message).map_err(|err| CliError::new(output_error("stdout", &err)))?;
    }
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Loads and validates configuration.
fn load_config(args: &ConfigArgs) -> CliResult<ExpenseTrackerConfig> {
    ExpenseTrackerConfig::load(args.config.as_deref())
        .map_err(|err| CliError::new(t!("config.load_failed", error = err)))
}

/// Writes a single line to stdout.
fn write_stdout_line(message: &str) -> std::io::Result<()> {
    let mut stdout = std::io::stdout();
    writeln!(&mut stdout, "{message}")
}

/// Writes a single line to stderr.
fn write_stderr_line(message: &str) -> std::io::Result<()> {
    let mut stderr = std::io::stderr();
    writeln!(&mut stderr, "{message}")
}

/// Formats an output error message.
fn output_error(stream: &str, error: &std::io::Error) -> String {
    let stream_label = match stream {
        "stdout" => t!("output.stream.stdout"),
        "stderr" => t!("output.stream.stderr"),
        _ => t!("output.stream.unknown"),
    };
    t!("output.write_failed", stream = stream_label, error = error)
}

/// Emits an error message to stderr and returns a failure exit code.
fn emit_error(message: &str) -> ExitCode {
    let _ = write_stderr_line(message);
    ExitCode::FAILURE
}

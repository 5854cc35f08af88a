//! chatrelay CLI — the main entry point.
//!
//! Commands:
//! - `serve`     — Start the HTTP relay (default)
//! - `ask`       — Run one exchange (or a REPL) through the chat pipeline
//! - `knowledge` — Show which corpus fragments match a query
//! - `init`      — Print or write the default configuration
//! - `doctor`    — Diagnose configuration and provider reachability

use std::path::PathBuf;

use chatrelay_config::AppConfig;
use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "chatrelay",
    about = "chatrelay — a thin HTTP relay between chat widgets and an LLM",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Path to the TOML config file
    #[arg(short, long, global = true, env = "CHATRELAY_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP relay server
    Serve {
        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,

        /// Override the bind host
        #[arg(long)]
        host: Option<String>,
    },

    /// Send a message through the chat pipeline
    Ask {
        /// The message; omit to enter interactive mode
        message: Option<String>,

        /// Session id to use (random if omitted)
        #[arg(short, long)]
        session: Option<String>,
    },

    /// Show the knowledge fragments selected for a query
    Knowledge {
        query: String,

        /// Maximum fragments to show (defaults to knowledge.match_limit)
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Print the default configuration, or write it to a file
    Init {
        /// Write to this path instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Diagnose configuration and provider reachability
    Doctor,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let dotenv = dotenvy::dotenv();
    let cli = Cli::parse();
    let loaded = AppConfig::load(cli.config.as_deref());

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter));
    let json = cli.log_json || loaded.as_ref().is_ok_and(|c| c.logging.json);
    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(false)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .init();
    }

    match dotenv {
        Ok(path) => tracing::debug!(path = %path.display(), "Loaded .env"),
        Err(e) => tracing::debug!("No .env file loaded: {e}"),
    }

    match cli.command.unwrap_or(Commands::Serve {
        port: None,
        host: None,
    }) {
        Commands::Init { output, force } => commands::init::run(output, force)?,
        Commands::Doctor => commands::doctor::run(loaded).await?,
        Commands::Serve { port, host } => {
            commands::serve::run(config_or_exit(loaded)?, port, host).await?
        }
        Commands::Ask { message, session } => {
            commands::ask::run(config_or_exit(loaded)?, message, session).await?
        }
        Commands::Knowledge { query, limit } => {
            commands::knowledge::run(config_or_exit(loaded)?, &query, limit)?
        }
    }

    Ok(())
}

fn config_or_exit(
    loaded: Result<AppConfig, chatrelay_config::ConfigError>,
) -> Result<AppConfig, Box<dyn std::error::Error>> {
    loaded.map_err(|e| {
        tracing::error!(error = %e, "Configuration error");
        format!("Failed to load config: {e}").into()
    })
}

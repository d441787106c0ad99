//! rpgforge CLI: the main entry point.
//!
//! Commands:
//! - `serve`: Start the MCP/HTTP server
//! - `status`: Show configuration and storage status
//! - `doctor`: Diagnose configuration, storage and backend
//! - `config`: Show, locate, validate or initialize the config file
//! - `sweep`: Remove expired artifacts once

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(
    name = "rpgforge",
    about = "rpgforge: MCP server for RPG and DB2 code generation",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    /// Config file (default: ~/.rpgforge/config.toml)
    #[arg(long, global = true, env = "RPGFORGE_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the MCP/HTTP server
    Serve {
        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,

        /// Override the bind address
        #[arg(long)]
        host: Option<String>,

        /// Keep documents and artifacts in memory only
        #[arg(long)]
        ephemeral: bool,
    },

    /// Show configuration and storage status
    Status {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Diagnose configuration, storage and backend
    Doctor,

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Remove artifacts older than the retention period
    Sweep {
        /// Override storage.artifact_retention_days
        #[arg(long)]
        days: Option<u32>,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration (secrets redacted)
    Show,
    /// Print the config file path
    Path,
    /// Validate the configuration
    Validate,
    /// Write a default config file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter));
    if cli.log_json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .init();
    }

    let config_path = commands::config_path(cli.config.as_deref());

    match cli.command {
        Commands::Serve {
            port,
            host,
            ephemeral,
        } => commands::serve::run(&config_path, port, host, ephemeral).await?,
        Commands::Status { json } => commands::status::run(&config_path, json).await?,
        Commands::Doctor => commands::doctor::run(&config_path).await?,
        Commands::Config { action } => match action {
            ConfigAction::Show => commands::config_cmd::show(&config_path)?,
            ConfigAction::Path => commands::config_cmd::path(&config_path),
            ConfigAction::Validate => commands::config_cmd::validate(&config_path)?,
            ConfigAction::Init { force } => commands::config_cmd::init(&config_path, force)?,
        },
        Commands::Sweep { days } => commands::sweep::run(&config_path, days).await?,
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_serve_overrides() {
        let cli = Cli::try_parse_from(["rpgforge", "serve", "--port", "9000", "--ephemeral"]).unwrap();
        match cli.command {
            Commands::Serve {
                port,
                host,
                ephemeral,
            } => {
                assert_eq!(port, Some(9000));
                assert!(host.is_none());
                assert!(ephemeral);
            }
            _ => panic!("expected serve"),
        }
    }

    #[test]
    fn global_flags_follow_the_subcommand() {
        let cli = Cli::try_parse_from(["rpgforge", "sweep", "--days", "7", "-v", "--config", "/tmp/c.toml"])
            .unwrap();
        assert!(cli.verbose);
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/c.toml")));
        assert!(matches!(cli.command, Commands::Sweep { days: Some(7) }));
    }

    #[test]
    fn config_requires_an_action() {
        assert!(Cli::try_parse_from(["rpgforge", "config"]).is_err());
        let cli = Cli::try_parse_from(["rpgforge", "config", "init", "--force"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Config {
                action: ConfigAction::Init { force: true }
            }
        ));
    }
}

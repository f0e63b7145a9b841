pub mod config;

use clap::{Parser, Subcommand};

/// IntakeRelay, a two-party onboarding and relay gateway.
#[derive(Debug, Parser)]
#[command(name = "intakerelay", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Start the gateway server (default when no subcommand is given).
    Serve,
    /// Configuration utilities.
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Print version information.
    Version,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Parse the config file and report any issues.
    Validate,
    /// Dump the resolved configuration (with defaults) as TOML.
    Show,
}

/// Load configuration from the path in `IR_CONFIG` (default
/// `config.toml`), falling back to built-in defaults when the file
/// does not exist.
pub fn load_config() -> anyhow::Result<(ir_domain::config::Config, String)> {
    let config_path = std::env::var("IR_CONFIG").unwrap_or_else(|_| "config.toml".into());

    let config = if std::path::Path::new(&config_path).exists() {
        let raw = std::fs::read_to_string(&config_path)
            .map_err(|e| anyhow::anyhow!("reading {config_path}: {e}"))?;
        toml::from_str(&raw).map_err(|e| anyhow::anyhow!("parsing {config_path}: {e}"))?
    } else {
        ir_domain::config::Config::default()
    };

    Ok((config, config_path))
}

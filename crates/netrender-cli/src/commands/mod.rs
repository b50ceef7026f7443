//! CLI command definitions and dispatch.

pub mod job;
pub mod results;
pub mod slave;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::output::OutputFormat;
use netrender_client::{ClientSession, MasterClient};
use netrender_core::config::NetConfig;
use netrender_core::error::NetError;

/// netrender — network render farm client
#[derive(Debug, Parser)]
#[command(name = "netrender", version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/default.toml")]
    pub config: String,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub format: OutputFormat,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Render job management
    Job(job::JobArgs),
    /// Slave listing and blacklist management
    Slaves(slave::SlaveArgs),
    /// Result collection
    Results(results::ResultsArgs),
}

impl Cli {
    /// Dispatch to the selected command.
    pub async fn execute(&self) -> Result<(), NetError> {
        match &self.command {
            Commands::Job(args) => job::execute(args, &self.config, self.format).await,
            Commands::Slaves(args) => slave::execute(args, &self.config, self.format).await,
            Commands::Results(args) => results::execute(args, &self.config).await,
        }
    }
}

/// Shared command context: configuration, master connection, and the
/// persisted client session.
pub(crate) struct CommandContext {
    pub config: NetConfig,
    pub client: MasterClient,
    pub session: ClientSession,
    session_path: PathBuf,
}

impl CommandContext {
    /// Load configuration, connect, and read the session file.
    pub fn open(config_path: &str) -> Result<Self, NetError> {
        let config = NetConfig::load_file(config_path)?;
        let client = MasterClient::connect(&config.master)?;
        let session_path = PathBuf::from(&config.client.session_file);
        let session = ClientSession::load(&session_path)?;
        Ok(Self {
            config,
            client,
            session,
            session_path,
        })
    }

    /// Persist the (possibly mutated) session back to disk.
    pub fn save_session(&self) -> Result<(), NetError> {
        self.session.save(&self.session_path)
    }
}

//! Application configuration schemas.
//!
//! All configuration structs are deserialized from TOML files via the
//! `config` crate. Each sub-module represents a logical configuration
//! section. Every field carries a serde default so that a slave or client
//! can start from an empty configuration file and env overrides alone.

pub mod client;
pub mod logging;
pub mod master;
pub mod slave;

use serde::{Deserialize, Serialize};

use self::client::ClientConfig;
use self::logging::LoggingConfig;
use self::master::MasterConfig;
use self::slave::SlaveConfig;

use crate::error::NetError;

/// Root application configuration.
///
/// This struct is the top-level deserialization target for the merged
/// TOML configuration files (default.toml + environment overlay).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NetConfig {
    /// Master address and TLS settings.
    #[serde(default)]
    pub master: MasterConfig,
    /// Slave daemon settings.
    #[serde(default)]
    pub slave: SlaveConfig,
    /// Client/CLI settings.
    #[serde(default)]
    pub client: ClientConfig,
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl NetConfig {
    /// Load configuration from TOML files.
    ///
    /// Merges the default configuration with an environment-specific overlay
    /// and environment variables prefixed with `NETRENDER_`.
    pub fn load(env: &str) -> Result<Self, NetError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix("NETRENDER")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| NetError::configuration(format!("Failed to build config: {e}")))?;

        config
            .try_deserialize()
            .map_err(|e| NetError::configuration(format!("Failed to deserialize config: {e}")))
    }

    /// Load configuration from a single explicit TOML file plus env overrides.
    pub fn load_file(path: &str) -> Result<Self, NetError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(
                config::Environment::with_prefix("NETRENDER")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| NetError::configuration(format!("Failed to build config: {e}")))?;

        config
            .try_deserialize()
            .map_err(|e| NetError::configuration(format!("Failed to deserialize config: {e}")))
    }
}

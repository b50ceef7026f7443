//! Master address and TLS configuration.

use serde::{Deserialize, Serialize};

/// Where to find the render master, and how to talk to it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MasterConfig {
    /// Master hostname or IP address.
    #[serde(default = "default_address")]
    pub address: String,
    /// Master HTTP port.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Use HTTPS instead of plain HTTP.
    #[serde(default)]
    pub use_tls: bool,
    /// Accept self-signed certificates from the master.
    #[serde(default)]
    pub accept_invalid_certs: bool,
    /// Optional PEM bundle with extra trusted root certificates.
    #[serde(default)]
    pub ca_bundle: Option<String>,
}

impl MasterConfig {
    /// Base URL of the master, e.g. `http://localhost:8000`.
    pub fn base_url(&self) -> String {
        let scheme = if self.use_tls { "https" } else { "http" };
        format!("{}://{}:{}", scheme, self.address, self.port)
    }
}

impl Default for MasterConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
            port: default_port(),
            use_tls: false,
            accept_invalid_certs: false,
            ca_bundle: None,
        }
    }
}

fn default_address() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    8000
}

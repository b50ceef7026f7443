//! Client/CLI configuration.

use serde::{Deserialize, Serialize};

/// Settings for the client command set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Path of the JSON file holding the client session (submitted jobs,
    /// known slaves, blacklist) between CLI invocations.
    #[serde(default = "default_session_file")]
    pub session_file: String,
    /// Default directory for downloaded results.
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            session_file: default_session_file(),
            output_dir: default_output_dir(),
        }
    }
}

fn default_session_file() -> String {
    "data/netrender_session.json".to_string()
}

fn default_output_dir() -> String {
    "data/results".to_string()
}

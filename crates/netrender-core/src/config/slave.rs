//! Slave daemon configuration.

use serde::{Deserialize, Serialize};

/// Settings for the slave daemon loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlaveConfig {
    /// Root directory for slave scratch space. Job working directories are
    /// created under `<path>/slave_<slave-id>/job_<job-id>/`.
    #[serde(default = "default_path")]
    pub path: String,
    /// Advertise the `rendering` capability tag.
    #[serde(default = "default_true")]
    pub enable_rendering: bool,
    /// Advertise the `baking` capability tag.
    #[serde(default)]
    pub enable_baking: bool,
    /// Extra user-defined capability tags.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Maximum connection attempts before giving up at startup.
    #[serde(default = "default_max_connect_attempts")]
    pub max_connect_attempts: u32,
    /// Initial backoff sleep between failed connects/polls, in seconds.
    #[serde(default = "default_backoff_base")]
    pub backoff_base_seconds: u64,
    /// Linear backoff growth per failed attempt, in seconds.
    #[serde(default = "default_backoff_step")]
    pub backoff_step_seconds: u64,
    /// Upper bound on the backoff sleep, in seconds.
    #[serde(default = "default_backoff_cap")]
    pub backoff_cap_seconds: u64,
    /// Interval between render-time wakeups (log flush, cancellation
    /// checks), in milliseconds.
    #[serde(default = "default_render_poll_interval")]
    pub render_poll_interval_ms: u64,
    /// Command used to launch the render engine for BLENDER/VCS jobs.
    #[serde(default = "default_blender_cmd")]
    pub blender_cmd: String,
    /// Upload a thumbnail before each frame result.
    #[serde(default)]
    pub send_thumbnails: bool,
    /// Echo render subprocess output to the local console.
    #[serde(default = "default_true")]
    pub echo_output: bool,
    /// Delete the slave's scratch directory when the daemon stops.
    /// Job directories are never cleaned per job, only at teardown.
    #[serde(default)]
    pub clear_on_stop: bool,
}

impl Default for SlaveConfig {
    fn default() -> Self {
        Self {
            path: default_path(),
            enable_rendering: true,
            enable_baking: false,
            tags: Vec::new(),
            max_connect_attempts: default_max_connect_attempts(),
            backoff_base_seconds: default_backoff_base(),
            backoff_step_seconds: default_backoff_step(),
            backoff_cap_seconds: default_backoff_cap(),
            render_poll_interval_ms: default_render_poll_interval(),
            blender_cmd: default_blender_cmd(),
            send_thumbnails: false,
            echo_output: true,
            clear_on_stop: false,
        }
    }
}

fn default_path() -> String {
    "data/slave".to_string()
}

fn default_true() -> bool {
    true
}

fn default_max_connect_attempts() -> u32 {
    10
}

fn default_backoff_base() -> u64 {
    1
}

fn default_backoff_step() -> u64 {
    1
}

fn default_backoff_cap() -> u64 {
    60
}

fn default_render_poll_interval() -> u64 {
    1000
}

fn default_blender_cmd() -> String {
    "blender".to_string()
}

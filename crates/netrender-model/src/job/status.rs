//! Job type and frame status enumerations.
//!
//! The wire spellings (`BLENDER`, `QUEUED`, ...) are fixed by the master's
//! protocol; decoding anything else is a serde error, by design.

use serde::{Deserialize, Serialize};
use std::fmt;

/// What kind of work a job carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum JobType {
    /// A regular render of a packed scene file.
    Blender,
    /// A render whose root file lives in a version-control working copy.
    Vcs,
    /// An arbitrary per-frame command line.
    Process,
}

impl JobType {
    /// Return the type as its wire string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Blender => "BLENDER",
            Self::Vcs => "VCS",
            Self::Process => "PROCESS",
        }
    }
}

impl fmt::Display for JobType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Job sub-type refinement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum JobSubType {
    /// Plain rendering.
    #[default]
    None,
    /// Texture/light baking; results are reported per artifact.
    Baking,
}

impl JobSubType {
    /// Return the sub-type as its wire string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "NONE",
            Self::Baking => "BAKING",
        }
    }
}

impl fmt::Display for JobSubType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Status of one frame within a job.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FrameStatus {
    /// Waiting to be rendered.
    #[default]
    Queued,
    /// Rendered successfully; results are available on the master.
    Done,
    /// The render subprocess failed for this frame.
    Error,
}

impl FrameStatus {
    /// Check if the frame has reached a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Error)
    }

    /// Return the status as its wire string (also used as the
    /// `job-result` header value on report PUTs).
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "QUEUED",
            Self::Done => "DONE",
            Self::Error => "ERROR",
        }
    }
}

impl fmt::Display for FrameStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

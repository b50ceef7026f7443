//! Render job entity model.

use serde::{Deserialize, Serialize};

use netrender_core::types::JobId;

use super::status::{FrameStatus, JobSubType, JobType};

/// One input file required by a job.
///
/// A file's wire identity is its index within the job's file list; the
/// first entry is the job's root file (the scene itself).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderFile {
    /// Original path on the submitting machine.
    pub path: String,
    /// SHA-256 content signature (lowercase hex), used by slaves to decide
    /// whether a cached local copy can be reused.
    pub signature: Option<String>,
    /// Force a flat local name regardless of the original path.
    #[serde(default)]
    pub force: bool,
}

impl RenderFile {
    /// Create a file entry with a known content signature.
    pub fn new(path: impl Into<String>, signature: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            signature: Some(signature.into()),
            force: false,
        }
    }

    /// The file's base name, used when flattening into slave scratch space.
    pub fn file_name(&self) -> &str {
        self.path
            .rsplit(['/', '\\'])
            .next()
            .unwrap_or(self.path.as_str())
    }
}

/// One unit of output within a job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderFrame {
    /// Frame number.
    pub number: i64,
    /// Current status.
    #[serde(default)]
    pub status: FrameStatus,
    /// Command line for `PROCESS` jobs; unused otherwise.
    #[serde(default)]
    pub command: Option<String>,
    /// Result file paths, populated once the frame is rendered.
    #[serde(default)]
    pub results: Vec<String>,
}

impl RenderFrame {
    /// Create a queued frame.
    pub fn new(number: i64) -> Self {
        Self {
            number,
            status: FrameStatus::Queued,
            command: None,
            results: Vec::new(),
        }
    }
}

/// Output resolution of a render job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    /// Horizontal pixels.
    pub x: u32,
    /// Vertical pixels.
    pub y: u32,
    /// Resolution percentage applied by the engine.
    pub percentage: u8,
}

impl Default for Resolution {
    fn default() -> Self {
        Self {
            x: 1920,
            y: 1080,
            percentage: 100,
        }
    }
}

/// A unit of render/bake/process work owned by the master.
///
/// Created by a client at submission (see [`CreateJob`]), handed to a slave
/// at poll time, mutated by per-frame status reports, and discarded once
/// results are collected or the job is cancelled. There is no persistent
/// store behind this type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderJob {
    /// Master-assigned identifier.
    pub id: JobId,
    /// Human-readable job name.
    pub name: String,
    /// What kind of work this is.
    pub job_type: JobType,
    /// Sub-type refinement.
    #[serde(default)]
    pub subtype: JobSubType,
    /// Input files; index 0 is the job's root file.
    #[serde(default)]
    pub files: Vec<RenderFile>,
    /// Frames to render, in report order.
    pub frames: Vec<RenderFrame>,
    /// Render engine name (e.g. `CYCLES`).
    pub engine: String,
    /// Output resolution.
    #[serde(default)]
    pub resolution: Resolution,
}

impl RenderJob {
    /// The job's root file, if any files were declared.
    pub fn main_file(&self) -> Option<&RenderFile> {
        self.files.first()
    }

    /// The first frame number. All log traffic for a job is keyed by this
    /// frame; every frame of a job shares a single log stream.
    pub fn first_frame(&self) -> Option<i64> {
        self.frames.first().map(|f| f.number)
    }

    /// Frame numbers in a given status.
    pub fn frames_with_status(&self, status: FrameStatus) -> Vec<i64> {
        self.frames
            .iter()
            .filter(|f| f.status == status)
            .map(|f| f.number)
            .collect()
    }
}

/// Data required to submit a new job; the master assigns the id and
/// returns it in the `job-id` response header.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateJob {
    /// Human-readable job name.
    pub name: String,
    /// What kind of work this is.
    pub job_type: JobType,
    /// Sub-type refinement.
    #[serde(default)]
    pub subtype: JobSubType,
    /// Input files; index 0 must be the job's root file.
    #[serde(default)]
    pub files: Vec<RenderFile>,
    /// Frames to render.
    pub frames: Vec<RenderFrame>,
    /// Render engine name.
    pub engine: String,
    /// Output resolution.
    #[serde(default)]
    pub resolution: Resolution,
}

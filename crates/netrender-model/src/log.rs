//! Log stream identity.

use serde::{Deserialize, Serialize};

use netrender_core::types::{JobId, SlaveId};

/// Identity of a job's log stream, announced once via `POST /log` before
/// any bytes are appended.
///
/// All frames of one job share a single stream keyed by the job's first
/// frame number; only chronological flush order within that stream is
/// meaningful.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogFile {
    /// Job the stream belongs to.
    pub job_id: JobId,
    /// Slave producing the stream.
    pub slave_id: SlaveId,
    /// Frame numbers covered by the stream.
    pub frames: Vec<i64>,
}

impl LogFile {
    /// Create a log stream identity covering the given frames.
    pub fn new(job_id: JobId, slave_id: SlaveId, frames: Vec<i64>) -> Self {
        Self {
            job_id,
            slave_id,
            frames,
        }
    }
}

//! The client command set.
//!
//! Each operator performs exactly one logical request against the master
//! and updates the [`ClientSession`] it was handed. Operators return
//! `NetResult` instead of raising; the CLI decides how to surface errors,
//! and a `NotFound` result means the master no longer knows the target —
//! nothing is retried.

use std::path::{Path, PathBuf};

use futures::StreamExt;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use netrender_core::error::{ErrorKind, NetError};
use netrender_core::result::NetResult;
use netrender_core::types::JobId;
use netrender_model::{frame_ranges, ranges_header, CreateJob, FrameStatus, JobSubType};

use crate::connection::MasterClient;
use crate::session::ClientSession;

/// Submit a render job; the returned id is also recorded in the session.
pub async fn send_job(
    client: &MasterClient,
    session: &mut ClientSession,
    job: CreateJob,
) -> NetResult<JobId> {
    let name = job.name.clone();
    let id = client.submit_job(&job).await?;
    info!(job_id = %id, name, "Job submitted");
    session.record_job(id.clone(), name);
    Ok(id)
}

/// Submit a baking job. Identical to [`send_job`] but forces the
/// `BAKING` sub-type.
pub async fn send_job_baking(
    client: &MasterClient,
    session: &mut ClientSession,
    mut job: CreateJob,
) -> NetResult<JobId> {
    job.subtype = JobSubType::Baking;
    send_job(client, session, job).await
}

/// Cancel one job; on success it is removed from the session list.
pub async fn cancel_job(
    client: &MasterClient,
    session: &mut ClientSession,
    job_id: &JobId,
    clear: bool,
) -> NetResult<()> {
    client.cancel_job(job_id, clear).await?;
    session.remove_job(job_id);
    info!(job_id = %job_id, clear, "Job cancelled");
    Ok(())
}

/// Cancel every job on the master and clear the session list.
pub async fn cancel_all_jobs(
    client: &MasterClient,
    session: &mut ClientSession,
    clear: bool,
) -> NetResult<()> {
    client.cancel_all_jobs(clear).await?;
    session.clear_jobs();
    info!(clear, "All jobs cancelled");
    Ok(())
}

/// Refresh the session's slave groups from the master, keeping
/// blacklisted slaves classified into the blacklist group.
pub async fn refresh_slaves(client: &MasterClient, session: &mut ClientSession) -> NetResult<()> {
    let fetched = client.list_slaves().await?;
    debug!(count = fetched.len(), "Fetched slave list");
    session.reconcile_slaves(fetched);
    Ok(())
}

/// Outcome of a result download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadReport {
    /// Frames whose results were fetched.
    pub saved_frames: usize,
    /// Frames skipped because they failed on the slave.
    pub skipped_error: usize,
    /// Frames skipped because they have not been rendered yet.
    pub skipped_missing: usize,
    /// Where the result archive landed, when anything was fetched.
    pub archive_path: Option<PathBuf>,
}

impl DownloadReport {
    /// Human-readable summary, distinguishing error-skipped from
    /// missing-skipped counts when both exist.
    pub fn message(&self) -> String {
        match (self.saved_frames, self.skipped_error, self.skipped_missing) {
            (0, 0, 0) => "Job has no frames".to_string(),
            (0, e, m) => format!("No frames ready: {e} failed, {m} not rendered yet"),
            (n, 0, 0) => format!("Downloaded results for {n} frame(s)"),
            (n, e, 0) => format!("Downloaded {n} frame(s), skipped {e} failed"),
            (n, 0, m) => format!("Downloaded {n} frame(s), skipped {m} not rendered yet"),
            (n, e, m) => {
                format!("Downloaded {n} frame(s), skipped {e} failed and {m} not rendered yet")
            }
        }
    }
}

/// Download the finished results of one job.
///
/// Fetches the job status, classifies frames into done/error/missing,
/// and — when anything is done — fetches those frames as one batched
/// request over their contiguous ranges.
pub async fn download_results(
    client: &MasterClient,
    job_id: &JobId,
    out_dir: &Path,
) -> NetResult<DownloadReport> {
    let job = client.job_status(job_id).await?;

    let done = job.frames_with_status(FrameStatus::Done);
    let errored = job.frames_with_status(FrameStatus::Error);
    let missing = job.frames_with_status(FrameStatus::Queued);

    let mut report = DownloadReport {
        saved_frames: done.len(),
        skipped_error: errored.len(),
        skipped_missing: missing.len(),
        archive_path: None,
    };

    if done.is_empty() {
        return Ok(report);
    }

    let ranges = frame_ranges(&done);
    let header = ranges_header(&ranges);
    debug!(job_id = %job_id, ranges = %header, "Fetching result batch");

    let resp = client.fetch_results(job_id, &header).await?;

    tokio::fs::create_dir_all(out_dir).await?;
    let archive_path = out_dir.join(format!("job_{job_id}_results.zip"));
    let mut file = tokio::fs::File::create(&archive_path).await?;

    let mut stream = resp.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk
            .map_err(|e| NetError::with_source(ErrorKind::Transport, "Result stream error", e))?;
        file.write_all(&chunk).await?;
    }
    file.flush().await?;

    info!(
        job_id = %job_id,
        frames = report.saved_frames,
        path = %archive_path.display(),
        "Results downloaded"
    );
    report.archive_path = Some(archive_path);
    Ok(report)
}

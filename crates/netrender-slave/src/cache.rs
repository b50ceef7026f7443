//! Content-addressed input file cache.
//!
//! Each job gets a scratch directory; required input files are staged into
//! it and reused across polls of the same job when their SHA-256 signature
//! still matches. A signature mismatch deletes the stale copy and forces
//! an unconditional re-fetch. Downloads stream to a `.part` temp name and
//! are renamed into place only when complete, so a half-written file never
//! passes a later hash check. There is no eviction; scratch directories
//! accumulate until the daemon is stopped with `clear_on_stop` set.

use std::path::{Path, PathBuf};

use futures::StreamExt;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use netrender_client::MasterClient;
use netrender_core::error::{ErrorKind, NetError};
use netrender_core::result::NetResult;
use netrender_core::types::{JobId, SlaveId};
use netrender_model::{signature, RenderFile, RenderJob};

/// Hash a local file off the async runtime's worker threads.
async fn file_signature(path: PathBuf) -> NetResult<String> {
    tokio::task::spawn_blocking(move || signature::file_signature(&path))
        .await
        .map_err(|e| NetError::internal(format!("Hashing task failed: {e}")))?
        .map_err(NetError::from)
}

/// Slave-local cache of one job's input files.
#[derive(Debug, Clone)]
pub struct FileCache {
    /// The job's scratch directory.
    root: PathBuf,
}

impl FileCache {
    /// Create a cache rooted at a job scratch directory.
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// The job's scratch directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Where a job file lives locally.
    ///
    /// The root file (index 0) keeps its base name at the top of the
    /// scratch directory. Other files keep their path relative to the root
    /// file's directory when they live under it; files outside that tree,
    /// and files with the force flag set, get an index-keyed flat name.
    pub fn local_path(&self, index: usize, file: &RenderFile, main_dir: Option<&str>) -> PathBuf {
        if index == 0 {
            return self.root.join(file.file_name());
        }
        if !file.force {
            if let Some(dir) = main_dir {
                if let Some(relative) = strip_dir_prefix(&file.path, dir) {
                    return self.root.join(relative);
                }
            }
        }
        self.root
            .join(format!("file_{index}_{}", file.file_name()))
    }

    /// Ensure one input file is present locally with the right contents,
    /// fetching it from the master only when needed.
    ///
    /// Returns the local path. A non-200 fetch response surfaces as
    /// `NotFound` ("file unavailable"), which the caller escalates to a
    /// job-level failure.
    pub async fn ensure_file(
        &self,
        client: &MasterClient,
        job_id: &JobId,
        slave_id: &SlaveId,
        index: usize,
        file: &RenderFile,
        main_dir: Option<&str>,
    ) -> NetResult<PathBuf> {
        let dest = self.local_path(index, file, main_dir);

        if tokio::fs::try_exists(&dest).await? {
            match &file.signature {
                Some(expected) => {
                    let actual = file_signature(dest.clone()).await?;
                    if &actual == expected {
                        debug!(path = %dest.display(), "Cache hit, signature matches");
                        return Ok(dest);
                    }
                    info!(
                        path = %dest.display(),
                        "Cached file signature mismatch, re-fetching"
                    );
                    tokio::fs::remove_file(&dest).await?;
                }
                // No signature to validate against: reuse what is there.
                None => return Ok(dest),
            }
        }

        self.fetch_into(client, job_id, slave_id, index, &dest).await?;
        Ok(dest)
    }

    /// Stream one file from the master into place, via a temp name.
    async fn fetch_into(
        &self,
        client: &MasterClient,
        job_id: &JobId,
        slave_id: &SlaveId,
        index: usize,
        dest: &Path,
    ) -> NetResult<()> {
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let temp = dest.with_file_name(format!(
            "{}.{}.part",
            dest.file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| format!("file_{index}")),
            uuid::Uuid::new_v4().simple()
        ));

        let resp = client.fetch_file(job_id, index, slave_id).await?;

        let mut out = tokio::fs::File::create(&temp).await?;
        let mut stream = resp.bytes_stream();
        let mut total = 0u64;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| {
                NetError::with_source(ErrorKind::Transport, "File download stream error", e)
            })?;
            total += chunk.len() as u64;
            out.write_all(&chunk).await?;
        }
        out.flush().await?;
        drop(out);

        tokio::fs::rename(&temp, dest).await?;
        debug!(
            job_id = %job_id,
            index,
            bytes = total,
            path = %dest.display(),
            "Fetched input file"
        );
        Ok(())
    }

    /// Stage every input file of a job; returns the local path of the
    /// job's root file.
    ///
    /// A failed fetch fails the whole preparation — no retry; the job will
    /// be reported as failed downstream.
    pub async fn prepare_job(
        &self,
        client: &MasterClient,
        slave_id: &SlaveId,
        job: &RenderJob,
    ) -> NetResult<PathBuf> {
        let main = job
            .main_file()
            .ok_or_else(|| NetError::validation(format!("Job {} declares no files", job.id)))?;
        let main_dir = parent_dir(&main.path);

        let mut main_path = None;
        for (index, file) in job.files.iter().enumerate() {
            let path = self
                .ensure_file(client, &job.id, slave_id, index, file, main_dir.as_deref())
                .await
                .map_err(|e| {
                    warn!(job_id = %job.id, index, error = %e, "Input file unavailable");
                    e
                })?;
            if index == 0 {
                main_path = Some(path);
            }
        }

        Ok(main_path.expect("job has at least one file"))
    }
}

/// Parent directory of a wire path (slash- or backslash-separated).
fn parent_dir(path: &str) -> Option<String> {
    path.rfind(['/', '\\']).map(|idx| path[..idx].to_string())
}

/// Strip `dir` (plus the separator) from the front of `path`, if it
/// lies underneath it.
fn strip_dir_prefix(path: &str, dir: &str) -> Option<String> {
    let rest = path.strip_prefix(dir)?;
    let rest = rest.strip_prefix(['/', '\\'])?;
    if rest.is_empty() {
        None
    } else {
        Some(rest.replace('\\', "/"))
    }
}

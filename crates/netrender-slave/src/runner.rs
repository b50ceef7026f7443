//! Slave daemon loop.
//!
//! One loop per slave instance: register with the master (bounded
//! attempts, growing backoff), then poll for work until stopped. An
//! assigned job stages its input files through the [`FileCache`], runs the
//! render subprocess, and on every poll tick flushes buffered output to
//! the master's log endpoint and probes for master-side cancellation.
//! Results are reported per frame, in frame-list order, once the
//! subprocess exits.
//!
//! Failure handling is "abandon and move on": no upload or fetch is ever
//! retried within a job; a failed report is logged and the loop proceeds
//! to the next frame or job.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use bytes::Bytes;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use netrender_client::MasterClient;
use netrender_core::config::{master::MasterConfig, slave::SlaveConfig, NetConfig};
use netrender_core::error::NetError;
use netrender_core::result::NetResult;
use netrender_core::types::SlaveId;
use netrender_model::{
    FrameStatus, JobSubType, JobType, LogFile, RenderFrame, RenderJob, SlaveRegistration,
};

use crate::backoff::IncrementalBackoff;
use crate::cache::FileCache;
use crate::process::{self, RenderProcess};

/// The slave daemon.
#[derive(Debug, Clone)]
pub struct SlaveRunner {
    master: MasterConfig,
    slave: SlaveConfig,
}

impl SlaveRunner {
    /// Create a runner from the application configuration.
    pub fn new(config: &NetConfig) -> Self {
        Self {
            master: config.master.clone(),
            slave: config.slave.clone(),
        }
    }

    /// Run the slave loop until the cancel signal fires.
    ///
    /// Registration failures are retried with backoff up to the configured
    /// attempt limit; exhausting it is an error. Cancellation at any wait
    /// point stops the loop without registering or reporting further.
    pub async fn run(&self, mut cancel: watch::Receiver<bool>) -> NetResult<()> {
        let client = MasterClient::connect(&self.master)?;

        let Some(slave_id) = self.register(&client, &mut cancel).await? else {
            info!("Stop requested before registration completed");
            return Ok(());
        };

        let work_dir = PathBuf::from(&self.slave.path).join(format!("slave_{slave_id}"));
        tokio::fs::create_dir_all(&work_dir).await?;

        info!(
            slave_id = %slave_id,
            master = client.base_url(),
            work_dir = %work_dir.display(),
            "Slave registered, polling for work"
        );

        let mut backoff = IncrementalBackoff::from_config(&self.slave);

        while !*cancel.borrow() {
            match client.poll_job(&slave_id).await {
                Ok(Some(job)) => {
                    backoff.reset();
                    let job_id = job.id.clone();
                    if let Err(e) = self
                        .run_job(&client, &slave_id, &work_dir, job, &mut cancel)
                        .await
                    {
                        if e.is_not_found() {
                            debug!(job_id = %job_id, "Job discarded by master");
                        } else {
                            warn!(job_id = %job_id, error = %e, "Job failed");
                        }
                    }
                }
                Ok(None) => {
                    if !backoff.wait(&mut cancel).await {
                        break;
                    }
                }
                Err(e) => {
                    warn!(error = %e, "Poll failed");
                    if !backoff.wait(&mut cancel).await {
                        break;
                    }
                }
            }
        }

        if self.slave.clear_on_stop {
            if let Err(e) = tokio::fs::remove_dir_all(&work_dir).await {
                warn!(error = %e, "Failed to clear scratch directory");
            } else {
                info!(work_dir = %work_dir.display(), "Scratch directory cleared");
            }
        }

        info!("Slave stopped");
        Ok(())
    }

    /// Register with the master, retrying with backoff.
    ///
    /// `Ok(None)` means cancellation was requested before registration
    /// succeeded.
    async fn register(
        &self,
        client: &MasterClient,
        cancel: &mut watch::Receiver<bool>,
    ) -> NetResult<Option<SlaveId>> {
        let hostname = gethostname::gethostname().to_string_lossy().into_owned();
        let registration = SlaveRegistration::new(
            hostname,
            self.slave.enable_rendering,
            self.slave.enable_baking,
            &self.slave.tags,
        );

        let mut backoff = IncrementalBackoff::from_config(&self.slave);
        let mut attempt = 0u32;
        loop {
            if *cancel.borrow() {
                return Ok(None);
            }
            attempt += 1;
            match client.register_slave(&registration).await {
                Ok(id) => return Ok(Some(id)),
                Err(e) => {
                    if attempt >= self.slave.max_connect_attempts {
                        return Err(NetError::transport(format!(
                            "Could not reach master at {} after {attempt} attempts: {e}",
                            client.base_url()
                        )));
                    }
                    warn!(
                        attempt,
                        max = self.slave.max_connect_attempts,
                        error = %e,
                        "Cannot reach master, retrying"
                    );
                    if !backoff.wait(cancel).await {
                        return Ok(None);
                    }
                }
            }
        }
    }

    /// Run one assigned job to completion, cancellation, or failure.
    async fn run_job(
        &self,
        client: &MasterClient,
        slave_id: &SlaveId,
        work_dir: &Path,
        job: RenderJob,
        cancel: &mut watch::Receiver<bool>,
    ) -> NetResult<()> {
        info!(
            job_id = %job.id,
            job_type = %job.job_type,
            frames = job.frames.len(),
            "Job assigned"
        );

        let job_dir = work_dir.join(format!("job_{}", job.id));
        tokio::fs::create_dir_all(&job_dir).await?;
        let cache = FileCache::new(job_dir.clone());

        // VCS jobs resolve their root file inside the working copy the
        // same way as regular jobs once the files are staged locally.
        // A failed fetch is reported like a failed render: the master
        // gets an ERROR for every frame, not silence.
        let main_file = match job.job_type {
            JobType::Blender | JobType::Vcs => {
                match cache.prepare_job(client, slave_id, &job).await {
                    Ok(path) => Some(path),
                    Err(e) => {
                        warn!(job_id = %job.id, error = %e, "Input staging failed");
                        self.report_job(client, slave_id, &job, &job_dir, false, Duration::ZERO)
                            .await;
                        return Ok(());
                    }
                }
            }
            JobType::Process => None,
        };

        let first_frame = job
            .first_frame()
            .ok_or_else(|| NetError::validation(format!("Job {} has no frames", job.id)))?;

        // Every frame of the job shares one log stream, keyed by the first
        // frame number. A job re-queued with a different first frame would
        // leave earlier appends behind under the old key.
        let frame_numbers: Vec<i64> = job.frames.iter().map(|f| f.number).collect();
        client
            .announce_log(&LogFile::new(job.id.clone(), slave_id.clone(), frame_numbers))
            .await?;

        let cmd = process::build_command(
            &job,
            main_file.as_deref(),
            &job_dir,
            &self.slave.blender_cmd,
        )?;
        let mut proc = RenderProcess::spawn(cmd)?;
        let started = Instant::now();

        let mut tick =
            tokio::time::interval(Duration::from_millis(self.slave.render_poll_interval_ms));
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let status = loop {
            tokio::select! {
                changed = cancel.changed() => {
                    if changed.is_err() || *cancel.borrow() {
                        info!(job_id = %job.id, "Stop requested, terminating render");
                        proc.kill().await;
                        return Ok(());
                    }
                }
                _ = tick.tick() => {}
            }

            self.flush_log(client, slave_id, &job, first_frame, &mut proc)
                .await;

            match client.job_alive(&job.id, Some(first_frame)).await {
                Ok(()) => {}
                Err(e) if e.is_not_found() => {
                    info!(job_id = %job.id, "Job cancelled by master, abandoning");
                    proc.kill().await;
                    return Ok(());
                }
                Err(e) => {
                    warn!(job_id = %job.id, error = %e, "Status probe failed");
                }
            }

            if let Some(status) = proc.try_wait()? {
                self.flush_log(client, slave_id, &job, first_frame, &mut proc)
                    .await;
                break status;
            }
        };

        self.report_job(client, slave_id, &job, &job_dir, status.success(), started.elapsed())
            .await;
        Ok(())
    }

    /// Flush buffered subprocess output to the master's log endpoint,
    /// optionally echoing it locally. Flush failures are logged, never
    /// fatal.
    async fn flush_log(
        &self,
        client: &MasterClient,
        slave_id: &SlaveId,
        job: &RenderJob,
        first_frame: i64,
        proc: &mut RenderProcess,
    ) {
        let buf = proc.drain_buffered();
        if buf.is_empty() {
            return;
        }

        if self.slave.echo_output {
            use std::io::Write;
            let mut stdout = std::io::stdout().lock();
            let _ = stdout.write_all(&buf);
            let _ = stdout.flush();
        }

        if let Err(e) = client
            .append_log(&job.id, first_frame, slave_id, Bytes::from(buf))
            .await
        {
            if e.is_not_found() {
                debug!(job_id = %job.id, "Log stream discarded by master");
            } else {
                warn!(job_id = %job.id, error = %e, "Log flush failed");
            }
        }
    }

    /// Report every frame of a finished job, in frame-list order.
    ///
    /// A `NotFound` on any PUT means the master dropped the job; that
    /// frame is abandoned and reporting continues with the next one.
    async fn report_job(
        &self,
        client: &MasterClient,
        slave_id: &SlaveId,
        job: &RenderJob,
        job_dir: &Path,
        success: bool,
        elapsed: Duration,
    ) {
        let render_secs = elapsed.as_secs_f64();
        if success {
            info!(job_id = %job.id, secs = render_secs, "Render finished, reporting results");
        } else {
            warn!(job_id = %job.id, "Render failed, reporting errors");
        }

        let last_index = job.frames.len().saturating_sub(1);
        for (index, frame) in job.frames.iter().enumerate() {
            let outcome = if success {
                self.report_frame_done(
                    client,
                    slave_id,
                    job,
                    job_dir,
                    frame,
                    index == last_index,
                    render_secs,
                )
                .await
            } else {
                client
                    .report_frame(
                        &job.id,
                        slave_id,
                        frame.number,
                        FrameStatus::Error,
                        render_secs,
                        None,
                    )
                    .await
            };

            match outcome {
                Ok(()) => {}
                Err(e) if e.is_not_found() => {
                    debug!(job_id = %job.id, frame = frame.number, "Frame discarded by master");
                }
                Err(e) => {
                    warn!(
                        job_id = %job.id,
                        frame = frame.number,
                        error = %e,
                        "Failed to report frame"
                    );
                }
            }
        }
    }

    /// Report one successfully rendered frame, artifact included.
    async fn report_frame_done(
        &self,
        client: &MasterClient,
        slave_id: &SlaveId,
        job: &RenderJob,
        job_dir: &Path,
        frame: &RenderFrame,
        last_frame: bool,
        render_secs: f64,
    ) -> NetResult<()> {
        match (job.job_type, job.subtype) {
            // Bare-process jobs have no artifact to transfer.
            (JobType::Process, _) => {
                client
                    .report_frame(
                        &job.id,
                        slave_id,
                        frame.number,
                        FrameStatus::Done,
                        render_secs,
                        None,
                    )
                    .await
            }
            // Baking: every artifact goes to /result, the last one of the
            // job flagged as finished; /render marks the frame done.
            (_, JobSubType::Baking) => {
                let artifacts = frame_artifacts(job_dir, frame.number).await?;
                let count = artifacts.len();
                for (i, artifact) in artifacts.iter().enumerate() {
                    let bytes = Bytes::from(tokio::fs::read(artifact).await?);
                    let filename = artifact
                        .file_name()
                        .map(|n| n.to_string_lossy().into_owned())
                        .unwrap_or_default();
                    client
                        .put_bake_result(
                            &job.id,
                            slave_id,
                            frame.number,
                            &filename,
                            last_frame && i + 1 == count,
                            bytes,
                        )
                        .await?;
                }
                client
                    .report_frame(
                        &job.id,
                        slave_id,
                        frame.number,
                        FrameStatus::Done,
                        render_secs,
                        None,
                    )
                    .await
            }
            // Regular render: the frame image, preceded by a thumbnail
            // when enabled. The thumbnail upload reuses the full artifact
            // bytes; no slave-side downscaling. An exit-0 run with no
            // output still reports the frame, as an error.
            _ => {
                let artifact = frame_artifacts(job_dir, frame.number).await?.into_iter().next();
                let Some(artifact) = artifact else {
                    warn!(
                        job_id = %job.id,
                        frame = frame.number,
                        "Renderer exited cleanly but produced no output"
                    );
                    return client
                        .report_frame(
                            &job.id,
                            slave_id,
                            frame.number,
                            FrameStatus::Error,
                            render_secs,
                            None,
                        )
                        .await;
                };

                let bytes = Bytes::from(tokio::fs::read(&artifact).await?);
                if self.slave.send_thumbnails {
                    client
                        .put_thumbnail(&job.id, slave_id, frame.number, bytes.clone())
                        .await?;
                }
                client
                    .report_frame(
                        &job.id,
                        slave_id,
                        frame.number,
                        FrameStatus::Done,
                        render_secs,
                        Some(bytes),
                    )
                    .await
            }
        }
    }
}

/// Output files a frame produced, by zero-padded frame number prefix.
async fn frame_artifacts(job_dir: &Path, frame: i64) -> NetResult<Vec<PathBuf>> {
    let prefix = format!("{frame:06}");
    let mut entries = tokio::fs::read_dir(job_dir).await?;
    let mut artifacts = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with(&prefix) && !name.ends_with(".part") {
            artifacts.push(entry.path());
        }
    }
    artifacts.sort();
    Ok(artifacts)
}

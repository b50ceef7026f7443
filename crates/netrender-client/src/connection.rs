//! HTTP connection to the render master.
//!
//! [`MasterClient`] wraps a `reqwest` client configured from
//! [`MasterConfig`] (TLS options included) and speaks the master's wire
//! protocol. All bodies are JSON unless noted; `204 NO_CONTENT` is the
//! protocol's "not found / cancelled" sentinel and is mapped to
//! [`ErrorKind::NotFound`] so callers can tell expected cancellation from
//! transport failure.
//!
//! Requests deliberately carry no overall timeout: a hung master blocks the
//! caller, matching the cooperative-cancellation model (waits are only ever
//! interrupted between calls, never mid-flight).

use bytes::Bytes;
use reqwest::StatusCode;
use tracing::debug;

use netrender_core::config::master::MasterConfig;
use netrender_core::error::{ErrorKind, NetError};
use netrender_core::result::NetResult;
use netrender_core::types::{JobId, SlaveId};
use netrender_model::{CreateJob, FrameStatus, LogFile, RenderJob, RenderSlave, SlaveRegistration};

/// Wire header names used by the protocol.
pub mod headers {
    /// Slave identifier, assigned at registration.
    pub const SLAVE_ID: &str = "slave-id";
    /// Job identifier.
    pub const JOB_ID: &str = "job-id";
    /// Frame number within a job.
    pub const JOB_FRAME: &str = "job-frame";
    /// Frame outcome on report PUTs (`DONE` / `ERROR`).
    pub const JOB_RESULT: &str = "job-result";
    /// Render wall time in seconds.
    pub const JOB_TIME: &str = "job-time";
    /// Artifact name on baking result PUTs.
    pub const RESULT_FILENAME: &str = "result-filename";
    /// Whether a baking result PUT is the job's last artifact.
    pub const JOB_FINISHED: &str = "job-finished";
    /// Contiguous done-frame ranges on result downloads (`1:3,7:8,10`).
    pub const JOB_FRAME_RANGES: &str = "job-frame-ranges";
}

/// A ready-to-use connection to the configured master.
#[derive(Debug, Clone)]
pub struct MasterClient {
    http: reqwest::Client,
    base_url: String,
}

impl MasterClient {
    /// Build a client for the configured master address, applying the
    /// TLS settings from the configuration.
    pub fn connect(config: &MasterConfig) -> NetResult<Self> {
        let mut builder = reqwest::Client::builder();

        if config.accept_invalid_certs {
            builder = builder.danger_accept_invalid_certs(true);
        }
        if let Some(path) = &config.ca_bundle {
            let pem = std::fs::read(path).map_err(|e| {
                NetError::with_source(
                    ErrorKind::Configuration,
                    format!("Failed to read CA bundle '{path}'"),
                    e,
                )
            })?;
            let cert = reqwest::Certificate::from_pem(&pem).map_err(|e| {
                NetError::with_source(
                    ErrorKind::Configuration,
                    format!("Invalid CA bundle '{path}'"),
                    e,
                )
            })?;
            builder = builder.add_root_certificate(cert);
        }

        let http = builder.build()?;
        Ok(Self {
            http,
            base_url: config.base_url(),
        })
    }

    /// Base URL of the master this client talks to.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Pull a required header out of a response, as a string.
    fn required_header(resp: &reqwest::Response, name: &str) -> NetResult<String> {
        resp.headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_string())
            .ok_or_else(|| {
                NetError::protocol(format!("Master response is missing the '{name}' header"))
            })
    }

    // ── Slave-facing endpoints ───────────────────────────────────

    /// Register this worker with the master; returns the assigned id
    /// from the `slave-id` response header.
    pub async fn register_slave(&self, registration: &SlaveRegistration) -> NetResult<SlaveId> {
        let resp = self
            .http
            .post(self.url("/slave"))
            .json(registration)
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(NetError::transport(format!(
                "Slave registration rejected: HTTP {}",
                resp.status()
            )));
        }

        let id = Self::required_header(&resp, headers::SLAVE_ID)?;
        debug!(slave_id = %id, "Registered with master");
        Ok(SlaveId::new(id))
    }

    /// Poll the master for an assigned job. `Ok(None)` means no work yet;
    /// any transport failure is an error.
    pub async fn poll_job(&self, slave_id: &SlaveId) -> NetResult<Option<RenderJob>> {
        let resp = self
            .http
            .get(self.url("/job"))
            .header(headers::SLAVE_ID, slave_id.as_str())
            .send()
            .await?;

        if resp.status() != StatusCode::OK {
            return Ok(None);
        }

        let job: RenderJob = resp.json().await.map_err(|e| {
            NetError::with_source(ErrorKind::Serialization, "Malformed job payload", e)
        })?;
        Ok(Some(job))
    }

    /// Fetch one input file of a job as a streaming response.
    /// A non-200 answer means the file is unavailable for this job.
    pub async fn fetch_file(
        &self,
        job_id: &JobId,
        index: usize,
        slave_id: &SlaveId,
    ) -> NetResult<reqwest::Response> {
        let resp = self
            .http
            .get(self.url(&format!("/file/{job_id}/{index}")))
            .header(headers::SLAVE_ID, slave_id.as_str())
            .send()
            .await?;

        if resp.status() != StatusCode::OK {
            return Err(NetError::not_found(format!(
                "File {index} unavailable for job {job_id} (HTTP {})",
                resp.status()
            )));
        }
        Ok(resp)
    }

    /// Announce a job's log stream before appending to it.
    pub async fn announce_log(&self, log: &LogFile) -> NetResult<()> {
        let resp = self.http.post(self.url("/log")).json(log).send().await?;
        self.expect_found(resp, "log announce").await
    }

    /// Append raw bytes to a job's log stream. The stream is keyed by the
    /// job's first frame for every frame of the job.
    pub async fn append_log(
        &self,
        job_id: &JobId,
        frame: i64,
        slave_id: &SlaveId,
        chunk: Bytes,
    ) -> NetResult<()> {
        let resp = self
            .http
            .put(self.url(&format!("/log/{job_id}/{frame}")))
            .header(headers::SLAVE_ID, slave_id.as_str())
            .body(chunk)
            .send()
            .await?;
        self.expect_found(resp, "log append").await
    }

    /// Lightweight existence check for a job (and optionally one frame).
    /// `Err(NotFound)` means the master has discarded it — the caller
    /// treats that as cancellation, not a failure.
    pub async fn job_alive(&self, job_id: &JobId, frame: Option<i64>) -> NetResult<()> {
        let mut req = self
            .http
            .head(self.url("/status"))
            .header(headers::JOB_ID, job_id.as_str());
        if let Some(frame) = frame {
            req = req.header(headers::JOB_FRAME, frame.to_string());
        }
        let resp = req.send().await?;
        self.expect_found(resp, "status check").await
    }

    /// Report one frame's outcome. `DONE` carries the rendered artifact;
    /// `ERROR` is an empty body. `Err(NotFound)` means the job was
    /// cancelled out from under us.
    pub async fn report_frame(
        &self,
        job_id: &JobId,
        slave_id: &SlaveId,
        frame: i64,
        result: FrameStatus,
        render_time_secs: f64,
        body: Option<Bytes>,
    ) -> NetResult<()> {
        let resp = self
            .http
            .put(self.url("/render"))
            .header(headers::JOB_ID, job_id.as_str())
            .header(headers::SLAVE_ID, slave_id.as_str())
            .header(headers::JOB_FRAME, frame.to_string())
            .header(headers::JOB_RESULT, result.as_str())
            .header(headers::JOB_TIME, format!("{render_time_secs:.3}"))
            .body(body.unwrap_or_default())
            .send()
            .await?;
        self.expect_found(resp, "frame report").await
    }

    /// Upload a preview thumbnail ahead of a frame's result.
    pub async fn put_thumbnail(
        &self,
        job_id: &JobId,
        slave_id: &SlaveId,
        frame: i64,
        body: Bytes,
    ) -> NetResult<()> {
        let resp = self
            .http
            .put(self.url("/thumb"))
            .header(headers::JOB_ID, job_id.as_str())
            .header(headers::SLAVE_ID, slave_id.as_str())
            .header(headers::JOB_FRAME, frame.to_string())
            .body(body)
            .send()
            .await?;
        self.expect_found(resp, "thumbnail upload").await
    }

    /// Upload one baking artifact for a frame.
    pub async fn put_bake_result(
        &self,
        job_id: &JobId,
        slave_id: &SlaveId,
        frame: i64,
        filename: &str,
        finished: bool,
        body: Bytes,
    ) -> NetResult<()> {
        let resp = self
            .http
            .put(self.url("/result"))
            .header(headers::JOB_ID, job_id.as_str())
            .header(headers::SLAVE_ID, slave_id.as_str())
            .header(headers::JOB_FRAME, frame.to_string())
            .header(headers::RESULT_FILENAME, filename)
            .header(headers::JOB_FINISHED, if finished { "1" } else { "0" })
            .body(body)
            .send()
            .await?;
        self.expect_found(resp, "bake result upload").await
    }

    // ── Client-facing endpoints ──────────────────────────────────

    /// Submit a new job; the master assigns and returns its id in the
    /// `job-id` response header.
    pub async fn submit_job(&self, job: &CreateJob) -> NetResult<JobId> {
        let resp = self.http.post(self.url("/job")).json(job).send().await?;

        if !resp.status().is_success() {
            return Err(NetError::transport(format!(
                "Job submission rejected: HTTP {}",
                resp.status()
            )));
        }

        let id = Self::required_header(&resp, headers::JOB_ID)?;
        Ok(JobId::new(id))
    }

    /// Fetch the full status of one job.
    pub async fn job_status(&self, job_id: &JobId) -> NetResult<RenderJob> {
        let resp = self
            .http
            .get(self.url("/status"))
            .header(headers::JOB_ID, job_id.as_str())
            .send()
            .await?;

        if resp.status() == StatusCode::NO_CONTENT {
            return Err(NetError::not_found(format!("Job {job_id} not found")));
        }
        if !resp.status().is_success() {
            return Err(NetError::transport(format!(
                "Status query failed: HTTP {}",
                resp.status()
            )));
        }

        let job: RenderJob = resp.json().await.map_err(|e| {
            NetError::with_source(ErrorKind::Serialization, "Malformed status payload", e)
        })?;
        Ok(job)
    }

    /// List every job known to the master.
    pub async fn list_jobs(&self) -> NetResult<Vec<RenderJob>> {
        let resp = self.http.get(self.url("/status")).send().await?;

        if !resp.status().is_success() {
            return Err(NetError::transport(format!(
                "Job listing failed: HTTP {}",
                resp.status()
            )));
        }

        let jobs: Vec<RenderJob> = resp.json().await.map_err(|e| {
            NetError::with_source(ErrorKind::Serialization, "Malformed job list payload", e)
        })?;
        Ok(jobs)
    }

    /// List every slave known to the master.
    pub async fn list_slaves(&self) -> NetResult<Vec<RenderSlave>> {
        let resp = self.http.get(self.url("/slaves")).send().await?;

        if !resp.status().is_success() {
            return Err(NetError::transport(format!(
                "Slave listing failed: HTTP {}",
                resp.status()
            )));
        }

        let slaves: Vec<RenderSlave> = resp.json().await.map_err(|e| {
            NetError::with_source(ErrorKind::Serialization, "Malformed slave list payload", e)
        })?;
        Ok(slaves)
    }

    /// Cancel one job. `clear` also drops its collected results.
    pub async fn cancel_job(&self, job_id: &JobId, clear: bool) -> NetResult<()> {
        let resp = self
            .http
            .post(self.url(&format!("/cancel/{job_id}")))
            .json(&serde_json::json!({ "clear": clear }))
            .send()
            .await?;
        self.expect_found(resp, "cancel").await
    }

    /// Cancel every job on the master.
    pub async fn cancel_all_jobs(&self, clear: bool) -> NetResult<()> {
        let resp = self
            .http
            .post(self.url("/clear"))
            .json(&serde_json::json!({ "clear": clear }))
            .send()
            .await?;
        self.expect_found(resp, "cancel all").await
    }

    /// Download the archived results for a set of done-frame ranges as a
    /// streaming response.
    pub async fn fetch_results(
        &self,
        job_id: &JobId,
        ranges_header: &str,
    ) -> NetResult<reqwest::Response> {
        let resp = self
            .http
            .get(self.url(&format!("/result/{job_id}")))
            .header(headers::JOB_FRAME_RANGES, ranges_header)
            .send()
            .await?;

        if resp.status() == StatusCode::NO_CONTENT {
            return Err(NetError::not_found(format!("Job {job_id} not found")));
        }
        if !resp.status().is_success() {
            return Err(NetError::transport(format!(
                "Result download failed: HTTP {}",
                resp.status()
            )));
        }
        Ok(resp)
    }

    /// Map the sentinel `204` to `NotFound` and any other non-2xx to a
    /// transport error.
    async fn expect_found(&self, resp: reqwest::Response, what: &str) -> NetResult<()> {
        match resp.status() {
            StatusCode::NO_CONTENT => Err(NetError::not_found(format!(
                "Master discarded the target of this {what}"
            ))),
            status if status.is_success() => Ok(()),
            status => Err(NetError::transport(format!(
                "{what} failed: HTTP {status}"
            ))),
        }
    }
}

//! Shared test helpers: an in-process mock master that records every
//! request the client and slave make against the wire protocol.

use std::collections::{HashMap, HashSet, VecDeque};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde_json::Value;

use netrender_core::config::master::MasterConfig;
use netrender_model::{RenderJob, RenderSlave};

/// One `PUT /render` frame report, as the mock master saw it.
#[derive(Debug, Clone)]
pub struct FrameReport {
    pub job_id: String,
    pub slave_id: String,
    pub frame: i64,
    pub result: String,
    pub body_len: usize,
}

/// Everything the mock master has recorded, plus the canned answers it
/// will hand out.
#[derive(Debug, Default)]
pub struct MasterState {
    /// Bodies of `POST /slave` registrations.
    pub registrations: Vec<Value>,
    /// Jobs handed out on `GET /job`, front first; empty queue answers 204.
    pub job_queue: VecDeque<RenderJob>,
    /// Canned file bodies served on `GET /file/{job}/{index}`.
    pub file_bodies: HashMap<(String, usize), Vec<u8>>,
    /// Every `(job, index)` file fetch observed.
    pub file_fetches: Vec<(String, usize)>,
    /// Bodies of `POST /log` announcements.
    pub log_announces: Vec<Value>,
    /// `(job, frame, bytes)` of every `PUT /log/{job}/{frame}`.
    pub log_appends: Vec<(String, i64, Vec<u8>)>,
    /// Every `PUT /render` report.
    pub frame_reports: Vec<FrameReport>,
    /// Frames that got a `PUT /thumb` before their report.
    pub thumbnails: Vec<(String, i64)>,
    /// `(job, frame, filename, finished)` of baking `PUT /result` uploads.
    pub bake_results: Vec<(String, i64, String, bool)>,
    /// Jobs the master has discarded; status probes and report PUTs for
    /// them answer 204.
    pub cancelled: HashSet<String>,
    /// Bodies of `POST /job` submissions.
    pub submissions: Vec<Value>,
    /// Jobs served by `GET /status`.
    pub jobs: Vec<RenderJob>,
    /// Slaves served by `GET /slaves`.
    pub slaves: Vec<RenderSlave>,
    /// `(job, ranges)` of every `GET /result/{job}` download.
    pub result_requests: Vec<(String, String)>,
    /// Archive body served on result downloads.
    pub result_body: Vec<u8>,
    /// `(job, clear)` of `POST /cancel/{job}` requests.
    pub cancel_requests: Vec<(String, bool)>,
    /// `clear` flags of `POST /clear` requests.
    pub clear_requests: Vec<bool>,
}

type Shared = Arc<Mutex<MasterState>>;

/// An in-process master speaking the wire protocol over a loopback port.
pub struct MockMaster {
    addr: SocketAddr,
    state: Shared,
}

impl MockMaster {
    /// Bind an ephemeral port and start serving.
    pub async fn start() -> Self {
        let state: Shared = Arc::new(Mutex::new(MasterState::default()));

        let app = Router::new()
            .route("/slave", post(register_slave))
            .route("/job", get(poll_job).post(submit_job))
            .route("/file/{job}/{index}", get(fetch_file))
            .route("/log", post(announce_log))
            .route("/log/{job}/{frame}", put(append_log))
            .route("/status", get(status))
            .route("/render", put(report_frame))
            .route("/thumb", put(put_thumbnail))
            .route("/result", put(put_bake_result))
            .route("/result/{job}", get(fetch_results))
            .route("/slaves", get(list_slaves))
            .route("/cancel/{job}", post(cancel_job))
            .route("/clear", post(cancel_all))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind mock master");
        let addr = listener.local_addr().expect("mock master addr");

        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("mock master serve");
        });

        Self { addr, state }
    }

    /// A master configuration pointing at this mock.
    pub fn config(&self) -> MasterConfig {
        MasterConfig {
            address: self.addr.ip().to_string(),
            port: self.addr.port(),
            ..MasterConfig::default()
        }
    }

    /// Lock the recorded state for inspection or seeding.
    pub fn state(&self) -> MutexGuard<'_, MasterState> {
        self.state.lock().expect("mock master state")
    }

    /// Poll until `predicate` holds over the state, panicking after a few
    /// seconds. Keeps tests free of fixed sleeps.
    pub async fn wait_until(&self, what: &str, predicate: impl Fn(&MasterState) -> bool) {
        for _ in 0..200 {
            if predicate(&self.state()) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
        panic!("timed out waiting for: {what}");
    }
}

fn slave_id_header(headers: &HeaderMap) -> String {
    headers
        .get("slave-id")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

fn header(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_string())
}

async fn register_slave(State(state): State<Shared>, Json(body): Json<Value>) -> Response {
    let id = {
        let mut st = state.lock().unwrap();
        st.registrations.push(body);
        format!("slave-{}", st.registrations.len())
    };
    (StatusCode::OK, [("slave-id", id)]).into_response()
}

/// A handed-out job becomes known to the master: status probes answer
/// 200 for it until it lands in the `cancelled` set.
async fn poll_job(State(state): State<Shared>) -> Response {
    let mut st = state.lock().unwrap();
    match st.job_queue.pop_front() {
        Some(job) => {
            st.jobs.push(job.clone());
            Json(job).into_response()
        }
        None => StatusCode::NO_CONTENT.into_response(),
    }
}

async fn fetch_file(
    State(state): State<Shared>,
    Path((job, index)): Path<(String, usize)>,
) -> Response {
    let mut st = state.lock().unwrap();
    st.file_fetches.push((job.clone(), index));
    match st.file_bodies.get(&(job, index)) {
        Some(body) => body.clone().into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn announce_log(State(state): State<Shared>, Json(body): Json<Value>) -> StatusCode {
    state.lock().unwrap().log_announces.push(body);
    StatusCode::OK
}

async fn append_log(
    State(state): State<Shared>,
    Path((job, frame)): Path<(String, i64)>,
    body: Bytes,
) -> StatusCode {
    let mut st = state.lock().unwrap();
    if st.cancelled.contains(&job) {
        return StatusCode::NO_CONTENT;
    }
    st.log_appends.push((job, frame, body.to_vec()));
    StatusCode::OK
}

/// `GET /status` with a `job-id` header answers one job (204 when the
/// master no longer knows it); without the header it lists all jobs.
/// `HEAD` requests take the same path with the body stripped.
async fn status(State(state): State<Shared>, headers: HeaderMap) -> Response {
    let st = state.lock().unwrap();
    match header(&headers, "job-id") {
        Some(job_id) => {
            if st.cancelled.contains(&job_id) {
                return StatusCode::NO_CONTENT.into_response();
            }
            match st.jobs.iter().find(|j| j.id.as_str() == job_id) {
                Some(job) => Json(job.clone()).into_response(),
                None => StatusCode::NO_CONTENT.into_response(),
            }
        }
        None => Json(st.jobs.clone()).into_response(),
    }
}

async fn report_frame(State(state): State<Shared>, headers: HeaderMap, body: Bytes) -> StatusCode {
    let job_id = header(&headers, "job-id").unwrap_or_default();
    let mut st = state.lock().unwrap();
    if st.cancelled.contains(&job_id) {
        return StatusCode::NO_CONTENT;
    }
    st.frame_reports.push(FrameReport {
        job_id,
        slave_id: slave_id_header(&headers),
        frame: header(&headers, "job-frame")
            .and_then(|v| v.parse().ok())
            .unwrap_or(-1),
        result: header(&headers, "job-result").unwrap_or_default(),
        body_len: body.len(),
    });
    StatusCode::OK
}

async fn put_thumbnail(State(state): State<Shared>, headers: HeaderMap, _body: Bytes) -> StatusCode {
    let job_id = header(&headers, "job-id").unwrap_or_default();
    let frame = header(&headers, "job-frame")
        .and_then(|v| v.parse().ok())
        .unwrap_or(-1);
    state.lock().unwrap().thumbnails.push((job_id, frame));
    StatusCode::OK
}

async fn put_bake_result(
    State(state): State<Shared>,
    headers: HeaderMap,
    _body: Bytes,
) -> StatusCode {
    let job_id = header(&headers, "job-id").unwrap_or_default();
    let mut st = state.lock().unwrap();
    if st.cancelled.contains(&job_id) {
        return StatusCode::NO_CONTENT;
    }
    st.bake_results.push((
        job_id,
        header(&headers, "job-frame")
            .and_then(|v| v.parse().ok())
            .unwrap_or(-1),
        header(&headers, "result-filename").unwrap_or_default(),
        header(&headers, "job-finished").as_deref() == Some("1"),
    ));
    StatusCode::OK
}

async fn submit_job(State(state): State<Shared>, Json(body): Json<Value>) -> Response {
    let id = {
        let mut st = state.lock().unwrap();
        st.submissions.push(body);
        st.submissions.len().to_string()
    };
    (StatusCode::OK, [("job-id", id)]).into_response()
}

async fn fetch_results(
    State(state): State<Shared>,
    Path(job): Path<String>,
    headers: HeaderMap,
) -> Response {
    let ranges = header(&headers, "job-frame-ranges").unwrap_or_default();
    let mut st = state.lock().unwrap();
    if !st.jobs.iter().any(|j| j.id.as_str() == job) {
        return StatusCode::NO_CONTENT.into_response();
    }
    st.result_requests.push((job, ranges));
    st.result_body.clone().into_response()
}

async fn list_slaves(State(state): State<Shared>) -> Response {
    Json(state.lock().unwrap().slaves.clone()).into_response()
}

async fn cancel_job(
    State(state): State<Shared>,
    Path(job): Path<String>,
    Json(body): Json<Value>,
) -> StatusCode {
    let clear = body.get("clear").and_then(Value::as_bool).unwrap_or(false);
    let mut st = state.lock().unwrap();
    st.cancelled.insert(job.clone());
    st.cancel_requests.push((job, clear));
    StatusCode::OK
}

async fn cancel_all(State(state): State<Shared>, Json(body): Json<Value>) -> StatusCode {
    let clear = body.get("clear").and_then(Value::as_bool).unwrap_or(false);
    state.lock().unwrap().clear_requests.push(clear);
    StatusCode::OK
}

//! End-to-end slave daemon tests against the mock master.

use std::path::Path;

use tokio::sync::watch;

use netrender_core::config::{slave::SlaveConfig, NetConfig};
use netrender_core::types::JobId;
use netrender_model::{
    signature, JobSubType, JobType, RenderFile, RenderFrame, RenderJob, Resolution,
};
use netrender_slave::SlaveRunner;

use crate::helpers::MockMaster;

/// A render job the stub engine can execute.
fn blender_job(id: &str, file: RenderFile, frames: &[i64]) -> RenderJob {
    RenderJob {
        id: JobId::from(id),
        name: format!("test job {id}"),
        job_type: JobType::Blender,
        subtype: JobSubType::None,
        files: vec![file],
        frames: frames.iter().copied().map(RenderFrame::new).collect(),
        engine: "CYCLES".to_string(),
        resolution: Resolution::default(),
    }
}

/// A shell job; the command runs once for the whole frame list.
fn process_job(id: &str, command: &str, frames: &[i64]) -> RenderJob {
    let mut frame_list: Vec<RenderFrame> = frames.iter().copied().map(RenderFrame::new).collect();
    frame_list[0].command = Some(command.to_string());
    RenderJob {
        id: JobId::from(id),
        name: format!("test job {id}"),
        job_type: JobType::Process,
        subtype: JobSubType::None,
        files: Vec::new(),
        frames: frame_list,
        engine: String::new(),
        resolution: Resolution::default(),
    }
}

/// Write a stand-in render binary that honours `-o <prefix>` and `-f <n>`
/// by writing one output image per frame.
fn write_stub_renderer(dir: &Path) -> String {
    let script = dir.join("stub-renderer.sh");
    std::fs::write(
        &script,
        concat!(
            "#!/bin/sh\n",
            "prefix=\"\"\n",
            "while [ $# -gt 0 ]; do\n",
            "  case \"$1\" in\n",
            "    -o) prefix=\"$2\"; shift 2 ;;\n",
            "    -f)\n",
            "      pad=$(printf '%06d' \"$2\")\n",
            "      out=$(printf '%s' \"$prefix\" | sed \"s/######/$pad/\")\n",
            "      echo \"rendering frame $2\"\n",
            "      printf 'pixels-%s' \"$2\" > \"${out}.png\"\n",
            "      shift 2 ;;\n",
            "    *) shift ;;\n",
            "  esac\n",
            "done\n",
        ),
    )
    .expect("write stub renderer");

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755))
            .expect("chmod stub renderer");
    }

    script.to_string_lossy().into_owned()
}

fn test_config(master: &MockMaster, scratch: &Path, blender_cmd: &str) -> NetConfig {
    NetConfig {
        master: master.config(),
        slave: SlaveConfig {
            path: scratch.to_string_lossy().into_owned(),
            render_poll_interval_ms: 50,
            echo_output: false,
            blender_cmd: blender_cmd.to_string(),
            ..SlaveConfig::default()
        },
        ..NetConfig::default()
    }
}

#[tokio::test]
async fn slave_renders_job_and_reports_each_frame() {
    let master = MockMaster::start().await;
    let scratch = tempfile::tempdir().unwrap();
    let blender_cmd = write_stub_renderer(scratch.path());

    let scene = b"fake blend bytes".to_vec();
    let file = RenderFile::new("/projects/scene.blend", signature::bytes_signature(&scene));
    {
        let mut st = master.state();
        st.file_bodies.insert(("job-1".to_string(), 0), scene);
        st.job_queue
            .push_back(blender_job("job-1", file, &[1, 2, 3]));
    }

    let config = test_config(&master, scratch.path(), &blender_cmd);
    let (stop_tx, stop_rx) = watch::channel(false);
    let runner = tokio::spawn(async move { SlaveRunner::new(&config).run(stop_rx).await });

    master
        .wait_until("three frame reports", |st| st.frame_reports.len() == 3)
        .await;
    stop_tx.send(true).unwrap();
    runner.await.unwrap().unwrap();

    let st = master.state();

    // Registration advertises the rendering capability.
    assert_eq!(st.registrations.len(), 1);
    let tags = st.registrations[0]["tags"].as_array().unwrap();
    assert!(tags.iter().any(|t| t == "rendering"));

    // The scene file was fetched exactly once.
    assert_eq!(st.file_fetches, vec![("job-1".to_string(), 0)]);

    // One log stream announcement covering all frames, and every append
    // keyed by the job's first frame.
    assert_eq!(st.log_announces.len(), 1);
    assert_eq!(st.log_announces[0]["frames"], serde_json::json!([1, 2, 3]));
    assert!(!st.log_appends.is_empty());
    assert!(st
        .log_appends
        .iter()
        .all(|(job, frame, _)| job == "job-1" && *frame == 1));

    // Frames reported in order, DONE, each carrying its artifact.
    let frames: Vec<i64> = st.frame_reports.iter().map(|r| r.frame).collect();
    assert_eq!(frames, vec![1, 2, 3]);
    assert!(st.frame_reports.iter().all(|r| r.result == "DONE"));
    assert!(st.frame_reports.iter().all(|r| r.body_len > 0));
    assert_eq!(st.frame_reports[0].slave_id, "slave-1");
}

#[tokio::test]
async fn cached_input_with_matching_signature_is_not_refetched() {
    let master = MockMaster::start().await;
    let scratch = tempfile::tempdir().unwrap();
    let blender_cmd = write_stub_renderer(scratch.path());

    let scene = b"stable scene".to_vec();
    let file = RenderFile::new("/projects/scene.blend", signature::bytes_signature(&scene));

    // Pre-stage the file where the slave will look for it. The slave id is
    // deterministic: the mock hands out "slave-1" to the first registrant.
    let job_dir = scratch.path().join("slave_slave-1").join("job_job-2");
    std::fs::create_dir_all(&job_dir).unwrap();
    std::fs::write(job_dir.join("scene.blend"), &scene).unwrap();

    master
        .state()
        .job_queue
        .push_back(blender_job("job-2", file, &[1]));

    let config = test_config(&master, scratch.path(), &blender_cmd);
    let (stop_tx, stop_rx) = watch::channel(false);
    let runner = tokio::spawn(async move { SlaveRunner::new(&config).run(stop_rx).await });

    master
        .wait_until("frame report", |st| !st.frame_reports.is_empty())
        .await;
    stop_tx.send(true).unwrap();
    runner.await.unwrap().unwrap();

    assert!(master.state().file_fetches.is_empty());
}

#[tokio::test]
async fn failed_render_reports_every_frame_as_error_with_empty_body() {
    let master = MockMaster::start().await;
    let scratch = tempfile::tempdir().unwrap();

    master
        .state()
        .job_queue
        .push_back(process_job("job-3", "echo boom >&2; exit 1", &[4, 5]));

    let config = test_config(&master, scratch.path(), "blender");
    let (stop_tx, stop_rx) = watch::channel(false);
    let runner = tokio::spawn(async move { SlaveRunner::new(&config).run(stop_rx).await });

    master
        .wait_until("two error reports", |st| st.frame_reports.len() == 2)
        .await;
    stop_tx.send(true).unwrap();
    runner.await.unwrap().unwrap();

    let st = master.state();
    let frames: Vec<i64> = st.frame_reports.iter().map(|r| r.frame).collect();
    assert_eq!(frames, vec![4, 5]);
    assert!(st.frame_reports.iter().all(|r| r.result == "ERROR"));
    assert!(st.frame_reports.iter().all(|r| r.body_len == 0));
}

#[tokio::test]
async fn unavailable_input_file_reports_every_frame_as_error() {
    let master = MockMaster::start().await;
    let scratch = tempfile::tempdir().unwrap();
    let blender_cmd = write_stub_renderer(scratch.path());

    // The job declares a file the master cannot serve: staging fails, and
    // the master still has to learn the job went nowhere.
    let file = RenderFile::new("/projects/missing.blend", "0".repeat(64));
    master
        .state()
        .job_queue
        .push_back(blender_job("job-6", file, &[11, 12]));

    let config = test_config(&master, scratch.path(), &blender_cmd);
    let (stop_tx, stop_rx) = watch::channel(false);
    let runner = tokio::spawn(async move { SlaveRunner::new(&config).run(stop_rx).await });

    master
        .wait_until("two error reports", |st| st.frame_reports.len() == 2)
        .await;
    stop_tx.send(true).unwrap();
    runner.await.unwrap().unwrap();

    let st = master.state();
    let frames: Vec<i64> = st.frame_reports.iter().map(|r| r.frame).collect();
    assert_eq!(frames, vec![11, 12]);
    assert!(st.frame_reports.iter().all(|r| r.result == "ERROR"));
    assert!(st.frame_reports.iter().all(|r| r.body_len == 0));
    // Nothing was rendered, so no log stream was ever announced.
    assert!(st.log_announces.is_empty());
}

#[tokio::test]
async fn master_side_cancellation_kills_render_and_reports_nothing() {
    let master = MockMaster::start().await;
    let scratch = tempfile::tempdir().unwrap();

    master
        .state()
        .job_queue
        .push_back(process_job("job-4", "sleep 30", &[1]));

    let config = test_config(&master, scratch.path(), "blender");
    let (stop_tx, stop_rx) = watch::channel(false);
    let runner = tokio::spawn(async move { SlaveRunner::new(&config).run(stop_rx).await });

    // Wait for the render to start, then have the master discard the job.
    master
        .wait_until("log announced", |st| !st.log_announces.is_empty())
        .await;
    master.state().cancelled.insert("job-4".to_string());

    // The slave abandons the job and goes back to polling for work.
    master
        .state()
        .job_queue
        .push_back(process_job("job-5", "true", &[9]));
    master
        .wait_until("next job picked up", |st| {
            st.frame_reports.iter().any(|r| r.job_id == "job-5")
        })
        .await;

    stop_tx.send(true).unwrap();
    runner.await.unwrap().unwrap();

    let st = master.state();
    assert!(st.frame_reports.iter().all(|r| r.job_id != "job-4"));
    let report = st.frame_reports.iter().find(|r| r.job_id == "job-5").unwrap();
    assert_eq!(report.frame, 9);
    assert_eq!(report.result, "DONE");
}

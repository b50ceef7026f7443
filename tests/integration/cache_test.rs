//! File cache behavior against a real HTTP fetch path.

use netrender_client::MasterClient;
use netrender_core::types::{JobId, SlaveId};
use netrender_model::{signature, RenderFile};
use netrender_slave::FileCache;

use crate::helpers::MockMaster;

#[tokio::test]
async fn second_ensure_reuses_the_fetched_file() {
    let master = MockMaster::start().await;
    let dir = tempfile::tempdir().unwrap();

    let body = b"scene contents".to_vec();
    let file = RenderFile::new("/work/scene.blend", signature::bytes_signature(&body));
    master
        .state()
        .file_bodies
        .insert(("job-1".to_string(), 0), body.clone());

    let client = MasterClient::connect(&master.config()).unwrap();
    let cache = FileCache::new(dir.path().to_path_buf());
    let job_id = JobId::from("job-1");
    let slave_id = SlaveId::from("slave-1");

    let first = cache
        .ensure_file(&client, &job_id, &slave_id, 0, &file, None)
        .await
        .unwrap();
    let second = cache
        .ensure_file(&client, &job_id, &slave_id, 0, &file, None)
        .await
        .unwrap();

    assert_eq!(first, second);
    assert_eq!(std::fs::read(&first).unwrap(), body);
    // Only the first call hit the wire.
    assert_eq!(master.state().file_fetches.len(), 1);
    // No temp files left behind.
    let leftovers: Vec<_> = std::fs::read_dir(dir.path())
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().ends_with(".part"))
        .collect();
    assert!(leftovers.is_empty());
}

#[tokio::test]
async fn stale_cached_file_is_replaced() {
    let master = MockMaster::start().await;
    let dir = tempfile::tempdir().unwrap();

    let body = b"fresh contents".to_vec();
    let file = RenderFile::new("/work/scene.blend", signature::bytes_signature(&body));
    master
        .state()
        .file_bodies
        .insert(("job-1".to_string(), 0), body.clone());

    // A stale copy already sits at the destination.
    std::fs::write(dir.path().join("scene.blend"), b"stale contents").unwrap();

    let client = MasterClient::connect(&master.config()).unwrap();
    let cache = FileCache::new(dir.path().to_path_buf());

    let path = cache
        .ensure_file(
            &client,
            &JobId::from("job-1"),
            &SlaveId::from("slave-1"),
            0,
            &file,
            None,
        )
        .await
        .unwrap();

    assert_eq!(std::fs::read(&path).unwrap(), body);
    assert_eq!(master.state().file_fetches.len(), 1);
}

#[tokio::test]
async fn unsigned_cached_file_is_reused_as_is() {
    let master = MockMaster::start().await;
    let dir = tempfile::tempdir().unwrap();

    let file = RenderFile {
        path: "/work/scene.blend".to_string(),
        signature: None,
        force: false,
    };
    std::fs::write(dir.path().join("scene.blend"), b"whatever is there").unwrap();

    let client = MasterClient::connect(&master.config()).unwrap();
    let cache = FileCache::new(dir.path().to_path_buf());

    let path = cache
        .ensure_file(
            &client,
            &JobId::from("job-1"),
            &SlaveId::from("slave-1"),
            0,
            &file,
            None,
        )
        .await
        .unwrap();

    assert_eq!(std::fs::read(&path).unwrap(), b"whatever is there");
    assert!(master.state().file_fetches.is_empty());
}

#[tokio::test]
async fn missing_file_on_master_fails_the_fetch() {
    let master = MockMaster::start().await;
    let dir = tempfile::tempdir().unwrap();

    let file = RenderFile::new("/work/scene.blend", "0".repeat(64));

    let client = MasterClient::connect(&master.config()).unwrap();
    let cache = FileCache::new(dir.path().to_path_buf());

    let err = cache
        .ensure_file(
            &client,
            &JobId::from("job-1"),
            &SlaveId::from("slave-1"),
            0,
            &file,
            None,
        )
        .await
        .unwrap_err();

    assert!(err.is_not_found());
    assert!(!dir.path().join("scene.blend").exists());
}

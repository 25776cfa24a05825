use storage::{SessionStore, Storage};

#[tokio::test]
async fn session_survives_reopening_the_database_file() {
    let temp_root = tempfile::tempdir().expect("tempdir");
    let db_path = temp_root.path().join("nested").join("session.db");
    let database_url = format!("sqlite://{}", db_path.to_string_lossy().replace('\\', "/"));

    let storage = Storage::new(&database_url).await.expect("open");
    storage
        .save_session("persisted-token", r#"{"_id":"v9"}"#, "v9")
        .await
        .expect("save");
    drop(storage);

    assert!(db_path.exists(), "database file should exist");

    let reopened = Storage::new(&database_url).await.expect("reopen");
    let session = reopened.load_session().await.expect("load");
    assert_eq!(session.token.as_deref(), Some("persisted-token"));
    assert_eq!(session.vendor_id.as_deref(), Some("v9"));

    reopened.clear_session().await.expect("clear");
    drop(reopened);

    let cleared = Storage::new(&database_url).await.expect("reopen after clear");
    assert!(cleared.load_session().await.expect("load").is_empty());
}

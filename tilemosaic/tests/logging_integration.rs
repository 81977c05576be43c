//! Integration test for logging setup.
//!
//! Lives in its own test binary because the subscriber is global and can
//! only be installed once per process.
//!
//! Run with: `cargo test --test logging_integration`

use tilemosaic::logging::{default_log_file, init_logging};

#[test]
fn test_init_logging_writes_file() {
    let dir = tempfile::tempdir().unwrap();
    let log_dir = dir.path().join("logs");
    std::fs::create_dir_all(&log_dir).unwrap();
    std::fs::write(log_dir.join(default_log_file()), "stale run\n").unwrap();

    let guard = init_logging(tracing::Level::INFO, Some(&log_dir)).unwrap();
    tracing::info!(root = "17/70000/45000", "Starting mosaic");
    tracing::debug!("filtered out unless RUST_LOG says otherwise");

    // A second subscriber cannot be installed.
    assert!(init_logging(tracing::Level::DEBUG, None).is_err());

    drop(guard);
    let contents = std::fs::read_to_string(log_dir.join(default_log_file())).unwrap();
    assert!(!contents.contains("stale run"));
    if std::env::var("RUST_LOG").is_err() {
        assert!(contents.contains("Starting mosaic"));
    }
}

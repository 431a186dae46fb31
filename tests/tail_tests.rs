//! Integration tests for the log file tailer: pre-existing content, live
//! appends, cancellation, and open failures.


use std::io::Write;

use jobworker::worker::tail::tail_file;
use jobworker::WorkerError;
use test_harness::{collect, within, WAIT_TIMEOUT};
use tokio_util::sync::CancellationToken;

/// Tailing a path that does not exist fails up front.
#[tokio::test]
async fn test_tail_missing_file_fails() {
    let dir = tempfile::tempdir().expect("temp dir should be creatable");
    let cancel = CancellationToken::new();

    let err = tail_file(&dir.path().join("nope.log"), cancel)
        .expect_err("tail of a missing file should fail");
    assert!(matches!(err, WorkerError::Io(_)));
}

/// Content written before the tailer attaches is delivered from offset
/// zero, and the stream terminates after cancel.
#[tokio::test]
async fn test_tail_delivers_preexisting_content() {
    let dir = tempfile::tempdir().expect("temp dir should be creatable");
    let path = dir.path().join("output.log");
    std::fs::write(&path, b"written before the tail\n").expect("write should succeed");

    let cancel = CancellationToken::new();
    let chunks = tail_file(&path, cancel.clone()).expect("tail should succeed");
    cancel.cancel();

    let output = within(collect(chunks)).await;
    assert_eq!(output, b"written before the tail\n");
}

/// Bytes appended while the tailer runs are streamed live, before cancel.
#[tokio::test]
async fn test_tail_streams_live_appends() {
    let dir = tempfile::tempdir().expect("temp dir should be creatable");
    let path = dir.path().join("output.log");
    std::fs::write(&path, b"").expect("create should succeed");

    let cancel = CancellationToken::new();
    let mut chunks = tail_file(&path, cancel.clone()).expect("tail should succeed");

    let mut file = std::fs::OpenOptions::new()
        .append(true)
        .open(&path)
        .expect("open should succeed");
    file.write_all(b"first\n").expect("append should succeed");
    file.flush().expect("flush should succeed");

    // The appended bytes must arrive without any cancel being issued.
    let mut seen = Vec::new();
    while seen != b"first\n" {
        let chunk = tokio::time::timeout(WAIT_TIMEOUT, chunks.recv())
            .await
            .expect("a live chunk should arrive before the timeout")
            .expect("the stream should still be open");
        seen.extend_from_slice(&chunk);
    }

    file.write_all(b"second\n").expect("append should succeed");
    drop(file);
    cancel.cancel();

    let rest = within(collect(chunks)).await;
    assert_eq!([seen, rest].concat(), b"first\nsecond\n");
}

/// After cancel the tailer performs exactly one final drain and closes the
/// stream; a consumer reading afterwards sees the complete file then EOF.
#[tokio::test]
async fn test_tail_cancel_drains_then_closes() {
    let dir = tempfile::tempdir().expect("temp dir should be creatable");
    let path = dir.path().join("output.log");
    std::fs::write(&path, b"one shot\n").expect("write should succeed");

    let cancel = CancellationToken::new();
    let mut chunks = tail_file(&path, cancel.clone()).expect("tail should succeed");
    cancel.cancel();

    let mut out = Vec::new();
    while let Some(chunk) = within(chunks.recv()).await {
        out.extend_from_slice(&chunk);
    }
    assert_eq!(out, b"one shot\n");
    assert!(chunks.recv().await.is_none());
}

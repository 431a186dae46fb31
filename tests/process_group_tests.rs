//! Integration tests for the process group controller: spawn errors,
//! natural exits, and the stop path.


use std::process::Stdio;
use std::sync::Arc;

use jobworker::worker::ProcessGroup;
use jobworker::WorkerError;
use test_harness::{args, within};

/// Spawn failure is reported from start; the completion signal never fires.
#[tokio::test]
async fn test_spawn_error_for_missing_program() {
    let group = ProcessGroup::new("no-such-binary-anywhere".to_string(), Vec::new());

    let err = group
        .start(Stdio::null(), Stdio::null())
        .expect_err("start should fail");
    assert!(matches!(err, WorkerError::Spawn(_)));
}

/// A clean exit publishes exit code 0 with the stopped flag unset.
#[tokio::test]
async fn test_natural_exit_publishes_outcome() {
    let group = ProcessGroup::new("true".to_string(), Vec::new());
    group
        .start(Stdio::null(), Stdio::null())
        .expect("start should succeed");

    within(group.done()).await;

    let outcome = group.outcome().await;
    assert!(!outcome.stopped);
    assert_eq!(outcome.exit_code, 0);
    assert!(outcome.done_at.is_some());
}

/// A non-zero exit is reported as the child's raw code.
#[tokio::test]
async fn test_nonzero_exit_code_is_preserved() {
    let group = ProcessGroup::new("sh".to_string(), args(&["-c", "exit 3"]));
    group
        .start(Stdio::null(), Stdio::null())
        .expect("start should succeed");

    within(group.done()).await;
    assert_eq!(group.outcome().await.exit_code, 3);
}

/// Stop kills the group: stopped is set and the exit code is non-zero.
#[tokio::test]
async fn test_stop_kills_the_group() {
    let group = ProcessGroup::new("sleep".to_string(), args(&["30"]));
    group
        .start(Stdio::null(), Stdio::null())
        .expect("start should succeed");

    group.stop();
    within(group.done()).await;

    let outcome = group.outcome().await;
    assert!(outcome.stopped);
    assert_ne!(outcome.exit_code, 0);
}

/// Stop after completion does not disturb the published outcome.
#[tokio::test]
async fn test_stop_after_done_is_noop() {
    let group = ProcessGroup::new("true".to_string(), Vec::new());
    group
        .start(Stdio::null(), Stdio::null())
        .expect("start should succeed");
    within(group.done()).await;

    group.stop();

    let outcome = group.outcome().await;
    assert!(!outcome.stopped);
    assert_eq!(outcome.exit_code, 0);
}

/// Concurrent stops from many tasks are safe and coalesce into one kill.
#[tokio::test]
async fn test_concurrent_stops_are_safe() {
    let group = Arc::new(ProcessGroup::new("sleep".to_string(), args(&["30"])));
    group
        .start(Stdio::null(), Stdio::null())
        .expect("start should succeed");

    let mut handles = Vec::new();
    for _ in 0..4 {
        let group = Arc::clone(&group);
        handles.push(tokio::spawn(async move { group.stop() }));
    }
    for handle in handles {
        handle.await.expect("stop task should not panic");
    }

    within(group.done()).await;
    assert!(group.outcome().await.stopped);
}

/// A stop issued before start is honored as soon as the child is spawned.
#[tokio::test]
async fn test_stop_before_start_is_remembered() {
    let group = ProcessGroup::new("sleep".to_string(), args(&["30"]));
    group.stop();

    group
        .start(Stdio::null(), Stdio::null())
        .expect("start should succeed");
    within(group.done()).await;

    let outcome = group.outcome().await;
    assert!(outcome.stopped);
    assert_ne!(outcome.exit_code, 0);
}

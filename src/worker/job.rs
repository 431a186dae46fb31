use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, RwLock};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::{Result, WorkerError};
use crate::worker::process_group::ProcessGroup;
use crate::worker::tail;

/// Capacity of the chunk channel handed to a follower.
const FOLLOW_CHANNEL_CAPACITY: usize = 16;

/// Key identifying a job in the store: the owning user and the job id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JobKey {
    pub user_id: String,
    pub job_id: Uuid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobStatus {
    Created,
    Running,
    Succeeded,
    Failed,
    Stopped,
}

impl JobStatus {
    /// Terminal statuses are sinks: once reached they never change.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Succeeded | JobStatus::Failed | JobStatus::Stopped
        )
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::Created => write!(f, "created"),
            JobStatus::Running => write!(f, "running"),
            JobStatus::Succeeded => write!(f, "succeeded"),
            JobStatus::Failed => write!(f, "failed"),
            JobStatus::Stopped => write!(f, "stopped"),
        }
    }
}

/// Point-in-time view of a job's mutable fields, read under one lock
/// acquisition so callers never observe a mix of two transitions.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct JobSnapshot {
    pub status: JobStatus,
    /// -1 while the job is not terminal; non-zero when stopped.
    pub exit_code: i32,
    pub finished_at: Option<DateTime<Utc>>,
}

#[derive(Debug)]
struct JobState {
    status: JobStatus,
    exit_code: i32,
    finished_at: Option<DateTime<Utc>>,
}

/// A single job: one command invocation, its process group, and its log
/// file. Mutable fields are written only by the job's own completion task;
/// any number of readers take consistent snapshots.
#[derive(Debug)]
pub struct Job {
    pub key: JobKey,
    pub command: String,
    pub args: Vec<String>,
    pub created_at: DateTime<Utc>,

    log_dir: PathBuf,
    state: Arc<RwLock<JobState>>,
    group: Arc<ProcessGroup>,
    completion: CancellationToken,
}

impl Job {
    /// Create a job with a fresh id, status `Created` and exit code -1.
    pub fn new(user_id: String, command: String, args: Vec<String>, log_root: &Path) -> Self {
        let job_id = Uuid::new_v4();
        let log_dir = log_root.join(&user_id).join(job_id.to_string());
        Self {
            key: JobKey { user_id, job_id },
            group: Arc::new(ProcessGroup::new(command.clone(), args.clone())),
            command,
            args,
            created_at: Utc::now(),
            log_dir,
            state: Arc::new(RwLock::new(JobState {
                status: JobStatus::Created,
                exit_code: -1,
                finished_at: None,
            })),
            completion: CancellationToken::new(),
        }
    }

    /// Directory holding this job's log file.
    pub fn log_dir(&self) -> &Path {
        &self.log_dir
    }

    /// Path of the merged stdout/stderr log file.
    pub fn log_path(&self) -> PathBuf {
        self.log_dir.join("output.log")
    }

    /// Start the job without blocking for its completion.
    ///
    /// Opens the log file and hands it to the process group as both output
    /// sinks; stdout and stderr share one file description, so bytes land in
    /// kernel write-arrival order. The job is `Running` when this returns.
    /// Fails if the job was already started, the log file cannot be opened,
    /// or the process cannot be spawned; in the latter cases the status
    /// stays `Created`.
    pub async fn start(&self) -> Result<()> {
        // The store created the log directory when the job was added. Open
        // the file before taking the write lock so readers are never stalled
        // behind file I/O.
        let log = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.log_path())
            .await?;
        let log = log.into_std().await;
        let stderr = log.try_clone()?;

        let mut state = self.state.write().await;
        if state.status != JobStatus::Created {
            return Err(WorkerError::AlreadyStarted);
        }

        self.group.start(log.into(), stderr.into())?;
        state.status = JobStatus::Running;
        drop(state);

        tracing::info!(
            job_id = %self.key.job_id,
            user_id = %self.key.user_id,
            command = %self.command,
            "job started"
        );

        // Completion task: the only writer of the terminal state. Publishes
        // finished_at, exit_code and status together, then makes the
        // completion signal readable.
        let group = Arc::clone(&self.group);
        let state = Arc::clone(&self.state);
        let completion = self.completion.clone();
        let job_id = self.key.job_id;
        tokio::spawn(async move {
            group.done().await;
            let outcome = group.outcome().await;

            let status = if outcome.stopped {
                JobStatus::Stopped
            } else if outcome.exit_code == 0 {
                JobStatus::Succeeded
            } else {
                JobStatus::Failed
            };

            {
                let mut state = state.write().await;
                state.finished_at = outcome.done_at;
                state.exit_code = outcome.exit_code;
                state.status = status;
            }
            completion.cancel();

            tracing::info!(
                job_id = %job_id,
                status = %status,
                exit_code = outcome.exit_code,
                "job finished"
            );
        });

        Ok(())
    }

    /// Request termination of the job's process group.
    ///
    /// Non-blocking and safe in any state: stops coalesce, a stop after
    /// completion is a no-op, and a stop on a never-started job takes effect
    /// the moment the job is started.
    pub fn stop(&self) {
        self.group.stop();
    }

    /// Follow the job's log from the beginning.
    ///
    /// Returns a channel that yields every byte written to the log, in
    /// order, and closes once the job has completed and the file has been
    /// drained to EOF. Followers may attach before, during, or after
    /// completion. Fails if the log file cannot be tailed, e.g. when the job
    /// was never started.
    pub fn follow(&self) -> Result<mpsc::Receiver<Bytes>> {
        let cancel = CancellationToken::new();
        let mut chunks = tail::tail_file(&self.log_path(), cancel.clone())?;

        let (tx, rx) = mpsc::channel(FOLLOW_CHANNEL_CAPACITY);
        let completion = self.completion.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    chunk = chunks.recv() => match chunk {
                        Some(chunk) => {
                            if tx.send(chunk).await.is_err() {
                                break;
                            }
                        }
                        None => break,
                    },
                    _ = completion.cancelled() => break,
                }
            }

            // Job done or consumer gone: stop the tailer, then forward its
            // remaining output to exhaustion.
            cancel.cancel();
            while let Some(chunk) = chunks.recv().await {
                if tx.send(chunk).await.is_err() {
                    break;
                }
            }
        });

        Ok(rx)
    }

    /// Consistent snapshot of status, exit code and finish time.
    pub async fn snapshot(&self) -> JobSnapshot {
        let state = self.state.read().await;
        JobSnapshot {
            status: state.status,
            exit_code: state.exit_code,
            finished_at: state.finished_at,
        }
    }

    pub async fn status(&self) -> JobStatus {
        self.snapshot().await.status
    }

    pub async fn exit_code(&self) -> i32 {
        self.snapshot().await.exit_code
    }

    pub async fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.snapshot().await.finished_at
    }

    /// Wait until the job reaches a terminal status.
    pub async fn done(&self) {
        self.completion.cancelled().await;
    }

    /// Completion token, cancelled once the job is terminal. Handed out so
    /// streaming handlers can `select!` on it.
    pub fn completion(&self) -> CancellationToken {
        self.completion.clone()
    }
}

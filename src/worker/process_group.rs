use std::os::unix::process::ExitStatusExt;
use std::process::Stdio;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use nix::errno::Errno;
use nix::sys::signal::{killpg, Signal};
use nix::unistd::Pid;
use tokio::process::Command;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use crate::error::{Result, WorkerError};

/// One command run as the leader of its own process group.
///
/// Descendants spawned by the command inherit the group, so a single SIGKILL
/// to the group id reaches the entire tree. Post-exit state (`stopped`,
/// `exit_code`, `done_at`) is published before the completion signal becomes
/// readable, never after.
#[derive(Debug)]
pub struct ProcessGroup {
    program: String,
    args: Vec<String>,
    state: Arc<RwLock<GroupState>>,
    stop: CancellationToken,
    done: CancellationToken,
}

/// Post-exit state of a process group. Meaningful once
/// [`ProcessGroup::done`] has resolved.
#[derive(Debug, Clone, Copy)]
pub struct GroupOutcome {
    /// True iff the group was killed by an accepted stop request.
    pub stopped: bool,
    /// The child's exit code; `128 + signal` if it was killed by a signal.
    pub exit_code: i32,
    /// Instant the child was reaped.
    pub done_at: Option<DateTime<Utc>>,
}

#[derive(Debug)]
struct GroupState {
    stopped: bool,
    exit_code: i32,
    done_at: Option<DateTime<Utc>>,
}

impl ProcessGroup {
    pub fn new(program: String, args: Vec<String>) -> Self {
        Self {
            program,
            args,
            state: Arc::new(RwLock::new(GroupState {
                stopped: false,
                exit_code: -1,
                done_at: None,
            })),
            stop: CancellationToken::new(),
            done: CancellationToken::new(),
        }
    }

    /// Spawn the command with the given stdout and stderr sinks.
    ///
    /// The child becomes the leader of a new process group whose id equals
    /// its pid. Must be called exactly once. Fails only if the OS cannot
    /// launch the executable, never because the command later exits
    /// non-zero.
    pub fn start(&self, stdout: Stdio, stderr: Stdio) -> Result<()> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(stdout)
            .stderr(stderr)
            .process_group(0)
            .spawn()
            .map_err(WorkerError::Spawn)?;

        let pid = child
            .id()
            .map(|pid| Pid::from_raw(pid as i32))
            .ok_or_else(|| WorkerError::Internal("spawned child has no pid".into()))?;

        // Kill listener: acts on the first stop request, at most once, then
        // exits. `reaped` releases it when the child ends on its own; it is
        // polled first so a stop that lands after the child is gone stays a
        // no-op.
        let reaped = CancellationToken::new();
        let stop = self.stop.clone();
        let state = Arc::clone(&self.state);
        let listener_reaped = reaped.clone();
        let listener = tokio::spawn(async move {
            tokio::select! {
                biased;
                _ = listener_reaped.cancelled() => {}
                _ = stop.cancelled() => match killpg(pid, Signal::SIGKILL) {
                    Ok(()) => {
                        tracing::debug!(%pid, "killed process group");
                        state.write().await.stopped = true;
                    }
                    Err(Errno::ESRCH) => {
                        tracing::debug!(%pid, "process group already gone");
                    }
                    Err(errno) => {
                        tracing::error!(%pid, error = %errno, "unable to kill process group");
                    }
                },
            }
        });

        // Reaper: waits for the child, joins the kill listener so `stopped`
        // is settled, then publishes post-exit state and makes the
        // completion signal readable.
        let state = Arc::clone(&self.state);
        let done = self.done.clone();
        tokio::spawn(async move {
            let status = child.wait().await;
            reaped.cancel();
            let _ = listener.await;

            let exit_code = match status {
                Ok(status) => match status.code() {
                    Some(code) => code,
                    None => 128 + status.signal().unwrap_or(0),
                },
                Err(error) => {
                    tracing::error!(%pid, error = %error, "unable to reap child");
                    128
                }
            };

            {
                let mut state = state.write().await;
                state.exit_code = exit_code;
                state.done_at = Some(Utc::now());
            }
            done.cancel();
        });

        Ok(())
    }

    /// Request termination of the whole process group.
    ///
    /// Idempotent and non-blocking: any number of concurrent callers
    /// coalesce into at most one SIGKILL. A stop after the group is done is
    /// a no-op. A stop before [`start`](Self::start) is remembered and
    /// honored as soon as the child is spawned.
    pub fn stop(&self) {
        self.stop.cancel();
    }

    /// Wait until the child has been reaped and post-exit bookkeeping is
    /// complete.
    pub async fn done(&self) {
        self.done.cancelled().await;
    }

    /// One-lock snapshot of the post-exit flags.
    pub async fn outcome(&self) -> GroupOutcome {
        let state = self.state.read().await;
        GroupOutcome {
            stopped: state.stopped,
            exit_code: state.exit_code,
            done_at: state.done_at,
        }
    }
}

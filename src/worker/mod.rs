//! Job execution engine.
//!
//! This module owns the full lifecycle of submitted shell commands:
//! - **Process control**: Spawns each command as the leader of its own
//!   process group so the whole descendant tree can be killed with one signal
//! - **Log capture**: Streams the child's stdout and stderr into a single
//!   append-only log file, byte-exact in write-arrival order
//! - **Log following**: Tails the log file live for any number of followers,
//!   each receiving every byte from offset zero exactly once
//! - **Job tracking**: Maps `(user_id, job_id)` to jobs and enforces
//!   per-user ownership on lookup
//!
//! # Components
//!
//! - [`ProcessGroup`]: One child process tree; start, idempotent stop, and a
//!   one-shot completion signal
//! - [`tail::tail_file`]: Watch-and-read file tailer used by followers
//! - [`Job`]: One command invocation; composes a [`ProcessGroup`] with its
//!   log file and publishes terminal status atomically
//! - [`JobStore`]: Concurrent job collection keyed by [`JobKey`]
//!
//! # Execution Flow
//!
//! 1. [`JobStore::add`] creates the job and its log directory
//! 2. [`Job::start`] opens the log file, spawns the process group, and
//!    transitions the job to `Running`
//! 3. A completion task awaits the process group and publishes
//!    `finished_at`, `exit_code`, and the terminal status together
//! 4. [`Job::follow`] attaches a tailer that drains the log to EOF once the
//!    job completes

pub mod job;
pub mod process_group;
pub mod store;
pub mod tail;

pub use job::{Job, JobKey, JobSnapshot, JobStatus};
pub use process_group::ProcessGroup;
pub use store::JobStore;

use std::path::PathBuf;

/// Configuration for the job execution engine.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Root directory under which per-job log directories are created.
    /// Each job writes to `<log_root>/<user_id>/<job_id>/output.log`.
    pub log_root: PathBuf,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            log_root: PathBuf::from("tmp/jobs"),
        }
    }
}

impl WorkerConfig {
    pub fn new(log_root: impl Into<PathBuf>) -> Self {
        Self {
            log_root: log_root.into(),
        }
    }
}

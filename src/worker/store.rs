use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::config::WorkerConfig;
use crate::error::{Result, WorkerError};
use crate::worker::job::{Job, JobKey};

/// Concurrent collection of jobs keyed by (user id, job id).
///
/// Jobs are inserted once and never replaced or removed. Lookups require the
/// exact key pair, so a caller holding someone else's job id gets the same
/// answer as for an unknown id.
#[derive(Debug)]
pub struct JobStore {
    config: WorkerConfig,
    jobs: RwLock<HashMap<JobKey, Arc<Job>>>,
}

impl JobStore {
    pub fn new(config: WorkerConfig) -> Self {
        Self {
            config,
            jobs: RwLock::new(HashMap::new()),
        }
    }

    /// Create a job owned by `user_id`, prepare its log directory, and
    /// insert it into the store. The job is returned with status `Created`;
    /// starting it is a separate step on the job itself.
    pub async fn add(
        &self,
        user_id: String,
        command: String,
        args: Vec<String>,
    ) -> Result<Arc<Job>> {
        let job = Arc::new(Job::new(user_id, command, args, &self.config.log_root));
        tokio::fs::create_dir_all(job.log_dir()).await?;

        let mut jobs = self.jobs.write().await;
        match jobs.entry(job.key.clone()) {
            Entry::Occupied(_) => Err(WorkerError::DuplicateJob(job.key.job_id)),
            Entry::Vacant(slot) => {
                slot.insert(Arc::clone(&job));
                tracing::info!(
                    job_id = %job.key.job_id,
                    user_id = %job.key.user_id,
                    "job added"
                );
                Ok(job)
            }
        }
    }

    /// Look up a job by exact key.
    pub async fn load(&self, key: &JobKey) -> Result<Arc<Job>> {
        let jobs = self.jobs.read().await;
        jobs.get(key)
            .cloned()
            .ok_or_else(|| WorkerError::JobNotFound(key.job_id.to_string()))
    }
}

impl Default for JobStore {
    fn default() -> Self {
        Self::new(WorkerConfig::default())
    }
}

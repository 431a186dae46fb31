use thiserror::Error;

#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("Unable to spawn process: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("Job already started")]
    AlreadyStarted,

    #[error("Job not found: {0}")]
    JobNotFound(String),

    #[error("Job id collision: {0}")]
    DuplicateJob(uuid::Uuid),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Watch error: {0}")]
    Watch(#[from] notify::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, WorkerError>;

pub mod config;
pub mod error;
pub mod worker;

pub use config::WorkerConfig;
pub use error::{Result, WorkerError};

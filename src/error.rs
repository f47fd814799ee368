use thiserror::Error;

use crate::completion::TrackerError;
use crate::config::ConfigError;
use crate::network::NetworkError;
use crate::task_queue::QueueError;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
    #[error("Network error: {0}")]
    Network(#[from] NetworkError),
    #[error("Task queue error: {0}")]
    Queue(#[from] QueueError),
    #[error("Completion tracker error: {0}")]
    Tracker(#[from] TrackerError),
}

pub type NanoResult<T> = Result<T, Error>;

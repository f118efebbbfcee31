use std::io::Error as IoError;

use thiserror::Error;

use crate::config;
use crate::monitoring::CheckError;
use crate::notify::NotifyError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0:#}")]
    Io(#[from] IoError),
    #[error("config: {0}")]
    Config(#[from] config::Error),
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
    #[error("notifier setup failed: {0}")]
    Notify(#[from] NotifyError),
    #[error("{0} test notification(s) failed, see log")]
    TestFailed(usize),
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(
        "{stream} stream stayed full (capacity {capacity}); configure fewer checks or more \
         processing capacity"
    )]
    CapacityExceeded { stream: &'static str, capacity: usize },
    #[error("failed to build check executor: {0}")]
    Executor(#[from] CheckError),
    #[error("failed to build notifier: {0}")]
    Notifier(#[from] NotifyError),
}

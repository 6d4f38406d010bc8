use std::{
    error::Error,
    num::ParseIntError,
};
use thiserror::Error;


/// Failure returned by [`Task::process`](crate::task::Task::process).
#[derive(Debug, Error)]
pub enum TaskError {
    #[error("{0}")]
    Failed(String),
    #[error("{0}")]
    Source(#[source] Box<dyn Error + Send + Sync>),
    /// `process` panicked; the worker caught it and kept running.
    #[error("task panicked: {0}")]
    Panic(String),
}

impl TaskError {
    pub fn failed(msg: impl Into<String>) -> Self {
        TaskError::Failed(msg.into())
    }

    pub fn wrap<E>(err: E) -> Self
    where
        E: Error + Send + Sync + 'static,
    {
        TaskError::Source(Box::new(err))
    }

    pub fn is_panic(&self) -> bool {
        matches!(self, TaskError::Panic(_))
    }
}


/// A task failure as seen on the error sink.
#[derive(Debug, Error)]
#[error("worker {worker_id}: {error}")]
pub struct TaskFailure {
    pub worker_id: usize,
    #[source]
    pub error: TaskError,
}


#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid task queue size {value:?}: {source}")]
    InvalidQueueSize {
        value: String,
        source: ParseIntError,
    },
    #[error("task queue size must be greater than zero")]
    ZeroQueueSize,
}


#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum DispatchError {
    #[error("dispatcher already started")]
    AlreadyStarted,
    #[error("task queue closed")]
    QueueClosed,
    #[error("worker registry full (capacity {capacity})")]
    RegistryFull { capacity: usize },
    #[error("worker registry closed")]
    RegistryClosed,
}

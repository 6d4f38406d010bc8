use super::errors::{DispatchError, TaskError};

pub type TaskResult = Result<(), TaskError>;

pub type DispatchResult<T> = Result<T, DispatchError>;

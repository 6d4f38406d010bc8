//! Bounded worker-pool task dispatcher
//!
//! # Features
//! - Single bounded FIFO submission queue shared by any number of producers
//! - Fixed pool of workers that advertise readiness through a registry
//! - Routing loop that hands each task to the next idle worker
//! - Non-preemptive stop: running tasks always finish
//! - Task failures and panics reported on an error stream, never fatal to the pool

pub mod config;
pub mod dispatcher;
pub mod errors;
pub mod logging;
pub mod model;
pub mod queue;
pub mod registry;
pub mod result;
pub mod task;
pub mod worker;
pub mod workloads;

pub use async_trait::async_trait;
pub use config::{Config, AUTO_SIZE, MIN_WORKERS};
pub use dispatcher::{Dispatcher, ErrorStream};
pub use errors::{DispatchError, TaskError, TaskFailure};
pub use queue::TaskQueue;
pub use result::TaskResult;
pub use task::{BoxedTask, Task};

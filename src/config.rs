use super::errors::ConfigError;


/// Environment variable holding the task queue capacity.
pub const QUEUE_SIZE_ENV: &str = "ASYNC_TASK_QUEUE_SIZE";

pub const DEFAULT_QUEUE_SIZE: usize = 1000;

/// Pool size sentinel: compute the worker count from hardware parallelism.
pub const AUTO_SIZE: usize = 0;

pub const MIN_WORKERS: usize = 2;

pub const DEFAULT_ERROR_BUFFER: usize = 128;


/// Dispatcher configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub num_workers: usize,
    /// Capacity of the error sink. `None` disables it and failures are only logged.
    pub error_buffer: Option<usize>,
    /// Cap on hand-offs waiting for an idle worker. `None` leaves fan-out unbounded.
    pub max_pending_handoffs: Option<usize>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            num_workers: AUTO_SIZE,
            error_buffer: Some(DEFAULT_ERROR_BUFFER),
            max_pending_handoffs: None,
        }
    }
}

impl Config {
    pub fn with_workers(num_workers: usize) -> Self {
        Self {
            num_workers,
            ..Default::default()
        }
    }

    pub fn without_error_sink(mut self) -> Self {
        self.error_buffer = None;
        self
    }

    pub fn bounded_handoffs(mut self, limit: usize) -> Self {
        self.max_pending_handoffs = Some(limit.max(1));
        self
    }

    #[inline]
    pub fn pool_size(&self) -> usize {
        resolve_pool_size(self.num_workers)
    }
}


/// Half the available parallelism, rounded up, never below [`MIN_WORKERS`].
pub fn auto_size() -> usize {
    num_cpus::get().div_ceil(2).max(MIN_WORKERS)
}

pub fn resolve_pool_size(requested: usize) -> usize {
    if requested < MIN_WORKERS {
        return auto_size();
    }
    requested
}


pub fn parse_queue_size(raw: Option<&str>) -> Result<usize, ConfigError> {
    let value = match raw.map(str::trim) {
        None | Some("") => return Ok(DEFAULT_QUEUE_SIZE),
        Some(value) => value,
    };

    match value.parse::<usize>() {
        Ok(0) => Err(ConfigError::ZeroQueueSize),
        Ok(size) => Ok(size),
        Err(source) => Err(ConfigError::InvalidQueueSize {
            value: value.to_string(),
            source,
        }),
    }
}

/// Reads [`QUEUE_SIZE_ENV`]. A malformed value is logged and replaced by
/// [`DEFAULT_QUEUE_SIZE`].
pub fn queue_size_from_env() -> usize {
    let raw = std::env::var(QUEUE_SIZE_ENV).ok();
    parse_queue_size(raw.as_deref()).unwrap_or_else(|err| {
        tracing::warn!(
            env = QUEUE_SIZE_ENV,
            error = %err,
            default = DEFAULT_QUEUE_SIZE,
            "falling back to default task queue size"
        );
        DEFAULT_QUEUE_SIZE
    })
}

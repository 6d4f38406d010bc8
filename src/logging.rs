use super::dispatcher::ErrorStream;
use tokio::task::JoinHandle;
use tracing_subscriber::EnvFilter;


/// Installs a global fmt subscriber filtered by `RUST_LOG` (default `info`).
/// Does nothing if a subscriber is already set.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

/// Drains `errors` until the dispatcher shuts down, logging each failure.
/// Resolves to the number of failures logged.
pub fn spawn_error_logger(mut errors: ErrorStream) -> JoinHandle<usize> {
    tokio::spawn(async move {
        let mut logged = 0;
        while let Some(failure) = errors.recv().await {
            tracing::error!(worker_id = failure.worker_id, error = %failure.error, "task failed");
            logged += 1;
        }
        logged
    })
}

use super::{
    config::Config,
    errors::{DispatchError, TaskFailure},
    logging,
    model::{Counters, DispatcherMetrics},
    queue::TaskQueue,
    registry::WorkerPool,
    result::DispatchResult,
    task::BoxedTask,
    worker::{ErrorSink, Worker},
};
use std::{
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};
use futures::Stream;
use tokio::{
    sync::{mpsc, OwnedSemaphorePermit, Semaphore},
    task::{JoinHandle, JoinSet},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};


/// Read side of the error sink. Ends once every worker has stopped.
pub struct ErrorStream {
    receiver: mpsc::Receiver<TaskFailure>,
}

impl ErrorStream {
    pub async fn recv(&mut self) -> Option<TaskFailure> {
        self.receiver.recv().await
    }
}

impl Stream for ErrorStream {
    type Item = TaskFailure;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().receiver.poll_recv(cx)
    }
}


/// Routes tasks from a [`TaskQueue`] to a fixed pool of workers.
pub struct Dispatcher {
    size: usize,
    queue: TaskQueue,
    pool: Arc<WorkerPool>,
    workers: Vec<Worker>,
    worker_stops: Vec<CancellationToken>,
    router_stop: CancellationToken,
    errors: Option<ErrorSink>,
    error_stream: Option<ErrorStream>,
    handoff_limit: Option<Arc<Semaphore>>,
    counters: Arc<Counters>,
    handles: Vec<JoinHandle<()>>,
    logger: Option<JoinHandle<usize>>,
    started: bool,
}

impl Dispatcher {
    /// `size` below [`MIN_WORKERS`](crate::config::MIN_WORKERS), including
    /// [`AUTO_SIZE`](crate::config::AUTO_SIZE), is replaced by a size derived
    /// from the number of CPUs.
    pub fn new(size: usize, queue: TaskQueue) -> Self {
        Self::with_config(Config::with_workers(size), queue)
    }

    pub fn with_config(config: Config, queue: TaskQueue) -> Self {
        let size = config.pool_size();
        let pool = Arc::new(WorkerPool::new(size));
        let shutdown = CancellationToken::new();
        let counters = Arc::new(Counters::default());

        let (errors, error_stream) = match config.error_buffer {
            Some(buffer) => {
                let (tx, rx) = mpsc::channel(buffer.max(1));
                (Some(tx), Some(ErrorStream { receiver: rx }))
            }
            None => (None, None),
        };

        let workers: Vec<Worker> = (0..size)
            .map(|id| {
                Worker::new(
                    id,
                    pool.clone(),
                    shutdown.child_token(),
                    errors.clone(),
                    counters.clone(),
                )
            })
            .collect();
        let worker_stops = workers.iter().map(Worker::stop_token).collect();

        Self {
            size,
            queue,
            pool,
            workers,
            worker_stops,
            router_stop: shutdown.child_token(),
            errors,
            error_stream,
            handoff_limit: config
                .max_pending_handoffs
                .map(|limit| Arc::new(Semaphore::new(limit))),
            counters,
            handles: Vec::with_capacity(size + 1),
            logger: None,
            started: false,
        }
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Takes the stream of task failures. Call before [`start`](Self::start);
    /// otherwise failures are drained into the log.
    pub fn errors(&mut self) -> Option<ErrorStream> {
        self.error_stream.take()
    }

    /// Starts every worker, then the routing loop. Must run inside a tokio runtime.
    pub fn start(&mut self) -> DispatchResult<()> {
        if self.started {
            return Err(DispatchError::AlreadyStarted);
        }
        self.started = true;

        if let Some(stream) = self.error_stream.take() {
            self.logger = Some(logging::spawn_error_logger(stream));
        }

        for worker in self.workers.drain(..) {
            self.handles.push(worker.start());
        }

        let router = Router {
            queue: self.queue.clone(),
            pool: self.pool.clone(),
            stop: self.router_stop.clone(),
            handoff_limit: self.handoff_limit.clone(),
            counters: self.counters.clone(),
        };
        self.handles.push(tokio::spawn(router.run()));

        info!(workers = self.size, queue_capacity = self.queue.capacity(), "dispatcher started");
        Ok(())
    }

    /// Signals every worker and the routing loop to stop, without waiting.
    ///
    /// Tasks already running finish. The error sink closes once the last
    /// worker has exited.
    pub fn stop(&mut self) {
        if self.router_stop.is_cancelled() {
            return;
        }

        for stop in &self.worker_stops {
            stop.cancel();
        }
        self.router_stop.cancel();
        self.errors.take();
        self.workers.clear();

        info!(workers = self.size, "dispatcher stopping");
    }

    /// Stops the dispatcher and waits for in-flight tasks, pending hand-offs,
    /// the routing loop and the error logger to finish.
    ///
    /// Between [`stop`](Self::stop) and the end of `shutdown`, stopped workers
    /// may still count as idle in [`metrics`](Self::metrics).
    pub async fn shutdown(mut self) -> DispatcherMetrics {
        self.stop();

        for handle in self.handles.drain(..) {
            if let Err(err) = handle.await {
                warn!(error = %err, "dispatcher task ended abnormally");
            }
        }
        self.pool.close();
        let stale = self.pool.drain();
        debug!(stale, "cleared readiness entries of stopped workers");

        if let Some(logger) = self.logger.take() {
            match logger.await {
                Ok(logged) => debug!(logged, "error logger finished"),
                Err(err) => warn!(error = %err, "error logger ended abnormally"),
            }
        }

        self.metrics()
    }

    /// Snapshot of the counters. Under load the individual values are read
    /// at slightly different moments; `failed_tasks` never exceeds
    /// `processed_tasks`.
    pub fn metrics(&self) -> DispatcherMetrics {
        let failed = Counters::load(&self.counters.failed);
        let processed = Counters::load(&self.counters.processed);
        DispatcherMetrics {
            workers: self.size,
            idle_workers: self.pool.idle(),
            queued_tasks: self.queue.len(),
            pending_handoffs: Counters::load(&self.counters.pending_handoffs),
            processed_tasks: processed,
            failed_tasks: failed.min(processed),
            dropped_tasks: Counters::load(&self.counters.dropped),
        }
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        self.stop();
    }
}


struct Router {
    queue: TaskQueue,
    pool: Arc<WorkerPool>,
    stop: CancellationToken,
    handoff_limit: Option<Arc<Semaphore>>,
    counters: Arc<Counters>,
}

impl Router {
    async fn run(self) {
        let mut handoffs = JoinSet::new();

        loop {
            while handoffs.try_join_next().is_some() {}

            let permit = match &self.handoff_limit {
                Some(limit) => tokio::select! {
                    _ = self.stop.cancelled() => break,
                    permit = limit.clone().acquire_owned() => match permit {
                        Ok(permit) => Some(permit),
                        Err(_) => break,
                    },
                },
                None => None,
            };

            let task = tokio::select! {
                _ = self.stop.cancelled() => break,
                task = self.queue.next() => task,
            };
            let Some(task) = task else { break };

            Counters::incr(&self.counters.pending_handoffs);
            handoffs.spawn(hand_off(
                task,
                self.pool.clone(),
                self.stop.clone(),
                self.counters.clone(),
                permit,
            ));
        }

        // Hand-offs end promptly once stopped; wait so their counts are final.
        while let Some(joined) = handoffs.join_next().await {
            if let Err(err) = joined {
                warn!(error = %err, "hand-off ended abnormally");
            }
        }

        debug!("routing loop stopped");
    }
}


/// Waits for an idle worker and gives it `task`. Retries with the next idle
/// worker if the chosen one stopped in the meantime.
async fn hand_off(
    mut task: BoxedTask,
    pool: Arc<WorkerPool>,
    stop: CancellationToken,
    counters: Arc<Counters>,
    _permit: Option<OwnedSemaphorePermit>,
) {
    loop {
        let intake = tokio::select! {
            _ = stop.cancelled() => Err(DispatchError::RegistryClosed),
            intake = pool.acquire() => intake,
        };

        let intake = match intake {
            Ok(intake) => intake,
            Err(err) => {
                Counters::incr(&counters.dropped);
                warn!(error = %err, "dispatcher stopped before task reached a worker, task dropped");
                break;
            }
        };

        let worker_id = intake.worker_id();
        match intake.deliver(task) {
            Ok(()) => break,
            Err(returned) => {
                debug!(worker_id, "worker no longer accepting tasks, rerouting");
                task = returned;
            }
        }
    }

    Counters::decr(&counters.pending_handoffs);
}

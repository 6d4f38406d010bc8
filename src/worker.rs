use super::{
    errors::{TaskError, TaskFailure},
    model::Counters,
    registry::{Intake, WorkerPool},
    task::BoxedTask,
};
use std::{panic::AssertUnwindSafe, sync::Arc};
use futures::FutureExt;
use tokio::{
    sync::mpsc,
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, trace, warn};


pub type ErrorSink = mpsc::Sender<TaskFailure>;


/// Executes one task at a time, advertising readiness between tasks.
pub struct Worker {
    id: usize,
    intake_tx: mpsc::Sender<BoxedTask>,
    intake_rx: mpsc::Receiver<BoxedTask>,
    pool: Arc<WorkerPool>,
    stop: CancellationToken,
    errors: Option<ErrorSink>,
    counters: Arc<Counters>,
}

impl Worker {
    pub(crate) fn new(
        id: usize,
        pool: Arc<WorkerPool>,
        stop: CancellationToken,
        errors: Option<ErrorSink>,
        counters: Arc<Counters>,
    ) -> Self {
        let (intake_tx, intake_rx) = mpsc::channel(1);
        Self {
            id,
            intake_tx,
            intake_rx,
            pool,
            stop,
            errors,
            counters,
        }
    }

    /// Token that stops this worker once it is idle.
    pub(crate) fn stop_token(&self) -> CancellationToken {
        self.stop.clone()
    }

    pub(crate) fn start(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    async fn run(mut self) {
        debug!(worker_id = self.id, "worker started");

        while !self.stop.is_cancelled() {
            let intake = Intake::new(self.id, self.intake_tx.clone());
            if let Err(err) = self.pool.register(intake) {
                error!(worker_id = self.id, error = %err, "worker could not advertise readiness");
                break;
            }

            let task = tokio::select! {
                biased;
                task = self.intake_rx.recv() => task,
                _ = self.stop.cancelled() => {
                    // A task delivered before the close still runs.
                    self.intake_rx.close();
                    if let Some(task) = self.intake_rx.recv().await {
                        self.execute(task).await;
                    }
                    break;
                }
            };

            match task {
                Some(task) => self.execute(task).await,
                None => break,
            }
        }

        debug!(worker_id = self.id, "worker stopped");
    }

    async fn execute(&mut self, mut task: BoxedTask) {
        trace!(worker_id = self.id, "processing task");

        let outcome = AssertUnwindSafe(task.process())
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| Err(TaskError::Panic(panic_message(panic))));

        Counters::incr(&self.counters.processed);
        if let Err(error) = outcome {
            Counters::incr(&self.counters.failed);
            self.report(error).await;
        }
    }

    async fn report(&mut self, error: TaskError) {
        let failure = TaskFailure {
            worker_id: self.id,
            error,
        };

        match &self.errors {
            Some(sink) => {
                if let Err(mpsc::error::SendError(failure)) = sink.send(failure).await {
                    warn!(worker_id = self.id, error = %failure.error, "error sink closed, dropping task failure");
                }
            }
            None => error!(worker_id = self.id, error = %failure.error, "task failed"),
        }
    }
}


fn panic_message(panic: Box<dyn std::any::Any + Send>) -> String {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        return msg.to_string();
    }
    if let Some(msg) = panic.downcast_ref::<String>() {
        return msg.clone();
    }
    "non-string panic payload".to_string()
}

use super::{
    errors::DispatchError,
    result::DispatchResult,
    task::BoxedTask,
};
use crossbeam::queue::ArrayQueue;
use tokio::sync::{mpsc, Semaphore};


/// A worker's intake point for one readiness cycle.
#[derive(Debug)]
pub struct Intake {
    worker_id: usize,
    sender: mpsc::Sender<BoxedTask>,
}

impl Intake {
    pub(crate) fn new(worker_id: usize, sender: mpsc::Sender<BoxedTask>) -> Self {
        Self { worker_id, sender }
    }

    #[inline]
    pub fn worker_id(&self) -> usize {
        self.worker_id
    }

    /// Hands `task` to the worker, or gives it back if the worker has stopped.
    pub fn deliver(self, task: BoxedTask) -> Result<(), BoxedTask> {
        self.sender.try_send(task).map_err(|err| err.into_inner())
    }
}


/// Readiness registry: idle workers park their intake here, the router takes
/// one out per task.
///
/// Permits on the semaphore always match the entries in the queue, so a
/// successful `acquire` is guaranteed to find an entry and no two acquirers
/// ever get the same one.
pub struct WorkerPool {
    ready: ArrayQueue<Intake>,
    available: Semaphore,
}

impl WorkerPool {
    pub fn new(capacity: usize) -> Self {
        Self {
            ready: ArrayQueue::new(capacity),
            available: Semaphore::new(0),
        }
    }

    pub fn register(&self, intake: Intake) -> DispatchResult<()> {
        if self.available.is_closed() {
            return Err(DispatchError::RegistryClosed);
        }
        self.ready.push(intake).map_err(|_| DispatchError::RegistryFull {
            capacity: self.ready.capacity(),
        })?;
        self.available.add_permits(1);
        Ok(())
    }

    pub async fn acquire(&self) -> DispatchResult<Intake> {
        let permit = self
            .available
            .acquire()
            .await
            .map_err(|_| DispatchError::RegistryClosed)?;
        permit.forget();
        self.ready.pop().ok_or(DispatchError::RegistryClosed)
    }

    /// Wakes every pending `acquire` with [`DispatchError::RegistryClosed`].
    pub fn close(&self) {
        self.available.close();
    }

    /// Removes every parked intake, returning how many there were.
    pub fn drain(&self) -> usize {
        let mut drained = 0;
        while self.ready.pop().is_some() {
            drained += 1;
        }
        drained
    }

    #[inline]
    pub fn idle(&self) -> usize {
        self.ready.len()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.ready.capacity()
    }
}

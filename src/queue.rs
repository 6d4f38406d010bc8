use super::{
    config,
    errors::DispatchError,
    result::DispatchResult,
    task::{BoxedTask, Task},
};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};


/// Bounded FIFO submission point shared by producers and dispatchers.
///
/// Cloning is cheap; every clone refers to the same channel. Submitting waits
/// while the queue is full, which is the only backpressure in the system.
#[derive(Clone)]
pub struct TaskQueue {
    sender: mpsc::Sender<BoxedTask>,
    receiver: Arc<Mutex<mpsc::Receiver<BoxedTask>>>,
    capacity: usize,
}

impl TaskQueue {
    /// # Panics
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        let (sender, receiver) = mpsc::channel(capacity);
        Self {
            sender,
            receiver: Arc::new(Mutex::new(receiver)),
            capacity,
        }
    }

    /// Capacity taken from `ASYNC_TASK_QUEUE_SIZE`, default 1000.
    pub fn from_env() -> Self {
        Self::new(config::queue_size_from_env())
    }

    pub async fn submit<T>(&self, task: T) -> DispatchResult<()>
    where
        T: Task + 'static,
    {
        self.submit_boxed(Box::new(task)).await
    }

    pub async fn submit_boxed(&self, task: BoxedTask) -> DispatchResult<()> {
        self.sender
            .send(task)
            .await
            .map_err(|_| DispatchError::QueueClosed)
    }

    /// Enqueue from synchronous code. Must not be called from inside the runtime.
    pub fn blocking_submit<T>(&self, task: T) -> DispatchResult<()>
    where
        T: Task + 'static,
    {
        self.sender
            .blocking_send(Box::new(task))
            .map_err(|_| DispatchError::QueueClosed)
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of tasks waiting to be dequeued.
    #[inline]
    pub fn len(&self) -> usize {
        self.capacity - self.sender.capacity()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) async fn next(&self) -> Option<BoxedTask> {
        self.receiver.lock().await.recv().await
    }
}

impl Default for TaskQueue {
    fn default() -> Self {
        Self::from_env()
    }
}

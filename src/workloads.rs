//! Sample workloads used by the demo binary, tests and benchmarks.

use super::{
    errors::TaskError,
    result::TaskResult,
    task::Task,
};
use std::sync::{
    atomic::{AtomicU64, AtomicUsize, Ordering},
    Arc,
};
use async_trait::async_trait;
use rand::Rng;
use tokio::{sync::Notify, time::Duration};


/// Counts outstanding tasks; `wait` resolves once all have called `done`.
#[derive(Clone, Default)]
pub struct Latch {
    counter: Arc<AtomicUsize>,
    notify: Arc<Notify>,
}

impl Latch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, n: usize) {
        self.counter.fetch_add(n, Ordering::AcqRel);
    }

    pub fn done(&self) {
        if self.counter.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.notify.notify_waiters();
        }
    }

    pub fn pending(&self) -> usize {
        self.counter.load(Ordering::Acquire)
    }

    pub async fn wait(&self) {
        loop {
            let notified = self.notify.notified();
            if self.pending() == 0 {
                return;
            }
            notified.await;
        }
    }

    pub async fn wait_timeout(&self, dur: Duration) -> bool {
        tokio::time::timeout(dur, self.wait()).await.is_ok()
    }
}


/// Simulates a short I/O call, then adds `value` to a shared total.
pub struct CounterTask {
    pub value: u64,
    pub total: Arc<AtomicU64>,
    pub latch: Latch,
    /// Upper bound of the random delay, in milliseconds.
    pub jitter_ms: u64,
}

impl CounterTask {
    pub fn new(value: u64, total: Arc<AtomicU64>, latch: Latch) -> Self {
        Self {
            value,
            total,
            latch,
            jitter_ms: 0,
        }
    }

    pub fn with_jitter(mut self, jitter_ms: u64) -> Self {
        self.jitter_ms = jitter_ms;
        self
    }
}

#[async_trait]
impl Task for CounterTask {
    async fn process(&mut self) -> TaskResult {
        if self.jitter_ms > 0 {
            let delay = rand::thread_rng().gen_range(0..=self.jitter_ms);
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        self.total.fetch_add(self.value, Ordering::SeqCst);
        self.latch.done();
        Ok(())
    }
}


/// Succeeds, or fails with a descriptive error when `fail` is set.
pub struct FlakyTask {
    pub id: usize,
    pub fail: bool,
    pub latch: Latch,
}

#[async_trait]
impl Task for FlakyTask {
    async fn process(&mut self) -> TaskResult {
        self.latch.done();
        if self.fail {
            return Err(TaskError::failed(format!("flaky task {} failed", self.id)));
        }
        Ok(())
    }
}

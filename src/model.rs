use std::sync::atomic::{AtomicUsize, Ordering};


#[derive(Debug, Clone)]
pub struct DispatcherMetrics {
    pub workers: usize,
    pub idle_workers: usize,
    pub queued_tasks: usize,
    pub pending_handoffs: usize,
    pub processed_tasks: usize,
    pub failed_tasks: usize,
    pub dropped_tasks: usize,
}

impl DispatcherMetrics {
    pub fn utilization(&self) -> f64 {
        if self.workers == 0 {
            return 0.0;
        }
        let busy = self.workers.saturating_sub(self.idle_workers);
        busy as f64 / self.workers as f64
    }

    pub fn success_rate(&self) -> f64 {
        if self.processed_tasks == 0 {
            return 1.0;
        }
        self.processed_tasks.saturating_sub(self.failed_tasks) as f64 / self.processed_tasks as f64
    }
}


/// Shared counters updated by the router and the workers.
#[derive(Debug, Default)]
pub(crate) struct Counters {
    pub pending_handoffs: AtomicUsize,
    pub processed: AtomicUsize,
    pub failed: AtomicUsize,
    pub dropped: AtomicUsize,
}

impl Counters {
    #[inline]
    pub fn load(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn incr(counter: &AtomicUsize) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn decr(counter: &AtomicUsize) {
        counter.fetch_sub(1, Ordering::Relaxed);
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(processed_tasks: usize, failed_tasks: usize) -> DispatcherMetrics {
        DispatcherMetrics {
            workers: 4,
            idle_workers: 1,
            queued_tasks: 0,
            pending_handoffs: 0,
            processed_tasks,
            failed_tasks,
            dropped_tasks: 0,
        }
    }

    #[test]
    fn success_rate_handles_torn_snapshot() {
        assert_eq!(snapshot(3, 5).success_rate(), 0.0);
        assert_eq!(snapshot(4, 1).success_rate(), 0.75);
        assert_eq!(snapshot(0, 0).success_rate(), 1.0);
    }

    #[test]
    fn utilization_counts_busy_workers() {
        assert_eq!(snapshot(0, 0).utilization(), 0.75);
    }
}

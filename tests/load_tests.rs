#[cfg(test)]
mod tests {
    use async_dispatch::{
        config::Config,
        result::TaskResult,
        task::Task,
        workloads::{CounterTask, FlakyTask, Latch},
        Dispatcher,
        TaskQueue,
    };
    use async_trait::async_trait;
    use std::{
        future::Future,
        sync::{
            atomic::{AtomicU64, AtomicUsize, Ordering},
            Arc,
        },
        time::{Duration, Instant},
    };

    async fn measure<F, Fut, T>(name: &str, f: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let start = Instant::now();
        let result = f().await;
        println!("✓ {}: {:?}", name, start.elapsed());
        result
    }

    /// Tracks how many tasks run `process` at the same moment.
    struct GaugeTask {
        active: Arc<AtomicUsize>,
        peak: Arc<AtomicUsize>,
        latch: Latch,
    }

    #[async_trait]
    impl Task for GaugeTask {
        async fn process(&mut self) -> TaskResult {
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(2)).await;
            self.active.fetch_sub(1, Ordering::SeqCst);
            self.latch.done();
            Ok(())
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn load_test_1_concurrency_never_exceeds_pool_size() {
        println!("\n=== LOAD TEST 1: burst of 500 tasks over 4 workers ===");
        let queue = TaskQueue::new(1000);
        let mut dispatcher = Dispatcher::new(4, queue.clone());
        dispatcher.start().unwrap();

        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let latch = Latch::new();

        let (queue_ref, active_ref, peak_ref, latch_ref) = (&queue, &active, &peak, &latch);
        measure("500 tasks @ 2ms", || async move {
            for _ in 0..500 {
                latch_ref.add(1);
                queue_ref
                    .submit(GaugeTask {
                        active: active_ref.clone(),
                        peak: peak_ref.clone(),
                        latch: latch_ref.clone(),
                    })
                    .await
                    .unwrap();
            }
            assert!(latch_ref.wait_timeout(Duration::from_secs(30)).await);
        })
        .await;

        let peak = peak.load(Ordering::SeqCst);
        println!("  Peak concurrency: {}", peak);
        assert!(peak <= 4, "peak {} exceeds pool size", peak);
        assert!(peak >= 1);

        let metrics = dispatcher.metrics();
        println!("  Utilization after burst: {:.1}%", metrics.utilization() * 100.0);
        assert!(metrics.utilization() <= 1.0);

        let metrics = dispatcher.shutdown().await;
        assert_eq!(metrics.processed_tasks, 500);
        assert_eq!(metrics.success_rate(), 1.0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn load_test_2_many_producers_no_task_lost() {
        println!("\n=== LOAD TEST 2: 8 producers x 1000 tasks ===");
        let queue = TaskQueue::new(1000);
        let mut dispatcher = Dispatcher::new(6, queue.clone());
        dispatcher.start().unwrap();

        let total = Arc::new(AtomicU64::new(0));
        let latch = Latch::new();
        latch.add(8 * 1000);

        let (queue_ref, total_ref, latch_ref) = (&queue, &total, &latch);
        measure("8k tasks from 8 producers", || async move {
            let producers: Vec<_> = (0..8)
                .map(|_| {
                    let queue = queue_ref.clone();
                    let total = total_ref.clone();
                    let latch = latch_ref.clone();
                    tokio::spawn(async move {
                        for value in 1..=1000u64 {
                            queue
                                .submit(CounterTask::new(value, total.clone(), latch.clone()))
                                .await
                                .unwrap();
                        }
                    })
                })
                .collect();
            for producer in producers {
                producer.await.unwrap();
            }
            assert!(latch_ref.wait_timeout(Duration::from_secs(30)).await);
        })
        .await;

        assert_eq!(total.load(Ordering::SeqCst), 8 * 500_500);
        let metrics = dispatcher.shutdown().await;
        assert_eq!(metrics.processed_tasks, 8000);
        assert_eq!(metrics.dropped_tasks, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn load_test_3_small_queue_backpressure() {
        println!("\n=== LOAD TEST 3: 2k tasks through a queue of 8 ===");
        let queue = TaskQueue::new(8);
        let mut dispatcher = Dispatcher::new(2, queue.clone());
        dispatcher.start().unwrap();

        let total = Arc::new(AtomicU64::new(0));
        let latch = Latch::new();
        let (queue_ref, total_ref, latch_ref) = (&queue, &total, &latch);
        measure("2k tasks, capacity 8", || async move {
            for value in 0..2000u64 {
                latch_ref.add(1);
                queue_ref
                    .submit(CounterTask::new(value, total_ref.clone(), latch_ref.clone()))
                    .await
                    .unwrap();
                assert!(queue_ref.len() <= queue_ref.capacity());
            }
            assert!(latch_ref.wait_timeout(Duration::from_secs(30)).await);
        })
        .await;

        assert_eq!(total.load(Ordering::SeqCst), (0..2000u64).sum::<u64>());
        dispatcher.shutdown().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn load_test_4_bounded_handoffs() {
        println!("\n=== LOAD TEST 4: hand-off fan-out capped at 3 ===");
        let queue = TaskQueue::new(1000);
        let config = Config::with_workers(2).bounded_handoffs(3);
        let mut dispatcher = Dispatcher::with_config(config, queue.clone());
        dispatcher.start().unwrap();

        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let latch = Latch::new();
        for _ in 0..200 {
            latch.add(1);
            queue
                .submit(GaugeTask {
                    active: active.clone(),
                    peak: peak.clone(),
                    latch: latch.clone(),
                })
                .await
                .unwrap();
        }

        let mut max_pending = 0;
        while !latch.wait_timeout(Duration::from_millis(1)).await {
            max_pending = max_pending.max(dispatcher.metrics().pending_handoffs);
        }
        println!("  Max pending hand-offs observed: {}", max_pending);
        assert!(max_pending <= 3);
        assert!(peak.load(Ordering::SeqCst) <= 2);

        let metrics = dispatcher.shutdown().await;
        assert_eq!(metrics.processed_tasks, 200);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn load_test_5_two_dispatchers_share_a_queue() {
        println!("\n=== LOAD TEST 5: two dispatchers, one queue ===");
        let queue = TaskQueue::new(100);
        let mut first = Dispatcher::new(2, queue.clone());
        let mut second = Dispatcher::new(2, queue.clone());
        first.start().unwrap();
        second.start().unwrap();

        let latch = Latch::new();
        for id in 0..1000 {
            latch.add(1);
            queue
                .submit(FlakyTask { id, fail: false, latch: latch.clone() })
                .await
                .unwrap();
        }
        assert!(latch.wait_timeout(Duration::from_secs(30)).await);

        let a = first.shutdown().await;
        let b = second.shutdown().await;
        println!("  first: {}, second: {}", a.processed_tasks, b.processed_tasks);
        assert_eq!(a.processed_tasks + b.processed_tasks, 1000);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn load_test_6_metrics_consistent_under_failures() {
        println!("\n=== LOAD TEST 6: metrics snapshots while tasks fail ===");
        let queue = TaskQueue::new(1000);
        let config = Config::with_workers(6).without_error_sink();
        let mut dispatcher = Dispatcher::with_config(config, queue.clone());
        dispatcher.start().unwrap();

        let latch = Latch::new();
        latch.add(20_000);
        let producer = {
            let queue = queue.clone();
            let latch = latch.clone();
            tokio::spawn(async move {
                for id in 0..20_000 {
                    queue
                        .submit(FlakyTask { id, fail: true, latch: latch.clone() })
                        .await
                        .unwrap();
                }
            })
        };

        let mut snapshots = 0;
        while latch.pending() > 0 {
            let metrics = dispatcher.metrics();
            assert!(metrics.failed_tasks <= metrics.processed_tasks);
            let rate = metrics.success_rate();
            assert!((0.0..=1.0).contains(&rate), "success rate {} out of range", rate);
            snapshots += 1;
            tokio::task::yield_now().await;
        }
        producer.await.unwrap();
        println!("  Snapshots taken: {}", snapshots);

        let metrics = dispatcher.shutdown().await;
        assert_eq!(metrics.processed_tasks, 20_000);
        assert_eq!(metrics.failed_tasks, 20_000);
        assert_eq!(metrics.success_rate(), 0.0);
    }
}

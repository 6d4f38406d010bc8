use async_dispatch::{
    logging,
    workloads::{CounterTask, FlakyTask, Latch},
    Dispatcher,
    TaskQueue,
    AUTO_SIZE,
};
use std::{
    sync::{atomic::{AtomicU64, Ordering}, Arc},
    time::Instant,
};


#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    logging::init_tracing();

    let now = Instant::now();
    let queue = TaskQueue::from_env();
    let mut dispatcher = Dispatcher::new(AUTO_SIZE, queue.clone());
    let errors = dispatcher.errors();
    dispatcher.start()?;
    let error_logger = errors.map(logging::spawn_error_logger);

    let total = Arc::new(AtomicU64::new(0));
    let latch = Latch::new();

    for value in 1..=10 {
        latch.add(1);
        queue
            .submit(CounterTask::new(value, total.clone(), latch.clone()).with_jitter(100))
            .await?;
    }
    for id in 0..4 {
        latch.add(1);
        queue.submit(FlakyTask { id, fail: id % 2 == 1, latch: latch.clone() }).await?;
    }

    latch.wait().await;
    let metrics = dispatcher.shutdown().await;

    let failures = match error_logger {
        Some(handle) => handle.await?,
        None => 0,
    };

    println!("sum: {}", total.load(Ordering::SeqCst));
    println!(
        "workers: {}, processed: {}, failed: {}, logged failures: {}, success rate: {:.1}%",
        metrics.workers,
        metrics.processed_tasks,
        metrics.failed_tasks,
        failures,
        metrics.success_rate() * 100.0
    );
    println!("elapsed: {:?}", now.elapsed());
    Ok(())
}

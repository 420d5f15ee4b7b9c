//! Polling ingestion feeding a bounded-parallel executor.
//!
//! A pool of fetchers drains a simulated remote queue into a backpressured
//! buffer; the executor consumes the buffer with 4-way parallelism. The
//! pool grows while the queue is deep and reaps fetchers once it runs dry.
//!
//! ```bash
//! cargo run --example polling_pipeline --features logging
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use taskpool::{
    execute, BufferConfig, ExecutorConfig, Fetch, LogSubscriber, PollingBuffer, PollingRunner,
    PoolConfig, Runner, Source, SpawnFn, TaskError,
};
use tokio::time::sleep;

/// Fetcher against a simulated remote queue.
struct QueueTail {
    remaining: Arc<AtomicU64>,
}

#[async_trait]
impl Runner for QueueTail {
    async fn quit(&self) -> Result<(), TaskError> {
        println!("fetcher disconnected");
        Ok(())
    }
}

#[async_trait]
impl PollingRunner for QueueTail {
    type Item = u64;

    async fn fetch(&self) -> Result<Fetch<u64>, TaskError> {
        sleep(Duration::from_millis(10)).await;
        match self
            .remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        {
            Ok(n) => Ok(Fetch::one(n)),
            Err(_) => Ok(Fetch::Timeout),
        }
    }
}

#[tokio::main]
async fn main() {
    let remaining = Arc::new(AtomicU64::new(500));

    let factory = {
        let remaining = Arc::clone(&remaining);
        SpawnFn::arc(move || {
            let remaining = Arc::clone(&remaining);
            async move {
                println!("fetcher connected");
                Ok(QueueTail { remaining })
            }
        })
    };
    let buffer = PollingBuffer::new(
        factory,
        PoolConfig {
            min_instances: 1,
            max_instances: 4,
            ..Default::default()
        },
        BufferConfig { max_size: 32 },
    );
    LogSubscriber::attach_pool(buffer.pool());

    let handle = execute(
        Source::<u64>::stream(buffer.stream()),
        |msg, _| async move {
            sleep(Duration::from_millis(5)).await;
            Ok::<_, TaskError>(msg)
        },
        ExecutorConfig {
            parallel: 4,
            store_output: false,
            ..Default::default()
        },
    );

    // Shut the pipeline down once the queue is dry.
    while remaining.load(Ordering::SeqCst) > 0 {
        sleep(Duration::from_millis(50)).await;
    }
    buffer.quit().await;

    let report = handle.await.expect("pipeline should finish cleanly");
    println!("processed {} messages", report.fulfilled);
}

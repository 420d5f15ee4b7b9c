//! Bounded-parallel execution over an eager input set.
//!
//! Runs 12 "downloads" with at most 3 in flight, one of which fails, and
//! prints the aggregated report.
//!
//! ```bash
//! cargo run --example bounded_parallel
//! ```

use std::time::Duration;

use taskpool::{execute, ExecutorConfig, Source, TaskError};
use tokio::time::sleep;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let handle = execute(
        Source::<u32>::iter(1..=12),
        |n, _| async move {
            sleep(Duration::from_millis(50 + u64::from(n) * 5)).await;
            if n == 7 {
                return Err(TaskError::fail(format!("download {n} refused")));
            }
            println!("downloaded {n}");
            Ok(n * 100)
        },
        ExecutorConfig {
            parallel: 3,
            fail_on_error: false,
            ..Default::default()
        },
    );

    let report = handle.await.expect("fail_on_error is off");
    println!(
        "fulfilled={} errors={} bytes={}",
        report.fulfilled,
        report.errors.len(),
        report.results.iter().sum::<u32>(),
    );
}

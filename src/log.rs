//! Built-in event logger (demo/reference only).
//!
//! Enabled via the `logging` feature. Subscribes to a pool's or buffer's
//! bus and prints every notification to stdout. Useful for demos and
//! debugging; real deployments attach their own subscribers.

use crate::buffer::AsyncBuffer;
use crate::events::{BufferEventKind, PoolEventKind};
use crate::pool::ScalingPool;
use crate::runners::Runner;

/// Prints pool/buffer notifications to stdout.
pub struct LogSubscriber;

impl LogSubscriber {
    /// Spawns a task printing this pool's events until the pool is dropped.
    pub fn attach_pool<R: Runner>(pool: &ScalingPool<R>) {
        let mut rx = pool.subscribe();
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(ev) => match ev.kind {
                        PoolEventKind::Available => println!("[available] seq={}", ev.seq),
                        PoolEventKind::Released => println!("[released] seq={}", ev.seq),
                        PoolEventKind::Scale { instances } => {
                            println!("[scale] instances={instances}");
                        }
                        PoolEventKind::Usage {
                            utilization,
                            instances,
                        } => println!("[usage] utilization={utilization:.2} instances={instances}"),
                        PoolEventKind::Error { label, reason } => {
                            println!("[error] label={label} reason={reason}");
                        }
                    },
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                }
            }
        });
    }

    /// Spawns a task printing this buffer's events until the buffer is dropped.
    pub fn attach_buffer<T: Send + 'static>(buffer: &AsyncBuffer<T>) {
        let mut rx = buffer.subscribe();
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(ev) => match ev.kind {
                        BufferEventKind::Push { len } => println!("[push] len={len}"),
                        BufferEventKind::Pop { len } => println!("[pop] len={len}"),
                        BufferEventKind::Scale { instances } => {
                            println!("[scale] instances={instances}");
                        }
                        BufferEventKind::Error { label, reason } => {
                            println!("[error] label={label} reason={reason}");
                        }
                    },
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                }
            }
        });
    }
}

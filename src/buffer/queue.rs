//! # AsyncBuffer: bounded FIFO with asynchronous push/pop.
//!
//! A size-bounded queue whose ends suspend instead of failing: `push` waits
//! while the buffer is full, `pop` waits while it is empty. Shutdown drains:
//! after [`quit`](AsyncBuffer::quit) begins, no new items are accepted, every
//! remaining item is still handed out, and once empty all poppers receive
//! `None`.
//!
//! ## Architecture
//! ```text
//!            space permits (free slots)        items permits (queued)
//! push ──► acquire space ──► VecDeque ──► add item permit
//! pop  ──► acquire items ──◄ VecDeque ──► add space permit
//!
//! quit ──► running=false ──► close space (pushes fail)
//!       ──► wait drained  ──► close items (pops yield None)
//! ```
//!
//! ## Rules
//! - Size is in `[0, max_size]` at every observation point.
//! - Element order is strict FIFO; waiters are served fairly (tokio
//!   semaphores queue acquirers in FIFO order).
//! - `push` after quit fails with [`BufferError::Closed`], including pushes
//!   that were already suspended on a full buffer.
//! - `pop` after quit keeps yielding until the buffer is drained, then
//!   returns `None` forever.
//! - `quit` is idempotent; concurrent calls all resolve once drained.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::{Notify, Semaphore};

use crate::config::BufferConfig;
use crate::error::BufferError;
use crate::events::{Bus, BufferEvent, BufferEventKind};

/// Bounded FIFO with asynchronous push/pop and drain-on-quit shutdown.
///
/// The buffer is a cheaply clonable handle; all clones share one queue.
///
/// ## Example
/// ```rust
/// use taskpool::{AsyncBuffer, BufferConfig};
///
/// #[tokio::main(flavor = "current_thread")]
/// async fn main() {
///     let buf = AsyncBuffer::new(BufferConfig { max_size: 2 });
///     buf.push(1u32).await.unwrap();
///     buf.push(2).await.unwrap();
///     assert_eq!(buf.pop().await, Some(1));
///     assert_eq!(buf.pop().await, Some(2));
///     buf.quit().await;
///     assert_eq!(buf.pop().await, None);
/// }
/// ```
pub struct AsyncBuffer<T> {
    inner: Arc<Inner<T>>,
}

struct Inner<T> {
    max_size: usize,
    queue: Mutex<VecDeque<T>>,
    /// Cleared under the queue lock when quit begins.
    running: AtomicBool,
    /// One permit per queued item; closed once quit has drained.
    items: Semaphore,
    /// One permit per free slot; closed when quit begins.
    space: Semaphore,
    /// Signaled whenever a pop empties the queue.
    drained: Notify,
    bus: Bus<BufferEventKind>,
}

impl<T> Clone for AsyncBuffer<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Send + 'static> AsyncBuffer<T> {
    /// Creates an empty buffer with the given capacity.
    pub fn new(cfg: BufferConfig) -> Self {
        let max_size = cfg.max_size_clamped();
        Self {
            inner: Arc::new(Inner {
                max_size,
                queue: Mutex::new(VecDeque::with_capacity(max_size)),
                running: AtomicBool::new(true),
                items: Semaphore::new(0),
                space: Semaphore::new(max_size),
                drained: Notify::new(),
                bus: Bus::new(64),
            }),
        }
    }

    /// Appends an item, suspending while the buffer is full.
    ///
    /// Fails with [`BufferError::Closed`] once quit has been initiated,
    /// whether the call arrives after quit or was suspended across it.
    pub async fn push(&self, item: T) -> Result<(), BufferError> {
        if !self.inner.running.load(Ordering::Acquire) {
            return Err(BufferError::Closed);
        }
        let permit = self
            .inner
            .space
            .acquire()
            .await
            .map_err(|_| BufferError::Closed)?;
        permit.forget();

        let len = {
            let mut queue = self.lock_queue();
            // Quit may have begun while this push waited for space.
            if !self.inner.running.load(Ordering::Acquire) {
                return Err(BufferError::Closed);
            }
            queue.push_back(item);
            queue.len()
        };
        self.inner.items.add_permits(1);
        self.inner.bus.publish(BufferEventKind::Push { len });
        Ok(())
    }

    /// Removes the oldest item, suspending while the buffer is empty and
    /// running. Returns `None` once the buffer has quit and drained.
    pub async fn pop(&self) -> Option<T> {
        match self.inner.items.acquire().await {
            Ok(permit) => {
                permit.forget();
                let (item, len) = {
                    let mut queue = self.lock_queue();
                    let item = queue.pop_front();
                    (item, queue.len())
                };
                // One item permit always corresponds to one queued item.
                let item = item?;
                self.inner.space.add_permits(1);
                self.inner.bus.publish(BufferEventKind::Pop { len });
                if len == 0 {
                    self.inner.drained.notify_waiters();
                }
                Some(item)
            }
            // Closed after drain: the terminal signal.
            Err(_) => None,
        }
    }

    /// Shuts the buffer down: stops accepting pushes, waits until every
    /// queued item has been popped, then wakes all poppers with `None`.
    ///
    /// Idempotent; concurrent calls all resolve once drained.
    pub async fn quit(&self) {
        {
            let _queue = self.lock_queue();
            self.inner.running.store(false, Ordering::Release);
        }
        self.inner.space.close();
        self.wait_empty().await;
        self.inner.items.close();
    }

    /// Resolves once the queue is momentarily empty.
    ///
    /// With pushes still possible this is a point-in-time observation; after
    /// quit has closed the push side it is terminal.
    pub async fn wait_empty(&self) {
        loop {
            let notified = self.inner.drained.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.lock_queue().is_empty() {
                return;
            }
            notified.await;
        }
    }

    /// Resolves once the buffer has a free slot (or errs once quit began).
    ///
    /// The slot is not reserved; a racing producer may take it, in which
    /// case a subsequent `push` suspends as usual.
    pub async fn wait_not_full(&self) -> Result<(), BufferError> {
        match self.inner.space.acquire().await {
            Ok(_permit) => Ok(()),
            Err(_) => Err(BufferError::Closed),
        }
    }

    /// Consumes the buffer as a lazy stream, ending after quit drains.
    pub fn stream(&self) -> impl futures::Stream<Item = T> + Send + 'static {
        futures::stream::unfold(self.clone(), |buf| async move {
            buf.pop().await.map(|item| (item, buf))
        })
    }

    /// Current number of queued items.
    pub fn len(&self) -> usize {
        self.lock_queue().len()
    }

    /// Returns true if no items are queued.
    pub fn is_empty(&self) -> bool {
        self.lock_queue().is_empty()
    }

    /// Configured capacity.
    pub fn max_size(&self) -> usize {
        self.inner.max_size
    }

    /// Returns false once quit has been initiated.
    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::Acquire)
    }

    /// Subscribes to push/pop/scale/error notifications.
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<BufferEvent> {
        self.inner.bus.subscribe()
    }

    /// Bus handle for composed components (the polling adapter republishes
    /// its scale/error notifications here).
    pub(crate) fn bus(&self) -> Bus<BufferEventKind> {
        self.inner.bus.clone()
    }

    /// Queue access that survives a poisoned lock (a panicking holder leaves
    /// the queue itself consistent — all mutations are single calls).
    fn lock_queue(&self) -> MutexGuard<'_, VecDeque<T>> {
        self.inner
            .queue
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

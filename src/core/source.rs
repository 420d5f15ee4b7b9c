//! # Source: the input shapes an executor run accepts.
//!
//! A run can be fed from several syntactic shapes — an eager collection, an
//! async stream, a deferred future resolving to either, a source bundled
//! with an `init` value threaded into jobs and teardown, or a producer
//! closure returning any of the above. [`Source`] encodes the union as a
//! tagged variant; [`Source::resolve`] normalizes it — in one place — to a
//! single fallible stream plus the optional init.
//!
//! ```text
//! Items ───────────────┐
//! Stream ──────────────┤
//! Deferred(→ Source) ──┼──► resolve() ──► (BoxStream<Result<T>>, Option<Arc<I>>)
//! WithInit{src, init} ─┤
//! Produce(fn → src) ───┘
//! ```
//!
//! ## Rules
//! - `Deferred` and `Produce` may nest arbitrarily; resolution loops until a
//!   terminal shape is reached.
//! - A failing deferred/producer is a source error: the executor records it
//!   once and starts nothing.
//! - `WithInit` captures the innermost `init` encountered; the wrapped
//!   source may itself be deferred or produced.

use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::stream::{BoxStream, StreamExt};

use crate::error::TaskError;

/// Producer closure stored by [`Source::Produce`].
type ProduceFn<T, I> =
    Box<dyn FnOnce() -> BoxFuture<'static, Result<Source<T, I>, TaskError>> + Send>;

/// Normalized source: one stream, optionally an init value.
pub(crate) struct Resolved<T, I> {
    /// Item stream; `Err` items are iterator-advance errors.
    pub(crate) stream: BoxStream<'static, Result<T, TaskError>>,
    /// Init value shared with every job invocation and the teardown hook.
    pub(crate) init: Option<Arc<I>>,
}

/// Input to an executor run.
///
/// `T` is the item type handed to jobs; `I` is the optional init value
/// (defaulting to `()` for sources that never carry one).
pub enum Source<T, I = ()> {
    /// An eager, finite sequence.
    Items(Vec<T>),

    /// A lazy asynchronous sequence. `Err` items are recorded by the
    /// executor and stop further pulling.
    Stream(BoxStream<'static, Result<T, TaskError>>),

    /// A deferred value resolving to another source shape.
    Deferred(BoxFuture<'static, Result<Source<T, I>, TaskError>>),

    /// A source bundled with an init value for jobs and teardown.
    WithInit {
        /// The wrapped source (any shape).
        source: Box<Source<T, I>>,
        /// Value threaded into jobs and teardown.
        init: I,
    },

    /// A producer invoked once at run start, yielding another source shape.
    Produce(ProduceFn<T, I>),
}

impl<T, I> Source<T, I>
where
    T: Send + 'static,
    I: Send + Sync + 'static,
{
    /// Wraps an eager sequence.
    pub fn iter(items: impl IntoIterator<Item = T>) -> Self {
        Source::Items(items.into_iter().collect())
    }

    /// Wraps an infallible async stream.
    pub fn stream(stream: impl futures::Stream<Item = T> + Send + 'static) -> Self {
        Source::Stream(stream.map(Ok).boxed())
    }

    /// Wraps a fallible async stream.
    pub fn try_stream(
        stream: impl futures::Stream<Item = Result<T, TaskError>> + Send + 'static,
    ) -> Self {
        Source::Stream(stream.boxed())
    }

    /// Wraps a deferred source.
    pub fn deferred(
        fut: impl Future<Output = Result<Source<T, I>, TaskError>> + Send + 'static,
    ) -> Self {
        Source::Deferred(Box::pin(fut))
    }

    /// Bundles a source with an init value.
    pub fn with_init(source: Source<T, I>, init: I) -> Self {
        Source::WithInit {
            source: Box::new(source),
            init,
        }
    }

    /// Wraps a producer closure invoked at run start.
    pub fn produce<F, Fut>(f: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<Source<T, I>, TaskError>> + Send + 'static,
    {
        Source::Produce(Box::new(move || Box::pin(f())))
    }

    /// Normalizes any shape to a stream plus optional init.
    ///
    /// Invoked exactly once per run, before scheduling begins. Errors from
    /// deferred values or producers surface here.
    pub(crate) async fn resolve(self) -> Result<Resolved<T, I>, TaskError> {
        let mut current = self;
        let mut init: Option<Arc<I>> = None;

        loop {
            match current {
                Source::Items(items) => {
                    return Ok(Resolved {
                        stream: futures::stream::iter(items.into_iter().map(Ok)).boxed(),
                        init,
                    });
                }
                Source::Stream(stream) => return Ok(Resolved { stream, init }),
                Source::WithInit { source, init: i } => {
                    init = Some(Arc::new(i));
                    current = *source;
                }
                Source::Deferred(fut) => current = fut.await?,
                Source::Produce(f) => current = f().await?,
            }
        }
    }
}

impl<T, I> From<Vec<T>> for Source<T, I> {
    fn from(items: Vec<T>) -> Self {
        Source::Items(items)
    }
}

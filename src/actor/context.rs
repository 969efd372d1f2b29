//! Per-actor execution context: a serialized work queue.
//!
//! Actor logic, and every resumption of an operation that logic
//! suspended on, runs strictly one-at-a-time regardless of which
//! runtime thread completed the underlying operation. The context is
//! the only structure mutated from multiple tasks (producers posting
//! work); one lock covers the queue, the drain flag, and the stopped
//! flag, so an enqueue racing the drain worker's idle transition is
//! never lost.
//!
//! Suspension is explicit message passing, not a hidden runtime
//! feature: [`ActorContext::suspend`] runs an external future off the
//! context and, on completion, posts the resumption as an ordinary
//! work item back onto the owning queue.
//!
//! # Example
//!
//! ```ignore
//! struct Counter { value: i64 }
//!
//! let ctx = ActorContext::new(Counter { value: 0 });
//! ctx.post(|c, _| { c.value += 1; Ok(()) })?;
//! let value = ctx.call(|c, _| Ok(c.value)).await?;
//! ```

use std::collections::VecDeque;
use std::future::Future;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use parking_lot::Mutex;
use tokio::sync::oneshot;

use crate::error::{ActorwireError, Result};

/// One unit of work against the actor's state.
type WorkItem<A> = Box<dyn FnOnce(&mut A, &ActorContext<A>) -> Result<()> + Send + 'static>;

/// Queue state: items, drain flag, stop flag, all under one lock.
struct Queue<A> {
    items: VecDeque<WorkItem<A>>,
    /// True while exactly one drain worker is active.
    draining: bool,
    /// Terminal; set by `stop()` or by a failed work item.
    stopped: bool,
}

struct ContextInner<A> {
    queue: Mutex<Queue<A>>,
    /// Actor state; touched only by the at-most-one active drain worker
    /// (and by `stop_and_take` after the stop point).
    actor: Mutex<Option<A>>,
    /// Actor identity for logging.
    name: &'static str,
}

/// Handle to a per-actor serialized work queue.
///
/// Cheaply cloneable; an actor value owns (or is handed) one of these
/// rather than inheriting from a base type.
pub struct ActorContext<A> {
    inner: Arc<ContextInner<A>>,
}

impl<A> Clone for ActorContext<A> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<A: Send + 'static> ActorContext<A> {
    /// Create a context owning the given actor.
    ///
    /// The context lives for the actor's lifetime; it is torn down by
    /// [`stop`](Self::stop) or by an unhandled work-item failure.
    pub fn new(actor: A) -> Self {
        Self {
            inner: Arc::new(ContextInner {
                queue: Mutex::new(Queue {
                    items: VecDeque::new(),
                    draining: false,
                    stopped: false,
                }),
                actor: Mutex::new(Some(actor)),
                name: std::any::type_name::<A>(),
            }),
        }
    }

    /// Enqueue a work item; start a drain worker if none is active.
    ///
    /// Items execute in enqueue order, one at a time. An item returning
    /// `Err` is an unhandled failure: it is caught at the drain
    /// boundary and stops the context (use [`call`](Self::call) when
    /// the error belongs to a caller instead).
    ///
    /// Must be called within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns `ActorStopped` if the context has stopped; the item is
    /// dropped, never silently queued.
    pub fn post<F>(&self, f: F) -> Result<()>
    where
        F: FnOnce(&mut A, &ActorContext<A>) -> Result<()> + Send + 'static,
    {
        let spawn_worker = {
            let mut q = self.inner.queue.lock();
            if q.stopped {
                return Err(ActorwireError::ActorStopped);
            }
            q.items.push_back(Box::new(f));
            if q.draining {
                false
            } else {
                q.draining = true;
                true
            }
        };

        if spawn_worker {
            let ctx = self.clone();
            tokio::spawn(async move { ctx.drain().await });
        }

        Ok(())
    }

    /// Invoke actor logic and get a deferred result handle.
    ///
    /// The closure runs under the context's serialization guarantee;
    /// the returned [`Deferred`] completes with its outcome. A closure
    /// error resolves this caller only and leaves the context healthy.
    /// If the context is already stopped, the deferred resolves
    /// immediately with `ActorStopped` rather than remaining pending.
    pub fn call<R, F>(&self, f: F) -> Deferred<R>
    where
        R: Send + 'static,
        F: FnOnce(&mut A, &ActorContext<A>) -> Result<R> + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();

        // On post failure the closure (and tx with it) is dropped,
        // resolving the deferred with ActorStopped.
        let _ = self.post(move |actor, ctx| {
            let outcome = f(actor, ctx);
            let _ = tx.send(outcome);
            Ok(())
        });

        Deferred { rx }
    }

    /// Suspend adapter: run `op` off the context, then post the
    /// resumption back onto this queue.
    ///
    /// The resumption never executes on the task that completed `op`;
    /// it re-enters through the queue like any other work item. If the
    /// context stops before `op` completes, the resumption is dropped
    /// (its failure is observable through whatever deferred it holds).
    pub fn suspend<Fut, T, G>(&self, op: Fut, resume: G)
    where
        Fut: Future<Output = T> + Send + 'static,
        T: Send + 'static,
        G: FnOnce(&mut A, &ActorContext<A>, T) -> Result<()> + Send + 'static,
    {
        let ctx = self.clone();
        tokio::spawn(async move {
            let output = op.await;
            if ctx.post(move |actor, c| resume(actor, c, output)).is_err() {
                tracing::debug!(actor = ctx.inner.name, "resumption dropped: context stopped");
            }
        });
    }

    /// Stop the context.
    ///
    /// Every item still queued, and every future post, fails with
    /// `ActorStopped` instead of executing or hanging. An item already
    /// running completes first. Idempotent.
    pub fn stop(&self) {
        if self.mark_stopped() {
            tracing::debug!(actor = self.inner.name, "context stopped");
        }
    }

    /// Stop the context and reclaim the actor value.
    ///
    /// Waits for an in-flight item to finish (it holds the actor lock),
    /// then moves the actor out, e.g. to hand it back to an
    /// [`ActorProvider`](super::ActorProvider). Returns `None` if the
    /// actor was already taken.
    pub fn stop_and_take(&self) -> Option<A> {
        self.stop();
        self.inner.actor.lock().take()
    }

    /// Check if the context has stopped.
    pub fn is_stopped(&self) -> bool {
        self.inner.queue.lock().stopped
    }

    /// Number of items waiting in the queue.
    pub fn pending_count(&self) -> usize {
        self.inner.queue.lock().items.len()
    }

    /// Set the stopped flag and drop the remaining queue.
    ///
    /// Dropping the items drops their captured oneshot senders, which
    /// resolves the corresponding deferred handles with `ActorStopped`.
    /// Returns false if already stopped.
    fn mark_stopped(&self) -> bool {
        let dropped: Vec<WorkItem<A>> = {
            let mut q = self.inner.queue.lock();
            if q.stopped {
                return false;
            }
            q.stopped = true;
            q.items.drain(..).collect()
        };
        // Dropped outside the lock; destructors may be arbitrary code.
        drop(dropped);
        true
    }

    /// Drain worker: pops and executes one item at a time.
    ///
    /// At most one worker is active per context; the flag is toggled
    /// only under the queue lock. Clearing the flag and observing the
    /// empty queue happen in the same critical section a racing post
    /// must enter, so the idle transition can never lose an item.
    async fn drain(&self) {
        loop {
            let item = {
                let mut q = self.inner.queue.lock();
                if q.stopped {
                    q.draining = false;
                    return;
                }
                match q.items.pop_front() {
                    Some(item) => item,
                    None => {
                        q.draining = false;
                        return;
                    }
                }
            };

            let outcome = {
                let mut guard = self.inner.actor.lock();
                let actor = match guard.as_mut() {
                    Some(actor) => actor,
                    // Actor reclaimed after stop; nothing left to run.
                    None => return,
                };
                catch_unwind(AssertUnwindSafe(|| item(actor, self)))
            };

            match outcome {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    tracing::error!(actor = self.inner.name, error = %e, "work item failed; stopping context");
                    self.mark_stopped();
                    return;
                }
                Err(_) => {
                    tracing::error!(actor = self.inner.name, "work item panicked; stopping context");
                    self.mark_stopped();
                    return;
                }
            }

            // Keep long bursts fair to sibling contexts on the worker pool.
            tokio::task::yield_now().await;
        }
    }
}

impl<A> std::fmt::Debug for ActorContext<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let q = self.inner.queue.lock();
        f.debug_struct("ActorContext")
            .field("actor", &self.inner.name)
            .field("pending", &q.items.len())
            .field("draining", &q.draining)
            .field("stopped", &q.stopped)
            .finish()
    }
}

/// Deferred result handle for an actor call.
///
/// Completes with the method's outcome, or with `ActorStopped` if the
/// context stopped before (or while) the call could run. Never hangs
/// indefinitely on a stopped context.
pub struct Deferred<R> {
    rx: oneshot::Receiver<Result<R>>,
}

impl<R> Future for Deferred<R> {
    type Output = Result<R>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.get_mut().rx).poll(cx).map(|res| match res {
            Ok(outcome) => outcome,
            // Sender dropped: the item was discarded at or after stop.
            Err(_) => Err(ActorwireError::ActorStopped),
        })
    }
}

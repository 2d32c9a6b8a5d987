// SPDX-License-Identifier: MIT OR Apache-2.0

//! Async context propagation.

use std::future::Future;
use std::pin::Pin;
use std::task::Poll;

use super::snapshot::{ContextSnapshot, Installed};

/// A [`Future`] wrapper that carries context across executor boundaries.
///
/// Executors are free to poll a task on any thread, and the thread's buffer is whatever
/// that thread last had. `ApplySnapshot` gives the task a buffer of its own: it starts
/// from the snapshot, is installed before each poll of the inner future, and is copied
/// back out after the poll, before the poller's buffer is put back. Context the task
/// activates therefore survives its `.await`s without leaking into the poller.
///
/// # Examples
///
/// ```rust
/// use context_slots::{ApplySnapshot, ContextSnapshot, thread_buffer};
///
/// async fn tagged() -> u64 {
///     thread_buffer::read().map_or(0, |words| words[0])
/// }
///
/// # async fn example() {
/// thread_buffer::attach();
/// thread_buffer::get_and_set(0, 7);
/// let future = ApplySnapshot::new(ContextSnapshot::capture(), tagged());
/// thread_buffer::get_and_set(0, 0);
///
/// assert_eq!(future.await, 7);
/// # }
/// ```
pub struct ApplySnapshot<F>(ContextSnapshot, F);

impl<F> ApplySnapshot<F> {
    pub fn new(snapshot: ContextSnapshot, f: F) -> Self {
        Self(snapshot, f)
    }

    /// The task's context as of its last poll.
    pub fn snapshot(&self) -> ContextSnapshot {
        self.0
    }
}

impl<F> Future for ApplySnapshot<F>
where
    F: Future,
{
    type Output = F::Output;

    fn poll(self: Pin<&mut Self>, cx: &mut std::task::Context<'_>) -> Poll<Self::Output> {
        // SAFETY: the inner future is never moved out of `self`; the snapshot is not
        // structurally pinned.
        let (snapshot, fut) = unsafe {
            let d = self.get_unchecked_mut();
            (&mut d.0, Pin::new_unchecked(&mut d.1))
        };
        let installed = Installed::install(snapshot);
        let r = fut.poll(cx);
        *snapshot = ContextSnapshot::capture();
        drop(installed);
        r
    }
}

impl<F> std::fmt::Debug for ApplySnapshot<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("ApplySnapshot").field(&self.0).finish()
    }
}

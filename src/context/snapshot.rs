// SPDX-License-Identifier: MIT OR Apache-2.0

//! Copying context between threads.

use super::apply_snapshot::ApplySnapshot;
use crate::thread_buffer;
use crate::value::{CAPACITY, Word};

#[cfg(not(target_arch = "wasm32"))]
use std::thread;
#[cfg(target_arch = "wasm32")]
use wasm_thread as thread;

/**
An immutable copy of a thread's context buffer.

Snapshots are plain values: capture one on the thread that has the context, move it
wherever the work goes, and restore it there. Restoring the same snapshot on several
threads gives each an independent buffer.

```
use context_slots::{ContextSnapshot, thread_buffer};

thread_buffer::attach();
thread_buffer::get_and_set(0, 42);
let snapshot = ContextSnapshot::capture();

let words = std::thread::spawn(move || {
    thread_buffer::attach();
    snapshot.restore();
    thread_buffer::read()
})
.join()
.unwrap();
assert_eq!(words.unwrap()[0], 42);
```
*/
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default)]
pub struct ContextSnapshot {
    words: Option<[Word; CAPACITY]>,
}

impl ContextSnapshot {
    /// The empty snapshot: no context at all.
    pub const fn none() -> Self {
        ContextSnapshot { words: None }
    }

    /// Copies the current thread's buffer.
    ///
    /// A missing or all-zero buffer gives [`ContextSnapshot::none`].
    pub fn capture() -> Self {
        match thread_buffer::read() {
            Some(words) if words.iter().any(|word| *word != 0) => ContextSnapshot { words: Some(words) },
            _ => ContextSnapshot::none(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_none()
    }

    /// The captured words; all zero for the empty snapshot.
    pub fn data(&self) -> [Word; CAPACITY] {
        self.words.unwrap_or([0; CAPACITY])
    }

    /**
    Overwrites the current thread's buffer with this snapshot.

    The empty snapshot zeroes the buffer. Returns `false`, and does nothing, when the
    thread has no buffer.
    */
    pub fn restore(&self) -> bool {
        thread_buffer::write_all(&self.data())
    }

    /**
    Runs `f` with this snapshot installed on the current thread.

    The thread's previous buffer is put back afterwards, also when `f` panics. A thread
    without a buffer gets one for the duration of the call.
    */
    pub fn scope<R>(&self, f: impl FnOnce() -> R) -> R {
        let _installed = Installed::install(self);
        f()
    }

    /// Wraps `future` so that every poll runs with this snapshot installed.
    pub fn apply<F>(self, future: F) -> ApplySnapshot<F> {
        ApplySnapshot::new(self, future)
    }
}

/// Puts a snapshot in place and undoes it on drop.
pub(crate) struct Installed {
    previous: Option<[Word; CAPACITY]>,
    attached: bool,
}

impl Installed {
    pub(crate) fn install(snapshot: &ContextSnapshot) -> Self {
        let previous = thread_buffer::read();
        let attached = thread_buffer::attach();
        snapshot.restore();
        Installed { previous, attached }
    }
}

impl Drop for Installed {
    fn drop(&mut self) {
        if self.attached {
            thread_buffer::detach();
        } else if let Some(previous) = &self.previous {
            thread_buffer::write_all(previous);
        }
    }
}

/**
Spawns a thread that starts out with the caller's context.

The new thread gets its own buffer holding a snapshot of the caller's, runs `f`, and
releases the buffer when `f` returns.
*/
pub fn spawn<F, R>(f: F) -> thread::JoinHandle<R>
where
    F: FnOnce() -> R + Send + 'static,
    R: Send + 'static,
{
    let snapshot = ContextSnapshot::capture();
    thread::spawn(move || snapshot.scope(f))
}

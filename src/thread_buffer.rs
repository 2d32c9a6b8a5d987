// SPDX-License-Identifier: MIT OR Apache-2.0

//! The per-thread context buffer.
//!
//! Each thread owns at most one buffer of [`CAPACITY`] words. The buffer belongs to the
//! host: it is created with [`attach`] when a thread (or logical task) starts taking part
//! in recording and dropped with [`detach`] or when the thread exits. Context accessors
//! only read and write it; when a thread has no buffer every write is a no-op.
//!
//! Only the owning thread ever touches its buffer, so no synchronization is involved.
//! Context moves between threads exclusively by copying, see
//! [`ContextSnapshot`](crate::ContextSnapshot).
//!
//! ```
//! use context_slots::thread_buffer;
//!
//! assert!(thread_buffer::read().is_none());
//! thread_buffer::attach();
//! assert_eq!(thread_buffer::read(), Some([0; context_slots::CAPACITY]));
//! thread_buffer::detach();
//! ```

use crate::value::{CAPACITY, Word};
use std::cell::Cell;

thread_local! {
    static BUFFER: Cell<Option<[Word; CAPACITY]>> = const { Cell::new(None) };
}

/// Allocates a zeroed buffer for the current thread.
///
/// Returns `false` if the thread already had one, which is left untouched.
pub fn attach() -> bool {
    BUFFER
        .try_with(|cell| {
            if cell.get().is_some() {
                false
            } else {
                cell.set(Some([0; CAPACITY]));
                true
            }
        })
        .unwrap_or(false)
}

/// Discards the current thread's buffer. Returns whether there was one.
pub fn detach() -> bool {
    BUFFER
        .try_with(|cell| cell.take().is_some())
        .unwrap_or(false)
}

/// Whether the current thread has a buffer.
pub fn is_attached() -> bool {
    BUFFER
        .try_with(|cell| cell.get().is_some())
        .unwrap_or(false)
}

/// A copy of the current thread's buffer.
pub fn read() -> Option<[Word; CAPACITY]> {
    BUFFER.try_with(Cell::get).ok().flatten()
}

/// Runs `f` against the current thread's buffer, or against `None` when the host has
/// not attached one.
///
/// `f` must not re-enter this module; its changes are written back when it returns.
pub(crate) fn with_current<R>(f: impl FnOnce(Option<&mut [Word; CAPACITY]>) -> R) -> R {
    match BUFFER.try_with(Cell::get) {
        Ok(Some(mut words)) => {
            let r = f(Some(&mut words));
            let _ = BUFFER.try_with(|cell| cell.set(Some(words)));
            r
        }
        _ => f(None),
    }
}

/// Replaces the whole buffer. No-op without a buffer; returns whether it was written.
pub(crate) fn write_all(words: &[Word; CAPACITY]) -> bool {
    with_current(|buffer| match buffer {
        Some(buffer) => {
            *buffer = *words;
            true
        }
        None => false,
    })
}

/// Stores `word` at `slot` and returns the previous value.
///
/// Returns `0` without a buffer or for a slot outside the buffer.
pub fn get_and_set(slot: usize, word: Word) -> Word {
    with_current(|buffer| {
        buffer
            .and_then(|buffer| buffer.get_mut(slot))
            .map(|current| std::mem::replace(current, word))
            .unwrap_or(0)
    })
}

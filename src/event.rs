// SPDX-License-Identifier: MIT OR Apache-2.0

//! Stamping outgoing events with the current context.
//!
//! Every event carries exactly [`CAPACITY`] context words in slot order, used or not, so
//! that a reader can find slot `n` at a fixed position given the registration table (see
//! [`ContextRegistry::registrations`](crate::ContextRegistry::registrations)).

use crate::thread_buffer;
use crate::value::{CAPACITY, Word};

/// Destination for the words of an event record.
pub trait EventWriter {
    fn put_word(&mut self, word: Word);
}

impl EventWriter for Vec<Word> {
    fn put_word(&mut self, word: Word) {
        self.push(word);
    }
}

impl<W: EventWriter + ?Sized> EventWriter for &mut W {
    fn put_word(&mut self, word: Word) {
        (**self).put_word(word);
    }
}

/// Copies the current thread's buffer into `writer`. Writes zeros when the thread has no
/// buffer.
pub fn stamp_event<W: EventWriter + ?Sized>(writer: &mut W) {
    let words = thread_buffer::read().unwrap_or([0; CAPACITY]);
    for word in words {
        writer.put_word(word);
    }
}

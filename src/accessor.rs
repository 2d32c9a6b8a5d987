// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-type access to the calling thread's context buffer.

use crate::context::Captured;
use crate::descriptor::{AttributeDescriptor, ContextType, ContextTypeId};
use crate::error::Refusal;
use crate::host::Host;
use crate::thread_buffer;
use crate::value::{AttributeKind, AttributeValue, CAPACITY, Word};
use std::collections::HashMap;
use std::fmt::Display;
use std::sync::Arc;

/// The contiguous slots granted to one context type.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct SlotRange {
    offset: u8,
    length: u8,
}

impl SlotRange {
    pub(crate) fn new(offset: u8, length: u8) -> Self {
        debug_assert!(usize::from(offset) + usize::from(length) <= CAPACITY);
        SlotRange { offset, length }
    }

    pub fn offset(&self) -> u8 {
        self.offset
    }

    pub fn length(&self) -> u8 {
        self.length
    }

    /// One past the last slot.
    pub fn end(&self) -> u8 {
        self.offset + self.length
    }

    pub fn contains(&self, slot: u8) -> bool {
        slot >= self.offset && slot < self.end()
    }

    pub fn overlaps(&self, other: &SlotRange) -> bool {
        self.offset < other.end() && other.offset < self.end()
    }
}

impl Display for SlotRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}..{}", self.offset, self.end())
    }
}

/// Why a name-keyed lookup failed.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum LookupError {
    UnknownName,
    TypeMismatch { expected: AttributeKind },
}

impl LookupError {
    /// Negative index reported in diagnostics.
    pub(crate) fn code(&self) -> i8 {
        match self {
            LookupError::UnknownName => -1,
            LookupError::TypeMismatch { .. } => -2,
        }
    }
}

struct Active<T> {
    range: SlotRange,
    descriptors: Vec<AttributeDescriptor<T>>,
    by_name: HashMap<&'static str, usize>,
}

enum State<T> {
    Active(Active<T>),
    Inactive(Refusal),
}

struct Inner<T> {
    host: Arc<dyn Host>,
    state: State<T>,
}

/**
The handle through which instances of a context type reach the thread buffer.

Obtained from [`ContextRegistry::get_or_register`](crate::ContextRegistry::get_or_register).
Every operation works on the *calling thread's* buffer at the type's slot offsets.

An accessor whose registration was refused is *inactive*: it has no slots and every
operation is a no-op, so code holding one behaves the same whether the type was refused
or never existed.

Cloning is cheap; clones share the same descriptors.
*/
pub struct ContextAccessor<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for ContextAccessor<T> {
    fn clone(&self) -> Self {
        ContextAccessor {
            inner: self.inner.clone(),
        }
    }
}

impl<T> std::fmt::Debug for ContextAccessor<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.inner.state {
            State::Active(active) => f
                .debug_struct("ContextAccessor")
                .field("range", &active.range)
                .field("descriptors", &active.descriptors)
                .finish(),
            State::Inactive(refusal) => f
                .debug_struct("ContextAccessor")
                .field("inactive", refusal)
                .finish(),
        }
    }
}

impl<T> PartialEq for ContextAccessor<T> {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<T> Eq for ContextAccessor<T> {}

impl<T: ContextType> ContextAccessor<T> {
    pub(crate) fn active(
        host: Arc<dyn Host>,
        range: SlotRange,
        descriptors: Vec<AttributeDescriptor<T>>,
    ) -> Self {
        let by_name = descriptors
            .iter()
            .enumerate()
            .map(|(index, descriptor)| (descriptor.name(), index))
            .collect();
        ContextAccessor {
            inner: Arc::new(Inner {
                host,
                state: State::Active(Active {
                    range,
                    descriptors,
                    by_name,
                }),
            }),
        }
    }

    pub(crate) fn inactive(host: Arc<dyn Host>, refusal: Refusal) -> Self {
        ContextAccessor {
            inner: Arc::new(Inner {
                host,
                state: State::Inactive(refusal),
            }),
        }
    }

    fn state(&self) -> Option<&Active<T>> {
        match &self.inner.state {
            State::Active(active) => Some(active),
            State::Inactive(_) => None,
        }
    }

    pub fn type_id(&self) -> ContextTypeId {
        ContextTypeId::of::<T>()
    }

    /// Whether this type was granted slots.
    pub fn is_active(&self) -> bool {
        self.state().is_some()
    }

    pub fn slot_range(&self) -> Option<SlotRange> {
        self.state().map(|active| active.range)
    }

    /// The first slot of this type, or `-1` for an inactive accessor.
    pub fn offset(&self) -> i16 {
        self.slot_range()
            .map_or(-1, |range| i16::from(range.offset()))
    }

    /// Why registration was refused, for an inactive accessor.
    pub fn refusal(&self) -> Option<Refusal> {
        match &self.inner.state {
            State::Active(_) => None,
            State::Inactive(refusal) => Some(*refusal),
        }
    }

    /// The type's attributes in slot order. Empty for an inactive accessor.
    pub fn descriptors(&self) -> &[AttributeDescriptor<T>] {
        self.state()
            .map(|active| active.descriptors.as_slice())
            .unwrap_or(&[])
    }

    pub fn host(&self) -> &Arc<dyn Host> {
        &self.inner.host
    }

    /// Whether the host currently wants context written.
    pub(crate) fn capturing(&self) -> bool {
        self.inner.host.should_capture()
    }

    /**
    Writes every attribute of `instance` into this type's slots.

    Strings are interned through the host; booleans, characters and integers are stored
    inline. No-op for an inactive accessor or a thread without a buffer.
    */
    pub fn write(&self, instance: &T) {
        let Some(active) = self.state() else {
            return;
        };
        if !thread_buffer::is_attached() {
            return;
        }
        let host = &*self.inner.host;
        // method attributes run user code, so read everything before touching the buffer
        let words: Vec<(usize, Word)> = active
            .descriptors
            .iter()
            .filter(|descriptor| usize::from(descriptor.order()) < CAPACITY)
            .map(|descriptor| {
                let slot = usize::from(active.range.offset()) + usize::from(descriptor.order());
                (slot, descriptor.read(instance, host))
            })
            .collect();
        thread_buffer::with_current(|buffer| {
            if let Some(buffer) = buffer {
                for (slot, word) in words {
                    buffer[slot] = word;
                }
            }
        });
    }

    /// A copy of the current thread's buffer, taken before this type's slots are replaced.
    pub(crate) fn save_slots(&self) -> Option<[Word; CAPACITY]> {
        self.state()?;
        thread_buffer::read()
    }

    /// Puts this type's slots back to the words in `saved`, leaving every other slot alone.
    pub(crate) fn restore_slots(&self, saved: &[Word; CAPACITY]) {
        let Some(active) = self.state() else {
            return;
        };
        let range = active.range;
        thread_buffer::with_current(|buffer| {
            if let Some(buffer) = buffer {
                let slots = usize::from(range.offset())..usize::from(range.end());
                buffer[slots.clone()].copy_from_slice(&saved[slots]);
            }
        });
    }

    /**
    Zeroes this type's slots.

    When `instance` is given its field attributes are reset as well (absent strings, zero
    numbers), so a cleared context object does not keep reporting stale values if it is
    set again later. Method attributes are left alone.
    */
    pub fn clear(&self, instance: Option<&mut T>) {
        let Some(active) = self.state() else {
            return;
        };
        let cleared = thread_buffer::with_current(|buffer| {
            let Some(buffer) = buffer else {
                return false;
            };
            for descriptor in &active.descriptors {
                if usize::from(descriptor.order()) < CAPACITY {
                    let slot = usize::from(active.range.offset()) + usize::from(descriptor.order());
                    buffer[slot] = 0;
                }
            }
            true
        });
        if let (true, Some(instance)) = (cleared, instance) {
            for descriptor in &active.descriptors {
                descriptor.reset(instance);
            }
        }
    }

    /// Zeroes this type's slots without touching any instance.
    pub fn clear_all(&self) {
        self.clear(None);
    }

    fn lookup(&self, name: &str, value: Option<&AttributeValue>) -> Result<usize, LookupError> {
        let active = self.state().ok_or(LookupError::UnknownName)?;
        let index = *active.by_name.get(name).ok_or(LookupError::UnknownName)?;
        let descriptor = &active.descriptors[index];
        if let Some(value) = value {
            if !descriptor.kind().accepts(value) {
                return Err(LookupError::TypeMismatch {
                    expected: descriptor.kind(),
                });
            }
        }
        Ok(usize::from(active.range.offset()) + usize::from(descriptor.order()))
    }

    fn report_miss(&self, name: &str, miss: LookupError) {
        match miss {
            LookupError::UnknownName => {
                logwise::warn_sync!(
                    "Context type {type_id} has no attribute named {name} ({code})",
                    type_id = T::TYPE_ID,
                    name = name,
                    code = miss.code()
                );
            }
            LookupError::TypeMismatch { expected } => {
                logwise::warn_sync!(
                    "Attribute {name} of context type {type_id} holds {expected} values ({code})",
                    name = name,
                    type_id = T::TYPE_ID,
                    expected = expected.name(),
                    code = miss.code()
                );
            }
        }
    }

    /**
    Writes a single attribute, looked up by name, into the calling thread's buffer.

    An unknown name or a value of the wrong kind is logged and otherwise ignored.
    */
    pub fn set_attribute(&self, name: &str, value: impl Into<AttributeValue>) {
        if !self.is_active() {
            return;
        }
        let value = value.into();
        match self.lookup(name, Some(&value)) {
            Ok(slot) => {
                thread_buffer::get_and_set(slot, value.encode(&*self.inner.host));
            }
            Err(miss) => self.report_miss(name, miss),
        }
    }

    /// Zeroes a single attribute, looked up by name.
    pub fn clear_attribute(&self, name: &str) {
        if !self.is_active() {
            return;
        }
        match self.lookup(name, None) {
            Ok(slot) => {
                thread_buffer::get_and_set(slot, 0);
            }
            Err(miss) => self.report_miss(name, miss),
        }
    }

    /**
    Activates `instance` on the calling thread.

    Dropping the returned handle puts back whatever this type's slots held before, so an
    instance activated earlier becomes current again.
    */
    pub fn activate(&self, instance: T) -> Captured<T> {
        Captured::activate(self.clone(), instance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::Declaration;
    use crate::recorder::{Recorder, RecorderConfig};

    #[cfg(target_arch = "wasm32")]
    use wasm_bindgen_test::*;
    #[cfg(target_arch = "wasm32")]
    wasm_bindgen_test::wasm_bindgen_test_configure!(run_in_browser);

    #[derive(Debug, Clone, PartialEq)]
    struct Span {
        name: Option<String>,
        depth: u16,
        sampled: bool,
    }

    impl Span {
        fn shallow(&self) -> bool {
            self.depth < 2
        }
    }

    impl ContextType for Span {
        const TYPE_ID: &'static str = "test.span";

        fn declare(declaration: &mut Declaration<Self>) {
            declaration.field("name", |s| &s.name, |s| &mut s.name);
            declaration.field("depth", |s| &s.depth, |s| &mut s.depth);
            declaration.field("sampled", |s| &s.sampled, |s| &mut s.sampled);
            declaration.method("shallow", Span::shallow);
        }
    }

    fn accessor_at(offset: u8) -> (Arc<Recorder>, ContextAccessor<Span>) {
        let recorder = Arc::new(Recorder::new(RecorderConfig::default()));
        let descriptors = crate::descriptor::derive::<Span>().unwrap();
        let range = SlotRange::new(offset, descriptors.len() as u8);
        let accessor = ContextAccessor::active(recorder.clone(), range, descriptors);
        (recorder, accessor)
    }

    fn span() -> Span {
        Span {
            name: Some("parse".to_string()),
            depth: 3,
            sampled: true,
        }
    }

    #[cfg_attr(not(target_arch = "wasm32"), test)]
    #[cfg_attr(target_arch = "wasm32", wasm_bindgen_test)]
    fn write_then_clear() {
        thread_buffer::attach();
        let (recorder, accessor) = accessor_at(2);
        accessor.write(&span());
        let key = Word::from(recorder.intern_string("parse"));
        // true is stored as 0, `shallow` is false and stored as 1
        assert_eq!(
            thread_buffer::read(),
            Some([0, 0, key, 3, 0, 1, 0, 0])
        );

        accessor.clear_all();
        assert_eq!(thread_buffer::read(), Some([0; CAPACITY]));
        thread_buffer::detach();
    }

    #[cfg_attr(not(target_arch = "wasm32"), test)]
    #[cfg_attr(target_arch = "wasm32", wasm_bindgen_test)]
    fn clear_resets_instance_fields() {
        thread_buffer::attach();
        let (_recorder, accessor) = accessor_at(0);
        let mut span = span();
        accessor.write(&span);
        accessor.clear(Some(&mut span));
        assert_eq!(thread_buffer::read(), Some([0; CAPACITY]));
        assert_eq!(
            span,
            Span {
                name: None,
                depth: 0,
                sampled: false
            }
        );
        thread_buffer::detach();
    }

    #[cfg_attr(not(target_arch = "wasm32"), test)]
    #[cfg_attr(target_arch = "wasm32", wasm_bindgen_test)]
    fn clear_leaves_other_slots() {
        thread_buffer::attach();
        thread_buffer::get_and_set(0, 11);
        thread_buffer::get_and_set(7, 12);
        let (_recorder, accessor) = accessor_at(1);
        accessor.write(&span());
        accessor.clear_all();
        assert_eq!(thread_buffer::read(), Some([11, 0, 0, 0, 0, 0, 0, 12]));
        thread_buffer::detach();
    }

    #[cfg_attr(not(target_arch = "wasm32"), test)]
    #[cfg_attr(target_arch = "wasm32", wasm_bindgen_test)]
    fn no_buffer_is_a_noop() {
        assert!(!thread_buffer::is_attached());
        let (_recorder, accessor) = accessor_at(0);
        let mut span = span();
        accessor.write(&span);
        accessor.clear(Some(&mut span));
        // the instance is only reset when a buffer was cleared
        assert_eq!(span.depth, 3);
        accessor.set_attribute("depth", 4u16);
        assert!(!thread_buffer::is_attached());
    }

    #[cfg_attr(not(target_arch = "wasm32"), test)]
    #[cfg_attr(target_arch = "wasm32", wasm_bindgen_test)]
    fn inactive_accessor_is_a_noop() {
        thread_buffer::attach();
        let recorder: Arc<dyn Host> = Arc::new(Recorder::new(RecorderConfig::default()));
        let accessor = ContextAccessor::<Span>::inactive(recorder, Refusal::SessionsStarted);
        assert!(!accessor.is_active());
        assert_eq!(accessor.offset(), -1);
        assert_eq!(accessor.refusal(), Some(Refusal::SessionsStarted));
        assert!(accessor.descriptors().is_empty());

        let mut span = span();
        accessor.write(&span);
        accessor.set_attribute("depth", 1u16);
        accessor.clear(Some(&mut span));
        assert_eq!(span.depth, 3);
        assert_eq!(thread_buffer::read(), Some([0; CAPACITY]));
        thread_buffer::detach();
    }

    #[cfg_attr(not(target_arch = "wasm32"), test)]
    #[cfg_attr(target_arch = "wasm32", wasm_bindgen_test)]
    fn attributes_by_name() {
        thread_buffer::attach();
        let (recorder, accessor) = accessor_at(4);
        accessor.set_attribute("depth", 9u16);
        accessor.set_attribute("name", "lex");
        accessor.set_attribute("sampled", false);
        let key = Word::from(recorder.intern_string("lex"));
        assert_eq!(thread_buffer::read(), Some([0, 0, 0, 0, key, 9, 1, 0]));

        accessor.clear_attribute("depth");
        assert_eq!(thread_buffer::read(), Some([0, 0, 0, 0, key, 0, 1, 0]));
        thread_buffer::detach();
    }

    #[cfg_attr(not(target_arch = "wasm32"), test)]
    #[cfg_attr(target_arch = "wasm32", wasm_bindgen_test)]
    fn lookup_misses_are_noops() {
        thread_buffer::attach();
        let (_recorder, accessor) = accessor_at(0);
        assert_eq!(
            accessor.lookup("missing", None),
            Err(LookupError::UnknownName)
        );
        assert_eq!(
            accessor.lookup("depth", Some(&AttributeValue::Str("deep".into()))),
            Err(LookupError::TypeMismatch {
                expected: AttributeKind::U16
            })
        );
        assert_eq!(
            accessor.lookup("depth", Some(&AttributeValue::Int(70_000))),
            Err(LookupError::TypeMismatch {
                expected: AttributeKind::U16
            })
        );
        assert_eq!(LookupError::UnknownName.code(), -1);

        accessor.set_attribute("missing", 1u8);
        accessor.set_attribute("depth", "deep");
        accessor.clear_attribute("missing");
        assert_eq!(thread_buffer::read(), Some([0; CAPACITY]));
        thread_buffer::detach();
    }

    struct Counter {
        total: u64,
    }

    impl Counter {
        /// Writes the last slot as a side effect of being read.
        fn noisy(&self) -> bool {
            thread_buffer::get_and_set(7, 99);
            true
        }
    }

    impl ContextType for Counter {
        const TYPE_ID: &'static str = "test.counter";

        fn declare(declaration: &mut Declaration<Self>) {
            declaration.field("total", |c| &c.total, |c| &mut c.total);
            declaration.method("noisy", Counter::noisy);
        }
    }

    fn counter_accessor() -> ContextAccessor<Counter> {
        let recorder: Arc<dyn Host> = Arc::new(Recorder::new(RecorderConfig::default()));
        let descriptors = crate::descriptor::derive::<Counter>().unwrap();
        ContextAccessor::active(recorder, SlotRange::new(0, 2), descriptors)
    }

    #[cfg_attr(not(target_arch = "wasm32"), test)]
    #[cfg_attr(target_arch = "wasm32", wasm_bindgen_test)]
    fn buffer_writes_made_while_reading_survive() {
        thread_buffer::attach();
        let accessor = counter_accessor();
        accessor.write(&Counter { total: 4 });
        assert_eq!(thread_buffer::read(), Some([4, 0, 0, 0, 0, 0, 0, 99]));
        thread_buffer::detach();
    }

    #[cfg_attr(not(target_arch = "wasm32"), test)]
    #[cfg_attr(target_arch = "wasm32", wasm_bindgen_test)]
    fn full_range_unsigned_by_name() {
        thread_buffer::attach();
        let accessor = counter_accessor();
        accessor.set_attribute("total", u64::MAX);
        assert_eq!(thread_buffer::read().map(|words| words[0]), Some(u64::MAX));
        accessor.set_attribute("total", -1i64);
        assert_eq!(thread_buffer::read().map(|words| words[0]), Some(u64::MAX));
        thread_buffer::detach();
    }

    #[cfg_attr(not(target_arch = "wasm32"), test)]
    #[cfg_attr(target_arch = "wasm32", wasm_bindgen_test)]
    fn slot_ranges() {
        let a = SlotRange::new(0, 2);
        let b = SlotRange::new(2, 3);
        let c = SlotRange::new(4, 4);
        assert!(!a.overlaps(&b));
        assert!(b.overlaps(&c));
        assert!(a.contains(1));
        assert!(!a.contains(2));
        assert_eq!(c.end(), 8);
        assert_eq!(b.to_string(), "2..5");
    }
}

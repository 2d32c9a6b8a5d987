// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tests for the context module.

use super::ContextSnapshot;
use crate::accessor::ContextAccessor;
use crate::descriptor::{ContextType, Declaration};
use crate::host::Host;
use crate::recorder::{Recorder, RecorderConfig};
use crate::registry::ContextRegistry;
use crate::thread_buffer;
use crate::value::{CAPACITY, Word};
use std::sync::Arc;

#[cfg(target_arch = "wasm32")]
use wasm_bindgen_test::*;
#[cfg(target_arch = "wasm32")]
wasm_bindgen_test::wasm_bindgen_test_configure!(run_in_browser);

#[derive(Debug, Clone, PartialEq)]
struct Stage {
    name: &'static str,
    step: u8,
}

impl ContextType for Stage {
    const TYPE_ID: &'static str = "test.stage";

    fn declare(declaration: &mut Declaration<Self>) {
        declaration.field("name", |s| &s.name, |s| &mut s.name);
        declaration.field("step", |s| &s.step, |s| &mut s.step);
    }
}

fn stage(name: &'static str, step: u8) -> Stage {
    Stage { name, step }
}

/// A registry whose recorder has not started a session, and the `Stage` accessor in it.
fn setup() -> (Arc<Recorder>, ContextAccessor<Stage>) {
    let recorder = Arc::new(Recorder::new(RecorderConfig::default()));
    let registry = ContextRegistry::new(recorder.clone());
    let accessor = registry.get_or_register::<Stage>().unwrap();
    (recorder, accessor)
}

fn words(recorder: &Recorder, name: &str, step: u8) -> [Word; CAPACITY] {
    let mut words = [0; CAPACITY];
    words[0] = Word::from(recorder.intern_string(name));
    words[1] = Word::from(step);
    words
}

#[cfg_attr(not(target_arch = "wasm32"), test)]
#[cfg_attr(target_arch = "wasm32", wasm_bindgen_test)]
fn nested_handles_unwind_in_reverse() {
    thread_buffer::attach();
    let (recorder, accessor) = setup();
    let _session = recorder.start_session();

    let outer = accessor.activate(stage("load", 1));
    assert_eq!(thread_buffer::read(), Some(words(&recorder, "load", 1)));
    {
        let middle = outer.nest(stage("parse", 2));
        {
            let inner = middle.nest(stage("lex", 3));
            assert_eq!(inner.parent(), Some(&stage("parse", 2)));
            assert_eq!(thread_buffer::read(), Some(words(&recorder, "lex", 3)));
        }
        assert_eq!(thread_buffer::read(), Some(words(&recorder, "parse", 2)));
    }
    assert_eq!(thread_buffer::read(), Some(words(&recorder, "load", 1)));
    outer.close();
    assert_eq!(thread_buffer::read(), Some([0; CAPACITY]));
    thread_buffer::detach();
}

#[cfg_attr(not(target_arch = "wasm32"), test)]
#[cfg_attr(target_arch = "wasm32", wasm_bindgen_test)]
fn activating_twice_brings_back_the_first() {
    thread_buffer::attach();
    let (recorder, accessor) = setup();
    let _session = recorder.start_session();
    thread_buffer::get_and_set(5, 77);

    let first = accessor.activate(stage("load", 1));
    {
        let _second = accessor.activate(stage("parse", 2));
        assert_eq!(
            thread_buffer::read().map(|words| words[..2].to_vec()),
            Some(words(&recorder, "parse", 2)[..2].to_vec())
        );
    }
    let mut expected = words(&recorder, "load", 1);
    expected[5] = 77;
    assert_eq!(thread_buffer::read(), Some(expected));

    first.close();
    let mut expected = [0; CAPACITY];
    expected[5] = 77;
    assert_eq!(thread_buffer::read(), Some(expected));
    thread_buffer::detach();
}

#[cfg_attr(not(target_arch = "wasm32"), test)]
#[cfg_attr(target_arch = "wasm32", wasm_bindgen_test)]
fn update_inside_a_capture() {
    thread_buffer::attach();
    let (recorder, accessor) = setup();
    let _session = recorder.start_session();

    let outer = accessor.activate(stage("load", 1));
    {
        let mut copy = outer.capture();
        copy.update(|s| s.step = 9);
        assert_eq!(copy.get().step, 9);
        assert_eq!(thread_buffer::read(), Some(words(&recorder, "load", 9)));
    }
    assert_eq!(outer.get().step, 1);
    assert_eq!(thread_buffer::read(), Some(words(&recorder, "load", 1)));
    drop(outer);
    thread_buffer::detach();
}

#[cfg(not(target_arch = "wasm32"))]
#[test]
fn handles_restore_on_panic() {
    thread_buffer::attach();
    let (recorder, accessor) = setup();
    let _session = recorder.start_session();

    let outer = accessor.activate(stage("load", 1));
    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        let _inner = outer.nest(stage("parse", 2));
        panic!("unwind through the handle");
    }));
    assert!(result.is_err());
    assert_eq!(thread_buffer::read(), Some(words(&recorder, "load", 1)));
    drop(outer);
    thread_buffer::detach();
}

#[cfg_attr(not(target_arch = "wasm32"), test)]
#[cfg_attr(target_arch = "wasm32", wasm_bindgen_test)]
fn activation_without_session_writes_nothing() {
    thread_buffer::attach();
    let (recorder, accessor) = setup();
    assert!(!recorder.should_capture());

    let handle = accessor.activate(stage("load", 1));
    assert_eq!(thread_buffer::read(), Some([0; CAPACITY]));
    drop(handle);
    assert_eq!(thread_buffer::read(), Some([0; CAPACITY]));
    thread_buffer::detach();
}

#[cfg_attr(not(target_arch = "wasm32"), test)]
#[cfg_attr(target_arch = "wasm32", wasm_bindgen_test)]
fn untouched_buffer_captures_none() {
    assert_eq!(ContextSnapshot::capture(), ContextSnapshot::none());
    thread_buffer::attach();
    for _ in 0..3 {
        let snapshot = ContextSnapshot::capture();
        assert!(snapshot.is_empty());
        assert_eq!(snapshot, ContextSnapshot::none());
        assert_eq!(snapshot.data(), [0; CAPACITY]);
    }
    thread_buffer::detach();
}

#[cfg_attr(not(target_arch = "wasm32"), test)]
#[cfg_attr(target_arch = "wasm32", wasm_bindgen_test)]
fn restoring_none_zeroes() {
    thread_buffer::attach();
    thread_buffer::get_and_set(4, 17);
    assert!(ContextSnapshot::none().restore());
    assert_eq!(thread_buffer::read(), Some([0; CAPACITY]));
    thread_buffer::detach();
    assert!(!ContextSnapshot::none().restore());
}

#[cfg_attr(not(target_arch = "wasm32"), test)]
#[cfg_attr(target_arch = "wasm32", wasm_bindgen_test)]
fn scope_puts_previous_buffer_back() {
    thread_buffer::attach();
    thread_buffer::get_and_set(0, 1);
    let first = ContextSnapshot::capture();
    thread_buffer::get_and_set(0, 2);

    let seen = first.scope(thread_buffer::read);
    assert_eq!(seen.map(|words| words[0]), Some(1));
    assert_eq!(thread_buffer::read().map(|words| words[0]), Some(2));
    thread_buffer::detach();

    // a thread without a buffer borrows one for the call
    let seen = first.scope(thread_buffer::read);
    assert_eq!(seen.map(|words| words[0]), Some(1));
    assert!(!thread_buffer::is_attached());
}

#[cfg(not(target_arch = "wasm32"))]
#[test]
fn restore_on_another_thread() {
    thread_buffer::attach();
    let (recorder, accessor) = setup();
    let _session = recorder.start_session();
    let handle = accessor.activate(stage("load", 1));
    let snapshot = ContextSnapshot::capture();
    let expected = words(&recorder, "load", 1);
    drop(handle);

    // mutation after capture does not leak into the snapshot
    assert_eq!(thread_buffer::read(), Some([0; CAPACITY]));

    let (a, b) = std::thread::scope(|scope| {
        let a = scope.spawn(move || {
            thread_buffer::attach();
            snapshot.restore();
            thread_buffer::get_and_set(1, 99);
            thread_buffer::read()
        });
        let b = scope.spawn(move || {
            thread_buffer::attach();
            snapshot.restore();
            thread_buffer::read()
        });
        (a.join().unwrap(), b.join().unwrap())
    });
    assert_eq!(b, Some(expected));
    assert_eq!(a.map(|words| words[1]), Some(99));
    thread_buffer::detach();
}

#[cfg(not(target_arch = "wasm32"))]
#[test]
fn spawned_threads_inherit_context() {
    thread_buffer::attach();
    thread_buffer::get_and_set(3, 5);
    let seen = super::spawn(|| {
        let words = thread_buffer::read();
        thread_buffer::get_and_set(3, 6);
        words
    })
    .join()
    .unwrap();
    assert_eq!(seen.map(|words| words[3]), Some(5));
    assert_eq!(thread_buffer::read().map(|words| words[3]), Some(5));
    thread_buffer::detach();
}

// SPDX-License-Identifier: MIT OR Apache-2.0

//! Scoped activation of a context instance.

use std::marker::PhantomData;

use crate::accessor::ContextAccessor;
use crate::descriptor::ContextType;
use crate::value::{CAPACITY, Word};

/**
A context instance that is active on the current thread until this handle is dropped.

The handle remembers what it replaced. Dropping it writes the previous instance back,
or the type's previous slot words when it was activated without one, so nested
activations unwind in reverse order with ordinary scoping, including on early return
and panic.

```
use context_slots::{ContextExt, ContextType, Declaration};

#[derive(Clone)]
struct Phase {
    name: &'static str,
}

impl ContextType for Phase {
    const TYPE_ID: &'static str = "demo.phase";

    fn declare(declaration: &mut Declaration<Self>) {
        declaration.field("name", |p| &p.name, |p| &mut p.name);
    }
}

let outer = Phase { name: "load" }.activate();
{
    let inner = outer.nest(Phase { name: "parse" });
    assert_eq!(inner.get().name, "parse");
}
// "load" is current again
outer.close();
```

Handles are tied to the thread that created them, because the buffer they restore is.
*/
#[must_use = "the context is deactivated as soon as this handle is dropped"]
pub struct Captured<T: ContextType> {
    accessor: ContextAccessor<T>,
    parent: Option<T>,
    saved: Option<[Word; CAPACITY]>,
    current: T,
    _thread_bound: PhantomData<*const ()>,
}

impl<T: ContextType> Captured<T> {
    pub(crate) fn new(accessor: ContextAccessor<T>, parent: Option<T>, current: T) -> Self {
        Self::install(accessor, parent, None, current)
    }

    /// Activates `current` over whatever the type's slots hold now.
    pub(crate) fn activate(accessor: ContextAccessor<T>, current: T) -> Self {
        let saved = accessor.save_slots();
        Self::install(accessor, None, saved, current)
    }

    fn install(
        accessor: ContextAccessor<T>,
        parent: Option<T>,
        saved: Option<[Word; CAPACITY]>,
        current: T,
    ) -> Self {
        if accessor.capturing() {
            accessor.write(&current);
        }
        Captured {
            accessor,
            parent,
            saved,
            current,
            _thread_bound: PhantomData,
        }
    }

    /// The active instance.
    pub fn get(&self) -> &T {
        &self.current
    }

    /// The instance this handle will restore, if any.
    pub fn parent(&self) -> Option<&T> {
        self.parent.as_ref()
    }

    pub fn accessor(&self) -> &ContextAccessor<T> {
        &self.accessor
    }

    /// Mutates the active instance and writes it again.
    pub fn update<F: FnOnce(&mut T)>(&mut self, f: F) {
        f(&mut self.current);
        if self.accessor.capturing() {
            self.accessor.write(&self.current);
        }
    }

    /// Activates `next` inside this handle. Dropping the result makes this instance
    /// current again.
    pub fn nest(&self, next: T) -> Captured<T>
    where
        T: Clone,
    {
        Captured::new(self.accessor.clone(), Some(self.current.clone()), next)
    }

    /// Activates a copy of the current instance, for changing it temporarily through
    /// [`update`](Self::update).
    pub fn capture(&self) -> Captured<T>
    where
        T: Clone,
    {
        self.nest(self.current.clone())
    }

    /// Deactivates the context now.
    pub fn close(self) {}
}

impl<T: ContextType> Drop for Captured<T> {
    fn drop(&mut self) {
        match (&self.parent, &self.saved) {
            (Some(parent), _) => self.accessor.write(parent),
            (None, Some(saved)) => self.accessor.restore_slots(saved),
            (None, None) => self.accessor.clear_all(),
        }
    }
}

impl<T: ContextType + std::fmt::Debug> std::fmt::Debug for Captured<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Captured")
            .field("parent", &self.parent)
            .field("current", &self.current)
            .finish()
    }
}

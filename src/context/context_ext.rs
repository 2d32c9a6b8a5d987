// SPDX-License-Identifier: MIT OR Apache-2.0

//! The convenience API available on every context type.

use super::captured::Captured;
use crate::accessor::ContextAccessor;
use crate::descriptor::ContextType;
use crate::registry::ContextRegistry;

/**
Methods for using a [`ContextType`] through the global registry.

Implemented for every context type. The type is registered on first use.

# Panics

Every method panics if `Self` has an invalid declaration (see
[`RegistrationError`](crate::RegistrationError)). Use
[`ContextRegistry::get_or_register`] directly to handle that case.
*/
pub trait ContextExt: ContextType {
    /// The accessor for this type in the global registry.
    fn accessor() -> ContextAccessor<Self> {
        match ContextRegistry::global().get_or_register::<Self>() {
            Ok(accessor) => accessor,
            Err(error) => panic!("{error}"),
        }
    }

    /// Writes this instance into the current thread's context, if a session is recording.
    fn set(&self) {
        let accessor = Self::accessor();
        if accessor.capturing() {
            accessor.write(self);
        }
    }

    /// Clears this type's context on the current thread and resets this instance's fields,
    /// if a session is recording.
    fn unset(&mut self) {
        let accessor = Self::accessor();
        if accessor.capturing() {
            accessor.clear(Some(self));
        }
    }

    /// Whether this type was granted slots.
    fn is_active(&self) -> bool {
        Self::accessor().is_active()
    }

    /// Activates this instance until the returned handle is dropped.
    fn activate(self) -> Captured<Self> {
        Self::accessor().activate(self)
    }

    /// Activates a copy of this instance. Dropping the handle writes `self` back.
    fn capture(&self) -> Captured<Self>
    where
        Self: Clone,
    {
        Captured::new(Self::accessor(), Some(self.clone()), self.clone())
    }
}

impl<T: ContextType> ContextExt for T {}

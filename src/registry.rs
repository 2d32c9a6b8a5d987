// SPDX-License-Identifier: MIT OR Apache-2.0

/*!
The process-wide registry of context types.

The registry owns the shared slot space. The first time a context type is seen its
declaration is turned into descriptors and, if the host allows it, a contiguous run of
free slots is carved out for it. The resulting [`ContextAccessor`] is remembered for the
life of the registry, so every later lookup of the same type returns the same handle.

Allocation happens under a single mutex. Deriving descriptors runs the type's
declaration, which is user code, so that part happens outside the lock and the result
is re-checked once the lock is held.

```
use context_slots::{ContextRegistry, ContextType, Declaration, Recorder, RecorderConfig};
use std::sync::Arc;

struct Tenant {
    id: u32,
}

impl ContextType for Tenant {
    const TYPE_ID: &'static str = "demo.tenant";

    fn declare(declaration: &mut Declaration<Self>) {
        declaration.field("id", |t| &t.id, |t| &mut t.id);
    }
}

let registry = ContextRegistry::new(Arc::new(Recorder::new(RecorderConfig::default())));
let accessor = registry.get_or_register::<Tenant>().unwrap();
assert_eq!(accessor.offset(), 0);
assert_eq!(registry.used_slots(), 1);
```
*/

use crate::accessor::{ContextAccessor, SlotRange};
use crate::descriptor::{ContextType, ContextTypeId, RegisteredAttribute, derive};
use crate::error::{Refusal, RegistrationError};
use crate::host::Host;
use crate::recorder::Recorder;
use crate::value::CAPACITY;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};
use wasm_safe_mutex::Mutex;

struct RegistryState {
    slot_pointer: u8,
    table: [Option<RegisteredAttribute>; CAPACITY],
    owners: HashMap<ContextTypeId, TypeId>,
    accessors: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl RegistryState {
    fn new() -> Self {
        RegistryState {
            slot_pointer: 0,
            table: Default::default(),
            owners: HashMap::new(),
            accessors: HashMap::new(),
        }
    }

    fn accessor<T: ContextType>(&self) -> Option<ContextAccessor<T>> {
        self.accessors
            .get(&TypeId::of::<T>())
            .and_then(|accessor| accessor.downcast_ref::<ContextAccessor<T>>())
            .cloned()
    }
}

/// What happened inside the lock; logged once the lock is released.
enum Outcome {
    Memoized,
    Granted(SlotRange),
    Refused(Refusal),
}

/// Maps context types to slot ranges in the shared buffer.
pub struct ContextRegistry {
    host: Arc<dyn Host>,
    state: Mutex<RegistryState>,
}

impl std::fmt::Debug for ContextRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextRegistry")
            .field("host", &self.host)
            .field("used_slots", &self.used_slots())
            .finish_non_exhaustive()
    }
}

static GLOBAL_REGISTRY: OnceLock<ContextRegistry> = OnceLock::new();

impl ContextRegistry {
    /// Creates a registry with an empty slot space, answering to `host`.
    pub fn new(host: Arc<dyn Host>) -> Self {
        ContextRegistry {
            host,
            state: Mutex::new(RegistryState::new()),
        }
    }

    /// The process-wide registry, backed by [`Recorder::global`].
    pub fn global() -> &'static ContextRegistry {
        GLOBAL_REGISTRY.get_or_init(|| {
            let host: Arc<dyn Host> = Recorder::global().clone();
            ContextRegistry::new(host)
        })
    }

    pub fn host(&self) -> &Arc<dyn Host> {
        &self.host
    }

    /**
    Returns the accessor for `T`, registering `T` on first use.

    A declaration problem is returned as an error every time it is asked for. A
    registration the host turns down is not an error: the type gets an inactive accessor
    (see [`ContextAccessor::refusal`]) and keeps it from then on.
    */
    pub fn get_or_register<T: ContextType>(&self) -> Result<ContextAccessor<T>, RegistrationError> {
        if let Some(accessor) = self.state.lock_sync().accessor::<T>() {
            return Ok(accessor);
        }

        let type_id = ContextTypeId::of::<T>();
        let descriptors = match derive::<T>() {
            Ok(descriptors) => descriptors,
            Err(error) => {
                report_error(&error);
                return Err(error);
            }
        };

        let (accessor, outcome) = {
            let mut state = self.state.lock_sync();
            if let Some(accessor) = state.accessor::<T>() {
                (accessor, Outcome::Memoized)
            } else {
                let claimed_elsewhere = matches!(
                    state.owners.get(&type_id),
                    Some(owner) if *owner != TypeId::of::<T>()
                );
                if claimed_elsewhere {
                    drop(state);
                    let error = RegistrationError::DuplicateTypeId { type_id };
                    report_error(&error);
                    return Err(error);
                }

                let count = descriptors.len();
                let available = CAPACITY - usize::from(state.slot_pointer);
                let refusal = if !self.host.capture_enabled() {
                    Some(Refusal::CaptureDisabled)
                } else if self.host.sessions_started() {
                    Some(Refusal::SessionsStarted)
                } else if count > available {
                    Some(Refusal::CapacityExhausted {
                        requested: count,
                        available,
                    })
                } else {
                    None
                };

                let (accessor, outcome) = match refusal {
                    Some(refusal) => (
                        ContextAccessor::inactive(self.host.clone(), refusal),
                        Outcome::Refused(refusal),
                    ),
                    None => {
                        // count <= available <= CAPACITY
                        let range = SlotRange::new(state.slot_pointer, count as u8);
                        for descriptor in &descriptors {
                            let entry = descriptor.registration(range.offset());
                            let slot = usize::from(entry.slot);
                            state.table[slot] = Some(entry);
                        }
                        state.slot_pointer = range.end();
                        self.host.set_used_slots(state.slot_pointer);
                        (
                            ContextAccessor::active(self.host.clone(), range, descriptors),
                            Outcome::Granted(range),
                        )
                    }
                };
                state.owners.insert(type_id, TypeId::of::<T>());
                state
                    .accessors
                    .insert(TypeId::of::<T>(), Box::new(accessor.clone()));
                (accessor, outcome)
            }
        };

        report_outcome(type_id, &outcome);
        Ok(accessor)
    }

    /// Registers `T`, returning whether it was granted slots.
    pub fn register<T: ContextType>(&self) -> Result<bool, RegistrationError> {
        self.get_or_register::<T>()
            .map(|accessor| accessor.is_active())
    }

    /// Every granted attribute, in slot order.
    pub fn registrations(&self) -> Vec<RegisteredAttribute> {
        let state = self.state.lock_sync();
        state
            .table
            .iter()
            .take(usize::from(state.slot_pointer))
            .flatten()
            .cloned()
            .collect()
    }

    /// Number of slots handed out so far.
    pub fn used_slots(&self) -> u8 {
        self.state.lock_sync().slot_pointer
    }
}

fn report_error(error: &RegistrationError) {
    let message = error.to_string();
    logwise::error_sync!(
        "Context type registration failed: {message}",
        message = message.as_str()
    );
}

fn report_outcome(type_id: ContextTypeId, outcome: &Outcome) {
    match outcome {
        Outcome::Memoized => {}
        Outcome::Granted(range) => {
            logwise::debuginternal_sync!(
                "Registered context type {type_id} at slots {offset}..{end}",
                type_id = type_id.as_str(),
                offset = range.offset(),
                end = range.end()
            );
        }
        Outcome::Refused(Refusal::CaptureDisabled) => {
            logwise::debuginternal_sync!(
                "Context capture is disabled; {type_id} will not be recorded",
                type_id = type_id.as_str()
            );
        }
        Outcome::Refused(Refusal::SessionsStarted) => {
            logwise::info_sync!(
                "Context type {type_id} registered after a recording session started and will not be recorded",
                type_id = type_id.as_str()
            );
        }
        Outcome::Refused(Refusal::CapacityExhausted {
            requested,
            available,
        }) => {
            let requested = *requested as u64;
            let available = *available as u64;
            logwise::warn_sync!(
                "Context type {type_id} needs {requested} slots but only {available} are left; it will not be recorded",
                type_id = type_id.as_str(),
                requested = requested,
                available = available
            );
        }
    }
}

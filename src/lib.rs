//SPDX-License-Identifier: MIT OR Apache-2.0
/*!
# context_slots

context_slots attaches small, typed context to the current thread so that telemetry events
emitted there carry it, without the code emitting those events knowing anything about it.

# Development status

context_slots is experimental and the API may change.

# The problem

An event recorder sees a method call, a lock wait, a socket read. It does not see that the
read belongs to tenant 42's checkout request. Passing that information down to every place
that might emit an event is not practical, and formatting it into strings at emission time
is too slow for a recorder that runs in production.

# The model

A *context type* is an ordinary struct that declares a handful of attributes: strings,
booleans, characters and integers.

```rust
use context_slots::{ContextType, Declaration};

struct Checkout {
    tenant: u32,
    route: String,
}

impl ContextType for Checkout {
    const TYPE_ID: &'static str = "shop.checkout";

    fn declare(declaration: &mut Declaration<Self>) {
        declaration.field("tenant", |c| &c.tenant, |c| &mut c.tenant);
        declaration
            .field("route", |c| &c.route, |c| &mut c.route)
            .description("Matched route template");
    }
}
```

Every thread taking part in recording has a buffer of [`CAPACITY`] machine words. The
first time a context type is used, the [`ContextRegistry`] hands it a fixed run of slots in
that buffer. From then on, activating an instance writes its attributes into those slots
(strings as keys into the host's string table), and every event emitted on the thread
copies the whole buffer, see [`stamp_event`].

| Attribute type            | Slot word                                   |
|---------------------------|---------------------------------------------|
| `bool`                    | `0` for `true`, `1` for `false`             |
| `char`                    | its scalar value                            |
| integers up to 64 bits    | sign-extended to 64 bits                    |
| `String`, `&str`          | interned key; `0` when absent or empty      |

Floating point, 128-bit and pointer-sized values are rejected at registration.

# The slot space is small

There are only [`CAPACITY`] slots, shared by every context type in the process, and they
cannot be reassigned once a recording session has started. A type that does not fit, or
that arrives too late, is not an error: it gets an *inactive* accessor, and using it does
nothing. See [`Refusal`].

# Activating context

```rust
# use context_slots::{ContextType, Declaration};
# #[derive(Clone)]
# struct Checkout { tenant: u32 }
# impl ContextType for Checkout {
#     const TYPE_ID: &'static str = "shop.checkout";
#     fn declare(declaration: &mut Declaration<Self>) {
#         declaration.field("tenant", |c| &c.tenant, |c| &mut c.tenant);
#     }
# }
use context_slots::ContextExt;

let checkout = Checkout { tenant: 42 }.activate();
// events emitted here are tagged with tenant 42
drop(checkout);
```

[`Captured`] handles nest, and each one restores what it replaced when dropped.

# Multithreading

Buffers are thread-local. If you hand work to another thread or an async executor, take a
[`ContextSnapshot`] with it, or use [`spawn`] and [`ApplySnapshot`], which do that for you.

# Logging

Registration outcomes and attribute lookup mistakes are reported through
[logwise](https://docs.rs/logwise). Enable the `logwise_internal` feature to see
successful registrations.
*/

mod accessor;
pub mod context;
mod descriptor;
mod error;
mod event;
pub mod host;
mod recorder;
mod registry;
pub mod thread_buffer;
mod value;

logwise::declare_logging_domain!();

pub use accessor::{ContextAccessor, SlotRange};
pub use context::{ApplySnapshot, Captured, ContextExt, ContextSnapshot, spawn};
pub use descriptor::{
    AttributeDescriptor, ContextType, ContextTypeId, Declaration, DeclaredAttribute,
    RegisteredAttribute,
};
pub use error::{Refusal, RegistrationError};
pub use event::{EventWriter, stamp_event};
pub use host::Host;
pub use recorder::{ENABLED_ENV, Recorder, RecorderConfig, Session};
pub use registry::ContextRegistry;
pub use value::{AttributeKind, AttributeType, AttributeValue, CAPACITY, Word};

// SPDX-License-Identifier: MIT OR Apache-2.0

//! Activating context instances and moving context between threads.
//!
//! # Overview
//!
//! - [`ContextExt`]: `set`/`unset`/`activate` on any [`ContextType`](crate::ContextType),
//!   through the global registry
//! - [`Captured`]: a scoped activation that restores what it replaced when dropped
//! - [`ContextSnapshot`]: a copy of the thread's buffer for propagation
//! - [`ApplySnapshot`]: a [`Future`] wrapper that installs a snapshot around each poll
//! - [`spawn`]: a thread that inherits the caller's context
//!
//! # Setting context
//!
//! ```rust
//! use context_slots::{ContextExt, ContextType, Declaration};
//!
//! struct Upload {
//!     bucket: String,
//!     bytes: u32,
//! }
//!
//! impl ContextType for Upload {
//!     const TYPE_ID: &'static str = "demo.upload";
//!
//!     fn declare(declaration: &mut Declaration<Self>) {
//!         declaration.field("bucket", |u| &u.bucket, |u| &mut u.bucket);
//!         declaration.field("bytes", |u| &u.bytes, |u| &mut u.bytes);
//!     }
//! }
//!
//! let mut upload = Upload { bucket: "logs".to_string(), bytes: 512 };
//! upload.set();
//! // ... events emitted here carry bucket and bytes while a session records ...
//! upload.unset();
//! ```
//!
//! Writes only happen while the host has a session recording; otherwise `set` and
//! `unset` return immediately.
//!
//! # Propagation
//!
//! Context lives in a per-thread buffer, so work handed to another thread or executor
//! takes a [`ContextSnapshot`] with it:
//!
//! ```rust
//! use context_slots::ContextSnapshot;
//! # async fn send_report() {}
//!
//! # async fn example() {
//! let future = ContextSnapshot::capture().apply(send_report());
//! future.await;
//! # }
//! ```
//!
//! [`Future`]: std::future::Future

mod apply_snapshot;
mod captured;
mod context_ext;
mod snapshot;

#[cfg(test)]
mod tests;

pub use apply_snapshot::ApplySnapshot;
pub use captured::Captured;
pub use context_ext::ContextExt;
pub use snapshot::{ContextSnapshot, spawn};

// SPDX-License-Identifier: MIT OR Apache-2.0

//! The narrow interface between context registration and the recording host.
//!
//! The registry and accessors never decide on their own whether context should be
//! captured, and they never own string storage. They ask a [`Host`]. The crate ships
//! [`Recorder`](crate::Recorder), an in-process host, and uses it for the global registry;
//! embedders with their own recording pipeline implement this trait instead.

use std::fmt::Debug;

pub trait Host: Debug + Send + Sync {
    /**
    Whether context capture is available at all.

    The registry refuses every registration while this is false.
    */
    fn capture_enabled(&self) -> bool;

    /**
    Whether any session currently wants context data.

    The context-type API checks this before touching the thread buffer, so that a
    process with no active session pays nothing for `set`/`unset`.
    */
    fn should_capture(&self) -> bool;

    /**
    Whether a recording session has ever been started.

    Registration after this point is refused: attributes cannot be added to live sessions.
    */
    fn sessions_started(&self) -> bool;

    /**
    Stores `value` in the host string table and returns its key.

    Keys are never `0`; `0` is reserved for an absent string.
    */
    fn intern_string(&self, value: &str) -> u32;

    /**
    Informs the host how many slots are in use, so the serialization path knows how many
    words of each buffer are meaningful.
    */
    fn set_used_slots(&self, used: u8);
}

/*
Boilerplate notes.

# Host

Hosts are shared process-wide behind Arc, so Send + Sync is required.
Clone makes no sense for something holding session state.
PartialEq/Hash: provenance vs. data equality is unclear, skip.
Default: the host decides its own construction.
*/

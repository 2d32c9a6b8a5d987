// SPDX-License-Identifier: MIT OR Apache-2.0

//! An in-process recording host.
//!
//! [`Recorder`] implements [`Host`] with a handful of atomics and a string table.
//! It is the host behind [`ContextRegistry::global`](crate::ContextRegistry::global),
//! and tests build private instances of it to get isolated registries.
//!
//! # Configuration
//!
//! Context capture can be switched off for the whole process through the
//! `CONTEXT_SLOTS_ENABLED` environment variable (`0`, `false` or `off` disable it),
//! read once when the global recorder is first used:
//!
//! ```
//! use context_slots::RecorderConfig;
//!
//! let config = RecorderConfig::from_env();
//! # let _ = config;
//! ```
//!
//! # Sessions
//!
//! ```
//! use context_slots::{Recorder, RecorderConfig};
//! use context_slots::host::Host;
//!
//! let recorder = Recorder::new(RecorderConfig::default());
//! assert!(!recorder.should_capture());
//! {
//!     let _session = recorder.start_session();
//!     assert!(recorder.should_capture());
//! }
//! assert!(!recorder.should_capture());
//! // Once a session has started, late registration is refused for good.
//! assert!(recorder.sessions_started());
//! ```

use crate::host::Host;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use wasm_safe_mutex::Mutex;

/// Environment variable consulted by [`RecorderConfig::from_env`].
pub const ENABLED_ENV: &str = "CONTEXT_SLOTS_ENABLED";

/// Construction options for a [`Recorder`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RecorderConfig {
    /// Whether the context feature is enabled. Defaults to `true`.
    pub context_enabled: bool,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        RecorderConfig {
            context_enabled: true,
        }
    }
}

impl RecorderConfig {
    /// Reads [`ENABLED_ENV`]; unset or unrecognized values keep the default.
    pub fn from_env() -> Self {
        let mut config = RecorderConfig::default();
        if let Ok(value) = std::env::var(ENABLED_ENV) {
            match value.trim().to_ascii_lowercase().as_str() {
                "0" | "false" | "off" | "no" => config.context_enabled = false,
                "1" | "true" | "on" | "yes" => config.context_enabled = true,
                _ => {}
            }
        }
        config
    }
}

#[derive(Debug, Default)]
struct StringPool {
    keys: HashMap<String, u32>,
    values: Vec<String>,
}

impl StringPool {
    fn intern(&mut self, value: &str) -> u32 {
        if let Some(key) = self.keys.get(value) {
            return *key;
        }
        self.values.push(value.to_string());
        // key 0 is reserved for "absent"
        let key = self.values.len() as u32;
        self.keys.insert(value.to_string(), key);
        key
    }

    fn resolve(&self, key: u32) -> Option<&str> {
        let index = usize::try_from(key).ok()?.checked_sub(1)?;
        self.values.get(index).map(String::as_str)
    }
}

/// An in-process [`Host`].
pub struct Recorder {
    available: AtomicBool,
    context_enabled: AtomicBool,
    sessions_started: AtomicBool,
    active_sessions: AtomicUsize,
    used_slots: AtomicU8,
    strings: Mutex<StringPool>,
}

impl std::fmt::Debug for Recorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Recorder")
            .field("available", &self.available.load(Ordering::Relaxed))
            .field("context_enabled", &self.context_enabled())
            .field("sessions_started", &self.sessions_started())
            .field("active_sessions", &self.active_sessions())
            .field("used_slots", &self.used_slots())
            .finish_non_exhaustive()
    }
}

static GLOBAL_RECORDER: OnceLock<Arc<Recorder>> = OnceLock::new();

impl Recorder {
    pub fn new(config: RecorderConfig) -> Self {
        Recorder {
            available: AtomicBool::new(true),
            context_enabled: AtomicBool::new(config.context_enabled),
            sessions_started: AtomicBool::new(false),
            active_sessions: AtomicUsize::new(0),
            used_slots: AtomicU8::new(0),
            strings: Mutex::new(StringPool::default()),
        }
    }

    /// The process-wide recorder, configured from the environment on first use.
    pub fn global() -> &'static Arc<Recorder> {
        GLOBAL_RECORDER.get_or_init(|| Arc::new(Recorder::new(RecorderConfig::from_env())))
    }

    /// Starts a session. The session ends when the returned guard is dropped.
    pub fn start_session(&self) -> Session<'_> {
        self.sessions_started.store(true, Ordering::Release);
        self.active_sessions.fetch_add(1, Ordering::AcqRel);
        Session { recorder: self }
    }

    /// Number of sessions currently running.
    pub fn active_sessions(&self) -> usize {
        self.active_sessions.load(Ordering::Acquire)
    }

    /// Marks the recorder as available or shut down.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::Release);
    }

    pub fn set_context_enabled(&self, enabled: bool) {
        self.context_enabled.store(enabled, Ordering::Release);
    }

    pub fn context_enabled(&self) -> bool {
        self.context_enabled.load(Ordering::Acquire)
    }

    /// The slot count last reported through [`Host::set_used_slots`].
    pub fn used_slots(&self) -> u8 {
        self.used_slots.load(Ordering::Acquire)
    }

    /// Looks up an interned string by key.
    pub fn resolve(&self, key: u32) -> Option<String> {
        self.strings.lock_sync().resolve(key).map(str::to_string)
    }
}

impl Host for Recorder {
    fn capture_enabled(&self) -> bool {
        self.available.load(Ordering::Acquire) && self.context_enabled()
    }

    fn should_capture(&self) -> bool {
        self.available.load(Ordering::Acquire)
            && self.active_sessions() > 0
            && self.context_enabled()
    }

    fn sessions_started(&self) -> bool {
        self.sessions_started.load(Ordering::Acquire)
    }

    fn intern_string(&self, value: &str) -> u32 {
        self.strings.lock_sync().intern(value)
    }

    fn set_used_slots(&self, used: u8) {
        self.used_slots.store(used, Ordering::Release);
    }
}

/// A running session on a [`Recorder`].
#[derive(Debug)]
#[must_use = "the session ends when this guard is dropped"]
pub struct Session<'a> {
    recorder: &'a Recorder,
}

impl Drop for Session<'_> {
    fn drop(&mut self) {
        self.recorder.active_sessions.fetch_sub(1, Ordering::AcqRel);
    }
}

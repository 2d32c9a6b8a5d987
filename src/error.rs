// SPDX-License-Identifier: MIT OR Apache-2.0

//! Registration errors and refusals.
//!
//! A [`RegistrationError`] means the context type's declaration is wrong. It is a
//! programming error and is returned loudly. A [`Refusal`] is a policy decision by the
//! registry (no capture, too late, no room); the type gets an inactive accessor that
//! behaves as a no-op, and callers never have to handle it.

use crate::descriptor::ContextTypeId;
use crate::value::AttributeKind;
use std::fmt::Display;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistrationError {
    #[error("context type declares an empty type id")]
    EmptyTypeId,

    #[error("context type `{type_id}` declares an attribute with an empty name")]
    EmptyAttributeName { type_id: ContextTypeId },

    #[error("context type `{type_id}` declares attribute `{attribute}` more than once")]
    DuplicateAttribute {
        type_id: ContextTypeId,
        attribute: &'static str,
    },

    #[error(
        "attribute `{attribute}` of context type `{type_id}` has unsupported value type `{kind}`"
    )]
    UnsupportedType {
        type_id: ContextTypeId,
        attribute: &'static str,
        kind: AttributeKind,
    },

    #[error("context type id `{type_id}` is already declared by another type")]
    DuplicateTypeId { type_id: ContextTypeId },

    #[error("context type `{type_id}` declares {count} attributes, more than can be ordered")]
    TooManyAttributes { type_id: ContextTypeId, count: usize },
}

/// Why a context type was given an inactive accessor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Refusal {
    /// The host has context capture switched off.
    CaptureDisabled,
    /// A session had already started; attributes cannot be added to live sessions.
    SessionsStarted,
    /// Not enough free slots left.
    CapacityExhausted { requested: usize, available: usize },
}

impl Refusal {
    /// The offset sentinel recorded hosts use for this refusal.
    pub fn code(&self) -> i8 {
        match self {
            Refusal::CaptureDisabled => -1,
            Refusal::SessionsStarted => -2,
            Refusal::CapacityExhausted { .. } => -3,
        }
    }
}

impl Display for Refusal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Refusal::CaptureDisabled => f.write_str("context capture is disabled"),
            Refusal::SessionsStarted => {
                f.write_str("a recording session has already started")
            }
            Refusal::CapacityExhausted {
                requested,
                available,
            } => write!(
                f,
                "context capacity exhausted ({requested} slots requested, {available} available)"
            ),
        }
    }
}

// SPDX-License-Identifier: MIT OR Apache-2.0

//! Attribute value kinds and their word encoding.
//!
//! Every attribute is stored in a single [`Word`] of the thread buffer. Integers and
//! characters are widened, booleans are stored as `0`/`1`, and strings are stored as a
//! key into the host's string table.

use crate::host::Host;
use std::fmt::Display;

/// One slot of a thread's context buffer.
pub type Word = u64;

/// Total number of slots shared by every registered context type in the process.
pub const CAPACITY: usize = 8;

/// The declared value type of an attribute.
///
/// Kinds are derived from the Rust type of the declared field or method through
/// [`AttributeType`]. [`AttributeKind::Unsupported`] types compile, but registering a
/// context type that declares one fails with
/// [`RegistrationError::UnsupportedType`](crate::RegistrationError::UnsupportedType).
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttributeKind {
    Bool,
    Char,
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    String,
    /// A type that cannot be stored in a slot. Carries the Rust type name.
    Unsupported(&'static str),
}

impl AttributeKind {
    /// Whether values of this kind can be stored in a slot.
    pub fn is_supported(&self) -> bool {
        !matches!(self, AttributeKind::Unsupported(_))
    }

    /// A short name for the kind, used in diagnostics and errors.
    pub fn name(&self) -> &'static str {
        match self {
            AttributeKind::Bool => "bool",
            AttributeKind::Char => "char",
            AttributeKind::I8 => "i8",
            AttributeKind::I16 => "i16",
            AttributeKind::I32 => "i32",
            AttributeKind::I64 => "i64",
            AttributeKind::U8 => "u8",
            AttributeKind::U16 => "u16",
            AttributeKind::U32 => "u32",
            AttributeKind::U64 => "u64",
            AttributeKind::String => "string",
            AttributeKind::Unsupported(name) => name,
        }
    }

    /// Whether `value` may be stored in an attribute of this kind.
    ///
    /// Integers must also fit the declared width.
    pub(crate) fn accepts(&self, value: &AttributeValue) -> bool {
        match (self, value) {
            (AttributeKind::Bool, AttributeValue::Bool(_)) => true,
            (AttributeKind::Char, AttributeValue::Char(_)) => true,
            (AttributeKind::String, AttributeValue::Str(_)) => true,
            (kind, AttributeValue::Int(v)) => kind.fits(i128::from(*v)),
            (kind, AttributeValue::UInt(v)) => kind.fits(i128::from(*v)),
            _ => false,
        }
    }

    fn fits(&self, value: i128) -> bool {
        match self {
            AttributeKind::I8 => i8::try_from(value).is_ok(),
            AttributeKind::I16 => i16::try_from(value).is_ok(),
            AttributeKind::I32 => i32::try_from(value).is_ok(),
            AttributeKind::I64 => i64::try_from(value).is_ok(),
            AttributeKind::U8 => u8::try_from(value).is_ok(),
            AttributeKind::U16 => u16::try_from(value).is_ok(),
            AttributeKind::U32 => u32::try_from(value).is_ok(),
            AttributeKind::U64 => u64::try_from(value).is_ok(),
            _ => false,
        }
    }
}

impl Display for AttributeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A dynamically typed attribute value, used by name-keyed access such as
/// [`ContextAccessor::set_attribute`](crate::ContextAccessor::set_attribute).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AttributeValue {
    Bool(bool),
    Char(char),
    Int(i64),
    /// Unsigned values that may not fit an `i64`.
    UInt(u64),
    Str(String),
}

impl AttributeValue {
    /// Encodes the value into a slot word.
    pub(crate) fn encode(&self, host: &dyn Host) -> Word {
        match self {
            AttributeValue::Bool(b) => encode_bool(*b),
            AttributeValue::Char(c) => encode_char(*c),
            AttributeValue::Int(v) => widen(*v),
            AttributeValue::UInt(v) => *v,
            AttributeValue::Str(s) => encode_str(host, s),
        }
    }
}

impl From<bool> for AttributeValue {
    fn from(value: bool) -> Self {
        AttributeValue::Bool(value)
    }
}

impl From<char> for AttributeValue {
    fn from(value: char) -> Self {
        AttributeValue::Char(value)
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        AttributeValue::Str(value)
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        AttributeValue::Str(value.to_string())
    }
}

macro_rules! int_value_from {
    ($($t:ty),*) => {
        $(
            impl From<$t> for AttributeValue {
                fn from(value: $t) -> Self {
                    AttributeValue::Int(i64::from(value))
                }
            }
        )*
    };
}

int_value_from!(i8, i16, i32, i64, u8, u16, u32);

impl From<u64> for AttributeValue {
    fn from(value: u64) -> Self {
        AttributeValue::UInt(value)
    }
}

/// Booleans are stored inverted: `true` is `0` and `false` is `1`.
///
/// This matches the encoding readers of recorded buffers already expect.
#[inline]
pub(crate) fn encode_bool(value: bool) -> Word {
    if value { 0 } else { 1 }
}

#[inline]
pub(crate) fn encode_char(value: char) -> Word {
    Word::from(u32::from(value))
}

/// Sign-extends to 64 bits, then reinterprets as a word.
#[inline]
pub(crate) fn widen(value: i64) -> Word {
    value as Word
}

/// Absent and empty strings both encode as `0`.
#[inline]
pub(crate) fn encode_str(host: &dyn Host, value: &str) -> Word {
    if value.is_empty() {
        0
    } else {
        Word::from(host.intern_string(value))
    }
}

/// A Rust type that can be declared as a context attribute.
///
/// Implemented for `bool`, `char`, the integer types up to 64 bits, `String`,
/// `Option<String>` and `&'static str`. Floating point, 128-bit and pointer-sized
/// integers implement it with an [`AttributeKind::Unsupported`] kind so that a
/// declaration using them is rejected at registration.
pub trait AttributeType: 'static {
    const KIND: AttributeKind;

    /// Encodes the value into a slot word.
    fn encode(&self, host: &dyn Host) -> Word;

    /// Resets the value to its cleared state: absent for strings, zero otherwise.
    fn reset(&mut self);
}

impl AttributeType for bool {
    const KIND: AttributeKind = AttributeKind::Bool;
    fn encode(&self, _host: &dyn Host) -> Word {
        encode_bool(*self)
    }
    fn reset(&mut self) {
        *self = false;
    }
}

impl AttributeType for char {
    const KIND: AttributeKind = AttributeKind::Char;
    fn encode(&self, _host: &dyn Host) -> Word {
        encode_char(*self)
    }
    fn reset(&mut self) {
        *self = '\0';
    }
}

macro_rules! integer_attribute {
    ($($t:ty => $kind:ident),*) => {
        $(
            impl AttributeType for $t {
                const KIND: AttributeKind = AttributeKind::$kind;
                fn encode(&self, _host: &dyn Host) -> Word {
                    widen(i64::from(*self))
                }
                fn reset(&mut self) {
                    *self = 0;
                }
            }
        )*
    };
}

integer_attribute!(i8 => I8, i16 => I16, i32 => I32, i64 => I64, u8 => U8, u16 => U16, u32 => U32);

impl AttributeType for u64 {
    const KIND: AttributeKind = AttributeKind::U64;
    fn encode(&self, _host: &dyn Host) -> Word {
        *self
    }
    fn reset(&mut self) {
        *self = 0;
    }
}

impl AttributeType for String {
    const KIND: AttributeKind = AttributeKind::String;
    fn encode(&self, host: &dyn Host) -> Word {
        encode_str(host, self)
    }
    fn reset(&mut self) {
        self.clear();
    }
}

impl AttributeType for Option<String> {
    const KIND: AttributeKind = AttributeKind::String;
    fn encode(&self, host: &dyn Host) -> Word {
        self.as_deref().map_or(0, |s| encode_str(host, s))
    }
    fn reset(&mut self) {
        *self = None;
    }
}

impl AttributeType for &'static str {
    const KIND: AttributeKind = AttributeKind::String;
    fn encode(&self, host: &dyn Host) -> Word {
        encode_str(host, self)
    }
    fn reset(&mut self) {
        *self = "";
    }
}

macro_rules! unsupported_attribute {
    ($($t:ty),*) => {
        $(
            impl AttributeType for $t {
                const KIND: AttributeKind = AttributeKind::Unsupported(stringify!($t));
                fn encode(&self, _host: &dyn Host) -> Word {
                    0
                }
                fn reset(&mut self) {
                    *self = Default::default();
                }
            }
        )*
    };
}

unsupported_attribute!(f32, f64, i128, u128, isize, usize);

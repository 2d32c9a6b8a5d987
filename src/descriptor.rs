// SPDX-License-Identifier: MIT OR Apache-2.0

//! Context type declarations and the attribute descriptors derived from them.
//!
//! A context type describes its attributes once, in [`ContextType::declare`]. Each entry
//! names the attribute and says how to read it: either a *field*, which can also be reset
//! when the context is cleared, or a *method*, which is read-only.
//!
//! ```
//! use context_slots::{ContextType, Declaration};
//!
//! struct Request {
//!     route: String,
//!     attempt: u32,
//! }
//!
//! impl Request {
//!     fn is_retry(&self) -> bool {
//!         self.attempt > 0
//!     }
//! }
//!
//! impl ContextType for Request {
//!     const TYPE_ID: &'static str = "http.request";
//!
//!     fn declare(declaration: &mut Declaration<Self>) {
//!         declaration
//!             .field("route", |r| &r.route, |r| &mut r.route)
//!             .label("Route")
//!             .description("Matched route template");
//!         declaration.field("attempt", |r| &r.attempt, |r| &mut r.attempt);
//!         declaration.method("retry", Request::is_retry);
//!     }
//! }
//! ```

use crate::error::RegistrationError;
use crate::host::Host;
use crate::value::{AttributeKind, AttributeType, Word};
use std::collections::HashSet;
use std::fmt::Display;

/// The stable identifier a context type declares for itself.
///
/// Unlike [`std::any::TypeId`] it is chosen by the author, so it is the same in every
/// process and on every build.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ContextTypeId(&'static str);

impl ContextTypeId {
    pub const fn new(id: &'static str) -> Self {
        ContextTypeId(id)
    }

    /// The id declared by `T`.
    pub const fn of<T: ContextType>() -> Self {
        ContextTypeId(T::TYPE_ID)
    }

    pub const fn as_str(&self) -> &'static str {
        self.0
    }
}

impl Display for ContextTypeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.0)
    }
}

/// A user type whose attributes can be attached to the current thread.
pub trait ContextType: Sized + 'static {
    /// Stable identifier for this type; see [`ContextTypeId`].
    const TYPE_ID: &'static str;

    /// Lists the attributes of this type. Order of declaration is slot order.
    fn declare(declaration: &mut Declaration<Self>);
}

type ReadFn<T> = Box<dyn Fn(&T, &dyn Host) -> Word + Send + Sync>;
type ResetFn<T> = Box<dyn Fn(&mut T) + Send + Sync>;

/// How an attribute value is read off an instance.
pub(crate) enum Accessor<T> {
    Field { read: ReadFn<T>, reset: ResetFn<T> },
    Method { read: ReadFn<T> },
}

impl<T> Accessor<T> {
    fn read(&self) -> &ReadFn<T> {
        match self {
            Accessor::Field { read, .. } | Accessor::Method { read } => read,
        }
    }
}

/// One attribute as declared, before the registry has seen it.
pub struct DeclaredAttribute<T> {
    name: &'static str,
    label: Option<&'static str>,
    description: &'static str,
    kind: AttributeKind,
    accessor: Accessor<T>,
}

impl<T> DeclaredAttribute<T> {
    /// A human-readable label. Defaults to the name.
    pub fn label(&mut self, label: &'static str) -> &mut Self {
        self.label = Some(label);
        self
    }

    /// Free-text description. Defaults to empty.
    pub fn description(&mut self, description: &'static str) -> &mut Self {
        self.description = description;
        self
    }
}

/// Collects a context type's attributes; see [`ContextType::declare`].
pub struct Declaration<T> {
    attributes: Vec<DeclaredAttribute<T>>,
}

impl<T: 'static> Declaration<T> {
    fn new() -> Self {
        Declaration {
            attributes: Vec::new(),
        }
    }

    /// Declares a field attribute. `get` reads it; `get_mut` lets it be reset on clear.
    pub fn field<V: AttributeType>(
        &mut self,
        name: &'static str,
        get: fn(&T) -> &V,
        get_mut: fn(&mut T) -> &mut V,
    ) -> &mut DeclaredAttribute<T> {
        self.push(
            name,
            V::KIND,
            Accessor::Field {
                read: Box::new(move |target: &T, host: &dyn Host| get(target).encode(host)),
                reset: Box::new(move |target: &mut T| get_mut(target).reset()),
            },
        )
    }

    /// Declares a read-only attribute computed by `read`.
    pub fn method<V: AttributeType>(
        &mut self,
        name: &'static str,
        read: fn(&T) -> V,
    ) -> &mut DeclaredAttribute<T> {
        self.push(
            name,
            V::KIND,
            Accessor::Method {
                read: Box::new(move |target: &T, host: &dyn Host| read(target).encode(host)),
            },
        )
    }

    fn push(
        &mut self,
        name: &'static str,
        kind: AttributeKind,
        accessor: Accessor<T>,
    ) -> &mut DeclaredAttribute<T> {
        self.attributes.push(DeclaredAttribute {
            name,
            label: None,
            description: "",
            kind,
            accessor,
        });
        let last = self.attributes.len() - 1;
        &mut self.attributes[last]
    }
}

/// An immutable description of one registered attribute of `T`.
pub struct AttributeDescriptor<T> {
    order: u8,
    owner_id: ContextTypeId,
    name: &'static str,
    label: &'static str,
    description: &'static str,
    kind: AttributeKind,
    accessor: Accessor<T>,
}

impl<T> AttributeDescriptor<T> {
    /// Position within the owning type's slot range.
    pub fn order(&self) -> u8 {
        self.order
    }

    pub fn owner_id(&self) -> ContextTypeId {
        self.owner_id
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn label(&self) -> &'static str {
        self.label
    }

    pub fn description(&self) -> &'static str {
        self.description
    }

    pub fn kind(&self) -> AttributeKind {
        self.kind
    }

    /// Whether the attribute is a field (and is reset when its context is cleared).
    pub fn is_field(&self) -> bool {
        matches!(self.accessor, Accessor::Field { .. })
    }

    #[inline]
    pub(crate) fn read(&self, target: &T, host: &dyn Host) -> Word {
        (self.accessor.read())(target, host)
    }

    #[inline]
    pub(crate) fn reset(&self, target: &mut T) {
        if let Accessor::Field { reset, .. } = &self.accessor {
            reset(target);
        }
    }

    /// The type-erased table entry for this attribute at `offset + order`.
    pub(crate) fn registration(&self, offset: u8) -> RegisteredAttribute {
        RegisteredAttribute {
            slot: offset + self.order,
            owner_id: self.owner_id,
            name: self.name,
            label: self.label,
            description: self.description,
            kind: self.kind,
        }
    }
}

impl<T> std::fmt::Debug for AttributeDescriptor<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AttributeDescriptor")
            .field("order", &self.order)
            .field("owner_id", &self.owner_id)
            .field("name", &self.name)
            .field("label", &self.label)
            .field("kind", &self.kind)
            .field("field", &self.is_field())
            .finish()
    }
}

/// An entry of the process-wide registration table: what a slot holds.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RegisteredAttribute {
    pub slot: u8,
    pub owner_id: ContextTypeId,
    pub name: &'static str,
    pub label: &'static str,
    pub description: &'static str,
    pub kind: AttributeKind,
}

/// Runs `T`'s declaration and validates it into descriptors with dense orders.
pub(crate) fn derive<T: ContextType>() -> Result<Vec<AttributeDescriptor<T>>, RegistrationError> {
    let type_id = ContextTypeId::of::<T>();
    if type_id.as_str().is_empty() {
        return Err(RegistrationError::EmptyTypeId);
    }
    let mut declaration = Declaration::new();
    T::declare(&mut declaration);

    let count = declaration.attributes.len();
    if count > usize::from(u8::MAX) {
        return Err(RegistrationError::TooManyAttributes { type_id, count });
    }

    let mut seen = HashSet::with_capacity(count);
    let mut descriptors = Vec::with_capacity(count);
    for (order, attribute) in declaration.attributes.into_iter().enumerate() {
        if attribute.name.is_empty() {
            return Err(RegistrationError::EmptyAttributeName { type_id });
        }
        if !seen.insert(attribute.name) {
            return Err(RegistrationError::DuplicateAttribute {
                type_id,
                attribute: attribute.name,
            });
        }
        if !attribute.kind.is_supported() {
            return Err(RegistrationError::UnsupportedType {
                type_id,
                attribute: attribute.name,
                kind: attribute.kind,
            });
        }
        descriptors.push(AttributeDescriptor {
            // bounded by the count check above
            order: order as u8,
            owner_id: type_id,
            name: attribute.name,
            label: attribute.label.unwrap_or(attribute.name),
            description: attribute.description,
            kind: attribute.kind,
            accessor: attribute.accessor,
        });
    }
    Ok(descriptors)
}

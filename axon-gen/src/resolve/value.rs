//! Value conversion descriptors
//!
//! Phase-1 output of value-mode resolution: where a field's value comes
//! from and which conversion turns the raw argument value into the typed
//! host value. The emitters render these against `axon_runtime::scalar`'s
//! named coercion rules.

use crate::ir::{EnumId, MapId, MessageId, TypeRef};

/// Where a field's value is taken from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueSource {
    /// Out-of-band value injected by middleware under this key, bypassing
    /// the GraphQL argument system.
    Context(String),
    /// A GraphQL argument of this name.
    Argument(String),
}

/// The conversion applied to a raw argument value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Conversion {
    /// Infallible scalar coercion.
    Scalar(crate::ir::ScalarKind),
    /// Enum name lookup; can fail on unknown values.
    Enum(EnumId),
    /// Nested input object conversion; can fail.
    Message(MessageId),
    /// Pair-list to map conversion; can fail.
    Map(MapId),
    /// Element-wise conversion of a list.
    List(Box<Conversion>),
}

impl Conversion {
    /// Whether this conversion can fail and must propagate an error.
    /// Scalar coercions are assumed-infallible type assertions.
    pub fn fallible(&self) -> bool {
        match self {
            Conversion::Scalar(_) => false,
            Conversion::Enum(_) | Conversion::Message(_) | Conversion::Map(_) => true,
            Conversion::List(inner) => inner.fallible(),
        }
    }
}

/// A resolved value expression for one field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueExpr {
    /// Value origin; context keys short-circuit argument handling.
    pub source: ValueSource,
    /// Whether the target is optional and gets a nullable wrapper.
    pub optional: bool,
    /// Conversion to apply; `None` for context values, which are already
    /// host-typed when the middleware injects them.
    pub conversion: Option<Conversion>,
}

impl ValueExpr {
    /// Whether rendering this expression needs error propagation.
    pub fn fallible(&self) -> bool {
        self.conversion.as_ref().is_some_and(Conversion::fallible)
    }
}

/// Conversion for a bare type reference.
pub(super) fn conversion_of(ty: &TypeRef) -> Conversion {
    match ty {
        TypeRef::Scalar(kind) => Conversion::Scalar(*kind),
        TypeRef::Enum(id) => Conversion::Enum(*id),
        TypeRef::Message(id) => Conversion::Message(*id),
        TypeRef::Map(id) => Conversion::Map(*id),
        TypeRef::Array(element) => Conversion::List(Box::new(conversion_of(element))),
    }
}

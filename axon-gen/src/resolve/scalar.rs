//! Static scalar tables
//!
//! Maps source-schema primitive names to the closed [`ScalarKind`] set, and
//! each kind to its target descriptor: the GraphQL type it renders as, the
//! Rust type generated structs carry, and the named coercion rule in
//! `axon-runtime`'s scalar library that deserializes argument values.

use std::collections::HashMap;

use once_cell::sync::Lazy;

use crate::ir::ScalarKind;

/// Target descriptor for one scalar kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScalarTarget {
    /// GraphQL type name.
    pub graphql: &'static str,
    /// Rust type spelled into generated structs.
    pub rust: &'static str,
    /// Coercion function name in `axon_runtime::scalar`.
    pub coerce: &'static str,
}

static PROTO_SCALARS: Lazy<HashMap<&'static str, ScalarKind>> = Lazy::new(|| {
    HashMap::from([
        ("double", ScalarKind::Float64),
        ("float", ScalarKind::Float32),
        ("int32", ScalarKind::Int32),
        ("int64", ScalarKind::Int64),
        ("uint32", ScalarKind::UInt32),
        ("uint64", ScalarKind::UInt64),
        ("sint32", ScalarKind::Int32),
        ("sint64", ScalarKind::Int64),
        ("fixed32", ScalarKind::UInt32),
        ("fixed64", ScalarKind::UInt64),
        ("sfixed32", ScalarKind::Int32),
        ("sfixed64", ScalarKind::Int64),
        ("bool", ScalarKind::Bool),
        ("string", ScalarKind::String),
        ("bytes", ScalarKind::Bytes),
    ])
});

static SWAGGER_SCALARS: Lazy<HashMap<(&'static str, &'static str), ScalarKind>> =
    Lazy::new(|| {
        HashMap::from([
            (("boolean", ""), ScalarKind::Bool),
            (("integer", ""), ScalarKind::Int64),
            (("integer", "int32"), ScalarKind::Int32),
            (("integer", "int64"), ScalarKind::Int64),
            (("number", ""), ScalarKind::Float64),
            (("number", "float"), ScalarKind::Float32),
            (("number", "double"), ScalarKind::Float64),
            (("string", ""), ScalarKind::String),
            (("string", "byte"), ScalarKind::Bytes),
            (("string", "binary"), ScalarKind::Bytes),
            (("string", "date"), ScalarKind::String),
            (("string", "date-time"), ScalarKind::String),
            (("string", "password"), ScalarKind::String),
        ])
    });

/// Kind for a proto primitive name, `None` when the name is not a scalar.
pub fn proto_scalar(name: &str) -> Option<ScalarKind> {
    PROTO_SCALARS.get(name).copied()
}

/// Kind for a swagger `type`/`format` pair, falling back to the bare type
/// when the format has no specific entry.
pub fn swagger_scalar(ty: &str, format: &str) -> Option<ScalarKind> {
    SWAGGER_SCALARS
        .get(&(ty, format))
        .or_else(|| SWAGGER_SCALARS.get(&(ty, "")))
        .copied()
}

/// Whether a kind is a legal proto map key.
pub fn valid_map_key(kind: ScalarKind) -> bool {
    match kind {
        ScalarKind::Bool
        | ScalarKind::Int32
        | ScalarKind::Int64
        | ScalarKind::UInt32
        | ScalarKind::UInt64
        | ScalarKind::String => true,
        ScalarKind::Float32 | ScalarKind::Float64 | ScalarKind::Bytes => false,
    }
}

/// Target descriptor for a kind. Exhaustive by construction: a new scalar
/// kind fails to compile until it gets a row here.
pub fn target(kind: ScalarKind) -> ScalarTarget {
    match kind {
        ScalarKind::Bool => ScalarTarget {
            graphql: "Boolean",
            rust: "bool",
            coerce: "to_bool",
        },
        ScalarKind::Int32 => ScalarTarget {
            graphql: "Int",
            rust: "i32",
            coerce: "to_i32",
        },
        ScalarKind::Int64 => ScalarTarget {
            graphql: "Int",
            rust: "i64",
            coerce: "to_i64",
        },
        ScalarKind::UInt32 => ScalarTarget {
            graphql: "Int",
            rust: "u32",
            coerce: "to_u32",
        },
        ScalarKind::UInt64 => ScalarTarget {
            graphql: "Int",
            rust: "u64",
            coerce: "to_u64",
        },
        ScalarKind::Float32 => ScalarTarget {
            graphql: "Float",
            rust: "f32",
            coerce: "to_f32",
        },
        ScalarKind::Float64 => ScalarTarget {
            graphql: "Float",
            rust: "f64",
            coerce: "to_f64",
        },
        ScalarKind::String => ScalarTarget {
            graphql: "String",
            rust: "String",
            coerce: "to_string",
        },
        ScalarKind::Bytes => ScalarTarget {
            graphql: "String",
            rust: "Vec<u8>",
            coerce: "to_bytes",
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_proto_scalar_names() {
        assert_eq!(proto_scalar("int32"), Some(ScalarKind::Int32));
        assert_eq!(proto_scalar("sfixed64"), Some(ScalarKind::Int64));
        assert_eq!(proto_scalar("bytes"), Some(ScalarKind::Bytes));
        assert_eq!(proto_scalar("Widget"), None);
    }

    #[test]
    fn test_swagger_format_fallback() {
        assert_eq!(swagger_scalar("integer", "int32"), Some(ScalarKind::Int32));
        assert_eq!(swagger_scalar("integer", "weird"), Some(ScalarKind::Int64));
        assert_eq!(swagger_scalar("string", "date-time"), Some(ScalarKind::String));
        assert_eq!(swagger_scalar("object", ""), None);
    }

    #[test]
    fn test_map_key_validity() {
        assert!(valid_map_key(ScalarKind::String));
        assert!(valid_map_key(ScalarKind::UInt64));
        assert!(!valid_map_key(ScalarKind::Float64));
        assert!(!valid_map_key(ScalarKind::Bytes));
    }

    #[test]
    fn test_target_table() {
        assert_eq!(target(ScalarKind::Int64).rust, "i64");
        assert_eq!(target(ScalarKind::Bytes).graphql, "String");
        assert_eq!(target(ScalarKind::Bool).coerce, "to_bool");
    }
}

//! Type resolution
//!
//! Maps IR types onto target descriptors. Resolution is two-phase: the
//! functions here produce immutable [`GqlType`] / [`ValueExpr`] descriptors
//! describing *what* to render, and the emitters later decide *how it is
//! spelled* against a per-output-unit [`Importer`] — the correct identifier
//! for a type depends on which file is being rendered.

pub mod scalar;
mod types_file;
mod value;

pub use types_file::TypesFile;
pub use value::{Conversion, ValueExpr, ValueSource};

use std::collections::HashSet;

use heck::ToUpperCamelCase;

use crate::config::Config;
use crate::error::{ConfigError, Error, ResolveError};
use crate::ir::{EnumId, Field, FileId, FileSet, MapId, MessageId, ScalarKind, TypeRef};
use crate::importer::Importer;

/// A resolved GraphQL type descriptor.
///
/// Wrapper order is load-bearing: a repeated required field nests as
/// `List(NonNull(T))` — a list may be empty, but its elements may not be
/// null — never the reverse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GqlType {
    /// A built-in scalar.
    Scalar(ScalarKind),
    /// Sentinel for messages with no meaningful fields; GraphQL disallows
    /// empty object types.
    NoData,
    /// A generated enum type.
    Enum(EnumId),
    /// A generated output object type.
    Object(MessageId),
    /// A generated input object type.
    InputObject(MessageId),
    /// A generated key/value pair-list object; GraphQL has no map type.
    Map(MapId),
    /// List wrapper.
    List(Box<GqlType>),
    /// Non-null wrapper.
    NonNull(Box<GqlType>),
}

impl GqlType {
    /// GraphQL notation for this descriptor, e.g. `[UserAddress!]`.
    pub fn graphql(&self, set: &FileSet) -> String {
        match self {
            GqlType::Scalar(kind) => scalar::target(*kind).graphql.to_string(),
            GqlType::NoData => "NoData".to_string(),
            GqlType::Enum(id) => enum_name(set, *id),
            GqlType::Object(id) => object_name(set, *id),
            GqlType::InputObject(id) => input_name(set, *id),
            GqlType::Map(id) => map_name(set, *id),
            GqlType::List(inner) => format!("[{}]", inner.graphql(set)),
            GqlType::NonNull(inner) => format!("{}!", inner.graphql(set)),
        }
    }

    /// Rust type for this descriptor at a nullable position; the emitters
    /// call this for struct fields and resolver signatures.
    pub fn rust(&self, set: &FileSet, importer: &mut Importer) -> String {
        match self {
            GqlType::NonNull(inner) => inner.bare_rust(set, importer),
            other => format!("Option<{}>", other.bare_rust(set, importer)),
        }
    }

    fn bare_rust(&self, set: &FileSet, importer: &mut Importer) -> String {
        match self {
            GqlType::Scalar(kind) => scalar::target(*kind).rust.to_string(),
            GqlType::NoData => {
                format!("{}NoData", importer.prefix("axon_runtime::scalar"))
            }
            GqlType::Enum(id) => {
                unit_type(set, importer, id.file(), enum_name(set, *id))
            }
            GqlType::Object(id) => {
                unit_type(set, importer, id.file(), object_name(set, *id))
            }
            GqlType::InputObject(id) => {
                unit_type(set, importer, id.file(), input_name(set, *id))
            }
            GqlType::Map(id) => format!(
                "Vec<{}>",
                unit_type(set, importer, id.file(), map_name(set, *id))
            ),
            GqlType::List(inner) => format!("Vec<{}>", inner.rust(set, importer)),
            GqlType::NonNull(inner) => inner.bare_rust(set, importer),
        }
    }
}

/// Spell a generated type name from the rendering unit's point of view:
/// bare within its own unit, through the aliased package module otherwise.
fn unit_type(set: &FileSet, importer: &mut Importer, file: FileId, name: String) -> String {
    let prefix = importer.prefix(&unit_path(set, file));
    if prefix.is_empty() {
        name
    } else {
        format!("{prefix}types::{name}")
    }
}

/// Generated type name for a message: its dotted path, camel-cased and
/// joined, so nested declarations stay unique.
pub fn object_name(set: &FileSet, id: MessageId) -> String {
    camel_path(&set.message(id).type_name)
}

/// Generated input object name for a message.
pub fn input_name(set: &FileSet, id: MessageId) -> String {
    format!("{}Input", camel_path(&set.message(id).type_name))
}

/// Generated enum type name.
pub fn enum_name(set: &FileSet, id: EnumId) -> String {
    camel_path(&set.enum_def(id).type_name)
}

/// Generated pair-object name for a map field.
pub fn map_name(set: &FileSet, id: MapId) -> String {
    format!("{}Entry", camel_path(&set.map(id).field_path))
}

/// Module name of the output unit a file's types are generated into; one
/// flat module per package, dots folded to underscores.
pub fn unit_path(set: &FileSet, id: FileId) -> String {
    let package = &set.file(id).package;
    if package.is_empty() {
        "schema".to_string()
    } else {
        package.replace('.', "_")
    }
}

fn camel_path(dotted: &str) -> String {
    dotted
        .split('.')
        .map(|segment| segment.to_upper_camel_case())
        .collect()
}

/// Resolution entry point; one per compilation, borrowing the IR and the
/// configuration.
pub struct Resolver<'a> {
    set: &'a FileSet,
    config: &'a Config,
}

impl<'a> Resolver<'a> {
    /// A resolver over a parsed file set.
    pub fn new(set: &'a FileSet, config: &'a Config) -> Self {
        Self { set, config }
    }

    /// The underlying file set.
    pub fn set(&self) -> &'a FileSet {
        self.set
    }

    /// The configuration in effect.
    pub fn config(&self) -> &'a Config {
        self.config
    }

    /// Fields that count toward the empty-object check: everything except
    /// the configured error field.
    pub fn meaningful_fields(&self, id: MessageId) -> Vec<&'a Field> {
        let message = self.set.message(id);
        let error_field = self
            .config
            .message_config(self.set, id)
            .and_then(|c| c.error_field.as_deref());
        message
            .fields
            .iter()
            .filter(|f| Some(f.name.as_str()) != error_field)
            .collect()
    }

    /// The single field a message is configured to unwrap into, validated
    /// eagerly: more than one field is a configuration error, found now and
    /// not at codegen time.
    pub fn unwrap_target(&self, id: MessageId) -> Result<Option<&'a Field>, ConfigError> {
        let unwrap = self
            .config
            .message_config(self.set, id)
            .is_some_and(|c| c.unwrap);
        if !unwrap {
            return Ok(None);
        }
        let message = self.set.message(id);
        if message.fields.len() != 1 {
            return Err(ConfigError::UnwrapArity {
                message: self.set.qualified_name(id),
                count: message.fields.len(),
            });
        }
        Ok(Some(&message.fields[0]))
    }

    /// Output-mode resolution of a bare type.
    pub fn output(&self, ty: &TypeRef, context: &str) -> Result<GqlType, Error> {
        match ty {
            TypeRef::Scalar(kind) => Ok(GqlType::Scalar(*kind)),
            TypeRef::Enum(id) => Ok(GqlType::Enum(*id)),
            TypeRef::Message(id) => {
                if let Some(field) = self.unwrap_target(*id)? {
                    return self.field_output(field, context);
                }
                if self.meaningful_fields(*id).is_empty() {
                    return Ok(GqlType::NoData);
                }
                Ok(GqlType::Object(*id))
            }
            // Unwrap on the map's value type is honored when the pair
            // object's value side goes back through `output`.
            TypeRef::Map(id) => Ok(GqlType::Map(*id)),
            TypeRef::Array(element) => {
                Ok(GqlType::List(Box::new(self.output(element, context)?)))
            }
        }
    }

    /// Output-mode resolution of a field, applying repetition and
    /// requiredness wrappers.
    pub fn field_output(&self, field: &Field, context: &str) -> Result<GqlType, Error> {
        let base = self.output(&field.ty, context)?;
        Ok(wrap(base, field))
    }

    /// Input-mode resolution of a bare type.
    pub fn input(&self, ty: &TypeRef, context: &str) -> Result<GqlType, Error> {
        match ty {
            TypeRef::Scalar(kind) => Ok(GqlType::Scalar(*kind)),
            TypeRef::Enum(id) => Ok(GqlType::Enum(*id)),
            TypeRef::Message(id) => {
                if let Some(field) = self.unwrap_target(*id)? {
                    return self.field_input(field, context);
                }
                if self.meaningful_fields(*id).is_empty() {
                    return Ok(GqlType::NoData);
                }
                Ok(GqlType::InputObject(*id))
            }
            TypeRef::Map(id) => Ok(GqlType::Map(*id)),
            TypeRef::Array(element) => {
                Ok(GqlType::List(Box::new(self.input(element, context)?)))
            }
        }
    }

    /// Input-mode resolution of a field.
    pub fn field_input(&self, field: &Field, context: &str) -> Result<GqlType, Error> {
        let base = self.input(&field.ty, context)?;
        Ok(wrap(base, field))
    }

    /// Narrow resolution used only when synthesizing dataloaders: the
    /// batched response entry must be a plain message.
    pub fn loader_response(&self, ty: &TypeRef, context: &str) -> Result<GqlType, Error> {
        match ty {
            TypeRef::Message(id) => Ok(GqlType::Object(*id)),
            other => Err(ResolveError::Unhandled {
                mode: "loader",
                kind: kind_name(other),
                context: context.to_string(),
            }
            .into()),
        }
    }

    /// Value-mode resolution: how a raw argument value becomes the typed
    /// host value. A configured context key is checked first and bypasses
    /// argument resolution entirely.
    pub fn value(&self, owner: MessageId, field: &Field) -> ValueExpr {
        if let Some(key) = self.config.context_key(self.set, owner, &field.name) {
            return ValueExpr {
                source: ValueSource::Context(key.to_string()),
                optional: !field.required,
                conversion: None,
            };
        }

        let mut conversion = value::conversion_of(&field.ty);
        if field.repeated {
            conversion = Conversion::List(Box::new(conversion));
        }
        ValueExpr {
            source: ValueSource::Argument(field.name.clone()),
            optional: !field.required,
            conversion: Some(conversion),
        }
    }

    /// Discover every input object reachable from a root message, once.
    ///
    /// The handled set is keyed by message identity, so a message referenced
    /// from several argument positions resolves to exactly one generated
    /// input type.
    pub fn collect_input_objects(
        &self,
        root: MessageId,
        handled: &mut HashSet<MessageId>,
        out: &mut Vec<MessageId>,
    ) -> Result<(), Error> {
        if !handled.insert(root) {
            return Ok(());
        }
        if self.unwrap_target(root)?.is_some() {
            let field_ty = self.set.message(root).fields[0].ty.clone();
            return self.collect_from_type(&field_ty, handled, out);
        }
        if self.meaningful_fields(root).is_empty() {
            return Ok(());
        }
        out.push(root);
        let fields: Vec<TypeRef> = self
            .set
            .message(root)
            .fields
            .iter()
            .map(|f| f.ty.clone())
            .collect();
        for ty in &fields {
            self.collect_from_type(ty, handled, out)?;
        }
        Ok(())
    }

    fn collect_from_type(
        &self,
        ty: &TypeRef,
        handled: &mut HashSet<MessageId>,
        out: &mut Vec<MessageId>,
    ) -> Result<(), Error> {
        match ty {
            TypeRef::Message(id) => self.collect_input_objects(*id, handled, out),
            TypeRef::Map(id) => {
                let value = self.set.map(*id).value.clone();
                self.collect_from_type(&value, handled, out)
            }
            TypeRef::Array(element) => self.collect_from_type(element, handled, out),
            TypeRef::Scalar(_) | TypeRef::Enum(_) => Ok(()),
        }
    }
}

fn wrap(base: GqlType, field: &Field) -> GqlType {
    if field.repeated {
        if field.required {
            GqlType::List(Box::new(GqlType::NonNull(Box::new(base))))
        } else {
            GqlType::List(Box::new(base))
        }
    } else if field.required {
        GqlType::NonNull(Box::new(base))
    } else {
        base
    }
}

fn kind_name(ty: &TypeRef) -> &'static str {
    match ty.kind() {
        crate::ir::TypeKind::Scalar => "scalar",
        crate::ir::TypeKind::Message => "message",
        crate::ir::TypeKind::Enum => "enum",
        crate::ir::TypeKind::Map => "map",
        crate::ir::TypeKind::Array => "array",
    }
}

//! Intermediate representation shared by both front-ends
//!
//! Each parsed document becomes a [`File`] owned by the compilation-wide
//! [`FileSet`]. Types are addressed by small copyable handles; handle
//! equality is the identity the rest of the pipeline relies on when it
//! asks "is this the same message?" across files that import each other.

mod file_set;

pub use file_set::FileSet;

use std::path::PathBuf;

/// Handle to a [`File`] inside a [`FileSet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FileId(pub(crate) u32);

/// Handle to a [`Message`] inside its owning file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MessageId {
    pub(crate) file: FileId,
    pub(crate) index: u32,
}

/// Handle to an [`EnumDef`] inside its owning file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EnumId {
    pub(crate) file: FileId,
    pub(crate) index: u32,
}

/// Handle to a [`Map`] inside its owning file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MapId {
    pub(crate) file: FileId,
    pub(crate) index: u32,
}

/// Handle to a [`Service`] inside its owning file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ServiceId {
    pub(crate) file: FileId,
    pub(crate) index: u32,
}

impl MessageId {
    /// The file that owns the message.
    pub fn file(self) -> FileId {
        self.file
    }
}

impl EnumId {
    /// The file that owns the enum.
    pub fn file(self) -> FileId {
        self.file
    }
}

impl MapId {
    /// The file that owns the map.
    pub fn file(self) -> FileId {
        self.file
    }
}

impl ServiceId {
    /// The file that owns the service.
    pub fn file(self) -> FileId {
        self.file
    }
}

/// Closed set of scalar kinds shared by both front-ends.
///
/// Matches over this type are exhaustive with no default arm, so adding a
/// scalar is a compile-time-checked change everywhere it is consumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarKind {
    Bool,
    Int32,
    Int64,
    UInt32,
    UInt64,
    Float32,
    Float64,
    String,
    Bytes,
}

/// Coarse type category, mirrored by every [`TypeRef`] variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeKind {
    Scalar,
    Message,
    Enum,
    Map,
    Array,
}

/// A reference to a type, as carried by fields and method signatures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeRef {
    /// A primitive.
    Scalar(ScalarKind),
    /// A message/object declared in some file.
    Message(MessageId),
    /// An enum declared in some file.
    Enum(EnumId),
    /// A key/value map; identity-keyed so one map field resolves to one
    /// generated wrapper.
    Map(MapId),
    /// An array of an element type (swagger front-end; proto repetition is
    /// a field flag instead).
    Array(Box<TypeRef>),
}

impl TypeRef {
    /// Coarse category of this reference.
    pub fn kind(&self) -> TypeKind {
        match self {
            TypeRef::Scalar(_) => TypeKind::Scalar,
            TypeRef::Message(_) => TypeKind::Message,
            TypeRef::Enum(_) => TypeKind::Enum,
            TypeRef::Map(_) => TypeKind::Map,
            TypeRef::Array(_) => TypeKind::Array,
        }
    }

    /// The file owning the referenced declaration, if any.
    ///
    /// Scalars have no owner; arrays answer for their element.
    pub fn owner_file(&self) -> Option<FileId> {
        match self {
            TypeRef::Scalar(_) => None,
            TypeRef::Message(id) => Some(id.file),
            TypeRef::Enum(id) => Some(id.file),
            TypeRef::Map(id) => Some(id.file),
            TypeRef::Array(elem) => elem.owner_file(),
        }
    }
}

/// Which front-end produced a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Proto,
    Swagger,
}

/// A parsed source document. Immutable once parsing commits it.
#[derive(Debug)]
pub struct File {
    /// Canonicalized source path; the [`FileSet`] cache key.
    pub path: PathBuf,
    /// Which front-end produced this file.
    pub kind: SourceKind,
    /// Proto package, or the swagger document's derived package name.
    pub package: String,
    /// All messages, nested ones flattened, in declaration order.
    pub messages: Vec<Message>,
    /// All enums, nested ones flattened, in declaration order.
    pub enums: Vec<EnumDef>,
    /// One entry per map field.
    pub maps: Vec<Map>,
    /// Services (proto) or tags (swagger), in declaration order.
    pub services: Vec<Service>,
    /// Files this one depends on.
    pub imports: Vec<FileId>,
}

impl File {
    /// Find a type by its dotted `type_name` path within this file.
    pub fn find_type(&self, id: FileId, type_name: &str) -> Option<TypeRef> {
        if let Some(index) = self
            .messages
            .iter()
            .position(|m| m.type_name == type_name)
        {
            return Some(TypeRef::Message(MessageId {
                file: id,
                index: index as u32,
            }));
        }
        if let Some(index) = self.enums.iter().position(|e| e.type_name == type_name) {
            return Some(TypeRef::Enum(EnumId {
                file: id,
                index: index as u32,
            }));
        }
        None
    }
}

/// A message (proto) or object schema (swagger).
#[derive(Debug)]
pub struct Message {
    /// Bare name, e.g. `Inner`.
    pub name: String,
    /// Dotted path reflecting nesting (proto) or route-derived path
    /// (swagger), e.g. `Outer.Inner`. Unique within the owning file.
    pub type_name: String,
    /// Ordered fields; oneof members are flattened in, tagged with their
    /// group index.
    pub fields: Vec<Field>,
    /// Enclosing message for nested declarations. The child does not own
    /// the parent; this is a back-reference only.
    pub parent: Option<MessageId>,
}

impl Message {
    /// Fields that belong to the oneof group with the given index.
    pub fn oneof_fields(&self, group: usize) -> impl Iterator<Item = &Field> {
        self.fields.iter().filter(move |f| f.oneof == Some(group))
    }
}

/// A single field of a message.
#[derive(Debug)]
pub struct Field {
    /// Field name as declared.
    pub name: String,
    /// The field's type.
    pub ty: TypeRef,
    /// Proto `repeated` / swagger array-valued.
    pub repeated: bool,
    /// Required (swagger `required` list) / non-optional (proto).
    pub required: bool,
    /// Index of the oneof group this field belongs to, if any.
    pub oneof: Option<usize>,
}

/// An enum declaration.
#[derive(Debug)]
pub struct EnumDef {
    /// Bare name.
    pub name: String,
    /// Dotted path, unique within the owning file (see [`Message::type_name`]).
    pub type_name: String,
    /// Ordered values.
    pub values: Vec<EnumValue>,
}

/// One enum value.
#[derive(Debug)]
pub struct EnumValue {
    /// Value name as declared.
    pub name: String,
    /// Proto number; swagger enums are numbered by position.
    pub number: i32,
}

/// A map type, allocated once per map field.
#[derive(Debug)]
pub struct Map {
    /// Key kind; proto restricts map keys to integral/bool/string scalars.
    pub key: ScalarKind,
    /// Value type.
    pub value: TypeRef,
    /// Dotted path of the field that declared the map, for generated names.
    pub field_path: String,
}

/// A proto service or swagger tag.
#[derive(Debug)]
pub struct Service {
    /// Service (or tag) name.
    pub name: String,
    /// Ordered methods.
    pub methods: Vec<Method>,
}

impl Service {
    /// Find a method by name.
    pub fn method(&self, name: &str) -> Option<(usize, &Method)> {
        self.methods
            .iter()
            .enumerate()
            .find(|(_, m)| m.name == name)
    }
}

/// One RPC method or tagged HTTP operation.
///
/// Input and output are held by identity, never re-looked-up by name after
/// parse time.
#[derive(Debug)]
pub struct Method {
    /// Method (or operationId) name.
    pub name: String,
    /// Request message.
    pub input: MessageId,
    /// Response message.
    pub output: MessageId,
    /// HTTP binding, swagger front-end only.
    pub http: Option<HttpRoute>,
}

/// HTTP binding for a swagger operation.
#[derive(Debug, Clone)]
pub struct HttpRoute {
    /// HTTP verb.
    pub verb: HttpVerb,
    /// Route template, e.g. `/users/{id}`.
    pub path: String,
}

/// HTTP verbs the swagger front-end accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpVerb {
    Get,
    Post,
    Put,
    Delete,
    Patch,
}

impl HttpVerb {
    /// Whether operations with this verb default to the query side of the
    /// schema (mutations otherwise); configuration can override per method.
    pub fn is_query(self) -> bool {
        matches!(self, HttpVerb::Get)
    }

    /// Lowercase verb name, for derived operation names and diagnostics.
    pub fn as_str(self) -> &'static str {
        match self {
            HttpVerb::Get => "get",
            HttpVerb::Post => "post",
            HttpVerb::Put => "put",
            HttpVerb::Delete => "delete",
            HttpVerb::Patch => "patch",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_ref_kind_and_owner() {
        let file = FileId(3);
        let message = TypeRef::Message(MessageId { file, index: 0 });
        assert_eq!(message.kind(), TypeKind::Message);
        assert_eq!(message.owner_file(), Some(file));

        let scalar = TypeRef::Scalar(ScalarKind::Bool);
        assert_eq!(scalar.kind(), TypeKind::Scalar);
        assert_eq!(scalar.owner_file(), None);

        let array = TypeRef::Array(Box::new(message.clone()));
        assert_eq!(array.kind(), TypeKind::Array);
        assert_eq!(array.owner_file(), Some(file));
    }

    #[test]
    fn test_oneof_fields_filter_by_group() {
        let field = |name: &str, oneof: Option<usize>| Field {
            name: name.to_string(),
            ty: TypeRef::Scalar(ScalarKind::String),
            repeated: false,
            required: false,
            oneof,
        };
        let message = Message {
            name: "M".to_string(),
            type_name: "M".to_string(),
            fields: vec![
                field("plain", None),
                field("text", Some(0)),
                field("code", Some(0)),
                field("other", Some(1)),
            ],
            parent: None,
        };
        let names: Vec<&str> = message
            .oneof_fields(0)
            .map(|f| f.name.as_str())
            .collect();
        assert_eq!(names, vec!["text", "code"]);
    }

    #[test]
    fn test_http_verb_classification() {
        assert!(HttpVerb::Get.is_query());
        assert!(!HttpVerb::Post.is_query());
        assert_eq!(HttpVerb::Patch.as_str(), "patch");
    }
}

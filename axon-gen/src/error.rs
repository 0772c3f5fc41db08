//! Error types for schema compilation
//!
//! Every stage aborts on the first error; there is no partial-success mode.
//! Emitting code that silently omits a field or method would produce an
//! incomplete but compiling API surface, which is worse than failing loudly.

use std::path::PathBuf;

/// Errors produced while parsing a source schema document.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    /// Malformed source text.
    #[error("{path}: line {line}: {message}")]
    Syntax {
        /// Source file being parsed.
        path: PathBuf,
        /// 1-based line of the offending token.
        line: u32,
        /// What went wrong.
        message: String,
    },

    /// A primitive type name with no scalar mapping.
    #[error("{path}: unknown scalar type `{name}`")]
    UnknownScalar {
        /// Source file being parsed.
        path: PathBuf,
        /// The unmapped type name.
        name: String,
    },

    /// A message/enum reference that no scope could resolve.
    #[error("{path}: unresolved type reference `{name}`")]
    UnresolvedType {
        /// Source file being parsed.
        path: PathBuf,
        /// The dotted reference as written.
        name: String,
    },

    /// An import statement that matched no alias and no search path.
    #[error("{path}: unresolved import `{import}`")]
    UnresolvedImport {
        /// Importing file.
        path: PathBuf,
        /// Import path as written.
        import: String,
    },

    /// The same path imported twice from one file.
    #[error("{path}: duplicate import `{import}`")]
    DuplicateImport {
        /// Importing file.
        path: PathBuf,
        /// Import path as written.
        import: String,
    },

    /// Imports that form a cycle back to a file still being parsed.
    #[error("{path}: cyclic import of `{import}`")]
    CyclicImport {
        /// Importing file.
        path: PathBuf,
        /// Import path as written.
        import: String,
    },

    /// Underlying file read failure.
    #[error("{path}: {source}")]
    Io {
        /// File that could not be read.
        path: PathBuf,
        /// OS error.
        source: std::io::Error,
    },

    /// A structurally invalid document (swagger front-end).
    #[error("{path}: invalid document: {message}")]
    Document {
        /// Source file being parsed.
        path: PathBuf,
        /// What went wrong.
        message: String,
    },
}

/// Errors raised by configuration validation, before any code is emitted.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Configuration references a service that no parsed file declares.
    #[error("service `{0}` not found")]
    ServiceNotFound(String),

    /// Configuration references an unknown method on a known service.
    #[error("method `{method}` not found on service `{service}`")]
    MethodNotFound {
        /// Owning service name.
        service: String,
        /// Method name as configured.
        method: String,
    },

    /// Configuration references a message that no parsed file declares.
    #[error("message `{0}` not found")]
    MessageNotFound(String),

    /// Configuration references an unknown field on a known message.
    #[error("field `{field}` not found on message `{message}`")]
    FieldNotFound {
        /// Owning message name.
        message: String,
        /// Field name as configured.
        field: String,
    },

    /// Unwrap configured on a message with more than one field.
    #[error("message `{message}`: unwrap requires exactly one field, found {count}")]
    UnwrapArity {
        /// Message configured to unwrap.
        message: String,
        /// Actual field count.
        count: usize,
    },

    /// Loader request key field is not repeated.
    #[error("loader `{loader}`: request key field `{field}` must be repeated")]
    LoaderKeyNotRepeated {
        /// Loader name.
        loader: String,
        /// Offending field.
        field: String,
    },

    /// Loader request shape violation other than repetition.
    #[error("loader `{loader}`: {message}")]
    LoaderRequestShape {
        /// Loader name.
        loader: String,
        /// What went wrong, naming the field.
        message: String,
    },

    /// Loader response result field is not a repeated message.
    #[error("loader `{loader}`: result field `{field}` must be a repeated message")]
    LoaderResultNotMessage {
        /// Loader name.
        loader: String,
        /// Offending field.
        field: String,
    },

    /// Loader match field is repeated.
    #[error("loader `{loader}`: match field `{field}` must not be repeated")]
    LoaderMatchRepeated {
        /// Loader name.
        loader: String,
        /// Offending field.
        field: String,
    },

    /// Loader match field is not scalar.
    #[error("loader `{loader}`: match field `{field}` must be a scalar")]
    LoaderMatchNotScalar {
        /// Loader name.
        loader: String,
        /// Offending field.
        field: String,
    },

    /// Both a schema and an imported fragment declare the same root as SERVICE.
    #[error("schema `{schema}`: cannot merge {slot} root: both declare SERVICE")]
    AmbiguousMerge {
        /// Schema name being merged into.
        schema: String,
        /// "query" or "mutation".
        slot: &'static str,
    },

    /// Two generated objects in one schema resolve to the same name.
    #[error("schema `{schema}`: duplicate generated object name `{object}`")]
    DuplicateObject {
        /// Schema the collision occurs in.
        schema: String,
        /// Colliding type name.
        object: String,
    },

    /// Anything else the config model rejects.
    #[error("{0}")]
    Invalid(String),

    /// Config file read failure.
    #[error("failed to read config {path}: {source}")]
    Io {
        /// Config file path.
        path: PathBuf,
        /// OS error.
        source: std::io::Error,
    },

    /// Config file deserialization failure.
    #[error("failed to parse config {path}: {source}")]
    Yaml {
        /// Config file path.
        path: PathBuf,
        /// Deserialization error.
        source: serde_yaml::Error,
    },
}

/// Errors raised while mapping IR types to target descriptors.
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    /// An IR shape the resolver has no mapping for. Never silently skipped.
    #[error("no {mode} mapping for {kind} in {context}")]
    Unhandled {
        /// Resolution mode that hit the gap ("output", "input", "value", "loader").
        mode: &'static str,
        /// The unhandled type kind.
        kind: &'static str,
        /// Where resolution was attempted (message/field path).
        context: String,
    },

    /// A map key of non-scalar kind.
    #[error("map key in {context} must be a scalar")]
    NonScalarMapKey {
        /// Where the map was declared.
        context: String,
    },
}

/// Top-level error for the whole pipeline.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Source schema parsing failed.
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// Configuration validation failed.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Type resolution failed.
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    /// Writing generated output failed.
    #[error("failed to write {path}: {source}")]
    Write {
        /// Output path.
        path: PathBuf,
        /// OS error.
        source: std::io::Error,
    },
}

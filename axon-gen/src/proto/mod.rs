//! Proto front-end
//!
//! Turns `.proto` text into the shared IR. Parsing is memoized by canonical
//! path through the [`FileSet`]: importing the same file from two places
//! yields one [`FileId`], so message identity holds across the import graph.

mod lexer;
mod parser;

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use crate::error::ParseError;
use crate::ir::{
    EnumDef, EnumId, EnumValue, Field, File, FileId, FileSet, Map, MapId, Message, MessageId,
    Method, Service, SourceKind, TypeRef,
};
use crate::resolve::scalar;

use parser::{RawEnum, RawField, RawMessage};

/// Parse a proto file and everything it imports.
///
/// `aliases` remaps import strings to explicit paths and is consulted
/// before `search_paths`, which are scanned in order. Re-parsing an
/// already-resolved path returns the cached id.
pub fn parse(
    path: &Path,
    aliases: &HashMap<String, PathBuf>,
    search_paths: &[PathBuf],
    set: &mut FileSet,
) -> Result<FileId, ParseError> {
    let canonical = canonicalize(path)?;

    if let Some(id) = set.lookup(&canonical) {
        if set.is_pending(id) {
            return Err(ParseError::CyclicImport {
                path: canonical.clone(),
                import: canonical.display().to_string(),
            });
        }
        return Ok(id);
    }

    let source = std::fs::read_to_string(&canonical).map_err(|source| ParseError::Io {
        path: canonical.clone(),
        source,
    })?;

    let tokens = lexer::tokenize(&source).map_err(|e| ParseError::Syntax {
        path: canonical.clone(),
        line: e.line,
        message: e.message,
    })?;
    let raw = parser::parse_file(&tokens).map_err(|e| ParseError::Syntax {
        path: canonical.clone(),
        line: e.line,
        message: e.message,
    })?;

    let id = set.reserve(canonical.clone(), SourceKind::Proto);
    tracing::debug!(path = %canonical.display(), "parsing proto file");

    // Imports first, so cross-file references can resolve below.
    let mut seen_imports = HashSet::new();
    let mut imports = Vec::with_capacity(raw.imports.len());
    for import in &raw.imports {
        if !seen_imports.insert(import.clone()) {
            return Err(ParseError::DuplicateImport {
                path: canonical.clone(),
                import: import.clone(),
            });
        }
        let resolved = resolve_import(import, aliases, search_paths).ok_or_else(|| {
            ParseError::UnresolvedImport {
                path: canonical.clone(),
                import: import.clone(),
            }
        })?;
        imports.push(parse(&resolved, aliases, search_paths, set)?);
    }

    let file = build_file(&canonical, raw, id, imports, set)?;
    set.commit(id, file);
    Ok(id)
}

fn canonicalize(path: &Path) -> Result<PathBuf, ParseError> {
    std::fs::canonicalize(path).map_err(|source| ParseError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Alias substitution first, then the search paths in declaration order.
fn resolve_import(
    import: &str,
    aliases: &HashMap<String, PathBuf>,
    search_paths: &[PathBuf],
) -> Option<PathBuf> {
    if let Some(mapped) = aliases.get(import) {
        return Some(mapped.clone());
    }
    search_paths
        .iter()
        .map(|base| base.join(import))
        .find(|candidate| candidate.is_file())
}

/// A message flattened out of its nesting, fields still unresolved.
struct FlatMessage {
    name: String,
    type_name: String,
    /// Enclosing names including the message's own, outermost first.
    scope: Vec<String>,
    parent: Option<u32>,
    fields: Vec<RawField>,
}

fn build_file(
    path: &Path,
    raw: parser::RawFile,
    id: FileId,
    imports: Vec<FileId>,
    set: &FileSet,
) -> Result<File, ParseError> {
    let mut flat = Vec::new();
    let mut enums = Vec::new();
    for message in raw.messages {
        flatten_message(message, &[], None, &mut flat, &mut enums);
    }
    for e in raw.enums {
        flatten_enum(e, &[], &mut enums);
    }

    // Declaration index for this file; imports are consulted through `set`.
    let mut local: HashMap<String, TypeRef> = HashMap::new();
    for (index, message) in flat.iter().enumerate() {
        local.insert(
            message.type_name.clone(),
            TypeRef::Message(MessageId {
                file: id,
                index: index as u32,
            }),
        );
    }
    for (index, e) in enums.iter().enumerate() {
        local.insert(
            e.type_name.clone(),
            TypeRef::Enum(EnumId {
                file: id,
                index: index as u32,
            }),
        );
    }

    let resolver = Resolver {
        path,
        package: &raw.package,
        local: &local,
        imports: &imports,
        set,
    };

    let mut maps: Vec<Map> = Vec::new();
    let mut messages = Vec::with_capacity(flat.len());
    for message in &flat {
        let mut fields = Vec::with_capacity(message.fields.len());
        for field in &message.fields {
            let ty = if let Some((key_name, value_name)) = &field.map {
                let key = scalar::proto_scalar(key_name)
                    .filter(|&k| scalar::valid_map_key(k))
                    .ok_or_else(|| ParseError::UnknownScalar {
                        path: path.to_path_buf(),
                        name: key_name.clone(),
                    })?;
                let value = resolver.resolve(value_name, &message.scope)?;
                let map_id = MapId {
                    file: id,
                    index: maps.len() as u32,
                };
                maps.push(Map {
                    key,
                    value,
                    field_path: format!("{}.{}", message.type_name, field.name),
                });
                TypeRef::Map(map_id)
            } else {
                resolver.resolve(&field.type_name, &message.scope)?
            };
            fields.push(Field {
                name: field.name.clone(),
                ty,
                repeated: field.repeated,
                required: field.required,
                oneof: field.oneof,
            });
        }
        messages.push(Message {
            name: message.name.clone(),
            type_name: message.type_name.clone(),
            fields,
            parent: message.parent.map(|index| MessageId { file: id, index }),
        });
    }

    let mut services = Vec::with_capacity(raw.services.len());
    for service in raw.services {
        let mut methods = Vec::new();
        for rpc in service.rpcs {
            if rpc.streaming {
                tracing::debug!(rpc = %rpc.name, "skipping streaming rpc");
                continue;
            }
            let input = resolver.resolve_message(&rpc.input)?;
            let output = resolver.resolve_message(&rpc.output)?;
            methods.push(Method {
                name: rpc.name,
                input,
                output,
                http: None,
            });
        }
        services.push(Service {
            name: service.name,
            methods,
        });
    }

    Ok(File {
        path: path.to_path_buf(),
        kind: SourceKind::Proto,
        package: raw.package,
        messages,
        enums,
        maps,
        services,
        imports,
    })
}

fn flatten_message(
    raw: RawMessage,
    scope: &[String],
    parent: Option<u32>,
    flat: &mut Vec<FlatMessage>,
    enums: &mut Vec<EnumDef>,
) {
    let mut own_scope = scope.to_vec();
    own_scope.push(raw.name.clone());
    let type_name = own_scope.join(".");

    let index = flat.len() as u32;
    flat.push(FlatMessage {
        name: raw.name,
        type_name,
        scope: own_scope.clone(),
        parent,
        fields: raw.fields,
    });

    for e in raw.enums {
        flatten_enum(e, &own_scope, enums);
    }
    for nested in raw.messages {
        flatten_message(nested, &own_scope, Some(index), flat, enums);
    }
}

fn flatten_enum(raw: RawEnum, scope: &[String], enums: &mut Vec<EnumDef>) {
    let type_name = if scope.is_empty() {
        raw.name.clone()
    } else {
        format!("{}.{}", scope.join("."), raw.name)
    };
    enums.push(EnumDef {
        name: raw.name,
        type_name,
        values: raw
            .values
            .into_iter()
            .map(|(name, number)| EnumValue { name, number })
            .collect(),
    });
}

/// Reference resolution against one file's declarations and its imports.
struct Resolver<'a> {
    path: &'a Path,
    package: &'a str,
    local: &'a HashMap<String, TypeRef>,
    imports: &'a [FileId],
    set: &'a FileSet,
}

impl Resolver<'_> {
    /// Resolve a type reference as written in a field.
    ///
    /// Scoping order, preserved exactly: innermost enclosing message
    /// outward, then the file's top level, then same-package imports, then
    /// progressively shorter package-prefix splits of a dotted name. Proto
    /// allows types to shadow by nesting, so the order matters.
    fn resolve(&self, name: &str, scope: &[String]) -> Result<TypeRef, ParseError> {
        if let Some(kind) = scalar::proto_scalar(name) {
            return Ok(TypeRef::Scalar(kind));
        }
        self.resolve_named(name, scope)
            .ok_or_else(|| self.unresolved(name))
    }

    /// Resolve a name that must denote a message (rpc input/output).
    fn resolve_message(&self, name: &str) -> Result<MessageId, ParseError> {
        match self.resolve_named(name, &[]) {
            Some(TypeRef::Message(id)) => Ok(id),
            _ => Err(self.unresolved(name)),
        }
    }

    fn resolve_named(&self, name: &str, scope: &[String]) -> Option<TypeRef> {
        if let Some(rooted) = name.strip_prefix('.') {
            return self.resolve_qualified(rooted);
        }

        // Innermost enclosing message outward, ending at file top level.
        for depth in (0..=scope.len()).rev() {
            let candidate = if depth == 0 {
                name.to_string()
            } else {
                format!("{}.{}", scope[..depth].join("."), name)
            };
            if let Some(found) = self.local.get(&candidate) {
                return Some(found.clone());
            }
        }

        // Top-level types of same-package imports.
        for &import in self.imports {
            let file = self.set.file(import);
            if file.package == self.package {
                if let Some(found) = file.find_type(import, name) {
                    return Some(found);
                }
            }
        }

        // Dotted name with a package prefix, longest prefix first.
        self.resolve_qualified(name)
    }

    fn resolve_qualified(&self, name: &str) -> Option<TypeRef> {
        let segments: Vec<&str> = name.split('.').collect();
        for split in (0..segments.len()).rev() {
            let package = segments[..split].join(".");
            let type_name = segments[split..].join(".");
            if package == self.package {
                if let Some(found) = self.local.get(&type_name) {
                    return Some(found.clone());
                }
            }
            for &import in self.imports {
                let file = self.set.file(import);
                if file.package == package {
                    if let Some(found) = file.find_type(import, &type_name) {
                        return Some(found);
                    }
                }
            }
        }
        None
    }

    fn unresolved(&self, name: &str) -> ParseError {
        // A bare lowercase name that resolves nowhere was almost certainly
        // meant as a primitive.
        let scalar_looking = !name.contains('.')
            && name.chars().next().is_some_and(|c| c.is_ascii_lowercase());
        if scalar_looking {
            ParseError::UnknownScalar {
                path: self.path.to_path_buf(),
                name: name.to_string(),
            }
        } else {
            ParseError::UnresolvedType {
                path: self.path.to_path_buf(),
                name: name.to_string(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{ScalarKind, TypeKind};
    use std::io::Write;

    fn write_file(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(content.as_bytes()).unwrap();
        path
    }

    fn parse_one(dir: &tempfile::TempDir, name: &str) -> (FileSet, FileId) {
        let mut set = FileSet::new();
        let id = parse(
            &dir.path().join(name),
            &HashMap::new(),
            &[dir.path().to_path_buf()],
            &mut set,
        )
        .unwrap();
        (set, id)
    }

    #[test]
    fn test_parse_twice_returns_identical_file() {
        let dir = tempfile::tempdir().unwrap();
        write_file(
            dir.path(),
            "a.proto",
            "syntax = \"proto3\"; package a; message A { int32 n = 1; }",
        );

        let mut set = FileSet::new();
        let aliases = HashMap::new();
        let paths = vec![dir.path().to_path_buf()];
        let first = parse(&dir.path().join("a.proto"), &aliases, &paths, &mut set).unwrap();
        let second = parse(&dir.path().join("a.proto"), &aliases, &paths, &mut set).unwrap();
        assert_eq!(first, second);
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_import_identity_across_files() {
        let dir = tempfile::tempdir().unwrap();
        write_file(
            dir.path(),
            "common.proto",
            "syntax = \"proto3\"; package common; message Page { int32 size = 1; }",
        );
        let importer_src = r#"
            syntax = "proto3";
            package a;
            import "common.proto";
            message ListRequest { common.Page page = 1; }
        "#;
        write_file(dir.path(), "a.proto", importer_src);
        write_file(
            dir.path(),
            "b.proto",
            "syntax = \"proto3\"; package b; import \"common.proto\"; message Other { common.Page page = 1; }",
        );

        let mut set = FileSet::new();
        let aliases = HashMap::new();
        let paths = vec![dir.path().to_path_buf()];
        let a = parse(&dir.path().join("a.proto"), &aliases, &paths, &mut set).unwrap();
        let b = parse(&dir.path().join("b.proto"), &aliases, &paths, &mut set).unwrap();

        let page_from_a = set.file(a).messages[0].fields[0].ty.clone();
        let page_from_b = set.file(b).messages[0].fields[0].ty.clone();
        assert_eq!(page_from_a, page_from_b);
        assert_eq!(set.len(), 3);
    }

    #[test]
    fn test_nested_scoping_shadows_outer() {
        let dir = tempfile::tempdir().unwrap();
        write_file(
            dir.path(),
            "s.proto",
            r#"
            syntax = "proto3";
            package s;
            message Thing { string tag = 1; }
            message Outer {
                message Thing { int32 tag = 1; }
                Thing t = 1;
            }
            message Plain { Thing t = 1; }
            "#,
        );
        let (set, id) = parse_one(&dir, "s.proto");
        let file = set.file(id);

        let outer = file.messages.iter().find(|m| m.name == "Outer").unwrap();
        let nested = file.find_type(id, "Outer.Thing").unwrap();
        assert_eq!(outer.fields[0].ty, nested);

        let plain = file.messages.iter().find(|m| m.name == "Plain").unwrap();
        let top = file.find_type(id, "Thing").unwrap();
        assert_eq!(plain.fields[0].ty, top);
    }

    #[test]
    fn test_map_field_allocates_map() {
        let dir = tempfile::tempdir().unwrap();
        write_file(
            dir.path(),
            "m.proto",
            "syntax = \"proto3\"; package m; message M { map<string, int64> counts = 1; }",
        );
        let (set, id) = parse_one(&dir, "m.proto");
        let file = set.file(id);
        assert_eq!(file.maps.len(), 1);
        assert_eq!(file.maps[0].key, ScalarKind::String);
        assert_eq!(file.messages[0].fields[0].ty.kind(), TypeKind::Map);
    }

    #[test]
    fn test_float_map_key_rejected() {
        let dir = tempfile::tempdir().unwrap();
        write_file(
            dir.path(),
            "m.proto",
            "syntax = \"proto3\"; package m; message M { map<float, int64> x = 1; }",
        );
        let mut set = FileSet::new();
        let err = parse(
            &dir.path().join("m.proto"),
            &HashMap::new(),
            &[dir.path().to_path_buf()],
            &mut set,
        )
        .unwrap_err();
        assert!(matches!(err, ParseError::UnknownScalar { .. }));
    }

    #[test]
    fn test_streaming_rpcs_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        write_file(
            dir.path(),
            "svc.proto",
            r#"
            syntax = "proto3";
            package svc;
            message Req {}
            message Res {}
            service S {
                rpc Get (Req) returns (Res);
                rpc Tail (Req) returns (stream Res);
            }
            "#,
        );
        let (set, id) = parse_one(&dir, "svc.proto");
        let service = &set.file(id).services[0];
        assert_eq!(service.methods.len(), 1);
        assert_eq!(service.methods[0].name, "Get");
    }

    #[test]
    fn test_duplicate_import_is_error() {
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), "x.proto", "syntax = \"proto3\"; package x;");
        write_file(
            dir.path(),
            "dup.proto",
            "syntax = \"proto3\"; import \"x.proto\"; import \"x.proto\";",
        );
        let mut set = FileSet::new();
        let err = parse(
            &dir.path().join("dup.proto"),
            &HashMap::new(),
            &[dir.path().to_path_buf()],
            &mut set,
        )
        .unwrap_err();
        assert!(matches!(err, ParseError::DuplicateImport { .. }));
    }

    #[test]
    fn test_unresolved_import_is_error() {
        let dir = tempfile::tempdir().unwrap();
        write_file(
            dir.path(),
            "bad.proto",
            "syntax = \"proto3\"; import \"nowhere.proto\";",
        );
        let mut set = FileSet::new();
        let err = parse(
            &dir.path().join("bad.proto"),
            &HashMap::new(),
            &[dir.path().to_path_buf()],
            &mut set,
        )
        .unwrap_err();
        assert!(matches!(err, ParseError::UnresolvedImport { .. }));
    }

    #[test]
    fn test_import_alias_substitution() {
        let dir = tempfile::tempdir().unwrap();
        let real = write_file(
            dir.path(),
            "relocated.proto",
            "syntax = \"proto3\"; package far; message X {}",
        );
        write_file(
            dir.path(),
            "main.proto",
            "syntax = \"proto3\"; package m; import \"far/away.proto\"; message Y { far.X x = 1; }",
        );
        let mut set = FileSet::new();
        let aliases = HashMap::from([("far/away.proto".to_string(), real)]);
        let id = parse(
            &dir.path().join("main.proto"),
            &aliases,
            &[dir.path().to_path_buf()],
            &mut set,
        )
        .unwrap();
        assert_eq!(set.file(id).imports.len(), 1);
    }

    #[test]
    fn test_unknown_scalar_is_error() {
        let dir = tempfile::tempdir().unwrap();
        write_file(
            dir.path(),
            "bad.proto",
            "syntax = \"proto3\"; package b; message M { varint n = 1; }",
        );
        let mut set = FileSet::new();
        let err = parse(
            &dir.path().join("bad.proto"),
            &HashMap::new(),
            &[dir.path().to_path_buf()],
            &mut set,
        )
        .unwrap_err();
        assert!(matches!(err, ParseError::UnknownScalar { .. }));
    }

    #[test]
    fn test_package_prefix_split_resolution() {
        let dir = tempfile::tempdir().unwrap();
        write_file(
            dir.path(),
            "deep.proto",
            "syntax = \"proto3\"; package org.team.models; message Item { string id = 1; }",
        );
        write_file(
            dir.path(),
            "user.proto",
            r#"
            syntax = "proto3";
            package org.team;
            import "deep.proto";
            message Cart { org.team.models.Item item = 1; }
            "#,
        );
        let (set, id) = parse_one(&dir, "user.proto");
        let cart = &set.file(id).messages[0];
        assert_eq!(cart.fields[0].ty.kind(), TypeKind::Message);
    }
}

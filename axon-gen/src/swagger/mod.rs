//! Swagger/OpenAPI front-end
//!
//! Builds the same IR shape as the proto front-end from OpenAPI v2
//! documents. Definitions become messages, tagged operations become
//! services, and `$ref`s across documents become imports resolved through
//! the shared [`FileSet`] cache.

mod document;

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use heck::ToUpperCamelCase;

use crate::error::ParseError;
use crate::ir::{
    EnumDef, EnumId, EnumValue, Field, File, FileId, FileSet, HttpRoute, HttpVerb, Map, MapId,
    Message, MessageId, Method, Service, SourceKind, TypeRef,
};
use crate::resolve::scalar;

use document::{Document, Operation, Parameter, Schema};

/// Parse a swagger document and everything it references.
///
/// Same contract as the proto front-end: memoized by canonical path,
/// aliases consulted before search paths, unresolved references fatal.
pub fn parse(
    path: &Path,
    aliases: &HashMap<String, PathBuf>,
    search_paths: &[PathBuf],
    set: &mut FileSet,
) -> Result<FileId, ParseError> {
    let canonical = std::fs::canonicalize(path).map_err(|source| ParseError::Io {
        path: path.to_path_buf(),
        source,
    })?;

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
    let doc = deserialize(&canonical, &source)?;

    let id = set.reserve(canonical.clone(), SourceKind::Swagger);
    tracing::debug!(path = %canonical.display(), "parsing swagger document");

    let package = package_name(&canonical);
    let mut builder = Builder {
        path: &canonical,
        id,
        package,
        messages: Vec::new(),
        enums: Vec::new(),
        maps: Vec::new(),
        imports: Vec::new(),
        slots: HashMap::new(),
        aliases,
        search_paths,
        set,
    };
    let file = builder.build(doc)?;
    set.commit(id, file);
    Ok(id)
}

/// Pick the deserializer by extension, sniffing JSON-then-YAML otherwise.
fn deserialize(path: &Path, source: &str) -> Result<Document, ParseError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();
    let document = match ext.as_str() {
        "json" => serde_json::from_str(source).map_err(|e| e.to_string()),
        "yaml" | "yml" => serde_yaml::from_str(source).map_err(|e| e.to_string()),
        _ => serde_json::from_str(source)
            .map_err(|e| e.to_string())
            .or_else(|_| serde_yaml::from_str(source).map_err(|e| e.to_string())),
    };
    document.map_err(|message| ParseError::Document {
        path: path.to_path_buf(),
        message,
    })
}

/// Package name derived from the document's file stem.
fn package_name(path: &Path) -> String {
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("swagger");
    let mut out = String::with_capacity(stem.len());
    for ch in stem.chars() {
        if ch.is_ascii_alphanumeric() || ch == '_' {
            out.push(ch.to_ascii_lowercase());
        } else {
            out.push('_');
        }
    }
    out
}

/// Resolution state for one named definition.
enum DefSlot {
    Resolved(TypeRef),
    Pending(Schema),
    Visiting,
}

struct Builder<'a> {
    path: &'a Path,
    id: FileId,
    package: String,
    messages: Vec<Message>,
    enums: Vec<EnumDef>,
    maps: Vec<Map>,
    imports: Vec<FileId>,
    slots: HashMap<String, DefSlot>,
    aliases: &'a HashMap<String, PathBuf>,
    search_paths: &'a [PathBuf],
    set: &'a mut FileSet,
}

impl Builder<'_> {
    fn build(&mut self, doc: Document) -> Result<File, ParseError> {
        let Document {
            swagger,
            tags,
            paths,
            definitions,
        } = doc;

        if !swagger.is_empty() && !swagger.starts_with('2') {
            return Err(ParseError::Document {
                path: self.path.to_path_buf(),
                message: format!("unsupported swagger version `{swagger}`"),
            });
        }

        // First pass: register object and enum definitions so $refs --
        // including mutually recursive ones -- land on stable handles.
        let mut fill: Vec<(usize, Schema, String)> = Vec::new();
        for (name, schema) in definitions {
            if schema.is_object() {
                let index = self.alloc_message(&name, &name, None);
                self.slots.insert(
                    name.clone(),
                    DefSlot::Resolved(TypeRef::Message(self.message_id(index))),
                );
                fill.push((index, schema, name));
            } else if !schema.enum_values().is_empty() {
                let enum_ref = self.alloc_enum(&name, schema.enum_values());
                self.slots.insert(name, DefSlot::Resolved(enum_ref));
            } else {
                self.slots.insert(name, DefSlot::Pending(schema));
            }
        }

        // Second pass: fields, then force remaining typedefs so dangling
        // references fail even when nothing uses them.
        for (index, schema, route) in fill {
            let owner = self.message_id(index);
            let fields = self.build_fields(&schema, &route, owner)?;
            self.messages[index].fields = fields;
        }
        let pending: Vec<String> = self
            .slots
            .iter()
            .filter(|(_, slot)| matches!(slot, DefSlot::Pending(_)))
            .map(|(name, _)| name.clone())
            .collect();
        for name in pending {
            self.resolve_def(&name)?;
        }

        let services = self.build_services(tags, paths)?;

        Ok(File {
            path: self.path.to_path_buf(),
            kind: SourceKind::Swagger,
            package: std::mem::take(&mut self.package),
            messages: std::mem::take(&mut self.messages),
            enums: std::mem::take(&mut self.enums),
            maps: std::mem::take(&mut self.maps),
            services,
            imports: std::mem::take(&mut self.imports),
        })
    }

    fn build_services(
        &mut self,
        tags: Vec<document::TagDecl>,
        paths: std::collections::BTreeMap<String, document::PathItem>,
    ) -> Result<Vec<Service>, ParseError> {
        // Tag declaration order first; undeclared tags in encounter order.
        let mut order: Vec<String> = tags.into_iter().map(|t| t.name).collect();
        let mut grouped: HashMap<String, Vec<Method>> = HashMap::new();

        for (route, item) in &paths {
            for (verb, op) in item.operations() {
                let tag = op
                    .tags
                    .first()
                    .cloned()
                    .unwrap_or_else(|| "default".to_string());
                if !order.contains(&tag) {
                    order.push(tag.clone());
                }
                let method = self.build_method(route, verb, op)?;
                grouped.entry(tag).or_default().push(method);
            }
        }

        Ok(order
            .into_iter()
            .filter_map(|name| {
                grouped
                    .remove(&name)
                    .map(|methods| Service { name, methods })
            })
            .collect())
    }

    fn build_method(
        &mut self,
        route: &str,
        verb: HttpVerb,
        op: &Operation,
    ) -> Result<Method, ParseError> {
        let name = op
            .operation_id
            .clone()
            .unwrap_or_else(|| derive_operation_name(verb, route));
        let base = name.to_upper_camel_case();

        let input = self.build_request(&base, op)?;
        let output = self.build_response(&base, op)?;

        Ok(Method {
            name,
            input,
            output,
            http: Some(HttpRoute {
                verb,
                path: route.to_string(),
            }),
        })
    }

    /// Synthesize the input message for an operation from its parameters.
    fn build_request(&mut self, base: &str, op: &Operation) -> Result<MessageId, ParseError> {
        let type_name = self.unique_type_name(&format!("{base}Request"));
        let index = self.alloc_message(&type_name, &type_name, None);

        let mut fields = Vec::with_capacity(op.parameters.len());
        for param in &op.parameters {
            fields.push(self.build_parameter(&type_name, param)?);
        }
        self.messages[index].fields = fields;
        Ok(self.message_id(index))
    }

    fn build_parameter(
        &mut self,
        owner: &str,
        param: &Parameter,
    ) -> Result<Field, ParseError> {
        let route = format!("{owner}.{}", param.name.to_upper_camel_case());

        let (ty, repeated) = if param.location == "body" {
            let schema = param.schema.as_ref().ok_or_else(|| ParseError::Document {
                path: self.path.to_path_buf(),
                message: format!("body parameter `{}` has no schema", param.name),
            })?;
            self.array_aware(schema, &route, None)?
        } else if param.ty.as_deref() == Some("array") {
            let items = param.items.as_ref().ok_or_else(|| ParseError::Document {
                path: self.path.to_path_buf(),
                message: format!("array parameter `{}` has no items", param.name),
            })?;
            (self.resolve_schema(items, &route, None)?, true)
        } else {
            let ty_name = param.ty.as_deref().ok_or_else(|| ParseError::Document {
                path: self.path.to_path_buf(),
                message: format!("parameter `{}` has no type", param.name),
            })?;
            let kind = scalar::swagger_scalar(ty_name, &param.format).ok_or_else(|| {
                ParseError::UnknownScalar {
                    path: self.path.to_path_buf(),
                    name: format!("{ty_name}/{}", param.format),
                }
            })?;
            (TypeRef::Scalar(kind), false)
        };

        Ok(Field {
            name: param.name.clone(),
            ty,
            repeated,
            required: param.required,
            oneof: None,
        })
    }

    /// Output message for an operation: the 200/default response schema,
    /// wrapped when it is not itself a message.
    fn build_response(&mut self, base: &str, op: &Operation) -> Result<MessageId, ParseError> {
        let schema = op
            .responses
            .get("200")
            .or_else(|| op.responses.get("default"))
            .and_then(|r| r.schema.as_ref());

        let type_name = self.unique_type_name(&format!("{base}Response"));
        let route = format!("{type_name}.Value");

        match schema {
            None => {
                let index = self.alloc_message(&type_name, &type_name, None);
                Ok(self.message_id(index))
            }
            Some(schema) => {
                let (ty, repeated) = self.array_aware(schema, &route, None)?;
                if let (TypeRef::Message(id), false) = (&ty, repeated) {
                    return Ok(*id);
                }
                let index = self.alloc_message(&type_name, &type_name, None);
                self.messages[index].fields = vec![Field {
                    name: "value".to_string(),
                    ty,
                    repeated,
                    required: true,
                    oneof: None,
                }];
                Ok(self.message_id(index))
            }
        }
    }

    /// Resolve a schema, unwrapping one level of array into the repeated
    /// flag the way the proto front-end models repetition.
    fn array_aware(
        &mut self,
        schema: &Schema,
        route: &str,
        parent: Option<MessageId>,
    ) -> Result<(TypeRef, bool), ParseError> {
        if schema.ty.as_deref() == Some("array") {
            let items = schema.items.as_ref().ok_or_else(|| ParseError::Document {
                path: self.path.to_path_buf(),
                message: format!("array at `{route}` has no items"),
            })?;
            Ok((self.resolve_schema(items, route, parent)?, true))
        } else {
            Ok((self.resolve_schema(schema, route, parent)?, false))
        }
    }

    fn build_fields(
        &mut self,
        schema: &Schema,
        route: &str,
        owner: MessageId,
    ) -> Result<Vec<Field>, ParseError> {
        let mut fields = Vec::with_capacity(schema.properties.len());
        for (name, prop) in &schema.properties {
            let child_route = format!("{route}.{}", name.to_upper_camel_case());
            let (ty, repeated) = self.array_aware(prop, &child_route, Some(owner))?;
            fields.push(Field {
                name: name.clone(),
                ty,
                repeated,
                required: schema.required.contains(name),
                oneof: None,
            });
        }
        Ok(fields)
    }

    fn resolve_schema(
        &mut self,
        schema: &Schema,
        route: &str,
        parent: Option<MessageId>,
    ) -> Result<TypeRef, ParseError> {
        if let Some(reference) = &schema.reference {
            return self.resolve_ref(reference);
        }
        if !schema.enum_values().is_empty() {
            return Ok(self.alloc_enum(route, schema.enum_values()));
        }
        if let Some(values) = schema.map_values() {
            let value = self.resolve_schema(values, route, parent)?;
            let map_id = MapId {
                file: self.id,
                index: self.maps.len() as u32,
            };
            self.maps.push(Map {
                key: crate::ir::ScalarKind::String,
                value,
                field_path: route.to_string(),
            });
            return Ok(TypeRef::Map(map_id));
        }
        if schema.is_object() {
            let type_name = self.unique_type_name(route);
            let index = self.alloc_message(last_segment(&type_name), &type_name, parent);
            let owner = self.message_id(index);
            let fields = self.build_fields(schema, &type_name, owner)?;
            self.messages[index].fields = fields;
            return Ok(TypeRef::Message(owner));
        }
        if schema.ty.as_deref() == Some("array") {
            let items = schema.items.as_ref().ok_or_else(|| ParseError::Document {
                path: self.path.to_path_buf(),
                message: format!("array at `{route}` has no items"),
            })?;
            let element = self.resolve_schema(items, route, parent)?;
            return Ok(TypeRef::Array(Box::new(element)));
        }
        if let Some(ty) = schema.ty.as_deref() {
            let kind = scalar::swagger_scalar(ty, &schema.format).ok_or_else(|| {
                ParseError::UnknownScalar {
                    path: self.path.to_path_buf(),
                    name: format!("{ty}/{}", schema.format),
                }
            })?;
            return Ok(TypeRef::Scalar(kind));
        }
        Err(ParseError::Document {
            path: self.path.to_path_buf(),
            message: format!("schema at `{route}` has neither type nor $ref"),
        })
    }

    /// `#/definitions/Name` locally, `file#/definitions/Name` across
    /// documents (aliases first, then relative to this document, then the
    /// search paths).
    fn resolve_ref(&mut self, reference: &str) -> Result<TypeRef, ParseError> {
        let (file_part, fragment) = match reference.split_once('#') {
            Some((file, frag)) => (file, frag),
            None => (reference, ""),
        };
        let name = fragment.rsplit('/').next().unwrap_or("").to_string();

        if file_part.is_empty() {
            if name.is_empty() {
                return Err(self.dangling(reference));
            }
            return self.resolve_def(&name);
        }

        let resolved = self.resolve_import_path(file_part).ok_or_else(|| {
            ParseError::UnresolvedImport {
                path: self.path.to_path_buf(),
                import: file_part.to_string(),
            }
        })?;
        let imported = parse(&resolved, self.aliases, self.search_paths, self.set)?;
        if !self.imports.contains(&imported) {
            self.imports.push(imported);
        }

        let file = self.set.file(imported);
        file.find_type(imported, &name)
            .ok_or_else(|| self.dangling(reference))
    }

    fn resolve_import_path(&self, file_part: &str) -> Option<PathBuf> {
        if let Some(mapped) = self.aliases.get(file_part) {
            return Some(mapped.clone());
        }
        if let Some(dir) = self.path.parent() {
            let sibling = dir.join(file_part);
            if sibling.is_file() {
                return Some(sibling);
            }
        }
        self.search_paths
            .iter()
            .map(|base| base.join(file_part))
            .find(|candidate| candidate.is_file())
    }

    fn resolve_def(&mut self, name: &str) -> Result<TypeRef, ParseError> {
        match self.slots.get(name) {
            Some(DefSlot::Resolved(ty)) => return Ok(ty.clone()),
            Some(DefSlot::Visiting) => {
                return Err(ParseError::Document {
                    path: self.path.to_path_buf(),
                    message: format!("cyclic $ref through non-object definition `{name}`"),
                });
            }
            Some(DefSlot::Pending(_)) => {}
            None => return Err(self.dangling(name)),
        }

        let Some(DefSlot::Pending(schema)) =
            self.slots.insert(name.to_string(), DefSlot::Visiting)
        else {
            unreachable!("checked above");
        };
        let resolved = self.resolve_schema(&schema, name, None)?;
        self.slots
            .insert(name.to_string(), DefSlot::Resolved(resolved.clone()));
        Ok(resolved)
    }

    fn alloc_message(&mut self, name: &str, type_name: &str, parent: Option<MessageId>) -> usize {
        let index = self.messages.len();
        self.messages.push(Message {
            name: name.to_string(),
            type_name: type_name.to_string(),
            fields: Vec::new(),
            parent,
        });
        index
    }

    fn alloc_enum(&mut self, route: &str, values: Vec<String>) -> TypeRef {
        let type_name = self.unique_type_name(route);
        let id = EnumId {
            file: self.id,
            index: self.enums.len() as u32,
        };
        self.enums.push(EnumDef {
            name: last_segment(&type_name).to_string(),
            type_name,
            values: values
                .into_iter()
                .enumerate()
                .map(|(number, name)| EnumValue {
                    name,
                    number: number as i32,
                })
                .collect(),
        });
        TypeRef::Enum(id)
    }

    fn message_id(&self, index: usize) -> MessageId {
        MessageId {
            file: self.id,
            index: index as u32,
        }
    }

    /// Route names are usually unique already; synthesized request/response
    /// names can collide with definitions and get a numeric suffix.
    fn unique_type_name(&self, base: &str) -> String {
        let taken = |candidate: &str| {
            self.messages.iter().any(|m| m.type_name == candidate)
                || self.enums.iter().any(|e| e.type_name == candidate)
        };
        if !taken(base) {
            return base.to_string();
        }
        let mut n = 1usize;
        loop {
            let candidate = format!("{base}_{n}");
            if !taken(&candidate) {
                return candidate;
            }
            n += 1;
        }
    }

    fn dangling(&self, reference: &str) -> ParseError {
        ParseError::Document {
            path: self.path.to_path_buf(),
            message: format!("dangling $ref `{reference}`"),
        }
    }
}

fn derive_operation_name(verb: HttpVerb, route: &str) -> String {
    let mut name = verb.as_str().to_string();
    for segment in route.split(|c: char| !c.is_ascii_alphanumeric()) {
        if !segment.is_empty() {
            name.push_str(&segment.to_upper_camel_case());
        }
    }
    name
}

fn last_segment(route: &str) -> &str {
    route.rsplit('.').next().unwrap_or(route)
}

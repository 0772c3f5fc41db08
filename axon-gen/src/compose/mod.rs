//! Schema composition
//!
//! Expands the declarative OBJECT/SERVICE configuration tree into the
//! Query/Mutation object graph. This is a state machine over configuration,
//! not a type system: OBJECT nodes recurse and synthesize aggregate types,
//! SERVICE nodes bind a named service's methods as sibling fields of their
//! parent. The composed tree is rebuilt per configured schema and discarded
//! after emission.

use std::collections::{HashMap, HashSet};

use heck::ToLowerCamelCase;

use crate::config::{NodeKind, SchemaConfig, SchemaNode};
use crate::error::{ConfigError, Error};
use crate::ir::ServiceId;
use crate::resolve::Resolver;

/// A fully composed schema, ready for emission.
#[derive(Debug)]
pub struct ComposedSchema {
    /// Schema name from configuration.
    pub name: String,
    /// Query root, absent when nothing survived pruning.
    pub query: Option<ObjectNode>,
    /// Mutation root, absent when nothing survived pruning.
    pub mutation: Option<ObjectNode>,
    /// Services referenced anywhere in the tree, deduplicated by name,
    /// first occurrence wins: one client binding per service per schema.
    pub services: Vec<ServiceBinding>,
}

/// One deduplicated service binding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceBinding {
    /// Service name as configured.
    pub name: String,
    /// Resolved service.
    pub id: ServiceId,
}

/// A synthesized aggregate object type.
#[derive(Debug)]
pub struct ObjectNode {
    /// Generated type/field name.
    pub name: String,
    /// Fields, in configuration order.
    pub fields: Vec<FieldNode>,
}

/// One field of a composed object.
#[derive(Debug)]
pub enum FieldNode {
    /// A bound service method.
    Method(BoundMethod),
    /// A nested aggregate object.
    Object(ObjectNode),
}

/// A service method bound into the tree.
#[derive(Debug)]
pub struct BoundMethod {
    /// GraphQL field name (configured alias or camel-cased method name).
    pub field_name: String,
    /// Owning service.
    pub service: ServiceId,
    /// Method position within the service.
    pub method_index: usize,
}

/// Merge an imported fragment into a base schema.
///
/// Merging is a shallow append of the fragment's root field lists onto the
/// base schema's, never a deep merge. Two SERVICE declarations for the same
/// root slot are ambiguous (which service's root type wins?) and rejected.
pub fn merge_schema(base: &mut SchemaConfig, fragment: &SchemaConfig) -> Result<(), ConfigError> {
    merge_slot(&base.name, "query", &mut base.queries, &fragment.queries)?;
    merge_slot(&base.name, "mutation", &mut base.mutations, &fragment.mutations)
}

fn merge_slot(
    schema: &str,
    slot: &'static str,
    base: &mut Option<SchemaNode>,
    fragment: &Option<SchemaNode>,
) -> Result<(), ConfigError> {
    let Some(fragment) = fragment else {
        return Ok(());
    };
    let Some(base) = base else {
        *base = Some(fragment.clone());
        return Ok(());
    };

    match (base.kind, fragment.kind) {
        (NodeKind::Service, NodeKind::Service) => Err(ConfigError::AmbiguousMerge {
            schema: schema.to_string(),
            slot,
        }),
        (NodeKind::Service, NodeKind::Object) => Err(ConfigError::Invalid(format!(
            "schema `{schema}`: cannot append {slot} fields to a SERVICE root"
        ))),
        (NodeKind::Object, NodeKind::Object) => {
            base.fields.extend(fragment.fields.iter().cloned());
            Ok(())
        }
        (NodeKind::Object, NodeKind::Service) => {
            // A service fragment lands as one more child; its methods
            // flatten into the root object like any sibling SERVICE node.
            base.fields.push(fragment.clone());
            Ok(())
        }
    }
}

/// Compose one schema from its configuration tree.
pub fn compose(resolver: &Resolver<'_>, schema: &SchemaConfig) -> Result<ComposedSchema, Error> {
    let mut composer = Composer {
        resolver,
        services: Vec::new(),
        seen_services: HashMap::new(),
    };

    let query = composer.root(schema.queries.as_ref(), "Query", false)?;
    let mutation = composer.root(schema.mutations.as_ref(), "Mutation", true)?;

    let composed = ComposedSchema {
        name: schema.name.clone(),
        query,
        mutation,
        services: composer.services,
    };
    check_duplicate_objects(&composed)?;
    Ok(composed)
}

/// Duplicate generated object names across the whole resolved tree are
/// fatal; checked once after full resolution.
fn check_duplicate_objects(schema: &ComposedSchema) -> Result<(), ConfigError> {
    let mut seen = HashSet::new();
    for root in [&schema.query, &schema.mutation].into_iter().flatten() {
        collect_names(root, &schema.name, &mut seen)?;
    }
    Ok(())
}

fn collect_names(
    node: &ObjectNode,
    schema: &str,
    seen: &mut HashSet<String>,
) -> Result<(), ConfigError> {
    if !seen.insert(node.name.clone()) {
        return Err(ConfigError::DuplicateObject {
            schema: schema.to_string(),
            object: node.name.clone(),
        });
    }
    for field in &node.fields {
        if let FieldNode::Object(child) = field {
            collect_names(child, schema, seen)?;
        }
    }
    Ok(())
}

struct Composer<'a, 'r> {
    resolver: &'a Resolver<'r>,
    services: Vec<ServiceBinding>,
    seen_services: HashMap<String, ServiceId>,
}

impl Composer<'_, '_> {
    /// Expand one root slot; depth-first, independently of the other slot.
    fn root(
        &mut self,
        node: Option<&SchemaNode>,
        default_name: &str,
        mutation: bool,
    ) -> Result<Option<ObjectNode>, Error> {
        let Some(node) = node else {
            return Ok(None);
        };
        let name = if node.name.is_empty() {
            default_name.to_string()
        } else {
            node.name.clone()
        };

        let fields = match node.kind {
            NodeKind::Service => self.bind_service(node, mutation)?,
            NodeKind::Object => self.expand_children(node, mutation)?,
        };

        // An aggregate that produced nothing is never emitted.
        if fields.is_empty() {
            return Ok(None);
        }
        Ok(Some(ObjectNode { name, fields }))
    }

    /// Children of an OBJECT node: SERVICE children contribute their
    /// methods as sibling fields, OBJECT children become nested objects
    /// unless their own expansion came up empty.
    fn expand_children(
        &mut self,
        node: &SchemaNode,
        mutation: bool,
    ) -> Result<Vec<FieldNode>, Error> {
        let mut fields = Vec::new();
        for child in &node.fields {
            match child.kind {
                NodeKind::Service => {
                    fields.extend(self.bind_service(child, mutation)?);
                }
                NodeKind::Object => {
                    if child.name.is_empty() {
                        return Err(ConfigError::Invalid(
                            "OBJECT node requires a name".to_string(),
                        )
                        .into());
                    }
                    let nested = self.expand_children(child, mutation)?;
                    if !nested.is_empty() {
                        fields.push(FieldNode::Object(ObjectNode {
                            name: child.name.clone(),
                            fields: nested,
                        }));
                    }
                }
            }
        }
        Ok(fields)
    }

    /// Bind a SERVICE node's methods, filtered to the requested side and
    /// by the allow/deny lists. Deny wins when both name a method.
    fn bind_service(
        &mut self,
        node: &SchemaNode,
        mutation: bool,
    ) -> Result<Vec<FieldNode>, Error> {
        let service_name = node.service.as_deref().unwrap_or_default();
        if service_name.is_empty() {
            return Err(
                ConfigError::Invalid("SERVICE node requires a service name".to_string()).into(),
            );
        }
        let set = self.resolver.set();
        let id = set
            .find_service(service_name)
            .ok_or_else(|| ConfigError::ServiceNotFound(service_name.to_string()))?;
        self.register(service_name, id);

        let service = set.service(id);
        let mut fields = Vec::new();
        for (index, method) in service.methods.iter().enumerate() {
            if self.is_mutation(service_name, method) != mutation {
                continue;
            }
            if node.deny.contains(&method.name) {
                continue;
            }
            if !node.allow.is_empty() && !node.allow.contains(&method.name) {
                continue;
            }
            let config = self
                .resolver
                .config()
                .method_config(service_name, &method.name);
            let field_name = config
                .and_then(|c| c.alias.clone())
                .unwrap_or_else(|| method.name.to_lower_camel_case());
            fields.push(FieldNode::Method(BoundMethod {
                field_name,
                service: id,
                method_index: index,
            }));
        }
        Ok(fields)
    }

    /// Query/mutation classification: explicit configuration wins, swagger
    /// methods follow their HTTP verb, proto methods default to query.
    fn is_mutation(&self, service_name: &str, method: &crate::ir::Method) -> bool {
        if let Some(config) = self
            .resolver
            .config()
            .method_config(service_name, &method.name)
        {
            if let Some(mutation) = config.mutation {
                return mutation;
            }
        }
        match &method.http {
            Some(route) => !route.verb.is_query(),
            None => false,
        }
    }

    /// First occurrence wins: a service client is instantiated once per
    /// schema no matter how many branches reference it.
    fn register(&mut self, name: &str, id: ServiceId) {
        if self.seen_services.contains_key(name) {
            return;
        }
        self.seen_services.insert(name.to_string(), id);
        self.services.push(ServiceBinding {
            name: name.to_string(),
            id,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, MethodConfig};
    use crate::ir::{
        Field, File, FileSet, HttpRoute, HttpVerb, Message, Method, ScalarKind, Service,
        SourceKind, TypeRef,
    };
    use std::path::PathBuf;

    fn fixture() -> FileSet {
        let mut set = FileSet::new();
        let id = set.reserve(PathBuf::from("/svc.proto"), SourceKind::Proto);
        let req = crate::ir::MessageId { file: id, index: 0 };
        let res = crate::ir::MessageId { file: id, index: 1 };

        let method = |name: &str, http: Option<HttpRoute>| Method {
            name: name.to_string(),
            input: req,
            output: res,
            http,
        };

        set.commit(
            id,
            File {
                path: PathBuf::from("/svc.proto"),
                kind: SourceKind::Proto,
                package: "svc".to_string(),
                messages: vec![
                    Message {
                        name: "Req".to_string(),
                        type_name: "Req".to_string(),
                        fields: Vec::new(),
                        parent: None,
                    },
                    Message {
                        name: "Res".to_string(),
                        type_name: "Res".to_string(),
                        fields: vec![Field {
                            name: "ok".to_string(),
                            ty: TypeRef::Scalar(ScalarKind::Bool),
                            repeated: false,
                            required: false,
                            oneof: None,
                        }],
                        parent: None,
                    },
                ],
                enums: Vec::new(),
                maps: Vec::new(),
                services: vec![
                    Service {
                        name: "Users".to_string(),
                        methods: vec![method("GetUser", None), method("ListUsers", None)],
                    },
                    Service {
                        name: "Posts".to_string(),
                        methods: vec![
                            method(
                                "GetPost",
                                Some(HttpRoute {
                                    verb: HttpVerb::Get,
                                    path: "/posts/{id}".to_string(),
                                }),
                            ),
                            method(
                                "CreatePost",
                                Some(HttpRoute {
                                    verb: HttpVerb::Post,
                                    path: "/posts".to_string(),
                                }),
                            ),
                        ],
                    },
                ],
                imports: Vec::new(),
            },
        );
        set
    }

    fn service_node(service: &str) -> SchemaNode {
        SchemaNode {
            kind: NodeKind::Service,
            service: Some(service.to_string()),
            ..SchemaNode::default()
        }
    }

    fn object_node(name: &str, fields: Vec<SchemaNode>) -> SchemaNode {
        SchemaNode {
            kind: NodeKind::Object,
            name: name.to_string(),
            fields,
            ..SchemaNode::default()
        }
    }

    fn schema(queries: Option<SchemaNode>, mutations: Option<SchemaNode>) -> SchemaConfig {
        SchemaConfig {
            name: "test".to_string(),
            imports: Vec::new(),
            queries,
            mutations,
        }
    }

    #[test]
    fn test_service_root_binds_methods() {
        let set = fixture();
        let config = Config::default();
        let resolver = Resolver::new(&set, &config);

        let composed =
            compose(&resolver, &schema(Some(service_node("Users")), None)).unwrap();
        let query = composed.query.unwrap();
        assert_eq!(query.name, "Query");
        assert_eq!(query.fields.len(), 2);
        match &query.fields[0] {
            FieldNode::Method(m) => assert_eq!(m.field_name, "getUser"),
            _ => panic!("expected method field"),
        }
        assert!(composed.mutation.is_none());
    }

    #[test]
    fn test_http_verb_splits_query_and_mutation() {
        let set = fixture();
        let config = Config::default();
        let resolver = Resolver::new(&set, &config);

        let composed = compose(
            &resolver,
            &schema(Some(service_node("Posts")), Some(service_node("Posts"))),
        )
        .unwrap();
        let query = composed.query.unwrap();
        let mutation = composed.mutation.unwrap();
        assert_eq!(query.fields.len(), 1);
        assert_eq!(mutation.fields.len(), 1);
        match &mutation.fields[0] {
            FieldNode::Method(m) => assert_eq!(m.field_name, "createPost"),
            _ => panic!("expected method field"),
        }
    }

    #[test]
    fn test_empty_object_is_pruned() {
        let set = fixture();
        let config = Config::default();
        let resolver = Resolver::new(&set, &config);

        // Every method denied: the aggregate must vanish entirely.
        let mut denied = service_node("Users");
        denied.deny = vec!["GetUser".to_string(), "ListUsers".to_string()];
        let tree = object_node("Query", vec![object_node("Accounts", vec![denied])]);

        let composed = compose(&resolver, &schema(Some(tree), None)).unwrap();
        assert!(composed.query.is_none());
    }

    #[test]
    fn test_deny_wins_over_allow() {
        let set = fixture();
        let config = Config::default();
        let resolver = Resolver::new(&set, &config);

        let mut node = service_node("Users");
        node.allow = vec!["GetUser".to_string(), "ListUsers".to_string()];
        node.deny = vec!["GetUser".to_string()];

        let composed = compose(&resolver, &schema(Some(node), None)).unwrap();
        let query = composed.query.unwrap();
        assert_eq!(query.fields.len(), 1);
        match &query.fields[0] {
            FieldNode::Method(m) => assert_eq!(m.field_name, "listUsers"),
            _ => panic!("expected method field"),
        }
    }

    #[test]
    fn test_services_dedup_first_wins() {
        let set = fixture();
        let config = Config::default();
        let resolver = Resolver::new(&set, &config);

        let tree = object_node(
            "Query",
            vec![
                object_node("A", vec![service_node("Users")]),
                object_node("B", vec![service_node("Users"), service_node("Posts")]),
            ],
        );
        let composed = compose(&resolver, &schema(Some(tree), None)).unwrap();
        let names: Vec<_> = composed.services.iter().map(|s| s.name.clone()).collect();
        assert_eq!(names, vec!["Users".to_string(), "Posts".to_string()]);
    }

    #[test]
    fn test_duplicate_object_names_rejected() {
        let set = fixture();
        let config = Config::default();
        let resolver = Resolver::new(&set, &config);

        let tree = object_node(
            "Query",
            vec![
                object_node("Accounts", vec![service_node("Users")]),
                object_node("Accounts", vec![service_node("Posts")]),
            ],
        );
        let err = compose(&resolver, &schema(Some(tree), None)).unwrap_err();
        assert!(matches!(
            err,
            Error::Config(ConfigError::DuplicateObject { .. })
        ));
    }

    #[test]
    fn test_unknown_service_rejected() {
        let set = fixture();
        let config = Config::default();
        let resolver = Resolver::new(&set, &config);

        let err = compose(&resolver, &schema(Some(service_node("Nope")), None)).unwrap_err();
        assert!(matches!(
            err,
            Error::Config(ConfigError::ServiceNotFound(_))
        ));
    }

    #[test]
    fn test_mutation_override_from_config() {
        let set = fixture();
        let mut config = Config::default();
        config.methods.insert(
            "Users.GetUser".to_string(),
            MethodConfig {
                alias: None,
                mutation: Some(true),
            },
        );
        let resolver = Resolver::new(&set, &config);

        let composed = compose(
            &resolver,
            &schema(Some(service_node("Users")), Some(service_node("Users"))),
        )
        .unwrap();
        let query = composed.query.unwrap();
        let mutation = composed.mutation.unwrap();
        assert_eq!(query.fields.len(), 1);
        assert_eq!(mutation.fields.len(), 1);
    }

    #[test]
    fn test_merge_appends_fragment_fields() {
        let mut base = schema(
            Some(object_node("Query", vec![service_node("Users")])),
            None,
        );
        let fragment = schema(
            Some(object_node("Query", vec![service_node("Posts")])),
            None,
        );
        merge_schema(&mut base, &fragment).unwrap();
        assert_eq!(base.queries.as_ref().unwrap().fields.len(), 2);
    }

    #[test]
    fn test_merge_service_into_service_rejected() {
        let mut base = schema(Some(service_node("Users")), None);
        let fragment = schema(Some(service_node("Posts")), None);
        let err = merge_schema(&mut base, &fragment).unwrap_err();
        assert!(matches!(err, ConfigError::AmbiguousMerge { slot: "query", .. }));
    }

    #[test]
    fn test_merge_into_missing_slot_adopts_fragment() {
        let mut base = schema(Some(service_node("Users")), None);
        let fragment = schema(None, Some(service_node("Posts")));
        merge_schema(&mut base, &fragment).unwrap();
        assert!(base.mutations.is_some());
    }
}

//! Generation configuration
//!
//! The YAML file that drives a compilation: where to find schemas, how
//! messages and methods map onto the GraphQL surface, which dataloaders to
//! synthesize, and the declarative Query/Mutation composition tree.
//!
//! Fragment merging (a schema extended by another config file's fragment of
//! the same name) lives in the composer; this module only loads files.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::ConfigError;
use crate::ir::{FileSet, MessageId};

/// Top-level configuration document.
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    /// Directories scanned, in order, when resolving imports.
    #[serde(default)]
    pub search_paths: Vec<PathBuf>,

    /// Explicit import-string remaps, consulted before `search_paths`.
    #[serde(default)]
    pub import_aliases: HashMap<String, PathBuf>,

    /// Source schema documents (`.proto`, `.json`, `.yaml`).
    #[serde(default)]
    pub sources: Vec<PathBuf>,

    /// Per-message options, keyed by package-qualified or plain type name.
    #[serde(default)]
    pub messages: HashMap<String, MessageConfig>,

    /// Per-method options, keyed `Service.Method`.
    #[serde(default)]
    pub methods: HashMap<String, MethodConfig>,

    /// Dataloaders to synthesize.
    #[serde(default)]
    pub loaders: Vec<LoaderConfig>,

    /// GraphQL schemas to compose.
    #[serde(default)]
    pub schemas: Vec<SchemaConfig>,
}

/// Options for one message.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct MessageConfig {
    /// Field subtracted before the empty-object check; by convention the
    /// transport-level error slot.
    pub error_field: Option<String>,

    /// Render this message as its single field instead of an object type.
    /// Rejected eagerly when the message has more than one field.
    #[serde(default)]
    pub unwrap: bool,

    /// Per-field options, keyed by field name.
    #[serde(default)]
    pub fields: HashMap<String, FieldConfig>,
}

/// Options for one field.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct FieldConfig {
    /// Take the value from this out-of-band context key instead of a
    /// GraphQL argument. Checked before normal argument resolution.
    pub context_key: Option<String>,
}

/// Options for one service method.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct MethodConfig {
    /// GraphQL field name override.
    pub alias: Option<String>,

    /// Force this method onto the mutation side. Without this, proto
    /// methods are queries and swagger methods follow their HTTP verb.
    pub mutation: Option<bool>,
}

/// One dataloader to synthesize.
#[derive(Debug, Clone, Deserialize)]
pub struct LoaderConfig {
    /// Loader (and generated type) name.
    pub name: String,

    /// Owning service.
    pub service: String,

    /// Batch method on the service.
    pub method: String,

    /// Field on the response message holding the repeated results.
    pub result: String,

    /// Field on the result message correlating an entry to a request key.
    #[serde(rename = "match")]
    pub match_field: String,

    /// Collect all matches per key (1:N) instead of the first (1:1).
    #[serde(default)]
    pub many: bool,

    /// Batching wait window in milliseconds.
    #[serde(default = "default_wait_ms")]
    pub wait_ms: u64,

    /// Maximum keys per batch.
    #[serde(default = "default_max_batch")]
    pub max_batch: usize,
}

fn default_wait_ms() -> u64 {
    10
}

fn default_max_batch() -> usize {
    100
}

/// One GraphQL schema to compose.
#[derive(Debug, Clone, Deserialize)]
pub struct SchemaConfig {
    /// Schema name; fragments with the same name merge into it.
    pub name: String,

    /// Config files whose same-named schema fragments extend this one.
    #[serde(default)]
    pub imports: Vec<PathBuf>,

    /// Query-side composition tree.
    pub queries: Option<SchemaNode>,

    /// Mutation-side composition tree.
    pub mutations: Option<SchemaNode>,
}

/// Node kind in the composition tree.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    /// Container: recurse into `fields`, synthesizing an aggregate type.
    #[default]
    Object,
    /// Leaf: bind a named service's methods.
    Service,
}

/// One node of the composition tree.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct SchemaNode {
    /// Node kind.
    #[serde(default)]
    pub kind: NodeKind,

    /// Generated field/type name for OBJECT nodes.
    #[serde(default)]
    pub name: String,

    /// Service bound by SERVICE nodes.
    pub service: Option<String>,

    /// Method allow-list; empty means all.
    #[serde(default)]
    pub allow: Vec<String>,

    /// Method deny-list; wins over `allow`.
    #[serde(default)]
    pub deny: Vec<String>,

    /// Children of OBJECT nodes.
    #[serde(default)]
    pub fields: Vec<SchemaNode>,
}

impl Config {
    /// Load a configuration document from a YAML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_yaml::from_str(&source).map_err(|source| ConfigError::Yaml {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Options for a message, preferring the package-qualified key.
    pub fn message_config(&self, set: &FileSet, id: MessageId) -> Option<&MessageConfig> {
        let qualified = set.qualified_name(id);
        if let Some(config) = self.messages.get(&qualified) {
            return Some(config);
        }
        self.messages.get(&set.message(id).type_name)
    }

    /// Options for a method, keyed `Service.Method`.
    pub fn method_config(&self, service: &str, method: &str) -> Option<&MethodConfig> {
        self.methods.get(&format!("{service}.{method}"))
    }

    /// Context key bound to a field, if any.
    pub fn context_key(&self, set: &FileSet, id: MessageId, field: &str) -> Option<&str> {
        self.message_config(set, id)?
            .fields
            .get(field)?
            .context_key
            .as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_full_config() {
        let config: Config = serde_yaml::from_str(
            r#"
            search_paths: ["proto"]
            import_aliases:
              "google/api/annotations.proto": "vendor/annotations.proto"
            sources: ["proto/user.proto"]
            messages:
              user.GetUserResponse:
                error_field: error
              user.UserNameOnly:
                unwrap: true
              user.CreateUserRequest:
                fields:
                  actor_id:
                    context_key: current_user
            methods:
              UserService.CreateUser:
                mutation: true
                alias: createUser
            loaders:
              - name: UserLoader
                service: UserService
                method: BatchGetUsers
                result: users
                match: id
            schemas:
              - name: gateway
                queries:
                  kind: object
                  name: Query
                  fields:
                    - kind: service
                      service: UserService
                      deny: [CreateUser]
            "#,
        )
        .unwrap();

        assert_eq!(config.sources.len(), 1);
        assert!(config.messages["user.UserNameOnly"].unwrap);
        assert_eq!(
            config.methods["UserService.CreateUser"].mutation,
            Some(true)
        );
        let loader = &config.loaders[0];
        assert_eq!(loader.match_field, "id");
        assert!(!loader.many);
        assert_eq!(loader.wait_ms, 10);
        let schema = &config.schemas[0];
        let queries = schema.queries.as_ref().unwrap();
        assert_eq!(queries.kind, NodeKind::Object);
        assert_eq!(queries.fields[0].kind, NodeKind::Service);
    }

    #[test]
    fn test_method_config_lookup() {
        let mut config = Config::default();
        config.methods.insert(
            "Svc.Get".to_string(),
            MethodConfig {
                alias: Some("fetch".to_string()),
                mutation: None,
            },
        );
        assert!(config.method_config("Svc", "Get").is_some());
        assert!(config.method_config("Svc", "Other").is_none());
    }
}

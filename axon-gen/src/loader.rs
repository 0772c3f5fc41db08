//! Dataloader synthesis
//!
//! Validates that a configured batch method has the shape a dataloader
//! needs and derives the [`LoaderModel`] the emitters render. Every shape
//! violation is a configuration error naming the offending field, surfaced
//! before code generation; a missing match at runtime is never an error
//! (the batching layer fills in nil/empty instead).
//!
//! Expected shape: the request message has exactly one field, of message
//! type, whose message holds exactly one repeated scalar field — the batch
//! keys. The response, at the configured result field, is a repeated
//! message; the result message, at the configured match field, has a
//! scalar, non-repeated correlation field.

use crate::config::LoaderConfig;
use crate::error::{ConfigError, Error};
use crate::ir::{Field, MessageId, ScalarKind, ServiceId, TypeRef};
use crate::resolve::{GqlType, Resolver};

/// One synthesized dataloader.
#[derive(Debug)]
pub struct LoaderModel {
    /// Loader (and generated type) name.
    pub name: String,
    /// Owning service.
    pub service: ServiceId,
    /// Owning service name.
    pub service_name: String,
    /// Batch method position within the service.
    pub method_index: usize,
    /// The request message's single, message-typed field.
    pub request_field: String,
    /// The repeated scalar key field inside the request's inner message.
    pub key_field: String,
    /// Key scalar kind.
    pub key_kind: ScalarKind,
    /// The repeated result field on the response message.
    pub result_field: String,
    /// Resolved response entry descriptor.
    pub response: GqlType,
    /// The result entry message.
    pub result_message: MessageId,
    /// The scalar correlation field on the result message.
    pub match_field: String,
    /// Correlation field kind.
    pub match_kind: ScalarKind,
    /// Collect all matches per key (1:N) instead of the first (1:1).
    pub many: bool,
    /// Batching wait window in milliseconds.
    pub wait_ms: u64,
    /// Maximum keys per batch.
    pub max_batch: usize,
}

/// Validate one loader configuration and derive its model.
pub fn synthesize(resolver: &Resolver<'_>, config: &LoaderConfig) -> Result<LoaderModel, Error> {
    let set = resolver.set();

    let service_id = set
        .find_service(&config.service)
        .ok_or_else(|| ConfigError::ServiceNotFound(config.service.clone()))?;
    let service = set.service(service_id);
    let (method_index, method) =
        service
            .method(&config.method)
            .ok_or_else(|| ConfigError::MethodNotFound {
                service: config.service.clone(),
                method: config.method.clone(),
            })?;

    let (request_field, key_field, key_kind) =
        validate_request(resolver, &config.name, method.input)?;
    let (result_field, result_message, response) =
        validate_response(resolver, config, method.output)?;
    let (match_field, match_kind) =
        validate_match(resolver, config, result_message)?;

    if match_kind != key_kind {
        tracing::warn!(
            loader = %config.name,
            "match field kind differs from key kind; correlation compares across kinds"
        );
    }

    Ok(LoaderModel {
        name: config.name.clone(),
        service: service_id,
        service_name: config.service.clone(),
        method_index,
        request_field,
        key_field,
        key_kind,
        result_field,
        response,
        result_message,
        match_field,
        match_kind,
        many: config.many,
        wait_ms: config.wait_ms,
        max_batch: config.max_batch,
    })
}

/// The request message wraps exactly one message-typed field whose message
/// holds exactly one repeated scalar field: the batch keys.
fn validate_request(
    resolver: &Resolver<'_>,
    loader: &str,
    input: MessageId,
) -> Result<(String, String, ScalarKind), Error> {
    let set = resolver.set();
    let request = set.message(input);

    let [outer] = request.fields.as_slice() else {
        return Err(ConfigError::LoaderRequestShape {
            loader: loader.to_string(),
            message: format!(
                "request message `{}` must have exactly one field, found {}",
                request.type_name,
                request.fields.len()
            ),
        }
        .into());
    };
    let TypeRef::Message(inner_id) = &outer.ty else {
        return Err(ConfigError::LoaderRequestShape {
            loader: loader.to_string(),
            message: format!("request field `{}` must be a message", outer.name),
        }
        .into());
    };

    let inner = set.message(*inner_id);
    let [key] = inner.fields.as_slice() else {
        return Err(ConfigError::LoaderRequestShape {
            loader: loader.to_string(),
            message: format!(
                "key message `{}` must have exactly one field, found {}",
                inner.type_name,
                inner.fields.len()
            ),
        }
        .into());
    };
    let TypeRef::Scalar(kind) = &key.ty else {
        return Err(ConfigError::LoaderRequestShape {
            loader: loader.to_string(),
            message: format!("key field `{}` must be a scalar", key.name),
        }
        .into());
    };
    if !key.repeated {
        return Err(ConfigError::LoaderKeyNotRepeated {
            loader: loader.to_string(),
            field: key.name.clone(),
        }
        .into());
    }

    Ok((outer.name.clone(), key.name.clone(), *kind))
}

/// The response holds, at the configured result field, a repeated message.
fn validate_response(
    resolver: &Resolver<'_>,
    config: &LoaderConfig,
    output: MessageId,
) -> Result<(String, MessageId, GqlType), Error> {
    let set = resolver.set();
    let response = set.message(output);
    let field = find_field(response.fields.as_slice(), &config.result).ok_or_else(|| {
        ConfigError::FieldNotFound {
            message: response.type_name.clone(),
            field: config.result.clone(),
        }
    })?;

    let TypeRef::Message(entry) = &field.ty else {
        return Err(ConfigError::LoaderResultNotMessage {
            loader: config.name.clone(),
            field: field.name.clone(),
        }
        .into());
    };
    if !field.repeated {
        return Err(ConfigError::LoaderResultNotMessage {
            loader: config.name.clone(),
            field: field.name.clone(),
        }
        .into());
    }

    let context = format!("loader `{}` result", config.name);
    let response_ty = resolver.loader_response(&field.ty, &context)?;
    Ok((field.name.clone(), *entry, response_ty))
}

/// The result message correlates back to a key through one scalar,
/// non-repeated field.
fn validate_match(
    resolver: &Resolver<'_>,
    config: &LoaderConfig,
    result: MessageId,
) -> Result<(String, ScalarKind), Error> {
    let set = resolver.set();
    let message = set.message(result);
    let field = find_field(message.fields.as_slice(), &config.match_field).ok_or_else(|| {
        ConfigError::FieldNotFound {
            message: message.type_name.clone(),
            field: config.match_field.clone(),
        }
    })?;

    if field.repeated {
        return Err(ConfigError::LoaderMatchRepeated {
            loader: config.name.clone(),
            field: field.name.clone(),
        }
        .into());
    }
    let TypeRef::Scalar(kind) = &field.ty else {
        return Err(ConfigError::LoaderMatchNotScalar {
            loader: config.name.clone(),
            field: field.name.clone(),
        }
        .into());
    };

    Ok((field.name.clone(), *kind))
}

fn find_field<'a>(fields: &'a [Field], name: &str) -> Option<&'a Field> {
    fields.iter().find(|f| f.name == name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::ir::{File, FileSet, Message, Method, Service, SourceKind};
    use std::path::PathBuf;

    /// Batch-get shaped service:
    ///   BatchReq { keys: Keys }   Keys { repeated int64 ids }
    ///   BatchRes { users: repeated User }   User { int64 id; string name }
    /// plus deliberately malformed variants.
    fn fixture(
        key_repeated: bool,
        result_message: bool,
        result_repeated: bool,
        match_repeated: bool,
        match_scalar: bool,
    ) -> FileSet {
        let mut set = FileSet::new();
        let id = set.reserve(PathBuf::from("/b.proto"), SourceKind::Proto);
        let keys = crate::ir::MessageId { file: id, index: 1 };
        let user = crate::ir::MessageId { file: id, index: 3 };
        let request = crate::ir::MessageId { file: id, index: 0 };
        let response = crate::ir::MessageId { file: id, index: 2 };

        let field = |name: &str, ty: TypeRef, repeated: bool| Field {
            name: name.to_string(),
            ty,
            repeated,
            required: false,
            oneof: None,
        };

        let result_ty = if result_message {
            TypeRef::Message(user)
        } else {
            TypeRef::Scalar(ScalarKind::Int64)
        };
        let match_ty = if match_scalar {
            TypeRef::Scalar(ScalarKind::Int64)
        } else {
            TypeRef::Message(keys)
        };

        set.commit(
            id,
            File {
                path: PathBuf::from("/b.proto"),
                kind: SourceKind::Proto,
                package: "b".to_string(),
                messages: vec![
                    Message {
                        name: "BatchReq".to_string(),
                        type_name: "BatchReq".to_string(),
                        fields: vec![field("keys", TypeRef::Message(keys), false)],
                        parent: None,
                    },
                    Message {
                        name: "Keys".to_string(),
                        type_name: "Keys".to_string(),
                        fields: vec![field(
                            "ids",
                            TypeRef::Scalar(ScalarKind::Int64),
                            key_repeated,
                        )],
                        parent: None,
                    },
                    Message {
                        name: "BatchRes".to_string(),
                        type_name: "BatchRes".to_string(),
                        fields: vec![field("users", result_ty, result_repeated)],
                        parent: None,
                    },
                    Message {
                        name: "User".to_string(),
                        type_name: "User".to_string(),
                        fields: vec![
                            field("id", match_ty, match_repeated),
                            field("name", TypeRef::Scalar(ScalarKind::String), false),
                        ],
                        parent: None,
                    },
                ],
                enums: Vec::new(),
                maps: Vec::new(),
                services: vec![Service {
                    name: "Users".to_string(),
                    methods: vec![Method {
                        name: "BatchGetUsers".to_string(),
                        input: request,
                        output: response,
                        http: None,
                    }],
                }],
                imports: Vec::new(),
            },
        );
        set
    }

    fn loader_config() -> LoaderConfig {
        LoaderConfig {
            name: "UserLoader".to_string(),
            service: "Users".to_string(),
            method: "BatchGetUsers".to_string(),
            result: "users".to_string(),
            match_field: "id".to_string(),
            many: false,
            wait_ms: 10,
            max_batch: 100,
        }
    }

    #[test]
    fn test_well_shaped_loader_synthesizes() {
        let set = fixture(true, true, true, false, true);
        let config = Config::default();
        let resolver = Resolver::new(&set, &config);

        let model = synthesize(&resolver, &loader_config()).unwrap();
        assert_eq!(model.request_field, "keys");
        assert_eq!(model.key_field, "ids");
        assert_eq!(model.key_kind, ScalarKind::Int64);
        assert_eq!(model.result_field, "users");
        assert_eq!(model.match_field, "id");
        assert!(!model.many);
        assert!(matches!(model.response, GqlType::Object(_)));
    }

    #[test]
    fn test_non_repeated_key_rejected() {
        let set = fixture(false, true, true, false, true);
        let config = Config::default();
        let resolver = Resolver::new(&set, &config);

        let err = synthesize(&resolver, &loader_config()).unwrap_err();
        assert!(matches!(
            err,
            Error::Config(ConfigError::LoaderKeyNotRepeated { ref field, .. }) if field == "ids"
        ));
    }

    #[test]
    fn test_scalar_result_field_rejected() {
        let set = fixture(true, false, true, false, true);
        let config = Config::default();
        let resolver = Resolver::new(&set, &config);

        let err = synthesize(&resolver, &loader_config()).unwrap_err();
        assert!(matches!(
            err,
            Error::Config(ConfigError::LoaderResultNotMessage { ref field, .. }) if field == "users"
        ));
    }

    #[test]
    fn test_singular_result_field_rejected() {
        let set = fixture(true, true, false, false, true);
        let config = Config::default();
        let resolver = Resolver::new(&set, &config);

        let err = synthesize(&resolver, &loader_config()).unwrap_err();
        assert!(matches!(
            err,
            Error::Config(ConfigError::LoaderResultNotMessage { .. })
        ));
    }

    #[test]
    fn test_repeated_match_field_rejected() {
        let set = fixture(true, true, true, true, true);
        let config = Config::default();
        let resolver = Resolver::new(&set, &config);

        let err = synthesize(&resolver, &loader_config()).unwrap_err();
        assert!(matches!(
            err,
            Error::Config(ConfigError::LoaderMatchRepeated { ref field, .. }) if field == "id"
        ));
    }

    #[test]
    fn test_non_scalar_match_field_rejected() {
        let set = fixture(true, true, true, false, false);
        let config = Config::default();
        let resolver = Resolver::new(&set, &config);

        let err = synthesize(&resolver, &loader_config()).unwrap_err();
        assert!(matches!(
            err,
            Error::Config(ConfigError::LoaderMatchNotScalar { ref field, .. }) if field == "id"
        ));
    }

    #[test]
    fn test_unknown_result_field_rejected() {
        let set = fixture(true, true, true, false, true);
        let config = Config::default();
        let resolver = Resolver::new(&set, &config);

        let mut loader = loader_config();
        loader.result = "entries".to_string();
        let err = synthesize(&resolver, &loader).unwrap_err();
        assert!(matches!(
            err,
            Error::Config(ConfigError::FieldNotFound { ref field, .. }) if field == "entries"
        ));
    }
}

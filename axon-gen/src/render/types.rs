//! Types module emission
//!
//! Renders one `types.rs` per output unit: enums, map pair objects, output
//! objects, and input objects with their conversions to the sibling `pb`
//! transport types.

use heck::{ToSnakeCase, ToUpperCamelCase};
use proc_macro2::TokenStream;
use quote::{format_ident, quote};

use crate::error::Error;
use crate::importer::Importer;
use crate::ir::{EnumId, MapId, MessageId, TypeRef};
use crate::resolve::{
    enum_name, input_name, map_name, object_name, scalar, unit_path, Conversion, GqlType,
    Resolver, TypesFile, ValueSource,
};

use super::{format_tokens, import_lines, type_tokens, RenderedFile};

/// Render the types module for one source file.
pub(super) fn render(
    resolver: &Resolver<'_>,
    types_file: &TypesFile,
    importer: &mut Importer,
) -> Result<RenderedFile, Error> {
    let set = resolver.set();
    let unit = unit_path(set, types_file.file);

    let mut body = TokenStream::new();
    for id in &types_file.enums {
        body.extend(render_enum(resolver, *id));
    }
    for id in &types_file.maps {
        body.extend(render_map_entry(resolver, *id, importer)?);
    }
    for id in &types_file.objects {
        body.extend(render_object(resolver, *id, importer)?);
    }
    for id in &types_file.inputs {
        body.extend(render_input(resolver, *id, importer)?);
    }

    let imports = import_lines(importer);
    let banner = format!("Generated GraphQL types for `{unit}`");
    let code = quote! {
        #![doc = #banner]
        #![allow(missing_docs)]
        #![allow(unused_imports)]
        #![allow(clippy::all)]

        #imports
        #body
    };

    Ok(RenderedFile {
        path: std::path::PathBuf::from(&unit).join("types.rs"),
        content: format_tokens(code),
    })
}

fn render_enum(resolver: &Resolver<'_>, id: EnumId) -> TokenStream {
    let set = resolver.set();
    let def = set.enum_def(id);
    let type_ident = format_ident!("{}", enum_name(set, id));

    let variants: Vec<_> = def
        .values
        .iter()
        .map(|value| format_ident!("{}", value.name.to_upper_camel_case()))
        .collect();
    let numbers: Vec<_> = def.values.iter().map(|value| value.number).collect();
    let first = variants.first().cloned();

    let from_impls = first.map(|fallback| {
        quote! {
            impl From<i32> for #type_ident {
                fn from(value: i32) -> Self {
                    match value {
                        #(#numbers => Self::#variants,)*
                        _ => Self::#fallback,
                    }
                }
            }

            impl From<#type_ident> for i32 {
                fn from(value: #type_ident) -> Self {
                    match value {
                        #(#type_ident::#variants => #numbers,)*
                    }
                }
            }
        }
    });

    quote! {
        #[derive(Clone, Copy, Debug, Eq, PartialEq, async_graphql::Enum)]
        pub enum #type_ident {
            #(#variants,)*
        }

        #from_impls
    }
}

/// GraphQL has no map type; every map field renders as a list of these
/// pair objects, one output and one input flavor.
fn render_map_entry(
    resolver: &Resolver<'_>,
    id: MapId,
    importer: &mut Importer,
) -> Result<TokenStream, Error> {
    let set = resolver.set();
    let map = set.map(id);
    let entry_ident = format_ident!("{}", map_name(set, id));
    let input_ident = format_ident!("{}Input", map_name(set, id));

    let key_ty = type_tokens(scalar::target(map.key).rust);
    let context = format!("map `{}`", map.field_path);
    // An entry that exists always carries a value; both sides are non-null.
    let value_out = GqlType::NonNull(Box::new(resolver.output(&map.value, &context)?));
    let value_in = GqlType::NonNull(Box::new(resolver.input(&map.value, &context)?));
    let value_out_ty = type_tokens(&value_out.rust(set, importer));
    let value_in_ty = type_tokens(&value_in.rust(set, importer));

    Ok(quote! {
        #[derive(Clone, Debug, async_graphql::SimpleObject)]
        pub struct #entry_ident {
            pub key: #key_ty,
            pub value: #value_out_ty,
        }

        #[derive(Clone, Debug, async_graphql::InputObject)]
        pub struct #input_ident {
            pub key: #key_ty,
            pub value: #value_in_ty,
        }
    })
}

fn render_object(
    resolver: &Resolver<'_>,
    id: MessageId,
    importer: &mut Importer,
) -> Result<TokenStream, Error> {
    let set = resolver.set();
    let message = set.message(id);
    let type_ident = format_ident!("{}", object_name(set, id));
    let pb_ident = format_ident!("{}", object_name(set, id));

    let mut fields = TokenStream::new();
    let mut conversions = TokenStream::new();
    for field in resolver.meaningful_fields(id) {
        let name = escape_keyword(&field.name.to_snake_case());
        let context = format!("{}.{}", message.type_name, field.name);
        let resolved = resolver.field_output(field, &context)?;
        let ty = type_tokens(&resolved.rust(set, importer));
        fields.extend(quote! { pub #name: #ty, });
        conversions.extend(from_pb_conversion(resolver, field, &name));
    }

    Ok(quote! {
        #[derive(Clone, Debug, async_graphql::SimpleObject)]
        pub struct #type_ident {
            #fields
        }

        impl From<super::pb::#pb_ident> for #type_ident {
            fn from(value: super::pb::#pb_ident) -> Self {
                Self {
                    #conversions
                }
            }
        }
    })
}

/// Transport-to-GraphQL field conversion; shape follows the field kind the
/// way prost spells it.
fn from_pb_conversion(
    resolver: &Resolver<'_>,
    field: &crate::ir::Field,
    name: &syn::Ident,
) -> TokenStream {
    match (&field.ty, field.repeated) {
        (TypeRef::Scalar(_), _) => quote! { #name: value.#name.into(), },
        (TypeRef::Enum(_), false) => quote! { #name: Some(value.#name.into()), },
        (TypeRef::Enum(_), true) => quote! {
            #name: Some(value.#name.into_iter().map(Into::into).collect()),
        },
        (TypeRef::Message(_), false) => quote! { #name: value.#name.map(Into::into), },
        (TypeRef::Message(_), true) | (TypeRef::Array(_), _) => quote! {
            #name: Some(value.#name.into_iter().map(Into::into).collect()),
        },
        (TypeRef::Map(id), _) => {
            let entry = format_ident!("{}", map_name(resolver.set(), *id));
            quote! {
                #name: Some(
                    value.#name
                        .into_iter()
                        .map(|(key, value)| #entry { key, value: value.into() })
                        .collect(),
                ),
            }
        }
    }
}

fn render_input(
    resolver: &Resolver<'_>,
    id: MessageId,
    importer: &mut Importer,
) -> Result<TokenStream, Error> {
    let set = resolver.set();
    let message = set.message(id);
    let type_ident = format_ident!("{}", input_name(set, id));
    let pb_ident = format_ident!("{}", object_name(set, id));

    let mut fields = TokenStream::new();
    let mut conversions = TokenStream::new();
    for field in &message.fields {
        let name = escape_keyword(&field.name.to_snake_case());
        let expr = resolver.value(id, field);

        // Context-bound fields never surface as GraphQL arguments; the
        // resolver fills them from the call context after conversion.
        if matches!(expr.source, ValueSource::Context(_)) {
            conversions.extend(quote! { #name: Default::default(), });
            continue;
        }

        let context = format!("{}.{}", message.type_name, field.name);
        let resolved = resolver.field_input(field, &context)?;
        let ty = type_tokens(&resolved.rust(set, importer));
        fields.extend(quote! { pub #name: #ty, });
        conversions.extend(to_pb_conversion(
            expr.conversion.as_ref(),
            field,
            &name,
        ));
    }

    Ok(quote! {
        #[derive(Clone, Debug, Default, async_graphql::InputObject)]
        pub struct #type_ident {
            #fields
        }

        impl From<#type_ident> for super::pb::#pb_ident {
            fn from(input: #type_ident) -> Self {
                Self {
                    #conversions
                }
            }
        }
    })
}

/// GraphQL-to-transport conversion for one input field, driven by the
/// resolved value expression. Scalar coercions move straight across;
/// enum/message/map conversions go through the generated `From` impls.
fn to_pb_conversion(
    conversion: Option<&Conversion>,
    field: &crate::ir::Field,
    name: &syn::Ident,
) -> TokenStream {
    let Some(conversion) = conversion else {
        return quote! { #name: Default::default(), };
    };

    let base = match conversion {
        Conversion::List(inner) => inner.as_ref(),
        other => other,
    };

    match base {
        Conversion::Scalar(_) => {
            if field.repeated {
                quote! { #name: input.#name.unwrap_or_default().into_iter().flatten().collect(), }
            } else {
                quote! { #name: input.#name.unwrap_or_default(), }
            }
        }
        Conversion::Enum(_) => {
            if field.repeated {
                quote! {
                    #name: input.#name
                        .unwrap_or_default()
                        .into_iter()
                        .flatten()
                        .map(i32::from)
                        .collect(),
                }
            } else {
                quote! { #name: input.#name.map(i32::from).unwrap_or_default(), }
            }
        }
        Conversion::Message(_) => {
            if field.repeated {
                quote! {
                    #name: input.#name
                        .unwrap_or_default()
                        .into_iter()
                        .flatten()
                        .map(Into::into)
                        .collect(),
                }
            } else {
                quote! { #name: input.#name.map(Into::into), }
            }
        }
        Conversion::Map(_) => quote! {
            #name: input.#name
                .unwrap_or_default()
                .into_iter()
                .map(|entry| (entry.key, entry.value.into()))
                .collect(),
        },
        Conversion::List(_) => quote! {
            #name: input.#name.unwrap_or_default().into_iter().flatten().collect(),
        },
    }
}

/// Escape Rust keywords by prefixing with `r#`.
pub(super) fn escape_keyword(name: &str) -> syn::Ident {
    const KEYWORDS: &[&str] = &[
        "as", "break", "const", "continue", "crate", "else", "enum", "extern", "false", "fn",
        "for", "if", "impl", "in", "let", "loop", "match", "mod", "move", "mut", "pub", "ref",
        "return", "static", "struct", "super", "trait", "true", "type", "unsafe", "use",
        "where", "while", "async", "await", "dyn", "abstract", "become", "box", "do", "final",
        "macro", "override", "priv", "typeof", "unsized", "virtual", "yield", "try",
    ];
    if KEYWORDS.contains(&name) {
        format_ident!("r#{}", name)
    } else {
        format_ident!("{}", name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::ir::{
        EnumDef, EnumValue, Field, File, FileSet, Map, Message, Method, ScalarKind, Service,
        SourceKind,
    };
    use std::path::PathBuf;

    fn fixture() -> (FileSet, crate::ir::FileId) {
        let mut set = FileSet::new();
        let id = set.reserve(PathBuf::from("/p.proto"), SourceKind::Proto);
        let user = crate::ir::MessageId { file: id, index: 0 };
        let req = crate::ir::MessageId { file: id, index: 1 };
        let status = crate::ir::EnumId { file: id, index: 0 };
        let labels = crate::ir::MapId { file: id, index: 0 };

        set.commit(
            id,
            File {
                path: PathBuf::from("/p.proto"),
                kind: SourceKind::Proto,
                package: "pets".to_string(),
                messages: vec![
                    Message {
                        name: "User".to_string(),
                        type_name: "User".to_string(),
                        fields: vec![
                            Field {
                                name: "name".to_string(),
                                ty: TypeRef::Scalar(ScalarKind::String),
                                repeated: false,
                                required: true,
                                oneof: None,
                            },
                            Field {
                                name: "status".to_string(),
                                ty: TypeRef::Enum(status),
                                repeated: false,
                                required: false,
                                oneof: None,
                            },
                            Field {
                                name: "labels".to_string(),
                                ty: TypeRef::Map(labels),
                                repeated: false,
                                required: false,
                                oneof: None,
                            },
                        ],
                        parent: None,
                    },
                    Message {
                        name: "GetUserRequest".to_string(),
                        type_name: "GetUserRequest".to_string(),
                        fields: vec![Field {
                            name: "type".to_string(),
                            ty: TypeRef::Scalar(ScalarKind::String),
                            repeated: false,
                            required: false,
                            oneof: None,
                        }],
                        parent: None,
                    },
                ],
                enums: vec![EnumDef {
                    name: "Status".to_string(),
                    type_name: "Status".to_string(),
                    values: vec![
                        EnumValue {
                            name: "STATUS_UNKNOWN".to_string(),
                            number: 0,
                        },
                        EnumValue {
                            name: "STATUS_ACTIVE".to_string(),
                            number: 1,
                        },
                    ],
                }],
                maps: vec![Map {
                    key: ScalarKind::String,
                    value: TypeRef::Scalar(ScalarKind::String),
                    field_path: "User.labels".to_string(),
                }],
                services: vec![Service {
                    name: "Users".to_string(),
                    methods: vec![Method {
                        name: "GetUser".to_string(),
                        input: req,
                        output: user,
                        http: None,
                    }],
                }],
                imports: Vec::new(),
            },
        );
        (set, id)
    }

    #[test]
    fn test_rendered_types_module() {
        let (set, id) = fixture();
        let config = Config::default();
        let resolver = Resolver::new(&set, &config);
        let types_file = TypesFile::build(&resolver, id).unwrap();
        let mut importer = Importer::new("pets");

        let rendered = render(&resolver, &types_file, &mut importer).unwrap();
        assert_eq!(rendered.path, PathBuf::from("pets/types.rs"));
        let code = &rendered.content;

        assert!(code.contains("pub enum Status"));
        assert!(code.contains("StatusActive"));
        assert!(code.contains("pub struct User"));
        assert!(code.contains("pub struct UserLabelsEntry"));
        assert!(code.contains("pub struct GetUserRequestInput"));
        assert!(code.contains("impl From<super::pb::User> for User"));
        // Keyword field names are escaped.
        assert!(code.contains("r#type"));
    }

    #[test]
    fn test_required_field_renders_bare_type() {
        let (set, id) = fixture();
        let config = Config::default();
        let resolver = Resolver::new(&set, &config);
        let types_file = TypesFile::build(&resolver, id).unwrap();
        let mut importer = Importer::new("pets");

        let rendered = render(&resolver, &types_file, &mut importer).unwrap();
        assert!(rendered.content.contains("pub name: String"));
        assert!(rendered.content.contains("pub status: Option<Status>"));
    }
}

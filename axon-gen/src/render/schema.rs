//! Schema module emission
//!
//! Renders one `schema.rs` per composed schema: the Query/Mutation roots,
//! nested aggregate objects, resolver methods that drive the bound service
//! clients through the interceptor chain, and the schema builder taking one
//! client per deduplicated service binding.

use heck::{ToSnakeCase, ToUpperCamelCase};
use proc_macro2::TokenStream;
use quote::{format_ident, quote};

use crate::compose::{BoundMethod, ComposedSchema, FieldNode, ObjectNode};
use crate::error::Error;
use crate::importer::Importer;
use crate::ir::TypeRef;
use crate::resolve::{object_name, unit_path, GqlType, Resolver};

use super::{format_tokens, import_lines, type_tokens, RenderedFile};

/// Render one composed schema.
pub(super) fn render(
    resolver: &Resolver<'_>,
    composed: &ComposedSchema,
    importer: &mut Importer,
) -> Result<RenderedFile, Error> {
    let mut body = TokenStream::new();

    match &composed.query {
        Some(root) => render_object_node(resolver, root, importer, &mut body)?,
        None => body.extend(quote! {
            #[derive(Default)]
            pub struct Query;

            #[async_graphql::Object]
            impl Query {
                async fn health(&self) -> bool {
                    true
                }
            }
        }),
    }
    if let Some(root) = &composed.mutation {
        render_object_node(resolver, root, importer, &mut body)?;
    }

    body.extend(render_builder(resolver, composed, importer));

    let imports = import_lines(importer);
    let banner = format!("Generated GraphQL schema `{}`", composed.name);
    let code = quote! {
        #![doc = #banner]
        #![allow(missing_docs)]
        #![allow(unused_imports)]
        #![allow(unused_mut)]
        #![allow(clippy::all)]

        #imports
        #body
    };

    Ok(RenderedFile {
        path: std::path::PathBuf::from(&composed.name).join("schema.rs"),
        content: format_tokens(code),
    })
}

/// Emit a composed object struct and its resolver impl, recursing into
/// nested aggregates.
fn render_object_node(
    resolver: &Resolver<'_>,
    node: &ObjectNode,
    importer: &mut Importer,
    out: &mut TokenStream,
) -> Result<(), Error> {
    let type_ident = format_ident!("{}", node.name.to_upper_camel_case());

    let mut methods = TokenStream::new();
    for field in &node.fields {
        match field {
            FieldNode::Method(bound) => {
                methods.extend(render_method(resolver, bound, importer)?);
            }
            FieldNode::Object(child) => {
                render_object_node(resolver, child, importer, out)?;
                let field_ident = format_ident!("{}", child.name.to_snake_case());
                let child_ident = format_ident!("{}", child.name.to_upper_camel_case());
                methods.extend(quote! {
                    async fn #field_ident(&self) -> #child_ident {
                        #child_ident
                    }
                });
            }
        }
    }

    out.extend(quote! {
        #[derive(Default, Clone, Copy)]
        pub struct #type_ident;

        #[async_graphql::Object]
        impl #type_ident {
            #methods
        }
    });
    Ok(())
}

/// One resolver method: resolve arguments into the transport request, run
/// the outbound call through the interceptor chain, convert the response.
fn render_method(
    resolver: &Resolver<'_>,
    bound: &BoundMethod,
    importer: &mut Importer,
) -> Result<TokenStream, Error> {
    let set = resolver.set();
    let service = set.service(bound.service);
    let method = &service.methods[bound.method_index];
    let context = format!("{}.{}", service.name, method.name);

    let field_ident = format_ident!("{}", bound.field_name.to_snake_case());
    let service_name = service.name.clone();
    let method_name = method.name.clone();
    let call_method = format_ident!("{}", method.name.to_snake_case());

    let unit = unit_path(set, bound.service.file());
    let request_pb = pb_type(importer, &unit, &object_name(set, method.input));
    let response_pb = pb_type(importer, &unit, &object_name(set, method.output));
    let client_ty = client_type(importer, &unit, &service_name);

    // Argument: the request input object, unless it collapses to NoData.
    let input_desc = resolver.input(&TypeRef::Message(method.input), &context)?;
    let input_arg = if input_desc == GqlType::NoData {
        None
    } else {
        let ty = GqlType::NonNull(Box::new(input_desc)).rust(set, importer);
        Some(type_tokens(&ty))
    };

    let request_init = if input_arg.is_some() {
        quote! { let mut request: #request_pb = input.into(); }
    } else {
        quote! { let mut request = #request_pb::default(); }
    };

    // Context-bound fields bypass GraphQL arguments entirely.
    let mut context_fills = TokenStream::new();
    for field in &set.message(method.input).fields {
        if let Some(key) = resolver
            .config()
            .context_key(set, method.input, &field.name)
        {
            let member = super::types::escape_keyword(&field.name.to_snake_case());
            context_fills.extend(quote! {
                request.#member = serde_json::from_value(
                    call.require_value(#key)
                        .map_err(|e| async_graphql::Error::new(e.to_string()))?
                        .clone(),
                )
                .map_err(|e| async_graphql::Error::new(e.to_string()))?;
            });
        }
    }

    let output_desc = resolver.output(&TypeRef::Message(method.output), &context)?;
    let no_data = output_desc == GqlType::NoData;
    let return_ty = type_tokens(
        &GqlType::NonNull(Box::new(output_desc)).rust(set, importer),
    );
    let finish = if no_data {
        quote! {
            let _ = value;
            Ok(#return_ty)
        }
    } else {
        quote! {
            let response: #response_pb = serde_json::from_value(value)
                .map_err(|e| async_graphql::Error::new(e.to_string()))?;
            Ok(response.into())
        }
    };

    let doc = match &method.http {
        Some(route) => format!(
            "Calls `{} {}` via {}.",
            route.verb.as_str().to_uppercase(),
            route.path,
            service_name
        ),
        None => format!("Calls `{service_name}::{method_name}`."),
    };

    let signature = match &input_arg {
        Some(ty) => quote! {
            async fn #field_ident(
                &self,
                ctx: &async_graphql::Context<'_>,
                input: #ty,
            ) -> async_graphql::Result<#return_ty>
        },
        None => quote! {
            async fn #field_ident(
                &self,
                ctx: &async_graphql::Context<'_>,
            ) -> async_graphql::Result<#return_ty>
        },
    };

    Ok(quote! {
        #[doc = #doc]
        #signature {
            let chain = ctx.data_unchecked::<axon_runtime::Chain>().clone();
            let call = axon_runtime::CallContext::new(#service_name, #method_name);
            #request_init
            #context_fills
            let client = ctx.data_unchecked::<#client_ty>().clone();
            let value = chain
                .run(
                    axon_runtime::Stage::Execute,
                    &call,
                    Box::new(move |_call| {
                        let mut client = client.clone();
                        Box::pin(async move {
                            let response = client
                                .#call_method(request)
                                .await
                                .map_err(|e| axon_runtime::Error::Call(e.to_string()))?;
                            serde_json::to_value(response.into_inner())
                                .map_err(|e| axon_runtime::Error::Call(e.to_string()))
                        })
                    }),
                )
                .await
                .map_err(|e| async_graphql::Error::new(e.to_string()))?;
            #finish
        }
    })
}

/// Schema type alias and builder: one client parameter per deduplicated
/// service binding, plus the interceptor chain.
fn render_builder(
    resolver: &Resolver<'_>,
    composed: &ComposedSchema,
    importer: &mut Importer,
) -> TokenStream {
    let set = resolver.set();
    let schema_ident = format_ident!("{}Schema", composed.name.to_upper_camel_case());

    let query_ident = match &composed.query {
        Some(root) => format_ident!("{}", root.name.to_upper_camel_case()),
        None => format_ident!("Query"),
    };
    let mutation_ty = match &composed.mutation {
        Some(root) => {
            let ident = format_ident!("{}", root.name.to_upper_camel_case());
            quote! { #ident }
        }
        None => quote! { async_graphql::EmptyMutation },
    };
    let mutation_value = match &composed.mutation {
        Some(root) => {
            let ident = format_ident!("{}", root.name.to_upper_camel_case());
            quote! { #ident::default() }
        }
        None => quote! { async_graphql::EmptyMutation },
    };

    let mut params = Vec::new();
    let mut data = Vec::new();
    for binding in &composed.services {
        let unit = unit_path(set, binding.id.file());
        let client_ty = client_type(importer, &unit, &binding.name);
        let param = format_ident!("{}_client", binding.name.to_snake_case());
        params.push(quote! { #param: #client_ty });
        data.push(quote! { .data(#param) });
    }

    quote! {
        pub type #schema_ident =
            async_graphql::Schema<#query_ident, #mutation_ty, async_graphql::EmptySubscription>;

        pub fn build_schema(
            chain: axon_runtime::Chain,
            #(#params),*
        ) -> #schema_ident {
            async_graphql::Schema::build(
                #query_ident::default(),
                #mutation_value,
                async_graphql::EmptySubscription,
            )
            .data(chain)
            #(#data)*
            .finish()
        }
    }
}

/// `{alias}::pb::{name}` for a transport type in another unit.
fn pb_type(importer: &mut Importer, unit: &str, name: &str) -> TokenStream {
    type_tokens(&format!("{}pb::{name}", importer.prefix(unit)))
}

/// Tonic client type for a service.
fn client_type(importer: &mut Importer, unit: &str, service: &str) -> TokenStream {
    type_tokens(&format!(
        "{}pb::{}_client::{}Client<tonic::transport::Channel>",
        importer.prefix(unit),
        service.to_snake_case(),
        service.to_upper_camel_case(),
    ))
}

//! Dataloader emission
//!
//! Renders one `loaders.rs` per package that owns synthesized loaders.
//! Each loader batches keys through the validated service method and zips
//! the response back to key order with `axon_runtime::loader`.

use heck::{ToSnakeCase, ToUpperCamelCase};
use proc_macro2::TokenStream;
use quote::{format_ident, quote};

use crate::error::Error;
use crate::importer::Importer;
use crate::loader::LoaderModel;
use crate::resolve::{object_name, scalar, unit_path, GqlType, Resolver};

use super::{format_tokens, import_lines, type_tokens, RenderedFile};

/// Render the loaders module for one output unit.
pub(super) fn render(
    resolver: &Resolver<'_>,
    unit: &str,
    loaders: &[&LoaderModel],
    importer: &mut Importer,
) -> Result<RenderedFile, Error> {
    let mut body = TokenStream::new();
    for model in loaders {
        body.extend(render_loader(resolver, model, importer)?);
    }

    let imports = import_lines(importer);
    let banner = format!("Generated dataloaders for `{unit}`");
    let code = quote! {
        #![doc = #banner]
        #![allow(missing_docs)]
        #![allow(unused_imports)]
        #![allow(clippy::all)]

        use async_graphql::dataloader::Loader;
        use std::collections::HashMap;

        #imports
        #body
    };

    Ok(RenderedFile {
        path: std::path::PathBuf::from(unit).join("loaders.rs"),
        content: format_tokens(code),
    })
}

fn render_loader(
    resolver: &Resolver<'_>,
    model: &LoaderModel,
    importer: &mut Importer,
) -> Result<TokenStream, Error> {
    let set = resolver.set();
    let service = set.service(model.service);
    let method = &service.methods[model.method_index];
    let unit = unit_path(set, model.service.file());

    let loader_ident = format_ident!("{}", model.name.to_upper_camel_case());
    let key_ty = type_tokens(scalar::target(model.key_kind).rust);
    let call_method = format_ident!("{}", method.name.to_snake_case());
    let request_field = format_ident!("{}", model.request_field.to_snake_case());
    let key_field = format_ident!("{}", model.key_field.to_snake_case());
    let result_field = format_ident!("{}", model.result_field.to_snake_case());
    let match_field = format_ident!("{}", model.match_field.to_snake_case());

    let prefix = importer.prefix(&unit);
    let request_ty = type_tokens(&format!("{prefix}pb::{}", object_name(set, method.input)));
    let keys_ty = type_tokens(&format!(
        "{prefix}pb::{}",
        object_name(
            set,
            match &set.message(method.input).fields[0].ty {
                crate::ir::TypeRef::Message(id) => *id,
                _ => unreachable!("validated at synthesis time"),
            }
        )
    ));
    let client_ty = type_tokens(&format!(
        "{prefix}pb::{}_client::{}Client<tonic::transport::Channel>",
        service.name.to_snake_case(),
        service.name.to_upper_camel_case(),
    ));

    // Entry type on the GraphQL side, through the same descriptor the
    // resolver produced at synthesis time.
    let entry_ty = type_tokens(
        &GqlType::NonNull(Box::new(model.response.clone())).rust(set, importer),
    );

    let wait_ms = model.wait_ms;
    let max_batch = model.max_batch;

    let (value_ty, collect, zip) = if model.many {
        (
            quote! { Vec<#entry_ty> },
            quote! {
                let aligned = axon_runtime::loader::collect_many(keys, &items, |item| item.#match_field.clone());
            },
            quote! {
                let map: HashMap<#key_ty, Self::Value> = keys
                    .iter()
                    .cloned()
                    .zip(aligned)
                    .map(|(key, group)| (key, group.into_iter().map(Into::into).collect()))
                    .collect();
            },
        )
    } else {
        (
            quote! { #entry_ty },
            quote! {
                let aligned = axon_runtime::loader::collect_one(keys, &items, |item| item.#match_field.clone());
            },
            quote! {
                let map: HashMap<#key_ty, Self::Value> = keys
                    .iter()
                    .cloned()
                    .zip(aligned)
                    .filter_map(|(key, entry)| entry.map(|entry| (key, entry.into())))
                    .collect();
            },
        )
    };

    Ok(quote! {
        pub struct #loader_ident {
            client: #client_ty,
        }

        impl #loader_ident {
            pub fn new(client: #client_ty) -> Self {
                Self { client }
            }

            pub fn batch_window() -> axon_runtime::BatchWindow {
                axon_runtime::BatchWindow {
                    wait: std::time::Duration::from_millis(#wait_ms),
                    max_batch: #max_batch,
                }
            }
        }

        impl Loader<#key_ty> for #loader_ident {
            type Value = #value_ty;
            type Error = async_graphql::Error;

            async fn load(
                &self,
                keys: &[#key_ty],
            ) -> Result<HashMap<#key_ty, Self::Value>, Self::Error> {
                let request = #request_ty {
                    #request_field: Some(#keys_ty {
                        #key_field: keys.to_vec(),
                    }),
                };

                let response = self
                    .client
                    .clone()
                    .#call_method(request)
                    .await
                    .map_err(|e| async_graphql::Error::new(e.to_string()))?;
                let items = response.into_inner().#result_field;

                #collect
                #zip
                Ok(map)
            }
        }
    })
}

//! Code emission
//!
//! Thin emitters over the resolved descriptors: each consumes phase-1
//! output (a [`TypesFile`], a composed schema, loader models) plus a fresh
//! per-unit [`Importer`] and renders formatted Rust source. Generated files
//! assume a sibling `pb` module per package holding the tonic-generated
//! transport types.

mod loaders;
mod schema;
mod types;

use std::path::PathBuf;

use proc_macro2::TokenStream;

use crate::compose::ComposedSchema;
use crate::error::Error;
use crate::importer::Importer;
use crate::loader::LoaderModel;
use crate::resolve::{Resolver, TypesFile};

/// One generated file, path relative to the output root.
#[derive(Debug)]
pub struct RenderedFile {
    /// Output-root-relative path.
    pub path: PathBuf,
    /// Formatted source text.
    pub content: String,
}

/// Render every output unit: one types module per source file, one schema
/// module per composed schema, one loaders module per package that owns a
/// loader, plus the `mod.rs` spine tying the tree together.
pub fn render_all(
    resolver: &Resolver<'_>,
    types_files: &[TypesFile],
    schemas: &[ComposedSchema],
    loaders: &[LoaderModel],
) -> Result<Vec<RenderedFile>, Error> {
    let mut files = Vec::new();
    let mut units: Vec<String> = Vec::new();

    for types_file in types_files {
        let unit = crate::resolve::unit_path(resolver.set(), types_file.file);
        let mut importer = Importer::new(&unit);
        files.push(types::render(resolver, types_file, &mut importer)?);
        if !units.contains(&unit) {
            units.push(unit.clone());
        }

        let unit_loaders: Vec<&LoaderModel> = loaders
            .iter()
            .filter(|l| crate::resolve::unit_path(resolver.set(), l.service.file()) == unit)
            .collect();
        if !unit_loaders.is_empty() {
            let mut importer = Importer::new(&unit);
            files.push(loaders::render(resolver, &unit, &unit_loaders, &mut importer)?);
        }
    }

    // Loaders owned by a unit that contributed no types still get emitted.
    for model in loaders {
        let unit = crate::resolve::unit_path(resolver.set(), model.service.file());
        if units.contains(&unit) {
            continue;
        }
        let unit_loaders: Vec<&LoaderModel> = loaders
            .iter()
            .filter(|l| crate::resolve::unit_path(resolver.set(), l.service.file()) == unit)
            .collect();
        let mut importer = Importer::new(&unit);
        files.push(loaders::render(resolver, &unit, &unit_loaders, &mut importer)?);
        units.push(unit);
    }

    for composed in schemas {
        let mut importer = Importer::new(&composed.name);
        files.push(schema::render(resolver, composed, &mut importer)?);
        if !units.contains(&composed.name) {
            units.push(composed.name.clone());
        }
    }

    files.extend(spine(&units, types_files, schemas, loaders, resolver));
    Ok(files)
}

/// `mod.rs` files for the generated tree.
fn spine(
    units: &[String],
    types_files: &[TypesFile],
    schemas: &[ComposedSchema],
    loaders: &[LoaderModel],
    resolver: &Resolver<'_>,
) -> Vec<RenderedFile> {
    let mut files = Vec::new();

    let root: String = units
        .iter()
        .map(|unit| format!("pub mod {unit};\n"))
        .collect();
    files.push(RenderedFile {
        path: PathBuf::from("mod.rs"),
        content: format!("//! Generated module tree\n//! @generated\n\n{root}"),
    });

    for unit in units {
        let mut decls = Vec::new();
        if types_files
            .iter()
            .any(|t| crate::resolve::unit_path(resolver.set(), t.file) == *unit)
        {
            decls.push("pub mod types;");
        }
        if loaders
            .iter()
            .any(|l| crate::resolve::unit_path(resolver.set(), l.service.file()) == *unit)
        {
            decls.push("pub mod loaders;");
        }
        if schemas.iter().any(|s| s.name == *unit) {
            decls.push("pub mod schema;");
        }
        files.push(RenderedFile {
            path: PathBuf::from(unit).join("mod.rs"),
            content: format!("//! @generated\n\n{}\n", decls.join("\n")),
        });
    }

    files
}

/// Teacher-style formatting: pretty-print when the emitted stream parses,
/// fall back to the raw token text when it does not.
pub(super) fn format_tokens(tokens: TokenStream) -> String {
    let content = tokens.to_string();
    match syn::parse_file(&content) {
        Ok(parsed) => prettyplease::unparse(&parsed),
        Err(_) => content,
    }
}

/// Parse a rendered type string into tokens for quoting.
pub(super) fn type_tokens(rendered: &str) -> TokenStream {
    syn::parse_str::<syn::Type>(rendered)
        .map(|ty| quote::quote! { #ty })
        .unwrap_or_else(|_| rendered.parse().unwrap_or_default())
}

/// `use` lines for a unit's importer bindings. Absolute paths (containing
/// `::`) import as-is; bare unit names import the sibling package module,
/// through which rendered types refer to `{alias}::types::...`.
pub(super) fn import_lines(importer: &Importer) -> TokenStream {
    let mut out = TokenStream::new();
    for binding in importer.bindings() {
        let alias = quote::format_ident!("{}", binding.alias);
        if binding.path.contains("::") {
            let path: TokenStream = binding.path.parse().unwrap_or_default();
            out.extend(quote::quote! { use #path as #alias; });
        } else {
            let unit = quote::format_ident!("{}", binding.path);
            out.extend(quote::quote! { use super::super::#unit as #alias; });
        }
    }
    out
}

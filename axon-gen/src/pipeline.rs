//! Whole-pipeline driver
//!
//! One pass, no partial output: parse every source schema, build the
//! per-file type aggregates, compose the configured schemas (merging
//! imported fragments first), synthesize dataloaders, render. Files are
//! accumulated in memory and only written once everything succeeded.

use std::path::Path;

use crate::compose;
use crate::config::Config;
use crate::error::{ConfigError, Error};
use crate::ir::{FileId, FileSet};
use crate::loader;
use crate::proto;
use crate::render::{self, RenderedFile};
use crate::resolve::{Resolver, TypesFile};
use crate::swagger;

/// Run the full compilation for one configuration.
pub fn compile(config: &Config) -> Result<Vec<RenderedFile>, Error> {
    let mut set = FileSet::new();
    let mut roots: Vec<FileId> = Vec::new();

    for source in &config.sources {
        tracing::info!(source = %source.display(), "parsing source schema");
        let id = parse_source(source, config, &mut set)?;
        if !roots.contains(&id) {
            roots.push(id);
        }
    }

    let resolver = Resolver::new(&set, config);

    let mut aggregates = Vec::with_capacity(roots.len());
    for &root in &roots {
        aggregates.push(TypesFile::build(&resolver, root)?);
    }
    // Types discovered across file boundaries are emitted in the unit of
    // the file that owns them.
    let types_files = TypesFile::partition_by_owner(aggregates);

    let mut schemas = Vec::with_capacity(config.schemas.len());
    for schema_config in &config.schemas {
        let mut merged = schema_config.clone();
        for import in &schema_config.imports {
            let fragment_file = Config::load(import)?;
            if let Some(fragment) = fragment_file
                .schemas
                .iter()
                .find(|candidate| candidate.name == merged.name)
            {
                compose::merge_schema(&mut merged, fragment)?;
            }
        }
        tracing::info!(schema = %merged.name, "composing schema");
        schemas.push(compose::compose(&resolver, &merged)?);
    }

    let mut loaders = Vec::with_capacity(config.loaders.len());
    for loader_config in &config.loaders {
        tracing::info!(loader = %loader_config.name, "synthesizing dataloader");
        loaders.push(loader::synthesize(&resolver, loader_config)?);
    }

    render::render_all(&resolver, &types_files, &schemas, &loaders)
}

/// Write rendered files under the output root.
pub fn write_output(files: &[RenderedFile], out_dir: &Path) -> Result<(), Error> {
    for file in files {
        let target = out_dir.join(&file.path);
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent).map_err(|source| Error::Write {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        std::fs::write(&target, &file.content).map_err(|source| Error::Write {
            path: target.clone(),
            source,
        })?;
        tracing::debug!(path = %target.display(), "wrote generated file");
    }
    Ok(())
}

/// Front-end dispatch by extension.
fn parse_source(source: &Path, config: &Config, set: &mut FileSet) -> Result<FileId, Error> {
    let ext = source
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();
    match ext.as_str() {
        "proto" => Ok(proto::parse(
            source,
            &config.import_aliases,
            &config.search_paths,
            set,
        )?),
        "json" | "yaml" | "yml" => Ok(swagger::parse(
            source,
            &config.import_aliases,
            &config.search_paths,
            set,
        )?),
        other => Err(ConfigError::Invalid(format!(
            "source `{}` has unsupported extension `{other}`",
            source.display()
        ))
        .into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::path::PathBuf;

    fn write_file(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(content.as_bytes()).unwrap();
        path
    }

    const PROTO: &str = r#"
        syntax = "proto3";
        package users;

        message GetUserRequest { int64 id = 1; }
        message User {
            int64 id = 1;
            string name = 2;
        }

        service UserService {
            rpc GetUser (GetUserRequest) returns (User);
        }
    "#;

    fn config_yaml(dir: &Path) -> String {
        format!(
            r#"
            search_paths: ["{0}"]
            sources: ["{0}/users.proto"]
            schemas:
              - name: gateway
                queries:
                  kind: service
                  service: UserService
            "#,
            dir.display()
        )
    }

    #[test]
    fn test_end_to_end_compile() {
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), "users.proto", PROTO);
        let config_path = write_file(dir.path(), "axon.yaml", &config_yaml(dir.path()));

        let config = Config::load(&config_path).unwrap();
        let files = compile(&config).unwrap();

        let paths: Vec<String> = files
            .iter()
            .map(|f| f.path.display().to_string())
            .collect();
        assert!(paths.contains(&"users/types.rs".to_string()));
        assert!(paths.contains(&"gateway/schema.rs".to_string()));
        assert!(paths.contains(&"mod.rs".to_string()));
        assert!(paths.contains(&"users/mod.rs".to_string()));
        assert!(paths.contains(&"gateway/mod.rs".to_string()));

        let schema = files
            .iter()
            .find(|f| f.path == Path::new("gateway/schema.rs"))
            .unwrap();
        assert!(schema.content.contains("async fn get_user"));
    }

    #[test]
    fn test_write_output_creates_tree() {
        let dir = tempfile::tempdir().unwrap();
        let files = vec![RenderedFile {
            path: PathBuf::from("users/types.rs"),
            content: "// generated\n".to_string(),
        }];
        write_output(&files, &dir.path().join("gen")).unwrap();
        assert!(dir.path().join("gen/users/types.rs").is_file());
    }

    #[test]
    fn test_unsupported_extension_rejected() {
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), "schema.xml", "<xml/>");
        let mut config = Config::default();
        config.sources = vec![dir.path().join("schema.xml")];
        let err = compile(&config).unwrap_err();
        assert!(matches!(err, Error::Config(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_broken_source_aborts_whole_pipeline() {
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), "bad.proto", "message Broken {");
        let mut config = Config::default();
        config.sources = vec![dir.path().join("bad.proto")];
        config.search_paths = vec![dir.path().to_path_buf()];
        assert!(compile(&config).is_err());
    }
}

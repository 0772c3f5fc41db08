//! axon-gen: compile gRPC/OpenAPI service schemas into a GraphQL gateway
//!
//! Reads a YAML generation config naming the source schemas (`.proto`,
//! swagger JSON/YAML), the message/method options, the dataloaders to
//! synthesize, and the Query/Mutation composition tree, then emits the
//! Rust modules bridging the services into one GraphQL schema.
//!
//! Usage:
//!   axon-gen --config axon.yaml --out src/gen

use clap::Parser;
use std::path::PathBuf;

mod compose;
mod config;
mod error;
mod importer;
mod ir;
mod loader;
mod pipeline;
mod proto;
mod render;
mod resolve;
mod swagger;

pub use error::Error;

#[derive(Parser, Debug)]
#[command(name = "axon-gen")]
#[command(about = "Compile service schemas into a GraphQL gateway")]
struct Args {
    /// Generation config file
    #[arg(short, long, default_value = "axon.yaml")]
    config: PathBuf,

    /// Output directory for generated modules
    #[arg(short, long, default_value = "gen")]
    out: PathBuf,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = config::Config::load(&args.config)?;

    let files = pipeline::compile(&config)?;
    pipeline::write_output(&files, &args.out)?;

    eprintln!(
        "Generated {} files into {}",
        files.len(),
        args.out.display()
    );

    Ok(())
}

use std::path::PathBuf;
use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;
use corpus_embeddings::{Pipeline, PipelineConfig};

// loads the corpus described by the json config, trains the vectors and prints the probe queries.
// the log level is read from RUST_LOG, info for this crate otherwise

#[derive(Parser, Debug)]
#[command(version, about = "Train word vectors over a directory of text files")]
struct Cli {
    /// path to the json configuration
    config: PathBuf,
}

fn main() -> anyhow::Result<()> {

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("corpus_embeddings=info")))
        .init();

    let cli = Cli::parse();
    let params = PipelineConfig::from_file(&cli.config)
        .with_context(|| format!("could not read config {}", cli.config.display()))?;

    Pipeline::run(&params).context("pipeline failed")?;
    Ok(())
}

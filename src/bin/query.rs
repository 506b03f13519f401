// checks on trained vectors, runnable independently of the training binary:
// the k most similar words to given words, analogies, and raw vectors

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use corpus_embeddings::{DenseEmbeddings, EmbeddingModel, Query};

#[derive(Parser, Debug)]
#[command(version, about = "Query word vectors saved by corpus_embeddings")]
struct Cli {
    /// number of results per query
    #[arg(short, long, default_value_t = 10)]
    k: usize,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// most similar words, one token per line of the input file
    Similar { tokens: PathBuf, model_dir: String },
    /// analogies, each line holds a quartet "a b c target" read as a is to b as c is to target
    Analogies { quads: PathBuf, model_dir: String },
    /// prints the vector of one token
    Vector { token: String, model_dir: String },
}

fn read_lines(path: &Path) -> anyhow::Result<Vec<String>> {
    let file = File::open(path).with_context(|| format!("could not open {}", path.display()))?;
    let lines = BufReader::new(file)
        .lines()
        .collect::<Result<Vec<String>, _>>()?
        .into_iter()
        .map(|l| l.trim().to_string())
        .filter(|l| !l.is_empty())
        .collect();
    Ok(lines)
}

fn load(model_dir: &str) -> anyhow::Result<DenseEmbeddings> {
    if !DenseEmbeddings::exists(model_dir) {
        bail!("no saved vectors in '{}'", model_dir);
    }
    Ok(DenseEmbeddings::load(model_dir)?)
}

fn run_similarity(tokens: &[String], k: usize, model: &DenseEmbeddings) {

    for token in tokens {
        println!("searching {} most similar words to {}", k, token);
        match model.nearest_neighbors(Query::Token(token.as_str()), k) {
            Ok(similarities) => {
                for (i, n) in similarities.iter().enumerate() {
                    println!("{} : {} ? {} = {}", i, token, n.token, n.score);
                }
            },
            Err(e) => println!("{}", e),
        }
        println!();
    }
}

fn run_analogies(quads: &[String], k: usize, model: &DenseEmbeddings) -> anyhow::Result<()> {

    // a is to b as c is to ? translates to b - a + c : ?
    for line in quads {

        let input: Vec<&str> = line.split_whitespace().collect();
        let [a, b, c, target] = input[..] else {
            bail!("expected 4 tokens in analogy line '{}'", line);
        };

        let analogies = match model.analogy([a, b, c], k) {
            Ok(analogies) => analogies,
            Err(e) => {
                println!("{}\n", e);
                continue;
            }
        };

        match analogies.iter().position(|n| n.token == target) {
            Some(i) => println!("found target '{}' analogy in place {}", target, i + 1),
            None => println!("target '{}' was not found within the first {} analogies", target, k),
        }
        for (i, n) in analogies.iter().enumerate() {
            println!("{} : {} - {} + {} ? {} = {}", i, b, a, c, n.token, n.score);
        }
        println!();
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("corpus_embeddings=info")))
        .init();

    let cli = Cli::parse();
    match &cli.command {
        Command::Similar { tokens, model_dir } => {
            let model = load(model_dir)?;
            run_similarity(&read_lines(tokens)?, cli.k, &model);
        },
        Command::Analogies { quads, model_dir } => {
            let model = load(model_dir)?;
            run_analogies(&read_lines(quads)?, cli.k, &model)?;
        },
        Command::Vector { token, model_dir } => {
            let model = load(model_dir)?;
            let vec = model.vector_of(token)?;
            println!("{}", vec);
        },
    }
    Ok(())
}

// imports
use crate::config::{files_handling, PipelineConfig};
use crate::cooccurrence::Counts;
use crate::embedding::{EmbeddingModel, EmbeddingTrainer, Neighbor, Query};
use crate::error::{EmbeddingError, Result};
use crate::normalizer::Corpus;
use crate::similarity::{DenseEmbeddings, VOCABULARY_FILE};
use crate::train::{CooccurrenceTrainer, GloveSettings};
use crate::vocabulary::Vocabulary;

use std::time::Instant;

pub struct Pipeline {}

impl Pipeline {

    // runs the main procedure -
    // -> corpus loading and normalisation
    // -> vocabulary and co-occurrences (or cached ones)
    // -> training, saving, and printing the probe queries

    pub fn trainer(params: &PipelineConfig) -> CooccurrenceTrainer {
        let t = &params.training;
        CooccurrenceTrainer::new(GloveSettings {
            learning_rate: t.learning_rate,
            x_max: t.x_max,
            alpha: t.alpha,
            batch_size: t.batch_size,
            num_threads: t.num_threads,
            max_vocab_size: t.max_vocab_size,
            seed: t.seed,
        })
    }

    /// Loads and normalizes the corpus. Empty sentences are kept.
    pub fn prepare(params: &PipelineConfig) -> Result<Corpus> {
        let raw = params.loader()?.load();
        let normalizer = params.normalizer()?;
        Ok(normalizer.normalize(&raw))
    }

    fn train_from_cache(params: &PipelineConfig, output_dir: &str, trainer: &CooccurrenceTrainer) -> Result<DenseEmbeddings> {
        tracing::info!("reusing vocabulary and co-occurrences saved in '{}'", output_dir);
        let vocabulary = files_handling::read_input::<Vocabulary>(&format!("{}/{}", output_dir, VOCABULARY_FILE))?;
        let counts = Counts::load(output_dir, vocabulary.len())?;
        trainer.train_from_counts(counts, &vocabulary, &params.training_params())
    }

    pub fn train(params: &PipelineConfig) -> Result<DenseEmbeddings> {

        let trainer = Pipeline::trainer(params);
        let training = params.training_params();

        if let (Some(output_dir), true) = (&params.output_dir, params.saved_counts) {
            return Pipeline::train_from_cache(params, output_dir, &trainer);
        }

        let timer = Instant::now();
        let corpus = Pipeline::prepare(params)?.without_empty();
        let vocabulary = trainer.build_vocabulary(&corpus, params.training.min_token_frequency);
        tracing::info!("finished corpus and vocabulary, took {} ms", timer.elapsed().as_millis());

        match &params.output_dir {
            Some(output_dir) => {
                let counts = trainer.count(&corpus, &vocabulary, &training)?;
                Counts::save(&counts, output_dir)?;
                files_handling::save_output(output_dir, VOCABULARY_FILE, &vocabulary)?;
                trainer.train_from_counts(counts, &vocabulary, &training)
            },
            None => trainer.train(&corpus, &vocabulary, &training)
        }
    }

    fn print_neighbors(title: &str, result: Result<Vec<Neighbor>>) {
        match result {
            Ok(neighbors) => {
                println!("{}", title);
                for (i, n) in neighbors.iter().enumerate() {
                    println!("{} : {} = {}", i, n.token, n.score);
                }
            },
            Err(e @ EmbeddingError::NotInVocabulary(_)) => println!("{}: {}", title, e),
            Err(e) => tracing::warn!("{}: {}", title, e),
        }
        println!();
    }

    /// Prints the configured probe tokens' neighbours and the analogies.
    pub fn report(params: &PipelineConfig, model: &DenseEmbeddings) {

        let k = params.neighbors;
        for token in &params.probe_tokens {
            let title = format!("{} most similar words to {}", k, token);
            Pipeline::print_neighbors(&title, model.nearest_neighbors(Query::Token(token.as_str()), k));
        }

        for [a, b, c] in &params.analogies {
            let title = format!("{} is to {} as {} is to ?", a, b, c);
            Pipeline::print_neighbors(&title, model.analogy([a.as_str(), b.as_str(), c.as_str()], k));
        }
    }

    pub fn run(params: &PipelineConfig) -> Result<DenseEmbeddings> {

        tracing::info!("{}", params);
        let timer = Instant::now();

        let model = Pipeline::train(params)?;
        if let Some(output_dir) = &params.output_dir {
            model.save(output_dir)?;
        }
        tracing::info!("pipeline finished, took {} seconds", timer.elapsed().as_secs());

        Pipeline::report(params, &model);
        Ok(model)
    }
}

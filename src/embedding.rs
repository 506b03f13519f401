//! The boundary between the text pipeline and whatever learns the vectors.
//!
//! A trainer turns a tokenized [`Corpus`] and a [`Vocabulary`] into a model; the
//! model answers vector, similarity and neighbour queries. Nothing on this side
//! depends on how the trainer represents its weights.

use std::fmt::Display;
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use crate::error::Result;
use crate::normalizer::Corpus;
use crate::vocabulary::Vocabulary;


/// How context positions inside the window are weighted.
///
/// The bundled co-occurrence trainer does not optimise the word2vec objectives. It only
/// borrows their window weighting (see [`TrainingObjective::context_weight`]) when counting.
/// A word2vec backend behind [`EmbeddingTrainer`] can use the variant as named.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrainingObjective {
    SkipGram,
    ContinuousBagOfWords,
}

impl TrainingObjective {

    /// Weight of a context word `distance` positions away from its centre word.
    ///
    /// Skip-gram samples a window size uniformly in `1..=window` per centre word, so a
    /// context word at distance `d` is seen with probability `(window - d + 1) / window`.
    /// Continuous bag-of-words averages the whole window, giving every position `1 / window`.
    pub fn context_weight(&self, distance: usize, window: usize) -> f32 {
        if distance == 0 || distance > window {
            return 0.0;
        }
        match self {
            TrainingObjective::SkipGram => (window - distance + 1) as f32 / window as f32,
            TrainingObjective::ContinuousBagOfWords => 1.0 / window as f32,
        }
    }
}

impl Display for TrainingObjective {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TrainingObjective::SkipGram => write!(f, "skip-gram"),
            TrainingObjective::ContinuousBagOfWords => write!(f, "continuous-bag-of-words"),
        }
    }
}


/// Hyper-parameters every trainer understands.
#[derive(Clone, Debug, PartialEq)]
pub struct TrainingParams {
    pub embedding_dimension: usize,
    pub objective: TrainingObjective,
    pub context_window: usize,
    pub epochs: usize,
}


#[derive(Clone, Debug, PartialEq)]
pub struct Neighbor {
    pub token: String,
    pub score: f32,
}

/// What to search neighbours of.
#[derive(Clone, Debug)]
pub enum Query<'a> {
    /// A vocabulary token; the token itself is left out of the results.
    Token(&'a str),
    Vector(Array1<f32>),
}


pub trait EmbeddingModel {

    fn dimension(&self) -> usize;

    fn vocabulary(&self) -> &Vocabulary;

    /// Fails with `NotInVocabulary` for unknown tokens.
    fn vector_of(&self, token: &str) -> Result<Array1<f32>>;

    /// Cosine of the angle between two token vectors, in `[-1, 1]`.
    fn cosine_similarity(&self, token_a: &str, token_b: &str) -> Result<f32>;

    /// At most `k` tokens, most similar first.
    fn nearest_neighbors(&self, query: Query<'_>, k: usize) -> Result<Vec<Neighbor>>;
}


pub trait EmbeddingTrainer {

    type Model: EmbeddingModel;

    fn build_vocabulary(&self, corpus: &Corpus, min_token_frequency: usize) -> Vocabulary {
        Vocabulary::build(corpus, min_token_frequency, None)
    }

    fn train(&self, corpus: &Corpus, vocabulary: &Vocabulary, params: &TrainingParams) -> Result<Self::Model>;
}


#[cfg(test)]
mod tests {

    use super::TrainingObjective;

    #[test]
    fn context_weights() {

        let sg = TrainingObjective::SkipGram;
        assert_eq!(sg.context_weight(1, 4), 1.0);
        assert_eq!(sg.context_weight(4, 4), 0.25);
        assert_eq!(sg.context_weight(5, 4), 0.0);

        let cbow = TrainingObjective::ContinuousBagOfWords;
        assert_eq!(cbow.context_weight(1, 4), 0.25);
        assert_eq!(cbow.context_weight(3, 4), 0.25);
        assert_eq!(cbow.context_weight(0, 4), 0.0);
    }

    #[test]
    fn objective_names_in_config() {
        let o: TrainingObjective = serde_json::from_str("\"continuous_bag_of_words\"").unwrap();
        assert_eq!(o, TrainingObjective::ContinuousBagOfWords);
        assert_eq!(serde_json::to_string(&TrainingObjective::SkipGram).unwrap(), "\"skip_gram\"");
    }
}

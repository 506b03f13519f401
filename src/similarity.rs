use std::path::Path;
use ndarray::prelude::*;
use crate::config::files_handling;
use crate::embedding::{EmbeddingModel, Neighbor, Query};
use crate::error::{EmbeddingError, Result};
use crate::vocabulary::Vocabulary;

pub const VECTORS_FILE: &str = "vectors";
pub const VOCABULARY_FILE: &str = "vocabulary";


/// A vocabulary with one dense vector per token.
#[derive(Clone, Debug)]
pub struct DenseEmbeddings {
    vocabulary: Vocabulary,
    w: Array2<f32>,
    unit: Array2<f32>,
}

impl DenseEmbeddings {

    pub fn new(vocabulary: Vocabulary, w: Array2<f32>) -> Result<DenseEmbeddings> {

        if w.nrows() != vocabulary.len() {
            return Err(EmbeddingError::Config(format!(
                "inconsistent number of entries, {} vectors for {} tokens", w.nrows(), vocabulary.len()
            )));
        }

        // rows scaled to l2 norm 1 so that a dot product is a cosine, zero rows stay zero
        let mut unit = w.clone();
        for mut row in unit.axis_iter_mut(Axis(0)) {
            let norm = row.dot(&row).sqrt();
            if norm > 0.0 {
                row.mapv_inplace(|a| a / norm);
            }
        }

        Ok(Self { vocabulary, w, unit })
    }

    pub fn weights(&self) -> &Array2<f32> {
        &self.w
    }

    fn index_of(&self, token: &str) -> Result<usize> {
        self.vocabulary.index_of(token).ok_or_else(|| EmbeddingError::NotInVocabulary(token.to_string()))
    }

    fn check_dimension(&self, vec: &Array1<f32>) -> Result<()> {
        if vec.len() != self.dimension() {
            return Err(EmbeddingError::DimensionMismatch { expected: self.dimension(), found: vec.len() });
        }
        Ok(())
    }

    fn rank(&self, vec: &Array1<f32>, exclude: &[usize], k: usize) -> Vec<Neighbor> {

        // multiply all unit vectors by the query direction
        let norm = vec.dot(vec).sqrt();
        let scores = if norm > 0.0 { self.unit.dot(vec) / norm } else { Array1::zeros(self.unit.nrows()) };

        let mut indexed_scores: Vec<(usize, f32)> = scores
        .iter()
        .copied()
        .enumerate()
        .filter(|(i, _)| !exclude.contains(i))
        .collect();

        // sort by most similar in descending order
        indexed_scores.sort_by(|(_i, s), (_j, t)| t.total_cmp(s));

        indexed_scores
        .into_iter()
        .take(k)
        .filter_map(|(i, score)| {
            self.vocabulary.token(i).map(|token| Neighbor { token: token.to_string(), score: score.clamp(-1.0, 1.0) })
        })
        .collect()
    }

    /// `b - a + c`, the vector answering "a is to b as c is to ?".
    pub fn analogy_vector(&self, inputs: [&str; 3]) -> Result<Array1<f32>> {
        let [a, b, c] = inputs;
        Ok(self.vector_of(b)? - self.vector_of(a)? + self.vector_of(c)?)
    }

    /// Best answers to "a is to b as c is to ?", leaving out the three inputs.
    pub fn analogy(&self, inputs: [&str; 3], k: usize) -> Result<Vec<Neighbor>> {
        let analogy = self.analogy_vector(inputs)?;
        let exclude = inputs.iter().map(|t| self.index_of(t)).collect::<Result<Vec<usize>>>()?;
        Ok(self.rank(&analogy, &exclude, k))
    }

    pub fn save(&self, output_dir: &str) -> Result<()> {
        files_handling::save_output(output_dir, VECTORS_FILE, &self.w)?;
        files_handling::save_output(output_dir, VOCABULARY_FILE, &self.vocabulary)?;
        tracing::info!("saved {} vectors to '{}'", self.vocabulary.len(), output_dir);
        Ok(())
    }

    pub fn load(model_dir: &str) -> Result<DenseEmbeddings> {
        let w = files_handling::read_input::<Array2<f32>>(&format!("{}/{}", model_dir, VECTORS_FILE))?;
        let vocabulary = files_handling::read_input::<Vocabulary>(&format!("{}/{}", model_dir, VOCABULARY_FILE))?;
        DenseEmbeddings::new(vocabulary, w)
    }

    pub fn exists(model_dir: &str) -> bool {
        Path::new(&format!("{}/{}.npy", model_dir, VECTORS_FILE)).exists()
    }
}

impl EmbeddingModel for DenseEmbeddings {

    fn dimension(&self) -> usize {
        self.w.ncols()
    }

    fn vocabulary(&self) -> &Vocabulary {
        &self.vocabulary
    }

    fn vector_of(&self, token: &str) -> Result<Array1<f32>> {
        let i = self.index_of(token)?;
        Ok(self.w.row(i).to_owned())
    }

    fn cosine_similarity(&self, token_a: &str, token_b: &str) -> Result<f32> {
        let i = self.index_of(token_a)?;
        let j = self.index_of(token_b)?;
        Ok(self.unit.row(i).dot(&self.unit.row(j)).clamp(-1.0, 1.0))
    }

    fn nearest_neighbors(&self, query: Query<'_>, k: usize) -> Result<Vec<Neighbor>> {
        match query {
            Query::Token(token) => {
                let i = self.index_of(token)?;
                let vec = self.w.row(i).to_owned();
                Ok(self.rank(&vec, &[i], k))
            },
            Query::Vector(vec) => {
                self.check_dimension(&vec)?;
                Ok(self.rank(&vec, &[], k))
            }
        }
    }
}

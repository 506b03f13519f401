use ndarray::concatenate;
use ndarray::prelude::*;
use ndarray::Array;
use ndarray_rand::RandomExt;
use ndarray_rand::rand_distr::Uniform;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use crate::cooccurrence::Counts;
use crate::embedding::{EmbeddingTrainer, TrainingParams};
use crate::error::{EmbeddingError, Result};
use crate::normalizer::Corpus;
use crate::similarity::DenseEmbeddings;
use crate::vocabulary::Vocabulary;
use std::iter::zip;
use std::ops::AddAssign;
use std::ops::SubAssign;
use std::time::Instant;


/// Settings of the co-occurrence backend that the generic [`TrainingParams`] do not cover.
#[derive(Clone, Debug, PartialEq)]
pub struct GloveSettings {
    pub learning_rate: f32,
    pub x_max: f32,
    pub alpha: f32,
    pub batch_size: usize,
    pub num_threads: usize,
    pub max_vocab_size: Option<usize>,
    pub seed: Option<u64>,
}

impl Default for GloveSettings {
    fn default() -> Self {
        Self {
            learning_rate: 0.05,
            x_max: 100.0,
            alpha: 0.75,
            batch_size: 64,
            num_threads: 4,
            max_vocab_size: None,
            seed: None,
        }
    }
}


// token and context weights, biases and their AdaGrad accumulators
struct Train {
    w_tokens: Array2<f32>,
    w_context: Array2<f32>,
    b_tokens: Array2<f32>,
    b_context: Array2<f32>,
    ag_w_tok: Array2<f32>,
    ag_w_context: Array2<f32>,
    ag_b_tok: Array2<f32>,
    ag_b_context: Array2<f32>,
}

impl Train {

    fn new(vocab_size: usize, embedding_dim: usize, rng: &mut StdRng) -> Train {

        let init = Uniform::new(-0.5f32, 0.5f32);
        let scale = embedding_dim as f32;
        Self {
            w_tokens: Array::random_using((vocab_size, embedding_dim), init, rng) / scale,
            w_context: Array::random_using((vocab_size, embedding_dim), init, rng) / scale,
            b_tokens: Array::random_using((vocab_size, 1), init, rng) / scale,
            b_context: Array::random_using((vocab_size, 1), init, rng) / scale,
            ag_w_tok: Array2::from_elem((vocab_size, embedding_dim), 1.0), // init to 1.0 makes the initial eta equal to inital learning rate
            ag_w_context: Array2::from_elem((vocab_size, embedding_dim), 1.0),
            ag_b_tok: Array2::from_elem((vocab_size, 1), 1.0),
            ag_b_context: Array2::from_elem((vocab_size, 1), 1.0)
        }
    }

    fn weighting_x(x: f32, x_max: f32, alpha: f32) -> f32 {
        if x < x_max {
            (x / x_max).powf(alpha)
        } else {
            1.0
        }
    }

    /// One AdaGrad step over a batch of `[i, j, x]` rows, returns the mean weighted loss before the step.
    fn do_training_batch(&mut self, batch: &Array2<f32>, settings: &GloveSettings) -> f32 {

        let learning_rate = settings.learning_rate;

        let is: Vec<usize> = batch.column(0).iter().map(|x| *x as usize).collect();
        let js: Vec<usize> = batch.column(1).iter().map(|x| *x as usize).collect();
        let xs: Array2<f32> = batch.column(2).to_owned().insert_axis(Axis(1));

        // dimensions of (batch, embedding_dim) for v
        // dimensions of (batch, 1) for b
        let v_tok: Array2<f32> = self.w_tokens.select(Axis(0), &is);
        let v_context: Array2<f32> = self.w_context.select(Axis(0), &js);
        let b_tok: Array2<f32> = self.b_tokens.select(Axis(0), &is);
        let b_context: Array2<f32> = self.b_context.select(Axis(0), &js);

        let g_v_tok: Array2<f32> = self.ag_w_tok.select(Axis(0), &is);
        let g_v_context: Array2<f32> = self.ag_w_context.select(Axis(0), &js);
        let g_b_tok: Array2<f32> = self.ag_b_tok.select(Axis(0), &is);
        let g_b_context: Array2<f32> = self.ag_b_context.select(Axis(0), &js);

        let xs_weighted: Array2<f32> = xs.mapv(|x| Train::weighting_x(x, settings.x_max, settings.alpha));

        // diff is of size (batch, 1)
        let dp: Array2<f32> = (&v_tok * &v_context).sum_axis(Axis(1)).insert_axis(Axis(1));
        let diff: Array2<f32> = &dp + &b_tok + &b_context - &xs.mapv(f32::ln);

        let local_batch_loss: Array2<f32> = 0.5 * &xs_weighted * &diff.mapv(|x| x.powi(2));
        let local_loss = local_batch_loss.mean().unwrap_or(0.0);

        let dl_dw = &xs_weighted * &diff;
        let dl_dw_tok: Array2<f32> = &v_context * &dl_dw;
        let dl_dw_context: Array2<f32> = &v_tok * &dl_dw;
        let dl_db: Array2<f32> = dl_dw;

        let dw_tok_update: Array2<f32> = learning_rate * &dl_dw_tok / &g_v_tok.mapv(f32::sqrt);
        let dw_context_update: Array2<f32> = learning_rate * &dl_dw_context / &g_v_context.mapv(f32::sqrt);
        let db_tok_update: Array2<f32> = learning_rate * &dl_db / &g_b_tok.mapv(f32::sqrt);
        let db_context_update: Array2<f32> = learning_rate * &dl_db / &g_b_context.mapv(f32::sqrt);

        let sq_tok = &dl_dw_tok * &dl_dw_tok;
        let sq_context = &dl_dw_context * &dl_dw_context;
        let sq_b = &dl_db * &dl_db;

        // update by index, no select_mut by non-consecutive indexes is available
        for (ll, (ii, jj)) in zip(&is, &js).enumerate() {
            self.w_tokens.row_mut(*ii).sub_assign(&dw_tok_update.row(ll));
            self.w_context.row_mut(*jj).sub_assign(&dw_context_update.row(ll));
            self.b_tokens.row_mut(*ii).sub_assign(&db_tok_update.row(ll));
            self.b_context.row_mut(*jj).sub_assign(&db_context_update.row(ll));

            self.ag_w_tok.row_mut(*ii).add_assign(&sq_tok.row(ll));
            self.ag_w_context.row_mut(*jj).add_assign(&sq_context.row(ll));
            self.ag_b_tok.row_mut(*ii).add_assign(&sq_b.row(ll));
            self.ag_b_context.row_mut(*jj).add_assign(&sq_b.row(ll));
        }

        local_loss
    }

    fn train(&mut self, x_mat: &[Array2<f32>], epochs: usize, settings: &GloveSettings, rng: &mut StdRng) -> Vec<f32> {

        let mut losses = Vec::with_capacity(epochs);

        for epoch in 0..epochs {

            let timer = Instant::now();
            let mut epoch_loss = 0.0;
            let mut n_batches = 0;

            // for each epoch shuffle the slices order and the order within each slice
            let mut slices_order = (0..x_mat.len()).collect::<Vec<usize>>();
            slices_order.shuffle(rng);

            for m in slices_order {

                let slice_arr = &x_mat[m];
                let mut in_slice_order = (0..slice_arr.nrows()).collect::<Vec<usize>>();
                in_slice_order.shuffle(rng);

                for chunk_indexes in in_slice_order.chunks(settings.batch_size) {
                    let batch = slice_arr.select(Axis(0), chunk_indexes);
                    epoch_loss += self.do_training_batch(&batch, settings);
                    n_batches += 1;
                }
            }

            let mean_loss = if n_batches > 0 { epoch_loss / n_batches as f32 } else { 0.0 };
            tracing::info!("finished epoch {} / {}, loss is {}, took {} ms", epoch + 1, epochs, mean_loss, timer.elapsed().as_millis());
            losses.push(mean_loss);
        }

        losses
    }

    // counts are stored one-sided, training needs both (i, j) and (j, i)
    fn symmetric(x_mat_slices: Vec<Array2<f32>>) -> Result<Vec<Array2<f32>>> {
        let mut symmetric_slices: Vec<Array2<f32>> = Vec::with_capacity(x_mat_slices.len());
        for x_mat_slice in x_mat_slices {
            let mirrored = x_mat_slice.select(Axis(1), &[1, 0, 2]);
            symmetric_slices.push(concatenate(Axis(0), &[x_mat_slice.view(), mirrored.view()])?);
        }
        Ok(symmetric_slices)
    }
}


/// Trains vectors by factorising the windowed co-occurrence matrix of the corpus
/// (weighted least squares with AdaGrad). The training objective decides how
/// positions inside the window are weighted when counting.
pub struct CooccurrenceTrainer {
    settings: GloveSettings,
}

impl CooccurrenceTrainer {

    pub fn new(settings: GloveSettings) -> CooccurrenceTrainer {
        Self { settings }
    }

    pub fn settings(&self) -> &GloveSettings {
        &self.settings
    }

    fn check(&self, vocabulary: &Vocabulary, params: &TrainingParams) -> Result<()> {
        if vocabulary.is_empty() {
            return Err(EmbeddingError::EmptyVocabulary);
        }
        if params.embedding_dimension == 0 || params.context_window == 0 || params.epochs == 0 || self.settings.batch_size == 0 {
            return Err(EmbeddingError::Config(
                "embedding dimension, context window, epochs and batch size must all be positive".to_string()
            ));
        }
        Ok(())
    }

    fn rng(&self) -> StdRng {
        match self.settings.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        }
    }

    /// Co-occurrence counts of `corpus` over `vocabulary`, in the layout [`Self::train_from_counts`] expects.
    pub fn count(&self, corpus: &Corpus, vocabulary: &Vocabulary, params: &TrainingParams) -> Result<Vec<Array2<f32>>> {
        self.check(vocabulary, params)?;
        Counts::run(corpus.sentences(), vocabulary, params.objective, params.context_window, self.settings.num_threads)
    }

    pub fn train_from_counts(&self, counts: Vec<Array2<f32>>, vocabulary: &Vocabulary, params: &TrainingParams) -> Result<DenseEmbeddings> {

        self.check(vocabulary, params)?;
        let timer = Instant::now();
        let mut rng = self.rng();

        let x_mat = Train::symmetric(counts)?;
        let n_examples: usize = x_mat.iter().map(|x| x.nrows()).sum();
        tracing::info!("training {} vectors of dimension {} on {} co-occurrences", vocabulary.len(), params.embedding_dimension, n_examples);

        let mut trainer = Train::new(vocabulary.len(), params.embedding_dimension, &mut rng);
        trainer.train(&x_mat, params.epochs, &self.settings, &mut rng);

        // the sum of both weight sets is the matrix to compute similarities with
        let w = &trainer.w_tokens + &trainer.w_context;
        tracing::info!("finished training, took {} seconds", timer.elapsed().as_secs());
        DenseEmbeddings::new(vocabulary.clone(), w)
    }
}

impl EmbeddingTrainer for CooccurrenceTrainer {

    type Model = DenseEmbeddings;

    fn build_vocabulary(&self, corpus: &Corpus, min_token_frequency: usize) -> Vocabulary {
        Vocabulary::build(corpus, min_token_frequency, self.settings.max_vocab_size)
    }

    fn train(&self, corpus: &Corpus, vocabulary: &Vocabulary, params: &TrainingParams) -> Result<DenseEmbeddings> {
        let counts = self.count(corpus, vocabulary, params)?;
        self.train_from_counts(counts, vocabulary, params)
    }
}


#[cfg(test)]
mod tests {

    use ndarray::{array, Array2};
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use crate::cooccurrence::Counts;
    use crate::embedding::{EmbeddingModel, EmbeddingTrainer, TrainingObjective, TrainingParams};
    use crate::error::EmbeddingError;
    use crate::normalizer::Corpus;
    use crate::vocabulary::Vocabulary;
    use super::{CooccurrenceTrainer, GloveSettings, Train};

    fn corpus() -> Corpus {
        let lines = [
            "the cat sat on the mat",
            "the dog sat on the rug",
            "a cat and a dog met",
            "the cat chased the dog",
            "the dog chased the cat",
            "a rare word",
        ];
        Corpus::new(lines.iter().map(|l| l.split(' ').map(|t| t.to_string()).collect()).collect())
    }

    fn params() -> TrainingParams {
        TrainingParams { embedding_dimension: 8, objective: TrainingObjective::SkipGram, context_window: 3, epochs: 30 }
    }

    fn trainer() -> CooccurrenceTrainer {
        CooccurrenceTrainer::new(GloveSettings { batch_size: 4, num_threads: 2, seed: Some(7), ..GloveSettings::default() })
    }

    #[test]
    fn mirrored_counts() {
        let counts: Array2<f32> = array![[0.0, 1.0, 2.0]];
        let sym = Train::symmetric(vec![counts]).unwrap();
        assert_eq!(sym[0], array![[0.0f32, 1.0, 2.0], [1.0, 0.0, 2.0]]);
    }

    #[test]
    fn weighting_is_capped() {
        assert_eq!(Train::weighting_x(200.0, 100.0, 0.75), 1.0);
        assert!((Train::weighting_x(50.0, 100.0, 1.0) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn empty_vocabulary_is_an_error() {
        let t = trainer();
        let vocab = t.build_vocabulary(&Corpus::default(), 1);
        assert!(matches!(t.train(&Corpus::default(), &vocab, &params()), Err(EmbeddingError::EmptyVocabulary)));
    }

    #[test]
    fn seeded_training_is_reproducible_and_shaped() {

        let t = trainer();
        let c = corpus();
        let vocab = t.build_vocabulary(&c, 2);
        assert!(!vocab.contains("rare"));

        let model = t.train(&c, &vocab, &params()).unwrap();
        let again = t.train(&c, &vocab, &params()).unwrap();

        assert_eq!(model.weights().dim(), (vocab.len(), 8));
        assert!(model.weights().iter().all(|x| x.is_finite()));
        assert_eq!(model.weights(), again.weights());
        assert!(matches!(model.vector_of("rare"), Err(EmbeddingError::NotInVocabulary(_))));
        assert_eq!(model.vector_of("cat").unwrap().len(), 8);
    }

    #[test]
    fn loss_goes_down() {

        let t = trainer();
        let c = corpus();
        let vocab = t.build_vocabulary(&c, 1);
        let p = params();

        let counts = Counts::run(c.sentences(), &vocab, p.objective, p.context_window, 1).unwrap();
        let x_mat = Train::symmetric(counts).unwrap();
        let mut rng = StdRng::seed_from_u64(3);
        let settings = GloveSettings { x_max: 2.0, ..t.settings().clone() };
        let mut weights = Train::new(vocab.len(), p.embedding_dimension, &mut rng);
        let losses = weights.train(&x_mat, p.epochs, &settings, &mut rng);

        assert_eq!(losses.len(), p.epochs);
        assert!(losses[p.epochs - 1] < losses[0]);
    }

    #[test]
    fn max_vocab_size_caps_the_vocabulary() {
        let t = CooccurrenceTrainer::new(GloveSettings { max_vocab_size: Some(3), ..GloveSettings::default() });
        let vocab: Vocabulary = t.build_vocabulary(&corpus(), 1);
        assert_eq!(vocab.tokens().collect::<Vec<_>>(), vec!["the", "cat", "dog"]);
    }
}

// imports
use crate::config::files_handling;
use crate::embedding::TrainingObjective;
use crate::error::{EmbeddingError, Result};
use crate::normalizer::Sentence;
use crate::vocabulary::Vocabulary;

use std::collections::HashMap;
use std::ops::Range;
use ndarray::{Array2, s};
use ndarray_stats::QuantileExt;
use rayon::{prelude::*, ThreadPoolBuilder};
use bincode::{deserialize, serialize};

// upper bound on centre tokens per slice, keeps one slice's pair map within memory
const MAX_SLICE_SIZE: usize = 30000;
pub const COUNTS_FILE: &str = "cooc";


pub struct Counts {}

impl Counts {

    fn to_ids(sequence: &Sentence, vocabulary: &Vocabulary) -> Vec<Option<usize>> {
        sequence.iter().map(|tok| vocabulary.index_of(tok)).collect()
    }

    /// Weighted co-occurrences of every centre token in `slice` with the tokens that follow it
    /// inside the window. Counts are one-sided, the mirrored half is added before training.
    /// Out-of-vocabulary tokens are skipped but still take up a position.
    pub fn count(window_size: usize,
        objective: TrainingObjective,
        sequences: &[Sentence],
        vocabulary: &Vocabulary,
        slice: &Range<usize>) -> HashMap<(usize, usize), f32> {

            let mut tup2cooc: HashMap<(usize, usize), f32> = HashMap::new();

            for sequence in sequences {

                let ids = Counts::to_ids(sequence, vocabulary);
                let n = ids.len();

                for i in 0..n {

                    let token_i = match ids[i] {
                        Some(token_i) if slice.contains(&token_i) => token_i,
                        _ => continue
                    };

                    for j in i+1..=i.saturating_add(window_size).min(n.saturating_sub(1)) {

                        let context_j = match ids[j] {
                            Some(context_j) => context_j,
                            None => continue
                        };

                        let val = tup2cooc.entry((token_i, context_j)).or_insert(0.0);
                        *val += objective.context_weight(j - i, window_size);
                    }
                }
            }

            tup2cooc
    }

    // rows of [token, context, count], sorted by pair so that a run is reproducible
    fn map_to_ndarray(tup2cooc: &HashMap<(usize, usize), f32>) -> Array2<f32> {

        let mut pairs: Vec<(&(usize, usize), &f32)> = tup2cooc.iter().collect();
        pairs.sort_by_key(|(k, _)| **k);

        let mut nd_array: Array2<f32> = Array2::zeros((pairs.len(), 3));
        for (mut row, ((i, j), v)) in nd_array.rows_mut().into_iter().zip(pairs) {
            row[0] = *i as f32;
            row[1] = *j as f32;
            row[2] = *v;
        }
        nd_array
    }

    fn slices(vocab_size: usize, num_threads: usize) -> Vec<Range<usize>> {
        let num_threads = num_threads.max(1);
        let in_parts_size = ((vocab_size + num_threads - 1) / num_threads).clamp(1, MAX_SLICE_SIZE);
        (0..vocab_size).step_by(in_parts_size).map(|i| i..(i + in_parts_size).min(vocab_size)).collect()
    }

    /// Counts co-occurrences for the whole vocabulary, one vocabulary slice per worker.
    pub fn run(sequences: &[Sentence],
        vocabulary: &Vocabulary,
        objective: TrainingObjective,
        window_size: usize,
        num_threads: usize) -> Result<Vec<Array2<f32>>> {

        let slices = Counts::slices(vocabulary.len(), num_threads);
        let pool = ThreadPoolBuilder::new().num_threads(num_threads).build()?;

        let counts_by_slices: Vec<Array2<f32>> = pool.install(|| {
            slices.par_iter().enumerate().map(|(thread_i, slice)| {
                let tup2cooc = Counts::count(window_size, objective, sequences, vocabulary, slice);
                tracing::debug!("slice {} ({:?}) found {} pairs", thread_i, slice, tup2cooc.len());
                Counts::map_to_ndarray(&tup2cooc)
            }).collect()
        });

        let n_pairs: usize = counts_by_slices.iter().map(|x| x.nrows()).sum();
        tracing::info!("counted {} co-occurring pairs in {} slices ({}, window {})", n_pairs, counts_by_slices.len(), objective, window_size);
        Ok(counts_by_slices)
    }

    pub fn save(counts_by_slices: &[Array2<f32>], output_dir: &str) -> Result<()> {
        let blobs = counts_by_slices
        .iter()
        .map(|slice| serialize(slice))
        .collect::<std::result::Result<Vec<Vec<u8>>, _>>()?;
        files_handling::save_output(output_dir, COUNTS_FILE, blobs.as_slice())?;
        tracing::info!("saved {} slices of co-occurrences to '{}'", blobs.len(), output_dir);
        Ok(())
    }

    /// Reads counts written by [`Counts::save`] and checks they index into a vocabulary of `vocab_size`.
    pub fn load(output_dir: &str, vocab_size: usize) -> Result<Vec<Array2<f32>>> {

        let blobs = files_handling::read_input::<Vec<Vec<u8>>>(&format!("{}/{}", output_dir, COUNTS_FILE))?;
        let mut slices: Vec<Array2<f32>> = Vec::new();

        for blob in blobs {
            let slice: Array2<f32> = deserialize(&blob)?;
            if slice.ncols() != 3 {
                return Err(EmbeddingError::Config(format!("cached counts have {} columns, expected 3", slice.ncols())));
            }
            if slice.nrows() > 0 {
                let max_index = slice.slice(s![.., ..2usize]).max().map(|m| *m as usize).unwrap_or(usize::MAX);
                if max_index >= vocab_size {
                    return Err(EmbeddingError::Config(format!(
                        "cached counts refer to token {} but the vocabulary has {} entries", max_index, vocab_size
                    )));
                }
            }
            slices.push(slice);
        }

        tracing::info!("loaded {} chunks of co-occurrences", slices.len());
        Ok(slices)
    }
}

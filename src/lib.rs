mod error;
mod loader;
mod normalizer;
mod vocabulary;
mod embedding;
mod similarity;
mod config;
mod cooccurrence;
mod train;
mod pipeline;

pub use error::{EmbeddingError, Result};
pub use loader::{decode_lenient, CorpusLoader, RawCorpus};
pub use normalizer::{default_abbreviations, Corpus, Normalizer, Sentence};
pub use vocabulary::Vocabulary;
pub use embedding::{EmbeddingModel, EmbeddingTrainer, Neighbor, Query, TrainingObjective, TrainingParams};
pub use similarity::DenseEmbeddings;
pub use config::{files_handling, PipelineConfig, TrainingConfig};
pub use cooccurrence::Counts;
pub use train::{CooccurrenceTrainer, GloveSettings};
pub use pipeline::Pipeline;

use thiserror::Error;

/// Errors raised by the loader, the trainer backend and model queries.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    /// A lookup for a token the model was never trained on.
    #[error("token '{0}' is not in the vocabulary")]
    NotInVocabulary(String),

    #[error("vocabulary is empty, nothing to train on")]
    EmptyVocabulary,

    #[error("vector has {found} dimensions, model expects {expected}")]
    DimensionMismatch { expected: usize, found: usize },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid file pattern: {0}")]
    Pattern(#[from] glob::PatternError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("could not read npy file: {0}")]
    ReadNpy(#[from] ndarray_npy::ReadNpyError),

    #[error("could not write npy file: {0}")]
    WriteNpy(#[from] ndarray_npy::WriteNpyError),

    #[error("bincode error: {0}")]
    Bincode(#[from] bincode::Error),

    #[error("shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),

    #[error("could not build thread pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

pub type Result<T> = std::result::Result<T, EmbeddingError>;

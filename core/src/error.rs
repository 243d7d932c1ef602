use thiserror::Error;

/// Failures reading from or writing to the record store. Fatal for a run.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("store error: {0}")]
    Sled(#[from] sled::Error),

    #[error("corrupt record: {0}")]
    Decode(#[from] bincode::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid timestamp: {0}")]
    Timestamp(String),
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum CorpusError {
    #[error("dataset too small: {tokens} unique token(s) after filtering, at least 2 required")]
    DatasetTooSmall { tokens: usize },
}

#[derive(Error, Debug)]
pub enum TrainerError {
    #[error("number of topics must be positive")]
    InvalidTopicCount,

    #[error("vocabulary is empty")]
    EmptyVocabulary,

    #[error("term id {0} out of vocabulary range")]
    UnknownTerm(u32),

    #[error("training diverged: {0}")]
    Diverged(String),
}

/// Everything that can go wrong after the records have been fetched.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Corpus(#[from] CorpusError),

    #[error(transparent)]
    Trainer(#[from] TrainerError),

    #[error("failed to write result: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to serialize result: {0}")]
    Json(#[from] serde_json::Error),
}

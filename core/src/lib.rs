pub mod coherence;
pub mod corpus;
pub mod error;
pub mod lda;
pub mod query;
pub mod record;
pub mod report;
pub mod store;
pub mod tokenizer;

pub use corpus::{BowDoc, Corpus, Pruning, TokenSource, Vocabulary};
pub use error::{CorpusError, PipelineError, StoreError, TrainerError};
pub use lda::{LdaModel, TrainerConfig};
pub use query::RecordFilter;
pub use record::{Hashtag, Record, TermId};
pub use store::RecordStore;

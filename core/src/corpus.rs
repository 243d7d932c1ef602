//! Bag-of-words corpus construction.

use crate::error::CorpusError;
use crate::record::{Record, TermId};
use std::collections::{HashMap, HashSet};

/// Sparse document vector: `(term id, count)` sorted by term id.
pub type BowDoc = Vec<(TermId, u32)>;

/// Which tokens of a tweet feed the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenSource {
    Text,
    Hashtags,
    Combined,
}

impl TokenSource {
    pub fn tokens(&self, record: &Record) -> Vec<String> {
        match self {
            TokenSource::Text => record.tokenized_text.clone(),
            TokenSource::Hashtags => record.hashtag_tokens(),
            TokenSource::Combined => {
                let mut tokens = record.tokenized_text.clone();
                tokens.extend(record.hashtag_tokens());
                tokens
            }
        }
    }
}

impl TryFrom<u8> for TokenSource {
    type Error = u8;

    /// `0` free text, `1` hashtags only, `2` both.
    fn try_from(mode: u8) -> Result<Self, Self::Error> {
        match mode {
            0 => Ok(TokenSource::Text),
            1 => Ok(TokenSource::Hashtags),
            2 => Ok(TokenSource::Combined),
            other => Err(other),
        }
    }
}

/// Document-frequency pruning thresholds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pruning {
    /// Drop tokens found in fewer documents than this.
    pub no_below: usize,
    /// Drop tokens found in more than this fraction of documents.
    pub no_above: f64,
    /// Keep at most this many of the remaining tokens, most frequent first.
    pub keep_n: Option<usize>,
}

impl Default for Pruning {
    fn default() -> Self {
        Self { no_below: 5, no_above: 0.8, keep_n: Some(100_000) }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Vocabulary {
    token2id: HashMap<String, TermId>,
    id2token: Vec<String>,
    /// Number of documents containing each token.
    dfs: Vec<u32>,
    /// Total occurrences of each token across the corpus.
    cfs: Vec<u64>,
    num_docs: usize,
}

impl Vocabulary {
    /// Build from tokenized documents. Ids follow first appearance.
    pub fn build(docs: &[Vec<String>]) -> Self {
        let mut vocab = Self::default();
        for doc in docs {
            vocab.add_document(doc);
        }
        vocab
    }

    fn add_document(&mut self, doc: &[String]) {
        self.num_docs += 1;
        let mut seen: HashSet<TermId> = HashSet::new();
        for token in doc {
            let id = match self.token2id.get(token) {
                Some(&id) => id,
                None => {
                    let id = self.id2token.len() as TermId;
                    self.token2id.insert(token.clone(), id);
                    self.id2token.push(token.clone());
                    self.dfs.push(0);
                    self.cfs.push(0);
                    id
                }
            };
            self.cfs[id as usize] += 1;
            if seen.insert(id) {
                self.dfs[id as usize] += 1;
            }
        }
    }

    pub fn len(&self) -> usize { self.id2token.len() }

    pub fn is_empty(&self) -> bool { self.id2token.is_empty() }

    pub fn num_docs(&self) -> usize { self.num_docs }

    pub fn id(&self, token: &str) -> Option<TermId> { self.token2id.get(token).copied() }

    pub fn token(&self, id: TermId) -> Option<&str> { self.id2token.get(id as usize).map(String::as_str) }

    pub fn tokens(&self) -> &[String] { &self.id2token }

    pub fn doc_freq(&self, id: TermId) -> u32 { self.dfs.get(id as usize).copied().unwrap_or(0) }

    pub fn corpus_freq(&self, id: TermId) -> u64 { self.cfs.get(id as usize).copied().unwrap_or(0) }

    /// Remove rare and overly common tokens, then compact ids keeping their order.
    pub fn filter_extremes(&mut self, pruning: &Pruning) {
        let max_df = pruning.no_above * self.num_docs as f64;
        let mut keep: Vec<TermId> = (0..self.len() as TermId)
            .filter(|&id| {
                let df = self.dfs[id as usize];
                df as usize >= pruning.no_below && df as f64 <= max_df
            })
            .collect();

        if let Some(keep_n) = pruning.keep_n {
            if keep.len() > keep_n {
                let mut by_df = keep.clone();
                by_df.sort_by(|a, b| self.dfs[*b as usize].cmp(&self.dfs[*a as usize]));
                let allowed: HashSet<TermId> = by_df.into_iter().take(keep_n).collect();
                keep.retain(|id| allowed.contains(id));
            }
        }

        let before = self.len();
        let mut token2id = HashMap::with_capacity(keep.len());
        let mut id2token = Vec::with_capacity(keep.len());
        let mut dfs = Vec::with_capacity(keep.len());
        let mut cfs = Vec::with_capacity(keep.len());
        for old in keep {
            let token = std::mem::take(&mut self.id2token[old as usize]);
            token2id.insert(token.clone(), id2token.len() as TermId);
            id2token.push(token);
            dfs.push(self.dfs[old as usize]);
            cfs.push(self.cfs[old as usize]);
        }
        self.token2id = token2id;
        self.id2token = id2token;
        self.dfs = dfs;
        self.cfs = cfs;
        tracing::info!(before, after = self.len(), no_below = pruning.no_below, no_above = pruning.no_above, "pruned vocabulary");
    }

    /// Count the known tokens of a document. Unknown tokens are ignored.
    pub fn doc2bow(&self, tokens: &[String]) -> BowDoc {
        let mut counts: HashMap<TermId, u32> = HashMap::new();
        for token in tokens {
            if let Some(id) = self.id(token) {
                *counts.entry(id).or_insert(0) += 1;
            }
        }
        let mut bow: BowDoc = counts.into_iter().collect();
        bow.sort_by_key(|(id, _)| *id);
        bow
    }
}

/// Vocabulary plus one bag-of-words vector per input record, in input order.
#[derive(Debug, Clone)]
pub struct Corpus {
    pub vocabulary: Vocabulary,
    pub docs: Vec<BowDoc>,
    /// Tokens each record contributed, before vocabulary filtering.
    pub tokens: Vec<Vec<String>>,
}

impl Corpus {
    pub fn build(records: &[Record], source: TokenSource, pruning: Option<&Pruning>) -> Result<Self, CorpusError> {
        let tokens: Vec<Vec<String>> = records.iter().map(|r| source.tokens(r)).collect();
        Self::from_tokens(tokens, pruning)
    }

    pub fn from_tokens(tokens: Vec<Vec<String>>, pruning: Option<&Pruning>) -> Result<Self, CorpusError> {
        let mut vocabulary = Vocabulary::build(&tokens);
        if let Some(pruning) = pruning {
            vocabulary.filter_extremes(pruning);
        }
        if vocabulary.len() < 2 {
            return Err(CorpusError::DatasetTooSmall { tokens: vocabulary.len() });
        }
        let docs = tokens.iter().map(|t| vocabulary.doc2bow(t)).collect();
        tracing::info!(tokens = vocabulary.len(), documents = tokens.len(), "built corpus");
        Ok(Self { vocabulary, docs, tokens })
    }

    pub fn len(&self) -> usize { self.docs.len() }

    pub fn is_empty(&self) -> bool { self.docs.is_empty() }
}

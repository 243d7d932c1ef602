//! UMass topic coherence over document co-occurrence.

use crate::corpus::BowDoc;
use crate::record::TermId;
use std::collections::{HashMap, HashSet};

/// Document sets for the terms needed to score a batch of topics.
pub struct CooccurrenceIndex {
    docs_by_term: HashMap<TermId, HashSet<usize>>,
}

impl CooccurrenceIndex {
    pub fn new<'a, I>(corpus: &[BowDoc], terms: I) -> Self
    where
        I: IntoIterator<Item = &'a TermId>,
    {
        let wanted: HashSet<TermId> = terms.into_iter().copied().collect();
        let mut docs_by_term: HashMap<TermId, HashSet<usize>> =
            wanted.iter().map(|&t| (t, HashSet::new())).collect();
        for (doc_idx, doc) in corpus.iter().enumerate() {
            for (term, _) in doc {
                if let Some(docs) = docs_by_term.get_mut(term) {
                    docs.insert(doc_idx);
                }
            }
        }
        Self { docs_by_term }
    }

    fn doc_count(&self, term: TermId) -> usize {
        self.docs_by_term.get(&term).map_or(0, HashSet::len)
    }

    fn co_doc_count(&self, a: TermId, b: TermId) -> usize {
        match (self.docs_by_term.get(&a), self.docs_by_term.get(&b)) {
            (Some(da), Some(db)) => da.intersection(db).count(),
            _ => 0,
        }
    }

    /// Mean of `ln((D(w_i, w_j) + 1) / D(w_j))` over pairs `j < i` of the
    /// ranked top words. Higher (closer to zero) is more coherent.
    pub fn umass(&self, top_terms: &[TermId]) -> f64 {
        let mut total = 0.0;
        let mut pairs = 0usize;
        for (i, &wi) in top_terms.iter().enumerate().skip(1) {
            for &wj in &top_terms[..i] {
                let d_j = self.doc_count(wj);
                if d_j == 0 {
                    continue;
                }
                total += ((self.co_doc_count(wi, wj) as f64 + 1.0) / d_j as f64).ln();
                pairs += 1;
            }
        }
        if pairs == 0 { 0.0 } else { total / pairs as f64 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cooccurring_words_score_higher() {
        // terms 0 and 1 always together, term 2 alone
        let corpus: Vec<BowDoc> = vec![
            vec![(0, 1), (1, 1)],
            vec![(0, 2), (1, 1)],
            vec![(2, 1)],
            vec![(2, 3)],
        ];
        let index = CooccurrenceIndex::new(&corpus, &[0, 1, 2]);
        let together = index.umass(&[0, 1]);
        let apart = index.umass(&[0, 2]);
        assert!((together - (3.0f64 / 2.0).ln()).abs() < 1e-12);
        assert!((apart - (1.0f64 / 2.0).ln()).abs() < 1e-12);
        assert!(together > apart);
        assert_eq!(index.umass(&[0]), 0.0);
    }
}

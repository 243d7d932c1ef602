//! Latent Dirichlet Allocation trained with online variational Bayes.
//!
//! The corpus is processed in mini-batches ("chunks"). Each chunk runs a
//! per-document E-step that fits the variational topic proportions, then an
//! M-step blends the chunk's sufficient statistics into the topic-word
//! parameters with a decaying learning rate. Dirichlet priors can be
//! re-estimated after every chunk with a Newton step.

use crate::coherence::CooccurrenceIndex;
use crate::corpus::{BowDoc, Vocabulary};
use crate::error::TrainerError;
use crate::record::TermId;
use ndarray::{Array1, Array2, Axis};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Gamma};
use statrs::function::gamma::digamma;

/// Smallest weight for which a topic counts as present in a document.
pub const MIN_TOPIC_PROBABILITY: f64 = 0.01;

const PHI_FLOOR: f64 = 1e-100;

/// Mini-batch size: the corpus size rounded up to a multiple of 1000.
pub fn chunk_size(num_docs: usize) -> usize {
    num_docs.div_ceil(1000).max(1) * 1000
}

/// Trainer settings
#[derive(Debug, Clone)]
pub struct TrainerConfig {
    pub num_topics: usize,
    /// Full sweeps over the corpus
    pub passes: usize,
    /// Maximum E-step iterations per document
    pub iterations: usize,
    /// Documents per update; derived from the corpus size when `None`
    pub chunk_size: Option<usize>,
    /// Re-estimate the document-topic prior
    pub auto_alpha: bool,
    /// Re-estimate the topic-word prior
    pub auto_eta: bool,
    pub decay: f64,
    pub offset: f64,
    /// E-step stops once the mean change of the topic proportions drops below this
    pub gamma_threshold: f64,
    /// Attribute every word of a document to a topic
    pub per_word_topics: bool,
    pub random_seed: Option<u64>,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            num_topics: 10,
            passes: 20,
            iterations: 400,
            chunk_size: None,
            auto_alpha: true,
            auto_eta: true,
            decay: 0.5,
            offset: 1.0,
            gamma_threshold: 0.001,
            per_word_topics: true,
            random_seed: None,
        }
    }
}

impl TrainerConfig {
    pub fn new(num_topics: usize) -> Self {
        Self { num_topics, ..Default::default() }
    }

    pub fn passes(mut self, passes: usize) -> Self {
        self.passes = passes;
        self
    }

    pub fn iterations(mut self, iterations: usize) -> Self {
        self.iterations = iterations;
        self
    }

    pub fn chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = Some(chunk_size);
        self
    }

    pub fn random_seed(mut self, seed: u64) -> Self {
        self.random_seed = Some(seed);
        self
    }

    pub fn random_seed_opt(mut self, seed: Option<u64>) -> Self {
        self.random_seed = seed;
        self
    }
}

/// A topic scored by coherence.
#[derive(Debug, Clone)]
pub struct RankedTopic {
    pub topic: usize,
    pub coherence: f64,
    pub words: Vec<(String, f64)>,
}

/// Topic analysis of a single document.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentTopics {
    /// Weight of every topic, summing to one.
    pub distribution: Vec<f64>,
    /// Topic each distinct term of the document is attributed to.
    pub word_topics: Vec<(TermId, usize)>,
}

impl DocumentTopics {
    /// Topic with the largest weight; the lowest id wins ties.
    pub fn dominant_topic(&self) -> usize {
        argmax(self.distribution.iter().copied())
    }
}

struct DocInference {
    gamma: Array1<f64>,
    exp_elog_theta: Array1<f64>,
    phinorm: Vec<f64>,
}

#[derive(Debug, Clone)]
pub struct LdaModel {
    config: TrainerConfig,
    terms: Vec<String>,
    alpha: Array1<f64>,
    eta: Array1<f64>,
    /// Topic-word sufficient statistics; the variational parameter is `eta + sstats`.
    sstats: Array2<f64>,
    exp_elog_beta: Array2<f64>,
}

impl LdaModel {
    /// Fit a model on `corpus`, whose term ids index into `vocabulary`.
    pub fn train(vocabulary: &Vocabulary, corpus: &[BowDoc], config: TrainerConfig) -> Result<Self, TrainerError> {
        let k = config.num_topics;
        let v = vocabulary.len();
        if k == 0 {
            return Err(TrainerError::InvalidTopicCount);
        }
        if v == 0 {
            return Err(TrainerError::EmptyVocabulary);
        }
        if let Some(&(bad, _)) = corpus.iter().flatten().find(|(id, _)| *id as usize >= v) {
            return Err(TrainerError::UnknownTerm(bad));
        }

        let mut rng = match config.random_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let init = Gamma::new(100.0, 0.01).map_err(|e| TrainerError::Diverged(e.to_string()))?;
        let sstats = Array2::from_shape_simple_fn((k, v), || init.sample(&mut rng));
        let exp_elog_beta = dirichlet_expectation_2d(&sstats).mapv(f64::exp);

        let mut model = Self {
            terms: vocabulary.tokens().to_vec(),
            alpha: Array1::from_elem(k, 1.0 / k as f64),
            eta: Array1::from_elem(v, 1.0 / k as f64),
            sstats,
            exp_elog_beta,
            config,
        };

        let chunk = model.config.chunk_size.unwrap_or_else(|| chunk_size(corpus.len())).max(1);
        tracing::info!(
            topics = k,
            terms = v,
            documents = corpus.len(),
            chunk_size = chunk,
            passes = model.config.passes,
            iterations = model.config.iterations,
            "training LDA model"
        );

        let mut num_updates = 0usize;
        for pass in 0..model.config.passes {
            for docs in corpus.chunks(chunk) {
                let rho = (model.config.offset + pass as f64 + num_updates as f64 / chunk as f64)
                    .powf(-model.config.decay);
                let (gammas, chunk_sstats) = model.e_step(docs, &init, &mut rng);
                if model.config.auto_alpha {
                    model.update_alpha(&gammas, rho);
                }
                model.m_step(chunk_sstats, docs.len(), corpus.len(), rho)?;
                num_updates += docs.len();
            }
            tracing::debug!(pass, alpha_mean = model.alpha.mean().unwrap_or(0.0), "finished pass");
        }
        Ok(model)
    }

    pub fn num_topics(&self) -> usize { self.config.num_topics }

    /// Normalized topic-word weights, `num_topics x num_terms`.
    pub fn topics(&self) -> Array2<f64> {
        let lambda = self.lambda();
        let sums = lambda.sum_axis(Axis(1)).insert_axis(Axis(1));
        lambda / &sums
    }

    /// Most probable terms of a topic, heaviest first.
    pub fn topic_terms(&self, topic: usize, topn: usize) -> Vec<(TermId, f64)> {
        let lambda = self.lambda();
        let row = lambda.row(topic);
        let total = row.sum();
        let mut weights: Vec<(TermId, f64)> =
            row.iter().enumerate().map(|(id, &w)| (id as TermId, w / total)).collect();
        weights.sort_by(|a, b| b.1.total_cmp(&a.1));
        weights.truncate(topn);
        weights
    }

    /// Topic weights of a document.
    pub fn document_topics(&self, doc: &BowDoc) -> Vec<f64> {
        normalize(&self.infer(doc, self.initial_gamma(doc)).gamma)
    }

    /// For each term of the document, the topic with the largest responsibility.
    pub fn word_topics(&self, doc: &BowDoc) -> Vec<(TermId, usize)> {
        let inference = self.infer(doc, self.initial_gamma(doc));
        self.attribute_words(doc, &inference)
    }

    /// Topic weights plus, when enabled, the topic each word is attributed to.
    pub fn analyze(&self, doc: &BowDoc) -> DocumentTopics {
        let inference = self.infer(doc, self.initial_gamma(doc));
        let word_topics =
            if self.config.per_word_topics { self.attribute_words(doc, &inference) } else { Vec::new() };
        DocumentTopics { distribution: normalize(&inference.gamma), word_topics }
    }

    fn attribute_words(&self, doc: &BowDoc, inference: &DocInference) -> Vec<(TermId, usize)> {
        doc.iter()
            .map(|&(id, _)| {
                let column = self.exp_elog_beta.column(id as usize);
                let responsibilities = inference.exp_elog_theta.iter().zip(column.iter()).map(|(t, b)| t * b);
                (id, argmax(responsibilities))
            })
            .collect()
    }

    /// All topics ranked by UMass coherence of their `topn` words, most coherent first.
    pub fn top_topics(&self, corpus: &[BowDoc], topn: usize) -> Vec<RankedTopic> {
        let top_terms: Vec<Vec<(TermId, f64)>> =
            (0..self.num_topics()).map(|t| self.topic_terms(t, topn)).collect();
        let index = CooccurrenceIndex::new(corpus, top_terms.iter().flatten().map(|(id, _)| id));

        let mut ranked: Vec<RankedTopic> = top_terms
            .into_iter()
            .enumerate()
            .map(|(topic, terms)| {
                let ids: Vec<TermId> = terms.iter().map(|(id, _)| *id).collect();
                RankedTopic {
                    topic,
                    coherence: index.umass(&ids),
                    words: terms.into_iter().map(|(id, w)| (self.terms[id as usize].clone(), w)).collect(),
                }
            })
            .collect();
        ranked.sort_by(|a, b| b.coherence.total_cmp(&a.coherence));
        ranked
    }

    fn lambda(&self) -> Array2<f64> {
        &self.sstats + &self.eta.view().insert_axis(Axis(0))
    }

    fn initial_gamma(&self, doc: &BowDoc) -> Array1<f64> {
        let length: u32 = doc.iter().map(|(_, c)| *c).sum();
        &self.alpha + length as f64 / self.num_topics() as f64
    }

    fn infer(&self, doc: &BowDoc, mut gamma: Array1<f64>) -> DocInference {
        let k = self.num_topics();
        let ids: Vec<usize> = doc.iter().map(|(id, _)| *id as usize).collect();
        let counts: Vec<f64> = doc.iter().map(|(_, c)| *c as f64).collect();

        let mut exp_elog_theta = dirichlet_expectation(&gamma).mapv(f64::exp);
        let mut phinorm = self.phinorm(&exp_elog_theta, &ids);

        for _ in 0..self.config.iterations {
            let last = gamma.clone();
            for topic in 0..k {
                let mut acc = 0.0;
                for (n, &id) in ids.iter().enumerate() {
                    acc += counts[n] / phinorm[n] * self.exp_elog_beta[[topic, id]];
                }
                gamma[topic] = self.alpha[topic] + exp_elog_theta[topic] * acc;
            }
            exp_elog_theta = dirichlet_expectation(&gamma).mapv(f64::exp);
            phinorm = self.phinorm(&exp_elog_theta, &ids);

            let mean_change = (&gamma - &last).mapv(f64::abs).mean().unwrap_or(0.0);
            if mean_change < self.config.gamma_threshold {
                break;
            }
        }
        DocInference { gamma, exp_elog_theta, phinorm }
    }

    fn phinorm(&self, exp_elog_theta: &Array1<f64>, ids: &[usize]) -> Vec<f64> {
        ids.iter()
            .map(|&id| exp_elog_theta.dot(&self.exp_elog_beta.column(id)) + PHI_FLOOR)
            .collect()
    }

    fn e_step(&self, docs: &[BowDoc], init: &Gamma<f64>, rng: &mut StdRng) -> (Vec<Array1<f64>>, Array2<f64>) {
        let k = self.num_topics();
        let mut sstats = Array2::<f64>::zeros(self.exp_elog_beta.raw_dim());
        let mut gammas = Vec::with_capacity(docs.len());

        for doc in docs {
            let start = Array1::from_shape_simple_fn(k, || init.sample(&mut *rng));
            let inference = self.infer(doc, start);
            for (n, &(id, count)) in doc.iter().enumerate() {
                let scale = count as f64 / inference.phinorm[n];
                for topic in 0..k {
                    sstats[[topic, id as usize]] += inference.exp_elog_theta[topic] * scale;
                }
            }
            gammas.push(inference.gamma);
        }
        sstats *= &self.exp_elog_beta;
        (gammas, sstats)
    }

    fn m_step(&mut self, chunk_sstats: Array2<f64>, chunk_len: usize, corpus_len: usize, rho: f64) -> Result<(), TrainerError> {
        let scale = corpus_len as f64 / chunk_len.max(1) as f64;
        self.sstats = &self.sstats * (1.0 - rho) + &(chunk_sstats * (rho * scale));

        if self.config.auto_eta {
            self.update_eta(rho);
        }
        let lambda = self.lambda();
        if lambda.iter().any(|x| !x.is_finite()) {
            return Err(TrainerError::Diverged("non-finite topic-word parameters".into()));
        }
        self.exp_elog_beta = dirichlet_expectation_2d(&lambda).mapv(f64::exp);
        Ok(())
    }

    fn update_alpha(&mut self, gammas: &[Array1<f64>], rho: f64) {
        if gammas.is_empty() {
            return;
        }
        let n = gammas.len() as f64;
        let mut logphat = Array1::<f64>::zeros(self.num_topics());
        for gamma in gammas {
            logphat += &dirichlet_expectation(gamma);
        }
        logphat /= n;
        update_dir_prior(&mut self.alpha, n, &logphat, rho);
        tracing::trace!(alpha = ?self.alpha, "updated alpha");
    }

    fn update_eta(&mut self, rho: f64) {
        let k = self.num_topics() as f64;
        let lambda = self.lambda();
        let logphat = dirichlet_expectation_2d(&lambda).sum_axis(Axis(0)) / k;
        update_dir_prior(&mut self.eta, k, &logphat, rho);
    }
}

/// One Newton step on a Dirichlet prior given the mean expected log
/// proportions of `n` observations. Skipped when it would leave the domain.
fn update_dir_prior(prior: &mut Array1<f64>, n: f64, logphat: &Array1<f64>, rho: f64) {
    let total = prior.sum();
    let gradf = prior.mapv(|p| n * (digamma(total) - digamma(p))) + &(logphat * n);
    let c = n * trigamma(total);
    let q = prior.mapv(|p| -n * trigamma(p));
    let b = (&gradf / &q).sum() / (1.0 / c + q.mapv(|x| 1.0 / x).sum());
    let dprior = -(&gradf - b) / &q;

    let updated = &*prior + &(dprior * rho);
    if updated.iter().all(|&x| x > 0.0 && x.is_finite()) {
        *prior = updated;
    }
}

/// `E[log X]` for `X ~ Dir(alpha)`.
fn dirichlet_expectation(alpha: &Array1<f64>) -> Array1<f64> {
    let psi_total = digamma(alpha.sum());
    alpha.mapv(|a| digamma(a) - psi_total)
}

/// Row-wise `dirichlet_expectation`.
fn dirichlet_expectation_2d(alpha: &Array2<f64>) -> Array2<f64> {
    let mut out = alpha.mapv(digamma);
    let totals = alpha.sum_axis(Axis(1));
    for (mut row, &total) in out.rows_mut().into_iter().zip(totals.iter()) {
        let psi_total = digamma(total);
        row.mapv_inplace(|x| x - psi_total);
    }
    out
}

/// Second derivative of `ln Γ`, via recurrence and the asymptotic series.
fn trigamma(mut x: f64) -> f64 {
    let mut acc = 0.0;
    while x < 6.0 {
        acc += 1.0 / (x * x);
        x += 1.0;
    }
    let inv = 1.0 / x;
    let inv2 = inv * inv;
    acc + inv + inv2 / 2.0 + inv * inv2 * (1.0 / 6.0 - inv2 * (1.0 / 30.0 - inv2 * (1.0 / 42.0 - inv2 / 30.0)))
}

fn normalize(v: &Array1<f64>) -> Vec<f64> {
    let total = v.sum();
    if total > 0.0 {
        v.iter().map(|x| x / total).collect()
    } else {
        vec![1.0 / v.len() as f64; v.len()]
    }
}

/// Index of the largest value; the first one wins ties.
pub fn argmax<I: IntoIterator<Item = f64>>(values: I) -> usize {
    let mut best = 0;
    let mut best_value = f64::NEG_INFINITY;
    for (i, value) in values.into_iter().enumerate() {
        if value > best_value {
            best = i;
            best_value = value;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::Corpus;

    fn separated_corpus() -> Corpus {
        let a = ["bitcoin", "trading", "price", "market", "exchange"];
        let b = ["virus", "vaccine", "hospital", "doctor", "mask"];
        let mut docs = Vec::new();
        for i in 0..6 {
            let words = if i % 2 == 0 { &a } else { &b };
            let doc: Vec<String> = words.iter().cycle().skip(i).take(8).map(|w| w.to_string()).collect();
            docs.push(doc);
        }
        Corpus::from_tokens(docs, None).unwrap()
    }

    #[test]
    fn chunk_size_rounds_up_to_thousands() {
        assert_eq!(chunk_size(0), 1000);
        assert_eq!(chunk_size(1), 1000);
        assert_eq!(chunk_size(1000), 1000);
        assert_eq!(chunk_size(1001), 2000);
    }

    #[test]
    fn trigamma_matches_known_values() {
        let pi2_6 = std::f64::consts::PI.powi(2) / 6.0;
        assert!((trigamma(1.0) - pi2_6).abs() < 1e-8);
        assert!((trigamma(0.5) - std::f64::consts::PI.powi(2) / 2.0).abs() < 1e-8);
    }

    #[test]
    fn argmax_prefers_first_on_ties() {
        assert_eq!(argmax(vec![0.5, 0.5]), 0);
        assert_eq!(argmax(vec![0.2, 0.3, 0.3, 0.2]), 1);
    }

    #[test]
    fn rejects_zero_topics() {
        let corpus = separated_corpus();
        let err = LdaModel::train(&corpus.vocabulary, &corpus.docs, TrainerConfig::new(0)).unwrap_err();
        assert!(matches!(err, TrainerError::InvalidTopicCount));
    }

    #[test]
    fn topics_and_documents_are_distributions() {
        let corpus = separated_corpus();
        let config = TrainerConfig::new(2).passes(5).iterations(50).random_seed(7);
        let model = LdaModel::train(&corpus.vocabulary, &corpus.docs, config).unwrap();

        for row in model.topics().rows() {
            assert!((row.sum() - 1.0).abs() < 1e-9);
        }
        for doc in &corpus.docs {
            let analysis = model.analyze(doc);
            assert_eq!(analysis.distribution.len(), 2);
            assert!((analysis.distribution.iter().sum::<f64>() - 1.0).abs() < 1e-9);
            assert_eq!(analysis.word_topics.len(), doc.len());
            assert!(analysis.word_topics.iter().all(|(_, t)| *t < 2));
            assert_eq!(model.word_topics(doc), analysis.word_topics);
        }
        assert_eq!(model.topic_terms(0, 3).len(), 3);
    }

    #[test]
    fn same_seed_same_assignment() {
        let corpus = separated_corpus();
        let train = || {
            let config = TrainerConfig::new(2).passes(5).iterations(50).random_seed(11);
            let model = LdaModel::train(&corpus.vocabulary, &corpus.docs, config).unwrap();
            corpus.docs.iter().map(|d| model.analyze(d).dominant_topic()).collect::<Vec<_>>()
        };
        assert_eq!(train(), train());
    }

    #[test]
    fn small_chunks_train_reproducibly() {
        let corpus = separated_corpus();
        let fit = || {
            let config = TrainerConfig::new(2).passes(3).iterations(30).chunk_size(2).random_seed(13);
            LdaModel::train(&corpus.vocabulary, &corpus.docs, config).unwrap().topics()
        };
        let topics = fit();
        assert!(topics.iter().all(|w| w.is_finite() && *w > 0.0));
        assert_eq!(topics, fit());
    }

    #[test]
    fn ranked_topics_are_sorted() {
        let corpus = separated_corpus();
        let config = TrainerConfig::new(3).passes(3).iterations(30).random_seed(3);
        let model = LdaModel::train(&corpus.vocabulary, &corpus.docs, config).unwrap();
        let ranked = model.top_topics(&corpus.docs, 20);
        assert_eq!(ranked.len(), 3);
        assert!(ranked.windows(2).all(|w| w[0].coherence >= w[1].coherence));
        assert!(ranked.iter().all(|t| t.coherence.is_finite() && t.words.len() == 10));
    }

    #[test]
    fn empty_document_gets_prior_shape() {
        let corpus = separated_corpus();
        let config = TrainerConfig::new(2).passes(2).iterations(20).random_seed(5);
        let model = LdaModel::train(&corpus.vocabulary, &corpus.docs, config).unwrap();
        let analysis = model.analyze(&Vec::new());
        assert!(analysis.word_topics.is_empty());
        assert!((analysis.distribution.iter().sum::<f64>() - 1.0).abs() < 1e-9);
    }
}

//! Shapes a trained model into the JSON documents handed to the dashboard.

use crate::corpus::Corpus;
use crate::lda::{LdaModel, RankedTopic, MIN_TOPIC_PROBABILITY};
use crate::record::{ExtendedDate, Record};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use time::OffsetDateTime;

/// Display colours, assigned to topics by id.
pub const PALETTE: [&str; 20] = [
    "#1f77b4", "#ff7f0e", "#2ca02c", "#d62728", "#9467bd",
    "#8c564b", "#e377c2", "#7f7f7f", "#bcbd22", "#17becf",
    "#aec7e8", "#ffbb78", "#98df8a", "#ff9896", "#c5b0d5",
    "#c49c94", "#f7b6d2", "#c7c7c7", "#dbdb8d", "#9edae5",
];

pub fn topic_color(topic: usize) -> &'static str { PALETTE[topic % PALETTE.len()] }

/// Sum of topic coherences divided by the number of topics.
pub fn average_coherence(ranked: &[RankedTopic], num_topics: usize) -> f64 {
    ranked.iter().map(|t| t.coherence).sum::<f64>() / num_topics.max(1) as f64
}

/// Outcome line printed after a run.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Status {
    pub success: bool,
    pub message: String,
}

impl Status {
    pub fn success(message: impl Into<String>) -> Self { Self { success: true, message: message.into() } }
    pub fn failure(message: impl fmt::Display) -> Self { Self { success: false, message: message.to_string() } }
}

/// Topic with its ranked words, as printed by the `topics` report.
#[derive(Debug, Clone, Serialize)]
pub struct TopicWords {
    pub topic: usize,
    pub coherence: f64,
    pub words: Vec<(String, f64)>,
}

pub fn topic_words(ranked: &[RankedTopic], num_words: usize) -> Vec<TopicWords> {
    ranked
        .iter()
        .map(|t| TopicWords {
            topic: t.topic,
            coherence: t.coherence,
            words: t.words.iter().take(num_words).cloned().collect(),
        })
        .collect()
}

/// Human-readable summary for the `diagnostic` report.
pub struct Diagnostic<'a> {
    pub filter: &'a serde_json::Value,
    pub num_tokens: usize,
    pub num_documents: usize,
    pub coherence: f64,
    pub ranked: &'a [RankedTopic],
}

impl fmt::Display for Diagnostic<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.filter)?;
        writeln!(f, "Number of unique tokens: {}", self.num_tokens)?;
        writeln!(f, "Number of documents: {}", self.num_documents)?;
        writeln!(f, "Average topic coherence: {:.4}.", self.coherence)?;
        for topic in self.ranked {
            write!(f, "Topic {} ({:.4}): [", topic.topic, topic.coherence)?;
            for (i, (word, weight)) in topic.words.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "({:.4}, '{}')", weight, word)?;
            }
            writeln!(f, "]")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct WordSummary {
    pub word: String,
    /// Occurrences across the whole corpus.
    pub count: u64,
    pub importance: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct TopicSummary {
    pub id: usize,
    pub color: &'static str,
    /// Tweets for which this is the dominant topic.
    pub document_count: usize,
    /// Tweets in which this topic has a non-negligible weight.
    pub weight_count: usize,
    pub coherence: f64,
    pub words: Vec<WordSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TweetAnnotation {
    pub id: String,
    pub screen_name: String,
    pub created_at: ExtendedDate,
    pub text: String,
    pub topic: usize,
    pub topics: BTreeMap<usize, f64>,
    pub word_topics: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FullReport {
    pub timestamp: ExtendedDate,
    pub coherence: f64,
    pub num_topics: usize,
    pub topics: Vec<TopicSummary>,
    pub tweets: Vec<TweetAnnotation>,
}

impl FullReport {
    /// `records` and `corpus.docs` must be in the same order.
    pub fn build(
        records: &[Record],
        corpus: &Corpus,
        model: &LdaModel,
        ranked: &[RankedTopic],
        num_words: usize,
        now: OffsetDateTime,
    ) -> Self {
        let num_topics = model.num_topics();
        let vocabulary = &corpus.vocabulary;
        let coherence_by_topic: BTreeMap<usize, f64> = ranked.iter().map(|t| (t.topic, t.coherence)).collect();

        let mut topics: Vec<TopicSummary> = (0..num_topics)
            .map(|id| TopicSummary {
                id,
                color: topic_color(id),
                document_count: 0,
                weight_count: 0,
                coherence: coherence_by_topic.get(&id).copied().unwrap_or(0.0),
                words: model
                    .topic_terms(id, num_words)
                    .into_iter()
                    .map(|(term, importance)| WordSummary {
                        word: vocabulary.token(term).unwrap_or_default().to_string(),
                        count: vocabulary.corpus_freq(term),
                        importance,
                    })
                    .collect(),
            })
            .collect();

        let mut tweets = Vec::with_capacity(records.len());
        for (record, doc) in records.iter().zip(&corpus.docs) {
            let analysis = model.analyze(doc);
            let dominant = analysis.dominant_topic();
            topics[dominant].document_count += 1;
            for (topic, &weight) in analysis.distribution.iter().enumerate() {
                if weight >= MIN_TOPIC_PROBABILITY {
                    topics[topic].weight_count += 1;
                }
            }
            let word_topics = analysis
                .word_topics
                .iter()
                .filter_map(|&(term, topic)| vocabulary.token(term).map(|w| (w.to_string(), topic)))
                .collect();
            tweets.push(TweetAnnotation {
                id: record.id.clone(),
                screen_name: record.screen_name.clone(),
                created_at: ExtendedDate(record.created_at),
                text: record.text.clone(),
                topic: dominant,
                topics: analysis.distribution.into_iter().enumerate().collect(),
                word_topics,
            });
        }

        Self {
            timestamp: ExtendedDate(now),
            coherence: average_coherence(ranked, num_topics),
            num_topics,
            topics,
            tweets,
        }
    }
}

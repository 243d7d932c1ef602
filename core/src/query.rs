//! Record selection: date range, account allow-list, hashtag presence and
//! keyword search.

use crate::corpus::TokenSource;
use crate::record::{ExtendedDate, Record};
use crate::tokenizer::{normalize_term, tokenize};
use serde_json::{json, Map, Value};
use std::collections::HashSet;
use time::OffsetDateTime;

#[derive(Debug, Clone)]
pub struct RecordFilter {
    /// Inclusive lower bound on `created_at`.
    pub start: OffsetDateTime,
    /// Inclusive upper bound on `created_at`.
    pub end: OffsetDateTime,
    /// Allowed screen names; empty means any account.
    pub accounts: Vec<String>,
    pub require_hashtags: bool,
    pub keywords: Option<KeywordQuery>,
}

impl RecordFilter {
    pub fn new(start: OffsetDateTime, end: OffsetDateTime) -> Self {
        Self { start, end, accounts: Vec::new(), require_hashtags: false, keywords: None }
    }

    pub fn accounts<I, S>(mut self, accounts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.accounts = accounts.into_iter().map(Into::into).collect();
        self
    }

    /// Hashtag-only models skip tweets without hashtags.
    pub fn token_source(mut self, source: TokenSource) -> Self {
        self.require_hashtags = source == TokenSource::Hashtags;
        self
    }

    /// Blank keyword strings leave the filter unchanged.
    pub fn keywords(mut self, keywords: &str) -> Self {
        self.keywords = KeywordQuery::parse(keywords);
        self
    }

    pub fn matches(&self, record: &Record) -> bool {
        if record.created_at < self.start || record.created_at > self.end {
            return false;
        }
        if !self.accounts.is_empty() && !self.accounts.iter().any(|a| a == &record.screen_name) {
            return false;
        }
        if self.require_hashtags && !record.has_hashtags() {
            return false;
        }
        match &self.keywords {
            Some(query) => query.matches(record),
            None => true,
        }
    }

    /// The filter as a query document, for diagnostics.
    pub fn describe(&self) -> Value {
        let mut doc = Map::new();
        doc.insert(
            "created_at".into(),
            json!({ "$gte": ExtendedDate(self.start), "$lte": ExtendedDate(self.end) }),
        );
        if !self.accounts.is_empty() {
            doc.insert("screen_name".into(), json!({ "$in": self.accounts }));
        }
        if self.require_hashtags {
            doc.insert("hashtags".into(), json!({ "$ne": [] }));
        }
        if let Some(query) = &self.keywords {
            doc.insert("$text".into(), json!({ "$search": query.raw }));
        }
        Value::Object(doc)
    }
}

/// Split an account list given as one space-separated string.
pub fn parse_accounts(accounts: &str) -> Vec<String> {
    accounts.split_whitespace().map(str::to_string).collect()
}

/// A parsed keyword search string.
///
/// Bare words match when any of them occurs in the tweet (after stemming).
/// Quoted phrases must all occur verbatim, case-insensitively, and words
/// prefixed with `-` exclude a tweet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeywordQuery {
    pub raw: String,
    pub terms: Vec<String>,
    pub phrases: Vec<String>,
    pub excluded: Vec<String>,
}

impl KeywordQuery {
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }
        let mut terms = Vec::new();
        let mut phrases = Vec::new();
        let mut excluded = Vec::new();

        // Odd-numbered pieces between quotes are phrases.
        for (i, piece) in raw.split('"').enumerate() {
            if i % 2 == 1 {
                let phrase = piece.trim().to_lowercase();
                if !phrase.is_empty() {
                    phrases.push(phrase);
                }
                continue;
            }
            for word in piece.split_whitespace() {
                match word.strip_prefix('-') {
                    Some(neg) => excluded.extend(normalize_term(neg)),
                    None => terms.extend(normalize_term(word)),
                }
            }
        }
        if terms.is_empty() && phrases.is_empty() && excluded.is_empty() {
            return None;
        }
        Some(Self { raw: raw.to_string(), terms, phrases, excluded })
    }

    pub fn matches(&self, record: &Record) -> bool {
        let text = record.text.to_lowercase();
        if !self.phrases.iter().all(|p| text.contains(p.as_str())) {
            return false;
        }
        let words: HashSet<String> = tokenize(&record.text)
            .into_iter()
            .chain(record.tokenized_text.iter().filter_map(|t| normalize_term(t)))
            .collect();
        if self.excluded.iter().any(|t| words.contains(t)) {
            return false;
        }
        self.terms.is_empty() || self.terms.iter().any(|t| words.contains(t))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Hashtag;
    use time::macros::datetime;

    fn tweet(at: OffsetDateTime, who: &str, text: &str, tags: &[&str]) -> Record {
        Record {
            id: format!("{who}-{}", at.unix_timestamp()),
            created_at: at,
            screen_name: who.into(),
            text: text.into(),
            tokenized_text: tokenize(text),
            hashtags: tags.iter().map(|t| Hashtag { text: t.to_string() }).collect(),
        }
    }

    #[test]
    fn date_range_is_inclusive() {
        let start = datetime!(2020-03-03 0:00 UTC);
        let end = datetime!(2020-03-04 0:00 UTC);
        let filter = RecordFilter::new(start, end);
        assert!(filter.matches(&tweet(start, "a", "x", &[])));
        assert!(filter.matches(&tweet(end, "a", "x", &[])));
        assert!(!filter.matches(&tweet(datetime!(2020-03-04 0:00:01 UTC), "a", "x", &[])));
    }

    #[test]
    fn accounts_and_hashtags() {
        let at = datetime!(2020-03-03 10:00 UTC);
        let filter = RecordFilter::new(datetime!(2020-01-01 0:00 UTC), datetime!(2021-01-01 0:00 UTC))
            .accounts(parse_accounts(" who  cdcgov "))
            .token_source(TokenSource::Hashtags);
        assert!(filter.matches(&tweet(at, "who", "hello", &["covid"])));
        assert!(!filter.matches(&tweet(at, "who", "hello", &[])));
        assert!(!filter.matches(&tweet(at, "nasa", "hello", &["covid"])));
    }

    #[test]
    fn keyword_search() {
        let at = datetime!(2020-03-03 10:00 UTC);
        let q = KeywordQuery::parse("vaccine \"social distancing\" -hoax").unwrap();
        assert_eq!(q.terms, vec!["vaccin".to_string()]);
        assert!(q.matches(&tweet(at, "a", "Keep social distancing until vaccines arrive", &[])));
        assert!(!q.matches(&tweet(at, "a", "Vaccines arrive soon", &[])));
        assert!(!q.matches(&tweet(at, "a", "Social distancing and vaccine hoax", &[])));
        assert!(KeywordQuery::parse("   ").is_none());
    }

    #[test]
    fn describe_renders_query_document() {
        let filter = RecordFilter::new(datetime!(1970-01-01 0:00 UTC), datetime!(1970-01-01 0:00:01 UTC))
            .accounts(vec!["who"])
            .keywords("mask");
        let doc = filter.describe();
        assert_eq!(doc["created_at"]["$lte"]["$date"], 1000);
        assert_eq!(doc["screen_name"]["$in"][0], "who");
        assert_eq!(doc["$text"]["$search"], "mask");
        assert!(doc.get("hashtags").is_none());
    }
}

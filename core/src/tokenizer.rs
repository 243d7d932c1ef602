use lazy_static::lazy_static;
use regex::Regex;
use rust_stemmers::{Algorithm, Stemmer};
use unicode_normalization::UnicodeNormalization;
use std::collections::HashSet;

lazy_static! {
    static ref RE: Regex = Regex::new(r"(?u)\p{L}[\p{L}\p{N}_']*").expect("valid regex");
    // URLs, @mentions and #hashtags are not part of the free text.
    static ref NOISE: Regex = Regex::new(r"(?u)https?://\S+|www\.\S+|[@#][\p{L}\p{N}_]+").expect("valid regex");
    static ref STEMMER: Stemmer = Stemmer::create(Algorithm::English);
    static ref STOPWORDS: HashSet<&'static str> = {
        let words: &[&str] = &[
            "a","about","above","after","again","against","all","am","amp","an","and","any","are","aren't","as","at",
            "be","because","been","before","being","below","between","both","but","by",
            "can","can't","cannot","could","couldn't",
            "did","didn't","do","does","doesn't","doing","don't","down","during",
            "each","few","for","from","further",
            "had","hadn't","has","hasn't","have","haven't","having","he","he'd","he'll","he's","her","here","here's","hers","herself","him","himself","his","how","how's",
            "i","i'd","i'll","i'm","i've","if","in","into","is","isn't","it","it's","its","itself",
            "let's","me","more","most","mustn't","my","myself",
            "no","nor","not","of","off","on","once","only","or","other","ought","our","ours","ourselves","out","over","own",
            "rt","same","she","she'd","she'll","she's","should","shouldn't","so","some","such",
            "than","that","that's","the","their","theirs","them","themselves","then","there","there's","these","they","they'd","they'll","they're","they've","this","those","through","to","too",
            "under","until","up","very",
            "was","wasn't","we","we'd","we'll","we're","we've","were","weren't","what","what's","when","when's","where","where's","which","while","who","who's","whom","why","why's","with","won't","would","wouldn't",
            "you","you'd","you'll","you're","you've","your","yours","yourself","yourselves"
        ];
        words.iter().copied().collect()
    };
}

fn is_stopword(token: &str) -> bool { STOPWORDS.contains(token) }

fn normalize(text: &str) -> String {
    text.nfkc().collect::<String>().to_lowercase()
}

/// Tokenize tweet text using NFKC normalization, lowercase, stopword removal, and stemming.
/// URLs, mentions, hashtags and single-letter words are dropped.
pub fn tokenize(text: &str) -> Vec<String> {
    let normalized = normalize(text);
    let cleaned = NOISE.replace_all(&normalized, " ");
    RE.find_iter(&cleaned)
        .map(|m| m.as_str())
        .filter(|token| token.chars().count() >= 2 && !is_stopword(token))
        .map(|token| STEMMER.stem(token).to_string())
        .collect()
}

/// Normalize a single search term the same way `tokenize` treats text.
/// Returns `None` for stopwords and terms without letters.
pub fn normalize_term(term: &str) -> Option<String> {
    let normalized = normalize(term);
    let token = RE.find(&normalized)?.as_str();
    if is_stopword(token) { return None; }
    Some(STEMMER.stem(token).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_tokenize() {
        let t = tokenize("Running, runner's run!");
        assert!(t.iter().any(|w| w == "run"));
    }

    #[test]
    fn strips_tweet_noise() {
        let t = tokenize("RT @who_int: Wash hands https://t.co/abc #COVID19");
        assert_eq!(t, vec!["wash".to_string(), "hand".to_string()]);
    }

    #[test]
    fn normalizes_terms() {
        assert_eq!(normalize_term("Vaccines").as_deref(), Some("vaccin"));
        assert_eq!(normalize_term("the"), None);
        assert_eq!(normalize_term("123"), None);
    }
}

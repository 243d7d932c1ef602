use criterion::{criterion_group, criterion_main, Criterion};
use topic_core::tokenizer::tokenize;
use topic_core::Corpus;

const TWEETS: &[&str] = &[
    "Wash your hands often with soap and water for at least 20 seconds #COVID19",
    "Markets rallied today as oil prices recovered from last week's lows",
    "Stay home, save lives. Hospitals need masks and ventilators https://t.co/x",
    "Central bank cuts interest rates to support the economy during the outbreak",
];

fn bench_tokenize(c: &mut Criterion) {
    c.bench_function("tokenize_tweets", |b| b.iter(|| TWEETS.iter().map(|t| tokenize(t)).collect::<Vec<_>>()));
}

fn bench_corpus(c: &mut Criterion) {
    let docs: Vec<Vec<String>> = TWEETS.iter().cycle().take(2_000).map(|t| tokenize(t)).collect();
    c.bench_function("build_corpus_2k", |b| b.iter(|| Corpus::from_tokens(docs.clone(), None)));
}

criterion_group!(benches, bench_tokenize, bench_corpus);
criterion_main!(benches);

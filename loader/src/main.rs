use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Deserialize;
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::OffsetDateTime;
use topic_core::record::parse_timestamp;
use topic_core::store::{MetaFile, COLLECTION, TEST_COLLECTION};
use topic_core::tokenizer::tokenize;
use topic_core::{Hashtag, Record, RecordStore};
use tracing_subscriber::{fmt, EnvFilter};
use walkdir::WalkDir;

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TweetId {
    Text(String),
    Number(u64),
}

#[derive(Debug, Deserialize)]
struct InputTweet {
    id: TweetId,
    created_at: String,
    screen_name: String,
    #[serde(default, alias = "full_text")]
    text: Option<String>,
    #[serde(default)]
    tokenized_text: Option<Vec<String>>,
    #[serde(default)]
    hashtags: Vec<Hashtag>,
}

#[derive(Parser)]
#[command(name = "loader")]
#[command(about = "Load tweet dumps into the record store", long_about = None)]
struct Cli {
    /// Record store directory
    #[arg(long, global = true, env = "TWEET_STORE_PATH", default_value = "./tweet_miner")]
    store: PathBuf,
    /// Use the test collection instead of the main one
    #[arg(long, global = true, default_value_t = false)]
    test_db: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Import tweets from JSON/JSONL files or a directory of them
    Import {
        /// Input path (file or directory)
        #[arg(long)]
        input: String,
    },
    /// Print the number of stored tweets and their date span
    Stats,
}

#[derive(Debug, Default, PartialEq)]
struct ImportCounts {
    inserted: usize,
    replaced: usize,
}

fn main() -> Result<()> {
    dotenv::dotenv().ok();
    fmt().with_writer(std::io::stderr).with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))).init();
    let cli = Cli::parse();
    let collection = if cli.test_db { TEST_COLLECTION } else { COLLECTION };
    let store = RecordStore::open(&cli.store, collection)?;

    match cli.command {
        Commands::Import { input } => import(&store, Path::new(&input)).map(|_| ()),
        Commands::Stats => stats(&store),
    }
}

fn import(store: &RecordStore, input_path: &Path) -> Result<ImportCounts> {
    let mut files: Vec<PathBuf> = Vec::new();
    if input_path.is_dir() {
        for entry in WalkDir::new(input_path).into_iter().filter_map(|e| e.ok()) {
            let p = entry.path();
            if p.is_file() {
                if let Some(ext) = p.extension().and_then(|s| s.to_str()) {
                    if matches!(ext, "json" | "jsonl") {
                        files.push(p.to_path_buf());
                    }
                }
            }
        }
        files.sort();
    } else if input_path.is_file() {
        files.push(input_path.to_path_buf());
    } else {
        anyhow::bail!("input path {} does not exist", input_path.display());
    }

    let mut counts = ImportCounts::default();
    for file in files {
        if file.extension().and_then(|s| s.to_str()) == Some("jsonl") {
            import_jsonl(store, &file, &mut counts)?;
        } else {
            import_json(store, &file, &mut counts)?;
        }
    }
    store.flush()?;

    let meta = MetaFile {
        num_records: store.len() as u64,
        updated_at: OffsetDateTime::now_utc().format(&Rfc3339).unwrap_or_else(|_| "".into()),
        version: 1,
    };
    store.save_meta(&meta)?;
    tracing::info!(inserted = counts.inserted, replaced = counts.replaced, total = meta.num_records, collection = store.collection(), "import complete");
    Ok(counts)
}

fn import_jsonl(store: &RecordStore, file: &Path, counts: &mut ImportCounts) -> Result<()> {
    let f = File::open(file)?;
    let reader = BufReader::new(f);
    for (lineno, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() { continue; }
        let tweet: InputTweet = serde_json::from_str(&line)
            .with_context(|| format!("{}:{}", file.display(), lineno + 1))?;
        ingest(store, tweet, counts)?;
    }
    Ok(())
}

fn import_json(store: &RecordStore, file: &Path, counts: &mut ImportCounts) -> Result<()> {
    let f = File::open(file)?;
    let reader = BufReader::new(f);
    let json: serde_json::Value = serde_json::from_reader(reader)?;
    match json {
        serde_json::Value::Array(arr) => {
            for v in arr {
                let tweet: InputTweet = serde_json::from_value(v)?;
                ingest(store, tweet, counts)?;
            }
        }
        serde_json::Value::Object(_) => {
            let tweet: InputTweet = serde_json::from_value(json)?;
            ingest(store, tweet, counts)?;
        }
        _ => tracing::warn!(file = %file.display(), "skipping file without tweet objects"),
    }
    Ok(())
}

fn ingest(store: &RecordStore, tweet: InputTweet, counts: &mut ImportCounts) -> Result<()> {
    let record = to_record(tweet)?;
    if store.insert(&record)? {
        counts.inserted += 1;
    } else {
        counts.replaced += 1;
    }
    Ok(())
}

fn to_record(tweet: InputTweet) -> Result<Record> {
    let id = match tweet.id {
        TweetId::Text(s) => s,
        TweetId::Number(n) => n.to_string(),
    };
    let created_at = parse_created_at(&tweet.created_at)?;
    let text = tweet.text.unwrap_or_default();
    // Dumps without pre-tokenized text get it derived here.
    let tokenized_text = tweet.tokenized_text.unwrap_or_else(|| tokenize(&text));
    Ok(Record { id, created_at, screen_name: tweet.screen_name, text, tokenized_text, hashtags: tweet.hashtags })
}

/// Store formats plus the Twitter API's `Wed Mar 04 10:00:00 +0000 2020`.
fn parse_created_at(value: &str) -> Result<OffsetDateTime> {
    if let Ok(ts) = parse_timestamp(value) {
        return Ok(ts);
    }
    let twitter = format_description!(
        "[weekday repr:short] [month repr:short] [day] [hour]:[minute]:[second] [offset_hour sign:mandatory][offset_minute] [year]"
    );
    Ok(OffsetDateTime::parse(value.trim(), twitter).with_context(|| format!("invalid created_at: {value}"))?)
}

fn stats(store: &RecordStore) -> Result<()> {
    match store.span()? {
        Some((first, last)) => println!(
            "{}: {} tweets from {} to {}",
            store.collection(),
            store.len(),
            first.format(&Rfc3339)?,
            last.format(&Rfc3339)?
        ),
        None => println!("{}: empty", store.collection()),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use time::macros::datetime;

    #[test]
    fn parses_twitter_dates() {
        assert_eq!(parse_created_at("Wed Mar 04 10:00:00 +0000 2020").unwrap(), datetime!(2020-03-04 10:00 UTC));
        assert_eq!(parse_created_at("2020-03-04 10:00:00.0").unwrap(), datetime!(2020-03-04 10:00 UTC));
        assert!(parse_created_at("yesterday").is_err());
    }

    #[test]
    fn derives_tokens_when_missing() {
        let tweet: InputTweet = serde_json::from_str(
            r#"{"id": 1234, "created_at": "2020-03-04 10:00:00", "screen_name": "who", "full_text": "Wash hands often"}"#,
        )
        .unwrap();
        let record = to_record(tweet).unwrap();
        assert_eq!(record.id, "1234");
        assert_eq!(record.tokenized_text, vec!["wash", "hand", "often"]);
        assert!(record.hashtags.is_empty());
    }

    #[test]
    fn imports_a_directory_of_dumps_once() {
        let input = tempfile::tempdir().unwrap();
        fs::write(
            input.path().join("a.jsonl"),
            concat!(
                r#"{"id": 1, "created_at": "2020-03-04 10:00:00", "screen_name": "who", "text": "Wash hands often"}"#,
                "\n\n",
                r#"{"id": "2", "created_at": "Wed Mar 04 11:00:00 +0000 2020", "screen_name": "cdcgov", "text": "Stay home", "hashtags": [{"text": "COVID19"}]}"#,
                "\n",
            ),
        )
        .unwrap();
        fs::create_dir(input.path().join("nested")).unwrap();
        fs::write(
            input.path().join("nested/b.json"),
            r#"[{"id": 3, "created_at": "2020-03-05T09:00:00Z", "screen_name": "who", "tokenized_text": ["mask"]}]"#,
        )
        .unwrap();
        fs::write(
            input.path().join("nested/c.json"),
            r#"{"id": 4, "created_at": "2020-03-06 09:00:00", "screen_name": "nhs", "text": "Testing sites open"}"#,
        )
        .unwrap();
        fs::write(input.path().join("notes.txt"), "not a dump").unwrap();

        let store_dir = tempfile::tempdir().unwrap();
        let store = RecordStore::open(store_dir.path(), TEST_COLLECTION).unwrap();

        let first = import(&store, input.path()).unwrap();
        assert_eq!(first, ImportCounts { inserted: 4, replaced: 0 });
        assert_eq!(store.len(), 4);
        assert_eq!(store.load_meta().unwrap().num_records, 4);

        let second = import(&store, input.path()).unwrap();
        assert_eq!(second, ImportCounts { inserted: 0, replaced: 4 });
        assert_eq!(store.len(), 4);
        assert_eq!(store.load_meta().unwrap().num_records, 4);
    }

    #[test]
    fn missing_input_is_an_error() {
        let store_dir = tempfile::tempdir().unwrap();
        let store = RecordStore::open(store_dir.path(), COLLECTION).unwrap();
        assert!(import(&store, &store_dir.path().join("absent.jsonl")).is_err());
        assert!(store.is_empty());
    }
}

use anyhow::{bail, Result};
use clap::Parser;
use std::path::PathBuf;
use time::OffsetDateTime;
use topic_core::query::parse_accounts;
use topic_core::record::parse_timestamp;
use topic_core::store::{COLLECTION, TEST_COLLECTION};
use topic_core::{Pruning, RecordFilter, TokenSource, TrainerConfig};

use crate::{PipelineConfig, ReportLevel};

#[derive(Parser, Debug)]
#[command(name = "modeler")]
#[command(about = "Train an LDA topic model over stored tweets", long_about = None)]
pub struct Args {
    /// Lower date to filter tweets
    #[arg(long, default_value = "2020-03-03 00:00:00.0")]
    pub start: String,
    /// Most recent date to filter tweets (default: now)
    #[arg(long)]
    pub end: Option<String>,
    /// Space-separated list of accounts to filter tweets
    #[arg(long, default_value = "")]
    pub accounts: String,
    /// Number of topics to execute the model
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    pub topics: u32,
    /// 1 to log training progress
    #[arg(long, default_value_t = 0, value_parser = clap::value_parser!(u8).range(0..=1))]
    pub logging: u8,
    /// 0 free text, 1 hashtags only, 2 free text and hashtags
    #[arg(long, default_value_t = 0, value_parser = clap::value_parser!(u8).range(0..=2))]
    pub hashtagmodel: u8,
    /// Keyword search applied to the tweets
    #[arg(long, default_value = "")]
    pub keywords: String,
    /// Output produced by the run
    #[arg(long, value_enum, default_value_t = ReportLevel::Full)]
    pub report: ReportLevel,
    /// Where the full report is written
    #[arg(long, default_value = "./topic_model.json")]
    pub output: PathBuf,
    /// Record store directory
    #[arg(long, env = "TWEET_STORE_PATH", default_value = "./tweet_miner")]
    pub store: PathBuf,
    /// Read the test collection
    #[arg(long, default_value_t = false)]
    pub test_db: bool,
    /// Drop rare and overly common tokens before training
    #[arg(long, default_value_t = false)]
    pub prune: bool,
    /// With --prune: minimum number of tweets a token must appear in
    #[arg(long, default_value_t = 5)]
    pub no_below: usize,
    /// With --prune: maximum fraction of tweets a token may appear in
    #[arg(long, default_value_t = 0.8)]
    pub no_above: f64,
    /// Words listed per topic
    #[arg(long, default_value_t = 10)]
    pub num_words: usize,
    /// Seed for reproducible training
    #[arg(long)]
    pub seed: Option<u64>,
}

impl Args {
    pub fn verbose(&self) -> bool { self.logging == 1 }

    pub fn collection(&self) -> &'static str {
        if self.test_db { TEST_COLLECTION } else { COLLECTION }
    }

    pub fn into_config(self) -> Result<PipelineConfig> {
        let start = parse_timestamp(&self.start)?;
        let end = match &self.end {
            Some(end) => parse_timestamp(end)?,
            None => OffsetDateTime::now_utc(),
        };
        let source = match TokenSource::try_from(self.hashtagmodel) {
            Ok(source) => source,
            Err(mode) => bail!("unknown hashtag model {mode}"),
        };
        if !(0.0..=1.0).contains(&self.no_above) {
            bail!("--no-above must be between 0 and 1, got {}", self.no_above);
        }

        let filter = RecordFilter::new(start, end)
            .accounts(parse_accounts(&self.accounts))
            .token_source(source)
            .keywords(&self.keywords);
        let pruning = self.prune.then(|| Pruning { no_below: self.no_below, no_above: self.no_above, ..Pruning::default() });
        let trainer = TrainerConfig::new(self.topics as usize).random_seed_opt(self.seed);

        Ok(PipelineConfig {
            filter,
            source,
            pruning,
            trainer,
            report: self.report,
            output: self.output,
            num_words: self.num_words.max(1),
        })
    }
}

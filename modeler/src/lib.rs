use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use time::OffsetDateTime;
use topic_core::lda::RankedTopic;
use topic_core::report::{self, Diagnostic, FullReport, Status};
use topic_core::{Corpus, LdaModel, PipelineError, Pruning, Record, RecordFilter, RecordStore, StoreError, TokenSource, TrainerConfig};

pub mod cli;

/// Top words per topic used to score coherence.
pub const COHERENCE_TOP_N: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ReportLevel {
    /// Query, corpus size and coherence as plain text
    Diagnostic,
    /// JSON array of topics with their words
    Topics,
    /// Full JSON result written to the output file
    Full,
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub filter: RecordFilter,
    pub source: TokenSource,
    pub pruning: Option<Pruning>,
    pub trainer: TrainerConfig,
    pub report: ReportLevel,
    pub output: PathBuf,
    pub num_words: usize,
}

pub struct TrainedModel {
    pub corpus: Corpus,
    pub model: LdaModel,
    /// Topics, most coherent first.
    pub ranked: Vec<RankedTopic>,
}

impl TrainedModel {
    pub fn average_coherence(&self) -> f64 {
        report::average_coherence(&self.ranked, self.model.num_topics())
    }
}

/// Read every tweet matching the filter. Store failures end the run.
pub fn fetch_records(store: &RecordStore, filter: &RecordFilter) -> Result<Vec<Record>, StoreError> {
    let records = store.find(filter).collect::<Result<Vec<_>, _>>()?;
    tracing::info!(records = records.len(), collection = store.collection(), "fetched tweets");
    Ok(records)
}

pub fn train(records: &[Record], config: &PipelineConfig) -> Result<TrainedModel, PipelineError> {
    let corpus = Corpus::build(records, config.source, config.pruning.as_ref())?;
    let model = LdaModel::train(&corpus.vocabulary, &corpus.docs, config.trainer.clone())?;
    let ranked = model.top_topics(&corpus.docs, COHERENCE_TOP_N);
    Ok(TrainedModel { corpus, model, ranked })
}

/// Train on `records` and print the configured report to `out`.
///
/// Failures after the query never escape: they are reported on `out`
/// (`[]` for the topics report, a failure status otherwise). Only errors
/// writing to `out` itself are returned.
pub fn run<W: Write>(records: &[Record], config: &PipelineConfig, out: &mut W) -> io::Result<()> {
    match config.report {
        ReportLevel::Diagnostic => run_diagnostic(records, config, out),
        ReportLevel::Topics => run_topics(records, config, out),
        ReportLevel::Full => run_full(records, config, out),
    }
}

fn run_diagnostic<W: Write>(records: &[Record], config: &PipelineConfig, out: &mut W) -> io::Result<()> {
    match train(records, config) {
        Ok(trained) => {
            let filter = config.filter.describe();
            let diagnostic = Diagnostic {
                filter: &filter,
                num_tokens: trained.corpus.vocabulary.len(),
                num_documents: trained.corpus.len(),
                coherence: trained.average_coherence(),
                ranked: &trained.ranked,
            };
            write!(out, "{diagnostic}")
        }
        Err(e) => {
            writeln!(out, "{}", config.filter.describe())?;
            print_status(out, &Status::failure(e))
        }
    }
}

fn run_topics<W: Write>(records: &[Record], config: &PipelineConfig, out: &mut W) -> io::Result<()> {
    let topics = match train(records, config) {
        Ok(trained) => report::topic_words(&trained.ranked, config.num_words),
        Err(e) => {
            tracing::warn!(error = %e, "topic model failed");
            Vec::new()
        }
    };
    serde_json::to_writer(&mut *out, &topics)?;
    writeln!(out)
}

fn run_full<W: Write>(records: &[Record], config: &PipelineConfig, out: &mut W) -> io::Result<()> {
    let status = match build_and_write_full(records, config) {
        Ok(()) => Status::success(format!("Topic model with {} tweets written to {}", records.len(), config.output.display())),
        Err(e) => {
            tracing::warn!(error = %e, "topic model failed");
            Status::failure(e)
        }
    };
    print_status(out, &status)
}

fn build_and_write_full(records: &[Record], config: &PipelineConfig) -> Result<(), PipelineError> {
    let trained = train(records, config)?;
    let report = FullReport::build(
        records,
        &trained.corpus,
        &trained.model,
        &trained.ranked,
        config.num_words,
        OffsetDateTime::now_utc(),
    );
    write_report(&config.output, &report)
}

pub fn write_report(path: &Path, report: &FullReport) -> Result<(), PipelineError> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir)?;
    }
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer(&mut writer, report)?;
    writer.flush()?;
    tracing::info!(path = %path.display(), topics = report.num_topics, tweets = report.tweets.len(), "wrote topic model");
    Ok(())
}

fn print_status<W: Write>(out: &mut W, status: &Status) -> io::Result<()> {
    serde_json::to_writer(&mut *out, status)?;
    writeln!(out)
}

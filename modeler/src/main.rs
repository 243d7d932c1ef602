use anyhow::Result;
use clap::Parser;
use modeler::cli::Args;
use modeler::{fetch_records, run};
use topic_core::RecordStore;
use tracing_subscriber::{fmt, EnvFilter};

fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let args = Args::parse();
    let default_filter = if args.verbose() { "info" } else { "warn" };
    fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)))
        .init();

    let store = RecordStore::open(&args.store, args.collection())?;
    let config = args.into_config()?;
    let records = fetch_records(&store, &config.filter)?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    run(&records, &config, &mut out)?;
    Ok(())
}

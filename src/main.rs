use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use movie_events_rs::{
    DataSet, KafkaBroker, LogBroker, Properties, RunSummary, Sources, publish, setup_logging,
};
use tracing::{error, info};

/// Publishes the MovieLens dataset to Kafka, one topic per record kind
#[derive(Parser, Debug)]
#[command(name = "movie-events-rs", version, about)]
struct Cli {
    /// Client properties: Kafka client settings plus `topic.movies`, `topic.ratings`, `topic.tags`, `topic.links`
    #[arg(short, long, default_value = "client.properties", env = "MOVIE_EVENTS_CONFIG")]
    config: PathBuf,

    /// Directory holding the dataset files
    #[arg(short, long, default_value = "./ml_20m")]
    data_dir: PathBuf,

    #[arg(long, value_enum, default_value_t = DataSet::Small)]
    dataset: DataSet,

    /// Log the messages instead of publishing them
    #[arg(long)]
    dry_run: bool,

    /// Upper bound for delivering outstanding messages when a topic is done
    #[arg(long, default_value_t = 30)]
    flush_timeout_secs: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    setup_logging()?;
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        error!("{e:#}");
        return Err(e);
    }
    Ok(())
}

async fn run(cli: Cli) -> Result<()> {
    let config = Properties::load(&cli.config)
        .with_context(|| format!("failed to load the client configuration from {}", cli.config.display()))?;
    let sources = Sources::in_dir(&cli.data_dir, cli.dataset);
    let flush_timeout = Duration::from_secs(cli.flush_timeout_secs);

    let summary = if cli.dry_run {
        publish(&config, &sources, LogBroker::connect, flush_timeout).await?
    } else {
        publish(&config, &sources, KafkaBroker::connect, flush_timeout).await?
    };

    log_summary(&summary);
    Ok(())
}

fn log_summary(summary: &RunSummary) {
    for kind in &summary.kinds {
        match kind.dispatch {
            Some(dispatched) => info!(
                read = kind.read.read,
                skipped = kind.read.skipped,
                delivered = dispatched.delivered,
                failed = dispatched.failed,
                "{}",
                kind.kind
            ),
            None => info!(skipped = kind.read.skipped, "{}: nothing published", kind.kind),
        }
    }
}

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, ValueEnum};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use relaycast_aggregator::dedup::TieBreak;
use relaycast_aggregator::{
    Aggregator, Exclusions, FsSink, HttpSource, RecordSource, SnapshotWriter, SourcePool,
    TrendingParams,
};
use relaycast_common::Config;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum TieBreakArg {
    LastSeen,
    HighestId,
}

impl From<TieBreakArg> for TieBreak {
    fn from(arg: TieBreakArg) -> Self {
        match arg {
            TieBreakArg::LastSeen => TieBreak::LastSeen,
            TieBreakArg::HighestId => TieBreak::HighestId,
        }
    }
}

/// Build snapshot artifacts from the configured sources.
#[derive(Debug, Parser)]
#[command(name = "relaycast-snapshot")]
struct Args {
    /// Output directory; overrides RELAYCAST_SNAPSHOT_DIR.
    #[arg(long)]
    out: Option<PathBuf>,

    /// How to resolve two versions of a record with equal timestamps.
    #[arg(long, value_enum, default_value = "last-seen")]
    tie_break: TieBreakArg,

    /// Trending list length; overrides RELAYCAST_TRENDING_LIMIT.
    #[arg(long)]
    limit: Option<usize>,

    /// Emit logs as JSON lines.
    #[arg(long, env = "RELAYCAST_JSON_LOGS")]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let filter = EnvFilter::from_default_env().add_directive("relaycast=info".parse()?);
    if args.json_logs {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    info!("Relaycast snapshot builder starting...");

    let config = Config::from_env()?;
    config.log_summary();

    let mut sources: Vec<Arc<dyn RecordSource>> = Vec::with_capacity(config.sources.len());
    for url in &config.sources {
        sources.push(Arc::new(HttpSource::new(url, config.source_timeout * 2)?));
    }
    let pool = SourcePool::new(sources, config.source_timeout)?;
    let aggregator = Aggregator::new(pool).with_tie_break(args.tie_break.into());

    let out_dir = args.out.unwrap_or_else(|| config.snapshot_dir.clone());
    let writer = SnapshotWriter::new(
        Arc::new(FsSink::new(&out_dir)),
        config.collection_cap,
        config.per_item_cap,
    );

    let mut params = TrendingParams::from_config(&config);
    if let Some(limit) = args.limit {
        params.limit = limit;
    }
    let exclusions = Exclusions::parse(&config.featured);

    let run = aggregator
        .build_snapshot(&writer, &exclusions, &params, chrono::Utc::now())
        .await;

    info!(out_dir = %out_dir.display(), "Snapshot run complete. {}", run.stats);

    if run.degraded {
        warn!(
            fallbacks = run.report.fallbacks(),
            lost = run.report.lost(),
            "Snapshot run degraded"
        );
    }
    run.report.ensure_persisted()?;

    Ok(())
}

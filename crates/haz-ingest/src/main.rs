//! haz-ingest binary.
//!
//! Reads `config.toml` (or the path given with `--config`), opens the SQLite
//! quake ledger, and applies quake events read as JSON lines from `--input`
//! or stdin.

use std::{
  path::{Path, PathBuf},
  sync::Arc,
};

use anyhow::Context as _;
use clap::Parser;
use haz_core::{
  gazetteer::Gazetteer,
  ingest::{Ingestor, sweep_ledger},
  quake::DefaultRules,
};
use haz_ingest::{IngestConfig, source::read_events, worker};
use haz_store_sqlite::SqliteLedger;
use tokio::{
  io::{AsyncBufRead, BufReader},
  sync::mpsc,
};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Quake ledger ingest driver")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,

  /// JSON-lines file of quake events. Reads stdin when omitted.
  #[arg(short, long)]
  input: Option<PathBuf>,

  /// Run one retention sweep and exit.
  #[arg(long)]
  sweep_only: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  let settings = config::Config::builder()
    .add_source(config::File::from(cli.config).required(false))
    .add_source(config::Environment::with_prefix("HAZ"))
    .build()
    .context("failed to read config file")?;

  let cfg: IngestConfig = settings
    .try_deserialize()
    .context("failed to deserialise IngestConfig")?;

  let home = cfg.home_region().context("invalid home_region")?;
  let retention = cfg.retention().context("invalid retention_days")?;

  let store_path = expand_tilde(&cfg.store_path);
  let ledger = SqliteLedger::open(&store_path, cfg.ledger_options())
    .await
    .with_context(|| format!("failed to open ledger at {store_path:?}"))?;

  if cli.sweep_only {
    let report = sweep_ledger(&ledger, retention).await;
    tracing::info!(
      history = ?report.history,
      api = ?report.api,
      "sweep complete"
    );
    return Ok(());
  }

  let gazetteer_path = expand_tilde(&cfg.gazetteer_path);
  let localities = tokio::fs::read_to_string(&gazetteer_path)
    .await
    .with_context(|| {
      format!("failed to read gazetteer at {gazetteer_path:?}")
    })?;
  let gazetteer =
    Gazetteer::from_json(&localities).context("invalid gazetteer")?;

  let ingestor = Arc::new(
    Ingestor::new(Arc::new(ledger), Arc::new(gazetteer), DefaultRules)
      .with_home_region(home)
      .with_retention(retention)
      .with_sweep_after_apply(cfg.sweep_after_apply),
  );

  let sweeper = cfg
    .sweep_interval()
    .map(|every| worker::spawn_sweeper(ingestor.clone(), every));

  let input: Box<dyn AsyncBufRead + Unpin + Send> = match &cli.input {
    Some(path) => {
      let file = tokio::fs::File::open(path)
        .await
        .with_context(|| format!("failed to open input {path:?}"))?;
      Box::new(BufReader::new(file))
    }
    None => Box::new(BufReader::new(tokio::io::stdin())),
  };

  let (tx, rx) = mpsc::channel(cfg.workers.max(1) * 2);
  let reader = tokio::spawn(read_events(input, tx));

  tracing::info!(workers = cfg.workers, store = ?store_path, "ingesting");
  let summary =
    worker::run(ingestor, rx, cfg.workers, cfg.retry_policy()).await;

  let read = reader
    .await
    .context("event reader panicked")?
    .context("failed to read events")?;

  if let Some(sweeper) = sweeper {
    sweeper.abort();
  }

  tracing::info!(
    read,
    applied = summary.applied,
    superseded = summary.superseded,
    failed = summary.failed,
    "ingest complete"
  );

  if summary.failed > 0 {
    anyhow::bail!("{} events failed", summary.failed);
  }
  Ok(())
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}

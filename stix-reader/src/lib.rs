pub mod config;
pub mod console;
pub mod ingest;
pub mod inputs;
pub mod logging;
pub mod paths;
pub mod runtime;
pub mod sink;

use anyhow::Context;
use config::Config;
use console::{CliArgs, ConsoleAction};
use sink::{BulkSink, DiscardSink, ElasticClient, NdjsonSink};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use stix_core::Correlator;

pub fn run(args: &[String]) -> anyhow::Result<()> {
  let cli = match console::parse_args(args)? {
    ConsoleAction::Help => {
      console::print_help();
      return Ok(());
    }
    ConsoleAction::Version => {
      println!("{}", env!("CARGO_PKG_VERSION"));
      return Ok(());
    }
    ConsoleAction::Ingest(cli) => cli,
  };

  runtime::set_dry_run(cli.dry_run);

  let base = paths::base_dir()?;
  let cfg = load_config(&cli, &base)?;

  if runtime::is_dry_run() {
    logging::init_stderr_only(&cfg.logging.level)?;
  } else {
    logging::init_file_and_stderr(
      &paths::logs_dir(&base),
      &cfg.logging.level,
      cfg.logging.retention_days,
    )?;
  }

  if cli.inputs.is_empty() {
    anyhow::bail!("no input files given; see --help");
  }
  let files = inputs::expand_inputs(&cli.inputs);
  tracing::info!(files = files.len(), "starting ingest");

  let mut sink = open_sink(&cli, &cfg)?;
  let stop = install_interrupt_handler()?;

  let mut correlator = Correlator::new(cfg.elasticsearch.index_name.as_str());
  let report = ingest::run_session(
    &files,
    &mut correlator,
    sink.as_mut(),
    cfg.ingest.chunk_size,
    &stop,
  )?;

  tracing::info!(
    sink = sink.name(),
    resolved = report.stats.resolved,
    dropped_relationships = report.stats.dropped_relationships,
    "ingest finished"
  );
  console::print_report(&report);
  Ok(())
}

fn load_config(cli: &CliArgs, base: &std::path::Path) -> anyhow::Result<Config> {
  let path = cli
    .config
    .clone()
    .unwrap_or_else(|| paths::config_path(base));

  let mut cfg = if runtime::is_dry_run() {
    config::load_or_default_readonly(&path)?
  } else {
    config::load_or_create_default(&path)?
  };

  config::apply_env_overrides(&mut cfg, |key| std::env::var(key).ok())?;
  cli.apply(&mut cfg);
  config::validate(&cfg).with_context(|| format!("invalid configuration ({})", path.display()))?;
  Ok(cfg)
}

fn open_sink(cli: &CliArgs, cfg: &Config) -> anyhow::Result<Box<dyn BulkSink>> {
  if runtime::is_dry_run() {
    tracing::info!("DRY-RUN: documents are counted, nothing is written");
    return Ok(Box::new(DiscardSink::default()));
  }

  if let Some(path) = &cli.ndjson {
    tracing::info!(path = %path.display(), "writing bulk requests to file");
    return Ok(Box::new(NdjsonSink::create(path)?));
  }

  if cfg.elasticsearch.host.is_none() {
    tracing::warn!("no Elasticsearch host configured; documents will be discarded");
    return Ok(Box::new(DiscardSink::default()));
  }

  let client = ElasticClient::connect(&cfg.elasticsearch)?;
  let info = client.info().context("contact Elasticsearch")?;
  tracing::info!(
    version = %info.version,
    cluster = info.cluster_name.as_deref().unwrap_or("-"),
    "connected to Elasticsearch"
  );
  client.ensure_index_template(
    &cfg.elasticsearch.index_name,
    &cfg.elasticsearch.template_composed_of,
  )?;
  Ok(Box::new(client))
}

/// The first Ctrl-C stops reading input and lets the flush finish; a second
/// one exits immediately.
fn install_interrupt_handler() -> anyhow::Result<Arc<AtomicBool>> {
  let stop = Arc::new(AtomicBool::new(false));
  let presses = AtomicUsize::new(0);

  let flag = stop.clone();
  ctrlc::set_handler(move || {
    if presses.fetch_add(1, Ordering::SeqCst) == 0 {
      eprintln!("stix-reader: interrupted, flushing pending indicators (Ctrl-C again to abort)");
      flag.store(true, Ordering::SeqCst);
    } else {
      std::process::exit(130);
    }
  })
  .context("install Ctrl-C handler")?;

  Ok(stop)
}

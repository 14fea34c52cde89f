use crate::config::Config;
use crate::ingest::IngestReport;
use std::path::PathBuf;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CliArgs {
  pub inputs: Vec<String>,
  pub es_host: Option<String>,
  pub es_username: Option<String>,
  pub es_password: Option<String>,
  pub index_name: Option<String>,
  pub chunk_size: Option<usize>,
  pub ndjson: Option<PathBuf>,
  pub config: Option<PathBuf>,
  pub dry_run: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleAction {
  Help,
  Version,
  Ingest(CliArgs),
}

impl CliArgs {
  /// Command-line values take precedence over file and environment.
  pub fn apply(&self, cfg: &mut Config) {
    if let Some(v) = &self.es_host {
      cfg.elasticsearch.host = Some(v.clone());
    }
    if let Some(v) = &self.es_username {
      cfg.elasticsearch.username = Some(v.clone());
    }
    if let Some(v) = &self.es_password {
      cfg.elasticsearch.password = Some(v.clone());
    }
    if let Some(v) = &self.index_name {
      cfg.elasticsearch.index_name = v.clone();
    }
    if let Some(v) = self.chunk_size {
      cfg.ingest.chunk_size = v;
    }
  }
}

/// Parses arguments, excluding the program name.
pub fn parse_args(args: &[String]) -> anyhow::Result<ConsoleAction> {
  let mut cli = CliArgs::default();
  let mut i = 0;
  let mut options_done = false;

  while i < args.len() {
    let arg = args[i].as_str();
    i += 1;

    if options_done || !arg.starts_with('-') || arg == "-" {
      cli.inputs.push(arg.to_string());
      continue;
    }

    let (flag, inline) = match arg.split_once('=') {
      Some((f, v)) if f.starts_with("--") => (f, Some(v.to_string())),
      _ => (arg, None),
    };

    let mut value = |name: &str| -> anyhow::Result<String> {
      if let Some(v) = inline.clone() {
        return Ok(v);
      }
      let v = args
        .get(i)
        .ok_or_else(|| anyhow::anyhow!("`{name}` expects a value"))?;
      i += 1;
      Ok(v.clone())
    };

    match flag {
      "-h" | "--help" => return Ok(ConsoleAction::Help),
      "--version" => return Ok(ConsoleAction::Version),
      "--" => options_done = true,
      "--dry-run" => cli.dry_run = true,
      "-e" | "--es-host" => cli.es_host = Some(value(flag)?),
      "-u" | "--es-username" => cli.es_username = Some(value(flag)?),
      "-p" | "--es-password" => cli.es_password = Some(value(flag)?),
      "--index-name" => cli.index_name = Some(value(flag)?),
      "--ndjson" => cli.ndjson = Some(PathBuf::from(value(flag)?)),
      "--config" => cli.config = Some(PathBuf::from(value(flag)?)),
      "--chunk-size" => {
        let raw = value(flag)?;
        let n = raw
          .parse::<usize>()
          .map_err(|_| anyhow::anyhow!("`--chunk-size` expects a positive integer, got `{raw}`"))?;
        cli.chunk_size = Some(n);
      }
      other => anyhow::bail!("unknown option `{other}`; see --help"),
    }
  }

  Ok(ConsoleAction::Ingest(cli))
}

pub fn print_help() {
  println!("stix-reader v{}", env!("CARGO_PKG_VERSION"));
  println!("Correlates STIX bundles and indexes one document per indicator.");
  println!();
  println!("Usage: stix-reader [OPTIONS] <FILE|GLOB|DIR>...");
  println!();
  println!("Options:");
  println!("  -e, --es-host <URL>        Elasticsearch URL (env STIX_ES_HOST)");
  println!("  -u, --es-username <USER>   basic auth user (env STIX_ES_USERNAME)");
  println!("  -p, --es-password <PASS>   basic auth password (env STIX_ES_PASSWORD)");
  println!("      --index-name <NAME>    destination index (default: indicators)");
  println!("      --chunk-size <N>       documents per bulk request (default: 500)");
  println!("      --ndjson <PATH>        write bulk requests to a file instead");
  println!("      --config <PATH>        config file (default: <base>/config.toml)");
  println!("      --dry-run              correlate and count only; write nothing");
  println!("  -h, --help");
  println!("      --version");
}

pub fn print_report(report: &IngestReport) {
  println!(
    "{} documents uploaded from {} file(s).",
    report.streamed.successful, report.files_read
  );
  for failure in &report.files_failed {
    println!("Skipped {}: {}", failure.path.display(), failure.reason);
  }
  if report.records_skipped > 0 {
    println!("{} undecodable objects skipped.", report.records_skipped);
  }
  if !report.missing_patterns.is_empty() {
    println!(
      "These pattern keys have no field mapping: {}.",
      report.missing_patterns.join(", ")
    );
  }
  println!(
    "After importing, {} indicators haven't been matched.",
    report.unmatched
  );
  println!("{} unmatched indicators uploaded.", report.flushed.successful);

  let rejected = report.streamed.errors.len() + report.flushed.errors.len();
  if rejected > 0 {
    println!("{rejected} documents were rejected by the destination.");
  }
  if report.interrupted {
    println!("Interrupted before all input was read.");
  }
}

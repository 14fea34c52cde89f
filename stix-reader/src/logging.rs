use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::{Duration, SystemTime};

use anyhow::Context;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

const LOG_FILE_PREFIX: &str = "stix-reader.log";

static FILE_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

pub fn init_file_and_stderr(
  log_dir: &Path,
  level: &str,
  retention_days: u64,
) -> anyhow::Result<()> {
  fs::create_dir_all(log_dir).with_context(|| format!("create {}", log_dir.display()))?;
  cleanup_old_logs(log_dir, retention_days)?;

  let file_appender = tracing_appender::rolling::daily(log_dir, LOG_FILE_PREFIX);
  let (file_writer, guard) = tracing_appender::non_blocking(file_appender);
  let _ = FILE_GUARD.set(guard);

  let file_layer = tracing_subscriber::fmt::layer()
    .with_ansi(false)
    .with_writer(file_writer)
    .with_target(true);

  tracing_subscriber::registry()
    .with(env_filter(level))
    .with(file_layer)
    .with(stderr_layer())
    .try_init()
    .context("install tracing subscriber")
}

pub fn init_stderr_only(level: &str) -> anyhow::Result<()> {
  tracing_subscriber::registry()
    .with(env_filter(level))
    .with(stderr_layer())
    .try_init()
    .context("install tracing subscriber")
}

fn env_filter(level: &str) -> tracing_subscriber::EnvFilter {
  tracing_subscriber::EnvFilter::try_new(level)
    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"))
}

fn stderr_layer<S>() -> impl tracing_subscriber::Layer<S>
where
  S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
{
  tracing_subscriber::fmt::layer()
    .with_ansi(false)
    .with_writer(std::io::stderr)
    .with_target(false)
}

fn cleanup_old_logs(log_dir: &Path, retention_days: u64) -> anyhow::Result<()> {
  if retention_days == 0 {
    return Ok(());
  }

  let cutoff = SystemTime::now()
    .checked_sub(Duration::from_secs(retention_days.saturating_mul(24 * 60 * 60)))
    .unwrap_or(SystemTime::UNIX_EPOCH);

  let entries = match fs::read_dir(log_dir) {
    Ok(e) => e,
    Err(_) => return Ok(()),
  };

  for entry in entries.flatten() {
    let path: PathBuf = entry.path();
    if !is_reader_log_file(&path) {
      continue;
    }

    let modified = match entry.metadata().and_then(|m| m.modified()) {
      Ok(t) => t,
      Err(_) => continue,
    };

    if modified < cutoff {
      let _ = fs::remove_file(&path);
    }
  }

  Ok(())
}

fn is_reader_log_file(path: &Path) -> bool {
  let name = match path.file_name().and_then(|n| n.to_str()) {
    Some(n) => n,
    None => return false,
  };

  name == LOG_FILE_PREFIX || name.starts_with("stix-reader.log.")
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn recognizes_rolled_log_files_only() {
    assert!(is_reader_log_file(Path::new("/tmp/logs/stix-reader.log")));
    assert!(is_reader_log_file(Path::new("/tmp/logs/stix-reader.log.2026-10-01")));
    assert!(!is_reader_log_file(Path::new("/tmp/logs/other.log")));
    assert!(!is_reader_log_file(Path::new("/tmp/logs/stix-reader.logx")));
  }

  #[test]
  fn cleanup_keeps_fresh_logs_and_foreign_files() {
    let dir = tempfile::tempdir().unwrap();
    let log = dir.path().join("stix-reader.log.2026-10-17");
    let other = dir.path().join("notes.txt");
    fs::write(&log, "x").unwrap();
    fs::write(&other, "y").unwrap();

    cleanup_old_logs(dir.path(), 14).unwrap();
    assert!(log.exists());
    assert!(other.exists());
  }

  #[test]
  fn cleanup_of_missing_dir_is_not_an_error() {
    let dir = tempfile::tempdir().unwrap();
    cleanup_old_logs(&dir.path().join("absent"), 14).unwrap();
  }
}

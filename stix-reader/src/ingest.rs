use crate::sink::{self, BulkOutcome, BulkSink};
use anyhow::Context;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use stix_core::bundle::{self, Bundle};
use stix_core::correlator::CorrelatorStats;
use stix_core::Correlator;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileFailure {
  pub path: PathBuf,
  pub reason: String,
}

#[derive(Debug, Clone, Default)]
pub struct IngestReport {
  pub files_read: usize,
  pub files_failed: Vec<FileFailure>,
  pub records_skipped: usize,
  /// Documents emitted while streaming, i.e. indicators resolved to a malware.
  pub streamed: BulkOutcome,
  /// Indicators still pending when input ended.
  pub unmatched: usize,
  pub flushed: BulkOutcome,
  pub missing_patterns: Vec<String>,
  pub interrupted: bool,
  pub stats: CorrelatorStats,
}

/// Feeds every file through `correlator` into `sink`, then flushes the
/// indicators that never matched a malware.
///
/// Unreadable or undecodable files are recorded and skipped. Raising `stop`
/// ends the streaming phase early; the flush still runs.
pub fn run_session(
  files: &[PathBuf],
  correlator: &mut Correlator,
  sink: &mut dyn BulkSink,
  chunk_size: usize,
  stop: &AtomicBool,
) -> anyhow::Result<IngestReport> {
  let mut report = IngestReport::default();

  for path in files {
    if stop.load(Ordering::SeqCst) {
      break;
    }

    let bundle = match read_bundle(path) {
      Ok(b) => b,
      Err(e) => {
        let reason = format!("{e:#}");
        tracing::warn!(file = %path.display(), error = %reason, "skipping unreadable bundle");
        report.files_failed.push(FileFailure {
          path: path.clone(),
          reason,
        });
        continue;
      }
    };

    report.files_read += 1;
    report.records_skipped += bundle.skipped;
    let objects = bundle.objects.len();

    let outcome = sink::bulk(sink, correlator.ingest(bundle.objects), chunk_size, Some(stop))
      .with_context(|| format!("ingest {}", path.display()))?;
    tracing::debug!(
      file = %path.display(),
      bundle = bundle.id.as_deref().unwrap_or("-"),
      objects,
      skipped = bundle.skipped,
      uploaded = outcome.successful,
      "bundle processed"
    );
    report.streamed.merge(outcome);
  }

  report.interrupted = stop.load(Ordering::SeqCst);
  if report.interrupted {
    tracing::warn!("ingest interrupted; flushing what has been read so far");
  }

  report.missing_patterns = correlator.missing_patterns().iter().cloned().collect();
  report.unmatched = correlator.pending_count();

  tracing::info!(
    uploaded = report.streamed.successful,
    files = report.files_read,
    "streaming phase complete"
  );
  if !report.missing_patterns.is_empty() {
    tracing::warn!(keys = ?report.missing_patterns, "pattern keys without a field mapping");
  }
  tracing::info!(
    unmatched = report.unmatched,
    "flushing indicators not matched to any malware"
  );

  report.flushed = sink::bulk(sink, correlator.flush_unmatched(), chunk_size, None)
    .context("flush unmatched indicators")?;
  sink.finish()?;
  report.stats = correlator.stats();

  tracing::info!(uploaded = report.flushed.successful, "flush complete");
  Ok(report)
}

fn read_bundle(path: &Path) -> anyhow::Result<Bundle> {
  let bytes = fs::read(path).with_context(|| format!("read {}", path.display()))?;
  bundle::decode_bundle(&bytes).with_context(|| format!("decode {}", path.display()))
}

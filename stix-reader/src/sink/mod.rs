use anyhow::Context;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use stix_core::OutputDocument;

pub mod elastic;
pub mod ndjson;

pub use elastic::ElasticClient;
pub use ndjson::NdjsonSink;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkItemError {
  pub id: String,
  pub status: u16,
  pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BulkOutcome {
  pub successful: u64,
  pub errors: Vec<BulkItemError>,
}

impl BulkOutcome {
  pub fn merge(&mut self, other: BulkOutcome) {
    self.successful += other.successful;
    self.errors.extend(other.errors);
  }
}

/// Destination for output documents, written one chunk at a time.
pub trait BulkSink {
  fn name(&self) -> &'static str;

  fn send_chunk(&mut self, docs: &[OutputDocument]) -> anyhow::Result<BulkOutcome>;

  fn finish(&mut self) -> anyhow::Result<()> {
    Ok(())
  }
}

/// Counts documents and drops them.
#[derive(Debug, Default)]
pub struct DiscardSink {
  pub received: u64,
}

impl BulkSink for DiscardSink {
  fn name(&self) -> &'static str {
    "discard"
  }

  fn send_chunk(&mut self, docs: &[OutputDocument]) -> anyhow::Result<BulkOutcome> {
    self.received += docs.len() as u64;
    Ok(BulkOutcome {
      successful: docs.len() as u64,
      errors: Vec::new(),
    })
  }
}

/// Pulls documents lazily and hands them to `sink` in chunks of `chunk_size`.
/// When `cancel` is raised, stops before pulling the next chunk.
pub fn bulk<I>(
  sink: &mut dyn BulkSink,
  docs: I,
  chunk_size: usize,
  cancel: Option<&AtomicBool>,
) -> anyhow::Result<BulkOutcome>
where
  I: IntoIterator<Item = OutputDocument>,
{
  let chunk_size = chunk_size.max(1);
  let mut docs = docs.into_iter();
  let mut total = BulkOutcome::default();
  let mut chunk = Vec::with_capacity(chunk_size);

  loop {
    if cancel.is_some_and(|c| c.load(Ordering::SeqCst)) {
      break;
    }

    chunk.clear();
    chunk.extend(docs.by_ref().take(chunk_size));
    if chunk.is_empty() {
      break;
    }

    let outcome = sink
      .send_chunk(&chunk)
      .with_context(|| format!("send {} documents to {}", chunk.len(), sink.name()))?;
    if !outcome.errors.is_empty() {
      tracing::warn!(
        sink = sink.name(),
        failed = outcome.errors.len(),
        first_reason = %outcome.errors[0].reason,
        "bulk chunk had rejected documents"
      );
    }
    total.merge(outcome);
  }

  Ok(total)
}

#[derive(Serialize)]
struct BulkAction<'a> {
  index: BulkActionMeta<'a>,
}

#[derive(Serialize)]
struct BulkActionMeta<'a> {
  #[serde(rename = "_index")]
  index: &'a str,
  #[serde(rename = "_id")]
  id: &'a str,
}

/// Elasticsearch `_bulk` request body: an `index` action line followed by the
/// document source, per document.
pub fn bulk_body(docs: &[OutputDocument]) -> anyhow::Result<Vec<u8>> {
  let mut out = Vec::new();
  for doc in docs {
    let action = BulkAction {
      index: BulkActionMeta {
        index: &doc.index_name,
        id: &doc.id,
      },
    };
    serde_json::to_writer(&mut out, &action).context("encode bulk action")?;
    out.push(b'\n');
    serde_json::to_writer(&mut out, &doc.source()).context("encode document source")?;
    out.push(b'\n');
  }
  Ok(out)
}

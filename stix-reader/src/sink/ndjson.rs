use super::{bulk_body, BulkOutcome, BulkSink};
use anyhow::Context;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;
use stix_core::OutputDocument;

/// Writes `_bulk` request bodies to a file, for loading with `curl` or
/// another tool later.
pub struct NdjsonSink<W: Write> {
  writer: W,
  written: u64,
}

impl NdjsonSink<BufWriter<File>> {
  pub fn create(path: &Path) -> anyhow::Result<Self> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
      fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
    }
    let file = File::create(path).with_context(|| format!("create {}", path.display()))?;
    Ok(Self::new(BufWriter::new(file)))
  }
}

impl<W: Write> NdjsonSink<W> {
  pub fn new(writer: W) -> Self {
    Self { writer, written: 0 }
  }

  pub fn written(&self) -> u64 {
    self.written
  }

  pub fn into_inner(self) -> W {
    self.writer
  }
}

impl<W: Write> BulkSink for NdjsonSink<W> {
  fn name(&self) -> &'static str {
    "ndjson"
  }

  fn send_chunk(&mut self, docs: &[OutputDocument]) -> anyhow::Result<BulkOutcome> {
    let body = bulk_body(docs)?;
    self.writer.write_all(&body).context("write bulk lines")?;
    self.written += docs.len() as u64;
    Ok(BulkOutcome {
      successful: docs.len() as u64,
      errors: Vec::new(),
    })
  }

  fn finish(&mut self) -> anyhow::Result<()> {
    self.writer.flush().context("flush bulk output")
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::sink::bulk;
  use crate::sink::tests::doc;

  #[test]
  fn writes_two_lines_per_document() {
    let mut sink = NdjsonSink::new(Vec::new());
    let outcome = bulk(&mut sink, vec![doc("i1", Some("m1")), doc("i2", None)], 1, None).unwrap();
    sink.finish().unwrap();

    assert_eq!(outcome.successful, 2);
    assert_eq!(sink.written(), 2);
    let text = String::from_utf8(sink.into_inner()).unwrap();
    assert_eq!(text.lines().count(), 4);
  }

  #[test]
  fn create_makes_parent_directories() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out").join("bulk.ndjson");

    let mut sink = NdjsonSink::create(&path).unwrap();
    sink.send_chunk(&[doc("i1", None)]).unwrap();
    sink.finish().unwrap();
    drop(sink);

    let text = fs::read_to_string(&path).unwrap();
    assert!(text.starts_with(r#"{"index":{"_index":"indicators","_id":"i1"}}"#));
  }
}

use crate::document::{self, OutputDocument};
use crate::pattern;
use crate::types::{Indicator, Malware, RelationshipRecord, StixRecord};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CorrelatorStats {
  pub malware: u64,
  pub indicators: u64,
  pub relationships: u64,
  pub ignored: u64,
  pub resolved: u64,
  pub dropped_relationships: u64,
}

#[derive(Debug)]
struct PendingIndicator {
  seq: u64,
  indicator: Indicator,
}

/// Single-pass `indicator --indicates--> malware` correlation.
///
/// A relationship only resolves when both its indicator and its malware were
/// consumed earlier in the session. State accumulates across `ingest` calls.
#[derive(Debug)]
pub struct Correlator {
  index_name: String,
  malwares: HashMap<String, Arc<Malware>>,
  pending: HashMap<String, PendingIndicator>,
  missing_patterns: BTreeSet<String>,
  next_seq: u64,
  stats: CorrelatorStats,
}

impl Correlator {
  pub fn new(index_name: impl Into<String>) -> Self {
    Self {
      index_name: index_name.into(),
      malwares: HashMap::new(),
      pending: HashMap::new(),
      missing_patterns: BTreeSet::new(),
      next_seq: 0,
      stats: CorrelatorStats::default(),
    }
  }

  /// Consumes `records` lazily, yielding a document each time a relationship
  /// resolves a pending indicator.
  pub fn ingest<I>(&mut self, records: I) -> Ingest<'_, I::IntoIter>
  where
    I: IntoIterator<Item = StixRecord>,
  {
    Ingest {
      correlator: self,
      records: records.into_iter(),
    }
  }

  /// Yields every still-pending indicator without a malware reference, oldest
  /// first, removing each one as it is yielded.
  pub fn flush_unmatched(&mut self) -> Flush<'_> {
    let mut order: Vec<(u64, String)> = self
      .pending
      .iter()
      .map(|(id, p)| (p.seq, id.clone()))
      .collect();
    order.sort_unstable();

    Flush {
      correlator: self,
      order: order.into_iter(),
    }
  }

  pub fn missing_patterns(&self) -> &BTreeSet<String> {
    &self.missing_patterns
  }

  pub fn pending_count(&self) -> usize {
    self.pending.len()
  }

  pub fn stats(&self) -> CorrelatorStats {
    self.stats
  }

  fn consume(&mut self, record: StixRecord) -> Option<OutputDocument> {
    match record {
      StixRecord::Malware(rec) => {
        self.stats.malware += 1;
        let malware = Malware::from(rec);
        self.malwares.insert(malware.id.clone(), Arc::new(malware));
        None
      }
      StixRecord::Indicator(rec) => {
        self.stats.indicators += 1;
        let patterns = pattern::translate(
          rec.pattern.as_deref().unwrap_or(""),
          &mut self.missing_patterns,
        );

        // A replaced pending entry keeps its flush position.
        let seq = match self.pending.get(&rec.id) {
          Some(existing) => existing.seq,
          None => {
            self.next_seq += 1;
            self.next_seq - 1
          }
        };
        self.pending.insert(
          rec.id.clone(),
          PendingIndicator {
            seq,
            indicator: Indicator {
              id: rec.id,
              patterns,
              indicates: None,
            },
          },
        );
        None
      }
      StixRecord::Relationship(rel) => {
        self.stats.relationships += 1;
        self.resolve(rel)
      }
      StixRecord::Other => {
        self.stats.ignored += 1;
        None
      }
    }
  }

  fn resolve(&mut self, rel: RelationshipRecord) -> Option<OutputDocument> {
    let malware = match self.malwares.get(&rel.target_id) {
      Some(m) if self.pending.contains_key(&rel.source_id) => Arc::clone(m),
      _ => {
        self.stats.dropped_relationships += 1;
        tracing::trace!(
          source = %rel.source_id,
          target = %rel.target_id,
          "relationship does not resolve"
        );
        return None;
      }
    };

    let mut indicator = self.pending.remove(&rel.source_id)?.indicator;
    indicator.indicates = Some(malware);
    self.stats.resolved += 1;
    Some(document::to_document(indicator, &self.index_name))
  }
}

/// Lazy document stream returned by [`Correlator::ingest`]. Dropping it early
/// leaves the unconsumed records unread and the correlator usable.
pub struct Ingest<'a, I> {
  correlator: &'a mut Correlator,
  records: I,
}

impl<I> Iterator for Ingest<'_, I>
where
  I: Iterator<Item = StixRecord>,
{
  type Item = OutputDocument;

  fn next(&mut self) -> Option<OutputDocument> {
    for record in self.records.by_ref() {
      if let Some(doc) = self.correlator.consume(record) {
        return Some(doc);
      }
    }
    None
  }
}

/// Lazy stream returned by [`Correlator::flush_unmatched`]. Indicators not yet
/// yielded when it is dropped stay pending.
pub struct Flush<'a> {
  correlator: &'a mut Correlator,
  order: std::vec::IntoIter<(u64, String)>,
}

impl Iterator for Flush<'_> {
  type Item = OutputDocument;

  fn next(&mut self) -> Option<OutputDocument> {
    for (_, id) in self.order.by_ref() {
      if let Some(pending) = self.correlator.pending.remove(&id) {
        return Some(document::to_document(
          pending.indicator,
          &self.correlator.index_name,
        ));
      }
    }
    None
  }

  fn size_hint(&self) -> (usize, Option<usize>) {
    (0, Some(self.order.len()))
  }
}

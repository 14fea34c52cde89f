mod engine;

pub use engine::{Correlator, CorrelatorStats, Flush, Ingest};

pub mod bundle;
pub mod correlator;
pub mod document;
pub mod pattern;
pub mod types;

pub use correlator::Correlator;
pub use document::OutputDocument;
pub use types::StixRecord;

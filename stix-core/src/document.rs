use crate::types::{Indicator, PatternFields};
use serde::Serialize;

/// A search-engine-ready indicator document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputDocument {
  pub id: String,
  pub index_name: String,
  pub fields: PatternFields,
  pub malware_id: Option<String>,
}

/// The `_source` body of a document.
#[derive(Debug, Serialize)]
pub struct DocumentSource<'a> {
  pub id: &'a str,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub indicates: Option<&'a str>,
  #[serde(flatten)]
  pub fields: &'a PatternFields,
}

#[derive(Serialize)]
struct Envelope<'a> {
  #[serde(rename = "_id")]
  id: &'a str,
  #[serde(rename = "_index")]
  index: &'a str,
  #[serde(rename = "_source")]
  source: DocumentSource<'a>,
}

impl OutputDocument {
  pub fn source(&self) -> DocumentSource<'_> {
    DocumentSource {
      id: &self.id,
      indicates: self.malware_id.as_deref(),
      fields: &self.fields,
    }
  }
}

impl Serialize for OutputDocument {
  fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    Envelope {
      id: &self.id,
      index: &self.index_name,
      source: self.source(),
    }
    .serialize(serializer)
  }
}

pub fn to_document(indicator: Indicator, index_name: &str) -> OutputDocument {
  OutputDocument {
    malware_id: indicator.indicates.as_ref().map(|m| m.id.clone()),
    id: indicator.id,
    index_name: index_name.to_string(),
    fields: indicator.patterns,
  }
}

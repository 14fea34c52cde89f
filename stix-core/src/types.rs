use serde::{Deserialize, Deserializer};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Canonical field name -> value, as produced by the pattern translator.
pub type PatternFields = BTreeMap<String, String>;

/// A decoded STIX object, reduced to the fields correlation needs.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StixRecord {
  Malware(MalwareRecord),
  Indicator(IndicatorRecord),
  Relationship(RelationshipRecord),
  #[serde(other)]
  Other,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MalwareRecord {
  pub id: String,
  #[serde(default)]
  pub name: Option<String>,
  // Informational only.
  #[serde(default)]
  pub created: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct IndicatorRecord {
  pub id: String,
  #[serde(default, deserialize_with = "string_or_none")]
  pub pattern: Option<String>,
}

/// Any non-string value decodes as `None`, so a mistyped field never drops
/// the whole record.
fn string_or_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
  D: Deserializer<'de>,
{
  let value = serde_json::Value::deserialize(deserializer)?;
  Ok(match value {
    serde_json::Value::String(s) => Some(s),
    _ => None,
  })
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RelationshipRecord {
  #[serde(rename = "source_ref")]
  pub source_id: String,
  #[serde(rename = "target_ref")]
  pub target_id: String,
}

impl StixRecord {
  pub fn malware(id: &str, name: Option<&str>) -> Self {
    Self::Malware(MalwareRecord {
      id: id.to_string(),
      name: name.map(str::to_string),
      created: None,
    })
  }

  pub fn indicator(id: &str, pattern: Option<&str>) -> Self {
    Self::Indicator(IndicatorRecord {
      id: id.to_string(),
      pattern: pattern.map(str::to_string),
    })
  }

  pub fn relationship(source_id: &str, target_id: &str) -> Self {
    Self::Relationship(RelationshipRecord {
      source_id: source_id.to_string(),
      target_id: target_id.to_string(),
    })
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Malware {
  pub id: String,
  pub name: Option<String>,
}

impl From<MalwareRecord> for Malware {
  fn from(rec: MalwareRecord) -> Self {
    Self {
      id: rec.id,
      name: rec.name,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Indicator {
  pub id: String,
  pub patterns: PatternFields,
  pub indicates: Option<Arc<Malware>>,
}

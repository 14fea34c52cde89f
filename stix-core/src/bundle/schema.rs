use serde::Deserialize;

/// Outer STIX 2.x bundle container. Objects are kept undecoded so that one bad
/// object does not fail the whole bundle.
#[derive(Debug, Clone, Deserialize)]
pub struct BundleContainer {
  #[serde(rename = "type", default)]
  pub kind: Option<String>,
  #[serde(default)]
  pub id: Option<String>,
  pub objects: Vec<serde_json::Value>,
}

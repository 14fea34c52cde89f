use crate::types::StixRecord;
use anyhow::Context;

pub mod schema;

use schema::BundleContainer;

#[derive(Debug, Clone, Default)]
pub struct Bundle {
  pub id: Option<String>,
  pub objects: Vec<StixRecord>,
  /// Objects that could not be decoded as their declared type.
  pub skipped: usize,
}

pub fn decode_bundle(bytes: &[u8]) -> anyhow::Result<Bundle> {
  let container: BundleContainer = serde_json::from_slice(bytes).context("parse bundle JSON")?;
  validate_container(&container)?;

  let mut objects = Vec::with_capacity(container.objects.len());
  let mut skipped = 0;
  for raw in container.objects {
    match serde_json::from_value::<StixRecord>(raw) {
      Ok(record) => objects.push(record),
      Err(e) => {
        skipped += 1;
        tracing::debug!(error = %e, "skipping undecodable STIX object");
      }
    }
  }

  Ok(Bundle {
    id: container.id,
    objects,
    skipped,
  })
}

fn validate_container(container: &BundleContainer) -> anyhow::Result<()> {
  if let Some(kind) = container.kind.as_deref() {
    if kind != "bundle" {
      anyhow::bail!("unexpected container type `{kind}`; expected `bundle`");
    }
  }
  Ok(())
}

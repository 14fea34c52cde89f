use crate::types::PatternFields;
use std::collections::BTreeSet;

/// STIX object paths understood in indicator patterns, mapped to the dotted
/// field names used in output documents.
pub const PATTERN_FIELDS: &[(&str, &str)] = &[
  ("url:value", "url.full"),
  ("domain-name:value", "url.domain"),
  ("file:hashes.MD5", "hash.md5"),
  ("file:hashes.'SHA-1'", "hash.sha1"),
  ("file:hashes.'SHA-256'", "hash.sha256"),
  ("ipv4-addr:value", "ip.address"),
  ("artifact:hashes.MD5", "hash.md5"),
  ("artifact:hashes.'SHA-1'", "hash.sha1"),
  ("artifact:hashes.'SHA-256'", "hash.sha256"),
  ("email-addr", "user.email"),
  // No dedicated ECS field for these.
  ("email-message", "labels.email-message"),
  // Full key path including the hive, e.g. HKLM\SOFTWARE\...
  ("windows-registry-key", "registry.path"),
];

pub fn canonical_field(raw_key: &str) -> Option<&'static str> {
  PATTERN_FIELDS
    .iter()
    .find(|(key, _)| *key == raw_key)
    .map(|(_, field)| *field)
}

/// Translates a pattern such as `[url:value='http://x' AND ipv4-addr:value='1.2.3.4']`
/// into canonical fields.
///
/// Tokens without `=` (conjunctions, stray brackets) are ignored. Keys with no
/// mapping are added to `missing` and dropped; the rest of the pattern is
/// still translated. A later duplicate key overwrites an earlier one.
pub fn translate(pattern: &str, missing: &mut BTreeSet<String>) -> PatternFields {
  let body = pattern.strip_prefix('[').unwrap_or(pattern);
  let body = body.strip_suffix(']').unwrap_or(body);

  let mut out = PatternFields::new();
  for token in body.split(' ') {
    let Some((raw_key, raw_value)) = token.split_once('=') else {
      continue;
    };

    let Some(field) = canonical_field(raw_key) else {
      if missing.insert(raw_key.to_string()) {
        tracing::debug!(key = raw_key, "no field mapping for pattern key");
      }
      continue;
    };

    out.insert(field.to_string(), strip_quotes(raw_value).to_string());
  }

  out
}

fn strip_quotes(value: &str) -> &str {
  let value = value.strip_prefix('\'').unwrap_or(value);
  value.strip_suffix('\'').unwrap_or(value)
}

#[cfg(test)]
mod tests {
  use super::*;

  fn fields(pairs: &[(&str, &str)]) -> PatternFields {
    pairs
      .iter()
      .map(|(k, v)| (k.to_string(), v.to_string()))
      .collect()
  }

  #[test]
  fn conjunction_of_url_and_md5() {
    let mut missing = BTreeSet::new();
    let out = translate(
      "[url:value='http://evil.test' AND file:hashes.MD5='d41d8cd98f00b204e9800998ecf8427e']",
      &mut missing,
    );
    assert_eq!(
      out,
      fields(&[
        ("url.full", "http://evil.test"),
        ("hash.md5", "d41d8cd98f00b204e9800998ecf8427e"),
      ])
    );
    assert!(missing.is_empty());
  }

  #[test]
  fn brackets_are_optional() {
    let mut missing = BTreeSet::new();
    assert_eq!(
      translate("ipv4-addr:value='1.2.3.4'", &mut missing),
      fields(&[("ip.address", "1.2.3.4")])
    );
    assert_eq!(
      translate("[ipv4-addr:value='1.2.3.4'", &mut missing),
      fields(&[("ip.address", "1.2.3.4")])
    );
  }

  #[test]
  fn quoted_hash_algorithm_keys_resolve() {
    let mut missing = BTreeSet::new();
    let out = translate(
      "[file:hashes.'SHA-256'='abc' OR artifact:hashes.'SHA-1'='def']",
      &mut missing,
    );
    assert_eq!(out, fields(&[("hash.sha256", "abc"), ("hash.sha1", "def")]));
  }

  #[test]
  fn unknown_keys_are_collected_and_skipped() {
    let mut missing = BTreeSet::new();
    let out = translate(
      "[process:name='evil.exe' AND domain-name:value='evil.test' AND process:name='x']",
      &mut missing,
    );
    assert_eq!(out, fields(&[("url.domain", "evil.test")]));
    assert_eq!(missing.len(), 1);
    assert!(missing.contains("process:name"));
  }

  #[test]
  fn value_keeps_embedded_equals_and_loses_one_quote_layer() {
    let mut missing = BTreeSet::new();
    let out = translate("[url:value=''http://x/?a=b'']", &mut missing);
    assert_eq!(out, fields(&[("url.full", "'http://x/?a=b'")]));
  }

  #[test]
  fn later_duplicate_key_wins() {
    let mut missing = BTreeSet::new();
    let out = translate(
      "[file:hashes.MD5='aaa' OR artifact:hashes.MD5='bbb']",
      &mut missing,
    );
    assert_eq!(out, fields(&[("hash.md5", "bbb")]));
  }

  #[test]
  fn empty_and_garbage_patterns_yield_nothing() {
    let mut missing = BTreeSet::new();
    assert!(translate("", &mut missing).is_empty());
    assert!(translate("[]", &mut missing).is_empty());
    assert!(translate("[  AND  OR ]", &mut missing).is_empty());
    assert!(missing.is_empty());
  }

  #[test]
  fn every_table_entry_is_reachable() {
    for (key, field) in PATTERN_FIELDS {
      assert_eq!(canonical_field(key), Some(*field));
    }
    assert_eq!(canonical_field("mac-addr:value"), None);
  }
}

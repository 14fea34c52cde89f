use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Default)]
pub struct Config {
  pub elasticsearch: ElasticConfig,
  pub ingest: IngestConfig,
  pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElasticConfig {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub host: Option<String>,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub username: Option<String>,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub password: Option<String>,

  #[serde(default = "default_index_name")]
  pub index_name: String,

  #[serde(default = "default_timeout_seconds")]
  pub timeout_seconds: u64,

  /// Component templates the index template is composed of.
  #[serde(default = "default_template_composed_of")]
  pub template_composed_of: Vec<String>,
}

impl Default for ElasticConfig {
  fn default() -> Self {
    Self {
      host: None,
      username: None,
      password: None,
      index_name: default_index_name(),
      timeout_seconds: default_timeout_seconds(),
      template_composed_of: default_template_composed_of(),
    }
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
  #[serde(default = "default_chunk_size")]
  pub chunk_size: usize,
}

impl Default for IngestConfig {
  fn default() -> Self {
    Self {
      chunk_size: default_chunk_size(),
    }
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
  #[serde(default = "default_log_level")]
  pub level: String,

  #[serde(default = "default_retention_days")]
  pub retention_days: u64,
}

impl Default for LoggingConfig {
  fn default() -> Self {
    Self {
      level: default_log_level(),
      retention_days: default_retention_days(),
    }
  }
}

fn default_index_name() -> String {
  "indicators".to_string()
}

fn default_timeout_seconds() -> u64 {
  30
}

fn default_template_composed_of() -> Vec<String> {
  vec!["logs-mappings".to_string(), "logs-settings".to_string()]
}

fn default_chunk_size() -> usize {
  500
}

fn default_log_level() -> String {
  "info".to_string()
}

fn default_retention_days() -> u64 {
  14
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ConfigFile {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub elasticsearch: Option<ElasticConfig>,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub ingest: Option<IngestConfig>,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub logging: Option<LoggingConfig>,
}

impl ConfigFile {
  fn normalize(self) -> Config {
    let mut cfg = Config::default();
    if let Some(es) = self.elasticsearch {
      cfg.elasticsearch = es;
    }
    if let Some(ingest) = self.ingest {
      cfg.ingest = ingest;
    }
    if let Some(logging) = self.logging {
      cfg.logging = logging;
    }
    cfg
  }

  fn needs_upgrade(&self) -> bool {
    self.elasticsearch.is_none() || self.ingest.is_none() || self.logging.is_none()
  }
}

pub fn load_or_create_default(path: &Path) -> anyhow::Result<Config> {
  load_impl(path, true)
}

pub fn load_or_default_readonly(path: &Path) -> anyhow::Result<Config> {
  load_impl(path, false)
}

fn load_impl(path: &Path, allow_writes: bool) -> anyhow::Result<Config> {
  let parent = path
    .parent()
    .ok_or_else(|| anyhow::anyhow!("config path has no parent: {}", path.display()))?;

  if !path.exists() {
    let cfg = Config::default();
    if allow_writes {
      fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
      write_atomic(path, &toml::to_string_pretty(&to_config_file(&cfg))?)?;
    }
    return Ok(cfg);
  }

  let raw = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
  match toml::from_str::<ConfigFile>(&raw) {
    Ok(file) => {
      let upgrade = file.needs_upgrade();
      let cfg = file.normalize();
      if allow_writes && upgrade {
        write_atomic(path, &toml::to_string_pretty(&to_config_file(&cfg))?)?;
        eprintln!(
          "stix-reader: filled in missing config sections in {}",
          path.display()
        );
      }
      Ok(cfg)
    }
    Err(e) => {
      let cfg = Config::default();
      if allow_writes {
        let backup = parent.join(format!("config.toml.bad-{}", unix_seconds()));
        fs::rename(path, &backup)
          .with_context(|| format!("back up invalid config {}", path.display()))?;
        write_atomic(path, &toml::to_string_pretty(&to_config_file(&cfg))?)?;
        eprintln!(
          "stix-reader: invalid config at {} (backed up to {}): {e}",
          path.display(),
          backup.display()
        );
      } else {
        eprintln!(
          "stix-reader: invalid config at {}; using defaults (--dry-run): {e}",
          path.display()
        );
      }
      Ok(cfg)
    }
  }
}

/// Applies `STIX_*` environment overrides on top of the file values.
pub fn apply_env_overrides<F>(cfg: &mut Config, lookup: F) -> anyhow::Result<()>
where
  F: Fn(&str) -> Option<String>,
{
  let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

  if let Some(v) = get("STIX_ES_HOST") {
    cfg.elasticsearch.host = Some(v);
  }
  if let Some(v) = get("STIX_ES_USERNAME") {
    cfg.elasticsearch.username = Some(v);
  }
  if let Some(v) = get("STIX_ES_PASSWORD") {
    cfg.elasticsearch.password = Some(v);
  }
  if let Some(v) = get("STIX_INDEX_NAME") {
    cfg.elasticsearch.index_name = v;
  }
  if let Some(v) = get("STIX_CHUNK_SIZE") {
    cfg.ingest.chunk_size = v
      .trim()
      .parse()
      .with_context(|| format!("STIX_CHUNK_SIZE must be a positive integer, got `{v}`"))?;
  }
  if let Some(v) = get("STIX_LOG_LEVEL") {
    cfg.logging.level = v;
  }
  Ok(())
}

pub fn validate(cfg: &Config) -> anyhow::Result<()> {
  let es = &cfg.elasticsearch;
  if es.index_name.trim().is_empty() {
    anyhow::bail!("elasticsearch.index_name must not be empty");
  }
  if es.timeout_seconds == 0 {
    anyhow::bail!("elasticsearch.timeout_seconds must be > 0");
  }
  if cfg.ingest.chunk_size == 0 {
    anyhow::bail!("ingest.chunk_size must be > 0");
  }
  if let Some(host) = es.host.as_deref() {
    crate::sink::elastic::validate_host(host)?;
  }
  if es.username.is_some() && es.password.is_none() {
    anyhow::bail!("a password is required with elasticsearch.username (set STIX_ES_PASSWORD)");
  }
  Ok(())
}

fn to_config_file(cfg: &Config) -> ConfigFile {
  ConfigFile {
    elasticsearch: Some(cfg.elasticsearch.clone()),
    ingest: Some(cfg.ingest.clone()),
    logging: Some(cfg.logging.clone()),
  }
}

fn write_atomic(path: &Path, contents: &str) -> anyhow::Result<()> {
  let parent = path
    .parent()
    .ok_or_else(|| anyhow::anyhow!("file path has no parent: {}", path.display()))?;
  let tmp = parent.join(format!(
    ".{}.tmp",
    path.file_name().unwrap_or_default().to_string_lossy()
  ));

  fs::write(&tmp, contents).with_context(|| format!("write {}", tmp.display()))?;
  fs::rename(&tmp, path).with_context(|| format!("rename {} -> {}", tmp.display(), path.display()))?;
  Ok(())
}

fn unix_seconds() -> u64 {
  std::time::SystemTime::now()
    .duration_since(std::time::UNIX_EPOCH)
    .unwrap_or_default()
    .as_secs()
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::collections::HashMap;

  #[test]
  fn missing_file_is_created_with_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("config.toml");

    let cfg = load_or_create_default(&path).unwrap();
    assert_eq!(cfg.elasticsearch.index_name, "indicators");
    assert_eq!(cfg.ingest.chunk_size, 500);
    assert!(path.exists());

    let again = load_or_create_default(&path).unwrap();
    assert_eq!(again.elasticsearch.template_composed_of, vec!["logs-mappings", "logs-settings"]);
    assert_eq!(again.elasticsearch.host, None);
  }

  #[test]
  fn readonly_load_never_writes() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    let cfg = load_or_default_readonly(&path).unwrap();
    assert_eq!(cfg.logging.level, "info");
    assert!(!path.exists());
  }

  #[test]
  fn partial_sections_keep_field_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(
      &path,
      "[elasticsearch]\nhost = \"https://es.example:9200\"\nindex_name = \"intel\"\n",
    )
    .unwrap();

    let cfg = load_or_default_readonly(&path).unwrap();
    assert_eq!(cfg.elasticsearch.host.as_deref(), Some("https://es.example:9200"));
    assert_eq!(cfg.elasticsearch.index_name, "intel");
    assert_eq!(cfg.elasticsearch.timeout_seconds, 30);
    assert_eq!(cfg.ingest.chunk_size, 500);
  }

  #[test]
  fn invalid_file_is_backed_up_and_replaced() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(&path, "this is = = not toml").unwrap();

    let cfg = load_or_create_default(&path).unwrap();
    assert_eq!(cfg.ingest.chunk_size, 500);

    let backups: Vec<_> = fs::read_dir(dir.path())
      .unwrap()
      .flatten()
      .filter(|e| e.file_name().to_string_lossy().starts_with("config.toml.bad-"))
      .collect();
    assert_eq!(backups.len(), 1);
    assert!(toml::from_str::<ConfigFile>(&fs::read_to_string(&path).unwrap()).is_ok());
  }

  #[test]
  fn env_overrides_file_values() {
    let env: HashMap<&str, &str> = [
      ("STIX_ES_HOST", "http://localhost:9200"),
      ("STIX_INDEX_NAME", "stix"),
      ("STIX_CHUNK_SIZE", "50"),
      ("STIX_ES_USERNAME", "  "),
    ]
    .into_iter()
    .collect();

    let mut cfg = Config::default();
    apply_env_overrides(&mut cfg, |k| env.get(k).map(|v| v.to_string())).unwrap();
    assert_eq!(cfg.elasticsearch.host.as_deref(), Some("http://localhost:9200"));
    assert_eq!(cfg.elasticsearch.index_name, "stix");
    assert_eq!(cfg.ingest.chunk_size, 50);
    assert_eq!(cfg.elasticsearch.username, None);
  }

  #[test]
  fn bad_env_chunk_size_is_an_error() {
    let mut cfg = Config::default();
    let res = apply_env_overrides(&mut cfg, |k| (k == "STIX_CHUNK_SIZE").then(|| "lots".to_string()));
    assert!(res.is_err());
  }

  #[test]
  fn validation_rejects_unusable_settings() {
    assert!(validate(&Config::default()).is_ok());

    let mut cfg = Config::default();
    cfg.ingest.chunk_size = 0;
    assert!(validate(&cfg).is_err());

    let mut cfg = Config::default();
    cfg.elasticsearch.host = Some("ftp://es.example".to_string());
    assert!(validate(&cfg).is_err());

    let mut cfg = Config::default();
    cfg.elasticsearch.username = Some("elastic".to_string());
    assert!(validate(&cfg).is_err());
    cfg.elasticsearch.password = Some("changeme".to_string());
    assert!(validate(&cfg).is_ok());
  }
}

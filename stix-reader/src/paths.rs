use std::path::{Path, PathBuf};

pub fn base_dir() -> anyhow::Result<PathBuf> {
  if let Some(home) = env_path("STIX_READER_HOME") {
    return Ok(home);
  }
  if let Some(xdg) = env_path("XDG_CONFIG_HOME") {
    return Ok(xdg.join("stix-reader"));
  }
  if let Some(home) = env_path("HOME") {
    return Ok(home.join(".config").join("stix-reader"));
  }
  anyhow::bail!("cannot determine a base directory; set STIX_READER_HOME")
}

pub fn config_path(base: &Path) -> PathBuf {
  base.join("config.toml")
}

pub fn logs_dir(base: &Path) -> PathBuf {
  base.join("logs")
}

fn env_path(key: &str) -> Option<PathBuf> {
  std::env::var_os(key)
    .filter(|v| !v.is_empty())
    .map(PathBuf::from)
}

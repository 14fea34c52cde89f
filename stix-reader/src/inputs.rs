use std::collections::HashSet;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Expands command-line inputs into bundle files.
///
/// Each input is a directory (walked recursively for `*.json`) or a glob
/// pattern; a plain file path is a glob that matches itself. Duplicates are
/// dropped, keeping the first occurrence.
pub fn expand_inputs(inputs: &[String]) -> Vec<PathBuf> {
  let mut seen: HashSet<PathBuf> = HashSet::new();
  let mut out = Vec::new();

  for input in inputs {
    let matched = expand_one(input);
    if matched.is_empty() {
      tracing::warn!(input = %input, "no input files matched");
    }
    for path in matched {
      if seen.insert(path.clone()) {
        out.push(path);
      }
    }
  }

  out
}

fn expand_one(input: &str) -> Vec<PathBuf> {
  let path = Path::new(input);
  if path.is_dir() {
    return walk_json_files(path);
  }

  let entries = match glob::glob(input) {
    Ok(entries) => entries,
    Err(e) => {
      tracing::warn!(input = %input, error = %e, "invalid input pattern");
      return Vec::new();
    }
  };

  let mut out = Vec::new();
  for entry in entries {
    match entry {
      Ok(p) if p.is_dir() => out.extend(walk_json_files(&p)),
      Ok(p) => out.push(p),
      Err(e) => tracing::warn!(error = %e, "unreadable path while expanding input"),
    }
  }
  out
}

fn walk_json_files(root: &Path) -> Vec<PathBuf> {
  WalkDir::new(root)
    .follow_links(false)
    .sort_by_file_name()
    .into_iter()
    .flatten()
    .filter(|e| e.file_type().is_file() && is_json_file(e.path()))
    .map(|e| e.into_path())
    .collect()
}

fn is_json_file(p: &Path) -> bool {
  p.extension()
    .and_then(|s| s.to_str())
    .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::fs;

  fn touch(path: &Path) {
    if let Some(parent) = path.parent() {
      fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, "{}").unwrap();
  }

  fn s(p: &Path) -> String {
    p.to_string_lossy().into_owned()
  }

  #[test]
  fn directories_are_walked_for_json() {
    let dir = tempfile::tempdir().unwrap();
    touch(&dir.path().join("b.json"));
    touch(&dir.path().join("a.JSON"));
    touch(&dir.path().join("notes.txt"));
    touch(&dir.path().join("sub").join("c.json"));

    let files = expand_inputs(&[s(dir.path())]);
    let names: Vec<_> = files
      .iter()
      .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
      .collect();
    assert_eq!(names, vec!["a.JSON", "b.json", "c.json"]);
  }

  #[test]
  fn globs_expand_and_duplicates_collapse() {
    let dir = tempfile::tempdir().unwrap();
    touch(&dir.path().join("feed-1.json"));
    touch(&dir.path().join("feed-2.json"));
    touch(&dir.path().join("other.json"));

    let pattern = s(&dir.path().join("feed-*.json"));
    let literal = s(&dir.path().join("feed-1.json"));
    let files = expand_inputs(&[pattern, literal]);

    assert_eq!(
      files,
      vec![dir.path().join("feed-1.json"), dir.path().join("feed-2.json")]
    );
  }

  #[test]
  fn unmatched_and_invalid_inputs_are_skipped() {
    let dir = tempfile::tempdir().unwrap();
    touch(&dir.path().join("x.json"));

    let files = expand_inputs(&[
      s(&dir.path().join("missing.json")),
      "[".to_string(),
      s(&dir.path().join("x.json")),
    ]);
    assert_eq!(files, vec![dir.path().join("x.json")]);
  }
}

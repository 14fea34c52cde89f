use std::sync::atomic::{AtomicBool, Ordering};

static DRY_RUN: AtomicBool = AtomicBool::new(false);

pub fn set_dry_run(enabled: bool) {
  DRY_RUN.store(enabled, Ordering::SeqCst);
}

/// In dry-run mode nothing is written: no config file, no log files, no
/// documents sent anywhere.
pub fn is_dry_run() -> bool {
  DRY_RUN.load(Ordering::SeqCst)
}

//! Interrupt handling and the scoped-cleanup slot.
//!
//! The publish operation creates a throwaway git repository whose `.git`
//! metadata must be removed on every exit path. Normal and error paths
//! are covered by a drop guard; `Drop` does not run across
//! `std::process::exit`, so the Ctrl+C handler drains the slot itself
//! before exiting.

use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

/// Path removed when the process is interrupted. Holds at most one
/// entry: a single run creates a single scoped repository.
static CLEANUP: LazyLock<Mutex<Option<PathBuf>>> = LazyLock::new(|| Mutex::new(None));

/// Setup the global Ctrl+C handler. Call once at program start
///
/// The handler removes any registered scoped-repository metadata and
/// terminates with the conventional interrupt status.
pub fn setup_shutdown_handler() -> anyhow::Result<()> {
    ctrlc::set_handler(|| {
        run_cleanup();
        std::process::exit(130);
    })
    .map_err(|e| anyhow::anyhow!("failed to set Ctrl+C handler: {}", e))
}

/// Remove any registered scoped-repository metadata. Removal of an
/// already-gone path is a no-op.
pub fn run_cleanup() {
    if let Some(path) = drain(&CLEANUP) {
        let _ = std::fs::remove_dir_all(path);
    }
}

/// Register a path for removal on interrupt. Replaces any previous
/// registration.
pub fn register_cleanup(path: &Path) {
    register_in(&CLEANUP, path);
}

/// Clear a registration, but only if it still belongs to `path`.
pub fn unregister_cleanup(path: &Path) {
    unregister_in(&CLEANUP, path);
}

fn register_in(slot: &Mutex<Option<PathBuf>>, path: &Path) {
    slot.lock().replace(path.to_path_buf());
}

// A replacement registered in the meantime must not be dropped by a
// stale owner, so the path has to match.
fn unregister_in(slot: &Mutex<Option<PathBuf>>, path: &Path) {
    let mut slot = slot.lock();
    if slot.as_deref() == Some(path) {
        *slot = None;
    }
}

fn drain(slot: &Mutex<Option<PathBuf>>) -> Option<PathBuf> {
    slot.lock().take()
}

// ============================================================================
// Tests
// ============================================================================

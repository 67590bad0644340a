//! Remote registration and push for the scoped repository.

use crate::{exec, log};
use anyhow::Result;
use std::path::Path;

/// Register a named remote on the repository rooted at `root`.
pub fn add_remote(root: &Path, name: &str, url: &str) -> Result<()> {
    exec!(root; "git"; "remote", "add", name, url)?;
    Ok(())
}

/// Force-push `local` to `branch` on the named remote, replacing
/// whatever history the remote branch had.
///
/// Runs under a PTY so credential prompts reach the terminal.
pub fn push(root: &Path, name: &str, local: &str, branch: &str) -> Result<()> {
    log!("git"; "pushing {local} to {name}/{branch} (force)");
    exec!(pty=true; root; "git"; "push", "--force", name, format!("{local}:{branch}"))?;
    Ok(())
}

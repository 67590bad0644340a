//! The publish pipeline: clean, rebuild, commit, force-push.
//!
//! A strictly sequential chain: cleaning prior artifacts, regenerating
//! the documentation, committing the output into a throwaway repository
//! and force-pushing it to the publishing branch. Any failing step
//! aborts the run with that step's exit status; the throwaway
//! repository's metadata is removed on every exit path.

use crate::utils::exec::FilterRule;
use crate::utils::git;
use crate::{debug, exec, log};
use anyhow::{Context, Result, anyhow, ensure};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

// ============================================================================
// Fixed configuration
// ============================================================================

/// Commit message for every publish.
pub const COMMIT_MESSAGE: &str = "Update documentation";

/// Remote the documentation branch lives on.
pub const REMOTE_NAME: &str = "origin";
pub const REMOTE_URL: &str = "git@github.com:docpub/docpub.git";

/// gix initializes the scoped repository with `main`; the published
/// history lands on `gh-pages`.
pub const LOCAL_BRANCH: &str = "main";
pub const REMOTE_BRANCH: &str = "gh-pages";

/// Routine cargo progress lines, not worth relaying.
static CARGO_FILTER: FilterRule = FilterRule::new(&[
    "Checking",
    "Compiling",
    "Documenting",
    "Downloaded",
    "Downloading",
    "Finished",
    "Generated",
    "Updating",
]);

// ============================================================================
// Pipeline
// ============================================================================

/// Run the whole pipeline from the resolved base directory.
pub fn run() -> Result<()> {
    which::which("git").context("`git` not found on PATH")?;
    which::which("cargo").context("`cargo` not found on PATH")?;

    let base = resolve_base_dir()?;
    debug!("docs"; "base dir: {}", base.display());

    clean_and_build(&base)?;
    publish(&base.join("target").join("doc"))
}

/// Directory containing the running executable, symlinks resolved.
/// Every subsequent step runs relative to it.
pub fn resolve_base_dir() -> Result<PathBuf> {
    let exe = env::current_exe().context("cannot locate the running executable")?;
    let exe = fs::canonicalize(&exe)
        .with_context(|| format!("cannot resolve `{}`", exe.display()))?;

    exe.parent()
        .map(Path::to_path_buf)
        .ok_or_else(|| anyhow!("executable has no parent directory"))
}

/// Remove prior doc artifacts, then regenerate the documentation.
/// Either invocation exiting non-zero aborts the run.
pub fn clean_and_build(base: &Path) -> Result<()> {
    log!("docs"; "cleaning previous build");
    exec!(base; "cargo"; "clean", "--doc")?;

    log!("docs"; "building documentation");
    exec!(filter=&CARGO_FILTER; base; "cargo"; "doc", "--no-deps")?;
    Ok(())
}

/// Commit the generated output into a scoped repository and force-push
/// it to the publishing branch.
///
/// The repository's `.git` metadata is guarded from the moment it is
/// created: it is removed when this function returns, on success and on
/// failure alike.
pub fn publish(output: &Path) -> Result<()> {
    ensure!(
        output.is_dir(),
        "output directory `{}` does not exist",
        output.display()
    );

    // Guard before init: repository setup has fallible steps after
    // `.git` is created, and those failures must not strand metadata
    let _guard = git::ScopedRepo::new(output);
    let repo = git::create_repo(output)?;

    git::commit_all(&repo, COMMIT_MESSAGE)?;
    git::add_remote(output, REMOTE_NAME, REMOTE_URL)?;
    git::push(output, REMOTE_NAME, LOCAL_BRANCH, REMOTE_BRANCH)?;

    log!("publish"; "done");
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================

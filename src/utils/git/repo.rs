use crate::{core, log};
use anyhow::{Result, anyhow, bail};
use gix::{Repository, ThreadSafeRepository, commit::NO_PARENT_IDS, index::State};
use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};

use super::tree::TreeBuilder;

/// Create a fresh git repository scoped to the given directory.
///
/// The repository exists for a single commit and push; it gets a fixed
/// identity instead of depending on the operator's global git config.
pub fn create_repo(root: &Path) -> Result<ThreadSafeRepository> {
    let repo = gix::init(root)?;

    let config = repo.path().join("config");
    let mut file = fs::OpenOptions::new().append(true).open(&config)?;
    writeln!(file, "[user]\n\tname = docpub\n\temail = docpub@localhost")?;

    // Reopen so the committer identity is picked up
    let repo = gix::open(root)?;
    Ok(repo.into_sync())
}

/// Stage everything in the repository's working directory and commit it
pub fn commit_all(repo: &ThreadSafeRepository, message: &str) -> Result<()> {
    if message.trim().is_empty() {
        bail!("Commit message cannot be empty");
    }

    let repo_local = repo.to_thread_local();
    let root = get_repo_root(&repo_local)?;

    // Build index and tree from working directory
    let mut index = State::new(repo_local.object_hash());
    let tree = TreeBuilder::new(repo).build_from_dir(root, &mut index)?;
    index.sort_entries();

    // Write index file
    let mut index_file = gix::index::File::from_state(index, repo_local.index_path());
    index_file.write(gix::index::write::Options::default())?;

    // Create commit
    let tree_id = repo_local.write_object(&tree)?;
    let parent_ids = get_parent_commit_ids(repo)?;
    let commit_id = repo_local.commit("HEAD", message, tree_id, parent_ids)?;

    log!("git"; "commit {commit_id}");
    Ok(())
}

/// Get repository root path
pub(crate) fn get_repo_root(repo: &Repository) -> Result<&Path> {
    repo.path()
        .parent()
        .ok_or_else(|| anyhow!("Invalid repository path"))
}

/// Get parent commit IDs (empty for the initial commit)
fn get_parent_commit_ids(repo: &ThreadSafeRepository) -> Result<Vec<gix::ObjectId>> {
    let repo_local = repo.to_thread_local();

    let parent_ids = repo_local
        .find_reference("refs/heads/main")
        .ok()
        .map(|refs| vec![refs.target().id().to_owned()])
        .unwrap_or_else(|| NO_PARENT_IDS.to_vec());

    Ok(parent_ids)
}

// ============================================================================
// Scoped cleanup
// ============================================================================

/// Drop guard for the scoped repository's `.git` metadata.
///
/// The metadata must not outlive the run, whether the publish succeeds
/// or aborts on a failed step. Normal exits are covered by `Drop`;
/// registration with the shutdown handler covers interrupts, where
/// destructors do not run.
pub struct ScopedRepo {
    git_dir: PathBuf,
}

impl ScopedRepo {
    /// Guard the repository rooted at `root`. Create this before the
    /// repository is initialized: setup itself can fail partway, and
    /// `Drop` tolerates `.git` never having been created.
    pub fn new(root: &Path) -> Self {
        let git_dir = root.join(".git");
        core::register_cleanup(&git_dir);
        Self { git_dir }
    }
}

impl Drop for ScopedRepo {
    // Remove before unregistering, so an interrupt landing in between
    // still finds the slot armed (removing twice is a no-op)
    fn drop(&mut self) {
        if self.git_dir.exists()
            && let Err(e) = fs::remove_dir_all(&self.git_dir)
        {
            log!("git"; "failed to remove {}: {}", self.git_dir.display(), e);
        }
        core::unregister_cleanup(&self.git_dir);
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_create_repo_creates_metadata() {
        let dir = tempfile::tempdir().unwrap();
        create_repo(dir.path()).unwrap();
        assert!(dir.path().join(".git").is_dir());
    }

    #[test]
    #[serial]
    fn test_scoped_repo_removes_metadata_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("index.html"), "<html></html>").unwrap();

        {
            let _guard = ScopedRepo::new(dir.path());
            create_repo(dir.path()).unwrap();
            assert!(dir.path().join(".git").is_dir());
        }

        // Metadata is gone, generated content stays
        assert!(!dir.path().join(".git").exists());
        assert!(dir.path().join("index.html").is_file());
    }

    #[test]
    #[serial]
    fn test_cleanup_fires_when_a_step_fails() {
        let dir = tempfile::tempdir().unwrap();

        let result = {
            let _guard = ScopedRepo::new(dir.path());
            let repo = create_repo(dir.path()).unwrap();
            commit_all(&repo, "   ")
        };

        assert!(result.is_err());
        assert!(!dir.path().join(".git").exists());
    }

    #[test]
    #[serial]
    fn test_guard_covers_failures_during_repo_setup() {
        // Setup can fail after `gix::init` has created `.git`; a guard
        // constructed first still removes the metadata
        let dir = tempfile::tempdir().unwrap();

        let result: Result<()> = (|| {
            let _guard = ScopedRepo::new(dir.path());
            let _repo = create_repo(dir.path())?;
            bail!("identity setup failed")
        })();

        assert!(result.is_err());
        assert!(!dir.path().join(".git").exists());
    }

    #[test]
    #[serial]
    fn test_interrupt_cleanup_removes_registered_metadata() {
        let dir = tempfile::tempdir().unwrap();

        let guard = ScopedRepo::new(dir.path());
        create_repo(dir.path()).unwrap();
        assert!(dir.path().join(".git").is_dir());

        // What the Ctrl+C handler runs before exiting
        crate::core::run_cleanup();
        assert!(!dir.path().join(".git").exists());

        // Dropping the guard after the handler already removed the
        // metadata is a no-op
        drop(guard);
        assert!(!dir.path().join(".git").exists());
    }

    #[test]
    fn test_commit_all_creates_main_ref() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("index.html"), "<html></html>").unwrap();
        fs::create_dir(dir.path().join("api")).unwrap();
        fs::write(dir.path().join("api").join("fn.run.html"), "run").unwrap();

        let repo = create_repo(dir.path()).unwrap();
        commit_all(&repo, "Update documentation").unwrap();

        let reopened = gix::open(dir.path()).unwrap();
        assert!(reopened.find_reference("refs/heads/main").is_ok());
    }

    #[test]
    fn test_commit_message_must_not_be_empty() {
        let dir = tempfile::tempdir().unwrap();
        let repo = create_repo(dir.path()).unwrap();
        assert!(commit_all(&repo, "").is_err());
    }
}

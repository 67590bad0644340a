//! Git operations for the documentation publisher.
//!
//! Repository init and the publish commit go through gitoxide; remote
//! registration and the force-push go through the `git` CLI, which
//! gitoxide cannot do yet.

mod remote;
mod repo;
mod tree;

pub use remote::{add_remote, push};
pub use repo::{ScopedRepo, commit_all, create_repo};

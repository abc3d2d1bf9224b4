//! Git checkouts
//!
//! Packages released from git (deal.II, Caliper) are cloned at a release tag
//! into the source root using the gix crate.

use gix::remote::fetch::Shallow;
use std::num::NonZeroU32;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Git operation errors
#[derive(Error, Debug)]
pub enum GitError {
    /// Failed to clone repository
    #[error("Failed to clone '{url}': {error}")]
    CloneFailed { url: String, error: String },

    /// Ref not found
    #[error("Ref '{reference}' not found in repository '{repo}'")]
    RefNotFound { repo: String, reference: String },

    /// IO error
    #[error("IO error for '{path}': {error}")]
    IoError { path: PathBuf, error: String },

    /// Invalid repository
    #[error("Invalid repository at '{path}': {error}")]
    InvalidRepository { path: PathBuf, error: String },
}

/// A finished checkout
#[derive(Debug, Clone)]
pub struct CloneResult {
    /// Working tree path
    pub path: PathBuf,
    /// Commit the working tree was built from
    pub commit_sha: String,
}

/// Clones repositories under a working directory
#[derive(Debug)]
pub struct GitOperations {
    work_dir: PathBuf,
}

impl GitOperations {
    pub fn new(work_dir: PathBuf) -> Self {
        Self { work_dir }
    }

    /// Shallow clone of `url` at `tag` into `<work_dir>/<dest_name>`
    ///
    /// The clone is made in `<dest_name>.part` and renamed once checked out.
    /// An existing directory of either name is replaced.
    pub fn clone_repo(&self, url: &str, tag: &str, dest_name: &str) -> Result<CloneResult, GitError> {
        let dest_path = self.work_dir.join(dest_name);
        let partial = self.work_dir.join(format!("{dest_name}.part"));

        for path in [&dest_path, &partial] {
            if path.exists() {
                std::fs::remove_dir_all(path).map_err(|e| io_error(path, &e))?;
            }
        }
        std::fs::create_dir_all(&self.work_dir).map_err(|e| io_error(&self.work_dir, &e))?;

        tracing::info!("Cloning {url} at {tag}");
        let repo = clone_internal(url, &partial, tag)?;

        let commit_sha = repo
            .head_id()
            .map_err(|e| GitError::InvalidRepository {
                path: partial.clone(),
                error: e.to_string(),
            })?
            .to_hex()
            .to_string();
        drop(repo);

        std::fs::rename(&partial, &dest_path).map_err(|e| io_error(&dest_path, &e))?;

        tracing::debug!("Checked out {dest_name} at {commit_sha}");
        Ok(CloneResult {
            path: dest_path,
            commit_sha,
        })
    }
}

fn io_error(path: &Path, error: &std::io::Error) -> GitError {
    GitError::IoError {
        path: path.to_path_buf(),
        error: error.to_string(),
    }
}

fn clone_internal(url: &str, dest: &Path, tag: &str) -> Result<gix::Repository, GitError> {
    let clone_failed = |e: &dyn std::fmt::Display| GitError::CloneFailed {
        url: url.to_string(),
        error: e.to_string(),
    };

    let mut prepare = gix::prepare_clone(url, dest)
        .map_err(|e| clone_failed(&e))?
        .with_ref_name(Some(tag))
        .map_err(|_| GitError::RefNotFound {
            repo: url.to_string(),
            reference: tag.to_string(),
        })?
        .with_shallow(Shallow::DepthAtRemote(NonZeroU32::MIN));

    let (mut checkout, _outcome) = prepare
        .fetch_then_checkout(gix::progress::Discard, &gix::interrupt::IS_INTERRUPTED)
        .map_err(|e| clone_failed(&e))?;

    let (repo, _outcome) = checkout
        .main_worktree(gix::progress::Discard, &gix::interrupt::IS_INTERRUPTED)
        .map_err(|e| clone_failed(&e))?;

    Ok(repo)
}

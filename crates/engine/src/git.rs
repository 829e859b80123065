//! Git commits of ledger files
//!
//! After each executed action the rewritten ledger is committed on its own,
//! so the recorded outcome survives a crash of the execution loop.

use actledger_core::{Committer, Error, Result};
use std::path::{Path, PathBuf};

/// Signature used when the repository has no `user.name`/`user.email`
const FALLBACK_NAME: &str = "actledger";
const FALLBACK_EMAIL: &str = "actledger@localhost";

/// Commit message for an executed action
#[must_use]
pub fn commit_message(action_id: &str) -> String {
    format!("Execute action {action_id} [skip ci]")
}

/// Committer backed by git2 (libgit2)
#[derive(Debug, Clone, Default)]
pub struct GitCommitter {
    repo_path: Option<PathBuf>,
}

impl GitCommitter {
    /// Discover the repository from each committed file
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Always commit into the repository at `repo_path`
    #[must_use]
    pub fn with_repository(repo_path: impl Into<PathBuf>) -> Self {
        Self {
            repo_path: Some(repo_path.into()),
        }
    }

    fn open(&self, path: &Path) -> std::result::Result<git2::Repository, git2::Error> {
        match &self.repo_path {
            Some(repo_path) => git2::Repository::open(repo_path),
            None => git2::Repository::discover(path.parent().unwrap_or(Path::new("."))),
        }
    }
}

impl Committer for GitCommitter {
    #[tracing::instrument(skip(self), fields(path = %path.display()))]
    fn commit(&self, path: &Path, message: &str) -> Result<bool> {
        let git_err = |e: git2::Error| Error::Commit {
            path: path.to_path_buf(),
            message: format!("Git error: {}", e.message()),
        };

        let repo = self.open(path).map_err(git_err)?;
        let workdir = repo.workdir().ok_or_else(|| Error::Commit {
            path: path.to_path_buf(),
            message: "repository has no working tree".to_string(),
        })?;

        let absolute = std::path::absolute(path)?;
        let workdir = workdir.canonicalize().unwrap_or_else(|_| workdir.to_path_buf());
        let absolute = absolute
            .parent()
            .and_then(|parent| parent.canonicalize().ok())
            .zip(absolute.file_name())
            .map_or(absolute.clone(), |(parent, name)| parent.join(name));
        let relative = absolute.strip_prefix(&workdir).map_err(|_| Error::Commit {
            path: path.to_path_buf(),
            message: format!("file is outside the working tree {}", workdir.display()),
        })?;

        let mut index = repo.index().map_err(git_err)?;
        index.add_path(relative).map_err(git_err)?;
        index.write().map_err(git_err)?;
        let tree_id = index.write_tree().map_err(git_err)?;

        // An unborn HEAD has no parent and always gets a commit
        let parent = match repo.head() {
            Ok(head) => Some(head.peel_to_commit().map_err(git_err)?),
            Err(e) if e.code() == git2::ErrorCode::UnbornBranch => None,
            Err(e) => return Err(git_err(e)),
        };

        if let Some(parent) = &parent
            && parent.tree_id() == tree_id
        {
            tracing::debug!("Nothing to commit");
            return Ok(false);
        }

        let signature = repo
            .signature()
            .or_else(|_| git2::Signature::now(FALLBACK_NAME, FALLBACK_EMAIL))
            .map_err(git_err)?;
        let tree = repo.find_tree(tree_id).map_err(git_err)?;
        let parents: Vec<&git2::Commit> = parent.iter().collect();

        let oid = repo
            .commit(
                Some("HEAD"),
                &signature,
                &signature,
                message,
                &tree,
                &parents,
            )
            .map_err(git_err)?;

        tracing::info!(commit = %oid, "Committed ledger");
        Ok(true)
    }
}

/// Find git working tree root starting from the given path
///
/// Searches upward from the given path to find a .git directory or file.
/// Returns the working tree root path if found, None otherwise.
#[must_use]
pub fn find_working_tree(start_path: &Path) -> Option<PathBuf> {
    git2::Repository::discover(start_path)
        .ok()
        .and_then(|repo| repo.workdir().map(Path::to_path_buf))
}

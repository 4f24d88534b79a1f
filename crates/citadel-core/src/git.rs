//! Local git metadata.
//!
//! Used only to default the repository and commit of an operation when the
//! caller did not give them. We shell out to the `git` CLI so the user's own
//! configuration (remotes, `insteadOf` rewrites, worktrees) applies.
//!
//! Lookups never fail: anything that goes wrong yields an empty string, and
//! [`crate::operations::Revision::resolve`] turns that into a config error.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

/// Source of repository metadata.
pub trait VcsMetadata {
    /// Commit checked out in the working copy, or `""`.
    fn current_commit(&self) -> String;

    /// URL of the named remote, or `""`.
    fn remote_url(&self, remote: &str) -> String;
}

/// Error type for git operations.
#[derive(Debug)]
pub enum GitError {
    /// Command failed to execute (e.g., git not found)
    CommandFailed(std::io::Error),

    /// Git command returned non-zero exit code
    GitFailed {
        /// The stderr output from git
        stderr: String,
    },
}

impl std::fmt::Display for GitError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GitError::CommandFailed(e) => write!(f, "Failed to run git: {e}"),
            GitError::GitFailed { stderr } => write!(f, "Git error: {stderr}"),
        }
    }
}

impl std::error::Error for GitError {}

impl From<std::io::Error> for GitError {
    fn from(e: std::io::Error) -> Self {
        GitError::CommandFailed(e)
    }
}

/// Run a git command and return its trimmed stdout if it succeeded.
pub fn run_git_success(args: &[&str], cwd: &Path) -> Result<String, GitError> {
    let output = Command::new("git")
        .args(args)
        .current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()?;

    if output.status.success() {
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    } else {
        Err(GitError::GitFailed {
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }
}

/// [`VcsMetadata`] backed by the `git` CLI, run in `workdir`.
#[derive(Debug, Clone)]
pub struct GitCli {
    workdir: PathBuf,
}

impl GitCli {
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        Self {
            workdir: workdir.into(),
        }
    }

    /// Use the process's current directory.
    pub fn current_dir() -> Self {
        Self::new(std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")))
    }

    fn lookup(&self, args: &[&str]) -> String {
        match run_git_success(args, &self.workdir) {
            Ok(out) => out,
            Err(e) => {
                log::debug!("git {} failed in {}: {}", args.join(" "), self.workdir.display(), e);
                String::new()
            }
        }
    }
}

impl VcsMetadata for GitCli {
    fn current_commit(&self) -> String {
        self.lookup(&["rev-parse", "HEAD"])
    }

    fn remote_url(&self, remote: &str) -> String {
        self.lookup(&["remote", "get-url", remote])
    }
}

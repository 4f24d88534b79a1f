//! Streamed operations: request payloads and the events they produce.
//!
//! # Operations
//!
//! | Operation | Path       | Event             | Consumption                  |
//! |-----------|------------|-------------------|------------------------------|
//! | build     | `/build`   | [`NarrationEvent`]| stop on a fatal error        |
//! | deploy    | `/deploy`  | [`DeployEvent`]   | narration + per-container    |
//! | remove    | `/remove`  | [`RemoveResult`]  | every id, unconditionally    |
//! | upgrade   | `/upgrade` | [`UpgradeResult`] | every id, unconditionally    |
//! | log       | `/log`     | [`LogLine`]       | stop on a fatal error        |
//!
//! Request types are plain data. Building one never touches the network;
//! sending it is [`crate::Client::stream`]'s job.

pub mod build;
pub mod deploy;
pub mod event;
pub mod logs;
pub mod remove;
pub mod severity;
pub mod upgrade;

use serde::Serialize;

use crate::error::ConfigError;
use crate::git::VcsMetadata;

pub use build::BuildRequest;
pub use deploy::{parse_networks, DeployEvent, DeployRequest, DeployResult, DEFAULT_MEMORY};
pub use event::{BatchOutcome, NarrationEvent, Severity, StreamEvent};
pub use logs::{LogLine, LogRequest};
pub use remove::{RemoveRequest, RemoveResult};
pub use severity::{FatalPolicy, DEFAULT_FATAL_PATTERN};
pub use upgrade::{UpgradeRequest, UpgradeResult};

/// A request whose response is a stream of `Self::Event`.
pub trait Operation: Serialize {
    type Event: StreamEvent;

    /// Short name, used in logs and wire-log file names.
    const NAME: &'static str;

    /// Path below the API base.
    const PATH: &'static str;
}

// ============================================================================
// ENTITY IDS
// ============================================================================

/// Container ids sent with remove/upgrade.
///
/// Built from a single id or any collection of ids; either way the wire
/// payload is a list. Order and duplicates are preserved. Ids are opaque and
/// never inspected.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct EntityIds(Vec<String>);

impl EntityIds {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    /// Reject an empty id set.
    pub(crate) fn require_non_empty(self) -> Result<Self, ConfigError> {
        if self.is_empty() {
            Err(ConfigError::NoIds)
        } else {
            Ok(self)
        }
    }
}

impl From<&str> for EntityIds {
    fn from(id: &str) -> Self {
        Self(vec![id.to_string()])
    }
}

impl From<String> for EntityIds {
    fn from(id: String) -> Self {
        Self(vec![id])
    }
}

impl<S: Into<String>> From<Vec<S>> for EntityIds {
    fn from(ids: Vec<S>) -> Self {
        ids.into_iter().collect()
    }
}

impl<S: Into<String>, const N: usize> From<[S; N]> for EntityIds {
    fn from(ids: [S; N]) -> Self {
        ids.into_iter().collect()
    }
}

impl<S: AsRef<str>> From<&[S]> for EntityIds {
    fn from(ids: &[S]) -> Self {
        Self(ids.iter().map(|id| id.as_ref().to_string()).collect())
    }
}

impl<S: Into<String>> FromIterator<S> for EntityIds {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

// ============================================================================
// REVISION
// ============================================================================

/// Repository and commit an operation is about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Revision {
    pub repo: String,
    pub sha: String,
}

impl Revision {
    pub fn new(repo: impl Into<String>, sha: impl Into<String>) -> Self {
        Self {
            repo: repo.into(),
            sha: sha.into(),
        }
    }

    /// Fill unset `repo`/`sha` from local VCS metadata.
    ///
    /// Empty strings count as unset. `remote` names the git remote whose URL
    /// becomes the repository. The VCS is only asked for what is missing.
    pub fn resolve(
        repo: Option<&str>,
        sha: Option<&str>,
        vcs: &dyn VcsMetadata,
        remote: &str,
    ) -> Result<Self, ConfigError> {
        let repo = match repo.filter(|r| !r.is_empty()) {
            Some(repo) => repo.to_string(),
            None => vcs.remote_url(remote),
        };
        if repo.is_empty() {
            return Err(ConfigError::MissingRepo);
        }

        let sha = match sha.filter(|s| !s.is_empty()) {
            Some(sha) => sha.to_string(),
            None => vcs.current_commit(),
        };
        if sha.is_empty() {
            return Err(ConfigError::MissingSha);
        }

        Ok(Self { repo, sha })
    }
}

// ============================================================================
// BATCH TALLY
// ============================================================================

/// Running count of per-entity outcomes.
///
/// This only counts. Whether a batch with some failures "succeeded" is the
/// caller's call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchTally {
    pub succeeded: usize,
    pub failed: usize,
    pub failed_ids: Vec<String>,
}

impl BatchTally {
    pub fn record<E: BatchOutcome>(&mut self, outcome: &E) {
        if outcome.succeeded() {
            self.succeeded += 1;
        } else {
            self.failed += 1;
            if let Some(id) = outcome.entity_id() {
                self.failed_ids.push(id.to_string());
            }
        }
    }

    pub fn total(&self) -> usize {
        self.succeeded + self.failed
    }
}

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::errors::{InvalidRepoRef, Result};

/// Quota snapshot for one credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitInfo {
    /// Maximum requests allowed per period.
    pub limit: u32,
    /// Remaining requests in current period.
    pub remaining: u32,
    /// When the quota resets.
    pub reset_at: DateTime<Utc>,
}

impl RateLimitInfo {
    /// Requests already spent in the current period.
    pub fn used(&self) -> u32 {
        self.limit.saturating_sub(self.remaining)
    }
}

/// A validated `owner/name` repository reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RepoRef {
    owner: String,
    name: String,
}

impl RepoRef {
    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

fn valid_segment(segment: &str) -> bool {
    !segment.is_empty()
        && segment != "."
        && segment != ".."
        && segment
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

impl FromStr for RepoRef {
    type Err = InvalidRepoRef;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let trimmed = s.trim();
        match trimmed.split_once('/') {
            Some((owner, name)) if valid_segment(owner) && valid_segment(name) => Ok(Self {
                owner: owner.to_string(),
                name: name.to_string(),
            }),
            _ => Err(InvalidRepoRef(s.to_string())),
        }
    }
}

impl fmt::Display for RepoRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// A branch as listed by the code host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteBranch {
    pub name: String,
    /// Sha of the branch head, when reported.
    pub head_sha: Option<String>,
}

/// Git-level author of a commit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitAuthor {
    pub name: Option<String>,
    pub email: Option<String>,
    pub date: Option<DateTime<Utc>>,
}

/// The inner commit object: message and git author.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitDetail {
    pub message: String,
    pub author: Option<CommitAuthor>,
}

/// A commit as returned by a branch listing, without diff statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShallowCommit {
    pub sha: String,
    /// Login of the account the host associated with the commit, if any.
    pub author_login: Option<String>,
    /// Missing on malformed entries; such commits are skipped.
    pub commit: Option<CommitDetail>,
}

/// Per-file change of a commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileChange {
    pub filename: String,
    pub status: String,
    pub additions: i64,
    pub deletions: i64,
    pub patch: Option<String>,
}

/// Line totals of a commit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiffStats {
    pub additions: i64,
    pub deletions: i64,
}

/// A commit fetched individually, with diff statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FullCommit {
    pub summary: ShallowCommit,
    pub stats: Option<DiffStats>,
    pub files: Vec<FileChange>,
}

impl FullCommit {
    /// Line totals, falling back to the per-file sums when the host omits them.
    pub fn totals(&self) -> DiffStats {
        self.stats.unwrap_or_else(|| DiffStats {
            additions: self.files.iter().map(|f| f.additions).sum(),
            deletions: self.files.iter().map(|f| f.deletions).sum(),
        })
    }
}

/// Read-only view of a code host, authenticated as one user.
///
/// Implementations handle pagination internally and map every failure to
/// [`RepositoryUnavailable`](super::RepositoryUnavailable).
#[async_trait]
pub trait RepositoryClient: Send + Sync {
    /// All branches of a repository, in the host's order.
    async fn list_branches(&self, repo: &RepoRef) -> Result<Vec<RemoteBranch>>;

    /// The branch the host checks out by default, if it reports one.
    async fn default_branch(&self, _repo: &RepoRef) -> Result<Option<String>> {
        Ok(None)
    }

    /// Commits reachable from a branch, newest first, without diff stats.
    async fn list_commits(&self, repo: &RepoRef, branch: &str) -> Result<Vec<ShallowCommit>>;

    /// One commit with its diff statistics and changed files.
    async fn get_commit(&self, repo: &RepoRef, sha: &str) -> Result<FullCommit>;

    /// Current quota of the credential.
    async fn get_rate_limit(&self) -> Result<RateLimitInfo>;
}

/// Builds a [`RepositoryClient`] for a credential.
pub trait ClientFactory: Send + Sync {
    fn client_for(&self, token: &str) -> Result<Arc<dyn RepositoryClient>>;
}

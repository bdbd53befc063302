use std::fmt;

use thiserror::Error;

/// Why a repository could not be read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnavailableKind {
    /// Network failure, timeout or unexpected server error.
    Transport,
    /// Missing, invalid or under-privileged credential.
    Auth,
    /// The repository, branch or commit does not exist.
    NotFound,
    /// The API refused the call because the quota is spent.
    RateLimited,
    /// The response could not be decoded.
    Decode,
}

impl fmt::Display for UnavailableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Transport => "transport",
            Self::Auth => "auth",
            Self::NotFound => "not found",
            Self::RateLimited => "rate limited",
            Self::Decode => "decode",
        })
    }
}

/// Any failure talking to the code host.
///
/// Callers recover from this locally: ingestion treats it as "no commits
/// available", enrichment stops the current batch.
#[derive(Debug, Clone, Error)]
#[error("repository {repo} unavailable ({kind}): {message}")]
pub struct RepositoryUnavailable {
    /// `owner/name`, or the API resource for account-level calls.
    pub repo: String,
    pub kind: UnavailableKind,
    pub message: String,
}

impl RepositoryUnavailable {
    pub fn new(kind: UnavailableKind, repo: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            repo: repo.into(),
            kind,
            message: message.into(),
        }
    }

    /// Create a transport error.
    #[inline]
    pub fn transport(repo: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(UnavailableKind::Transport, repo, message)
    }

    /// Create a not found error.
    #[inline]
    pub fn not_found(repo: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(UnavailableKind::NotFound, repo, message)
    }

    /// Create a rate limit error.
    #[inline]
    pub fn rate_limited(repo: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(UnavailableKind::RateLimited, repo, message)
    }

    /// Check if this error is a rate limit error.
    #[inline]
    pub fn is_rate_limited(&self) -> bool {
        self.kind == UnavailableKind::RateLimited
    }
}

/// A repository reference that is not of the form `owner/name`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid repository reference {0:?}, expected owner/name")]
pub struct InvalidRepoRef(pub String);

/// Extract a short error message suitable for display.
///
/// Takes the first line of an error message, which is useful for errors
/// that include backtraces or multi-line details.
#[inline]
pub fn short_error_message(e: &impl std::error::Error) -> String {
    let full = e.to_string();
    full.lines().next().unwrap_or(&full).to_string()
}

/// Result type for code host operations.
pub type Result<T> = std::result::Result<T, RepositoryUnavailable>;

//! GitHub API error types.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::platform::{RepositoryUnavailable, UnavailableKind};

/// Errors that can occur when interacting with the GitHub API.
#[derive(Debug, Error)]
pub enum GitHubError {
    #[error("GitHub API error: {0}")]
    Api(#[from] octocrab::Error),

    #[error("Rate limit exceeded. Resets at {reset_at}")]
    RateLimited { reset_at: DateTime<Utc> },

    #[error("Invalid commit sha: {0}")]
    InvalidSha(String),
}

/// Check if an error indicates a rate limit (429, or 403 mentioning the limit).
pub fn is_rate_limit_error(e: &octocrab::Error) -> bool {
    match e {
        octocrab::Error::GitHub { source, .. } => {
            let status = source.status_code.as_u16();
            status == 429
                || (status == 403 && source.message.to_lowercase().contains("rate limit"))
        }
        _ => false,
    }
}

/// Classify an error for callers of the platform-agnostic client.
pub fn unavailable_kind(e: &GitHubError) -> UnavailableKind {
    match e {
        GitHubError::RateLimited { .. } => UnavailableKind::RateLimited,
        GitHubError::InvalidSha(_) => UnavailableKind::NotFound,
        GitHubError::Api(err) if is_rate_limit_error(err) => UnavailableKind::RateLimited,
        GitHubError::Api(octocrab::Error::GitHub { source, .. }) => {
            match source.status_code.as_u16() {
                401 | 403 => UnavailableKind::Auth,
                // 409 is what GitHub answers for an empty repository.
                404 | 409 | 422 => UnavailableKind::NotFound,
                _ => UnavailableKind::Transport,
            }
        }
        GitHubError::Api(octocrab::Error::Serde { .. } | octocrab::Error::Json { .. }) => {
            UnavailableKind::Decode
        }
        GitHubError::Api(_) => UnavailableKind::Transport,
    }
}

impl GitHubError {
    /// Convert into the platform error for `repo`.
    pub fn into_unavailable(self, repo: impl Into<String>) -> RepositoryUnavailable {
        let kind = unavailable_kind(&self);
        RepositoryUnavailable::new(kind, repo, crate::platform::short_error_message(&self))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limited_maps_to_rate_limited_kind() {
        let err = GitHubError::RateLimited {
            reset_at: Utc::now(),
        };
        assert_eq!(unavailable_kind(&err), UnavailableKind::RateLimited);

        let unavailable = err.into_unavailable("acme/app");
        assert!(unavailable.is_rate_limited());
        assert_eq!(unavailable.repo, "acme/app");
    }

    #[test]
    fn invalid_sha_maps_to_not_found() {
        let err = GitHubError::InvalidSha("../etc".to_string());
        assert_eq!(unavailable_kind(&err), UnavailableKind::NotFound);
    }
}

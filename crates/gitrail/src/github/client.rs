//! GitHub API client creation and the `RepositoryClient` implementation.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use octocrab::Octocrab;
use serde::de::DeserializeOwned;

use super::convert::{to_full_commit, to_remote_branch, to_shallow_commit};
use super::error::GitHubError;
use super::types::{
    DEFAULT_MAX_PAGES, GitHubBranch, GitHubCommit, GitHubRepository, ListParams, PER_PAGE,
};
use crate::platform::{
    self, ApiRateLimiter, ClientFactory, FullCommit, RateLimitInfo, RemoteBranch, RepoRef,
    RepositoryClient, ShallowCommit,
};

/// Connect and read timeout applied to every request.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Create an authenticated Octocrab instance from a GitHub token.
pub fn create_client(token: &str) -> Result<Octocrab, GitHubError> {
    Octocrab::builder()
        .personal_token(token.to_string())
        .set_connect_timeout(Some(REQUEST_TIMEOUT))
        .set_read_timeout(Some(REQUEST_TIMEOUT))
        .build()
        .map_err(GitHubError::Api)
}

/// Get current rate limit status (core API only).
pub async fn get_rate_limit(client: &Octocrab) -> Result<RateLimitInfo, GitHubError> {
    let rate_limit = client.ratelimit().get().await?;
    let core = &rate_limit.resources.core;

    Ok(RateLimitInfo {
        limit: u32::try_from(core.limit).unwrap_or(u32::MAX),
        remaining: u32::try_from(core.remaining).unwrap_or(u32::MAX),
        reset_at: DateTime::from_timestamp(core.reset as i64, 0).unwrap_or_else(Utc::now),
    })
}

fn valid_sha(sha: &str) -> bool {
    (4..=64).contains(&sha.len()) && sha.chars().all(|c| c.is_ascii_hexdigit())
}

/// GitHub client implementing [`RepositoryClient`] with one personal token.
#[derive(Clone)]
pub struct GitHubClient {
    inner: Arc<Octocrab>,
    /// Optional pacer applied before every request.
    rate_limiter: Option<ApiRateLimiter>,
    max_pages: u32,
}

impl GitHubClient {
    /// Create a new GitHub client from an authentication token.
    pub fn new(token: &str, rate_limiter: Option<ApiRateLimiter>) -> Result<Self, GitHubError> {
        Ok(Self::from_octocrab(create_client(token)?, rate_limiter))
    }

    /// Create a GitHub client from an existing Octocrab instance.
    pub fn from_octocrab(client: Octocrab, rate_limiter: Option<ApiRateLimiter>) -> Self {
        Self {
            inner: Arc::new(client),
            rate_limiter,
            max_pages: DEFAULT_MAX_PAGES,
        }
    }

    /// Cap the number of pages fetched per listing.
    pub fn with_max_pages(mut self, max_pages: u32) -> Self {
        self.max_pages = max_pages.max(1);
        self
    }

    /// Get a reference to the inner Octocrab client.
    pub fn inner(&self) -> &Octocrab {
        &self.inner
    }

    async fn wait_for_rate_limit(&self) {
        if let Some(ref limiter) = self.rate_limiter {
            limiter.wait().await;
        }
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        route: &str,
        params: Option<&ListParams<'_>>,
    ) -> Result<T, GitHubError> {
        self.wait_for_rate_limit().await;
        self.inner.get(route, params).await.map_err(GitHubError::Api)
    }

    /// Fetch every page of a list endpoint, stopping at a short page or the
    /// page cap.
    async fn get_all_pages<T: DeserializeOwned>(
        &self,
        route: &str,
        sha: Option<&str>,
    ) -> Result<Vec<T>, GitHubError> {
        let mut items = Vec::new();

        for page in 1..=self.max_pages {
            let params = ListParams {
                per_page: PER_PAGE,
                page,
                sha,
            };
            let batch: Vec<T> = self.get_json(route, Some(&params)).await?;
            let fetched = batch.len();
            items.extend(batch);

            if fetched < usize::from(PER_PAGE) {
                return Ok(items);
            }
        }

        tracing::warn!(
            route,
            max_pages = self.max_pages,
            items = items.len(),
            "Listing truncated at page cap"
        );
        Ok(items)
    }
}

#[async_trait]
impl RepositoryClient for GitHubClient {
    async fn list_branches(&self, repo: &RepoRef) -> platform::Result<Vec<RemoteBranch>> {
        let route = format!("/repos/{}/{}/branches", repo.owner(), repo.name());
        let branches: Vec<GitHubBranch> = self
            .get_all_pages(&route, None)
            .await
            .map_err(|e| e.into_unavailable(repo.to_string()))?;

        Ok(branches.into_iter().map(to_remote_branch).collect())
    }

    async fn default_branch(&self, repo: &RepoRef) -> platform::Result<Option<String>> {
        let route = format!("/repos/{}/{}", repo.owner(), repo.name());
        let info: GitHubRepository = self
            .get_json(&route, None)
            .await
            .map_err(|e| e.into_unavailable(repo.to_string()))?;

        Ok(info.default_branch.filter(|name| !name.is_empty()))
    }

    async fn list_commits(
        &self,
        repo: &RepoRef,
        branch: &str,
    ) -> platform::Result<Vec<ShallowCommit>> {
        let route = format!("/repos/{}/{}/commits", repo.owner(), repo.name());
        let commits: Vec<GitHubCommit> = self
            .get_all_pages(&route, Some(branch))
            .await
            .map_err(|e| e.into_unavailable(repo.to_string()))?;

        tracing::debug!(repo = %repo, branch, count = commits.len(), "Listed commits");
        Ok(commits.into_iter().map(to_shallow_commit).collect())
    }

    async fn get_commit(&self, repo: &RepoRef, sha: &str) -> platform::Result<FullCommit> {
        if !valid_sha(sha) {
            return Err(GitHubError::InvalidSha(sha.to_string()).into_unavailable(repo.to_string()));
        }

        let route = format!("/repos/{}/{}/commits/{}", repo.owner(), repo.name(), sha);
        let commit: GitHubCommit = self
            .get_json(&route, None)
            .await
            .map_err(|e| e.into_unavailable(repo.to_string()))?;

        Ok(to_full_commit(commit))
    }

    async fn get_rate_limit(&self) -> platform::Result<RateLimitInfo> {
        self.wait_for_rate_limit().await;
        get_rate_limit(&self.inner)
            .await
            .map_err(|e| e.into_unavailable("rate_limit"))
    }
}

/// Builds a [`GitHubClient`] per owner token, sharing one request pacer.
#[derive(Clone, Default)]
pub struct OctocrabClientFactory {
    rate_limiter: Option<ApiRateLimiter>,
    max_pages: Option<u32>,
}

impl OctocrabClientFactory {
    pub fn new(rate_limiter: Option<ApiRateLimiter>) -> Self {
        Self {
            rate_limiter,
            max_pages: None,
        }
    }

    pub fn with_max_pages(mut self, max_pages: u32) -> Self {
        self.max_pages = Some(max_pages);
        self
    }
}

impl ClientFactory for OctocrabClientFactory {
    fn client_for(&self, token: &str) -> platform::Result<Arc<dyn RepositoryClient>> {
        let mut client = GitHubClient::new(token, self.rate_limiter.clone())
            .map_err(|e| e.into_unavailable("client"))?;
        if let Some(max_pages) = self.max_pages {
            client = client.with_max_pages(max_pages);
        }
        Ok(Arc::new(client))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha_validation_rejects_paths() {
        assert!(valid_sha("0123abcd"));
        assert!(valid_sha(&"a".repeat(40)));
        assert!(!valid_sha("abc"));
        assert!(!valid_sha("../../user"));
        assert!(!valid_sha("main"));
    }

    #[test]
    fn list_params_omit_missing_sha() {
        let params = ListParams {
            per_page: PER_PAGE,
            page: 2,
            sha: None,
        };
        let value = serde_json::to_value(&params).unwrap();
        assert_eq!(value, serde_json::json!({ "per_page": 100, "page": 2 }));
    }

    #[test]
    fn github_client_is_a_repository_client() {
        fn assert_client<T: RepositoryClient>() {}
        assert_client::<GitHubClient>();
    }
}

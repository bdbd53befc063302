//! Wire shapes of the GitHub REST endpoints used by the client.
//!
//! Only the fields the pipeline reads are modelled; everything is optional
//! where GitHub is known to send `null`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Page size for list endpoints (GitHub's maximum).
pub const PER_PAGE: u8 = 100;

/// Default cap on pages fetched per listing.
pub const DEFAULT_MAX_PAGES: u32 = 50;

/// Query parameters of paged list endpoints.
#[derive(Debug, Serialize)]
pub(crate) struct ListParams<'a> {
    pub per_page: u8,
    pub page: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sha: Option<&'a str>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitHubBranch {
    pub name: String,
    #[serde(default)]
    pub commit: Option<GitHubObjectRef>,
}

/// The fields of `GET /repos/{owner}/{repo}` the pipeline reads.
#[derive(Debug, Clone, Deserialize)]
pub struct GitHubRepository {
    #[serde(default)]
    pub default_branch: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitHubObjectRef {
    pub sha: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitHubAccount {
    #[serde(default)]
    pub login: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitHubGitAuthor {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitHubCommitDetail {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub author: Option<GitHubGitAuthor>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitHubStats {
    #[serde(default)]
    pub additions: i64,
    #[serde(default)]
    pub deletions: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitHubFile {
    pub filename: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub additions: i64,
    #[serde(default)]
    pub deletions: i64,
    #[serde(default)]
    pub patch: Option<String>,
}

/// An entry of `/repos/{o}/{r}/commits` or the body of `/commits/{sha}`.
#[derive(Debug, Clone, Deserialize)]
pub struct GitHubCommit {
    #[serde(default)]
    pub sha: Option<String>,
    #[serde(default)]
    pub author: Option<GitHubAccount>,
    #[serde(default)]
    pub commit: Option<GitHubCommitDetail>,
    #[serde(default)]
    pub stats: Option<GitHubStats>,
    #[serde(default)]
    pub files: Option<Vec<GitHubFile>>,
}

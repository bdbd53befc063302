//! Code host abstraction: the read-only client trait and quota handling.
//!
//! ```ignore
//! use gitrail::platform::{RepoRef, RepositoryClient};
//!
//! async fn heads(client: &dyn RepositoryClient) -> gitrail::platform::Result<()> {
//!     let repo: RepoRef = "acme/app".parse()?;
//!     for branch in client.list_branches(&repo).await? {
//!         println!("{} {:?}", branch.name, branch.head_sha);
//!     }
//!     Ok(())
//! }
//! ```

mod errors;
mod rate_limit;
mod types;

pub use errors::{
    InvalidRepoRef, RepositoryUnavailable, Result, UnavailableKind, short_error_message,
};
#[cfg(feature = "github")]
pub use rate_limit::ApiRateLimiter;
pub use rate_limit::{
    DEFAULT_QUOTA_CACHE_TTL, DEFAULT_REQUESTS_PER_SECOND, DEFAULT_THRESHOLD_PERCENT, QuotaConfig,
    QuotaLimiter, QuotaSource,
};
pub use types::{
    ClientFactory, CommitAuthor, CommitDetail, DiffStats, FileChange, FullCommit, RateLimitInfo,
    RemoteBranch, RepoRef, RepositoryClient, ShallowCommit,
};

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use chrono::{DateTime, Utc};

    use super::*;

    fn info(limit: u32, remaining: u32, reset_at: DateTime<Utc>) -> RateLimitInfo {
        RateLimitInfo {
            limit,
            remaining,
            reset_at,
        }
    }

    #[test]
    fn limiter_allows_request_below_threshold() {
        let limiter = QuotaLimiter::new(info(5000, 4000, Utc::now()), 90);
        assert!(limiter.can_make_request(20));
        assert_eq!(limiter.consumption_percent(), 20);
    }

    #[test]
    fn limiter_blocks_at_threshold() {
        // 4490 used + 20 = 4510 → 90.2% → 90 after integer division
        let limiter = QuotaLimiter::new(info(5000, 510, Utc::now()), 90);
        assert!(!limiter.can_make_request(20));
        // 4490 used + 5 = 4495 → 89%
        assert!(limiter.can_make_request(5));
    }

    #[test]
    fn limiter_blocks_unknown_limit() {
        let limiter = QuotaLimiter::new(info(0, 0, Utc::now()), 90);
        assert!(!limiter.can_make_request(1));
        assert_eq!(limiter.consumption_percent(), 100);
    }

    #[test]
    fn limiter_handles_remaining_above_limit() {
        let limiter = QuotaLimiter::new(info(100, 150, Utc::now()), 90);
        assert_eq!(limiter.consumption_percent(), 0);
        assert!(limiter.can_make_request(10));
    }

    #[test]
    fn wait_time_is_zero_after_reset() {
        let past = Utc::now() - chrono::Duration::minutes(1);
        let limiter = QuotaLimiter::new(info(5000, 0, past), 90);
        assert_eq!(limiter.wait_time(), Duration::ZERO);
    }

    #[test]
    fn wait_time_counts_down_to_reset() {
        let future = Utc::now() + chrono::Duration::minutes(10);
        let limiter = QuotaLimiter::new(info(5000, 0, future), 90);
        let wait = limiter.wait_time();
        assert!(wait > Duration::from_secs(9 * 60));
        assert!(wait <= Duration::from_secs(10 * 60));
    }

    #[test]
    fn repo_ref_parses_owner_and_name() {
        let repo: RepoRef = "acme/app".parse().unwrap();
        assert_eq!(repo.owner(), "acme");
        assert_eq!(repo.name(), "app");
        assert_eq!(repo.to_string(), "acme/app");

        let repo: RepoRef = " rust-lang/rust.vim ".parse().unwrap();
        assert_eq!(repo.to_string(), "rust-lang/rust.vim");
    }

    #[test]
    fn repo_ref_rejects_malformed_input() {
        for bad in ["", "acme", "acme/", "/app", "a/b/c", "acme/..", "ac me/app"] {
            assert!(bad.parse::<RepoRef>().is_err(), "{bad:?} should be rejected");
        }
    }

    #[test]
    fn full_commit_totals_fall_back_to_files() {
        let commit = FullCommit {
            summary: ShallowCommit::default(),
            stats: None,
            files: vec![
                FileChange {
                    filename: "a.rs".into(),
                    status: "modified".into(),
                    additions: 3,
                    deletions: 1,
                    patch: None,
                },
                FileChange {
                    filename: "b.rs".into(),
                    status: "added".into(),
                    additions: 7,
                    deletions: 0,
                    patch: None,
                },
            ],
        };
        assert_eq!(
            commit.totals(),
            DiffStats {
                additions: 10,
                deletions: 1
            }
        );
    }

    #[test]
    fn unavailable_error_names_repo_and_kind() {
        let err = RepositoryUnavailable::rate_limited("acme/app", "quota spent");
        assert!(err.is_rate_limited());
        let msg = err.to_string();
        assert!(msg.contains("acme/app"));
        assert!(msg.contains("rate limited"));
    }

    struct CountingClient {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl RepositoryClient for CountingClient {
        async fn list_branches(&self, _: &RepoRef) -> Result<Vec<RemoteBranch>> {
            Ok(Vec::new())
        }
        async fn list_commits(&self, _: &RepoRef, _: &str) -> Result<Vec<ShallowCommit>> {
            Ok(Vec::new())
        }
        async fn get_commit(&self, repo: &RepoRef, sha: &str) -> Result<FullCommit> {
            Err(RepositoryUnavailable::not_found(repo.to_string(), sha))
        }
        async fn get_rate_limit(&self) -> Result<RateLimitInfo> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) as u32;
            Ok(info(5000, 5000 - n, Utc::now()))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn quota_source_caches_per_credential() {
        let client = Arc::new(CountingClient {
            calls: AtomicUsize::new(0),
        });
        let source = QuotaSource::new(QuotaConfig::default());

        source.snapshot(client.as_ref(), "token-a").await.unwrap();
        source.snapshot(client.as_ref(), "token-a").await.unwrap();
        assert_eq!(client.calls.load(Ordering::SeqCst), 1);

        source.snapshot(client.as_ref(), "token-b").await.unwrap();
        assert_eq!(client.calls.load(Ordering::SeqCst), 2);

        tokio::time::advance(DEFAULT_QUOTA_CACHE_TTL + Duration::from_secs(1)).await;
        source.snapshot(client.as_ref(), "token-a").await.unwrap();
        assert_eq!(client.calls.load(Ordering::SeqCst), 3);

        source.invalidate("token-a").await;
        source.snapshot(client.as_ref(), "token-a").await.unwrap();
        assert_eq!(client.calls.load(Ordering::SeqCst), 4);
    }
}

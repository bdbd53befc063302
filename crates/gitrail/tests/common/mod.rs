//! Shared fixtures for integration tests: an in-memory code host and
//! helpers to seed users, projects and branches.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use gitrail::broadcast::ChannelPublisher;
use gitrail::connect_and_migrate;
use gitrail::entity::{agreement, agreement_status::AgreementStatus, branch, project, user};
use gitrail::platform::{
    self, ClientFactory, CommitAuthor, CommitDetail, DiffStats, FileChange, FullCommit,
    RateLimitInfo, RemoteBranch, RepoRef, RepositoryClient, RepositoryUnavailable, ShallowCommit,
    UnavailableKind,
};
use gitrail::lock::MemoryJobLock;
use gitrail::queue::MemoryJobQueue;
use gitrail::sync::{SyncConfig, SyncContext};
use sea_orm::{ActiveModelTrait, DatabaseConnection, Set};
use uuid::Uuid;

/// Create an in-memory SQLite database with migrations applied.
pub async fn setup_test_db() -> DatabaseConnection {
    connect_and_migrate("sqlite::memory:")
        .await
        .expect("Failed to create test database")
}

// ─── Fake code host ──────────────────────────────────────────────────────────

/// In-memory code host. Every commit listed on a branch can also be fetched
/// individually, with `stats` as its diff totals.
pub struct FakeClient {
    branches: Mutex<Vec<RemoteBranch>>,
    default_branch: Mutex<Option<String>>,
    commits: Mutex<HashMap<String, Vec<ShallowCommit>>>,
    stats: Mutex<HashMap<String, DiffStats>>,
    rate_limit: Mutex<RateLimitInfo>,
    /// Error returned by every call when set.
    failure: Mutex<Option<UnavailableKind>>,
    /// `get_commit` fails with a rate limit error after this many calls.
    rate_limit_after: Mutex<Option<usize>>,
    pub get_commit_calls: AtomicUsize,
    pub list_commit_calls: AtomicUsize,
}

impl Default for FakeClient {
    fn default() -> Self {
        Self {
            branches: Mutex::new(Vec::new()),
            default_branch: Mutex::new(None),
            commits: Mutex::new(HashMap::new()),
            stats: Mutex::new(HashMap::new()),
            rate_limit: Mutex::new(RateLimitInfo {
                limit: 5000,
                remaining: 5000,
                reset_at: Utc::now() + Duration::hours(1),
            }),
            failure: Mutex::new(None),
            rate_limit_after: Mutex::new(None),
            get_commit_calls: AtomicUsize::new(0),
            list_commit_calls: AtomicUsize::new(0),
        }
    }
}

impl FakeClient {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn add_branch(&self, name: &str) {
        self.branches.lock().unwrap().push(RemoteBranch {
            name: name.to_string(),
            head_sha: None,
        });
    }

    pub fn set_default_branch(&self, name: &str) {
        *self.default_branch.lock().unwrap() = Some(name.to_string());
    }

    pub fn push_commit(&self, branch: &str, commit: ShallowCommit, additions: i64, deletions: i64) {
        self.stats.lock().unwrap().insert(
            commit.sha.clone(),
            DiffStats {
                additions,
                deletions,
            },
        );
        self.commits
            .lock()
            .unwrap()
            .entry(branch.to_string())
            .or_default()
            .push(commit);
    }

    pub fn set_rate_limit(&self, info: RateLimitInfo) {
        *self.rate_limit.lock().unwrap() = info;
    }

    pub fn fail_with(&self, kind: UnavailableKind) {
        *self.failure.lock().unwrap() = Some(kind);
    }

    pub fn rate_limit_after(&self, calls: usize) {
        *self.rate_limit_after.lock().unwrap() = Some(calls);
    }

    fn check(&self, repo: &str) -> platform::Result<()> {
        match *self.failure.lock().unwrap() {
            Some(kind) => Err(RepositoryUnavailable::new(kind, repo, "injected failure")),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl RepositoryClient for FakeClient {
    async fn list_branches(&self, repo: &RepoRef) -> platform::Result<Vec<RemoteBranch>> {
        self.check(&repo.to_string())?;
        Ok(self.branches.lock().unwrap().clone())
    }

    async fn default_branch(&self, repo: &RepoRef) -> platform::Result<Option<String>> {
        self.check(&repo.to_string())?;
        Ok(self.default_branch.lock().unwrap().clone())
    }

    async fn list_commits(
        &self,
        repo: &RepoRef,
        branch: &str,
    ) -> platform::Result<Vec<ShallowCommit>> {
        self.check(&repo.to_string())?;
        self.list_commit_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .commits
            .lock()
            .unwrap()
            .get(branch)
            .cloned()
            .unwrap_or_default())
    }

    async fn get_commit(&self, repo: &RepoRef, sha: &str) -> platform::Result<FullCommit> {
        self.check(&repo.to_string())?;
        let calls = self.get_commit_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(limit) = *self.rate_limit_after.lock().unwrap()
            && calls >= limit
        {
            return Err(RepositoryUnavailable::rate_limited(repo.to_string(), "quota spent"));
        }

        let summary = self
            .commits
            .lock()
            .unwrap()
            .values()
            .flatten()
            .find(|c| c.sha == sha)
            .cloned()
            .ok_or_else(|| RepositoryUnavailable::not_found(repo.to_string(), sha))?;
        let stats = self.stats.lock().unwrap().get(sha).copied();

        Ok(FullCommit {
            files: vec![FileChange {
                filename: "src/lib.rs".to_string(),
                status: "modified".to_string(),
                additions: stats.map(|s| s.additions).unwrap_or_default(),
                deletions: stats.map(|s| s.deletions).unwrap_or_default(),
                patch: None,
            }],
            summary,
            stats,
        })
    }

    async fn get_rate_limit(&self) -> platform::Result<RateLimitInfo> {
        self.check("rate_limit")?;
        Ok(*self.rate_limit.lock().unwrap())
    }
}

/// Hands out the same fake client for every token.
pub struct FakeFactory(pub Arc<FakeClient>);

impl ClientFactory for FakeFactory {
    fn client_for(&self, _token: &str) -> platform::Result<Arc<dyn RepositoryClient>> {
        let client: Arc<dyn RepositoryClient> = self.0.clone();
        Ok(client)
    }
}

pub fn commit(sha: &str, login: Option<&str>, email: &str, name: &str, minute: u32) -> ShallowCommit {
    ShallowCommit {
        sha: sha.to_string(),
        author_login: login.map(String::from),
        commit: Some(CommitDetail {
            message: format!("Commit {sha}"),
            author: Some(CommitAuthor {
                name: Some(name.to_string()),
                email: Some(email.to_string()),
                date: Some(committed_at(minute)),
            }),
        }),
    }
}

pub fn committed_at(minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 1, 10, 0, 0).unwrap() + Duration::minutes(i64::from(minute))
}

// ─── Database fixtures ───────────────────────────────────────────────────────

pub async fn insert_user(
    db: &DatabaseConnection,
    email: &str,
    handle: Option<&str>,
    token: Option<&str>,
) -> user::Model {
    user::ActiveModel {
        id: Set(Uuid::new_v4()),
        email: Set(email.to_string()),
        github_handle: Set(handle.map(String::from)),
        full_name: Set(email.split('@').next().unwrap_or(email).to_string()),
        avatar_url: Set(None),
        github_token: Set(token.map(String::from)),
        created_at: Set(Utc::now().fixed_offset()),
    }
    .insert(db)
    .await
    .expect("insert user")
}

pub async fn insert_project(
    db: &DatabaseConnection,
    owner: &user::Model,
    repo: Option<&str>,
    last_polled_at: Option<DateTime<Utc>>,
) -> project::Model {
    project::ActiveModel {
        id: Set(Uuid::new_v4()),
        name: Set(repo.unwrap_or("unlinked").to_string()),
        owner_id: Set(owner.id),
        github_repo: Set(repo.map(String::from)),
        github_last_polled_at: Set(last_polled_at.map(|t| t.fixed_offset())),
        created_at: Set(Utc::now().fixed_offset()),
    }
    .insert(db)
    .await
    .expect("insert project")
}

/// Insert a branch created `offset_secs` after a fixed base time.
pub async fn insert_branch(
    db: &DatabaseConnection,
    project: &project::Model,
    name: &str,
    offset_secs: i64,
) -> branch::Model {
    let base = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
    branch::ActiveModel {
        id: Set(Uuid::new_v4()),
        project_id: Set(project.id),
        name: Set(name.to_string()),
        created_at: Set((base + Duration::seconds(offset_secs)).fixed_offset()),
    }
    .insert(db)
    .await
    .expect("insert branch")
}

pub async fn insert_agreement(
    db: &DatabaseConnection,
    project: &project::Model,
    counterparty: &user::Model,
    status: AgreementStatus,
) -> agreement::Model {
    agreement::ActiveModel {
        id: Set(Uuid::new_v4()),
        project_id: Set(project.id),
        counterparty_id: Set(counterparty.id),
        status: Set(status),
        created_at: Set(Utc::now().fixed_offset()),
    }
    .insert(db)
    .await
    .expect("insert agreement")
}

/// A context over the fake host, recording jobs and publishing to a channel.
pub struct Harness {
    pub db: Arc<DatabaseConnection>,
    pub client: Arc<FakeClient>,
    pub queue: Arc<MemoryJobQueue>,
    pub publisher: Arc<ChannelPublisher>,
    pub lock: Arc<MemoryJobLock>,
    pub ctx: SyncContext,
}

pub async fn harness(config: SyncConfig) -> Harness {
    let db = Arc::new(setup_test_db().await);
    let client = FakeClient::new();
    let queue = Arc::new(MemoryJobQueue::new());
    let publisher = Arc::new(ChannelPublisher::default());
    let lock = Arc::new(MemoryJobLock::new());

    let ctx = SyncContext::builder()
        .database(db.clone())
        .clients(Arc::new(FakeFactory(client.clone())))
        .queue(queue.clone())
        .publisher(publisher.clone())
        .lock(lock.clone())
        .config(config)
        .build()
        .expect("build context");

    Harness {
        db,
        client,
        queue,
        publisher,
        lock,
        ctx,
    }
}

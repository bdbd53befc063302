//! Commit ingestion for one branch.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use sea_orm::Set;
use uuid::Uuid;

use crate::broadcast::publish_project_update;
use crate::entity::{
    branch,
    commit::{ActiveModel as CommitActiveModel, ChangedFile},
    contributor::Contributor,
    project,
};
use crate::platform::{FileChange, FullCommit, RepoRef, RepositoryClient, ShallowCommit};
use crate::queue::{IngestMode, Job};
use crate::repository::{self, StatsWrite, commits, links};

use super::authors::AuthorDirectory;
use super::context::SyncContext;
use super::types::{FAILURE_SAMPLE_SIZE, IngestReport, enrich_chain_key};

impl From<FileChange> for ChangedFile {
    fn from(file: FileChange) -> Self {
        ChangedFile {
            filename: file.filename,
            status: file.status,
            additions: file.additions,
            deletions: file.deletions,
            patch: file.patch,
        }
    }
}

/// Saturating conversion of a line count to the column type.
pub(crate) fn line_count(value: i64) -> i32 {
    i32::try_from(value.max(0)).unwrap_or(i32::MAX)
}

/// A fetched commit ready to be turned into a row.
struct Candidate {
    summary: ShallowCommit,
    detail: Option<FullCommit>,
}

/// Fetches a branch's commits and reconciles them into storage.
pub struct CommitIngestor {
    ctx: SyncContext,
}

impl CommitIngestor {
    pub fn new(ctx: SyncContext) -> Self {
        Self { ctx }
    }

    /// Ingest every commit of `branch`.
    ///
    /// Never fails: an unavailable code host yields an empty report, a
    /// persistence failure a report with nothing persisted.
    pub async fn ingest_branch(
        &self,
        client: &dyn RepositoryClient,
        project: &project::Model,
        branch: &branch::Model,
        mode: IngestMode,
    ) -> IngestReport {
        let Some(repo) = project.repository().and_then(|r| r.parse::<RepoRef>().ok()) else {
            tracing::warn!(project_id = %project.id, repo = ?project.github_repo, "Project has no valid repository");
            return IngestReport::default();
        };

        let directory = match AuthorDirectory::load(&self.ctx.db, project).await {
            Ok(directory) => directory,
            Err(e) => {
                tracing::error!(project_id = %project.id, error = %e, "Failed to load authors");
                return IngestReport::default();
            }
        };
        tracing::debug!(project_id = %project.id, authors = directory.len(), "Loaded author directory");
        if directory.is_empty() {
            tracing::warn!(project_id = %project.id, "No known authors, every commit will be skipped");
        }

        let candidates = match self.fetch(client, &repo, &branch.name, mode).await {
            Ok(candidates) => candidates,
            Err(e) => {
                tracing::warn!(
                    project_id = %project.id,
                    %repo,
                    branch = %branch.name,
                    error = %e,
                    "Repository unavailable, skipping branch"
                );
                return IngestReport::default();
            }
        };

        let mut report = IngestReport {
            fetched: candidates.fetched,
            skipped_malformed: candidates.malformed,
            ..Default::default()
        };

        let now = Utc::now().fixed_offset();
        let mut seen = HashSet::new();
        let mut rows = Vec::with_capacity(candidates.items.len());
        for candidate in candidates.items {
            if !seen.insert(candidate.summary.sha.clone()) {
                continue;
            }
            match build_row(project.id, &directory, candidate, now) {
                Some(row) => rows.push(row),
                None => report.skipped_unresolved += 1,
            }
        }

        if rows.is_empty() {
            tracing::debug!(project_id = %project.id, branch = %branch.name, "No commits to persist");
            return report;
        }

        let shas: Vec<String> = seen.into_iter().collect();
        match self.persist(project.id, branch.id, rows, &shas, mode).await {
            Ok((persisted, linked)) => {
                report.persisted = persisted;
                report.linked = linked;
            }
            Err(failure) => {
                tracing::error!(
                    project_id = %project.id,
                    branch = %branch.name,
                    batch = failure.batch,
                    sample = ?failure.sample,
                    error = %failure.error,
                    "Failed to persist commits"
                );
                return report;
            }
        }

        report.published = publish_project_update(
            &self.ctx.db,
            self.ctx.publisher.as_ref(),
            project.id,
            self.ctx.config.ingest.recent_limit,
        )
        .await;

        if mode == IngestMode::Fast && report.persisted > 0 {
            report.enrichment_enqueued = self.start_enrichment(project.id).await;
        }

        tracing::info!(
            project_id = %project.id,
            branch = %branch.name,
            ?mode,
            fetched = report.fetched,
            persisted = report.persisted,
            linked = report.linked,
            unresolved = report.skipped_unresolved,
            "Ingested branch"
        );
        report
    }

    /// Start an enrichment chain unless nothing lacks stats or a chain is
    /// already pending for the project.
    async fn start_enrichment(&self, project_id: Uuid) -> bool {
        match commits::count_missing_stats(&self.ctx.db, project_id).await {
            Ok(0) => return false,
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(%project_id, error = %e, "Failed to count commits lacking stats");
                return false;
            }
        }

        let key = enrich_chain_key(project_id);
        let ttl = self.ctx.config.enrich.chain_marker_ttl;
        match self.ctx.lock.acquire(&key, ttl).await {
            Ok(Some(_)) => {}
            Ok(None) => {
                tracing::debug!(%project_id, "Enrichment already pending");
                return false;
            }
            Err(e) => tracing::warn!(%project_id, error = %e, "Enrichment marker unavailable, enqueueing anyway"),
        }

        let job = Job::EnrichStats {
            project_id,
            attempt: 0,
        };
        match self.ctx.queue.enqueue(job).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(%project_id, error = %e, "Failed to enqueue enrichment");
                if let Err(e) = self.ctx.lock.clear(&key).await {
                    tracing::warn!(%project_id, error = %e, "Failed to clear enrichment marker");
                }
                false
            }
        }
    }

    async fn fetch(
        &self,
        client: &dyn RepositoryClient,
        repo: &RepoRef,
        branch: &str,
        mode: IngestMode,
    ) -> crate::platform::Result<Fetched> {
        let listed = client.list_commits(repo, branch).await?;
        let fetched = listed.len();

        let (valid, malformed): (Vec<_>, Vec<_>) = listed
            .into_iter()
            .partition(|c| !c.sha.trim().is_empty() && c.commit.is_some());

        let mut items = Vec::with_capacity(valid.len());
        for mut summary in valid {
            summary.sha = summary.sha.trim().to_string();
            let detail = match mode {
                IngestMode::Full => Some(client.get_commit(repo, &summary.sha).await?),
                IngestMode::Fast => None,
            };
            items.push(Candidate { summary, detail });
        }

        Ok(Fetched {
            fetched,
            malformed: malformed.len(),
            items,
        })
    }

    async fn persist(
        &self,
        project_id: Uuid,
        branch_id: Uuid,
        rows: Vec<CommitActiveModel>,
        shas: &[String],
        mode: IngestMode,
    ) -> Result<(u64, u64), PersistFailure> {
        let retry = &self.ctx.config.ingest.retry;
        let stats = match mode {
            IngestMode::Full => StatsWrite::Overwrite,
            IngestMode::Fast => StatsWrite::Preserve,
        };

        let batch = rows.len();
        let sample: Vec<String> = rows.iter().take(FAILURE_SAMPLE_SIZE).map(describe_row).collect();
        let fail = |error: repository::RepositoryError| PersistFailure {
            batch,
            sample: sample.clone(),
            error,
        };

        let persisted = commits::upsert_commits(&self.ctx.db, rows, stats, retry)
            .await
            .map_err(fail)?;
        let ids = commits::find_ids_by_sha(&self.ctx.db, project_id, shas)
            .await
            .map_err(fail)?;
        let linked = links::upsert_links(&self.ctx.db, branch_id, ids.into_values(), retry)
            .await
            .map_err(fail)?;

        Ok((persisted, linked))
    }
}

struct Fetched {
    fetched: usize,
    malformed: usize,
    items: Vec<Candidate>,
}

struct PersistFailure {
    batch: usize,
    sample: Vec<String>,
    error: repository::RepositoryError,
}

fn describe_row(row: &CommitActiveModel) -> String {
    let sha = match &row.sha {
        sea_orm::ActiveValue::Set(v) | sea_orm::ActiveValue::Unchanged(v) => v.as_str(),
        sea_orm::ActiveValue::NotSet => "<unset>",
    };
    let message = match &row.message {
        sea_orm::ActiveValue::Set(v) | sea_orm::ActiveValue::Unchanged(v) => {
            v.lines().next().unwrap_or_default()
        }
        sea_orm::ActiveValue::NotSet => "",
    };
    format!("{sha} {message:.60}")
}

/// Turn a fetched commit into a row, or `None` if its author is unknown.
fn build_row(
    project_id: Uuid,
    directory: &AuthorDirectory,
    candidate: Candidate,
    now: DateTime<chrono::FixedOffset>,
) -> Option<CommitActiveModel> {
    let Candidate { summary, detail } = candidate;
    // Individually fetched commits carry the most complete metadata.
    let source = detail.as_ref().map(|d| &d.summary).unwrap_or(&summary);
    let commit = source.commit.as_ref().or(summary.commit.as_ref())?;
    let author = commit.author.clone().unwrap_or_default();

    let user_id = directory.resolve(
        source.author_login.as_deref(),
        author.email.as_deref(),
        author.name.as_deref(),
    )?;
    let (user_column, unregistered_column) = Contributor::Registered(user_id).into_columns();

    let committed_at = author
        .date
        .map(|d| d.fixed_offset())
        .unwrap_or(now);

    let mut row = CommitActiveModel {
        id: Set(Uuid::new_v4()),
        project_id: Set(project_id),
        sha: Set(summary.sha.clone()),
        user_id: Set(user_column),
        unregistered_author: Set(unregistered_column),
        agreement_id: Set(directory.agreement_for(user_id)),
        message: Set(commit.message.clone()),
        committed_at: Set(committed_at),
        lines_added: Set(None),
        lines_removed: Set(None),
        changed_files: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
    };

    if let Some(detail) = detail {
        let totals = detail.totals();
        let files: Vec<ChangedFile> = detail.files.into_iter().map(ChangedFile::from).collect();
        row.lines_added = Set(Some(line_count(totals.additions)));
        row.lines_removed = Set(Some(line_count(totals.deletions)));
        row.changed_files = Set(serde_json::to_value(files).ok());
    }

    Some(row)
}

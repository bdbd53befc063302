//! Commit rows: upsert by (project_id, sha), stats backfill, listings.

use std::collections::HashMap;

use chrono::Utc;
use sea_orm::{
    ColumnTrait, Condition, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect,
    sea_query::{Expr, Func, OnConflict, SimpleExpr},
};
use uuid::Uuid;

use crate::entity::commit::{ActiveModel, ChangedFile, Column, Entity as Commit, Model};
use crate::retry::RetryConfig;

use super::bulk::upsert_many_with_retry;
use super::errors::{RepositoryError, Result};

/// How an upsert treats the diff statistic columns of existing rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatsWrite {
    /// Overwrite stats with the incoming values (full fetch).
    Overwrite,
    /// Leave stored stats untouched (fast fetch without per-commit detail).
    Preserve,
}

/// Build the ON CONFLICT clause for commit upserts.
///
/// Conflicts are detected on `(project_id, sha)`. Every mutable column is
/// overwritten with the latest fetched value; `id` and `created_at` are kept.
pub(crate) fn commit_on_conflict(stats: StatsWrite) -> OnConflict {
    let mut columns = vec![
        Column::UserId,
        Column::UnregisteredAuthor,
        Column::AgreementId,
        Column::Message,
        Column::CommittedAt,
        Column::UpdatedAt,
    ];
    if stats == StatsWrite::Overwrite {
        columns.extend([Column::LinesAdded, Column::LinesRemoved, Column::ChangedFiles]);
    }

    OnConflict::columns([Column::ProjectId, Column::Sha])
        .update_columns(columns)
        .to_owned()
}

/// Upsert a batch of commits in one statement.
///
/// # Returns
/// The number of rows inserted or updated.
pub async fn upsert_commits(
    db: &DatabaseConnection,
    rows: Vec<ActiveModel>,
    stats: StatsWrite,
    retry: &RetryConfig,
) -> Result<u64> {
    upsert_many_with_retry(db, rows, commit_on_conflict(stats), retry).await
}

/// Map sha → id for the given commits of a project.
///
/// Used after an upsert, since the database does not reliably report the ids
/// of rows that hit the conflict path.
pub async fn find_ids_by_sha(
    db: &DatabaseConnection,
    project_id: Uuid,
    shas: &[String],
) -> Result<HashMap<String, Uuid>> {
    if shas.is_empty() {
        return Ok(HashMap::new());
    }

    let mut ids = HashMap::with_capacity(shas.len());
    for chunk in shas.chunks(500) {
        let rows: Vec<(Uuid, String)> = Commit::find()
            .select_only()
            .column(Column::Id)
            .column(Column::Sha)
            .filter(Column::ProjectId.eq(project_id))
            .filter(Column::Sha.is_in(chunk.iter().cloned()))
            .into_tuple()
            .all(db)
            .await?;
        ids.extend(rows.into_iter().map(|(id, sha)| (sha, id)));
    }

    Ok(ids)
}

fn missing_stats() -> Condition {
    Condition::any()
        .add(Column::LinesAdded.is_null())
        .add(Column::LinesRemoved.is_null())
}

/// Commits of a project that still lack diff statistics, newest first.
pub async fn find_missing_stats(
    db: &DatabaseConnection,
    project_id: Uuid,
    limit: u64,
) -> Result<Vec<Model>> {
    Commit::find()
        .filter(Column::ProjectId.eq(project_id))
        .filter(missing_stats())
        .order_by_desc(Column::CommittedAt)
        .order_by_asc(Column::Id)
        .limit(limit)
        .all(db)
        .await
        .map_err(RepositoryError::from)
}

/// Number of commits of a project that still lack diff statistics.
pub async fn count_missing_stats(db: &DatabaseConnection, project_id: Uuid) -> Result<u64> {
    Commit::find()
        .filter(Column::ProjectId.eq(project_id))
        .filter(missing_stats())
        .count(db)
        .await
        .map_err(RepositoryError::from)
}

/// Record diff statistics for a commit that does not have them yet.
///
/// The update is guarded on the stats still being NULL, so a commit that was
/// enriched concurrently is never rewritten.
///
/// # Returns
/// `true` if the row was updated.
pub async fn record_stats(
    db: &DatabaseConnection,
    commit_id: Uuid,
    lines_added: i32,
    lines_removed: i32,
    files: &[ChangedFile],
) -> Result<bool> {
    let files = serde_json::to_value(files).map_err(|e| RepositoryError::InvalidInput {
        message: format!("unserializable file list: {e}"),
    })?;

    let result = Commit::update_many()
        .col_expr(Column::LinesAdded, Expr::value(lines_added))
        .col_expr(Column::LinesRemoved, Expr::value(lines_removed))
        .col_expr(Column::ChangedFiles, Expr::value(files))
        .col_expr(Column::UpdatedAt, Expr::value(Utc::now().fixed_offset()))
        .filter(Column::Id.eq(commit_id))
        .filter(missing_stats())
        .exec(db)
        .await?;

    Ok(result.rows_affected > 0)
}

/// Most recent commits of a project.
pub async fn find_recent(
    db: &DatabaseConnection,
    project_id: Uuid,
    limit: u64,
) -> Result<Vec<Model>> {
    Commit::find()
        .filter(Column::ProjectId.eq(project_id))
        .order_by_desc(Column::CommittedAt)
        .order_by_asc(Column::Id)
        .limit(limit)
        .all(db)
        .await
        .map_err(RepositoryError::from)
}

/// Commit count and summed line counts. Commits without stats add zero lines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LineTotals {
    pub commits: u64,
    pub additions: i64,
    pub deletions: i64,
}

impl LineTotals {
    fn from_row((commits, additions, deletions): (i64, i64, i64)) -> Self {
        Self {
            commits: u64::try_from(commits).unwrap_or(0),
            additions,
            deletions,
        }
    }
}

/// [`LineTotals`] of one `(user_id, unregistered_author)` column pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorTotals {
    pub user_id: Option<Uuid>,
    pub unregistered_author: Option<String>,
    pub totals: LineTotals,
}

fn summed(column: Column) -> SimpleExpr {
    Func::coalesce([Expr::col(column).sum(), Expr::val(0i64).into()]).into()
}

/// Totals over every commit of a project, computed by the database.
pub async fn project_totals(db: &DatabaseConnection, project_id: Uuid) -> Result<LineTotals> {
    let row = Commit::find()
        .select_only()
        .column_as(Expr::col(Column::Id).count(), "commits")
        .column_as(summed(Column::LinesAdded), "additions")
        .column_as(summed(Column::LinesRemoved), "deletions")
        .filter(Column::ProjectId.eq(project_id))
        .into_tuple::<(i64, i64, i64)>()
        .one(db)
        .await
        .map_err(RepositoryError::from)?;

    Ok(row.map(LineTotals::from_row).unwrap_or_default())
}

/// Totals per author of a project, grouped by the database.
pub async fn author_totals(db: &DatabaseConnection, project_id: Uuid) -> Result<Vec<AuthorTotals>> {
    let rows = Commit::find()
        .select_only()
        .column(Column::UserId)
        .column(Column::UnregisteredAuthor)
        .column_as(Expr::col(Column::Id).count(), "commits")
        .column_as(summed(Column::LinesAdded), "additions")
        .column_as(summed(Column::LinesRemoved), "deletions")
        .filter(Column::ProjectId.eq(project_id))
        .group_by(Column::UserId)
        .group_by(Column::UnregisteredAuthor)
        .into_tuple::<(Option<Uuid>, Option<String>, i64, i64, i64)>()
        .all(db)
        .await
        .map_err(RepositoryError::from)?;

    Ok(rows
        .into_iter()
        .map(
            |(user_id, unregistered_author, commits, additions, deletions)| AuthorTotals {
                user_id,
                unregistered_author,
                totals: LineTotals::from_row((commits, additions, deletions)),
            },
        )
        .collect())
}

/// Number of commits stored for a project.
pub async fn count_by_project(db: &DatabaseConnection, project_id: Uuid) -> Result<u64> {
    Commit::find()
        .filter(Column::ProjectId.eq(project_id))
        .count(db)
        .await
        .map_err(RepositoryError::from)
}

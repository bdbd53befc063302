//! Generic conflict-aware bulk writes.

use sea_orm::{
    ActiveModelTrait, DatabaseConnection, EntityTrait, IntoActiveModel, sea_query::OnConflict,
};

use crate::retry::{RetryConfig, with_retry};

use super::errors::{RepositoryError, Result};

/// Rows per INSERT statement.
///
/// Keeps the bound-parameter count of the widest table (commits, 13 columns)
/// well under SQLite's 32766 variable limit.
pub const UPSERT_CHUNK_SIZE: usize = 500;

/// Insert `rows`, resolving key conflicts with `on_conflict`.
///
/// This is the deduplication primitive of the pipeline: the conflict target is
/// the natural key of the table (e.g. `(project_id, sha)` for commits) and the
/// action decides whether existing rows are updated or left alone.
///
/// Rows are written in statements of at most [`UPSERT_CHUNK_SIZE`]. Chunks are
/// not one transaction; a failure leaves earlier chunks written, which a
/// repeated call absorbs.
///
/// # Returns
/// The number of rows the database reports as inserted or updated, summed over
/// all chunks. Rows skipped by `DO NOTHING` are not counted.
pub async fn upsert_many<A>(
    db: &DatabaseConnection,
    rows: Vec<A>,
    on_conflict: OnConflict,
) -> Result<u64>
where
    A: ActiveModelTrait + Send,
    <A::Entity as EntityTrait>::Model: IntoActiveModel<A>,
{
    let mut rows = rows.into_iter().peekable();
    let mut affected = 0u64;

    while rows.peek().is_some() {
        let chunk: Vec<A> = rows.by_ref().take(UPSERT_CHUNK_SIZE).collect();
        affected += <A::Entity as EntityTrait>::insert_many(chunk)
            .on_conflict(on_conflict.clone())
            .exec_without_returning(db)
            .await?;
    }

    Ok(affected)
}

/// [`upsert_many`] with retries for transient database errors
/// (e.g. `database is locked` under concurrent workers).
pub async fn upsert_many_with_retry<A>(
    db: &DatabaseConnection,
    rows: Vec<A>,
    on_conflict: OnConflict,
    retry: &RetryConfig,
) -> Result<u64>
where
    A: ActiveModelTrait + Clone + Send,
    <A::Entity as EntityTrait>::Model: IntoActiveModel<A>,
{
    if rows.is_empty() {
        return Ok(0);
    }

    tracing::debug!(count = rows.len(), "Starting bulk upsert");
    with_retry(
        || upsert_many(db, rows.clone(), on_conflict.clone()),
        RepositoryError::is_transient,
        retry,
        "bulk upsert",
    )
    .await
}

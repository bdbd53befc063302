//! Branch rows of a project.

use chrono::Utc;
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, QuerySelect, Set,
    sea_query::OnConflict,
};
use uuid::Uuid;

use crate::entity::branch::{ActiveModel, Column, Entity as Branch, Model};
use crate::retry::RetryConfig;

use super::bulk::upsert_many_with_retry;
use super::errors::{RepositoryError, Result};

/// The `limit` earliest-created branches of a project.
pub async fn find_oldest(
    db: &DatabaseConnection,
    project_id: Uuid,
    limit: u64,
) -> Result<Vec<Model>> {
    Branch::find()
        .filter(Column::ProjectId.eq(project_id))
        .order_by_asc(Column::CreatedAt)
        .order_by_asc(Column::Id)
        .limit(limit)
        .all(db)
        .await
        .map_err(RepositoryError::from)
}

/// All branches of a project, in creation order.
pub async fn find_by_project(db: &DatabaseConnection, project_id: Uuid) -> Result<Vec<Model>> {
    Branch::find()
        .filter(Column::ProjectId.eq(project_id))
        .order_by_asc(Column::CreatedAt)
        .order_by_asc(Column::Id)
        .all(db)
        .await
        .map_err(RepositoryError::from)
}

pub async fn find_by_id(db: &DatabaseConnection, id: Uuid) -> Result<Option<Model>> {
    Branch::find_by_id(id)
        .one(db)
        .await
        .map_err(RepositoryError::from)
}

/// Insert branches by name, skipping names the project already has.
///
/// Creation times are spaced one millisecond apart in input order, so the
/// oldest-first ordering reproduces `names`.
///
/// # Returns
/// The number of branches created.
pub async fn insert_missing(
    db: &DatabaseConnection,
    project_id: Uuid,
    names: &[String],
    retry: &RetryConfig,
) -> Result<u64> {
    let start = Utc::now().fixed_offset();
    let rows: Vec<ActiveModel> = names
        .iter()
        .enumerate()
        .map(|(position, name)| ActiveModel {
            id: Set(Uuid::new_v4()),
            project_id: Set(project_id),
            name: Set(name.clone()),
            created_at: Set(start + chrono::Duration::milliseconds(position as i64)),
        })
        .collect();

    let on_conflict = OnConflict::columns([Column::ProjectId, Column::Name])
        .do_nothing()
        .to_owned();

    upsert_many_with_retry(db, rows, on_conflict, retry).await
}

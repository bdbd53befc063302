//! Project lookups and the poll watermark.

use chrono::{DateTime, FixedOffset};
use sea_orm::{
    ColumnTrait, Condition, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, sea_query::{Expr, NullOrdering, Order, Query},
};
use uuid::Uuid;

use crate::entity::{
    branch,
    project::{Column, Entity as Project, Model},
    user::{self, Entity as User},
};

use super::errors::{RepositoryError, Result};

/// A project together with its owner.
pub type ProjectWithOwner = (Model, user::Model);

/// Projects that are due for a poll.
///
/// A project qualifies when it links a repository, has at least one branch,
/// its owner has a credential, and its watermark is NULL or older than
/// `cutoff`. Results are ordered by watermark ascending, never-polled first.
pub async fn find_pollable(
    db: &DatabaseConnection,
    cutoff: DateTime<FixedOffset>,
) -> Result<Vec<ProjectWithOwner>> {
    let has_branches = Query::select()
        .column(branch::Column::ProjectId)
        .from(branch::Entity)
        .to_owned();

    let rows = Project::find()
        .find_also_related(User)
        .filter(Column::GithubRepo.is_not_null())
        .filter(Column::GithubRepo.ne(""))
        .filter(
            Condition::any()
                .add(Column::GithubLastPolledAt.is_null())
                .add(Column::GithubLastPolledAt.lt(cutoff)),
        )
        .filter(Column::Id.in_subquery(has_branches))
        .filter(user::Column::GithubToken.is_not_null())
        .order_by_with_nulls(Column::GithubLastPolledAt, Order::Asc, NullOrdering::First)
        .order_by_asc(Column::Id)
        .all(db)
        .await?;

    Ok(rows
        .into_iter()
        .filter_map(|(project, owner)| owner.map(|owner| (project, owner)))
        .filter(|(project, owner)| project.repository().is_some() && owner.credential().is_some())
        .collect())
}

/// Move the watermark of a project forward to `now`.
///
/// The watermark is never moved backwards: the update only applies when the
/// stored value is NULL or earlier than `now`.
///
/// # Returns
/// `true` if the watermark changed.
pub async fn advance_watermark(
    db: &DatabaseConnection,
    project_id: Uuid,
    now: DateTime<FixedOffset>,
) -> Result<bool> {
    let result = Project::update_many()
        .col_expr(Column::GithubLastPolledAt, Expr::value(now))
        .filter(Column::Id.eq(project_id))
        .filter(
            Condition::any()
                .add(Column::GithubLastPolledAt.is_null())
                .add(Column::GithubLastPolledAt.lt(now)),
        )
        .exec(db)
        .await?;

    Ok(result.rows_affected > 0)
}

pub async fn find_by_id(db: &DatabaseConnection, id: Uuid) -> Result<Option<Model>> {
    Project::find_by_id(id)
        .one(db)
        .await
        .map_err(RepositoryError::from)
}

/// A project and its owner, or `NotFound` if either is missing.
pub async fn find_with_owner(db: &DatabaseConnection, id: Uuid) -> Result<ProjectWithOwner> {
    let row = Project::find_by_id(id)
        .find_also_related(User)
        .one(db)
        .await?;

    match row {
        Some((project, Some(owner))) => Ok((project, owner)),
        Some((project, None)) => Err(RepositoryError::not_found("user", project.owner_id)),
        None => Err(RepositoryError::not_found("project", id)),
    }
}

/// Ids of every project linked to a repository.
pub async fn find_linked_ids(db: &DatabaseConnection) -> Result<Vec<Uuid>> {
    Project::find()
        .select_only()
        .column(Column::Id)
        .filter(Column::GithubRepo.is_not_null())
        .filter(Column::GithubRepo.ne(""))
        .order_by_asc(Column::CreatedAt)
        .into_tuple()
        .all(db)
        .await
        .map_err(RepositoryError::from)
}

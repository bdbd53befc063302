//! Branch ↔ commit membership rows.

use std::collections::{BTreeSet, HashMap};

use chrono::Utc;
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, JoinType, QueryFilter, QuerySelect,
    RelationTrait, Set, sea_query::OnConflict,
};
use uuid::Uuid;

use crate::entity::branch;
use crate::entity::branch_commit::{self, ActiveModel, Column, Entity as BranchCommit};
use crate::retry::RetryConfig;

use super::bulk::upsert_many_with_retry;
use super::errors::{RepositoryError, Result};

/// Link every commit id to a branch. Existing links are left alone.
///
/// # Returns
/// The number of links newly created (0 when all already existed).
pub async fn upsert_links(
    db: &DatabaseConnection,
    branch_id: Uuid,
    commit_ids: impl IntoIterator<Item = Uuid>,
    retry: &RetryConfig,
) -> Result<u64> {
    let now = Utc::now().fixed_offset();
    let unique: BTreeSet<Uuid> = commit_ids.into_iter().collect();
    let rows: Vec<ActiveModel> = unique
        .into_iter()
        .map(|commit_id| ActiveModel {
            id: Set(Uuid::new_v4()),
            branch_id: Set(branch_id),
            commit_id: Set(commit_id),
            created_at: Set(now),
        })
        .collect();

    let on_conflict = OnConflict::columns([Column::BranchId, Column::CommitId])
        .do_nothing()
        .to_owned();

    upsert_many_with_retry(db, rows, on_conflict, retry).await
}

/// Names of the branches each commit appears on, sorted.
pub async fn branch_names_for_commits(
    db: &DatabaseConnection,
    commit_ids: &[Uuid],
) -> Result<HashMap<Uuid, Vec<String>>> {
    if commit_ids.is_empty() {
        return Ok(HashMap::new());
    }

    let rows: Vec<(Uuid, String)> = BranchCommit::find()
        .select_only()
        .column(Column::CommitId)
        .column(branch::Column::Name)
        .join(JoinType::InnerJoin, branch_commit::Relation::Branch.def())
        .filter(Column::CommitId.is_in(commit_ids.iter().copied()))
        .into_tuple()
        .all(db)
        .await
        .map_err(RepositoryError::from)?;

    let mut names: HashMap<Uuid, Vec<String>> = HashMap::new();
    for (commit_id, name) in rows {
        names.entry(commit_id).or_default().push(name);
    }
    for list in names.values_mut() {
        list.sort();
        list.dedup();
    }
    Ok(names)
}

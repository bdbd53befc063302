//! User lookups for author resolution.

use std::collections::HashMap;

use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder};
use uuid::Uuid;

use crate::entity::{
    agreement::{self, Entity as Agreement},
    agreement_status::AgreementStatus,
    user::{Column, Entity as User, Model},
};

use super::errors::{RepositoryError, Result};

/// A user collaborating on a project through an active agreement.
#[derive(Debug, Clone)]
pub struct Collaborator {
    pub user: Model,
    pub agreement_id: Uuid,
}

pub async fn find_by_id(db: &DatabaseConnection, id: Uuid) -> Result<Option<Model>> {
    User::find_by_id(id)
        .one(db)
        .await
        .map_err(RepositoryError::from)
}

/// Users with an active agreement on a project.
///
/// If a user holds several active agreements on the same project, the oldest
/// one wins.
pub async fn find_collaborators(
    db: &DatabaseConnection,
    project_id: Uuid,
) -> Result<Vec<Collaborator>> {
    let agreements = Agreement::find()
        .filter(agreement::Column::ProjectId.eq(project_id))
        .filter(agreement::Column::Status.eq(AgreementStatus::Active))
        .order_by_asc(agreement::Column::CreatedAt)
        .order_by_asc(agreement::Column::Id)
        .all(db)
        .await?;

    let mut by_user: HashMap<Uuid, Uuid> = HashMap::new();
    for agreement in &agreements {
        by_user
            .entry(agreement.counterparty_id)
            .or_insert(agreement.id);
    }
    if by_user.is_empty() {
        return Ok(Vec::new());
    }

    let users = User::find()
        .filter(Column::Id.is_in(by_user.keys().copied()))
        .order_by_asc(Column::CreatedAt)
        .all(db)
        .await?;

    Ok(users
        .into_iter()
        .filter_map(|user| {
            by_user.get(&user.id).map(|&agreement_id| Collaborator {
                user,
                agreement_id,
            })
        })
        .collect())
}

/// Users by id.
pub async fn find_many(db: &DatabaseConnection, ids: &[Uuid]) -> Result<Vec<Model>> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    User::find()
        .filter(Column::Id.is_in(ids.iter().copied()))
        .all(db)
        .await
        .map_err(RepositoryError::from)
}

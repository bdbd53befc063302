//! Branch entity - a branch discovered on a project's repository.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Branches are created once on discovery and never renamed. Their creation
/// order decides which ones the poller picks first.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "branches")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub project_id: Uuid,
    pub name: String,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::project::Entity",
        from = "Column::ProjectId",
        to = "super::project::Column::Id"
    )]
    Project,
    #[sea_orm(has_many = "super::branch_commit::Entity")]
    BranchCommits,
}

impl Related<super::project::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Project.def()
    }
}

impl Related<super::branch_commit::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::BranchCommits.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

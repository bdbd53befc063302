//! Project entity - a unit of work linked to at most one GitHub repository.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "projects")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub name: String,
    /// The owning user; their token is used for all GitHub calls of this project.
    pub owner_id: Uuid,
    /// Linked repository in `owner/name` form.
    pub github_repo: Option<String>,
    /// Poll watermark. Advanced at the start of every poll attempt.
    pub github_last_polled_at: Option<DateTimeWithTimeZone>,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::OwnerId",
        to = "super::user::Column::Id"
    )]
    Owner,
    #[sea_orm(has_many = "super::branch::Entity")]
    Branches,
    #[sea_orm(has_many = "super::commit::Entity")]
    Commits,
    #[sea_orm(has_many = "super::agreement::Entity")]
    Agreements,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Owner.def()
    }
}

impl Related<super::branch::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Branches.def()
    }
}

impl Related<super::commit::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Commits.def()
    }
}

impl Related<super::agreement::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Agreements.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// The linked repository reference, if present and non-blank.
    pub fn repository(&self) -> Option<&str> {
        self.github_repo
            .as_deref()
            .map(str::trim)
            .filter(|repo| !repo.is_empty())
    }

    /// Topic on which aggregate updates for this project are published.
    pub fn topic(&self) -> String {
        topic_for(self.id)
    }
}

/// Topic name for a project id.
pub fn topic_for(project_id: Uuid) -> String {
    format!("project:{project_id}:commits")
}

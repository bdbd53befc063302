//! Commit entity - one row per (project, sha), shared by every branch that contains it.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::entity::contributor::Contributor;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "commits")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    // ─── Identity ────────────────────────────────────────────────────────────
    pub project_id: Uuid,
    pub sha: String,

    // ─── Authorship ──────────────────────────────────────────────────────────
    /// Registered author. Mutually exclusive with `unregistered_author`.
    pub user_id: Option<Uuid>,
    /// Display name of an author with no internal account.
    pub unregistered_author: Option<String>,
    /// Active agreement between the author and the project owner, if any.
    pub agreement_id: Option<Uuid>,

    // ─── Content ─────────────────────────────────────────────────────────────
    #[sea_orm(column_type = "Text")]
    pub message: String,
    pub committed_at: DateTimeWithTimeZone,

    // ─── Diff statistics ─────────────────────────────────────────────────────
    /// NULL until the commit has been fetched in full.
    pub lines_added: Option<i32>,
    /// NULL until the commit has been fetched in full.
    pub lines_removed: Option<i32>,
    /// Per-file changes as a JSON array of [`ChangedFile`].
    #[sea_orm(column_type = "Json", nullable)]
    pub changed_files: Option<serde_json::Value>,

    // ─── Tracking ────────────────────────────────────────────────────────────
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::project::Entity",
        from = "Column::ProjectId",
        to = "super::project::Column::Id"
    )]
    Project,
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id"
    )]
    User,
    #[sea_orm(has_many = "super::branch_commit::Entity")]
    BranchCommits,
}

impl Related<super::project::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Project.def()
    }
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl Related<super::branch_commit::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::BranchCommits.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// One file touched by a commit.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangedFile {
    pub filename: String,
    pub status: String,
    pub additions: i64,
    pub deletions: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patch: Option<String>,
}

impl Model {
    /// The authorship of this commit, or `None` if the row violates the
    /// one-author-path rule.
    pub fn contributor(&self) -> Option<Contributor> {
        Contributor::from_columns(self.user_id, self.unregistered_author.clone())
    }

    /// Whether diff statistics have been recorded.
    pub fn has_stats(&self) -> bool {
        self.lines_added.is_some() && self.lines_removed.is_some()
    }

    /// Decode the stored per-file changes.
    pub fn files(&self) -> Vec<ChangedFile> {
        self.changed_files
            .clone()
            .and_then(|value| serde_json::from_value(value).ok())
            .unwrap_or_default()
    }

    /// First line of the commit message.
    pub fn summary(&self) -> &str {
        self.message.lines().next().unwrap_or_default()
    }
}

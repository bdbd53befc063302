//! User entity - internal identities that commits can be attributed to.
//!
//! Users are managed elsewhere; the sync pipeline only reads them to resolve
//! commit authors and to find the project owner's GitHub credential.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    /// Primary email address, matched case-insensitively against commit emails.
    pub email: String,
    /// GitHub login, matched case-insensitively against commit author logins.
    pub github_handle: Option<String>,
    pub full_name: String,
    #[sea_orm(column_type = "Text", nullable)]
    pub avatar_url: Option<String>,
    /// Personal access token used for every project this user owns.
    #[serde(skip_serializing)]
    #[sea_orm(column_type = "Text", nullable)]
    pub github_token: Option<String>,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::project::Entity")]
    Projects,
    #[sea_orm(has_many = "super::commit::Entity")]
    Commits,
}

impl Related<super::project::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Projects.def()
    }
}

impl Related<super::commit::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Commits.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// The owner's credential, if one is configured and non-blank.
    pub fn credential(&self) -> Option<&str> {
        self.github_token
            .as_deref()
            .map(str::trim)
            .filter(|token| !token.is_empty())
    }
}

// Tokens must never end up in logs.
impl std::fmt::Debug for Model {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("User")
            .field("id", &self.id)
            .field("email", &self.email)
            .field("github_handle", &self.github_handle)
            .field("full_name", &self.full_name)
            .field("has_token", &self.credential().is_some())
            .finish()
    }
}

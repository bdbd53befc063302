//! Mapping of commit authors to internal users.

use std::collections::HashMap;

use sea_orm::DatabaseConnection;
use uuid::Uuid;

use crate::entity::{project, user};
use crate::repository::{self, RepositoryError, users};

/// Known identities of a project: its owner and the counterparties of its
/// active agreements. Lookups are case-insensitive.
#[derive(Debug, Default, Clone)]
pub struct AuthorDirectory {
    by_email: HashMap<String, Uuid>,
    by_handle: HashMap<String, Uuid>,
    agreements: HashMap<Uuid, Uuid>,
}

fn key(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_lowercase())
}

impl AuthorDirectory {
    /// Load the directory of a project.
    pub async fn load(
        db: &DatabaseConnection,
        project: &project::Model,
    ) -> repository::Result<Self> {
        let owner = users::find_by_id(db, project.owner_id)
            .await?
            .ok_or_else(|| RepositoryError::not_found("user", project.owner_id))?;
        let collaborators = users::find_collaborators(db, project.id).await?;

        let mut directory = Self::default();
        directory.add_user(&owner, None);
        for collaborator in &collaborators {
            directory.add_user(&collaborator.user, Some(collaborator.agreement_id));
        }
        Ok(directory)
    }

    /// Register a user. The first user registered under an email or handle
    /// keeps it.
    pub fn add_user(&mut self, user: &user::Model, agreement_id: Option<Uuid>) {
        if let Some(email) = key(&user.email) {
            self.by_email.entry(email).or_insert(user.id);
        }
        if let Some(handle) = user.github_handle.as_deref().and_then(key) {
            self.by_handle.entry(handle).or_insert(user.id);
        }
        if let Some(agreement_id) = agreement_id {
            self.agreements.entry(user.id).or_insert(agreement_id);
        }
    }

    /// Resolve an author: account login against handles, then git email
    /// against emails, then git name against handles.
    pub fn resolve(
        &self,
        login: Option<&str>,
        email: Option<&str>,
        name: Option<&str>,
    ) -> Option<Uuid> {
        login
            .and_then(key)
            .and_then(|login| self.by_handle.get(&login))
            .or_else(|| {
                email
                    .and_then(key)
                    .and_then(|email| self.by_email.get(&email))
            })
            .or_else(|| name.and_then(key).and_then(|name| self.by_handle.get(&name)))
            .copied()
    }

    /// The active agreement of a user on the project, if any.
    pub fn agreement_for(&self, user_id: Uuid) -> Option<Uuid> {
        self.agreements.get(&user_id).copied()
    }

    pub fn len(&self) -> usize {
        let mut ids: Vec<&Uuid> = self.by_email.values().chain(self.by_handle.values()).collect();
        ids.sort();
        ids.dedup();
        ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_email.is_empty() && self.by_handle.is_empty()
    }
}

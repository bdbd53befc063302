//! Commit authorship.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Who a commit is attributed to.
///
/// Stored as two mutually exclusive columns on `commits`
/// (`user_id`, `unregistered_author`); exactly one of them is set.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Contributor {
    /// An internal user.
    Registered(Uuid),
    /// An author with no internal account, identified by display name.
    Unregistered(String),
}

impl Contributor {
    /// Split into the `(user_id, unregistered_author)` column pair.
    pub fn into_columns(self) -> (Option<Uuid>, Option<String>) {
        match self {
            Contributor::Registered(id) => (Some(id), None),
            Contributor::Unregistered(name) => (None, Some(name)),
        }
    }

    /// Rebuild from the column pair. Returns `None` unless exactly one is set.
    pub fn from_columns(user_id: Option<Uuid>, unregistered: Option<String>) -> Option<Self> {
        match (user_id, unregistered) {
            (Some(id), None) => Some(Contributor::Registered(id)),
            (None, Some(name)) if !name.trim().is_empty() => Some(Contributor::Unregistered(name)),
            _ => None,
        }
    }

    pub fn user_id(&self) -> Option<Uuid> {
        match self {
            Contributor::Registered(id) => Some(*id),
            Contributor::Unregistered(_) => None,
        }
    }
}

//! Persistence operations for the sync pipeline.
//!
//! Every write that can race with another worker goes through a single
//! conflict-aware statement (see [`upsert_many`]) so concurrent ingestion of
//! overlapping branches converges on one row per natural key.

mod bulk;
mod errors;

pub mod branches;
pub mod commits;
pub mod links;
pub mod projects;
pub mod users;

pub use bulk::{upsert_many, upsert_many_with_retry};
pub use commits::StatsWrite;
pub use errors::{RepositoryError, Result};
pub use projects::ProjectWithOwner;
pub use users::Collaborator;

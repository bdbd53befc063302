//! gitrail - GitHub activity synchronization.
//!
//! Keeps a local record of the commits pushed to the GitHub repositories
//! linked to projects. A poller picks projects that are due, workers ingest
//! their branches, and a self-rescheduling enricher backfills per-commit diff
//! statistics while staying under the owner's API quota. Every change to a
//! project's commits is followed by a broadcast of its aggregate view.
//!
//! # Features
//!
//! - `github` - The octocrab-backed [`github::GitHubClient`].
//! - `sqlite` / `postgres` - Database drivers.
//! - `migrate` - Enables database migration support. When enabled, you can use
//!   [`connect_and_migrate`] to create the schema on connection.
//!
//! # Example
//!
//! ```ignore
//! use gitrail::{connect_and_migrate, sync::SyncContext};
//!
//! let db = connect_and_migrate("sqlite://gitrail.db?mode=rwc").await?;
//! let ctx = SyncContext::builder()
//!     .database(Arc::new(db))
//!     .clients(Arc::new(gitrail::github::OctocrabClientFactory::default()))
//!     .queue(Arc::new(queue))
//!     .build()?;
//!
//! let report = ctx.poller().run_cycle(chrono::Utc::now()).await?;
//! println!("Enqueued {} ingestion jobs", report.jobs_enqueued);
//! ```

pub mod broadcast;
pub mod db;
pub mod entity;
pub mod lock;
pub mod platform;
pub mod queue;
pub mod repository;
pub mod retry;
pub mod sync;

#[cfg(feature = "github")]
pub mod github;

#[cfg(feature = "migrate")]
pub mod migration;

pub use db::connect;
#[cfg(feature = "migrate")]
pub use db::connect_and_migrate;
pub use entity::prelude::*;
pub use platform::{RateLimitInfo, RepoRef, RepositoryClient, RepositoryUnavailable};
pub use queue::{IngestMode, Job, JobError};
pub use repository::RepositoryError;

//! The sync pipeline: polling, ingestion, enrichment and discovery.
//!
//! - [`types`] - Settings, reports and outcomes
//! - [`context`] - Shared handles and the builder for them
//! - [`authors`] - Commit author resolution
//! - [`ingest`] - Per-branch commit ingestion
//! - [`poller`] - Periodic selection of due projects
//! - [`enrich`] - Diff statistics backfill
//! - [`discover`] - Branch discovery
//! - [`runner`] - Job dispatch for the worker pool
//!
//! ```ignore
//! use gitrail::sync::SyncContext;
//! use gitrail::queue::{TokioJobQueue, WorkerPool, WorkerConfig};
//!
//! let (queue, receiver) = TokioJobQueue::new();
//! let ctx = SyncContext::builder()
//!     .database(Arc::new(db))
//!     .clients(factory)
//!     .queue(Arc::new(queue))
//!     .build()?;
//!
//! let pool = WorkerPool::spawn(receiver, Arc::new(ctx.runner()), WorkerConfig::default(), stop_rx.clone());
//! ctx.poller().run(stop_rx).await;
//! ```

mod authors;
mod context;
mod discover;
mod enrich;
mod ingest;
mod poller;
mod runner;
mod types;

pub use authors::AuthorDirectory;
pub use context::{SyncConfig, SyncContext, SyncContextBuilder, SyncContextError};
pub use discover::{discover_branches, is_valid_branch_name};
pub use enrich::StatsEnricher;
pub use ingest::CommitIngestor;
pub use poller::Poller;
pub use runner::SyncRunner;

// Re-export types
pub use types::{
    AbandonPolicy, DiscoverReport, EnrichConfig, EnrichOutcome, IngestConfig, IngestReport,
    PollReport, PollerConfig, RescheduleReason, enrich_chain_key,
};

// Re-export constants
pub use types::{
    DEFAULT_CHAIN_MARKER_TTL, DEFAULT_CONTINUE_DELAY, DEFAULT_ENRICH_BATCH_SIZE, DEFAULT_MAX_BRANCHES_PER_PROJECT,
    DEFAULT_MAX_RESCHEDULES, DEFAULT_MIN_RATE_LIMIT_WAIT, DEFAULT_POLL_CADENCE,
    DEFAULT_SAFETY_WINDOW, POLLER_LOCK_KEY,
};

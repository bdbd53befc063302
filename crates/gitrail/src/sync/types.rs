//! Settings and reports of the sync pipeline.

use std::time::Duration;

use crate::broadcast::DEFAULT_RECENT_LIMIT;
use crate::queue::IngestMode;
use crate::retry::RetryConfig;

/// Poller tick interval.
pub const DEFAULT_POLL_CADENCE: Duration = Duration::from_secs(60);

/// Projects polled more recently than this are skipped. Slightly below the
/// cadence so a project is picked up on every tick.
pub const DEFAULT_SAFETY_WINDOW: Duration = Duration::from_secs(50);

/// Branches per project enqueued on each poll.
pub const DEFAULT_MAX_BRANCHES_PER_PROJECT: u64 = 3;

/// Key of the lock wrapping a poll cycle.
pub const POLLER_LOCK_KEY: &str = "poller:cycle";

/// Commits enriched per run.
pub const DEFAULT_ENRICH_BATCH_SIZE: u64 = 20;

/// Reschedules after which enrichment of a project is abandoned.
pub const DEFAULT_MAX_RESCHEDULES: u32 = 10;

/// Lower bound of the delay when rescheduling on quota exhaustion.
pub const DEFAULT_MIN_RATE_LIMIT_WAIT: Duration = Duration::from_secs(5 * 60);

/// Delay before the next batch when commits remain.
pub const DEFAULT_CONTINUE_DELAY: Duration = Duration::from_secs(30);

/// How long a pending enrichment chain keeps others from starting, on top of
/// the delay of its next run.
pub const DEFAULT_CHAIN_MARKER_TTL: Duration = Duration::from_secs(30 * 60);

/// Key of the marker held while an enrichment chain is pending for a project.
pub fn enrich_chain_key(project_id: uuid::Uuid) -> String {
    format!("enrich:{project_id}")
}

/// Number of rows logged as samples when a persistence step fails.
pub const FAILURE_SAMPLE_SIZE: usize = 3;

#[derive(Debug, Clone)]
pub struct IngestConfig {
    /// Retries of transient database errors on upserts.
    pub retry: RetryConfig,
    /// Recent commits carried by the broadcast after ingestion.
    pub recent_limit: u64,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            retry: RetryConfig::default(),
            recent_limit: DEFAULT_RECENT_LIMIT,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PollerConfig {
    pub cadence: Duration,
    pub safety_window: Duration,
    pub max_branches_per_project: u64,
    /// Mode of the ingestion jobs the poller enqueues.
    pub ingest_mode: IngestMode,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            cadence: DEFAULT_POLL_CADENCE,
            safety_window: DEFAULT_SAFETY_WINDOW,
            max_branches_per_project: DEFAULT_MAX_BRANCHES_PER_PROJECT,
            ingest_mode: IngestMode::Fast,
        }
    }
}

/// Log level used when enrichment of a project is abandoned.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AbandonPolicy {
    #[default]
    Warn,
    Error,
}

#[derive(Debug, Clone)]
pub struct EnrichConfig {
    pub batch_size: u64,
    pub max_reschedules: u32,
    pub min_rate_limit_wait: Duration,
    pub continue_delay: Duration,
    pub abandon_policy: AbandonPolicy,
    /// Lifetime of the pending-chain marker past the next scheduled run.
    pub chain_marker_ttl: Duration,
}

impl Default for EnrichConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_ENRICH_BATCH_SIZE,
            max_reschedules: DEFAULT_MAX_RESCHEDULES,
            min_rate_limit_wait: DEFAULT_MIN_RATE_LIMIT_WAIT,
            continue_delay: DEFAULT_CONTINUE_DELAY,
            abandon_policy: AbandonPolicy::Warn,
            chain_marker_ttl: DEFAULT_CHAIN_MARKER_TTL,
        }
    }
}

/// Result of ingesting one branch.
///
/// An aborted run (code host unavailable) is reported as all zeroes.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct IngestReport {
    /// Commits returned by the listing.
    pub fetched: usize,
    /// Entries without sha or commit payload.
    pub skipped_malformed: usize,
    /// Commits whose author matched no known user.
    pub skipped_unresolved: usize,
    /// Commit rows inserted or updated.
    pub persisted: u64,
    /// Branch links newly created.
    pub linked: u64,
    pub enrichment_enqueued: bool,
    /// Messages handed to the publisher.
    pub published: usize,
}

/// Result of one poll cycle.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PollReport {
    /// The cycle lock was held elsewhere; nothing was done.
    pub skipped_locked: bool,
    pub eligible_projects: usize,
    pub projects_polled: usize,
    pub jobs_enqueued: usize,
    pub invalid_branches: usize,
    pub failed_projects: usize,
}

/// Why enrichment was rescheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RescheduleReason {
    /// The quota is (nearly) spent.
    RateLimited,
    /// The quota could not be read.
    QuotaUnavailable,
    /// The batch finished and commits remain.
    MoreRemaining,
}

/// Result of one enrichment run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnrichOutcome {
    /// No commit of the project lacks stats anymore.
    Done { enriched: usize },
    /// A follow-up run was enqueued.
    Rescheduled {
        delay: Duration,
        attempt: u32,
        reason: RescheduleReason,
        enriched: usize,
    },
    /// The reschedule budget is spent; commits still lack stats.
    Abandoned { attempt: u32, remaining: u64 },
    ProjectMissing,
    /// The project lost its repository link or its owner's credential.
    Ineligible,
}

/// Result of branch discovery.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DiscoverReport {
    pub listed: usize,
    pub invalid: usize,
    pub created: u64,
}

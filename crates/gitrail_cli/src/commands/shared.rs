use std::sync::Arc;

use gitrail::broadcast::ChannelPublisher;
use gitrail::github::OctocrabClientFactory;
use gitrail::lock::DbJobLock;
use gitrail::platform::ApiRateLimiter;
use gitrail::queue::{JobQueue, MemoryJobQueue, ScheduledJob, WorkerConfig, run_job};
use gitrail::sync::{SyncContext, SyncRunner};
use sea_orm::DatabaseConnection;

use crate::config::Config;

/// GitHub clients for every owner token, paced by one shared limiter.
pub(crate) fn client_factory(config: &Config) -> OctocrabClientFactory {
    let pacer = ApiRateLimiter::new(config.rate_limit.requests_per_second);
    OctocrabClientFactory::new(Some(pacer))
}

/// Build a context over `queue`, using the database for the poll lock.
pub(crate) fn build_context(
    config: &Config,
    db: Arc<DatabaseConnection>,
    queue: Arc<dyn JobQueue>,
    publisher: Arc<ChannelPublisher>,
) -> Result<SyncContext, Box<dyn std::error::Error>> {
    let lock = Arc::new(DbJobLock::new(db.clone()));
    let ctx = SyncContext::builder()
        .database(db)
        .clients(Arc::new(client_factory(config)))
        .queue(queue)
        .publisher(publisher)
        .lock(lock)
        .config(config.sync_config())
        .build()?;
    Ok(ctx)
}

/// A context whose jobs are recorded instead of sent to workers, for
/// one-off commands.
pub(crate) fn inline_context(
    config: &Config,
    db: Arc<DatabaseConnection>,
) -> Result<(SyncContext, Arc<MemoryJobQueue>), Box<dyn std::error::Error>> {
    let queue = Arc::new(MemoryJobQueue::new());
    let ctx = build_context(
        config,
        db,
        queue.clone(),
        Arc::new(ChannelPublisher::default()),
    )?;
    Ok((ctx, queue))
}

/// Counts of an inline drain.
#[derive(Debug, Default)]
pub(crate) struct DrainSummary {
    pub(crate) completed: usize,
    pub(crate) failed: usize,
    /// Jobs scheduled for later; inline runs do not wait for them.
    pub(crate) deferred: Vec<ScheduledJob>,
}

/// Run recorded jobs in this process until none are left.
///
/// Immediate jobs may enqueue more immediate jobs (ingestion enqueues
/// enrichment); delayed ones are returned instead of waited for.
pub(crate) async fn drain_inline(
    runner: &SyncRunner,
    queue: &MemoryJobQueue,
    config: &WorkerConfig,
) -> DrainSummary {
    let mut summary = DrainSummary::default();

    loop {
        let pending = queue.take();
        if pending.is_empty() {
            break;
        }

        for scheduled in pending {
            if scheduled.delay.is_some() {
                summary.deferred.push(scheduled);
                continue;
            }

            match run_job(runner, &scheduled.job, config).await {
                Ok(()) => summary.completed += 1,
                Err(e) => {
                    summary.failed += 1;
                    tracing::error!(
                        job = scheduled.job.kind(),
                        project_id = %scheduled.job.project_id(),
                        error = %e,
                        "Job failed"
                    );
                }
            }
        }
    }

    summary
}

pub(crate) fn print_deferred(deferred: &[ScheduledJob]) {
    for scheduled in deferred {
        let delay = scheduled.delay.unwrap_or_default();
        println!(
            "  deferred: {} for project {} in {}s",
            scheduled.job.kind(),
            scheduled.job.project_id(),
            delay.as_secs()
        );
    }
}

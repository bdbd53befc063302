//! Background job queue and worker pool.
//!
//! Jobs carry all their state in their arguments, so a job can be enqueued
//! any number of times and run by any worker. Delayed jobs are held by a timer
//! task and handed to the queue when due.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::{Mutex as AsyncMutex, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::Instrument;
use uuid::Uuid;

use crate::lock::LockError;
use crate::platform::RepositoryUnavailable;
use crate::repository::RepositoryError;
use crate::retry::{RetryConfig, with_retry};

/// Default number of concurrent workers.
pub const DEFAULT_WORKERS: usize = 4;

/// Default upper bound on a single job run.
pub const DEFAULT_JOB_TIMEOUT: Duration = Duration::from_secs(10 * 60);

/// How commits are fetched during ingestion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestMode {
    /// Fetch every commit individually, with diff statistics.
    #[default]
    Full,
    /// Use the branch listing only; statistics are backfilled later.
    Fast,
}

/// A unit of background work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "job", rename_all = "snake_case")]
pub enum Job {
    /// Fetch and persist the commits of one branch.
    IngestBranch {
        project_id: Uuid,
        branch_id: Uuid,
        mode: IngestMode,
    },
    /// Backfill diff statistics of a project, one batch per run.
    EnrichStats { project_id: Uuid, attempt: u32 },
    /// List the repository's branches and record unknown ones.
    DiscoverBranches { project_id: Uuid },
}

impl Job {
    /// Short name for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Job::IngestBranch { .. } => "ingest_branch",
            Job::EnrichStats { .. } => "enrich_stats",
            Job::DiscoverBranches { .. } => "discover_branches",
        }
    }

    pub fn project_id(&self) -> Uuid {
        match self {
            Job::IngestBranch { project_id, .. }
            | Job::EnrichStats { project_id, .. }
            | Job::DiscoverBranches { project_id } => *project_id,
        }
    }
}

/// Errors from enqueueing.
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Job queue is closed")]
    Closed,
}

/// Errors a job run can end with.
#[derive(Debug, Error)]
pub enum JobError {
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Unavailable(#[from] RepositoryUnavailable),

    #[error(transparent)]
    Queue(#[from] QueueError),

    #[error(transparent)]
    Lock(#[from] LockError),

    #[error("Job timed out after {0:?}")]
    Timeout(Duration),
}

impl JobError {
    /// Whether running the job again may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            JobError::Repository(err) => err.is_transient(),
            JobError::Lock(LockError::Store(_)) => true,
            JobError::Timeout(_) => true,
            JobError::Unavailable(_) | JobError::Queue(_) | JobError::Lock(_) => false,
        }
    }
}

/// Where jobs are submitted.
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Submit a job for immediate execution.
    async fn enqueue(&self, job: Job) -> Result<(), QueueError>;

    /// Submit a job to run after `delay`.
    async fn enqueue_in(&self, job: Job, delay: Duration) -> Result<(), QueueError>;
}

/// Executes jobs taken from a queue.
#[async_trait]
pub trait JobHandler: Send + Sync {
    async fn handle(&self, job: &Job) -> Result<(), JobError>;
}

/// In-process queue over a tokio channel.
#[derive(Clone)]
pub struct TokioJobQueue {
    tx: mpsc::UnboundedSender<Job>,
}

/// Receiving side of a [`TokioJobQueue`], shared by the workers.
#[derive(Clone)]
pub struct JobReceiver {
    rx: Arc<AsyncMutex<mpsc::UnboundedReceiver<Job>>>,
}

impl TokioJobQueue {
    pub fn new() -> (Self, JobReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self { tx },
            JobReceiver {
                rx: Arc::new(AsyncMutex::new(rx)),
            },
        )
    }
}

#[async_trait]
impl JobQueue for TokioJobQueue {
    async fn enqueue(&self, job: Job) -> Result<(), QueueError> {
        tracing::debug!(job = job.kind(), project_id = %job.project_id(), "Enqueued job");
        self.tx.send(job).map_err(|_| QueueError::Closed)
    }

    async fn enqueue_in(&self, job: Job, delay: Duration) -> Result<(), QueueError> {
        if self.tx.is_closed() {
            return Err(QueueError::Closed);
        }

        tracing::debug!(
            job = job.kind(),
            project_id = %job.project_id(),
            delay_secs = delay.as_secs(),
            "Scheduled job"
        );
        let tx = self.tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let kind = job.kind();
            if tx.send(job).is_err() {
                tracing::warn!(job = kind, "Dropped delayed job, queue closed");
            }
        });
        Ok(())
    }
}

/// Worker pool settings.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub workers: usize,
    pub job_timeout: Duration,
    /// Retries of a failed job with a retryable error.
    pub retry: RetryConfig,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            job_timeout: DEFAULT_JOB_TIMEOUT,
            retry: RetryConfig::default(),
        }
    }
}

/// Counts of finished jobs per worker pool.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct WorkerStats {
    pub completed: usize,
    pub failed: usize,
}

/// Run one job under the timeout, retrying retryable failures.
pub async fn run_job(
    handler: &dyn JobHandler,
    job: &Job,
    config: &WorkerConfig,
) -> Result<(), JobError> {
    let timeout = config.job_timeout;
    with_retry(
        || async move {
            tokio::time::timeout(timeout, handler.handle(job))
                .await
                .map_err(|_| JobError::Timeout(timeout))?
        },
        JobError::is_retryable,
        &config.retry,
        job.kind(),
    )
    .await
}

/// A fixed set of tokio tasks draining a [`JobReceiver`].
pub struct WorkerPool {
    handles: Vec<JoinHandle<WorkerStats>>,
}

impl WorkerPool {
    /// Start `config.workers` workers. They stop when `shutdown` turns true
    /// or every queue handle has been dropped.
    pub fn spawn(
        receiver: JobReceiver,
        handler: Arc<dyn JobHandler>,
        config: WorkerConfig,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        let handles = (0..config.workers.max(1))
            .map(|worker| {
                let receiver = receiver.clone();
                let handler = Arc::clone(&handler);
                let config = config.clone();
                let shutdown = shutdown.clone();
                tokio::spawn(worker_loop(worker, receiver, handler, config, shutdown))
            })
            .collect();

        Self { handles }
    }

    /// Wait for every worker to stop and sum their counts.
    pub async fn join(self) -> WorkerStats {
        let mut total = WorkerStats::default();
        for handle in self.handles {
            match handle.await {
                Ok(stats) => {
                    total.completed += stats.completed;
                    total.failed += stats.failed;
                }
                Err(e) => tracing::error!(error = %e, "Worker task panicked"),
            }
        }
        total
    }
}

async fn next_job(receiver: &JobReceiver, shutdown: &mut watch::Receiver<bool>) -> Option<Job> {
    if *shutdown.borrow() {
        return None;
    }
    tokio::select! {
        _ = shutdown.wait_for(|stop| *stop) => None,
        job = async { receiver.rx.lock().await.recv().await } => job,
    }
}

async fn worker_loop(
    worker: usize,
    receiver: JobReceiver,
    handler: Arc<dyn JobHandler>,
    config: WorkerConfig,
    mut shutdown: watch::Receiver<bool>,
) -> WorkerStats {
    let mut stats = WorkerStats::default();

    while let Some(job) = next_job(&receiver, &mut shutdown).await {
        let span = tracing::info_span!("job", worker, job = job.kind());
        match run_job(handler.as_ref(), &job, &config)
            .instrument(span)
            .await
        {
            Ok(()) => stats.completed += 1,
            Err(e) => {
                stats.failed += 1;
                tracing::error!(
                    worker,
                    job = job.kind(),
                    project_id = %job.project_id(),
                    error = %e,
                    "Job failed"
                );
            }
        }
    }

    tracing::debug!(worker, completed = stats.completed, failed = stats.failed, "Worker stopped");
    stats
}

/// A job recorded by [`MemoryJobQueue`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledJob {
    pub job: Job,
    /// `None` for immediate jobs.
    pub delay: Option<Duration>,
}

/// Queue that only records submissions. Used for inline runs and tests.
#[derive(Default)]
pub struct MemoryJobQueue {
    jobs: Mutex<Vec<ScheduledJob>>,
}

impl MemoryJobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every job submitted so far, in order.
    pub fn jobs(&self) -> Vec<ScheduledJob> {
        self.jobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Remove and return every recorded job.
    pub fn take(&self) -> Vec<ScheduledJob> {
        std::mem::take(&mut *self.jobs.lock().unwrap_or_else(PoisonError::into_inner))
    }

    fn push(&self, job: Job, delay: Option<Duration>) {
        self.jobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(ScheduledJob { job, delay });
    }
}

#[async_trait]
impl JobQueue for MemoryJobQueue {
    async fn enqueue(&self, job: Job) -> Result<(), QueueError> {
        self.push(job, None);
        Ok(())
    }

    async fn enqueue_in(&self, job: Job, delay: Duration) -> Result<(), QueueError> {
        self.push(job, Some(delay));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use sea_orm::DbErr;

    use super::*;

    fn enrich(attempt: u32) -> Job {
        Job::EnrichStats {
            project_id: Uuid::nil(),
            attempt,
        }
    }

    #[test]
    fn job_serializes_with_tag() {
        let job = Job::IngestBranch {
            project_id: Uuid::nil(),
            branch_id: Uuid::nil(),
            mode: IngestMode::Fast,
        };
        let value = serde_json::to_value(&job).unwrap();
        assert_eq!(value["job"], "ingest_branch");
        assert_eq!(value["mode"], "fast");
    }

    #[test]
    fn transient_database_errors_are_retryable() {
        let err = JobError::from(RepositoryError::from(DbErr::ConnectionAcquire(
            sea_orm::ConnAcquireErr::Timeout,
        )));
        assert!(err.is_retryable());

        let err = JobError::from(RepositoryUnavailable::not_found("acme/app", "gone"));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn memory_queue_records_delays() {
        let queue = MemoryJobQueue::new();
        queue.enqueue(enrich(0)).await.unwrap();
        queue
            .enqueue_in(enrich(1), Duration::from_secs(30))
            .await
            .unwrap();

        let jobs = queue.take();
        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[0].delay, None);
        assert_eq!(jobs[1].delay, Some(Duration::from_secs(30)));
        assert!(queue.jobs().is_empty());
    }

    struct Counting {
        seen: AtomicUsize,
        fail_first: bool,
    }

    #[async_trait]
    impl JobHandler for Counting {
        async fn handle(&self, _job: &Job) -> Result<(), JobError> {
            let n = self.seen.fetch_add(1, Ordering::SeqCst);
            if self.fail_first && n == 0 {
                return Err(JobError::Timeout(Duration::from_secs(1)));
            }
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn delayed_jobs_reach_workers_when_due() {
        let (queue, receiver) = TokioJobQueue::new();
        let (stop_tx, stop_rx) = watch::channel(false);
        let handler = Arc::new(Counting {
            seen: AtomicUsize::new(0),
            fail_first: false,
        });
        let pool = WorkerPool::spawn(
            receiver,
            handler.clone(),
            WorkerConfig {
                workers: 2,
                ..Default::default()
            },
            stop_rx,
        );

        queue.enqueue(enrich(0)).await.unwrap();
        queue
            .enqueue_in(enrich(1), Duration::from_secs(300))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(handler.seen.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_secs(300)).await;
        assert_eq!(handler.seen.load(Ordering::SeqCst), 2);

        stop_tx.send(true).unwrap();
        let stats = pool.join().await;
        assert_eq!(stats.completed, 2);
        assert_eq!(stats.failed, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn retryable_failures_are_retried() {
        let handler = Counting {
            seen: AtomicUsize::new(0),
            fail_first: true,
        };
        run_job(&handler, &enrich(0), &WorkerConfig::default())
            .await
            .unwrap();
        assert_eq!(handler.seen.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn workers_stop_when_queue_is_dropped() {
        let (queue, receiver) = TokioJobQueue::new();
        let (_stop_tx, stop_rx) = watch::channel(false);
        let handler = Arc::new(Counting {
            seen: AtomicUsize::new(0),
            fail_first: false,
        });
        let pool = WorkerPool::spawn(receiver, handler, WorkerConfig::default(), stop_rx);

        queue.enqueue(enrich(0)).await.unwrap();
        drop(queue);

        let stats = pool.join().await;
        assert_eq!(stats.completed, 1);
    }
}

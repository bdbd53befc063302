//! Shared handles of the sync pipeline.
//!
//! ```ignore
//! use gitrail::sync::SyncContext;
//!
//! let ctx = SyncContext::builder()
//!     .database(Arc::new(db))
//!     .clients(Arc::new(OctocrabClientFactory::default()))
//!     .queue(Arc::new(queue))
//!     .build()?;
//!
//! let report = ctx.poller().run_cycle(Utc::now()).await?;
//! ```

use std::sync::Arc;

use sea_orm::DatabaseConnection;

use crate::broadcast::{BroadcastConfig, ChannelPublisher, Publisher};
use crate::lock::{JobLock, MemoryJobLock};
use crate::platform::{ClientFactory, QuotaConfig, QuotaSource};
use crate::queue::JobQueue;

use super::enrich::StatsEnricher;
use super::ingest::CommitIngestor;
use super::poller::Poller;
use super::runner::SyncRunner;
use super::types::{EnrichConfig, IngestConfig, PollerConfig};

/// Error type for sync context construction.
#[derive(Debug, thiserror::Error)]
pub enum SyncContextError {
    /// Missing required field in builder.
    #[error("Missing required field: {field}")]
    MissingField { field: &'static str },
}

/// All pipeline settings.
#[derive(Debug, Clone, Default)]
pub struct SyncConfig {
    pub ingest: IngestConfig,
    pub poller: PollerConfig,
    pub enrich: EnrichConfig,
    pub quota: QuotaConfig,
    pub broadcast: BroadcastConfig,
}

/// Everything the pipeline components share. Cheap to clone.
#[derive(Clone)]
pub struct SyncContext {
    pub(crate) db: Arc<DatabaseConnection>,
    pub(crate) clients: Arc<dyn ClientFactory>,
    pub(crate) queue: Arc<dyn JobQueue>,
    pub(crate) publisher: Arc<dyn Publisher>,
    pub(crate) lock: Arc<dyn JobLock>,
    pub(crate) quota: Arc<QuotaSource>,
    pub(crate) config: SyncConfig,
}

impl SyncContext {
    pub fn builder() -> SyncContextBuilder {
        SyncContextBuilder::default()
    }

    pub fn db(&self) -> &DatabaseConnection {
        self.db.as_ref()
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn quota(&self) -> &QuotaSource {
        &self.quota
    }

    pub fn clients(&self) -> &dyn ClientFactory {
        self.clients.as_ref()
    }

    pub fn ingestor(&self) -> CommitIngestor {
        CommitIngestor::new(self.clone())
    }

    pub fn poller(&self) -> Poller {
        Poller::new(self.clone())
    }

    pub fn enricher(&self) -> StatsEnricher {
        StatsEnricher::new(self.clone())
    }

    /// Job handler dispatching every [`Job`](crate::queue::Job) kind.
    pub fn runner(&self) -> SyncRunner {
        SyncRunner::new(self.clone())
    }
}

/// Builder for creating a [`SyncContext`].
///
/// The database, client factory and queue are required. The lock defaults to
/// an in-process lock, the publisher to a [`ChannelPublisher`] without
/// subscribers.
#[derive(Default)]
pub struct SyncContextBuilder {
    db: Option<Arc<DatabaseConnection>>,
    clients: Option<Arc<dyn ClientFactory>>,
    queue: Option<Arc<dyn JobQueue>>,
    publisher: Option<Arc<dyn Publisher>>,
    lock: Option<Arc<dyn JobLock>>,
    config: SyncConfig,
}

impl SyncContextBuilder {
    pub fn database(mut self, db: Arc<DatabaseConnection>) -> Self {
        self.db = Some(db);
        self
    }

    pub fn clients(mut self, clients: Arc<dyn ClientFactory>) -> Self {
        self.clients = Some(clients);
        self
    }

    pub fn queue(mut self, queue: Arc<dyn JobQueue>) -> Self {
        self.queue = Some(queue);
        self
    }

    pub fn publisher(mut self, publisher: Arc<dyn Publisher>) -> Self {
        self.publisher = Some(publisher);
        self
    }

    pub fn lock(mut self, lock: Arc<dyn JobLock>) -> Self {
        self.lock = Some(lock);
        self
    }

    pub fn config(mut self, config: SyncConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> Result<SyncContext, SyncContextError> {
        let db = self
            .db
            .ok_or(SyncContextError::MissingField { field: "database" })?;
        let clients = self
            .clients
            .ok_or(SyncContextError::MissingField { field: "clients" })?;
        let queue = self
            .queue
            .ok_or(SyncContextError::MissingField { field: "queue" })?;

        Ok(SyncContext {
            db,
            clients,
            queue,
            publisher: self
                .publisher
                .unwrap_or_else(|| Arc::new(ChannelPublisher::default())),
            lock: self.lock.unwrap_or_else(|| Arc::new(MemoryJobLock::new())),
            quota: Arc::new(QuotaSource::new(self.config.quota)),
            config: self.config,
        })
    }
}

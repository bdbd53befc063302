//! TTL-bounded single-flight lock.
//!
//! A lock is held until it is released by its holder or until its TTL runs
//! out, whichever comes first. An expired lock can be taken over by anyone,
//! so a crashed holder never blocks work for longer than one TTL.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{
    ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, Set,
    sea_query::{Expr, OnConflict},
};
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::time::Instant;
use uuid::Uuid;

use crate::entity::job_lock::{ActiveModel, Column, Entity as JobLockRow};

/// Errors from the lock store.
#[derive(Debug, Error)]
pub enum LockError {
    #[error("Lock store error: {0}")]
    Store(#[from] DbErr),

    #[error("Invalid lock TTL: {0:?}")]
    InvalidTtl(Duration),
}

/// Proof of holding a lock, needed to release it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockToken {
    pub key: String,
    pub holder: Uuid,
}

#[async_trait]
pub trait JobLock: Send + Sync {
    /// Try to take `key` for `ttl`. Returns `None` if someone else holds it.
    async fn acquire(&self, key: &str, ttl: Duration) -> Result<Option<LockToken>, LockError>;

    /// Release a lock. Returns `false` if it had already expired and been
    /// taken by someone else.
    async fn release(&self, token: &LockToken) -> Result<bool, LockError>;

    /// Drop `key` whoever holds it. Used for markers that outlive the task
    /// that took them, such as a pending enrichment chain.
    async fn clear(&self, key: &str) -> Result<bool, LockError>;
}

/// Lock backed by the `job_locks` table, shared by every process using the
/// same database.
#[derive(Clone)]
pub struct DbJobLock {
    db: Arc<DatabaseConnection>,
}

impl DbJobLock {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl JobLock for DbJobLock {
    async fn acquire(&self, key: &str, ttl: Duration) -> Result<Option<LockToken>, LockError> {
        let ttl_chrono = chrono::Duration::from_std(ttl).map_err(|_| LockError::InvalidTtl(ttl))?;
        let now = Utc::now().fixed_offset();
        let holder = Uuid::new_v4();

        let row = ActiveModel {
            key: Set(key.to_string()),
            holder: Set(holder),
            expires_at: Set(now + ttl_chrono),
        };

        // Take over only rows whose TTL has run out.
        let on_conflict = OnConflict::column(Column::Key)
            .update_columns([Column::Holder, Column::ExpiresAt])
            .action_and_where(Expr::col((JobLockRow, Column::ExpiresAt)).lt(now))
            .to_owned();

        let affected = JobLockRow::insert(row)
            .on_conflict(on_conflict)
            .exec_without_returning(self.db.as_ref())
            .await?;

        if affected == 0 {
            tracing::debug!(key, "Lock held elsewhere");
            return Ok(None);
        }

        Ok(Some(LockToken {
            key: key.to_string(),
            holder,
        }))
    }

    async fn release(&self, token: &LockToken) -> Result<bool, LockError> {
        let result = JobLockRow::delete_many()
            .filter(Column::Key.eq(token.key.as_str()))
            .filter(Column::Holder.eq(token.holder))
            .exec(self.db.as_ref())
            .await?;

        Ok(result.rows_affected > 0)
    }

    async fn clear(&self, key: &str) -> Result<bool, LockError> {
        let result = JobLockRow::delete_many()
            .filter(Column::Key.eq(key))
            .exec(self.db.as_ref())
            .await?;

        Ok(result.rows_affected > 0)
    }
}

/// In-process lock for single-binary deployments and tests.
#[derive(Default)]
pub struct MemoryJobLock {
    held: Mutex<HashMap<String, (Uuid, Instant)>>,
}

impl MemoryJobLock {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobLock for MemoryJobLock {
    async fn acquire(&self, key: &str, ttl: Duration) -> Result<Option<LockToken>, LockError> {
        let now = Instant::now();
        let mut held = self.held.lock().await;

        if let Some((_, expires_at)) = held.get(key)
            && *expires_at > now
        {
            return Ok(None);
        }

        let holder = Uuid::new_v4();
        held.insert(key.to_string(), (holder, now + ttl));
        Ok(Some(LockToken {
            key: key.to_string(),
            holder,
        }))
    }

    async fn release(&self, token: &LockToken) -> Result<bool, LockError> {
        let mut held = self.held.lock().await;
        match held.get(&token.key) {
            Some((holder, _)) if *holder == token.holder => {
                held.remove(&token.key);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn clear(&self, key: &str) -> Result<bool, LockError> {
        Ok(self.held.lock().await.remove(key).is_some())
    }
}

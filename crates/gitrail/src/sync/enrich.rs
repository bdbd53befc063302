//! Bounded, self-rescheduling backfill of diff statistics.
//!
//! Each run enriches at most one batch and then decides whether to enqueue a
//! follow-up. The only state is the attempt counter carried by the job; it
//! grows by one per reschedule, and once it reaches the cap the project is
//! abandoned until the next fast ingestion starts a fresh chain. While a chain
//! is pending, a marker in the job lock keeps ingestion from starting another.

use std::time::Duration;

use uuid::Uuid;

use crate::entity::commit::ChangedFile;
use crate::platform::{RepoRef, RepositoryClient};
use crate::queue::{Job, JobError};
use crate::repository::{RepositoryError, commits, projects};

use super::context::SyncContext;
use super::ingest::line_count;
use super::types::{AbandonPolicy, EnrichOutcome, RescheduleReason, enrich_chain_key};

pub struct StatsEnricher {
    ctx: SyncContext,
}

/// How a batch ended.
#[derive(Debug, Default)]
struct BatchResult {
    enriched: usize,
    stopped_on_rate_limit: bool,
}

impl StatsEnricher {
    pub fn new(ctx: SyncContext) -> Self {
        Self { ctx }
    }

    /// Run one enrichment step for a project, building the client from the
    /// owner's credential.
    ///
    /// The project's pending-chain marker is renewed past the next run when
    /// rescheduling and cleared when the chain ends.
    pub async fn run(&self, project_id: Uuid, attempt: u32) -> Result<EnrichOutcome, JobError> {
        let outcome = self.step(project_id, attempt).await?;
        self.update_chain_marker(project_id, &outcome).await;
        Ok(outcome)
    }

    async fn update_chain_marker(&self, project_id: Uuid, outcome: &EnrichOutcome) {
        let key = enrich_chain_key(project_id);
        if let Err(e) = self.ctx.lock.clear(&key).await {
            tracing::warn!(%project_id, error = %e, "Failed to clear enrichment marker");
            return;
        }

        if let EnrichOutcome::Rescheduled { delay, .. } = outcome {
            let ttl = *delay + self.ctx.config.enrich.chain_marker_ttl;
            if let Err(e) = self.ctx.lock.acquire(&key, ttl).await {
                tracing::warn!(%project_id, error = %e, "Failed to renew enrichment marker");
            }
        }
    }

    async fn step(&self, project_id: Uuid, attempt: u32) -> Result<EnrichOutcome, JobError> {
        let (project, owner) = match projects::find_with_owner(&self.ctx.db, project_id).await {
            Ok(found) => found,
            Err(RepositoryError::NotFound { context }) => {
                tracing::info!(%project_id, %context, "Project gone, dropping enrichment");
                return Ok(EnrichOutcome::ProjectMissing);
            }
            Err(e) => return Err(e.into()),
        };

        let (Some(credential), Some(repo)) = (
            owner.credential(),
            project.repository().and_then(|r| r.parse::<RepoRef>().ok()),
        ) else {
            tracing::info!(%project_id, "Project no longer linked or credential missing, dropping enrichment");
            return Ok(EnrichOutcome::Ineligible);
        };

        let client = self.ctx.clients.client_for(credential)?;
        self.run_with_client(client.as_ref(), credential, project_id, &repo, attempt)
            .await
    }

    async fn run_with_client(
        &self,
        client: &dyn RepositoryClient,
        credential: &str,
        project_id: Uuid,
        repo: &RepoRef,
        attempt: u32,
    ) -> Result<EnrichOutcome, JobError> {
        let config = &self.ctx.config.enrich;

        let limiter = match self.ctx.quota.limiter(client, credential).await {
            Ok(limiter) => Some(limiter),
            Err(e) => {
                tracing::warn!(%project_id, error = %e, "Could not read rate limit");
                None
            }
        };

        let batch_calls = u32::try_from(config.batch_size).unwrap_or(u32::MAX);
        match limiter {
            Some(limiter) if limiter.can_make_request(batch_calls) => {}
            Some(limiter) => {
                tracing::info!(
                    %project_id,
                    consumption = limiter.consumption_percent(),
                    reset_in_secs = limiter.wait_time().as_secs(),
                    "Rate limit near exhaustion, deferring enrichment"
                );
                let delay = limiter.wait_time().max(config.min_rate_limit_wait);
                return self
                    .reschedule(project_id, attempt, delay, RescheduleReason::RateLimited, 0)
                    .await;
            }
            None => {
                return self
                    .reschedule(
                        project_id,
                        attempt,
                        config.min_rate_limit_wait,
                        RescheduleReason::QuotaUnavailable,
                        0,
                    )
                    .await;
            }
        }

        let batch = self.enrich_batch(client, project_id, repo).await?;
        if batch.enriched > 0 {
            // The batch spent quota the cached snapshot does not reflect.
            self.ctx.quota.invalidate(credential).await;
        }

        let remaining = commits::count_missing_stats(&self.ctx.db, project_id).await?;
        if remaining == 0 {
            tracing::info!(%project_id, enriched = batch.enriched, "Enrichment complete");
            return Ok(EnrichOutcome::Done {
                enriched: batch.enriched,
            });
        }

        let (delay, reason) = if batch.stopped_on_rate_limit {
            (config.min_rate_limit_wait, RescheduleReason::RateLimited)
        } else {
            (config.continue_delay, RescheduleReason::MoreRemaining)
        };
        self.reschedule(project_id, attempt, delay, reason, batch.enriched)
            .await
    }

    async fn enrich_batch(
        &self,
        client: &dyn RepositoryClient,
        project_id: Uuid,
        repo: &RepoRef,
    ) -> Result<BatchResult, JobError> {
        let pending =
            commits::find_missing_stats(&self.ctx.db, project_id, self.ctx.config.enrich.batch_size)
                .await?;

        let mut result = BatchResult::default();
        for commit in pending {
            let full = match client.get_commit(repo, &commit.sha).await {
                Ok(full) => full,
                Err(e) if e.is_rate_limited() => {
                    tracing::info!(%project_id, sha = %commit.sha, "Rate limited mid-batch");
                    result.stopped_on_rate_limit = true;
                    break;
                }
                Err(e) => {
                    tracing::warn!(%project_id, sha = %commit.sha, error = %e, "Commit fetch failed, ending batch");
                    break;
                }
            };

            let totals = full.totals();
            let files: Vec<ChangedFile> = full.files.into_iter().map(ChangedFile::from).collect();
            let written = commits::record_stats(
                &self.ctx.db,
                commit.id,
                line_count(totals.additions),
                line_count(totals.deletions),
                &files,
            )
            .await?;
            if written {
                result.enriched += 1;
            }
        }

        Ok(result)
    }

    async fn reschedule(
        &self,
        project_id: Uuid,
        attempt: u32,
        delay: Duration,
        reason: RescheduleReason,
        enriched: usize,
    ) -> Result<EnrichOutcome, JobError> {
        let config = &self.ctx.config.enrich;

        if attempt >= config.max_reschedules {
            let remaining = commits::count_missing_stats(&self.ctx.db, project_id).await?;
            match config.abandon_policy {
                AbandonPolicy::Warn => tracing::warn!(
                    %project_id,
                    attempt,
                    remaining,
                    ?reason,
                    "Enrichment retry budget spent, abandoning"
                ),
                AbandonPolicy::Error => tracing::error!(
                    %project_id,
                    attempt,
                    remaining,
                    ?reason,
                    "Enrichment retry budget spent, abandoning"
                ),
            }
            return Ok(EnrichOutcome::Abandoned { attempt, remaining });
        }

        let next = attempt + 1;
        self.ctx
            .queue
            .enqueue_in(
                Job::EnrichStats {
                    project_id,
                    attempt: next,
                },
                delay,
            )
            .await?;

        tracing::info!(
            %project_id,
            attempt = next,
            delay_secs = delay.as_secs(),
            ?reason,
            enriched,
            "Enrichment rescheduled"
        );
        Ok(EnrichOutcome::Rescheduled {
            delay,
            attempt: next,
            reason,
            enriched,
        })
    }
}

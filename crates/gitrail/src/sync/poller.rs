//! Periodic selection of projects due for ingestion.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

use crate::entity::project;
use crate::queue::{Job, JobError};
use crate::repository::{branches, projects};

use super::context::SyncContext;
use super::discover::is_valid_branch_name;
use super::types::{POLLER_LOCK_KEY, PollReport};

pub struct Poller {
    ctx: SyncContext,
}

/// Outcome of polling one project.
#[derive(Default)]
struct ProjectPoll {
    enqueued: usize,
    invalid: usize,
}

impl Poller {
    pub fn new(ctx: SyncContext) -> Self {
        Self { ctx }
    }

    /// Run one cycle: advance the watermark of every due project and enqueue
    /// ingestion of its oldest branches.
    ///
    /// The cycle runs under a lock whose TTL is the safety window; if another
    /// process holds it, the cycle is skipped.
    pub async fn run_cycle(&self, now: DateTime<Utc>) -> Result<PollReport, JobError> {
        let config = &self.ctx.config.poller;
        let Some(token) = self
            .ctx
            .lock
            .acquire(POLLER_LOCK_KEY, config.safety_window)
            .await?
        else {
            tracing::debug!("Poll cycle already running elsewhere, skipping");
            return Ok(PollReport {
                skipped_locked: true,
                ..Default::default()
            });
        };

        let result = self.poll_due_projects(now).await;

        if let Err(e) = self.ctx.lock.release(&token).await {
            tracing::warn!(error = %e, "Failed to release poll lock");
        }
        result
    }

    async fn poll_due_projects(&self, now: DateTime<Utc>) -> Result<PollReport, JobError> {
        let config = &self.ctx.config.poller;
        let safety_window =
            chrono::Duration::from_std(config.safety_window).unwrap_or(chrono::Duration::zero());
        let cutoff = (now - safety_window).fixed_offset();

        let due = projects::find_pollable(&self.ctx.db, cutoff).await?;
        let mut report = PollReport {
            eligible_projects: due.len(),
            ..Default::default()
        };

        for (project, _owner) in &due {
            match self.poll_project(project, now).await {
                Ok(polled) => {
                    report.projects_polled += 1;
                    report.jobs_enqueued += polled.enqueued;
                    report.invalid_branches += polled.invalid;
                }
                Err(e) => {
                    report.failed_projects += 1;
                    tracing::error!(project_id = %project.id, error = %e, "Failed to poll project");
                }
            }
        }

        tracing::info!(
            eligible = report.eligible_projects,
            polled = report.projects_polled,
            enqueued = report.jobs_enqueued,
            failed = report.failed_projects,
            "Poll cycle finished"
        );
        Ok(report)
    }

    async fn poll_project(
        &self,
        project: &project::Model,
        now: DateTime<Utc>,
    ) -> Result<ProjectPoll, JobError> {
        let config = &self.ctx.config.poller;

        // The watermark moves on every attempt, whatever its outcome.
        projects::advance_watermark(&self.ctx.db, project.id, now.fixed_offset()).await?;

        let oldest =
            branches::find_oldest(&self.ctx.db, project.id, config.max_branches_per_project)
                .await?;

        let mut polled = ProjectPoll::default();
        for branch in oldest {
            if !is_valid_branch_name(&branch.name) {
                polled.invalid += 1;
                tracing::warn!(project_id = %project.id, branch = %branch.name, "Skipping invalid branch name");
                continue;
            }
            self.ctx
                .queue
                .enqueue(Job::IngestBranch {
                    project_id: project.id,
                    branch_id: branch.id,
                    mode: config.ingest_mode,
                })
                .await?;
            polled.enqueued += 1;
        }
        Ok(polled)
    }

    /// Run cycles on the configured cadence until `shutdown` turns true.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let cadence = self.ctx.config.poller.cadence.max(Duration::from_secs(1));
        let mut ticker = tokio::time::interval(cadence);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        tracing::info!(cadence_secs = cadence.as_secs(), "Poller started");
        loop {
            tokio::select! {
                _ = shutdown.wait_for(|stop| *stop) => break,
                _ = ticker.tick() => {
                    if let Err(e) = self.run_cycle(Utc::now()).await {
                        tracing::error!(error = %e, "Poll cycle failed");
                    }
                }
            }
        }
        tracing::info!("Poller stopped");
    }
}

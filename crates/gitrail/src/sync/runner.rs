//! Job dispatch.

use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use crate::entity::{project, user};
use crate::platform::RepositoryClient;
use crate::queue::{IngestMode, Job, JobError, JobHandler};
use crate::repository::{RepositoryError, branches, projects};

use super::context::SyncContext;
use super::discover::discover_branches;
use super::types::{DiscoverReport, EnrichOutcome, IngestReport};

/// Runs every [`Job`] kind against the shared context.
#[derive(Clone)]
pub struct SyncRunner {
    ctx: SyncContext,
}

impl SyncRunner {
    pub fn new(ctx: SyncContext) -> Self {
        Self { ctx }
    }

    /// The project, its owner and a client for the owner's credential.
    ///
    /// `None` if the project is gone or can no longer be synced.
    async fn open_project(
        &self,
        project_id: Uuid,
    ) -> Result<Option<(project::Model, user::Model, Arc<dyn RepositoryClient>)>, JobError> {
        let (project, owner) = match projects::find_with_owner(&self.ctx.db, project_id).await {
            Ok(found) => found,
            Err(RepositoryError::NotFound { context }) => {
                tracing::info!(%project_id, %context, "Project gone, dropping job");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        let Some(credential) = owner.credential() else {
            tracing::info!(%project_id, "Owner has no credential, dropping job");
            return Ok(None);
        };
        let client = self.ctx.clients.client_for(credential)?;
        Ok(Some((project, owner, client)))
    }

    pub async fn ingest(
        &self,
        project_id: Uuid,
        branch_id: Uuid,
        mode: IngestMode,
    ) -> Result<IngestReport, JobError> {
        let Some((project, _owner, client)) = self.open_project(project_id).await? else {
            return Ok(IngestReport::default());
        };
        let Some(branch) = branches::find_by_id(&self.ctx.db, branch_id).await? else {
            tracing::info!(%project_id, %branch_id, "Branch gone, dropping job");
            return Ok(IngestReport::default());
        };
        if branch.project_id != project.id {
            tracing::warn!(%project_id, %branch_id, "Branch belongs to another project, dropping job");
            return Ok(IngestReport::default());
        }

        Ok(self
            .ctx
            .ingestor()
            .ingest_branch(client.as_ref(), &project, &branch, mode)
            .await)
    }

    pub async fn enrich(&self, project_id: Uuid, attempt: u32) -> Result<EnrichOutcome, JobError> {
        self.ctx.enricher().run(project_id, attempt).await
    }

    pub async fn discover(&self, project_id: Uuid) -> Result<DiscoverReport, JobError> {
        let Some((project, _owner, client)) = self.open_project(project_id).await? else {
            return Ok(DiscoverReport::default());
        };
        discover_branches(&self.ctx, client.as_ref(), &project).await
    }
}

#[async_trait]
impl JobHandler for SyncRunner {
    async fn handle(&self, job: &Job) -> Result<(), JobError> {
        match *job {
            Job::IngestBranch {
                project_id,
                branch_id,
                mode,
            } => {
                self.ingest(project_id, branch_id, mode).await?;
            }
            Job::EnrichStats {
                project_id,
                attempt,
            } => {
                self.enrich(project_id, attempt).await?;
            }
            Job::DiscoverBranches { project_id } => {
                self.discover(project_id).await?;
            }
        }
        Ok(())
    }
}

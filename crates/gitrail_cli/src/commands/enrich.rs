use std::sync::Arc;

use gitrail::sync::{EnrichOutcome, RescheduleReason};
use sea_orm::DatabaseConnection;
use uuid::Uuid;

use crate::commands::shared::inline_context;
use crate::config::Config;

/// Backfill stats of a project, one batch per run.
///
/// With `until_done`, batches that made progress and only stopped because
/// more commits remain are continued immediately; a rate limit still ends
/// the command.
pub(crate) async fn handle_enrich(
    config: &Config,
    db: Arc<DatabaseConnection>,
    project_id: Uuid,
    until_done: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let (ctx, _queue) = inline_context(config, db)?;
    let enricher = ctx.enricher();

    let mut total = 0;
    loop {
        let outcome = enricher.run(project_id, 0).await?;
        match outcome {
            EnrichOutcome::Done { enriched } => {
                total += enriched;
                println!("Enriched {total} commit(s); nothing left to backfill.");
            }
            EnrichOutcome::Rescheduled {
                reason: RescheduleReason::MoreRemaining,
                enriched,
                ..
            } if until_done && enriched > 0 => {
                total += enriched;
                continue;
            }
            EnrichOutcome::Rescheduled {
                delay,
                reason,
                enriched,
                ..
            } => {
                total += enriched;
                println!(
                    "Enriched {total} commit(s); stopped ({reason:?}), next run due in {}s.",
                    delay.as_secs()
                );
            }
            EnrichOutcome::Abandoned { remaining, .. } => {
                println!("Retry budget spent with {remaining} commit(s) still missing stats.");
            }
            EnrichOutcome::ProjectMissing => println!("Project {project_id} not found."),
            EnrichOutcome::Ineligible => {
                println!("Project {project_id} has no linked repository or owner token.");
            }
        }
        return Ok(());
    }
}

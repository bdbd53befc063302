use std::sync::Arc;

use gitrail::queue::IngestMode;
use sea_orm::DatabaseConnection;
use uuid::Uuid;

use crate::commands::shared::{drain_inline, inline_context, print_deferred};
use crate::config::Config;

pub(crate) async fn handle_ingest(
    config: &Config,
    db: Arc<DatabaseConnection>,
    project_id: Uuid,
    branch_id: Uuid,
    fast: bool,
    enrich: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let (ctx, queue) = inline_context(config, db)?;
    let mode = if fast { IngestMode::Fast } else { IngestMode::Full };

    let report = ctx.runner().ingest(project_id, branch_id, mode).await?;
    println!(
        "Fetched {} commit(s): {} stored, {} linked, {} unknown author(s), {} malformed.",
        report.fetched,
        report.persisted,
        report.linked,
        report.skipped_unresolved,
        report.skipped_malformed
    );

    if !report.enrichment_enqueued {
        return Ok(());
    }

    if enrich {
        let summary = drain_inline(&ctx.runner(), &queue, &config.worker_config()).await;
        println!(
            "Enrichment: {} run(s) completed, {} failed.",
            summary.completed, summary.failed
        );
        print_deferred(&summary.deferred);
    } else {
        println!("Stats not fetched; run `gitrail enrich {project_id}` to backfill them.");
    }
    Ok(())
}

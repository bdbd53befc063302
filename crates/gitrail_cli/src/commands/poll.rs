use std::sync::Arc;

use chrono::Utc;
use sea_orm::DatabaseConnection;

use crate::commands::shared::{drain_inline, inline_context, print_deferred};
use crate::config::Config;

/// Run one poll cycle and the jobs it produces, in this process.
pub(crate) async fn handle_poll(
    config: &Config,
    db: Arc<DatabaseConnection>,
) -> Result<(), Box<dyn std::error::Error>> {
    let (ctx, queue) = inline_context(config, db)?;

    let report = ctx.poller().run_cycle(Utc::now()).await?;
    if report.skipped_locked {
        println!("Another poll cycle is running; nothing to do.");
        return Ok(());
    }

    println!(
        "Polled {}/{} due project(s), {} job(s) queued, {} invalid branch name(s), {} failure(s).",
        report.projects_polled,
        report.eligible_projects,
        report.jobs_enqueued,
        report.invalid_branches,
        report.failed_projects
    );

    let summary = drain_inline(&ctx.runner(), &queue, &config.worker_config()).await;
    println!(
        "Ran {} job(s): {} completed, {} failed.",
        summary.completed + summary.failed,
        summary.completed,
        summary.failed
    );
    print_deferred(&summary.deferred);

    Ok(())
}

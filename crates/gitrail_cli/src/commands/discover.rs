use std::sync::Arc;

use sea_orm::DatabaseConnection;
use uuid::Uuid;

use crate::commands::shared::inline_context;
use crate::config::Config;

pub(crate) async fn handle_discover(
    config: &Config,
    db: Arc<DatabaseConnection>,
    project_id: Uuid,
) -> Result<(), Box<dyn std::error::Error>> {
    let (ctx, _queue) = inline_context(config, db)?;
    let report = ctx.runner().discover(project_id).await?;

    println!(
        "Listed {} branch(es): {} new, {} skipped as invalid.",
        report.listed, report.created, report.invalid
    );
    Ok(())
}

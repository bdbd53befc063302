use clap::ValueEnum;
use gitrail::platform::{ClientFactory, QuotaLimiter, RateLimitInfo};
use gitrail::repository::projects;
use sea_orm::DatabaseConnection;
use uuid::Uuid;

use crate::commands::shared::client_factory;
use crate::config::Config;

/// Output format for rate limit display.
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub(crate) enum OutputFormat {
    /// Display as a formatted table (default)
    #[default]
    Table,
    /// Display as JSON
    Json,
}

/// Show the quota of a project owner's token and whether enrichment would run.
pub(crate) async fn handle_limits(
    project_id: Uuid,
    output: OutputFormat,
    config: &Config,
    db: &DatabaseConnection,
) -> Result<(), Box<dyn std::error::Error>> {
    let (project, owner) = projects::find_with_owner(db, project_id).await?;
    let token = owner
        .credential()
        .ok_or_else(|| format!("Owner of project '{}' has no GitHub token.", project.name))?;

    let client = client_factory(config).client_for(token)?;
    let info = client.get_rate_limit().await?;
    let quota = config.quota_config();
    let limiter = QuotaLimiter::new(info, quota.threshold_percent);

    let batch = u32::try_from(config.enrich.batch_size).unwrap_or(u32::MAX);
    let display = RateLimitDisplay::new(&info, &limiter, batch);
    RateLimitDisplay::print_many(vec![display], output)?;
    Ok(())
}

/// Rate limit information for display.
#[derive(Debug, Clone, serde::Serialize, tabled::Tabled)]
pub(crate) struct RateLimitDisplay {
    #[tabled(rename = "Limit")]
    pub limit: String,
    #[tabled(rename = "Used")]
    pub used: String,
    #[tabled(rename = "Remaining")]
    pub remaining: String,
    #[tabled(rename = "Usage %")]
    pub usage_percent: String,
    #[tabled(rename = "Resets At")]
    pub reset_at: String,
    #[tabled(rename = "Resets In")]
    pub reset_in: String,
    #[tabled(rename = "Enrichment")]
    pub enrichment: String,
}

impl RateLimitDisplay {
    pub(crate) fn new(info: &RateLimitInfo, limiter: &QuotaLimiter, batch: u32) -> Self {
        let now = chrono::Utc::now();
        let reset_duration = info.reset_at.signed_duration_since(now);
        let reset_in = if reset_duration.num_seconds() > 0 {
            format_duration(reset_duration)
        } else {
            "now".to_string()
        };
        let enrichment = if limiter.can_make_request(batch) {
            "allowed".to_string()
        } else {
            "deferred".to_string()
        };

        Self {
            limit: info.limit.to_string(),
            used: info.used().to_string(),
            remaining: info.remaining.to_string(),
            usage_percent: format!("{}%", limiter.consumption_percent()),
            reset_at: info.reset_at.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
            reset_in,
            enrichment,
        }
    }

    pub(crate) fn print_many(
        items: Vec<Self>,
        format: OutputFormat,
    ) -> Result<(), serde_json::Error> {
        match format {
            OutputFormat::Table => {
                let mut table = tabled::Table::new(items);
                table.with(tabled::settings::Style::rounded());
                println!("{}", table);
            }
            OutputFormat::Json => {
                println!("{}", serde_json::to_string_pretty(&items)?);
            }
        }
        Ok(())
    }
}

/// Format a duration in a human-readable way.
fn format_duration(duration: chrono::Duration) -> String {
    let total_secs = duration.num_seconds();
    if total_secs < 60 {
        format!("{}s", total_secs)
    } else if total_secs < 3600 {
        let mins = total_secs / 60;
        let secs = total_secs % 60;
        if secs > 0 {
            format!("{}m {}s", mins, secs)
        } else {
            format!("{}m", mins)
        }
    } else {
        let hours = total_secs / 3600;
        let mins = (total_secs % 3600) / 60;
        if mins > 0 {
            format!("{}h {}m", hours, mins)
        } else {
            format!("{}h", hours)
        }
    }
}

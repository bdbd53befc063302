//! gitrail CLI - runs the GitHub activity sync pipeline.

mod commands;
mod config;
mod shutdown;

use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use crate::commands::limits::OutputFormat;

#[derive(Parser)]
#[command(name = "gitrail")]
#[command(version)]
#[command(about = "Keeps project commit history in sync with GitHub")]
#[command(
    long_about = "gitrail polls the GitHub repositories linked to projects, records their \
commits with author attribution, backfills diff statistics within the API rate \
limit, and publishes an updated activity summary per project."
)]
#[command(after_long_help = r#"EXAMPLES
    Create or upgrade the schema:
        $ gitrail migrate up

    Run the poller and workers until Ctrl+C:
        $ gitrail run --discover

    Run a single poll cycle and its jobs in the foreground:
        $ gitrail poll

    Backfill stats of one project:
        $ gitrail enrich 3f0c2a9e-6d1b-4c55-9b7e-2f7d0f7c1a10 --until-done

CONFIGURATION
    gitrail reads configuration from:
      1. ~/.config/gitrail/config.toml (or $XDG_CONFIG_HOME/gitrail/config.toml)
      2. ./gitrail.toml
      3. Environment variables (GITRAIL_ prefix, `__` between section and key)
      4. .env file in current directory

ENVIRONMENT VARIABLES
    GITRAIL_DATABASE__URL          Database connection string (default: ~/.local/state/gitrail/gitrail.db)
    GITRAIL_POLLER__CADENCE_SECS   Seconds between poll cycles (default: 60)
    GITRAIL_WORKERS__COUNT         Number of job workers (default: 4)
    RUST_LOG                       Log filter (default: gitrail=info,gitrail_cli=info)
"#)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate {
        #[command(subcommand)]
        action: MigrateAction,
    },
    /// Run the poller and the worker pool until Ctrl+C
    Run {
        /// Queue branch discovery for every linked project on start
        #[arg(short, long)]
        discover: bool,

        /// Print every published project update to stdout as JSON lines
        #[arg(short = 'e', long)]
        print_events: bool,
    },
    /// Run one poll cycle and the jobs it produces, then exit
    Poll,
    /// Record the branches of a project's repository
    Discover {
        /// Project id
        project: Uuid,
    },
    /// Ingest the commits of one branch
    Ingest {
        /// Project id
        project: Uuid,

        /// Branch id
        branch: Uuid,

        /// Skip per-commit fetches; stats are backfilled by enrichment
        #[arg(short, long)]
        fast: bool,

        /// With --fast, run the enrichment right away
        #[arg(short, long, requires = "fast")]
        enrich: bool,
    },
    /// Backfill missing diff statistics of a project
    Enrich {
        /// Project id
        project: Uuid,

        /// Keep going while batches make progress
        #[arg(short, long)]
        until_done: bool,
    },
    /// Show the rate limit of a project owner's token
    Limits {
        /// Project id
        project: Uuid,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
        output: OutputFormat,
    },
}

#[derive(Subcommand)]
enum MigrateAction {
    /// Apply all pending migrations
    Up,
    /// Rollback the last migration
    Down,
    /// Show migration status
    Status,
    /// Fresh install - drop all tables and reapply migrations
    Fresh,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::new("gitrail=info,gitrail_cli=info"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .init();

    // Load configuration (config file -> env vars -> defaults)
    let config = config::Config::load();

    let cli = Cli::parse();

    let database_url = config
        .database_url()
        .ok_or("Could not determine a database URL; set GITRAIL_DATABASE__URL")?;

    // Ensure the database directory exists for SQLite
    if database_url.starts_with("sqlite://") {
        let db_path = database_url.trim_start_matches("sqlite://");
        // Strip query parameters (e.g., ?mode=rwc) before path operations
        let db_path = db_path.split('?').next().unwrap_or(db_path);
        let db_path = std::path::Path::new(db_path);

        if db_path.is_relative() && !db_path.as_os_str().is_empty() {
            tracing::warn!(
                "Database path '{}' is relative - behavior depends on current directory. \
                 Consider using an absolute path.",
                db_path.display()
            );
        }

        if let Some(parent) = db_path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
    }

    if let Commands::Migrate { action } = cli.command {
        commands::migrate::handle_migrate(action, &database_url).await?;
        return Ok(());
    }

    let db = Arc::new(gitrail::connect(&database_url).await?);

    match cli.command {
        Commands::Migrate { .. } => {}
        Commands::Run {
            discover,
            print_events,
        } => {
            let shutdown = shutdown::install_shutdown_handler();
            commands::run::handle_run(&config, db, discover, print_events, shutdown).await?;
        }
        Commands::Poll => {
            commands::poll::handle_poll(&config, db).await?;
        }
        Commands::Discover { project } => {
            commands::discover::handle_discover(&config, db, project).await?;
        }
        Commands::Ingest {
            project,
            branch,
            fast,
            enrich,
        } => {
            commands::ingest::handle_ingest(&config, db, project, branch, fast, enrich).await?;
        }
        Commands::Enrich {
            project,
            until_done,
        } => {
            commands::enrich::handle_enrich(&config, db, project, until_done).await?;
        }
        Commands::Limits { project, output } => {
            commands::limits::handle_limits(project, output, &config, &db).await?;
        }
    }

    Ok(())
}

//! Database connection utilities.

use sea_orm::{Database, DatabaseConnection, DbErr};

/// Configure SQLite-specific pragmas for concurrent workers.
///
/// This sets:
/// - `journal_mode=WAL` - readers don't block the ingestion writers
/// - `busy_timeout=5000` - wait up to 5 seconds for locks instead of failing immediately
/// - `synchronous=NORMAL` - safe with WAL and cheaper than FULL
async fn configure_sqlite(db: &DatabaseConnection) -> Result<(), DbErr> {
    use sea_orm::{ConnectionTrait, Statement};

    for pragma in [
        "PRAGMA journal_mode=WAL",
        "PRAGMA busy_timeout=5000",
        "PRAGMA synchronous=NORMAL",
    ] {
        db.execute(Statement::from_string(
            db.get_database_backend(),
            pragma.to_string(),
        ))
        .await?;
    }

    Ok(())
}

fn is_file_backed_sqlite(database_url: &str) -> bool {
    database_url.starts_with("sqlite://")
}

/// Establish a connection to the database.
///
/// File-backed SQLite databases get WAL mode, a 5 second busy timeout and
/// NORMAL synchronous mode.
///
/// # Arguments
/// * `database_url` - Database connection string (e.g., `sqlite:///path/to/db` or `postgres:///gitrail`)
///
/// # Errors
/// Returns `DbErr` if the connection cannot be established.
pub async fn connect(database_url: &str) -> Result<DatabaseConnection, DbErr> {
    let db = Database::connect(database_url).await?;

    if is_file_backed_sqlite(database_url) {
        configure_sqlite(&db).await?;
    }

    Ok(db)
}

/// Establish a connection to the database and run all pending migrations.
///
/// # Errors
/// Returns `DbErr` if the connection cannot be established or migrations fail.
///
/// # Example
/// ```ignore
/// let db = gitrail::connect_and_migrate("sqlite::memory:").await?;
/// ```
#[cfg(feature = "migrate")]
pub async fn connect_and_migrate(database_url: &str) -> Result<DatabaseConnection, DbErr> {
    use sea_orm_migration::MigratorTrait;

    let db = connect(database_url).await?;
    crate::migration::Migrator::up(&db, None).await?;
    Ok(db)
}

pub mod models;
pub mod test_utils;

use sea_orm::{Database, DatabaseConnection, DbErr};
use util::{config, paths};

/// Connects to the configured database.
///
/// `DATABASE_PATH` may be a full DSN (`sqlite:...`) or a plain SQLite file
/// path; for a file path the parent directory is created first.
pub async fn connect() -> Result<DatabaseConnection, DbErr> {
    let path_or_url = config::database_path();
    let url = if path_or_url.starts_with("sqlite:") {
        path_or_url
    } else {
        let file = paths::database_file();
        paths::ensure_parent_dir(&file)
            .map_err(|e| DbErr::Custom(format!("Failed to create database directory: {}", e)))?;
        format!("sqlite://{}?mode=rwc", file.display())
    };

    tracing::debug!("Connecting to {}", url);
    Database::connect(&url).await
}

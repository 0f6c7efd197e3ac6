use sea_orm::{ConnectOptions, Database as SeaDatabase, DatabaseConnection};
use std::time::Duration;

use crate::config::Config;

/// Idle timeout and max lifetime for an in-memory SQLite connection. The
/// database is gone once its connection closes, so the pool must not reap it.
const IN_MEMORY_LIFETIME: Duration = Duration::from_secs(60 * 60 * 24 * 365);

/// Initialize the database connection from config.
pub async fn connect(config: &Config) -> Result<DatabaseConnection, sea_orm::DbErr> {
    connect_url(&config.database_url, config.is_dev()).await
}

pub async fn connect_url(url: &str, sqlx_logging: bool) -> Result<DatabaseConnection, sea_orm::DbErr> {
    SeaDatabase::connect(connect_options(url, sqlx_logging)).await
}

/// Pool options for `url`. An in-memory SQLite database is pinned to one
/// long-lived connection.
pub fn connect_options(url: &str, sqlx_logging: bool) -> ConnectOptions {
    let mut opts = ConnectOptions::new(url);
    if url.contains(":memory:") {
        opts.max_connections(1)
            .min_connections(1)
            .idle_timeout(IN_MEMORY_LIFETIME)
            .max_lifetime(IN_MEMORY_LIFETIME);
    } else {
        opts.max_connections(20)
            .min_connections(1)
            .idle_timeout(Duration::from_secs(300))
            .max_lifetime(Duration::from_secs(1800));
    }
    opts.connect_timeout(Duration::from_secs(8))
        .acquire_timeout(Duration::from_secs(8))
        .sqlx_logging(sqlx_logging);
    opts
}

//! Persistence for agora: entities, migrations and repositories.

pub mod entities;
pub mod migrations;
pub mod repositories;
pub mod test_utils;

use agora_common::{AppError, Config};
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection};
use sea_orm_migration::MigratorTrait;
use std::time::Duration;
use tracing::log::LevelFilter;

/// Open the connection pool described by `config.database`.
pub async fn init(config: &Config) -> Result<DatabaseConnection, AppError> {
    let settings = &config.database;
    let mut opt = ConnectOptions::new(&settings.url);

    opt.max_connections(settings.max_connections)
        .min_connections(settings.min_connections)
        .connect_timeout(Duration::from_secs(10))
        .acquire_timeout(Duration::from_secs(10))
        .idle_timeout(Duration::from_secs(600))
        .max_lifetime(Duration::from_secs(1800))
        .sqlx_logging(true)
        .sqlx_logging_level(LevelFilter::Debug);

    let conn = Database::connect(opt)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

    tracing::info!(
        backend = ?conn.get_database_backend(),
        max_connections = settings.max_connections,
        "Database pool ready"
    );
    Ok(conn)
}

/// Apply pending migrations and return how many ran.
pub async fn migrate(db: &DatabaseConnection) -> Result<usize, AppError> {
    let pending = migrations::Migrator::get_pending_migrations(db)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?
        .len();

    migrations::Migrator::up(db, None)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

    Ok(pending)
}

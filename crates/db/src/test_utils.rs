//! Test utilities for database operations.
//!
//! [`TestDatabase::in_memory`] gives every test its own migrated `SQLite`
//! database on a single connection. [`TestDatabase::sqlite_file`] and
//! [`TestDatabase::postgres_unique`] hand out multi-connection pools for the
//! concurrency tests; the `PostgreSQL` ones are ignored by default.

use agora_common::IdGenerator;
use sea_orm::{
    ConnectOptions, ConnectionTrait, Database, DatabaseBackend, DatabaseConnection, DbErr,
    Statement,
};
use sea_orm_migration::MigratorTrait;
use std::{path::PathBuf, sync::Arc, time::Duration};
use tracing::info;

use crate::migrations::Migrator;

/// Test database configuration.
#[derive(Debug, Clone)]
pub struct TestDbConfig {
    /// Database host.
    pub host: String,
    /// Database port.
    pub port: u16,
    /// Database username.
    pub username: String,
    /// Database password.
    pub password: String,
    /// Database name.
    pub database: String,
}

impl Default for TestDbConfig {
    fn default() -> Self {
        Self {
            host: std::env::var("TEST_DB_HOST").unwrap_or_else(|_| "localhost".to_string()),
            port: std::env::var("TEST_DB_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(5433),
            username: std::env::var("TEST_DB_USER").unwrap_or_else(|_| "agora_test".to_string()),
            password: std::env::var("TEST_DB_PASSWORD")
                .unwrap_or_else(|_| "agora_test".to_string()),
            database: std::env::var("TEST_DB_NAME").unwrap_or_else(|_| "agora_test".to_string()),
        }
    }
}

impl TestDbConfig {
    /// Get the database URL.
    #[must_use]
    pub fn database_url(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.username, self.password, self.host, self.port, self.database
        )
    }

    /// Get URL for the maintenance database (used to create and drop test databases).
    #[must_use]
    pub fn postgres_url(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/postgres",
            self.username, self.password, self.host, self.port
        )
    }
}

/// A migrated database owned by one test.
pub struct TestDatabase {
    conn: Arc<DatabaseConnection>,
    /// Postgres configuration, for databases made by [`Self::postgres_unique`].
    pub config: Option<TestDbConfig>,
    /// Backing file, for databases made by [`Self::sqlite_file`].
    pub file: Option<PathBuf>,
}

impl TestDatabase {
    /// Create a fresh in-memory `SQLite` database with all migrations applied.
    ///
    /// The pool is pinned to a single connection: every `SQLite` connection to
    /// `:memory:` opens its own empty database.
    pub async fn in_memory() -> Result<Self, DbErr> {
        let mut opt = ConnectOptions::new("sqlite::memory:");
        opt.max_connections(1)
            .min_connections(1)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(3600))
            .max_lifetime(Duration::from_secs(3600))
            .sqlx_logging(false);

        let conn = Database::connect(opt).await?;
        Migrator::up(&conn, None).await?;

        Ok(Self {
            conn: Arc::new(conn),
            config: None,
            file: None,
        })
    }

    /// Create a file-backed `SQLite` database in the temp directory, served
    /// by a pool of `max_connections` so transactions really contend.
    pub async fn sqlite_file(max_connections: u32) -> Result<Self, DbErr> {
        let path = std::env::temp_dir().join(format!(
            "agora_test_{}.db",
            IdGenerator::new().generate()
        ));

        let mut opt = ConnectOptions::new(format!("sqlite://{}?mode=rwc", path.display()));
        opt.max_connections(max_connections)
            .min_connections(1)
            .acquire_timeout(Duration::from_secs(30))
            .sqlx_logging(false);

        let conn = Database::connect(opt).await?;
        Migrator::up(&conn, None).await?;

        info!(path = %path.display(), max_connections, "Created file-backed test database");

        Ok(Self {
            conn: Arc::new(conn),
            config: None,
            file: Some(path),
        })
    }

    /// Create a uniquely named Postgres database (for parallel tests).
    pub async fn postgres_unique() -> Result<Self, DbErr> {
        let mut config = TestDbConfig::default();
        let suffix = IdGenerator::new().generate();
        config.database = format!("agora_test_{}", &suffix[suffix.len() - 10..]);

        let admin = Database::connect(&config.postgres_url()).await?;
        admin
            .execute(Statement::from_string(
                DatabaseBackend::Postgres,
                format!("CREATE DATABASE \"{}\"", config.database),
            ))
            .await?;
        admin.close().await?;

        let mut opt = ConnectOptions::new(config.database_url());
        opt.max_connections(16)
            .min_connections(1)
            .acquire_timeout(Duration::from_secs(30))
            .sqlx_logging(false);

        let conn = Database::connect(opt).await?;
        Migrator::up(&conn, None).await?;

        info!(database = %config.database, "Created unique test database");

        Ok(Self {
            conn: Arc::new(conn),
            config: Some(config),
            file: None,
        })
    }

    /// Get the database connection.
    #[must_use]
    pub fn connection(&self) -> &DatabaseConnection {
        self.conn.as_ref()
    }

    /// Share the pool with repositories.
    #[must_use]
    pub fn pool(&self) -> Arc<DatabaseConnection> {
        Arc::clone(&self.conn)
    }

    /// Remove all rows from the voting tables, keeping the schema.
    pub async fn cleanup(&self) -> Result<(), DbErr> {
        let backend = self.conn.get_database_backend();
        for table in ["vote_cast", "vote_choice", "vote", "committee_member"] {
            self.conn
                .execute(Statement::from_string(
                    backend,
                    format!("DELETE FROM \"{table}\""),
                ))
                .await?;
        }

        info!("Cleaned up test database");
        Ok(())
    }

    /// Throw away a database made by [`Self::postgres_unique`] or
    /// [`Self::sqlite_file`].
    ///
    /// The pool is closed only if no repository still shares it; the drop
    /// itself does not depend on that.
    pub async fn drop_database(self) -> Result<(), DbErr> {
        if let Ok(conn) = Arc::try_unwrap(self.conn) {
            conn.close().await?;
        }

        if let Some(path) = self.file {
            for suffix in ["", "-wal", "-shm"] {
                let mut name = path.clone().into_os_string();
                name.push(suffix);
                let _ = std::fs::remove_file(name);
            }
            info!(path = %path.display(), "Removed test database file");
        }

        let Some(config) = self.config else {
            return Ok(());
        };

        let admin = Database::connect(&config.postgres_url()).await?;
        admin
            .execute(Statement::from_string(
                DatabaseBackend::Postgres,
                format!("DROP DATABASE IF EXISTS \"{}\" WITH (FORCE)", config.database),
            ))
            .await?;
        admin.close().await?;

        info!(database = %config.database, "Dropped test database");
        Ok(())
    }
}

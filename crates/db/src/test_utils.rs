//! Test databases.
//!
//! [`in_memory`] gives every engine test its own migrated `SQLite` database.
//! [`TestDatabase`] manages a `PostgreSQL` database for the ignored
//! integration tests, configured through `TEST_DB_*` variables.

use sea_orm::{
    ConnectOptions, ConnectionTrait, Database, DatabaseBackend, DatabaseConnection, DbErr,
    EntityTrait, Statement,
};
use sea_orm_migration::MigratorTrait;
use tracing::info;

use crate::entities::{
    ApprovalDecision, ApprovalLog, ApprovalStep, ApprovalStepRole, Citizen, FieldDefinition,
    FinalDocument, PermitRequest, PermitType, PermitTypeRequirement, RequestDynamicData,
    Requirement, Role, UploadedDocument,
};
use crate::migrations::Migrator;

/// Open a fresh, fully migrated in-memory `SQLite` database.
///
/// The pool is pinned to a single connection so every query (and every
/// transaction) sees the same in-memory database. Requires the `test-utils`
/// feature, which enables the `SQLite` driver.
pub async fn in_memory() -> Result<DatabaseConnection, DbErr> {
    let mut opt = ConnectOptions::new("sqlite::memory:");
    opt.max_connections(1)
        .min_connections(1)
        .sqlx_logging(false);

    let conn = Database::connect(opt).await?;
    Migrator::up(&conn, None).await?;
    Ok(conn)
}

/// Connection settings for the `PostgreSQL` test server.
#[derive(Debug, Clone)]
pub struct TestDbConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub database: String,
}

impl Default for TestDbConfig {
    fn default() -> Self {
        let var = |name: &str, default: &str| {
            std::env::var(name).unwrap_or_else(|_| default.to_string())
        };

        Self {
            host: var("TEST_DB_HOST", "localhost"),
            port: var("TEST_DB_PORT", "5433").parse().unwrap_or(5433),
            username: var("TEST_DB_USER", "permit_hub_test"),
            password: var("TEST_DB_PASSWORD", "permit_hub_test"),
            database: var("TEST_DB_NAME", "permit_hub_test"),
        }
    }
}

impl TestDbConfig {
    /// URL of the test database itself.
    #[must_use]
    pub fn database_url(&self) -> String {
        self.url_for(&self.database)
    }

    /// URL of the server's maintenance database, used to create and drop test databases.
    #[must_use]
    pub fn postgres_url(&self) -> String {
        self.url_for("postgres")
    }

    fn url_for(&self, database: &str) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{database}",
            self.username, self.password, self.host, self.port
        )
    }
}

/// A migrated `PostgreSQL` test database.
pub struct TestDatabase {
    pub conn: DatabaseConnection,
    pub config: TestDbConfig,
}

impl TestDatabase {
    /// Connect to the configured test database and apply pending migrations.
    pub async fn new() -> Result<Self, DbErr> {
        Self::with_config(TestDbConfig::default()).await
    }

    /// Connect with explicit settings and apply pending migrations.
    pub async fn with_config(config: TestDbConfig) -> Result<Self, DbErr> {
        let conn = Database::connect(&config.database_url()).await?;
        Migrator::up(&conn, None).await?;

        info!(database = %config.database, "Connected to test database");
        Ok(Self { conn, config })
    }

    /// Create a throwaway database so tests can run in parallel.
    ///
    /// Callers drop it with [`TestDatabase::drop_database`].
    pub async fn create_unique() -> Result<Self, DbErr> {
        let mut config = TestDbConfig::default();
        let suffix = ulid::Ulid::new().to_string().to_lowercase();
        config.database = format!("permit_hub_test_{}", &suffix[suffix.len() - 10..]);

        let admin = Database::connect(&config.postgres_url()).await?;
        admin
            .execute(Statement::from_string(
                DatabaseBackend::Postgres,
                format!("CREATE DATABASE \"{}\"", config.database),
            ))
            .await?;
        admin.close().await?;

        Self::with_config(config).await
    }

    /// Get the database connection.
    #[must_use]
    pub const fn connection(&self) -> &DatabaseConnection {
        &self.conn
    }

    /// Delete every row, children before parents. The schema is kept.
    pub async fn reset(&self) -> Result<(), DbErr> {
        reset(&self.conn).await?;
        info!(database = %self.config.database, "Reset test database");
        Ok(())
    }

    /// Drop a database made by [`TestDatabase::create_unique`].
    pub async fn drop_database(self) -> Result<(), DbErr> {
        self.conn.close().await?;

        let admin = Database::connect(&self.config.postgres_url()).await?;
        admin
            .execute(Statement::from_string(
                DatabaseBackend::Postgres,
                format!("DROP DATABASE IF EXISTS \"{}\" WITH (FORCE)", self.config.database),
            ))
            .await?;
        admin.close().await?;

        info!(database = %self.config.database, "Dropped test database");
        Ok(())
    }
}

/// Delete every row of every permit table on any backend.
pub async fn reset<C: ConnectionTrait>(conn: &C) -> Result<(), DbErr> {
    FinalDocument::delete_many().exec(conn).await?;
    ApprovalDecision::delete_many().exec(conn).await?;
    ApprovalLog::delete_many().exec(conn).await?;
    UploadedDocument::delete_many().exec(conn).await?;
    RequestDynamicData::delete_many().exec(conn).await?;
    PermitRequest::delete_many().exec(conn).await?;
    Citizen::delete_many().exec(conn).await?;
    ApprovalStepRole::delete_many().exec(conn).await?;
    ApprovalStep::delete_many().exec(conn).await?;
    PermitTypeRequirement::delete_many().exec(conn).await?;
    Requirement::delete_many().exec(conn).await?;
    FieldDefinition::delete_many().exec(conn).await?;
    PermitType::delete_many().exec(conn).await?;
    Role::delete_many().exec(conn).await?;
    Ok(())
}

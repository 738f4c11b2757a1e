//! Database layer for permit-hub.
//!
//! sea-orm entities for the permit catalog, requests and approval ledger,
//! the migrations that create them, and one repository per aggregate.
//! Repository methods suffixed `_in` take any connection so services can run
//! them inside their own transactions.

pub mod entities;
pub mod migrations;
pub mod repositories;
pub mod test_utils;

use std::time::Duration;

use permit_hub_common::{AppResult, Config};
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use sea_orm_migration::MigratorTrait;
use tracing::info;

/// Open the connection pool described by `config.database`.
pub async fn init(config: &Config) -> AppResult<DatabaseConnection> {
    let settings = &config.database;
    let mut opt = ConnectOptions::new(&settings.url);
    opt.max_connections(settings.max_connections)
        .min_connections(settings.min_connections)
        .connect_timeout(Duration::from_secs(10))
        .acquire_timeout(Duration::from_secs(10))
        .idle_timeout(Duration::from_secs(600))
        .max_lifetime(Duration::from_secs(1800))
        .sqlx_logging(true);

    let db = Database::connect(opt).await?;
    info!(
        max_connections = settings.max_connections,
        min_connections = settings.min_connections,
        "Database pool ready"
    );
    Ok(db)
}

/// Apply every pending migration.
pub async fn migrate(db: &DatabaseConnection) -> AppResult<()> {
    let pending = migrations::Migrator::get_pending_migrations(db).await?.len();
    migrations::Migrator::up(db, None).await?;
    info!(applied = pending, "Schema up to date");
    Ok(())
}

//! SeaORM-backed storage adapters that satisfy the domain storage traits while
//! keeping the database backend swappable (SQLite by default, PostgreSQL via
//! feature flag).

mod accrual_store;
mod audit_store;
mod builder;
mod content_store;
mod entity;
mod errors;
mod file_store;
mod migration;
mod settings_store;
mod token_store;
mod user_store;
mod withdrawal_store;

use std::sync::Arc;

use builder::StorageBuilder;
use diskwala_domain::storage::StorageResult;
use errors::db_error;
use migration::run_migrations;
use sea_orm::{Database, DatabaseConnection};

/// Shared storage handle used by the HTTP API.
#[derive(Clone)]
pub struct SeaOrmStorage {
    db: Arc<DatabaseConnection>,
}

impl SeaOrmStorage {
    /// Connects to the provided database URL and ensures the schema is present.
    pub async fn connect(database_url: &str) -> StorageResult<Self> {
        let db = Database::connect(database_url).await.map_err(db_error)?;
        prepare_connection(&db).await?;
        Ok(Self { db: Arc::new(db) })
    }

    pub fn builder() -> StorageBuilder {
        StorageBuilder::new()
    }

    pub(crate) fn from_connection(db: DatabaseConnection) -> Self {
        Self { db: Arc::new(db) }
    }

    pub fn connection(&self) -> &DatabaseConnection {
        self.db.as_ref()
    }
}

pub(crate) async fn prepare_connection(db: &DatabaseConnection) -> StorageResult<()> {
    run_migrations(db).await
}

//! Test utilities for database integration tests
//!
//! Provides an in-memory SQLite database with the full migration set
//! applied, reusable by every crate's integration tests.

use crate::DbConnection;
use sea_orm::{ConnectOptions, Database};
use sea_orm_migration::MigratorTrait;
use std::sync::Arc;
use treebio_migrations::Migrator;

/// Per-test database backed by in-memory SQLite.
///
/// Every instance is an isolated schema; dropping it drops the data.
pub struct TestDatabase {
    pub db: Arc<DbConnection>,
    pub database_url: String,
}

impl TestDatabase {
    /// Create a fresh database and run all migrations against it.
    pub async fn with_migrations() -> anyhow::Result<Self> {
        let database_url = "sqlite::memory:".to_string();

        // A pooled in-memory SQLite gives each pooled connection its own
        // database, so the pool must stay at a single connection.
        let mut opt = ConnectOptions::new(&database_url);
        opt.max_connections(1).min_connections(1);

        let db = Database::connect(opt).await?;
        Migrator::up(&db, None).await?;

        Ok(Self {
            db: Arc::new(db),
            database_url,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::{ConnectionTrait, Statement};

    #[tokio::test]
    async fn test_database_runs_migrations() -> anyhow::Result<()> {
        let test_db = TestDatabase::with_migrations().await?;

        let result = Statement::from_string(
            test_db.db.get_database_backend(),
            "SELECT COUNT(*) FROM custom_domains".to_owned(),
        );

        let query_result = test_db.db.query_one(result).await?;
        assert!(query_result.is_some());

        Ok(())
    }
}

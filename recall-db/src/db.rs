//! Database connection pool and initialization.

use std::path::Path;

use sqlx::SqlitePool;
use tracing::info;

use crate::{
    error::{DbError, DbResult},
    sqlite_runtime::create_file_pool,
};

/// Relational database pool wrapper
#[derive(Debug, Clone)]
pub struct RecallDb {
    pool: SqlitePool,
}

impl RecallDb {
    /// Open (or create) the database at `db_path` and run migrations.
    pub async fn open(db_path: &Path) -> DbResult<Self> {
        info!("Initializing recall database at: {}", db_path.display());

        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let pool = create_file_pool(db_path, 5).await?;

        Self::run_migrations(&pool).await?;

        Ok(Self { pool })
    }

    /// Get the inner SQLx pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Run database migrations using sqlx migrate macro
    async fn run_migrations(pool: &SqlitePool) -> DbResult<()> {
        sqlx::migrate!("./migrations")
            .run(pool)
            .await
            .map_err(|e| DbError::Migration(e.to_string()))?;

        Ok(())
    }

    /// Close the pool gracefully
    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Create a RecallDb from an existing SqlitePool (for testing)
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

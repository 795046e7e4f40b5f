//! Helpers for setting up databases in tests.

use crate::db::RecallDb;
use crate::error::{DbError, DbResult};
use crate::sqlite_runtime::create_in_memory_pool;

/// In-memory database with migrations applied.
pub async fn create_test_db() -> DbResult<RecallDb> {
    let pool = create_in_memory_pool().await?;
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .map_err(|e| DbError::Migration(e.to_string()))?;
    Ok(RecallDb::from_pool(pool))
}

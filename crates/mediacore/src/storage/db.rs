use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

use super::migrations;
use crate::core::error::{AppError, AppResult};

/// Type alias for the database connection pool
pub type DbPool = Pool<SqliteConnectionManager>;

/// Type alias for a pooled database connection
pub type DbConnection = r2d2::PooledConnection<SqliteConnectionManager>;

/// Create a database connection pool and bring the schema up to date
///
/// # Arguments
///
/// * `database_path` - Path to the SQLite database file
pub fn create_pool(database_path: &str) -> AppResult<DbPool> {
    let manager = SqliteConnectionManager::file(database_path)
        .with_init(|conn| conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;"));
    let pool = Pool::builder()
        .max_size(10) // Maximum 10 connections in the pool
        .build(manager)?;

    let mut conn = pool.get()?;
    migrations::run_migrations(&mut conn)?;

    Ok(pool)
}

/// Get a connection from the pool
///
/// The connection is returned to the pool when dropped.
pub fn get_connection(pool: &DbPool) -> Result<DbConnection, r2d2::Error> {
    pool.get()
}

/// Runs blocking database work off the async executor
pub async fn with_connection<T, F>(pool: &DbPool, f: F) -> AppResult<T>
where
    T: Send + 'static,
    F: FnOnce(&DbConnection) -> AppResult<T> + Send + 'static,
{
    let pool = pool.clone();
    tokio::task::spawn_blocking(move || {
        let conn = get_connection(&pool)?;
        f(&conn)
    })
    .await
    .map_err(|e| AppError::Anyhow(anyhow::anyhow!("database task failed: {}", e)))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_pool_runs_migrations_and_queries() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.sqlite");
        let pool = create_pool(path.to_str().unwrap()).unwrap();

        let count: i64 = with_connection(&pool, |conn| {
            Ok(conn.query_row("SELECT COUNT(*) FROM user_settings", [], |row| row.get(0))?)
        })
        .await
        .unwrap();
        assert_eq!(count, 0);
    }
}

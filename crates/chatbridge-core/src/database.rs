//! Database connection and migrations (SQLite, via `sqlx`).

use std::path::Path;
use std::time::Duration;

use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};

use crate::error::Result;

pub struct DatabaseConfig {
    pub max_connections: u32,
    pub acquire_timeout: Duration,
    pub idle_timeout: Duration,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            max_connections: 5,
            acquire_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(600),
        }
    }
}

/// Connection pool plus migrations. Cheap to clone (wraps an `Arc`-backed
/// `SqlitePool` internally).
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    pub async fn new(path: impl AsRef<Path>) -> Result<Self> {
        Self::with_config(path, DatabaseConfig::default()).await
    }

    pub async fn with_config(path: impl AsRef<Path>, config: DatabaseConfig) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let url = format!("sqlite:{}?mode=rwc", path.display());
        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout)
            .idle_timeout(config.idle_timeout)
            .connect(&url)
            .await?;

        Self::configure_pragmas(&pool).await?;
        let db = Self { pool };
        db.run_migrations().await?;
        Ok(db)
    }

    /// In-memory database for tests.
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        Self::configure_pragmas(&pool).await?;
        let db = Self { pool };
        db.run_migrations().await?;
        Ok(db)
    }

    async fn configure_pragmas(pool: &SqlitePool) -> Result<()> {
        sqlx::query("PRAGMA journal_mode=WAL").execute(pool).await.ok();
        sqlx::query("PRAGMA foreign_keys=ON").execute(pool).await?;
        sqlx::query("PRAGMA busy_timeout=5000").execute(pool).await?;
        Ok(())
    }

    async fn run_migrations(&self) -> Result<()> {
        sqlx::query(include_str!("../migrations/001_initial.sql"))
            .execute(&self.pool)
            .await?;
        sqlx::query(include_str!("../migrations/002_agent_network.sql"))
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub(crate) fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}
